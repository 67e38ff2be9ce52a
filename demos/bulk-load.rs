use essay_store::core::meta::Schema;
use essay_store::prelude::*;

///
/// Bulk-loads a table described at runtime: the component layout comes from
/// a struct description and its column is replaced in one call.
///
fn main() -> Result<(), Error> {
    env_logger::init();

    let mut world = World::with_config(Config::new().with_min_capacity(64));

    let point = world.struct_from_desc("Point", "{ float x; float y; }")?;

    if let Some(Schema::Struct(schema)) = world.schema(point) {
        for member in &schema.members {
            println!("Point.{} offset={} size={}", member.name, member.offset, member.size);
        }
    }

    let table = world.table_from_str("Point")?;
    let n = 1000;

    world.table_bulk_insert(table, n)?;

    let points: Vec<[f32; 2]> = (0..n).map(|i| [i as f32, (i * 2) as f32]).collect();

    let column = match world.table_find_column(table, point) {
        Some(column) => column,
        None => return Ok(()),
    };

    let old = world.try_table_set_column(table, column, ColumnData::from_slice(&points))?;

    unsafe {
        world.table_delete_column(table, column, old);

        let data = world.table_get_column(table, column).as_slice::<[f32; 2]>();
        println!("rows={} last={:?}", world.table_count(table), data.last());
    }

    while world.table_count(table) > 0 {
        world.remove_row(table, 0)?;
    }

    world.destroy_table(table)?;

    println!("tables: {}", world.tables().len());

    Ok(())
}
