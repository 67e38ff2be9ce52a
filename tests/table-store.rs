use std::{mem::{self, ManuallyDrop}, sync::{Arc, Mutex}};

use essay_store_core::{
    Component, ColumnData, Config, Entity, Error, Lifecycle, Record, TableId, World,
};

#[test]
fn permutations_share_a_table() {
    let mut world = World::new();

    let ids = [
        world.register::<Origin>(),
        world.register::<Counter>(),
        world.register::<Payload>(),
    ];

    let table = world.table_from_ids(&ids).unwrap();

    for perm in [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
        let ids = [ids[perm[0]], ids[perm[1]], ids[perm[2]]];

        assert_eq!(world.table_from_ids(&ids).unwrap(), table);
    }

    assert_eq!(world.table_from_ids(&[ids[2], ids[0], ids[2], ids[1], ids[0]]).unwrap(), table);

    let mut sorted = ids.to_vec();
    sorted.sort();
    assert_eq!(world.table(table).unwrap().type_ids(), &sorted[..]);
}

#[test]
fn type_string_matches_ids() {
    let mut world = World::new();

    let origin = world.register_named::<Origin>("Origin").unwrap();
    let counter = world.register_named::<Counter>("Counter").unwrap();

    let table = world.table_from_str("Counter, Origin").unwrap();

    assert_eq!(world.table_from_ids(&[origin, counter]).unwrap(), table);
    assert_eq!(world.table_from_str(" Origin ,Counter,Origin ").unwrap(), table);

    let before = world.tables().len();
    let err = world.table_from_str("Origin, Missing").unwrap_err();

    assert_eq!(err.offset(), 8);
    assert_eq!(err.message(), "unresolved identifier 'Missing'");
    assert_eq!(world.tables().len(), before);
}

#[test]
fn rows_stay_aligned() {
    let mut world = World::with_config(Config::new().with_min_capacity(2));

    let mut entities = Vec::new();

    for i in 0..32u32 {
        let e = world.spawn();
        world.set(e, Origin(e)).unwrap();
        world.set(e, Counter(i)).unwrap();

        if i % 3 == 0 {
            world.set(e, Payload(format!("p{}", i))).unwrap();
        }

        entities.push(e);
    }

    // a mix of despawns and structural changes
    for (i, e) in entities.iter().enumerate() {
        match i % 4 {
            0 => { world.despawn(*e); }
            1 => { world.remove::<Counter>(*e).unwrap(); }
            2 => { world.set(*e, Payload(format!("late{}", i))).unwrap(); }
            _ => {}
        }
    }

    for table in world.tables().iter() {
        let Some(column) = world.component_id::<Origin>()
            .and_then(|id| table.find_column(id)) else { continue };

        let origins = unsafe { table.get_column(column).as_slice::<Origin>() };

        for (row, origin) in origins.iter().enumerate() {
            assert_eq!(table.entity(row), Some(origin.0));

            let record = world.record_find(origin.0).unwrap();
            assert_eq!(record, Record::new(table.id(), row));
        }

        assert_eq!(origins.len(), table.count());
    }

    for (i, e) in entities.iter().enumerate() {
        match i % 4 {
            0 => assert!(! world.is_alive(*e)),
            1 => {
                assert_eq!(world.get::<Origin>(*e), Some(&Origin(*e)));
                assert!(world.get::<Counter>(*e).is_none());
            }
            2 => {
                assert_eq!(world.get::<Counter>(*e), Some(&Counter(i as u32)));
                assert_eq!(world.get::<Payload>(*e), Some(&Payload(format!("late{}", i))));
            }
            _ => assert_eq!(world.get::<Counter>(*e), Some(&Counter(i as u32))),
        }
    }
}

#[test]
fn swap_remove_reindexes_last_row() {
    let mut world = World::new();
    let origin = world.register::<Origin>();
    let table = world.table_from_ids(&[origin]).unwrap();

    let entities: Vec<Entity> = (0..4).map(|_| world.spawn()).collect();

    for e in &entities {
        world.table_insert(table, Some(*e)).unwrap();
        world.set(*e, Origin(*e)).unwrap();
    }

    let last = world.record_find(entities[3]).unwrap();
    assert_eq!(last.row(), 3);

    world.remove_row(table, 1).unwrap();

    assert_eq!(world.table_count(table), 3);
    assert_eq!(world.record_find(entities[3]).unwrap(), Record::new(table, 1));
    assert_eq!(world.get::<Origin>(entities[3]), Some(&Origin(entities[3])));
    assert!(world.is_alive(entities[1]));
    assert!(world.get::<Origin>(entities[1]).is_none());

    // removing the last row only shrinks the table
    let before = world.record_find(entities[2]).unwrap();
    assert_eq!(before.row(), 2);

    world.remove_row(table, 2).unwrap();

    assert_eq!(world.table_count(table), 2);
    assert_eq!(world.record_find(entities[0]).unwrap(), Record::new(table, 0));
    assert_eq!(world.record_find(entities[3]).unwrap(), Record::new(table, 1));
}

#[test]
fn move_to_runs_each_hook_once() {
    let counts = Counts::default();

    {
        let mut world = World::new();
        let tracked = world.register::<Tracked>();
        let table = world.table_from_ids(&[tracked]).unwrap();

        let e = world.spawn();
        let record = world.table_insert(table, Some(e)).unwrap();
        let column = world.table_find_column(table, tracked).unwrap();

        let mut src = ManuallyDrop::new(Tracked::new(&counts, 42));

        unsafe {
            world.record_move_to(
                &record,
                column,
                mem::size_of::<Tracked>(),
                (&mut *src as *mut Tracked).cast(),
                1
            );
        }

        assert_eq!(world.get::<Tracked>(e).unwrap().value, 42);

        // moving between tables relocates without extra hooks
        world.add::<Origin>(e).unwrap();
        world.remove::<Origin>(e).unwrap();

        assert_eq!(world.get::<Tracked>(e).unwrap().value, 42);

        world.despawn(e);
    }

    let counts = counts.0.lock().unwrap();

    assert_eq!(counts.constructed, counts.destructed);
    assert_eq!(counts.destructed, 1);
}

#[test]
fn copy_to_uses_copy_hook() {
    let counts = Counts::default();

    let mut world = World::new();
    let tracked = world.register::<Tracked>();

    let e = world.spawn();
    world.add_id(e, tracked).unwrap();

    let record = world.record_find(e).unwrap();
    let column = world.table_find_column(record.table().unwrap(), tracked).unwrap();

    let src = Tracked::new(&counts, 7);

    unsafe {
        world.record_copy_to(&record, column, mem::size_of::<Tracked>(), (&src as *const Tracked).cast(), 1);
    }

    assert_eq!(world.get::<Tracked>(e).unwrap().value, 7);
    assert_eq!(src.value, 7);
    assert_eq!(counts.0.lock().unwrap().copied, 1);

    drop(src);
    drop(world);

    let counts = counts.0.lock().unwrap();
    assert_eq!(counts.constructed, counts.destructed);
}

#[test]
fn set_column_round_trip() {
    let mut world = World::new();

    let point = world.register_raw("Point", 8, 4, Lifecycle::empty()).unwrap();
    let table = world.table_from_str("Point").unwrap();

    world.table_bulk_insert(table, 4).unwrap();

    let column = world.table_find_column(table, point).unwrap();

    let bytes: Vec<u8> = (0..32).collect();
    let data = ColumnData::from_bytes(8, 4, &bytes);

    let old = world.try_table_set_column(table, column, data).unwrap();

    unsafe {
        assert_eq!(old.as_bytes(), &[0u8; 32][..]);
        world.table_delete_column(table, column, old);

        assert_eq!(world.table_get_column(table, column).as_bytes(), &bytes[..]);
    }

    assert!(matches!(
        world.try_table_set_column(table, column, ColumnData::from_bytes(4, 4, &[0; 16])),
        Err(Error::LayoutMismatch { .. })
    ));
}

#[test]
fn bulk_load_then_insert() {
    let mut world = World::new();

    let point = world.register_raw("Point", 8, 4, Lifecycle::empty()).unwrap();
    let table = world.table_from_str("Point").unwrap();

    world.table_bulk_insert(table, 3).unwrap();

    let column = world.table_find_column(table, point).unwrap();
    let old = world.try_table_set_column(table, column, ColumnData::from_bytes(8, 4, &[1; 24])).unwrap();

    unsafe { world.table_delete_column(table, column, old); }

    for _ in 0..10 {
        world.table_insert(table, None).unwrap();
    }

    assert_eq!(world.table_count(table), 13);

    unsafe {
        let bytes = world.table_get_column(table, column).as_bytes();

        assert_eq!(&bytes[..24], &[1u8; 24][..]);
        assert_eq!(&bytes[24..], &[0u8; 80][..]);
    }

    assert!(matches!(
        world.try_record_copy_pod_to(&Record::new(table, usize::MAX), column, &[0; 8]),
        Err(Error::RowOutOfRange { .. })
    ));
}

#[test]
fn destroy_table_requires_empty() {
    let mut world = World::new();
    let origin = world.register::<Origin>();

    let e = world.spawn();
    world.set(e, Origin(e)).unwrap();

    let table = world.record_find(e).unwrap().table().unwrap();

    assert!(matches!(world.destroy_table(table), Err(Error::TableNotEmpty(_, 1))));
    assert!(matches!(world.destroy_table(TableId::new(0)), Err(Error::RootTable)));

    world.despawn(e);
    world.destroy_table(table).unwrap();

    assert!(world.table(table).is_none());

    let e = world.spawn();
    world.add_id(e, origin).unwrap();

    let recreated = world.record_find(e).unwrap().table().unwrap();
    assert_ne!(recreated, table);
}

#[derive(Component, Clone, Copy, Debug, PartialEq)]
struct Origin(Entity);

impl Default for Origin {
    fn default() -> Self {
        Origin(Entity::new(u32::MAX, 0))
    }
}

#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
struct Counter(u32);

#[derive(Component, Clone, Debug, Default, PartialEq)]
#[component(clone)]
struct Payload(String);

#[derive(Default)]
struct CountsInner {
    constructed: usize,
    destructed: usize,
    copied: usize,
}

#[derive(Clone, Default)]
struct Counts(Arc<Mutex<CountsInner>>);

struct Tracked {
    counts: Option<Counts>,
    value: u32,
}

impl Tracked {
    fn new(counts: &Counts, value: u32) -> Self {
        counts.0.lock().unwrap().constructed += 1;

        Self {
            counts: Some(counts.clone()),
            value,
        }
    }
}

impl Default for Tracked {
    fn default() -> Self {
        Self { counts: None, value: 0 }
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        if let Some(counts) = &self.counts {
            counts.0.lock().unwrap().constructed += 1;
        }

        Self { counts: self.counts.clone(), value: self.value }
    }

    fn clone_from(&mut self, source: &Self) {
        if let Some(counts) = &source.counts {
            counts.0.lock().unwrap().copied += 1;
        }

        *self = source.clone();
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        if let Some(counts) = &self.counts {
            counts.0.lock().unwrap().destructed += 1;
        }
    }
}

impl Component for Tracked {
    fn lifecycle() -> Lifecycle {
        Lifecycle::cloned::<Self>()
    }
}
