use essay_store::prelude::*;
use log::info;

#[derive(Component, Clone, Debug, Default)]
#[component(clone)]
struct Name(String);

#[derive(Component, Clone, Copy, Debug, Default)]
struct Position(f32, f32);

#[derive(Component, Clone, Copy, Debug, Default)]
struct Velocity(f32, f32);

///
/// Hello, world for essay-store-core.
///
/// Entities move between tables as components are added and removed.
///
fn main() -> Result<(), Error> {
    env_logger::init();

    let mut world = World::new();

    let hello = world.spawn();
    world.set(hello, Name("hello".to_string()))?;
    world.set(hello, Position(0., 0.))?;

    let world_id = world.spawn();
    world.set(world_id, Name("world".to_string()))?;
    world.set(world_id, Position(1., 2.))?;
    world.set(world_id, Velocity(0.5, 0.5))?;

    for _ in 0..2 {
        for entity in [hello, world_id] {
            if let Some(v) = world.get::<Velocity>(entity).copied() {
                if let Some(p) = world.get_mut::<Position>(entity) {
                    p.0 += v.0;
                    p.1 += v.1;
                }
            }
        }
    }

    for entity in [hello, world_id] {
        let record = world.record_find(entity);

        println!("{} {:?} {:?} {:?}",
            entity,
            world.get::<Name>(entity),
            world.get::<Position>(entity),
            record.and_then(|r| r.table()));
    }

    world.remove::<Velocity>(world_id)?;
    world.despawn(hello);

    info!("tables: {} alive: {}", world.tables().len(), world.entities().len());

    Ok(())
}
