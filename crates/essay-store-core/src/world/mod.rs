mod config;
mod world;

pub use config::Config;
pub use world::World;
