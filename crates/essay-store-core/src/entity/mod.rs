mod entity;
mod index;

pub use entity::{
    Entity,
};

pub use index::{
    EntityIndex, Record,
};
