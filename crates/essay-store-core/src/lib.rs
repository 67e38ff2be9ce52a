extern crate self as essay_store_core;

pub mod component;
pub mod entity;
pub mod error;
pub mod meta;
pub mod table;
pub mod world;

pub use essay_store_macros::Component;

pub use component::{
    Component, ComponentId, ComponentInfo, Components, Lifecycle,
};

pub use entity::{
    Entity, EntityIndex, Record,
};

pub use error::{
    Error, ParseError, Result,
};

pub use table::{
    ColumnData, Table, TableId, TableRegistry,
};

pub use world::{
    Config, World,
};

pub mod prelude {
    pub use crate::world::{Config, World};
    pub use crate::entity::{Entity, Record};
    pub use crate::table::{ColumnData, TableId};
    pub use crate::component::{Component, ComponentId, Lifecycle};
    pub use crate::error::{Error, ParseError};
    pub use essay_store_macros::Component;
}
