pub mod core {
    pub use essay_store_core::*;
}

pub use essay_store_core::prelude;

pub use essay_store_core::{
    Component, ComponentId, Entity, Error, ParseError, Record, TableId, World,
};
