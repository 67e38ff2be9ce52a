use thiserror::Error as ThisError;

use crate::{entity::Entity, table::TableId, component::ComponentId};

///
/// Recoverable error on the lookup/registration path: a type string or a
/// schema description that could not be parsed or resolved.
///
/// `offset` is the byte offset into `expr` where parsing stopped.
///
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{name}: {message} (offset {offset} in '{expr}')")]
pub struct ParseError {
    pub name: String,
    pub expr: String,
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(
        name: impl Into<String>,
        expr: impl Into<String>,
        offset: usize,
        message: impl Into<String>
    ) -> Self {
        Self {
            name: name.into(),
            expr: expr.into(),
            offset,
            message: message.into(),
        }
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("component '{0}' is already registered")]
    DuplicateComponent(String),

    #[error("unknown component {0:?}")]
    UnknownComponent(ComponentId),

    #[error("unknown table {0:?}")]
    UnknownTable(TableId),

    #[error("table {0:?} still holds {1} rows")]
    TableNotEmpty(TableId, usize),

    #[error("entity {0} is not alive")]
    DeadEntity(Entity),

    #[error("entity {0} doesn't match the generation of its slot")]
    StaleEntity(Entity),

    #[error("row {row} is out of range for a table with {count} rows")]
    RowOutOfRange { row: usize, count: usize },

    #[error("column {column} is out of range for a table with {len} columns")]
    ColumnOutOfRange { column: usize, len: usize },

    #[error("column layout mismatch: expected size {size} align {align}, got size {found_size} align {found_align}")]
    LayoutMismatch { size: usize, align: usize, found_size: usize, found_align: usize },

    #[error("invalid layout: size {size} is not a multiple of align {align}, or align is not a power of two")]
    InvalidLayout { size: usize, align: usize },

    #[error("the root table can't be destroyed")]
    RootTable,

    #[error("column length {found} does not match table row count {count}")]
    LengthMismatch { count: usize, found: usize },

    #[error("component {0:?} has lifecycle hooks and can't be copied as plain bytes")]
    NotPod(ComponentId),
}

pub type Result<V, E=Error> = std::result::Result<V, E>;
