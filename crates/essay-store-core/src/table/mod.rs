mod column;
mod registry;
mod table;
mod type_expr;

pub use column::ColumnData;

pub use registry::TableRegistry;

pub use table::{
    Edges, Table, TableId,
};
