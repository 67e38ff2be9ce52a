mod parse;
mod schema;

pub use parse::{
    parse_bitmask, parse_enum, parse_struct,
    ConstantDesc, MemberDesc, TypeDesc,
};

pub use schema::{
    bitmask_schema, enum_schema, struct_schema,
    Constant, Member, MemberType, Primitive, Schema, StructSchema,
};
