use std::mem;

use crate::{
    component::{ComponentId, Components},
    error::ParseError,
};

use super::parse::{self, ConstantDesc, MemberDesc, TypeDesc};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Char,
    Byte,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    UPtr,
    IPtr,
    String,
    Entity,
    Id,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Primitive> {
        let primitive = match name {
            "bool" | "_Bool" => Primitive::Bool,
            "char" => Primitive::Char,
            "flecs::byte" => Primitive::Byte,
            "uint8_t" => Primitive::U8,
            "uint16_t" => Primitive::U16,
            "uint32_t" => Primitive::U32,
            "uint64_t" => Primitive::U64,
            "int8_t" => Primitive::I8,
            "int16_t" => Primitive::I16,
            "int32_t" => Primitive::I32,
            "int64_t" => Primitive::I64,
            "float" => Primitive::F32,
            "double" => Primitive::F64,
            "uintptr_t" => Primitive::UPtr,
            "intptr_t" => Primitive::IPtr,
            "char*" | "flecs::string" => Primitive::String,
            "ecs_entity_t" => Primitive::Entity,
            "ecs_id_t" => Primitive::Id,
            _ => return None,
        };

        Some(primitive)
    }

    pub fn size(&self) -> usize {
        match self {
            Primitive::Bool | Primitive::Char | Primitive::Byte => 1,
            Primitive::U8 | Primitive::I8 => 1,
            Primitive::U16 | Primitive::I16 => 2,
            Primitive::U32 | Primitive::I32 | Primitive::F32 => 4,
            Primitive::U64 | Primitive::I64 | Primitive::F64 => 8,
            Primitive::Entity | Primitive::Id => 8,
            Primitive::UPtr | Primitive::IPtr => mem::size_of::<usize>(),
            Primitive::String => mem::size_of::<*const u8>(),
        }
    }

    pub fn align(&self) -> usize {
        match self {
            Primitive::UPtr | Primitive::IPtr => mem::align_of::<usize>(),
            Primitive::String => mem::align_of::<*const u8>(),
            Primitive::U64 | Primitive::I64 | Primitive::F64 => mem::align_of::<u64>(),
            Primitive::Entity | Primitive::Id => mem::align_of::<u64>(),
            _ => self.size(),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64
                | Primitive::IPtr | Primitive::F32 | Primitive::F64
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberType {
    Primitive(Primitive),
    Component(ComponentId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub ty: MemberType,
    /// Number of elements; greater than one for arrays.
    pub count: usize,
    /// Byte offset in the struct.
    pub offset: usize,
    /// Size of one element.
    pub size: usize,
}

///
/// Resolved struct with a C-compatible layout.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructSchema {
    pub members: Vec<Member>,
    pub size: usize,
    pub align: usize,
}

impl StructSchema {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub value: i64,
}

///
/// Reflection data attached to a component registered from a description.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Schema {
    Struct(StructSchema),
    /// Stored as `i32`.
    Enum(Vec<Constant>),
    /// Stored as `u32`.
    Bitmask(Vec<Constant>),
}

impl Schema {
    pub fn size(&self) -> usize {
        match self {
            Schema::Struct(schema) => schema.size,
            Schema::Enum(_) => mem::size_of::<i32>(),
            Schema::Bitmask(_) => mem::size_of::<u32>(),
        }
    }

    pub fn align(&self) -> usize {
        match self {
            Schema::Struct(schema) => schema.align,
            Schema::Enum(_) => mem::align_of::<i32>(),
            Schema::Bitmask(_) => mem::align_of::<u32>(),
        }
    }

    pub fn constants(&self) -> Option<&[Constant]> {
        match self {
            Schema::Struct(_) => None,
            Schema::Enum(constants) | Schema::Bitmask(constants) => Some(constants),
        }
    }
}

///
/// Parses a struct description and resolves its member types against the
/// primitives and the registered components.
///
pub fn struct_schema(
    components: &Components,
    name: &str,
    desc: &str
) -> Result<StructSchema, ParseError> {
    let members = parse::parse_struct(name, desc)?;

    let mut schema = StructSchema {
        members: Vec::with_capacity(members.len()),
        size: 0,
        align: 1,
    };

    let mut offset = 0usize;

    for member in members {
        let (ty, size, align, count) = resolve_member(components, name, desc, &member)?;

        let (start, end) = match member_range(offset, align, size, count) {
            Some(range) => range,
            None => return Err(ParseError::new(name, desc, member.offset, "type too large")),
        };

        schema.members.push(Member {
            name: member.name,
            ty,
            count,
            offset: start,
            size,
        });

        offset = end;
        schema.align = schema.align.max(align);
    }

    schema.size = match align_up(offset, schema.align) {
        Some(size) if size <= isize::MAX as usize => size,
        _ => return Err(ParseError::new(name, desc, desc.len(), "type too large")),
    };

    Ok(schema)
}

pub fn enum_schema(name: &str, desc: &str) -> Result<Schema, ParseError> {
    Ok(Schema::Enum(constants(parse::parse_enum(name, desc)?)))
}

pub fn bitmask_schema(name: &str, desc: &str) -> Result<Schema, ParseError> {
    Ok(Schema::Bitmask(constants(parse::parse_bitmask(name, desc)?)))
}

fn constants(descs: Vec<ConstantDesc>) -> Vec<Constant> {
    descs.into_iter()
        .map(|c| Constant { name: c.name, value: c.value })
        .collect()
}

fn resolve_member(
    components: &Components,
    name: &str,
    desc: &str,
    member: &MemberDesc,
) -> Result<(MemberType, usize, usize, usize), ParseError> {
    let mut count = member.count;

    let ty = if ! member.ty.is_ptr && member.ty.name == "ecs_array" {
        let (element, size) = parse::parse_array_params(name, &member.ty.params)?;

        count = match count.checked_mul(size) {
            Some(count) => count,
            None => return Err(ParseError::new(name, desc, member.offset, "type too large")),
        };

        match resolve_type(components, &element) {
            Some(ty) => ty,
            None => {
                return Err(ParseError::new(name, desc, member.offset,
                    format!("unknown element type '{}'", element.name)));
            }
        }
    } else if ! member.ty.is_ptr && member.ty.name == "flecs::bitmask" {
        let element = parse::parse_type_param(name, &member.ty.params, "bitmask")?;

        match components.lookup(&element.name) {
            Some(id) if matches!(components.info(id).schema(), Some(Schema::Bitmask(_))) => {
                MemberType::Component(id)
            }
            _ => {
                return Err(ParseError::new(name, desc, member.offset,
                    format!("'{}' is not a bitmask type", element.name)));
            }
        }
    } else if ! member.ty.is_ptr
        && (member.ty.name == "ecs_vector" || member.ty.name == "flecs::vector")
    {
        parse::parse_type_param(name, &member.ty.params, "vector")?;

        return Err(ParseError::new(name, desc, member.offset,
            "vector members are not supported"));
    } else {
        match resolve_type(components, &member.ty) {
            Some(ty) => ty,
            None => {
                return Err(ParseError::new(name, desc, member.offset,
                    format!("unknown type '{}'", member.ty.name)));
            }
        }
    };

    let (size, align) = match ty {
        MemberType::Primitive(p) => (p.size(), p.align()),
        MemberType::Component(id) => {
            let info = components.info(id);
            (info.size(), info.align())
        }
    };

    Ok((ty, size, align, count))
}

fn resolve_type(components: &Components, ty: &TypeDesc) -> Option<MemberType> {
    if ty.is_ptr {
        if ty.name == "char" {
            return Some(MemberType::Primitive(Primitive::String));
        } else {
            return Some(MemberType::Primitive(Primitive::UPtr));
        }
    }

    if let Some(primitive) = Primitive::from_name(&ty.name) {
        return Some(MemberType::Primitive(primitive));
    }

    components.lookup(&ty.name).map(MemberType::Component)
}

/// Byte range of a member placed after `offset`, bounded by `isize::MAX`.
fn member_range(offset: usize, align: usize, size: usize, count: usize) -> Option<(usize, usize)> {
    let start = align_up(offset, align)?;
    let end = start.checked_add(size.checked_mul(count)?)?;

    if end <= isize::MAX as usize {
        Some((start, end))
    } else {
        None
    }
}

fn align_up(offset: usize, align: usize) -> Option<usize> {
    Some(offset.checked_add(align - 1)? & !(align - 1))
}
