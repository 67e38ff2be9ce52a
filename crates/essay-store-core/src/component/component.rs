use std::{any::{type_name, TypeId}, collections::HashMap, mem};

use log::{debug, warn};

use crate::{error::{Error, Result}, meta::Schema};

use super::Lifecycle;

#[derive (Debug, Copy, Clone, PartialEq, Hash, Eq, PartialOrd, Ord)]
pub struct ComponentId(u32);

///
/// A Rust type stored in tables.
///
/// New rows are default-constructed, so every component is `Default`.
/// Override `lifecycle` (or use `#[component(clone)]` with the derive) to
/// install a copy hook.
///
pub trait Component: Default + Send + Sync + 'static {
    fn lifecycle() -> Lifecycle {
        Lifecycle::of::<Self>()
    }
}

#[derive(Clone, Debug)]
pub struct ComponentInfo {
    id: ComponentId,
    name: String,
    size: usize,
    align: usize,
    lifecycle: Lifecycle,
    type_id: Option<TypeId>,
    schema: Option<Schema>,
}

pub struct Components {
    infos: Vec<ComponentInfo>,
    by_name: HashMap<String, ComponentId>,
    by_type: HashMap<TypeId, ComponentId>,
}

impl ComponentId {
    pub(crate) fn new(index: usize) -> Self {
        ComponentId(index as u32)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl ComponentInfo {
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    #[inline]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Zero-sized components are tags: tables track them but store no column.
    #[inline]
    pub fn is_tag(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }
}

impl Components {
    pub fn new() -> Self {
        Self {
            infos: Vec::new(),
            by_name: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    ///
    /// Registers a Rust type under its `type_name`. Registering the same type
    /// twice returns the existing id.
    ///
    pub fn register<T: Component>(&mut self) -> ComponentId {
        if let Some(id) = self.by_type.get(&TypeId::of::<T>()) {
            return *id;
        }

        let name = type_name::<T>();

        let id = self.push(ComponentInfo {
            id: ComponentId::new(self.infos.len()),
            name: name.to_string(),
            size: mem::size_of::<T>(),
            align: mem::align_of::<T>(),
            lifecycle: T::lifecycle(),
            type_id: Some(TypeId::of::<T>()),
            schema: None,
        });

        if self.by_name.contains_key(name) {
            warn!("component name {} is already taken, {:?} is only reachable by type", name, id);
        } else {
            self.by_name.insert(name.to_string(), id);
        }

        self.by_type.insert(TypeId::of::<T>(), id);

        id
    }

    ///
    /// Registers a Rust type and an additional short name for it, so type
    /// strings can refer to it as `name`.
    ///
    pub fn register_named<T: Component>(&mut self, name: &str) -> Result<ComponentId> {
        let id = self.register::<T>();

        match self.by_name.get(name) {
            Some(prev) if *prev == id => Ok(id),
            Some(_) => Err(Error::DuplicateComponent(name.to_string())),
            None => {
                self.by_name.insert(name.to_string(), id);
                Ok(id)
            }
        }
    }

    ///
    /// Registers a component described only by its layout and hooks, as
    /// supplied by a reflection layer.
    ///
    pub fn register_raw(
        &mut self,
        name: &str,
        size: usize,
        align: usize,
        lifecycle: Lifecycle
    ) -> Result<ComponentId> {
        if self.by_name.contains_key(name) {
            return Err(Error::DuplicateComponent(name.to_string()));
        }

        if ! align.is_power_of_two() || size % align != 0 {
            return Err(Error::InvalidLayout { size, align });
        }

        let id = self.push(ComponentInfo {
            id: ComponentId::new(self.infos.len()),
            name: name.to_string(),
            size,
            align,
            lifecycle,
            type_id: None,
            schema: None,
        });

        self.by_name.insert(name.to_string(), id);

        Ok(id)
    }

    fn push(&mut self, info: ComponentInfo) -> ComponentId {
        let id = info.id;

        debug!("register component {:?} {} size={} align={}",
            id, info.name, info.size, info.align);

        self.infos.push(info);

        id
    }

    pub(crate) fn set_schema(&mut self, id: ComponentId, schema: Schema) {
        self.infos[id.index()].schema = Some(schema);
    }

    #[inline]
    pub fn id<T: 'static>(&self) -> Option<ComponentId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn get(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.infos.get(id.index())
    }

    ///
    /// Info for an id handed out by this registry. Ids from another
    /// registry are a contract violation.
    ///
    #[inline]
    pub fn info(&self, id: ComponentId) -> &ComponentInfo {
        &self.infos[id.index()]
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        id.index() < self.infos.len()
    }

    pub fn iter(&self) -> impl Iterator<Item=&ComponentInfo> {
        self.infos.iter()
    }
}

impl Default for Components {
    fn default() -> Self {
        Self::new()
    }
}
