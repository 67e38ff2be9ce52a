use std::{mem::{self, ManuallyDrop}, ptr::NonNull};

use log::debug;

use crate::{
    component::{Component, ComponentId, ComponentInfo, Components, Lifecycle},
    entity::{Entity, EntityIndex, Record},
    error::{Error, ParseError, Result},
    meta::{self, Schema},
    table::{ColumnData, Table, TableId, TableRegistry},
};

use super::Config;

///
/// The storage context: component registry, entity index and table
/// registry. Every structural change goes through the world so a row
/// relocation and the matching record update happen in the same call.
///
pub struct World {
    components: Components,
    entities: EntityIndex,
    tables: TableRegistry,
    config: Config,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let components = Components::new();
        let tables = TableRegistry::new(&components, config.min_capacity());

        Self {
            components,
            entities: EntityIndex::new(),
            tables,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn components(&self) -> &Components {
        &self.components
    }

    #[inline]
    pub fn entities(&self) -> &EntityIndex {
        &self.entities
    }

    #[inline]
    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    //
    // Components
    //

    pub fn register<T: Component>(&mut self) -> ComponentId {
        self.components.register::<T>()
    }

    pub fn register_named<T: Component>(&mut self, name: &str) -> Result<ComponentId> {
        self.components.register_named::<T>(name)
    }

    pub fn register_raw(
        &mut self,
        name: &str,
        size: usize,
        align: usize,
        lifecycle: Lifecycle
    ) -> Result<ComponentId> {
        self.components.register_raw(name, size, align, lifecycle)
    }

    #[inline]
    pub fn component_id<T: 'static>(&self) -> Option<ComponentId> {
        self.components.id::<T>()
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<ComponentId> {
        self.components.lookup(name)
    }

    #[inline]
    pub fn component_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.components.get(id)
    }

    //
    // Entities
    //

    /// A new entity without components.
    pub fn spawn(&mut self) -> Entity {
        self.entities.new_id()
    }

    ///
    /// Destroys the entity's components and invalidates its id. Returns false
    /// for an entity that isn't alive.
    ///
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let record = match self.entities.find(entity) {
            Some(record) => *record,
            None => return false,
        };

        if let Some(table) = record.table() {
            self.swap_remove(table, record.row());
        }

        self.entities.remove(entity);

        true
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn has(&self, entity: Entity, id: ComponentId) -> bool {
        match self.entities.find(entity).and_then(|r| r.table()) {
            Some(table) => self.tables.table(table).has(id),
            None => false,
        }
    }

    /// Adds a default-constructed component. Adding a present component
    /// leaves its value unchanged.
    pub fn add_id(&mut self, entity: Entity, id: ComponentId) -> Result<()> {
        self.add_id_record(entity, id)?;

        Ok(())
    }

    pub fn remove_id(&mut self, entity: Entity, id: ComponentId) -> Result<()> {
        let record = self.record(entity)?;

        if let Some(src) = record.table() {
            let dst = self.tables.traverse_remove(&self.components, src, id);

            self.move_entity(entity, record, dst);
        }

        Ok(())
    }

    pub fn add<T: Component>(&mut self, entity: Entity) -> Result<()> {
        let id = self.register::<T>();

        self.add_id(entity, id)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<()> {
        match self.component_id::<T>() {
            Some(id) => self.remove_id(entity, id),
            None => self.record(entity).map(|_| ()),
        }
    }

    /// Adds the component if needed and moves `value` into it.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) -> Result<()> {
        let id = self.register::<T>();
        let record = self.add_id_record(entity, id)?;

        let table = self.record_table(&record);

        if let Some(column) = table.find_column(id) {
            let mut value = ManuallyDrop::new(value);

            unsafe {
                table.move_to(
                    record.row(),
                    column,
                    mem::size_of::<T>(),
                    (&mut *value as *mut T).cast(),
                    1
                );
            }
        }

        Ok(())
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let id = self.components.id::<T>()?;
        let record = self.entities.find(entity)?;
        let table = self.tables.get(record.table()?)?;

        if ! table.has(id) {
            return None;
        }

        match table.find_column(id) {
            Some(column) => unsafe {
                Some(&*table.ptr(record.row(), column).cast::<T>())
            },
            None => unsafe { Some(NonNull::<T>::dangling().as_ref()) },
        }
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let id = self.components.id::<T>()?;
        let record = *self.entities.find(entity)?;
        let table = self.tables.get_mut(record.table()?)?;

        if ! table.has(id) {
            return None;
        }

        match table.find_column(id) {
            Some(column) => unsafe {
                Some(&mut *table.ptr(record.row(), column).cast::<T>())
            },
            None => unsafe { Some(NonNull::<T>::dangling().as_mut()) },
        }
    }

    fn record(&self, entity: Entity) -> Result<Record> {
        match self.entities.find(entity) {
            Some(record) => Ok(*record),
            None => Err(Error::DeadEntity(entity)),
        }
    }

    fn add_id_record(&mut self, entity: Entity, id: ComponentId) -> Result<Record> {
        if ! self.components.contains(id) {
            return Err(Error::UnknownComponent(id));
        }

        let record = self.record(entity)?;

        let src = record.table().unwrap_or(TableId::ROOT);
        let dst = self.tables.traverse_add(&self.components, src, id);

        Ok(self.move_entity(entity, record, dst))
    }

    ///
    /// Moves an entity's row into `dst` and updates both its record and the
    /// record of the entity relocated into the vacated row.
    ///
    fn move_entity(&mut self, entity: Entity, record: Record, dst: TableId) -> Record {
        let row = match record.table() {
            Some(src) if src == dst => return record,
            Some(src) => {
                let (src_table, dst_table) = self.tables.pair_mut(src, dst);

                let (row, moved) = src_table.move_row(record.row(), dst_table);

                if let Some(moved) = moved {
                    self.entities.relocate(moved, src, record.row());
                }

                row
            }
            None => self.tables.table_mut(dst).insert(Some(entity)),
        };

        self.entities.relocate(entity, dst, row);

        Record::new(dst, row)
    }

    /// Swap-removes a row and reindexes the relocated entity. Returns the
    /// entity that was stored in the removed row.
    fn swap_remove(&mut self, table: TableId, row: usize) -> Option<Entity> {
        let table_ref = self.tables.table_mut(table);
        let removed = table_ref.entity(row);

        if let Some(moved) = table_ref.remove_row(row) {
            self.entities.relocate(moved, table, row);
        }

        removed
    }

    //
    // Tables
    //

    ///
    /// Table for a comma-separated list of component names. On error no
    /// table is created.
    ///
    pub fn table_from_str(&mut self, expr: &str) -> Result<TableId, ParseError> {
        self.tables.from_str(&self.components, expr)
    }

    /// Table for a set of components, in any order and with duplicates.
    pub fn table_from_ids(&mut self, ids: &[ComponentId]) -> Result<TableId> {
        if let Some(id) = ids.iter().find(|id| ! self.components.contains(**id)) {
            return Err(Error::UnknownComponent(*id));
        }

        Ok(self.tables.find_or_create(&self.components, ids))
    }

    #[inline]
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id)
    }

    ///
    /// Appends a default-constructed row to `table`. With an entity, the
    /// entity's record is updated; an entity that already has a location is
    /// moved, keeping the components both tables share. Growing the table
    /// invalidates column pointers fetched earlier.
    ///
    pub fn table_insert(&mut self, table: TableId, entity: Option<Entity>) -> Result<Record> {
        if self.tables.get(table).is_none() {
            return Err(Error::UnknownTable(table));
        }

        match entity {
            Some(entity) => {
                let record = self.record(entity)?;

                Ok(self.move_entity(entity, record, table))
            }
            None => {
                let row = self.tables.table_mut(table).insert(None);

                Ok(Record::new(table, row))
            }
        }
    }

    ///
    /// Appends `count` anonymous default-constructed rows and returns the
    /// first new row. Used with `table_set_column` to bulk-load a table.
    ///
    pub fn table_bulk_insert(&mut self, table: TableId, count: usize) -> Result<usize> {
        match self.tables.get_mut(table) {
            Some(table) => Ok(table.insert_n(count)),
            None => Err(Error::UnknownTable(table)),
        }
    }

    #[inline]
    pub fn table_count(&self, table: TableId) -> usize {
        self.tables.table(table).count()
    }

    #[inline]
    pub fn table_find_column(&self, table: TableId, component: ComponentId) -> Option<usize> {
        self.tables.table(table).find_column(component)
    }

    #[inline]
    pub fn table_get_column(&self, table: TableId, column: usize) -> &ColumnData {
        self.tables.table(table).get_column(column)
    }

    ///
    /// # Safety
    /// See `Table::get_column_mut`.
    ///
    #[inline]
    pub unsafe fn table_get_column_mut(&mut self, table: TableId, column: usize) -> &mut ColumnData {
        self.tables.table_mut(table).get_column_mut(column)
    }

    ///
    /// # Safety
    /// See `Table::set_column`.
    ///
    pub unsafe fn table_set_column(
        &mut self,
        table: TableId,
        column: usize,
        data: ColumnData
    ) -> ColumnData {
        self.tables.table_mut(table).set_column(column, data)
    }

    pub fn try_table_set_column(
        &mut self,
        table: TableId,
        column: usize,
        data: ColumnData
    ) -> Result<ColumnData> {
        match self.tables.get_mut(table) {
            Some(table) => table.try_set_column(column, data),
            None => Err(Error::UnknownTable(table)),
        }
    }

    ///
    /// # Safety
    /// See `Table::delete_column`.
    ///
    pub unsafe fn table_delete_column(&self, table: TableId, column: usize, data: ColumnData) {
        self.tables.table(table).delete_column(column, data)
    }

    /// Empty tables only. The root table can't be destroyed.
    pub fn destroy_table(&mut self, table: TableId) -> Result<()> {
        self.tables.destroy(table)
    }

    ///
    /// Swap-removes `row` and updates the record of the entity relocated
    /// into it. The entity that occupied the row, if any, stays alive without
    /// a location and is returned.
    ///
    pub fn remove_row(&mut self, table: TableId, row: usize) -> Result<Option<Entity>> {
        let count = match self.tables.get(table) {
            Some(table) => table.count(),
            None => return Err(Error::UnknownTable(table)),
        };

        if row >= count {
            return Err(Error::RowOutOfRange { row, count });
        }

        let removed = self.swap_remove(table, row);

        if let Some(entity) = removed {
            self.entities.clear(entity);
        }

        Ok(removed)
    }

    //
    // Records
    //

    #[inline]
    pub fn record_find(&self, entity: Entity) -> Option<Record> {
        self.entities.find(entity).copied()
    }

    ///
    /// # Safety
    /// `record` must be a current location and the arguments must satisfy
    /// `Table::copy_to`.
    ///
    pub unsafe fn record_copy_to(
        &mut self,
        record: &Record,
        column: usize,
        size: usize,
        value: *const u8,
        count: usize
    ) {
        self.record_table(record).copy_to(record.row(), column, size, value, count)
    }

    ///
    /// # Safety
    /// See `Table::copy_pod_to`.
    ///
    pub unsafe fn record_copy_pod_to(
        &mut self,
        record: &Record,
        column: usize,
        size: usize,
        value: *const u8,
        count: usize
    ) {
        self.record_table(record).copy_pod_to(record.row(), column, size, value, count)
    }

    ///
    /// # Safety
    /// See `Table::move_to`. The source values are consumed.
    ///
    pub unsafe fn record_move_to(
        &mut self,
        record: &Record,
        column: usize,
        size: usize,
        value: *mut u8,
        count: usize
    ) {
        self.record_table(record).move_to(record.row(), column, size, value, count)
    }

    pub fn try_record_copy_pod_to(
        &mut self,
        record: &Record,
        column: usize,
        bytes: &[u8]
    ) -> Result<()> {
        let id = match record.table() {
            Some(id) => id,
            None => return Err(Error::UnknownTable(TableId::ROOT)),
        };

        match self.tables.get_mut(id) {
            Some(table) => table.try_copy_pod_to(record.row(), column, bytes),
            None => Err(Error::UnknownTable(id)),
        }
    }

    fn record_table(&mut self, record: &Record) -> &mut Table {
        let id = record.table()
            .unwrap_or_else(|| panic!("record {:?} has no table", record));

        self.tables.table_mut(id)
    }

    //
    // Schemas
    //

    ///
    /// Registers a component described by a C struct body, such as
    /// `"{ float x; float y; }"`. Member types are primitives or components
    /// registered earlier. Nothing is registered on error.
    ///
    pub fn struct_from_desc(&mut self, name: &str, desc: &str) -> Result<ComponentId> {
        self.check_unregistered(name)?;

        let schema = meta::struct_schema(&self.components, name, desc)?;

        self.register_schema(name, Schema::Struct(schema))
    }

    pub fn enum_from_desc(&mut self, name: &str, desc: &str) -> Result<ComponentId> {
        self.check_unregistered(name)?;

        let schema = meta::enum_schema(name, desc)?;

        self.register_schema(name, schema)
    }

    pub fn bitmask_from_desc(&mut self, name: &str, desc: &str) -> Result<ComponentId> {
        self.check_unregistered(name)?;

        let schema = meta::bitmask_schema(name, desc)?;

        self.register_schema(name, schema)
    }

    pub fn schema(&self, id: ComponentId) -> Option<&Schema> {
        self.components.get(id)?.schema()
    }

    fn check_unregistered(&self, name: &str) -> Result<()> {
        match self.components.lookup(name) {
            Some(_) => Err(Error::DuplicateComponent(name.to_string())),
            None => Ok(()),
        }
    }

    fn register_schema(&mut self, name: &str, schema: Schema) -> Result<ComponentId> {
        let id = self.components.register_raw(
            name,
            schema.size(),
            schema.align(),
            Lifecycle::empty()
        )?;

        debug!("schema {} {:?}", name, schema);

        self.components.set_schema(id, schema);

        Ok(id)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
