use std::collections::HashMap;

use log::{debug, trace};

use crate::{
    component::{ComponentId, Components},
    error::{Error, ParseError, Result},
};

use super::{type_expr, Table, TableId};

///
/// The archetype graph: exactly one table per canonical type, plus the
/// lazily populated add/remove edges between tables.
///
pub struct TableRegistry {
    tables: Vec<Option<Table>>,
    by_type: HashMap<Vec<ComponentId>, TableId>,
    min_capacity: usize,
}

impl TableRegistry {
    pub fn new(components: &Components, min_capacity: usize) -> Self {
        let mut registry = Self {
            tables: Vec::new(),
            by_type: HashMap::new(),
            min_capacity,
        };

        let root = registry.find_or_create(components, &[]);
        debug_assert_eq!(root, TableId::ROOT);

        registry
    }

    /// Number of live tables, including the root.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// The table of entities without components.
    #[inline]
    pub fn root(&self) -> TableId {
        TableId::ROOT
    }

    #[inline]
    pub fn get(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.index())?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.get_mut(id.index())?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item=&Table> {
        self.tables.iter().filter_map(|t| t.as_ref())
    }

    /// Table for an already canonical type, if it exists.
    pub fn find(&self, type_ids: &[ComponentId]) -> Option<TableId> {
        self.by_type.get(type_ids).copied()
    }

    ///
    /// Canonicalizes `ids` (sort, dedup) and returns the matching table,
    /// creating it on first request. Every permutation of the same set maps
    /// to the same table.
    ///
    pub fn find_or_create(&mut self, components: &Components, ids: &[ComponentId]) -> TableId {
        let mut type_ids = ids.to_vec();
        type_ids.sort();
        type_ids.dedup();

        if let Some(id) = self.by_type.get(&type_ids) {
            return *id;
        }

        let id = TableId::new(self.tables.len());

        debug!("create table {:?} type={:?}", id, type_ids);

        let table = Table::new(id, type_ids.clone(), components, self.min_capacity);

        self.tables.push(Some(table));
        self.by_type.insert(type_ids, id);

        id
    }

    ///
    /// Table reached from `table` by adding `component`. Adding a component
    /// the table already has returns `table`.
    ///
    pub fn traverse_add(
        &mut self,
        components: &Components,
        table: TableId,
        component: ComponentId
    ) -> TableId {
        let src = self.table(table);

        if src.has(component) {
            return table;
        }

        if let Some(dst) = src.edges().get_add(component) {
            return dst;
        }

        let mut type_ids = src.type_ids().to_vec();
        if let Err(index) = type_ids.binary_search(&component) {
            type_ids.insert(index, component);
        }

        let dst = self.find_or_create(components, &type_ids);

        trace!("edge {:?} +{:?} -> {:?}", table, component, dst);

        self.table_mut(table).edges_mut().insert_add(component, dst);
        self.table_mut(dst).edges_mut().insert_remove(component, table);

        dst
    }

    ///
    /// Table reached from `table` by removing `component`. Removing a
    /// component the table lacks returns `table`.
    ///
    pub fn traverse_remove(
        &mut self,
        components: &Components,
        table: TableId,
        component: ComponentId
    ) -> TableId {
        let src = self.table(table);

        if ! src.has(component) {
            return table;
        }

        if let Some(dst) = src.edges().get_remove(component) {
            return dst;
        }

        let mut type_ids = src.type_ids().to_vec();
        if let Ok(index) = type_ids.binary_search(&component) {
            type_ids.remove(index);
        }

        let dst = self.find_or_create(components, &type_ids);

        trace!("edge {:?} -{:?} -> {:?}", table, component, dst);

        self.table_mut(table).edges_mut().insert_remove(component, dst);
        self.table_mut(dst).edges_mut().insert_add(component, table);

        dst
    }

    ///
    /// Table for a comma-separated list of component names, such as
    /// `"Position, Velocity"`. On error no table is created.
    ///
    pub fn from_str(
        &mut self,
        components: &Components,
        expr: &str
    ) -> Result<TableId, ParseError> {
        let ids = type_expr::parse(components, expr)?;

        Ok(self.find_or_create(components, &ids))
    }

    ///
    /// Destroys an empty table. Edges into and out of the table are
    /// dropped; the id is not reused.
    ///
    pub fn destroy(&mut self, id: TableId) -> Result<()> {
        if id == TableId::ROOT {
            return Err(Error::RootTable);
        }

        let table = match self.get(id) {
            Some(table) => table,
            None => return Err(Error::UnknownTable(id)),
        };

        if ! table.is_empty() {
            return Err(Error::TableNotEmpty(id, table.count()));
        }

        debug!("destroy table {:?} type={:?}", id, table.type_ids());

        if let Some(table) = self.tables[id.index()].take() {
            self.by_type.remove(table.type_ids());
        }

        for table in self.tables.iter_mut().flatten() {
            table.edges_mut().forget(id);
        }

        Ok(())
    }

    ///
    /// Two distinct tables borrowed mutably, for moving rows between them.
    ///
    pub(crate) fn pair_mut(&mut self, a: TableId, b: TableId) -> (&mut Table, &mut Table) {
        assert_ne!(a, b);

        if a.index() < b.index() {
            let (lo, hi) = self.tables.split_at_mut(b.index());

            (unwrap_table(&mut lo[a.index()], a), unwrap_table(&mut hi[0], b))
        } else {
            let (lo, hi) = self.tables.split_at_mut(a.index());

            (unwrap_table(&mut hi[0], a), unwrap_table(&mut lo[b.index()], b))
        }
    }

    pub(crate) fn table(&self, id: TableId) -> &Table {
        self.get(id).unwrap_or_else(|| panic!("unknown table {:?}", id))
    }

    pub(crate) fn table_mut(&mut self, id: TableId) -> &mut Table {
        self.get_mut(id).unwrap_or_else(|| panic!("unknown table {:?}", id))
    }
}

fn unwrap_table(table: &mut Option<Table>, id: TableId) -> &mut Table {
    table.as_mut().unwrap_or_else(|| panic!("unknown table {:?}", id))
}
