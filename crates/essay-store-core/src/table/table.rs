use std::{cmp, collections::HashMap, ptr};

use fixedbitset::FixedBitSet;

use crate::{
    component::{ComponentId, Components},
    entity::Entity,
    error::{Error, Result},
};

use super::column::{Column, ColumnData};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u32);

impl TableId {
    pub const ROOT: TableId = TableId(0);

    pub fn new(index: usize) -> Self {
        TableId(index as u32)
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

///
/// Cached one-component transitions out of a table.
///
#[derive(Debug, Default)]
pub struct Edges {
    add: HashMap<ComponentId, TableId>,
    remove: HashMap<ComponentId, TableId>,
}

impl Edges {
    #[inline]
    pub fn get_add(&self, id: ComponentId) -> Option<TableId> {
        self.add.get(&id).copied()
    }

    #[inline]
    pub fn get_remove(&self, id: ComponentId) -> Option<TableId> {
        self.remove.get(&id).copied()
    }

    pub(crate) fn insert_add(&mut self, id: ComponentId, table: TableId) {
        self.add.insert(id, table);
    }

    pub(crate) fn insert_remove(&mut self, id: ComponentId, table: TableId) {
        self.remove.insert(id, table);
    }

    pub(crate) fn forget(&mut self, table: TableId) {
        self.add.retain(|_, target| *target != table);
        self.remove.retain(|_, target| *target != table);
    }

    pub fn len(&self) -> usize {
        self.add.len() + self.remove.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

///
/// Columnar storage for every entity sharing one component set.
///
/// The table's type is its sorted, duplicate-free component list. Each
/// non-tag component has a column, in the same ascending order. All columns
/// hold exactly `count()` elements.
///
pub struct Table {
    id: TableId,

    type_ids: Vec<ComponentId>,
    bits: FixedBitSet,

    columns: Vec<Column>,
    type_to_column: Vec<Option<usize>>,

    entities: Vec<Option<Entity>>,
    capacity: usize,
    min_capacity: usize,

    edges: Edges,
}

impl Table {
    pub(crate) fn new(
        id: TableId,
        type_ids: Vec<ComponentId>,
        components: &Components,
        min_capacity: usize,
    ) -> Self {
        debug_assert!(type_ids.windows(2).all(|w| w[0] < w[1]), "unsorted type {:?}", type_ids);

        let mut bits = FixedBitSet::with_capacity(components.len());
        let mut columns = Vec::new();
        let mut type_to_column = Vec::with_capacity(type_ids.len());

        for id in &type_ids {
            let info = components.info(*id);

            bits.insert(id.index());

            if info.is_tag() {
                type_to_column.push(None);
            } else {
                type_to_column.push(Some(columns.len()));
                columns.push(Column::new(info));
            }
        }

        Self {
            id,
            type_ids,
            bits,
            columns,
            type_to_column,
            entities: Vec::new(),
            capacity: 0,
            min_capacity: cmp::max(min_capacity, 1),
            edges: Edges::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> TableId {
        self.id
    }

    /// The sorted component ids of the table.
    #[inline]
    pub fn type_ids(&self) -> &[ComponentId] {
        &self.type_ids
    }

    #[inline]
    pub fn has(&self, id: ComponentId) -> bool {
        self.bits.contains(id.index())
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn edges(&self) -> &Edges {
        &self.edges
    }

    #[inline]
    pub(crate) fn edges_mut(&mut self) -> &mut Edges {
        &mut self.edges
    }

    /// Entity stored at `row`, if the row was inserted for an entity.
    #[inline]
    pub fn entity(&self, row: usize) -> Option<Entity> {
        self.entities.get(row).copied().flatten()
    }

    pub fn entities(&self) -> &[Option<Entity>] {
        &self.entities
    }

    ///
    /// Column index of `id`, or `None` when the table lacks the component
    /// or the component is a tag. Indices are only valid for this table.
    ///
    pub fn find_column(&self, id: ComponentId) -> Option<usize> {
        if ! self.has(id) {
            return None;
        }

        let index = self.type_ids.binary_search(&id).ok()?;

        self.type_to_column[index]
    }

    /// Component stored in column `column`.
    #[inline]
    pub fn column_id(&self, column: usize) -> ComponentId {
        self.columns[column].id()
    }

    ///
    /// Raw storage of a column. Pointers into it are invalidated by the next
    /// insert, remove or move on this table.
    ///
    #[inline]
    pub fn get_column(&self, column: usize) -> &ColumnData {
        self.columns[column].data()
    }

    ///
    /// # Safety
    /// The caller must keep the column's length equal to `count()` and its
    /// elements valid for the component.
    ///
    #[inline]
    pub unsafe fn get_column_mut(&mut self, column: usize) -> &mut ColumnData {
        self.columns[column].data_mut()
    }

    ///
    /// Replaces the storage of `column` with `data` and hands the previous
    /// storage back to the caller, who should release it with
    /// `delete_column`.
    ///
    /// # Safety
    /// `data` must have the column's element size and alignment, hold
    /// `count()` valid elements of the component, and not be shared with
    /// another table.
    ///
    pub unsafe fn set_column(&mut self, column: usize, mut data: ColumnData) -> ColumnData {
        debug_assert!(column < self.columns.len(), "column {} out of range", column);

        // later inserts rely on every column holding the table's capacity
        data.reserve_exact(self.capacity);

        let col = &mut self.columns[column];

        debug_assert_eq!(col.size(), data.size(), "column element size mismatch");
        debug_assert_eq!(col.data().align(), data.align(), "column alignment mismatch");
        debug_assert_eq!(data.len(), col.len(), "column length mismatch");

        col.replace(data)
    }

    ///
    /// Checked `set_column`, only for components without lifecycle hooks so
    /// any bytes are valid values.
    ///
    pub fn try_set_column(&mut self, column: usize, data: ColumnData) -> Result<ColumnData> {
        self.check_column(column)?;

        let col = &self.columns[column];

        if ! col.lifecycle().is_pod() {
            return Err(Error::NotPod(col.id()));
        }

        if col.size() != data.size() || col.data().align() != data.align() {
            return Err(Error::LayoutMismatch {
                size: col.size(),
                align: col.data().align(),
                found_size: data.size(),
                found_align: data.align(),
            });
        }

        if data.len() != self.count() {
            return Err(Error::LengthMismatch {
                count: self.count(),
                found: data.len(),
            });
        }

        Ok(unsafe { self.set_column(column, data) })
    }

    ///
    /// Releases column storage, running this table's destructor for
    /// `column` on every element of `data`, wherever `data` came from.
    ///
    /// # Safety
    /// `data` must hold valid elements of the column's component and must
    /// not be in use by any table.
    ///
    pub unsafe fn delete_column(&self, column: usize, mut data: ColumnData) {
        let col = &self.columns[column];

        debug_assert_eq!(col.size(), data.size(), "column element size mismatch");

        let len = data.len();

        if len > 0 {
            col.lifecycle().destruct(data.as_mut_ptr(), len);
            data.set_len(0);
        }
    }

    fn check_column(&self, column: usize) -> Result<()> {
        if column < self.columns.len() {
            Ok(())
        } else {
            Err(Error::ColumnOutOfRange { column, len: self.columns.len() })
        }
    }

    fn check_rows(&self, row: usize, count: usize) -> Result<()> {
        match row.checked_add(count) {
            Some(end) if end <= self.count() => Ok(()),
            Some(end) => Err(Error::RowOutOfRange { row: end, count: self.count() }),
            None => Err(Error::RowOutOfRange { row, count: self.count() }),
        }
    }

    //
    // rows
    //

    fn reserve(&mut self, additional: usize) {
        let needed = self.count() + additional;

        if needed <= self.capacity {
            return;
        }

        let capacity = cmp::max(cmp::max(self.capacity * 2, needed), self.min_capacity);

        for column in &mut self.columns {
            column.reserve_exact(capacity);
        }

        self.entities.reserve_exact(capacity - self.entities.len());
        self.capacity = capacity;
    }

    ///
    /// Appends a default-constructed row and returns its index. Growing the
    /// table invalidates column pointers fetched before the call.
    ///
    pub(crate) fn insert(&mut self, entity: Option<Entity>) -> usize {
        self.reserve(1);

        for column in &mut self.columns {
            column.push_default(1);
        }

        let row = self.entities.len();
        self.entities.push(entity);

        row
    }

    /// Appends `count` anonymous default-constructed rows.
    pub(crate) fn insert_n(&mut self, count: usize) -> usize {
        self.reserve(count);

        for column in &mut self.columns {
            column.push_default(count);
        }

        let row = self.entities.len();
        self.entities.resize(row + count, None);

        row
    }

    ///
    /// Destroys `row`, moving the last row into its slot. Returns the entity
    /// that was relocated, whose record must be updated to `row`.
    ///
    pub(crate) fn remove_row(&mut self, row: usize) -> Option<Entity> {
        debug_assert!(row < self.count(), "row {} out of range", row);

        for column in &mut self.columns {
            column.swap_remove(row);
        }

        self.swap_remove_entity(row)
    }

    fn swap_remove_entity(&mut self, row: usize) -> Option<Entity> {
        self.entities.swap_remove(row);

        if row < self.entities.len() {
            self.entities[row]
        } else {
            None
        }
    }

    ///
    /// Moves `row` of this table to the end of `dst`. Components shared with
    /// `dst` are relocated, components only in `dst` are default-constructed
    /// and components only in this table are destroyed.
    ///
    /// Returns the new row in `dst` and the entity relocated within this
    /// table to fill the hole.
    ///
    pub(crate) fn move_row(
        &mut self,
        row: usize,
        dst: &mut Table,
    ) -> (usize, Option<Entity>) {
        debug_assert!(row < self.count(), "row {} out of range", row);
        debug_assert_ne!(self.id, dst.id);

        dst.reserve(1);

        for column in &mut dst.columns {
            match self.find_column(column.id()) {
                Some(src) => unsafe {
                    column.push_relocate(self.columns[src].ptr_at(row));
                },
                None => column.push_default(1),
            }
        }

        for column in &mut self.columns {
            if dst.has(column.id()) {
                unsafe { column.swap_remove_forget(row); }
            } else {
                column.swap_remove(row);
            }
        }

        let entity = self.entities[row];
        let dst_row = dst.entities.len();
        dst.entities.push(entity);

        (dst_row, self.swap_remove_entity(row))
    }

    //
    // record access
    //

    ///
    /// Copies `count` values from `value` into `column` starting at `row`,
    /// using the component's copy hook, or a byte copy without one.
    ///
    /// # Safety
    /// `row + count <= count()`, `size` is the column's element size and
    /// `value` points to `count` valid values of the component.
    ///
    pub unsafe fn copy_to(
        &mut self,
        row: usize,
        column: usize,
        size: usize,
        value: *const u8,
        count: usize
    ) {
        let col = self.record_column(row, column, size, count);

        debug_assert!(
            col.lifecycle().copy_assign.is_some() || col.lifecycle().dtor.is_none(),
            "component {:?} has a destructor but no copy hook", col.id()
        );

        col.lifecycle().copy(col.ptr_at(row), value, size, count);
    }

    ///
    /// Byte copy of `count` values into `column` starting at `row`.
    ///
    /// # Safety
    /// Same as `copy_to`, and the component must have no lifecycle hooks
    /// besides construction.
    ///
    pub unsafe fn copy_pod_to(
        &mut self,
        row: usize,
        column: usize,
        size: usize,
        value: *const u8,
        count: usize
    ) {
        let col = self.record_column(row, column, size, count);

        debug_assert!(col.lifecycle().is_pod(), "component {:?} is not plain data", col.id());

        ptr::copy_nonoverlapping(value, col.ptr_at(row), size * count);
    }

    ///
    /// Moves `count` values from `value` into `column` starting at `row`,
    /// using the component's move hook, or a byte copy without one.
    ///
    /// # Safety
    /// Same as `copy_to`. The values at `value` are consumed: the caller must
    /// not drop them afterwards.
    ///
    pub unsafe fn move_to(
        &mut self,
        row: usize,
        column: usize,
        size: usize,
        value: *mut u8,
        count: usize
    ) {
        let col = self.record_column(row, column, size, count);

        col.lifecycle().move_to(col.ptr_at(row), value, size, count);
    }

    /// Checked byte copy for plain-data components.
    pub fn try_copy_pod_to(&mut self, row: usize, column: usize, bytes: &[u8]) -> Result<()> {
        self.check_column(column)?;

        let col = &self.columns[column];

        if ! col.lifecycle().is_pod() {
            return Err(Error::NotPod(col.id()));
        }

        let size = col.size();

        if size == 0 || bytes.len() % size != 0 {
            return Err(Error::LayoutMismatch {
                size,
                align: col.data().align(),
                found_size: bytes.len(),
                found_align: 1,
            });
        }

        let count = bytes.len() / size;
        self.check_rows(row, count)?;

        unsafe {
            self.copy_pod_to(row, column, size, bytes.as_ptr(), count);
        }

        Ok(())
    }

    #[inline]
    fn record_column(&mut self, row: usize, column: usize, size: usize, count: usize) -> &Column {
        debug_assert!(column < self.columns.len(), "column {} out of range", column);
        debug_assert!(row + count <= self.count(), "row {} + {} out of range", row, count);

        let col = &self.columns[column];

        debug_assert_eq!(col.size(), size, "element size mismatch for {:?}", col.id());

        col
    }

    #[inline]
    pub(crate) fn ptr(&self, row: usize, column: usize) -> *mut u8 {
        debug_assert!(row < self.count());

        self.columns[column].ptr_at(row)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        component::{Component, Components, ComponentId},
        entity::Entity,
        error::Error,
        util::test::TestValues,
    };

    use super::{Table, TableId, ColumnData};

    fn table(components: &Components, ids: &[ComponentId]) -> Table {
        let mut ids = ids.to_vec();
        ids.sort();
        Table::new(TableId::new(1), ids, components, 4)
    }

    #[test]
    fn find_column_skips_tags() {
        let mut components = Components::new();
        let a = components.register::<TestA>();
        let tag = components.register::<TestTag>();
        let b = components.register::<TestB>();
        let missing = components.register::<TestDrop>();

        let table = table(&components, &[b, tag, a]);

        assert_eq!(table.type_ids(), &[a, tag, b]);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.find_column(a), Some(0));
        assert_eq!(table.find_column(tag), None);
        assert!(table.has(tag));
        assert_eq!(table.find_column(b), Some(1));
        assert_eq!(table.find_column(missing), None);
        assert!(! table.has(missing));
    }

    #[test]
    fn insert_grows_by_doubling() {
        let mut components = Components::new();
        let a = components.register::<TestA>();

        let mut table = table(&components, &[a]);

        assert_eq!(table.capacity(), 0);

        for i in 0..5 {
            assert_eq!(table.insert(Some(Entity::new(i, 0))), i as usize);
        }

        assert_eq!(table.count(), 5);
        assert_eq!(table.capacity(), 8);
        assert_eq!(table.get_column(0).len(), 5);

        unsafe {
            assert!(table.get_column(0).as_slice::<TestA>().iter().all(|v| *v == TestA(7)));
        }
    }

    #[test]
    fn remove_row_swaps_last() {
        let mut components = Components::new();
        let a = components.register::<TestA>();

        let mut table = table(&components, &[a]);

        for i in 0..3 {
            let row = table.insert(Some(Entity::new(i, 0)));
            unsafe {
                let value = TestA(i as u16);
                table.copy_pod_to(row, 0, 2, (&value as *const TestA).cast(), 1);
            }
        }

        assert_eq!(table.remove_row(0), Some(Entity::new(2, 0)));
        assert_eq!(table.count(), 2);
        assert_eq!(table.entity(0), Some(Entity::new(2, 0)));

        unsafe {
            assert_eq!(table.get_column(0).as_slice::<TestA>(), &[TestA(2), TestA(1)]);
        }

        assert_eq!(table.remove_row(1), None);
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn move_row_between_tables() {
        let mut components = Components::new();
        let a = components.register::<TestA>();
        let b = components.register::<TestB>();
        let d = components.register::<TestDrop>();

        let mut values = TestValues::new();

        let mut src = Table::new(TableId::new(1), vec![a, d], &components, 4);
        let mut dst = Table::new(TableId::new(2), vec![a, b], &components, 4);

        let e0 = Entity::new(0, 0);
        let e1 = Entity::new(1, 0);

        for (i, e) in [e0, e1].iter().enumerate() {
            let row = src.insert(Some(*e));
            unsafe {
                let value = TestA(10 + i as u16);
                src.copy_pod_to(row, 0, 2, (&value as *const TestA).cast(), 1);

                let mut value = std::mem::ManuallyDrop::new(TestDrop(Some(values.clone()), i));
                src.move_to(row, 1, std::mem::size_of::<TestDrop>(), (&mut *value as *mut TestDrop).cast(), 1);
            }
        }

        let (row, moved) = src.move_row(0, &mut dst);

        assert_eq!(row, 0);
        assert_eq!(moved, Some(e1));
        assert_eq!(values.take(), "drop[0]");

        assert_eq!(src.count(), 1);
        assert_eq!(dst.count(), 1);
        assert_eq!(dst.entity(0), Some(e0));

        unsafe {
            assert_eq!(dst.get_column(0).as_slice::<TestA>(), &[TestA(10)]);
            assert_eq!(dst.get_column(1).as_slice::<TestB>(), &[TestB(0.5)]);
            assert_eq!(src.get_column(0).as_slice::<TestA>(), &[TestA(11)]);
        }

        drop(src);
        assert_eq!(values.take(), "drop[1]");
    }

    #[test]
    fn set_column_round_trip() {
        let mut components = Components::new();
        let a = components.register::<TestA>();

        let mut table = table(&components, &[a]);
        table.insert_n(3);

        let data = ColumnData::from_slice(&[TestA(1), TestA(2), TestA(3)]);
        let bytes = unsafe { data.as_bytes().to_vec() };

        let old = table.try_set_column(0, data).unwrap();
        assert_eq!(old.len(), 3);

        unsafe {
            assert_eq!(table.get_column(0).as_bytes(), &bytes[..]);
            table.delete_column(0, old);
        }
    }

    #[test]
    fn insert_after_set_column() {
        let mut components = Components::new();
        let a = components.register::<TestA>();

        let mut table = table(&components, &[a]);
        table.insert_n(3);
        assert_eq!(table.capacity(), 4);

        let data = ColumnData::from_slice(&[TestA(1), TestA(2), TestA(3)]);
        assert_eq!(data.capacity(), 3);

        let old = table.try_set_column(0, data).unwrap();
        unsafe { table.delete_column(0, old); }

        assert!(table.get_column(0).capacity() >= table.capacity());

        for i in 0..6 {
            table.insert(Some(Entity::new(i, 0)));
        }

        assert_eq!(table.count(), 9);

        unsafe {
            let values = table.get_column(0).as_slice::<TestA>();
            assert_eq!(&values[..4], &[TestA(1), TestA(2), TestA(3), TestA(7)]);
            assert_eq!(values.len(), 9);
        }
    }

    #[test]
    fn try_set_column_checks() {
        let mut components = Components::new();
        let a = components.register::<TestA>();
        let d = components.register::<TestDrop>();

        let mut table = table(&components, &[a, d]);
        table.insert_n(2);

        assert!(matches!(
            table.try_set_column(0, ColumnData::from_slice(&[1u32, 2])),
            Err(Error::LayoutMismatch { .. })
        ));

        assert!(matches!(
            table.try_set_column(0, ColumnData::from_slice(&[TestA(1)])),
            Err(Error::LengthMismatch { count: 2, found: 1 })
        ));

        assert!(matches!(
            table.try_set_column(1, ColumnData::new(std::mem::size_of::<TestDrop>(), 8)),
            Err(Error::NotPod(_))
        ));

        assert!(matches!(
            table.try_set_column(2, ColumnData::new(2, 2)),
            Err(Error::ColumnOutOfRange { column: 2, len: 2 })
        ));
    }

    #[test]
    fn delete_column_runs_destructor() {
        let mut components = Components::new();
        let d = components.register::<TestDrop>();

        let mut values = TestValues::new();

        let table = table(&components, &[d]);

        let mut data = ColumnData::new(std::mem::size_of::<TestDrop>(), std::mem::align_of::<TestDrop>());

        for i in 0..2 {
            let value = std::mem::ManuallyDrop::new(TestDrop(Some(values.clone()), i));
            let bytes = unsafe {
                std::slice::from_raw_parts(
                    (&*value as *const TestDrop).cast::<u8>(),
                    std::mem::size_of::<TestDrop>()
                )
            };
            data.push_bytes(bytes);
        }

        unsafe {
            table.delete_column(0, data);
        }

        assert_eq!(values.take(), "drop[0], drop[1]");
    }

    #[test]
    fn try_copy_pod_to() {
        let mut components = Components::new();
        let a = components.register::<TestA>();

        let mut table = table(&components, &[a]);
        table.insert_n(2);

        let bytes: Vec<u8> = [5u16, 6u16].iter().flat_map(|v| v.to_ne_bytes()).collect();

        table.try_copy_pod_to(0, 0, &bytes).unwrap();

        unsafe {
            assert_eq!(table.get_column(0).as_slice::<TestA>(), &[TestA(5), TestA(6)]);
        }

        assert!(matches!(
            table.try_copy_pod_to(1, 0, &bytes),
            Err(Error::RowOutOfRange { .. })
        ));
        assert!(table.try_copy_pod_to(0, 0, &[1, 2, 3]).is_err());

        assert!(matches!(
            table.try_copy_pod_to(usize::MAX, 0, &bytes),
            Err(Error::RowOutOfRange { row: usize::MAX, count: 2 })
        ));
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct TestA(u16);

    impl Default for TestA {
        fn default() -> Self {
            TestA(7)
        }
    }

    impl Component for TestA {}

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct TestB(f32);

    impl Default for TestB {
        fn default() -> Self {
            TestB(0.5)
        }
    }

    impl Component for TestB {}

    #[derive(Default)]
    struct TestTag;

    impl Component for TestTag {}

    #[derive(Default)]
    struct TestDrop(Option<TestValues>, usize);

    impl Component for TestDrop {}

    impl Drop for TestDrop {
        fn drop(&mut self) {
            if let Some(values) = &mut self.0 {
                values.push(format!("drop[{:?}]", self.1));
            }
        }
    }
}
