use crate::{error::{Error, Result}, table::TableId};

use super::Entity;

const PAGE_BITS: usize = 10;
const PAGE_SIZE: usize = 1 << PAGE_BITS;
const PAGE_MASK: usize = PAGE_SIZE - 1;

///
/// Location of an entity: the table it lives in and its row.
///
/// `table` is `None` while the entity is alive but holds no components.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    table: Option<TableId>,
    row: usize,
}

impl Record {
    pub const EMPTY: Record = Record { table: None, row: 0 };

    pub fn new(table: TableId, row: usize) -> Self {
        Self {
            table: Some(table),
            row,
        }
    }

    #[inline]
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    #[inline]
    pub fn is_located(&self) -> bool {
        self.table.is_some()
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    alive: bool,
    record: Record,
}

impl Slot {
    const DEAD: Slot = Slot {
        generation: 0,
        alive: false,
        record: Record::EMPTY,
    };
}

///
/// Maps entities to their records.
///
/// Slots are stored in fixed-size pages that are never reallocated, so a
/// record's address stays the same for the lifetime of the index even while
/// its contents change.
///
pub struct EntityIndex {
    pages: Vec<Option<Box<[Slot]>>>,

    free_list: Vec<u32>,
    next: u32,

    alive: usize,
}

impl EntityIndex {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            free_list: Vec::new(),
            next: 0,
            alive: 0,
        }
    }

    /// Number of alive entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.alive
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    ///
    /// Allocates an entity id, recycling a freed slot when one is
    /// available. The new entity is alive and has no location.
    ///
    pub fn new_id(&mut self) -> Entity {
        // slots revived by `set` may still sit in the free list or ahead of `next`
        let index = loop {
            let index = match self.free_list.pop() {
                Some(index) => index,
                None => {
                    let index = self.next;
                    self.next = self.next.checked_add(1)
                        .unwrap_or_else(|| panic!("entity index space exhausted"));
                    index
                }
            };

            if ! self.slot(index as usize).map_or(false, |slot| slot.alive) {
                break index;
            }
        };

        let slot = self.ensure(index as usize);

        debug_assert!(! slot.alive);

        slot.alive = true;
        slot.record = Record::EMPTY;

        let entity = Entity::new(index, slot.generation);

        self.alive += 1;

        entity
    }

    pub fn find(&self, entity: Entity) -> Option<&Record> {
        let slot = self.slot(entity.index())?;

        if slot.alive && slot.generation == entity.generation() {
            Some(&slot.record)
        } else {
            None
        }
    }

    pub fn find_mut(&mut self, entity: Entity) -> Option<&mut Record> {
        let slot = self.slot_mut(entity.index())?;

        if slot.alive && slot.generation == entity.generation() {
            Some(&mut slot.record)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.find(entity).is_some()
    }

    ///
    /// Installs or updates the location of `entity`. A free slot becomes
    /// alive when `entity` carries the slot's current generation; ids
    /// invalidated by `remove` are rejected.
    ///
    pub fn set(&mut self, entity: Entity, table: TableId, row: usize) -> Result<()> {
        let generation = self.slot(entity.index()).map_or(0, |slot| slot.generation);

        if generation != entity.generation() {
            return Err(Error::StaleEntity(entity));
        }

        let slot = self.ensure(entity.index());
        let revived = ! slot.alive;

        slot.alive = true;
        slot.record = Record::new(table, row);

        if revived {
            self.alive += 1;
        }

        Ok(())
    }

    ///
    /// Updates the location of an entity known to be alive, as after a row
    /// relocation.
    ///
    pub(crate) fn relocate(&mut self, entity: Entity, table: TableId, row: usize) {
        match self.find_mut(entity) {
            Some(record) => *record = Record::new(table, row),
            None => debug_assert!(false, "relocating dead entity {}", entity),
        }
    }

    /// Clears the location of an alive entity, leaving it alive.
    pub(crate) fn clear(&mut self, entity: Entity) {
        if let Some(record) = self.find_mut(entity) {
            *record = Record::EMPTY;
        }
    }

    ///
    /// Invalidates `entity`. Its generation is bumped so stale copies of the
    /// id no longer resolve, and the slot is recycled by `new_id`.
    ///
    pub fn remove(&mut self, entity: Entity) -> Option<Record> {
        let slot = self.slot_mut(entity.index())?;

        if ! slot.alive || slot.generation != entity.generation() {
            return None;
        }

        let record = slot.record;

        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.record = Record::EMPTY;

        self.free_list.push(entity.index() as u32);
        self.alive -= 1;

        Some(record)
    }

    fn slot(&self, index: usize) -> Option<&Slot> {
        let page = self.pages.get(index >> PAGE_BITS)?.as_ref()?;

        Some(&page[index & PAGE_MASK])
    }

    fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        let page = self.pages.get_mut(index >> PAGE_BITS)?.as_mut()?;

        Some(&mut page[index & PAGE_MASK])
    }

    fn ensure(&mut self, index: usize) -> &mut Slot {
        let page_index = index >> PAGE_BITS;

        if self.pages.len() <= page_index {
            self.pages.resize_with(page_index + 1, || None);
        }

        let page = self.pages[page_index]
            .get_or_insert_with(|| vec![Slot::DEAD; PAGE_SIZE].into_boxed_slice());

        &mut page[index & PAGE_MASK]
    }
}

impl Default for EntityIndex {
    fn default() -> Self {
        Self::new()
    }
}
