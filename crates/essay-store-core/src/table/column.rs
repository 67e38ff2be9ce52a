use core::fmt;
use std::ptr::{self, NonNull};
use std::{cmp, slice};
use std::alloc::Layout;

use crate::component::{ComponentId, ComponentInfo, Lifecycle};

///
/// Contiguous, type-erased array of fixed-size elements.
///
/// `ColumnData` only owns memory: dropping it frees the buffer without
/// running any destructor. Tables pair it with a component's `Lifecycle`
/// in `Column`. Callers build a `ColumnData` to bulk-load a table through
/// `Table::set_column`.
///
pub struct ColumnData {
    size: usize,
    align: usize,

    data: NonNull<u8>,

    len: usize,
    capacity: usize,
}

///
/// A table's column for one component: the storage plus the component's
/// lifecycle hooks. Dropping a column destroys its live elements.
///
pub(crate) struct Column {
    id: ComponentId,
    lifecycle: Lifecycle,
    data: ColumnData,
}

impl ColumnData {
    pub fn new(size: usize, align: usize) -> Self {
        assert!(align.is_power_of_two());

        Self {
            size,
            align,
            data: dangling_data(align),
            len: 0,
            capacity: 0,
        }
    }

    pub fn with_capacity(size: usize, align: usize, capacity: usize) -> Self {
        let mut data = Self::new(size, align);

        if capacity > 0 {
            data.extend(capacity);
        }

        data
    }

    /// Copies `bytes` into a new column of `bytes.len() / size` elements.
    pub fn from_bytes(size: usize, align: usize, bytes: &[u8]) -> Self {
        assert!(size > 0 && bytes.len() % size == 0);

        let len = bytes.len() / size;
        let mut data = Self::with_capacity(size, align, len);

        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), data.data.as_ptr(), bytes.len());
            data.set_len(len);
        }

        data
    }

    /// Copies plain values into a new column.
    pub fn from_slice<T: Copy>(values: &[T]) -> Self {
        let size = std::mem::size_of::<T>();
        let mut data = Self::with_capacity(size, std::mem::align_of::<T>(), values.len());

        unsafe {
            ptr::copy_nonoverlapping(values.as_ptr(), data.data.as_ptr().cast::<T>(), values.len());
            data.set_len(values.len());
        }

        data
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
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_ptr()
    }

    ///
    /// The live elements as bytes.
    ///
    /// # Safety
    /// The elements must not contain uninitialized padding.
    ///
    pub unsafe fn as_bytes(&self) -> &[u8] {
        slice::from_raw_parts(self.data.as_ptr(), self.len * self.size)
    }

    ///
    /// # Safety
    /// The column must hold `len` initialized values of `T`.
    ///
    pub unsafe fn as_slice<T>(&self) -> &[T] {
        debug_assert_eq!(std::mem::size_of::<T>(), self.size);
        debug_assert!(std::mem::align_of::<T>() <= self.align);

        slice::from_raw_parts(self.data.as_ptr().cast::<T>(), self.len)
    }

    ///
    /// # Safety
    /// Same as `as_slice`.
    ///
    pub unsafe fn as_mut_slice<T>(&mut self) -> &mut [T] {
        debug_assert_eq!(std::mem::size_of::<T>(), self.size);
        debug_assert!(std::mem::align_of::<T>() <= self.align);

        slice::from_raw_parts_mut(self.data.as_ptr().cast::<T>(), self.len)
    }

    /// Appends one element given as raw bytes.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        assert_eq!(bytes.len(), self.size);

        self.reserve(1);

        unsafe {
            let dst = self.ptr_at(self.len);
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, self.size);
        }

        self.len += 1;
    }

    ///
    /// Address of element `index`. Valid until the next reallocation.
    ///
    #[inline]
    pub(crate) fn ptr_at(&self, index: usize) -> *mut u8 {
        debug_assert!(index <= self.capacity);

        unsafe { self.data.as_ptr().add(self.offset(index)) }
    }

    #[inline]
    fn offset(&self, index: usize) -> usize {
        self.size * index
    }

    #[inline]
    pub(crate) unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.capacity);

        self.len = len;
    }

    /// Grows the buffer by doubling until `additional` more elements fit.
    pub fn reserve(&mut self, additional: usize) {
        let avail = self.capacity - self.len;

        if avail < additional {
            let new_capacity = cmp::max(self.capacity * 2, self.len + additional);

            self.extend(cmp::max(new_capacity, 4));
        }
    }

    pub(crate) fn reserve_exact(&mut self, capacity: usize) {
        if self.capacity < capacity {
            self.extend(capacity);
        }
    }

    fn extend(&mut self, new_capacity: usize) {
        assert!(self.capacity < new_capacity);

        if self.size == 0 {
            self.capacity = new_capacity;
            return;
        }

        let layout = self.array_layout(new_capacity);

        let data = if self.capacity == 0 {
            unsafe {
                std::alloc::alloc(layout)
            }
        } else {
            unsafe {
                std::alloc::realloc(
                    self.data.as_ptr(),
                    self.array_layout(self.capacity),
                    layout.size(),
                 )
            }
        };

        self.data = match NonNull::new(data) {
            Some(data) => data,
            None => std::alloc::handle_alloc_error(layout),
        };
        self.capacity = new_capacity;
    }

    fn array_layout(&self, n: usize) -> Layout {
        let size = n.checked_mul(self.size)
            .unwrap_or_else(|| panic!("column capacity overflow for {} elements", n));

        match Layout::from_size_align(size, self.align) {
            Ok(layout) => layout,
            Err(err) => panic!("invalid column layout: {}", err),
        }
    }
}

impl Drop for ColumnData {
    fn drop(&mut self) {
        if self.capacity > 0 && self.size > 0 {
            unsafe {
                std::alloc::dealloc(self.data.as_ptr(), self.array_layout(self.capacity));
            }
        }
    }
}

// Elements are only reachable through the owning table.
unsafe impl Send for ColumnData {}
unsafe impl Sync for ColumnData {}

impl fmt::Debug for ColumnData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnData")
         .field("size", &self.size)
         .field("align", &self.align)
         .field("len", &self.len)
         .field("capacity", &self.capacity)
         .finish()
    }
}

impl Column {
    pub(crate) fn new(info: &ComponentInfo) -> Self {
        Self {
            id: info.id(),
            lifecycle: *info.lifecycle(),
            data: ColumnData::new(info.size(), info.align()),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> ComponentId {
        self.id
    }

    #[inline]
    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[inline]
    pub(crate) fn size(&self) -> usize {
        self.data.size
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.data.len
    }

    #[inline]
    pub(crate) fn data(&self) -> &ColumnData {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut ColumnData {
        &mut self.data
    }

    #[inline]
    pub(crate) fn ptr_at(&self, row: usize) -> *mut u8 {
        self.data.ptr_at(row)
    }

    pub(crate) fn reserve_exact(&mut self, capacity: usize) {
        self.data.reserve_exact(capacity);
    }

    /// Appends `count` default-constructed elements. Capacity must already
    /// be reserved.
    pub(crate) fn push_default(&mut self, count: usize) {
        let len = self.data.len;

        debug_assert!(len + count <= self.data.capacity);

        unsafe {
            self.lifecycle.construct(self.data.ptr_at(len), self.data.size, count);
            self.data.set_len(len + count);
        }
    }

    ///
    /// Appends an element by relocating the bytes at `src`. The source is
    /// logically moved out and must not be destroyed by the caller.
    ///
    pub(crate) unsafe fn push_relocate(&mut self, src: *const u8) {
        let len = self.data.len;

        debug_assert!(len < self.data.capacity);

        ptr::copy_nonoverlapping(src, self.data.ptr_at(len), self.data.size);
        self.data.set_len(len + 1);
    }

    /// Destroys the element at `row` and fills the hole with the last one.
    pub(crate) fn swap_remove(&mut self, row: usize) {
        debug_assert!(row < self.data.len);

        unsafe {
            self.lifecycle.destruct(self.data.ptr_at(row), 1);
            self.swap_remove_forget(row);
        }
    }

    ///
    /// Fills the hole at `row` with the last element without destroying
    /// the value at `row`.
    ///
    /// # Safety
    /// The value at `row` must already have been moved out or destroyed.
    ///
    pub(crate) unsafe fn swap_remove_forget(&mut self, row: usize) {
        let last = self.data.len - 1;

        if row != last {
            ptr::copy_nonoverlapping(
                self.data.ptr_at(last),
                self.data.ptr_at(row),
                self.data.size
            );
        }

        self.data.set_len(last);
    }

    pub(crate) fn replace(&mut self, data: ColumnData) -> ColumnData {
        std::mem::replace(&mut self.data, data)
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        let len = self.data.len;

        if len > 0 {
            unsafe {
                self.lifecycle.destruct(self.data.ptr_at(0), len);
                self.data.set_len(0);
            }
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
         .field("id", &self.id)
         .field("size", &self.data.size)
         .field("len", &self.data.len)
         .finish()
    }
}

fn dangling_data(align: usize) -> NonNull<u8> {
    assert!(align.is_power_of_two());

    unsafe { NonNull::new_unchecked(align as *mut u8) }
}
