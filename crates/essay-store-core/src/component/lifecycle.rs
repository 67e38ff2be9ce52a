use std::{mem, ptr};

/// Default-constructs `count` elements starting at `dst`.
pub type CtorFn = unsafe fn(dst: *mut u8, count: usize);

/// Destroys `count` live elements starting at `ptr`.
pub type DtorFn = unsafe fn(ptr: *mut u8, count: usize);

/// Copy-assigns `count` elements from `src` onto the live elements at `dst`.
pub type CopyFn = unsafe fn(dst: *mut u8, src: *const u8, count: usize);

/// Move-assigns `count` elements from `src` onto the live elements at `dst`.
/// The source elements are consumed and must not be destroyed again.
pub type MoveFn = unsafe fn(dst: *mut u8, src: *mut u8, count: usize);

///
/// Type-erased lifecycle of a component.
///
/// Each hook is optional. A missing hook falls back to the plain-bytes
/// behavior: zero-fill for construction, nothing for destruction and a
/// byte copy for copy and move.
///
#[derive(Clone, Copy, Debug, Default)]
pub struct Lifecycle {
    pub ctor: Option<CtorFn>,
    pub dtor: Option<DtorFn>,
    pub copy_assign: Option<CopyFn>,
    pub move_assign: Option<MoveFn>,
}

impl Lifecycle {
    pub const fn empty() -> Self {
        Self {
            ctor: None,
            dtor: None,
            copy_assign: None,
            move_assign: None,
        }
    }

    /// Hooks for a Rust type: `Default` construction, `Drop`, and a
    /// move-assign that drops the overwritten value.
    pub fn of<T: Default + 'static>() -> Self {
        let needs_drop = mem::needs_drop::<T>();

        Self {
            ctor: Some(ctor_default::<T>),
            dtor: if needs_drop { Some(dtor_drop::<T>) } else { None },
            copy_assign: None,
            move_assign: if needs_drop { Some(move_assign::<T>) } else { None },
        }
    }

    /// Same as `of`, plus a copy-assign hook based on `Clone`.
    pub fn cloned<T: Clone + Default + 'static>() -> Self {
        Self {
            copy_assign: Some(copy_clone::<T>),
            ..Self::of::<T>()
        }
    }

    pub fn with_ctor(mut self, ctor: CtorFn) -> Self {
        self.ctor = Some(ctor);
        self
    }

    pub fn with_dtor(mut self, dtor: DtorFn) -> Self {
        self.dtor = Some(dtor);
        self
    }

    pub fn with_copy(mut self, copy: CopyFn) -> Self {
        self.copy_assign = Some(copy);
        self
    }

    pub fn with_move(mut self, move_assign: MoveFn) -> Self {
        self.move_assign = Some(move_assign);
        self
    }

    /// True when values can be copied, moved and discarded as plain bytes.
    #[inline]
    pub fn is_pod(&self) -> bool {
        self.dtor.is_none()
            && self.copy_assign.is_none()
            && self.move_assign.is_none()
    }

    ///
    /// Constructs `count` elements at `dst`.
    ///
    /// # Safety
    /// `dst` must be valid for `count * size` bytes of uninitialized storage.
    ///
    #[inline]
    pub unsafe fn construct(&self, dst: *mut u8, size: usize, count: usize) {
        match self.ctor {
            Some(ctor) => ctor(dst, count),
            None => ptr::write_bytes(dst, 0, size * count),
        }
    }

    ///
    /// Destroys `count` elements at `ptr`.
    ///
    /// # Safety
    /// `ptr` must point to `count` live elements of this component.
    ///
    #[inline]
    pub unsafe fn destruct(&self, ptr: *mut u8, count: usize) {
        if let Some(dtor) = self.dtor {
            dtor(ptr, count);
        }
    }

    ///
    /// # Safety
    /// `dst` and `src` must both point to `count` live, non-overlapping
    /// elements of this component.
    ///
    #[inline]
    pub unsafe fn copy(&self, dst: *mut u8, src: *const u8, size: usize, count: usize) {
        match self.copy_assign {
            Some(copy) => copy(dst, src, count),
            None => ptr::copy_nonoverlapping(src, dst, size * count),
        }
    }

    ///
    /// # Safety
    /// Same as `copy`. The source elements are consumed by the call.
    ///
    #[inline]
    pub unsafe fn move_to(&self, dst: *mut u8, src: *mut u8, size: usize, count: usize) {
        match self.move_assign {
            Some(move_assign) => move_assign(dst, src, count),
            None => ptr::copy_nonoverlapping(src, dst, size * count),
        }
    }
}

unsafe fn ctor_default<T: Default>(dst: *mut u8, count: usize) {
    let dst = dst.cast::<T>();

    for i in 0..count {
        dst.add(i).write(T::default());
    }
}

unsafe fn dtor_drop<T>(ptr: *mut u8, count: usize) {
    ptr::drop_in_place(ptr::slice_from_raw_parts_mut(ptr.cast::<T>(), count));
}

unsafe fn copy_clone<T: Clone>(dst: *mut u8, src: *const u8, count: usize) {
    let dst = dst.cast::<T>();
    let src = src.cast::<T>();

    for i in 0..count {
        (*dst.add(i)).clone_from(&*src.add(i));
    }
}

unsafe fn move_assign<T>(dst: *mut u8, src: *mut u8, count: usize) {
    let dst = dst.cast::<T>();
    let src = src.cast::<T>();

    for i in 0..count {
        *dst.add(i) = src.add(i).read();
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{ManuallyDrop, MaybeUninit};

    use crate::util::test::TestValues;

    use super::Lifecycle;

    #[test]
    fn pod_lifecycle() {
        let hooks = Lifecycle::of::<u32>();

        assert!(hooks.ctor.is_some());
        assert!(hooks.is_pod());

        assert!(Lifecycle::empty().is_pod());
        assert!(! Lifecycle::of::<String>().is_pod());
    }

    #[test]
    fn construct_without_ctor_zero_fills() {
        let mut data = [0xffu8; 8];

        unsafe {
            Lifecycle::empty().construct(data.as_mut_ptr(), 4, 2);
        }

        assert_eq!(data, [0; 8]);
    }

    #[test]
    fn move_assign_drops_target_once() {
        let values = TestValues::new();
        let hooks = Lifecycle::of::<Watched>();

        let mut dst = Watched::new(&values, "a");
        let mut src = ManuallyDrop::new(Watched::new(&values, "b"));

        unsafe {
            hooks.move_to(
                (&mut dst as *mut Watched).cast(),
                (&mut *src as *mut Watched).cast(),
                std::mem::size_of::<Watched>(),
                1
            );
        }

        assert_eq!(values.clone().take(), "drop[a]");
        assert_eq!(dst.1, "b");

        drop(dst);
        assert_eq!(values.clone().take(), "drop[b]");
    }

    #[test]
    fn cloned_copy_assign() {
        let hooks = Lifecycle::cloned::<String>();

        let mut dst = MaybeUninit::<String>::uninit();
        let src = String::from("hello");

        unsafe {
            hooks.construct(dst.as_mut_ptr().cast(), std::mem::size_of::<String>(), 1);
            hooks.copy(
                dst.as_mut_ptr().cast(),
                (&src as *const String).cast(),
                std::mem::size_of::<String>(),
                1
            );

            assert_eq!(dst.assume_init_ref(), "hello");
            dst.assume_init_drop();
        }
    }

    #[derive(Default)]
    struct Watched(Option<TestValues>, String);

    impl Watched {
        fn new(values: &TestValues, name: &str) -> Self {
            Watched(Some(values.clone()), name.to_string())
        }
    }

    impl Drop for Watched {
        fn drop(&mut self) {
            if let Some(values) = &mut self.0 {
                values.push(format!("drop[{}]", self.1));
            }
        }
    }
}
