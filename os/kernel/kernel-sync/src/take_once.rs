use core::{
    cell::UnsafeCell,
    fmt,
    sync::atomic::{AtomicBool, Ordering},
};

/// A `static` whose contents can be borrowed mutably exactly once.
///
/// The first call to [`take`](Self::take) returns `&'static mut T`; every
/// later call returns `None`. This turns a `static` into an owned value
/// that the caller can pass down by reference, without `static mut`.
///
/// ```
/// use kernel_sync::TakeOnce;
///
/// static TABLE: TakeOnce<[u32; 4]> = TakeOnce::new([0; 4]);
///
/// let table = TABLE.take().unwrap();
/// table[0] = 7;
/// assert!(TABLE.take().is_none());
/// ```
pub struct TakeOnce<T> {
    taken: AtomicBool,
    value: UnsafeCell<T>,
}

// Safety: at most one `&mut T` is ever handed out, and it may move to
// another thread only if `T: Send`.
unsafe impl<T: Send> Sync for TakeOnce<T> {}

impl<T> TakeOnce<T> {
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            taken: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Exclusive access to the contents, on the first call only.
    #[inline]
    #[allow(clippy::mut_from_ref)] // the `taken` flag makes the returned borrow unique
    pub fn take(&'static self) -> Option<&'static mut T> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return None;
        }

        // SAFETY: the flag flipped from false to true exactly once, so no
        // other reference to the contents exists or will ever be created.
        Some(unsafe { &mut *self.value.get() })
    }

    #[inline]
    #[must_use]
    pub fn is_taken(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }
}

impl<T> fmt::Debug for TakeOnce<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TakeOnce")
            .field("taken", &self.is_taken())
            .finish_non_exhaustive()
    }
}
