use std::{
    ops::{Deref, DerefMut},
    ptr,
};

pub(crate) trait NullCheck {
    fn is_null(&self) -> bool;
}

impl<T> NullCheck for *mut T {
    fn is_null(&self) -> bool {
        (*self as *const T).is_null()
    }
}

/// Owner of a pointer allocated by SQLite, released with `dealloc` on drop
/// unless null.
#[derive(Debug)]
pub(crate) struct CBox<T: NullCheck> {
    pub(crate) ptr: T,
    dealloc: fn(T),
}

impl<T: NullCheck> CBox<T> {
    pub fn new(ptr: T, dealloc: fn(T)) -> Self {
        Self { ptr, dealloc }
    }
}

impl<T> CBox<*mut T> {
    /// Give up ownership, the caller becomes responsible for releasing it.
    pub fn take(&mut self) -> *mut T {
        std::mem::replace(&mut self.ptr, ptr::null_mut())
    }
}

impl<T: NullCheck> Drop for CBox<T> {
    fn drop(&mut self) {
        if !self.is_null() {
            unsafe {
                (self.dealloc)(std::ptr::read(&self.ptr as *const T));
            }
        }
    }
}

impl<T: NullCheck> Deref for CBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.ptr
    }
}

impl<T: NullCheck> DerefMut for CBox<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ptr
    }
}

// SQLite is built in serialized mode, handles can move between threads.
unsafe impl<T: NullCheck> Send for CBox<T> {}

#[cfg(test)]
mod tests {
    use crate::cbox::CBox;
    use std::{
        ptr,
        sync::atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn releases_only_non_null_pointers() {
        static RELEASED: AtomicUsize = AtomicUsize::new(0);
        let mut v = 123;
        {
            let ptr = CBox::new(ptr::null_mut::<i32>(), |_| {
                RELEASED.fetch_add(1, Ordering::SeqCst);
            });
            assert!(ptr.is_null());
        }
        assert_eq!(RELEASED.load(Ordering::SeqCst), 0);
        {
            let ptr = CBox::new(&mut v as *mut i32, |_| {
                RELEASED.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(unsafe { **ptr }, 123);
        }
        assert_eq!(RELEASED.load(Ordering::SeqCst), 1);
        {
            let mut ptr = CBox::new(&mut v as *mut i32, |_| {
                RELEASED.fetch_add(1, Ordering::SeqCst);
            });
            assert!(!ptr.take().is_null());
        }
        assert_eq!(RELEASED.load(Ordering::SeqCst), 1);
    }
}
