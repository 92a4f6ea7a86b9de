// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reference-counted buffer windows over owned, borrowed, or foreign storage.
//!
//! A [`BufferWindow`] is the single storage primitive behind every bound
//! instance: it either owns an allocation, borrows a caller-supplied raw
//! region, or proxies a foreign object implementing [`ForeignRegion`].
//! Content access goes through [`BufferWindow::acquire`], which returns a
//! [`ContentGuard`] whose drop releases the acquisition on every exit path.
//!
//! Foreign buffers are acquired lazily: wrapping defers the underlying
//! acquisition until the first content access, and the resulting raw region
//! is cached until the reference count returns to zero.
//!
//! # Thread Safety
//!
//! None. The engine runs under an external single-threaded serialization
//! convention, so reference counts are plain [`Cell`]s, not atomics.

use std::cell::{Cell, UnsafeCell};
use std::rc::Rc;

use crate::error::{Error, Result};

/// Raw pointer + length pair describing an acquired memory region.
#[derive(Debug, Clone, Copy)]
pub struct RawRegion {
    /// Start of the region.
    pub ptr: *mut u8,
    /// Region length in bytes.
    pub len: usize,
}

/// Contract for foreign objects that expose a byte buffer.
///
/// Implementors hand out a raw region on [`acquire`](Self::acquire) and are
/// guaranteed a matching [`release`](Self::release) once the wrapping
/// window's reference count returns to zero. Acquire/release pairs are
/// strictly nested; at most one acquisition is outstanding per window.
pub trait ForeignRegion {
    /// Acquire the underlying region.
    ///
    /// `writable` reflects the wrapping window's writability, not the
    /// writability of any individual view; the cached region must satisfy
    /// every view the window can legally produce.
    fn acquire(&self, writable: bool) -> Result<RawRegion>;

    /// Release a region previously returned by [`acquire`](Self::acquire).
    fn release(&self);

    /// Total length of the exposed buffer in bytes.
    fn len(&self) -> usize;

    /// Returns `true` if the exposed buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Backing storage of a window.
enum Storage {
    /// Exclusive allocation owned by the window.
    Owned(UnsafeCell<Box<[u8]>>),
    /// Borrowed raw region; the caller guarantees it outlives the window.
    Raw { ptr: *mut u8, len: usize },
    /// Foreign buffer object, acquired lazily on first content access.
    Foreign {
        source: Box<dyn ForeignRegion>,
        cached: Cell<Option<RawRegion>>,
    },
}

/// Reference-counted handle over a contiguous byte region.
///
/// Created at instance-construction time (allocated, copied, or wrapped) and
/// destroyed when the last owning instance releases it. All instances
/// aliasing a window share its content: mutation through any alias is
/// immediately visible to every other (no copy-on-write).
pub struct BufferWindow {
    storage: Storage,
    max_size: usize,
    readonly: bool,
    refs: Cell<usize>,
    initialized: Cell<bool>,
}

impl BufferWindow {
    /// Allocate a zeroed window of `len` bytes.
    ///
    /// The window starts uninitialized; schema-driven default initialization
    /// marks it via [`mark_initialized`](Self::mark_initialized).
    pub fn alloc(len: usize) -> Result<Rc<Self>> {
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
        data.resize(len, 0);
        Ok(Rc::new(Self {
            storage: Storage::Owned(UnsafeCell::new(data.into_boxed_slice())),
            max_size: len,
            readonly: false,
            refs: Cell::new(0),
            initialized: Cell::new(false),
        }))
    }

    /// Allocate and copy; the window is writable and initialized.
    pub fn copy_from(bytes: &[u8]) -> Result<Rc<Self>> {
        Self::copy_impl(bytes, false)
    }

    /// Allocate and copy a read-only window.
    pub fn copy_from_readonly(bytes: &[u8]) -> Result<Rc<Self>> {
        Self::copy_impl(bytes, true)
    }

    fn copy_impl(bytes: &[u8], readonly: bool) -> Result<Rc<Self>> {
        let mut data = Vec::new();
        data.try_reserve_exact(bytes.len())
            .map_err(|_| Error::OutOfMemory)?;
        data.extend_from_slice(bytes);
        Ok(Rc::new(Self {
            storage: Storage::Owned(UnsafeCell::new(data.into_boxed_slice())),
            max_size: bytes.len(),
            readonly,
            refs: Cell::new(0),
            initialized: Cell::new(true),
        }))
    }

    /// Borrow a caller-supplied raw region without copying.
    ///
    /// The window is non-owning and initialized.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` valid bytes that outlive the window and
    /// every guard acquired from it. If `readonly` is false, the region must
    /// be writable and not aliased by anything outside this engine for the
    /// window's lifetime.
    pub unsafe fn from_raw_parts(ptr: *mut u8, len: usize, readonly: bool) -> Rc<Self> {
        Rc::new(Self {
            storage: Storage::Raw { ptr, len },
            max_size: len,
            readonly,
            refs: Cell::new(0),
            initialized: Cell::new(true),
        })
    }

    /// Wrap a foreign buffer object.
    ///
    /// Acquisition of the underlying buffer is deferred until the first
    /// content access to avoid double-acquiring foreign buffer locks.
    pub fn wrap(source: Box<dyn ForeignRegion>, readonly: bool) -> Rc<Self> {
        let max_size = source.len();
        Rc::new(Self {
            storage: Storage::Foreign {
                source,
                cached: Cell::new(None),
            },
            max_size,
            readonly,
            refs: Cell::new(0),
            initialized: Cell::new(true),
        })
    }

    /// Maximum addressable size of the window in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns `true` if writable acquisition is forbidden.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Current number of outstanding content acquisitions.
    pub fn ref_count(&self) -> usize {
        self.refs.get()
    }

    /// Returns `true` once the window content has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    /// Mark the window initialized.
    ///
    /// The transition happens exactly once; a second attempt is rejected.
    pub fn mark_initialized(&self) -> Result<()> {
        if self.initialized.get() {
            return Err(Error::InvalidValue(
                "buffer window already initialized".to_string(),
            ));
        }
        self.initialized.set(true);
        Ok(())
    }

    /// Acquire the window content, returning a guard that releases on drop.
    ///
    /// Requesting a writable view of a read-only window is a hard error,
    /// never a silent downgrade. For lazily-wrapped foreign buffers the
    /// first acquisition performs the underlying acquire and caches the raw
    /// region until the reference count returns to zero.
    pub fn acquire(self: &Rc<Self>, writable: bool) -> Result<ContentGuard> {
        if writable && self.readonly {
            return Err(Error::ReadOnlyBuffer);
        }
        if let Storage::Foreign { source, cached } = &self.storage {
            if self.refs.get() == 0 {
                debug_assert!(cached.get().is_none(), "stale foreign acquisition");
                let region = source.acquire(!self.readonly)?;
                if region.len < self.max_size {
                    source.release();
                    log::debug!(
                        "[buffer] foreign region shrank: have {} need {}",
                        region.len,
                        self.max_size
                    );
                    return Err(Error::BufferTooSmall {
                        need: self.max_size,
                        have: region.len,
                    });
                }
                cached.set(Some(region));
            }
        }
        self.refs.set(self.refs.get() + 1);
        Ok(ContentGuard {
            window: Rc::clone(self),
            writable,
        })
    }

    /// Raw pointer to self-owned content.
    ///
    /// Returns `None` for foreign-wrapped buffers: there is no safe raw
    /// access to those without an acquisition.
    pub fn peek(&self) -> Option<*const u8> {
        match &self.storage {
            Storage::Owned(data) => {
                // SAFETY: pointer extraction only; no reference is formed.
                Some(unsafe { (*data.get()).as_ptr() })
            }
            Storage::Raw { ptr, .. } => Some(*ptr as *const u8),
            Storage::Foreign { .. } => None,
        }
    }

    /// Resolve the current raw region backing this window.
    ///
    /// For foreign storage this is only meaningful while an acquisition is
    /// outstanding (refs > 0); the guard is the only caller.
    fn current_region(&self) -> RawRegion {
        match &self.storage {
            Storage::Owned(data) => {
                // SAFETY: pointer extraction only; aliasing is governed by
                // the acquire/release bookkeeping and the external
                // single-threaded serialization convention.
                let ptr = unsafe { (*data.get()).as_mut_ptr() };
                RawRegion {
                    ptr,
                    len: self.max_size,
                }
            }
            Storage::Raw { ptr, len } => RawRegion {
                ptr: *ptr,
                len: *len,
            },
            Storage::Foreign { cached, .. } => {
                debug_assert!(self.refs.get() > 0, "foreign region read without acquire");
                cached.get().unwrap_or(RawRegion {
                    ptr: std::ptr::null_mut(),
                    len: 0,
                })
            }
        }
    }

    /// Drop one acquisition; at zero, release any foreign acquisition.
    ///
    /// A release without a matching prior acquire is a programming error:
    /// fatal in debug builds, a leak in release builds.
    fn release_ref(&self) {
        let refs = self.refs.get();
        debug_assert!(refs > 0, "unbalanced buffer release");
        if refs == 0 {
            return;
        }
        self.refs.set(refs - 1);
        if refs == 1 {
            if let Storage::Foreign { source, cached } = &self.storage {
                cached.set(None);
                source.release();
            }
        }
    }
}

impl std::fmt::Debug for BufferWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.storage {
            Storage::Owned(_) => "owned",
            Storage::Raw { .. } => "raw",
            Storage::Foreign { .. } => "foreign",
        };
        f.debug_struct("BufferWindow")
            .field("storage", &kind)
            .field("max_size", &self.max_size)
            .field("readonly", &self.readonly)
            .field("refs", &self.refs.get())
            .field("initialized", &self.initialized.get())
            .finish()
    }
}

/// Scoped content acquisition of a [`BufferWindow`].
///
/// Dropping the guard releases the acquisition, including on error paths.
pub struct ContentGuard {
    window: Rc<BufferWindow>,
    writable: bool,
}

impl ContentGuard {
    /// The window this guard acquired.
    pub fn window(&self) -> &Rc<BufferWindow> {
        &self.window
    }

    /// Returns `true` if this guard permits mutation.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// The full window content.
    pub fn bytes(&self) -> &[u8] {
        let region = self.window.current_region();
        if region.ptr.is_null() {
            return &[];
        }
        // SAFETY: the guard holds an acquisition, so the region stays valid
        // until drop; access is serialized by the engine's single-threaded
        // execution contract.
        unsafe { std::slice::from_raw_parts(region.ptr as *const u8, region.len) }
    }

    /// The full window content, mutable.
    ///
    /// Fails if the guard was acquired read-only.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        if !self.writable {
            return Err(Error::ReadOnlyBuffer);
        }
        let region = self.window.current_region();
        if region.ptr.is_null() {
            return Ok(&mut []);
        }
        // SAFETY: acquisition is live and writability was validated at
        // acquire time. Aliased mutation through sibling guards is part of
        // the engine's contract (shared content, no copy-on-write) and is
        // serialized by the external single-threaded convention.
        Ok(unsafe { std::slice::from_raw_parts_mut(region.ptr, region.len) })
    }
}

impl Drop for ContentGuard {
    fn drop(&mut self) {
        self.window.release_ref();
    }
}

impl std::fmt::Debug for ContentGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentGuard")
            .field("writable", &self.writable)
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Foreign buffer that counts acquire/release calls.
    struct CountingRegion {
        data: RefCell<Vec<u8>>,
        acquires: Cell<usize>,
        releases: Cell<usize>,
    }

    impl CountingRegion {
        fn new(len: usize) -> Rc<Self> {
            Rc::new(Self {
                data: RefCell::new(vec![0; len]),
                acquires: Cell::new(0),
                releases: Cell::new(0),
            })
        }
    }

    impl ForeignRegion for Rc<CountingRegion> {
        fn acquire(&self, _writable: bool) -> Result<RawRegion> {
            self.acquires.set(self.acquires.get() + 1);
            let mut data = self.data.borrow_mut();
            Ok(RawRegion {
                ptr: data.as_mut_ptr(),
                len: data.len(),
            })
        }

        fn release(&self) {
            self.releases.set(self.releases.get() + 1);
        }

        fn len(&self) -> usize {
            self.data.borrow().len()
        }
    }

    #[test]
    fn test_alloc_zeroed() {
        let window = BufferWindow::alloc(16).expect("alloc");
        assert_eq!(window.max_size(), 16);
        assert!(!window.is_initialized());
        let guard = window.acquire(false).expect("acquire");
        assert!(guard.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_copy_from_initialized() {
        let window = BufferWindow::copy_from(&[1, 2, 3]).expect("copy");
        assert!(window.is_initialized());
        let guard = window.acquire(false).expect("acquire");
        assert_eq!(guard.bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_writable_acquire_on_readonly_fails() {
        let window = BufferWindow::copy_from_readonly(&[9; 4]).expect("copy");
        assert!(matches!(window.acquire(true), Err(Error::ReadOnlyBuffer)));
        // The storage is untouched and read acquisition still works.
        let guard = window.acquire(false).expect("read acquire");
        assert_eq!(guard.bytes(), &[9; 4]);
    }

    #[test]
    fn test_guard_release_restores_refcount() {
        let window = BufferWindow::alloc(8).expect("alloc");
        assert_eq!(window.ref_count(), 0);
        {
            let _a = window.acquire(true).expect("a");
            let _b = window.acquire(false).expect("b");
            assert_eq!(window.ref_count(), 2);
        }
        assert_eq!(window.ref_count(), 0);
    }

    #[test]
    fn test_mutation_visible_through_window() {
        let window = BufferWindow::alloc(4).expect("alloc");
        {
            let mut guard = window.acquire(true).expect("acquire");
            guard.bytes_mut().expect("mut")[2] = 0xAB;
        }
        let guard = window.acquire(false).expect("acquire");
        assert_eq!(guard.bytes()[2], 0xAB);
    }

    #[test]
    fn test_foreign_lazy_acquire_once() {
        let foreign = CountingRegion::new(32);
        let window = BufferWindow::wrap(Box::new(Rc::clone(&foreign)), false);
        // Wrapping alone does not acquire.
        assert_eq!(foreign.acquires.get(), 0);

        {
            let g1 = window.acquire(false).expect("g1");
            let g2 = window.acquire(true).expect("g2");
            assert_eq!(foreign.acquires.get(), 1);
            assert_eq!(g1.bytes().len(), 32);
            drop(g2);
            assert_eq!(foreign.releases.get(), 0);
        }
        // Last guard gone: underlying acquisition released exactly once.
        assert_eq!(foreign.releases.get(), 1);

        // Re-acquire after drop re-binds the foreign buffer.
        let _g = window.acquire(false).expect("reacquire");
        assert_eq!(foreign.acquires.get(), 2);
    }

    #[test]
    fn test_peek_none_for_foreign() {
        let foreign = CountingRegion::new(8);
        let window = BufferWindow::wrap(Box::new(foreign), true);
        assert!(window.peek().is_none());

        let owned = BufferWindow::copy_from(&[1]).expect("copy");
        assert!(owned.peek().is_some());
    }

    #[test]
    fn test_mark_initialized_once() {
        let window = BufferWindow::alloc(4).expect("alloc");
        window.mark_initialized().expect("first init");
        assert!(window.mark_initialized().is_err());
    }

    #[test]
    fn test_guard_bytes_mut_on_read_guard_fails() {
        let window = BufferWindow::alloc(4).expect("alloc");
        let mut guard = window.acquire(false).expect("acquire");
        assert!(matches!(guard.bytes_mut(), Err(Error::ReadOnlyBuffer)));
    }

    #[test]
    fn test_raw_window_roundtrip() {
        let mut backing = [0u8; 6];
        // SAFETY: `backing` outlives the window and all guards below.
        let window = unsafe { BufferWindow::from_raw_parts(backing.as_mut_ptr(), 6, false) };
        {
            let mut guard = window.acquire(true).expect("acquire");
            guard.bytes_mut().expect("mut").copy_from_slice(b"abcdef");
        }
        drop(window);
        assert_eq!(&backing, b"abcdef");
    }
}
