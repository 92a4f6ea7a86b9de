// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bound instances: live values of schema types over buffer windows.
//!
//! An [`Instance`] is a `(window, offset, length)` triple bound to a
//! [`DynamicType`]. Child instances obtained through attribute or index
//! access share the parent's window at a different offset — aliasing, never
//! copying. Behavior splits by base kind:
//!
//! - scalar/number access lives in [`scalar`],
//! - mapping access in [`container`],
//! - sequence access and the runtime-sized [`DynamicArray`] in [`array`].
//!
//! Every instance can expose its backing bytes as a flat view, and arrays
//! additionally as a strided view, for bulk access without conversion.

pub mod array;
pub mod container;
pub mod scalar;

pub use array::DynamicArray;

use std::rc::Rc;

use crate::buffer::{BufferWindow, ContentGuard, ForeignRegion, RawRegion};
use crate::convert;
use crate::error::{Error, Result};
use crate::registry::{BaseKind, DynamicType};
use crate::schema::TypeId;
use crate::value::Value;

/// A live value of a schema type: buffer window + offset + length.
///
/// Instances are cheap handles (two `Rc`s and two integers); cloning one
/// aliases the same storage.
#[derive(Clone)]
pub struct Instance {
    dtype: Rc<DynamicType>,
    window: Rc<BufferWindow>,
    offset: usize,
    len: usize,
}

impl Instance {
    /// Bind a type to a window region.
    ///
    /// Enforces `offset + len <= window.max_size()`. A window that has never
    /// been initialized (fresh allocation) receives its schema default image
    /// here, exactly once; wrapping an initialized window never re-runs it.
    pub(crate) fn bind(
        dtype: &Rc<DynamicType>,
        window: Rc<BufferWindow>,
        offset: usize,
        len: usize,
    ) -> Result<Self> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::InvalidValue("window region overflows".to_string()))?;
        if end > window.max_size() {
            return Err(Error::BufferTooSmall {
                need: end,
                have: window.max_size(),
            });
        }
        if !window.is_initialized() {
            // Fresh allocation: the default image of every schema type is
            // its zero image, which the allocator already produced.
            window.mark_initialized()?;
            log::debug!(
                "[object] default-initialized '{}' ({} bytes)",
                dtype.name(),
                window.max_size()
            );
        }
        Ok(Self {
            dtype: Rc::clone(dtype),
            window,
            offset,
            len,
        })
    }

    /// Allocate a fresh zeroed instance sized by the type's maximum size.
    pub fn new(dtype: &Rc<DynamicType>) -> Result<Self> {
        let window = BufferWindow::alloc(dtype.max_size())?;
        Self::bind(dtype, window, 0, dtype.native_size())
    }

    /// Copy `bytes` into a new owned window and bind it.
    pub fn from_bytes(dtype: &Rc<DynamicType>, bytes: &[u8]) -> Result<Self> {
        let window = BufferWindow::copy_from(bytes)?;
        Self::bind(dtype, window, 0, dtype.native_size())
    }

    /// Bind a caller-supplied raw region without copying.
    ///
    /// # Safety
    ///
    /// Same contract as [`BufferWindow::from_raw_parts`]: the region must
    /// stay valid and (if writable) un-aliased for the instance's lifetime.
    pub unsafe fn from_raw_parts(
        dtype: &Rc<DynamicType>,
        ptr: *mut u8,
        len: usize,
        readonly: bool,
    ) -> Result<Self> {
        let window = BufferWindow::from_raw_parts(ptr, len, readonly);
        Self::bind(dtype, window, 0, dtype.native_size())
    }

    /// Bind any object exposing the buffer-view contract.
    pub fn wrap(
        dtype: &Rc<DynamicType>,
        source: Box<dyn ForeignRegion>,
        readonly: bool,
    ) -> Result<Self> {
        let window = BufferWindow::wrap(source, readonly);
        Self::bind(dtype, window, 0, dtype.native_size())
    }

    /// Build a child instance aliasing this instance's storage.
    ///
    /// This is the only legal way to alias a parent's storage: the child
    /// shares the window with `offset` relative to the parent.
    pub fn new_sub_object(
        &self,
        dtype: &Rc<DynamicType>,
        offset: usize,
        len: usize,
    ) -> Result<Self> {
        Self::bind(dtype, Rc::clone(&self.window), self.offset + offset, len)
    }

    /// The bound dynamic type.
    pub fn dtype(&self) -> &Rc<DynamicType> {
        &self.dtype
    }

    /// Schema type id of the bound type.
    pub fn type_id(&self) -> TypeId {
        self.dtype.type_id()
    }

    /// Base behavior kind of the bound type.
    pub fn base_kind(&self) -> BaseKind {
        self.dtype.base_kind()
    }

    /// Backing buffer window.
    pub fn window(&self) -> &Rc<BufferWindow> {
        &self.window
    }

    /// Byte offset inside the window.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte span of this instance.
    pub fn size(&self) -> usize {
        self.len
    }

    /// Decode this instance into a generic dynamic value.
    pub fn read(&self) -> Result<Value> {
        convert::decode(self)
    }

    /// Encode a generic dynamic value into this instance's storage.
    pub fn write(&self, value: &Value) -> Result<()> {
        convert::encode(self, value)
    }

    /// Produce the packed bitstream form via the external pack routine.
    pub fn to_packed(&self) -> Result<Value> {
        Ok(Value::Packed(convert::to_packed(self)?))
    }

    /// Run `f` over this instance's bytes under a read acquisition.
    pub(crate) fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let guard = self.window.acquire(false)?;
        let bytes = guard.bytes();
        if bytes.len() < self.offset + self.len {
            return Err(Error::BufferTooSmall {
                need: self.offset + self.len,
                have: bytes.len(),
            });
        }
        Ok(f(&bytes[self.offset..self.offset + self.len]))
    }

    /// Run `f` over this instance's bytes under a writable acquisition.
    pub(crate) fn with_bytes_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> Result<R>) -> Result<R> {
        let mut guard = self.window.acquire(true)?;
        let bytes = guard.bytes_mut()?;
        if bytes.len() < self.offset + self.len {
            return Err(Error::BufferTooSmall {
                need: self.offset + self.len,
                have: bytes.len(),
            });
        }
        f(&mut bytes[self.offset..self.offset + self.len])
    }

    /// Copy this instance's bytes out of the buffer.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        self.with_bytes(|bytes| bytes.to_vec())
    }

    /// Flat read-only view of the backing bytes (item size 1).
    pub fn flat_view(&self) -> Result<BufferView> {
        let guard = self.window.acquire(false)?;
        Ok(BufferView {
            guard,
            offset: self.offset,
            span: self.len,
            item_size: 1,
            stride: 1,
            count: self.len,
        })
    }

    /// Flat writable view; fails on read-only windows.
    pub fn flat_view_mut(&self) -> Result<BufferViewMut> {
        let guard = self.window.acquire(true)?;
        Ok(BufferViewMut {
            guard,
            offset: self.offset,
            span: self.len,
            item_size: 1,
            stride: 1,
            count: self.len,
        })
    }

    /// Strided read-only view over an array's elements.
    ///
    /// Item size is the element's native size, stride the element size,
    /// shape the element count.
    pub fn strided_view(&self) -> Result<BufferView> {
        let element = self.dtype.element().copied().ok_or_else(|| {
            Error::InvalidOperation(format!("'{}' is not an array", self.dtype.name()))
        })?;
        let item_size = self.dtype.format().size().unwrap_or(element.size);
        let guard = self.window.acquire(false)?;
        Ok(BufferView {
            guard,
            offset: self.offset,
            span: self.len,
            item_size,
            stride: element.size,
            count: element.count,
        })
    }

    /// Export this instance as a foreign region so another instance (or any
    /// consumer of the buffer-view contract) can wrap it.
    pub fn export_region(&self) -> InstanceRegion {
        InstanceRegion {
            inst: self.clone(),
            guard: std::cell::RefCell::new(None),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.dtype, &other.dtype)
            && Rc::ptr_eq(&self.window, &other.window)
            && self.offset == other.offset
            && self.len == other.len
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.dtype.name())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("window", &self.window)
            .finish()
    }
}

/// Read-only view over an instance's backing bytes.
///
/// Holds a content acquisition for its whole lifetime; geometry follows the
/// zero-copy view contract (flat: item size 1; strided: element geometry).
pub struct BufferView {
    guard: ContentGuard,
    offset: usize,
    span: usize,
    item_size: usize,
    stride: usize,
    count: usize,
}

impl BufferView {
    /// The viewed bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.guard.bytes()[self.offset..self.offset + self.span]
    }

    /// Item size in bytes.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Distance between consecutive items in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if the view has no items.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes of one item.
    pub fn item(&self, index: usize) -> Result<&[u8]> {
        if index >= self.count {
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.count,
            });
        }
        let start = index * self.stride;
        Ok(&self.bytes()[start..start + self.item_size])
    }
}

/// Writable view over an instance's backing bytes.
pub struct BufferViewMut {
    guard: ContentGuard,
    offset: usize,
    span: usize,
    item_size: usize,
    stride: usize,
    count: usize,
}

impl BufferViewMut {
    /// The viewed bytes, mutable.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        let offset = self.offset;
        let span = self.span;
        Ok(&mut self.guard.bytes_mut()?[offset..offset + span])
    }

    /// Item size in bytes.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Distance between consecutive items in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if the view has no items.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes of one item, mutable.
    pub fn item_mut(&mut self, index: usize) -> Result<&mut [u8]> {
        if index >= self.count {
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.count,
            });
        }
        let start = index * self.stride;
        let item_size = self.item_size;
        Ok(&mut self.bytes_mut()?[start..start + item_size])
    }
}

/// [`ForeignRegion`] adapter over an instance's span.
///
/// Lets one instance serve as the foreign buffer of another: acquisition
/// forwards to the underlying window and is held until released.
pub struct InstanceRegion {
    inst: Instance,
    guard: std::cell::RefCell<Option<ContentGuard>>,
}

impl ForeignRegion for InstanceRegion {
    fn acquire(&self, writable: bool) -> Result<RawRegion> {
        let guard = self.inst.window().acquire(writable)?;
        let bytes = guard.bytes();
        if bytes.len() < self.inst.offset() + self.inst.size() {
            return Err(Error::BufferTooSmall {
                need: self.inst.offset() + self.inst.size(),
                have: bytes.len(),
            });
        }
        // SAFETY: pointer derivation only; the guard stored below keeps the
        // acquisition (and therefore the region) alive until release().
        let ptr = unsafe { bytes.as_ptr().add(self.inst.offset()) as *mut u8 };
        let region = RawRegion {
            ptr,
            len: self.inst.size(),
        };
        *self.guard.borrow_mut() = Some(guard);
        Ok(region)
    }

    fn release(&self) {
        self.guard.borrow_mut().take();
    }

    fn len(&self) -> usize {
        self.inst.size()
    }
}
