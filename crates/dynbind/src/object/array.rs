// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sequence behavior of array instances and runtime-sized dynamic arrays.
//!
//! Schema-declared arrays are ordinary instances whose type carries element
//! metadata; indexing resolves `offset = i * element_size`. A
//! [`DynamicArray`] covers the runtime-sized case — element count and stride
//! supplied by the caller, not schema-rooted — and adds bulk get/set.

use std::rc::Rc;

use crate::buffer::BufferWindow;
use crate::error::{Error, Result};
use crate::object::Instance;
use crate::registry::{BaseKind, DynamicType};
use crate::schema::ElementInfo;
use crate::value::Value;

impl Instance {
    /// Materialize array element `index` as a child instance.
    pub fn item(&self, index: usize) -> Result<Instance> {
        let element = self.element_meta()?;
        if index >= element.count {
            return Err(Error::IndexOutOfBounds {
                index,
                length: element.count,
            });
        }
        let elem_type = self.dtype().database().get_or_create(element.type_id)?;
        self.new_sub_object(&elem_type, index * element.size, element.size)
    }

    fn element_meta(&self) -> Result<ElementInfo> {
        if self.base_kind() != BaseKind::Array {
            return Err(Error::InvalidOperation(format!(
                "'{}' is not an array",
                self.dtype().name()
            )));
        }
        self.dtype().element().copied().ok_or_else(|| {
            Error::Schema(format!(
                "array type '{}' lacks element metadata",
                self.dtype().name()
            ))
        })
    }
}

/// Runtime-sized array over caller-supplied storage.
///
/// Unlike a schema-declared array the geometry (element count, element
/// size) comes from the call site; the element type is any bound dynamic
/// type. Elements materialize as ordinary instances aliasing the array's
/// window.
pub struct DynamicArray {
    elem: Rc<DynamicType>,
    window: Rc<BufferWindow>,
    elem_size: usize,
    count: usize,
}

impl DynamicArray {
    fn validate(elem: &Rc<DynamicType>, count: usize, elem_size: usize) -> Result<usize> {
        let span = count
            .checked_mul(elem_size)
            .ok_or_else(|| Error::InvalidValue("element span overflows".to_string()))?;
        if elem_size == 0 || elem_size < elem.native_size() {
            return Err(Error::InvalidValue(format!(
                "element size {} cannot hold '{}' ({} bytes)",
                elem_size,
                elem.name(),
                elem.native_size()
            )));
        }
        Ok(span)
    }

    /// Bind a raw pointer as `count` elements of `elem_size` bytes each.
    ///
    /// # Safety
    ///
    /// Same contract as [`BufferWindow::from_raw_parts`] over
    /// `count * elem_size` bytes.
    pub unsafe fn from_raw_parts(
        elem: &Rc<DynamicType>,
        ptr: *mut u8,
        count: usize,
        elem_size: usize,
        readonly: bool,
    ) -> Result<Self> {
        let span = Self::validate(elem, count, elem_size)?;
        Ok(Self {
            elem: Rc::clone(elem),
            window: BufferWindow::from_raw_parts(ptr, span, readonly),
            elem_size,
            count,
        })
    }

    /// Copy `bytes` into an owned window and bind it as an array.
    pub fn copy_from(
        elem: &Rc<DynamicType>,
        bytes: &[u8],
        count: usize,
        elem_size: usize,
    ) -> Result<Self> {
        let span = Self::validate(elem, count, elem_size)?;
        if bytes.len() < span {
            return Err(Error::BufferTooSmall {
                need: span,
                have: bytes.len(),
            });
        }
        Ok(Self {
            elem: Rc::clone(elem),
            window: BufferWindow::copy_from(&bytes[..span])?,
            elem_size,
            count,
        })
    }

    /// Element type.
    pub fn element_type(&self) -> &Rc<DynamicType> {
        &self.elem
    }

    /// Element stride in bytes.
    pub fn element_size(&self) -> usize {
        self.elem_size
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Backing buffer window.
    pub fn window(&self) -> &Rc<BufferWindow> {
        &self.window
    }

    /// Materialize element `index`.
    pub fn item(&self, index: usize) -> Result<Instance> {
        if index >= self.count {
            return Err(Error::IndexOutOfBounds {
                index,
                length: self.count,
            });
        }
        Instance::bind(
            &self.elem,
            Rc::clone(&self.window),
            index * self.elem_size,
            self.elem_size,
        )
    }

    /// Bulk get: decode every element in order.
    pub fn get(&self) -> Result<Value> {
        let mut out = Vec::with_capacity(self.count);
        for index in 0..self.count {
            out.push(self.item(index)?.read()?);
        }
        Ok(Value::Seq(out))
    }

    /// Bulk set: apply each input element to the corresponding array
    /// element, truncating to `min(values.len(), element_count)`.
    ///
    /// Returns the number of elements written.
    pub fn set(&self, values: &[Value]) -> Result<usize> {
        let n = values.len().min(self.count);
        for (index, value) in values.iter().take(n).enumerate() {
            self.item(index)?.write(value)?;
        }
        Ok(n)
    }
}

impl std::fmt::Debug for DynamicArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicArray")
            .field("element", &self.elem.name())
            .field("elem_size", &self.elem_size)
            .field("count", &self.count)
            .finish()
    }
}
