// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mapping behavior of container instances.
//!
//! Containers expose their named members (inherited base members included,
//! padding excluded) in declaration order. Attribute access resolves the
//! member's cached accessor against this instance, producing a child that
//! aliases the same buffer window.

use crate::error::{Error, Result};
use crate::object::Instance;
use crate::registry::BaseKind;
use crate::value::Value;

impl Instance {
    fn require_container(&self) -> Result<()> {
        if self.base_kind() != BaseKind::Container {
            return Err(Error::InvalidOperation(format!(
                "'{}' is not a container",
                self.dtype().name()
            )));
        }
        Ok(())
    }

    /// Materialize a named member as a child instance.
    pub fn attr(&self, name: &str) -> Result<Instance> {
        self.require_container()?;
        let accessor = self.dtype().attr(name).copied().ok_or_else(|| {
            Error::InvalidValue(format!(
                "no member '{}' in type '{}'",
                name,
                self.dtype().name()
            ))
        })?;
        accessor.resolve(self)
    }

    /// Decode a named member.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.attr(name)?.read()
    }

    /// Encode a value into a named member.
    pub fn set(&self, name: &str, value: &Value) -> Result<()> {
        self.require_container()?;
        let accessor = self.dtype().attr(name).copied().ok_or_else(|| {
            Error::InvalidValue(format!(
                "no member '{}' in type '{}'",
                name,
                self.dtype().name()
            ))
        })?;
        accessor.assign(self, value)
    }

    /// Number of members: named sub-entities for containers, element count
    /// for arrays.
    pub fn len(&self) -> Result<usize> {
        match self.base_kind() {
            BaseKind::Container => Ok(self.dtype().attr_count()),
            BaseKind::Array => Ok(self
                .dtype()
                .element()
                .map(|element| element.count)
                .unwrap_or(0)),
            _ => Err(Error::InvalidOperation(format!(
                "'{}' has no length",
                self.dtype().name()
            ))),
        }
    }

    /// Returns `true` for containers/arrays with no members.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Member names in declaration order.
    pub fn member_names(&self) -> Result<Vec<String>> {
        self.require_container()?;
        Ok(self.dtype().attr_names().map(str::to_string).collect())
    }

    /// Decode all members as `(name, value)` pairs in declaration order.
    pub fn entries(&self) -> Result<Vec<(String, Value)>> {
        self.require_container()?;
        let dtype = self.dtype().clone();
        let mut out = Vec::with_capacity(dtype.attr_count());
        for entry in dtype.attrs() {
            let child = entry.accessor.resolve(self)?;
            out.push((entry.name.clone(), child.read()?));
        }
        Ok(out)
    }

    /// Decode all member values in declaration order.
    pub fn values(&self) -> Result<Vec<Value>> {
        Ok(self.entries()?.into_iter().map(|(_, v)| v).collect())
    }
}
