// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema database access.
//!
//! The schema database itself — the compiled catalogue of type layouts —
//! is an external collaborator. This module defines the read-only service
//! contract the engine consumes ([`SchemaSource`]) and a [`HashMap`]-backed
//! implementation ([`MapSchema`]) used by tests and by callers that assemble
//! type layouts at runtime instead of loading a compiled database.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Stable identifier selecting one schema-defined type from a database.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Raw numeric value.
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Element kind reported by the schema service for a type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemKind {
    /// Raw byte scalar (text or opaque bytes, by display hint).
    Binary,
    /// Signed integer scalar.
    Signed,
    /// Unsigned integer scalar.
    Unsigned,
    /// Floating-point scalar.
    Float,
    /// Enumeration over an integer representation.
    Enum,
    /// Fixed-length array of one element type.
    Array,
    /// Structure with named (and padding) members.
    Container,
    /// Kind the engine does not bind; construction fails on it.
    Opaque,
}

/// How a scalar should be rendered and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayHint {
    /// Plain numeric value.
    #[default]
    Numeric,
    /// Text: reads stop at the first NUL, writes zero-pad.
    String,
    /// Opaque bytes: embedded NULs and full declared length preserved.
    Binary,
    /// Any non-zero stored value reads as `true`.
    Boolean,
    /// Render through the enum label table when possible.
    EnumLabel,
}

/// One entry of a compound type's member enumeration.
///
/// Members arrive in declaration order, base members first. Entries without
/// a name (padding, anonymous base slots) participate in layout accounting
/// but are excluded from the visible attribute table.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    /// Member name; `None` for padding entries.
    pub name: Option<String>,
    /// Member type.
    pub type_id: TypeId,
    /// Byte offset inside the parent.
    pub offset: usize,
    /// Byte size of the member.
    pub size: usize,
    /// Declaration sequence number.
    pub seq: u32,
}

impl MemberInfo {
    /// Create a named member entry.
    pub fn named(
        name: impl Into<String>,
        type_id: TypeId,
        offset: usize,
        size: usize,
        seq: u32,
    ) -> Self {
        Self {
            name: Some(name.into()),
            type_id,
            offset,
            size,
            seq,
        }
    }

    /// Create an anonymous padding entry.
    pub fn padding(type_id: TypeId, offset: usize, size: usize, seq: u32) -> Self {
        Self {
            name: None,
            type_id,
            offset,
            size,
            seq,
        }
    }
}

/// One symbolic label of an enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumLabel {
    /// Label text.
    pub name: String,
    /// Stored integer value.
    pub value: i64,
}

impl EnumLabel {
    /// Create an enum label.
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Array element metadata: type, per-element size, element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementInfo {
    /// Element type id.
    pub type_id: TypeId,
    /// Size of one element in bytes.
    pub size: usize,
    /// Number of elements.
    pub count: usize,
}

/// Read-only schema database service consumed by the binding engine.
///
/// Implementations answer layout and metadata queries per type id and
/// provide the external pack/unpack routines plus the structural
/// compatibility check used by the direct-copy fast path.
pub trait SchemaSource {
    /// Element kind of a type.
    fn kind(&self, id: TypeId) -> Result<ElemKind>;

    /// Canonical name of a type.
    fn type_name(&self, id: TypeId) -> Result<String>;

    /// Resolve a type by textual name.
    fn lookup(&self, name: &str) -> Option<TypeId>;

    /// Native size of a type in bytes.
    fn size_of(&self, id: TypeId) -> Result<usize>;

    /// Derived/maximum size; sizes freshly allocated instances when no
    /// explicit size is given.
    fn max_size(&self, id: TypeId) -> Result<usize>;

    /// Number of declared sub-entities (named and padding).
    fn member_count(&self, id: TypeId) -> Result<usize>;

    /// Member enumeration in declaration order, base members first.
    fn members(&self, id: TypeId) -> Result<Vec<MemberInfo>>;

    /// Element metadata for array types.
    fn element(&self, id: TypeId) -> Result<ElementInfo>;

    /// Display hint for scalar rendering.
    fn display_hint(&self, id: TypeId) -> DisplayHint;

    /// Enum label/value enumeration; empty for non-enum types.
    fn enum_labels(&self, id: TypeId) -> Vec<EnumLabel>;

    /// Convert a native image to the packed bitstream form.
    fn pack(&self, id: TypeId, native: &[u8], out: &mut Vec<u8>) -> Result<()>;

    /// Convert a packed bitstream back into a native image.
    fn unpack(&self, id: TypeId, packed: &[u8], native: &mut [u8]) -> Result<()>;

    /// Whether two types share enough structural lineage for a direct
    /// byte copy.
    fn compatible(&self, src: TypeId, dst: TypeId) -> bool;
}

/// One type definition inside a [`MapSchema`].
#[derive(Debug, Clone)]
struct TypeDef {
    name: String,
    kind: ElemKind,
    size: usize,
    hint: DisplayHint,
    labels: Vec<EnumLabel>,
    members: Vec<MemberInfo>,
    element: Option<ElementInfo>,
    parent: Option<TypeId>,
}

/// Simple [`HashMap`]-backed [`SchemaSource`].
///
/// Types are registered through the fluent definition methods; each returns
/// the new [`TypeId`]. Suitable for tests and for assembling moderate-size
/// type systems at runtime. Its packed form is the native little-endian
/// image of the type (pack snapshots, unpack performs a bounded copy).
#[derive(Debug, Default)]
pub struct MapSchema {
    types: HashMap<u32, TypeDef>,
    by_name: HashMap<String, TypeId>,
    next: u32,
}

impl MapSchema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn insert(&mut self, def: TypeDef) -> TypeId {
        self.next += 1;
        let id = TypeId(self.next);
        self.by_name.insert(def.name.clone(), id);
        log::debug!("[schema] registered '{}' as {:?}", def.name, id);
        self.types.insert(id.0, def);
        id
    }

    fn get(&self, id: TypeId) -> Result<&TypeDef> {
        self.types
            .get(&id.0)
            .ok_or_else(|| Error::Schema(format!("unknown type id {}", id)))
    }

    /// Register a numeric or binary scalar with the default display hint.
    pub fn scalar(&mut self, name: impl Into<String>, kind: ElemKind, size: usize) -> TypeId {
        let hint = match kind {
            ElemKind::Binary => DisplayHint::Binary,
            ElemKind::Enum => DisplayHint::EnumLabel,
            _ => DisplayHint::Numeric,
        };
        self.scalar_with_hint(name, kind, size, hint)
    }

    /// Register a scalar with an explicit display hint.
    pub fn scalar_with_hint(
        &mut self,
        name: impl Into<String>,
        kind: ElemKind,
        size: usize,
        hint: DisplayHint,
    ) -> TypeId {
        self.insert(TypeDef {
            name: name.into(),
            kind,
            size,
            hint,
            labels: Vec::new(),
            members: Vec::new(),
            element: None,
            parent: None,
        })
    }

    /// Register a fixed-length text scalar (string display hint).
    pub fn string(&mut self, name: impl Into<String>, len: usize) -> TypeId {
        self.scalar_with_hint(name, ElemKind::Binary, len, DisplayHint::String)
    }

    /// Register a raw byte scalar (binary display hint).
    pub fn bytes(&mut self, name: impl Into<String>, len: usize) -> TypeId {
        self.scalar_with_hint(name, ElemKind::Binary, len, DisplayHint::Binary)
    }

    /// Register a boolean-hinted unsigned scalar.
    pub fn boolean(&mut self, name: impl Into<String>, size: usize) -> TypeId {
        self.scalar_with_hint(name, ElemKind::Unsigned, size, DisplayHint::Boolean)
    }

    /// Register an enumeration with its label table.
    pub fn enumeration(
        &mut self,
        name: impl Into<String>,
        size: usize,
        labels: &[(&str, i64)],
    ) -> TypeId {
        self.insert(TypeDef {
            name: name.into(),
            kind: ElemKind::Enum,
            size,
            hint: DisplayHint::EnumLabel,
            labels: labels
                .iter()
                .map(|(n, v)| EnumLabel::new(*n, *v))
                .collect(),
            members: Vec::new(),
            element: None,
            parent: None,
        })
    }

    /// Register a fixed-length array of an existing element type.
    pub fn array(
        &mut self,
        name: impl Into<String>,
        elem: TypeId,
        count: usize,
    ) -> Result<TypeId> {
        let elem_size = self.get(elem)?.size;
        if elem_size == 0 {
            return Err(Error::InvalidValue(
                "array element size must be non-zero".to_string(),
            ));
        }
        Ok(self.insert(TypeDef {
            name: name.into(),
            kind: ElemKind::Array,
            size: elem_size * count,
            hint: DisplayHint::Numeric,
            labels: Vec::new(),
            members: Vec::new(),
            element: Some(ElementInfo {
                type_id: elem,
                size: elem_size,
                count,
            }),
            parent: None,
        }))
    }

    /// Register a container with packed sequential member layout.
    pub fn container(
        &mut self,
        name: impl Into<String>,
        members: &[(&str, TypeId)],
    ) -> Result<TypeId> {
        self.container_from(name, None, members)
    }

    /// Register a container deriving from `base`: the base's members come
    /// first (inherited, same offsets), new members are appended after the
    /// base image. The derived type stays copy-compatible with its base.
    pub fn derive(
        &mut self,
        name: impl Into<String>,
        base: TypeId,
        members: &[(&str, TypeId)],
    ) -> Result<TypeId> {
        self.container_from(name, Some(base), members)
    }

    fn container_from(
        &mut self,
        name: impl Into<String>,
        base: Option<TypeId>,
        members: &[(&str, TypeId)],
    ) -> Result<TypeId> {
        let (mut entries, mut offset) = match base {
            Some(b) => {
                let def = self.get(b)?;
                if def.kind != ElemKind::Container {
                    return Err(Error::InvalidValue(format!(
                        "base type '{}' is not a container",
                        def.name
                    )));
                }
                (def.members.clone(), def.size)
            }
            None => (Vec::new(), 0),
        };
        let mut seq = entries.len() as u32;
        for (member_name, type_id) in members {
            let size = self.get(*type_id)?.size;
            entries.push(MemberInfo::named(*member_name, *type_id, offset, size, seq));
            offset += size;
            seq += 1;
        }
        Ok(self.insert(TypeDef {
            name: name.into(),
            kind: ElemKind::Container,
            size: offset,
            hint: DisplayHint::Numeric,
            labels: Vec::new(),
            members: entries,
            element: None,
            parent: base,
        }))
    }

    /// Register a container with an explicit size and member table,
    /// including padding entries.
    pub fn container_with_layout(
        &mut self,
        name: impl Into<String>,
        size: usize,
        members: Vec<MemberInfo>,
    ) -> TypeId {
        self.insert(TypeDef {
            name: name.into(),
            kind: ElemKind::Container,
            size,
            hint: DisplayHint::Numeric,
            labels: Vec::new(),
            members,
            element: None,
            parent: None,
        })
    }

    /// Walk the inheritance chain to the root type.
    fn root(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let Some(def) = self.types.get(&current.0) {
            match def.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }
}

impl SchemaSource for MapSchema {
    fn kind(&self, id: TypeId) -> Result<ElemKind> {
        Ok(self.get(id)?.kind)
    }

    fn type_name(&self, id: TypeId) -> Result<String> {
        Ok(self.get(id)?.name.clone())
    }

    fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    fn size_of(&self, id: TypeId) -> Result<usize> {
        Ok(self.get(id)?.size)
    }

    fn max_size(&self, id: TypeId) -> Result<usize> {
        // Fixed-layout schema: the derived maximum equals the native size.
        Ok(self.get(id)?.size)
    }

    fn member_count(&self, id: TypeId) -> Result<usize> {
        Ok(self.get(id)?.members.len())
    }

    fn members(&self, id: TypeId) -> Result<Vec<MemberInfo>> {
        Ok(self.get(id)?.members.clone())
    }

    fn element(&self, id: TypeId) -> Result<ElementInfo> {
        let def = self.get(id)?;
        def.element.ok_or_else(|| {
            Error::Schema(format!("type '{}' has no element metadata", def.name))
        })
    }

    fn display_hint(&self, id: TypeId) -> DisplayHint {
        self.types
            .get(&id.0)
            .map(|d| d.hint)
            .unwrap_or_default()
    }

    fn enum_labels(&self, id: TypeId) -> Vec<EnumLabel> {
        self.types
            .get(&id.0)
            .map(|d| d.labels.clone())
            .unwrap_or_default()
    }

    fn pack(&self, id: TypeId, native: &[u8], out: &mut Vec<u8>) -> Result<()> {
        let size = self.size_of(id)?;
        if native.len() < size {
            return Err(Error::BufferTooSmall {
                need: size,
                have: native.len(),
            });
        }
        out.extend_from_slice(&native[..size]);
        Ok(())
    }

    fn unpack(&self, id: TypeId, packed: &[u8], native: &mut [u8]) -> Result<()> {
        let size = self.size_of(id)?;
        if native.len() < size {
            return Err(Error::BufferTooSmall {
                need: size,
                have: native.len(),
            });
        }
        let n = packed.len().min(size);
        native[..n].copy_from_slice(&packed[..n]);
        native[n..size].fill(0);
        Ok(())
    }

    fn compatible(&self, src: TypeId, dst: TypeId) -> bool {
        src == dst || self.root(src) == self.root(dst)
    }
}
