// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # dynbind - Schema-Bound Dynamic Object Binding
//!
//! A pure Rust engine that binds a compiled schema database (structure,
//! array, scalar and enum type definitions) to a dynamic object runtime:
//! arbitrary in-memory buffers are viewed, read, and mutated as
//! strongly-typed structured values without copying, with copy-based
//! construction available when value semantics are wanted.
//!
//! ## Quick Start
//!
//! ```rust
//! use dynbind::{Database, ElemKind, Instance, MapSchema, Value};
//! use std::rc::Rc;
//!
//! // Describe a layout (or load a compiled schema database instead).
//! let mut schema = MapSchema::new();
//! let u8_t = schema.scalar("uint8", ElemKind::Unsigned, 1);
//! let i32_t = schema.scalar("int32", ElemKind::Signed, 4);
//! schema.container("Point", &[("a", u8_t), ("b", i32_t)]).unwrap();
//!
//! // Bind a buffer and access it as a typed value.
//! let db = Database::open("quickstart", Rc::new(schema));
//! let point = db.lookup_name("Point").unwrap();
//! let inst = Instance::from_bytes(&point, &[5, 1, 0, 0, 0]).unwrap();
//!
//! assert_eq!(inst.get("a").unwrap(), Value::UInt(5));
//! inst.set("b", &Value::Int(7)).unwrap();
//! assert_eq!(inst.get("b").unwrap(), Value::Int(7));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Conversion Engine                           |
//! |       decode / encode: instance <-> generic dynamic value          |
//! +--------------------------------------------------------------------+
//! |                       Instance Hierarchy                           |
//! |   Scalar | Number | Container | Array | DynamicArray | views       |
//! +--------------------------------------------------------------------+
//! |            Dynamic Types, Accessors, Databases                     |
//! |   weak per-id type cache | ordered attribute tables | registries   |
//! +--------------------------------------------------------------------+
//! |                        Buffer Windows                              |
//! |   owned | borrowed raw | foreign (lazy acquire) | refcounted       |
//! +--------------------------------------------------------------------+
//! |                 Schema Service (external collaborator)             |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Database`] | Named schema database with its dynamic type cache |
//! | [`DynamicType`] | Runtime type built lazily per schema type id |
//! | [`Instance`] | A live `(window, offset, length)` value of a type |
//! | [`BufferWindow`] | Reference-counted handle over a byte region |
//! | [`Value`] | Generic dynamic value consumed/produced by the codec |
//!
//! ## Execution Model
//!
//! Single-threaded and cooperative: callers serialize all access to the
//! engine externally, so reference counts are plain cells and the
//! registries are thread-local. Buffer content is shared by every aliasing
//! instance; mutation through any alias is immediately visible to all.
//!
//! ## Modules Overview
//!
//! - [`schema`] - schema service contract and the map-backed implementation
//! - [`buffer`] - reference-counted buffer windows
//! - [`registry`] - databases and lazily-built dynamic types
//! - [`object`] - the bound instance hierarchy (start here)
//! - [`convert`] - the recursive conversion engine

/// Member accessors: immutable (type, offset, length) locators.
pub mod accessor;
/// Reference-counted buffer windows over owned, borrowed, or foreign storage.
pub mod buffer;
/// Recursive conversion between instances and generic dynamic values.
pub mod convert;
/// Crate-wide error type and result alias.
pub mod error;
/// Bound instances: live values of schema types over buffer windows.
pub mod object;
/// Databases and lazily-built dynamic types.
pub mod registry;
/// Schema database access (external collaborator contract).
pub mod schema;
/// Generic dynamic values.
pub mod value;

pub use accessor::Accessor;
pub use buffer::{BufferWindow, ContentGuard, ForeignRegion, RawRegion};
pub use convert::{decode, encode, to_packed};
pub use error::{Error, Result};
pub use object::{BufferView, BufferViewMut, DynamicArray, Instance, InstanceRegion};
pub use registry::{AttrEntry, BaseKind, Database, DynamicType, ElemFormat};
pub use schema::{
    DisplayHint, ElemKind, ElementInfo, EnumLabel, MapSchema, MemberInfo, SchemaSource, TypeId,
};
pub use value::Value;

/// dynbind version string.
pub const VERSION: &str = "0.4.2";
