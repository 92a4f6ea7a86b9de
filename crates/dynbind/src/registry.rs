// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Databases and lazily-built dynamic types.
//!
//! A [`Database`] pairs a name with a schema service handle and caches one
//! [`DynamicType`] per type id. Both caches hold weak handles with revival:
//! a lookup upgrades the weak handle if any strong holder is alive (so
//! repeated lookups return the *identical* object, never a
//! structurally-equal duplicate) and rebuilds after the object has been
//! collected. Pointer identity of dynamic types is what makes the direct
//! byte-copy compatibility check cheap.
//!
//! # Architecture
//!
//! ```text
//! thread-local registry
//! +-- databases: RefCell<HashMap<name, Weak<Database>>>
//!
//! Database (one per schema name, per thread of control)
//! +-- schema: Rc<dyn SchemaSource>
//! +-- types: RefCell<HashMap<type_id, Weak<DynamicType>>>
//!     [strong refs held by instances and callers]
//! ```
//!
//! # Thread Safety
//!
//! None required: the engine runs under an external single-threaded
//! serialization convention, so the registry is `thread_local!` state and
//! the handles are `Rc`/`Weak`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::accessor::Accessor;
use crate::error::{Error, Result};
use crate::schema::{DisplayHint, ElemKind, ElementInfo, EnumLabel, SchemaSource, TypeId};

thread_local! {
    static DATABASES: RefCell<HashMap<String, Weak<Database>>> = RefCell::new(HashMap::new());
}

/// Base behavior of a bound type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseKind {
    /// Raw byte scalar (text or bytes by display hint).
    Scalar,
    /// Numeric scalar with integer/float/boolean coercions.
    Number,
    /// Mapping of named members.
    Container,
    /// Fixed-length element sequence.
    Array,
}

/// Native element format of a scalar or array element.
///
/// The format drives raw loads/stores and the item size of strided buffer
/// views. Values live in host memory, so loads use native byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemFormat {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// Opaque bytes; item size is the declared length.
    Bytes,
}

impl ElemFormat {
    /// Size in bytes (`None` for raw byte regions).
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::Bytes => None,
        }
    }

    /// Single-character format code, struct-module style.
    pub fn code(&self) -> char {
        match self {
            Self::U8 => 'B',
            Self::I8 => 'b',
            Self::U16 => 'H',
            Self::I16 => 'h',
            Self::U32 => 'I',
            Self::I32 => 'i',
            Self::U64 => 'Q',
            Self::I64 => 'q',
            Self::F32 => 'f',
            Self::F64 => 'd',
            Self::Bytes => 's',
        }
    }

    /// Derive the format for a schema kind and byte size.
    pub fn from_kind_size(kind: ElemKind, size: usize) -> Result<Self> {
        let format = match (kind, size) {
            (ElemKind::Binary | ElemKind::Container, _) => Self::Bytes,
            (ElemKind::Unsigned, 1) => Self::U8,
            (ElemKind::Unsigned, 2) => Self::U16,
            (ElemKind::Unsigned, 4) => Self::U32,
            (ElemKind::Unsigned, 8) => Self::U64,
            (ElemKind::Signed | ElemKind::Enum, 1) => Self::I8,
            (ElemKind::Signed | ElemKind::Enum, 2) => Self::I16,
            (ElemKind::Signed | ElemKind::Enum, 4) => Self::I32,
            (ElemKind::Signed | ElemKind::Enum, 8) => Self::I64,
            (ElemKind::Float, 4) => Self::F32,
            (ElemKind::Float, 8) => Self::F64,
            (kind, size) => {
                return Err(Error::InvalidValue(format!(
                    "no element format for kind {:?} of {} bytes",
                    kind, size
                )))
            }
        };
        Ok(format)
    }
}

/// One named entry of a dynamic type's attribute table.
#[derive(Debug, Clone)]
pub struct AttrEntry {
    /// Member name.
    pub name: String,
    /// Member locator.
    pub accessor: Accessor,
}

/// Runtime description of one schema type, built lazily per (database,
/// type id).
///
/// The attribute table holds named members in declaration order, base
/// members first; unnamed padding entries are accounted in the layout but
/// never appear here.
pub struct DynamicType {
    db: Rc<Database>,
    id: TypeId,
    name: String,
    base: BaseKind,
    attrs: Vec<AttrEntry>,
    format: ElemFormat,
    hint: DisplayHint,
    labels: Vec<EnumLabel>,
    size: usize,
    max_size: usize,
    elem: Option<ElementInfo>,
}

impl DynamicType {
    /// Owning database.
    pub fn database(&self) -> &Rc<Database> {
        &self.db
    }

    /// Schema type id.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Canonical type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base behavior kind.
    pub fn base_kind(&self) -> BaseKind {
        self.base
    }

    /// Element format for scalar loads and strided views.
    pub fn format(&self) -> ElemFormat {
        self.format
    }

    /// Display hint for scalar rendering.
    pub fn display_hint(&self) -> DisplayHint {
        self.hint
    }

    /// Enum label table (empty for non-enums).
    pub fn labels(&self) -> &[EnumLabel] {
        &self.labels
    }

    /// Native size in bytes.
    pub fn native_size(&self) -> usize {
        self.size
    }

    /// Derived/maximum size; used to allocate fresh instances.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Element metadata for array kinds.
    pub fn element(&self) -> Option<&ElementInfo> {
        self.elem.as_ref()
    }

    /// Ordered attribute table.
    pub fn attrs(&self) -> &[AttrEntry] {
        &self.attrs
    }

    /// Number of named members (inherited included, padding excluded).
    pub fn attr_count(&self) -> usize {
        self.attrs.len()
    }

    /// Static member introspection: look up an accessor by name.
    ///
    /// This is the no-buffer path; resolving the accessor against a bound
    /// instance is what materializes a value.
    pub fn attr(&self, name: &str) -> Option<&Accessor> {
        self.attrs
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.accessor)
    }

    /// Position of a named member in declaration order.
    pub fn attr_index(&self, name: &str) -> Option<usize> {
        self.attrs.iter().position(|entry| entry.name == name)
    }

    /// Iterate member names in declaration order.
    pub fn attr_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(|entry| entry.name.as_str())
    }
}

impl std::fmt::Debug for DynamicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base", &self.base)
            .field("format", &self.format)
            .field("size", &self.size)
            .field("attrs", &self.attrs.len())
            .finish()
    }
}

/// A named schema database with its per-type-id dynamic type cache.
pub struct Database {
    name: String,
    schema: Rc<dyn SchemaSource>,
    types: RefCell<HashMap<u32, Weak<DynamicType>>>,
}

impl Database {
    /// Open (or re-use) the database registered under `name`.
    ///
    /// One database exists per distinct schema name per thread of control;
    /// re-requesting a live name returns the existing instance and ignores
    /// the supplied schema handle.
    pub fn open(name: &str, schema: Rc<dyn SchemaSource>) -> Rc<Self> {
        DATABASES.with(|cell| {
            let mut map = cell.borrow_mut();
            if let Some(db) = map.get(name).and_then(|weak| weak.upgrade()) {
                return db;
            }
            let db = Rc::new(Self {
                name: name.to_string(),
                schema,
                types: RefCell::new(HashMap::new()),
            });
            map.insert(name.to_string(), Rc::downgrade(&db));
            log::info!("[registry] opened database '{}'", name);
            db
        })
    }

    /// Try to get an already-open database.
    pub fn get(name: &str) -> Option<Rc<Self>> {
        DATABASES.with(|cell| cell.borrow().get(name).and_then(|weak| weak.upgrade()))
    }

    /// Drop expired registry entries (test/debug helper).
    pub fn cleanup_expired() {
        DATABASES.with(|cell| {
            cell.borrow_mut()
                .retain(|_, weak| weak.strong_count() > 0);
        });
    }

    /// Number of live databases (test/debug helper).
    pub fn active_count() -> usize {
        DATABASES.with(|cell| {
            cell.borrow()
                .values()
                .filter(|weak| weak.strong_count() > 0)
                .count()
        })
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema service this database binds against.
    pub fn schema(&self) -> &Rc<dyn SchemaSource> {
        &self.schema
    }

    /// Number of currently live cached dynamic types.
    pub fn live_type_count(&self) -> usize {
        self.types
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Get or build the dynamic type for `id`.
    ///
    /// Idempotent: while any strong holder is alive, every call returns the
    /// identical `Rc` (pointer identity). After collection the type is
    /// rebuilt and re-registered.
    pub fn get_or_create(self: &Rc<Self>, id: TypeId) -> Result<Rc<DynamicType>> {
        if let Some(existing) = self.types.borrow().get(&id.0).and_then(|weak| weak.upgrade()) {
            return Ok(existing);
        }
        let built = Rc::new(self.build_type(id)?);
        self.types.borrow_mut().insert(id.0, Rc::downgrade(&built));
        log::debug!(
            "[registry] built type '{}' ({:?}) in db '{}'",
            built.name,
            id,
            self.name
        );
        Ok(built)
    }

    /// Look up a dynamic type by its textual schema name.
    pub fn lookup_name(self: &Rc<Self>, name: &str) -> Result<Rc<DynamicType>> {
        let id = self
            .schema
            .lookup(name)
            .ok_or_else(|| Error::Schema(format!("no type named '{}' in db '{}'", name, self.name)))?;
        self.get_or_create(id)
    }

    /// Build a fresh dynamic type from schema metadata.
    fn build_type(self: &Rc<Self>, id: TypeId) -> Result<DynamicType> {
        let schema = &self.schema;
        let kind = schema.kind(id)?;
        let base = match kind {
            ElemKind::Binary => BaseKind::Scalar,
            ElemKind::Signed | ElemKind::Unsigned | ElemKind::Float | ElemKind::Enum => {
                BaseKind::Number
            }
            ElemKind::Array => BaseKind::Array,
            ElemKind::Container => BaseKind::Container,
            ElemKind::Opaque => {
                return Err(Error::InvalidValue(format!(
                    "cannot bind schema kind {:?} (type id {})",
                    kind, id
                )))
            }
        };
        let name = schema.type_name(id)?;
        let size = schema.size_of(id)?;
        let max_size = schema.max_size(id)?;
        let hint = schema.display_hint(id);
        let labels = schema.enum_labels(id);

        let (format, elem, attrs) = match base {
            BaseKind::Container => {
                let mut attrs = Vec::new();
                for member in schema.members(id)? {
                    // Padding entries stay in layout accounting only.
                    let Some(member_name) = member.name else {
                        continue;
                    };
                    attrs.push(AttrEntry {
                        name: member_name,
                        accessor: Accessor::from_offset_size(
                            member.type_id,
                            member.offset,
                            member.size,
                        ),
                    });
                }
                (ElemFormat::Bytes, None, attrs)
            }
            BaseKind::Array => {
                let element = schema.element(id)?;
                let span = element
                    .size
                    .checked_mul(element.count)
                    .filter(|span| element.size > 0 && *span <= size);
                if span.is_none() {
                    return Err(Error::InvalidValue(format!(
                        "malformed element layout for '{}': {} x {} in {} bytes",
                        name, element.count, element.size, size
                    )));
                }
                let elem_kind = schema.kind(element.type_id)?;
                let format = ElemFormat::from_kind_size(elem_kind, element.size)?;
                (format, Some(element), Vec::new())
            }
            BaseKind::Scalar | BaseKind::Number => {
                (ElemFormat::from_kind_size(kind, size)?, None, Vec::new())
            }
        };

        Ok(DynamicType {
            db: Rc::clone(self),
            id,
            name,
            base,
            attrs,
            format,
            hint,
            labels,
            size,
            max_size,
            elem,
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("live_types", &self.live_type_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MapSchema;

    fn open_db(tag: &str) -> Rc<Database> {
        let mut schema = MapSchema::new();
        let u8_t = schema.scalar("uint8", ElemKind::Unsigned, 1);
        let i32_t = schema.scalar("int32", ElemKind::Signed, 4);
        schema
            .container("Point", &[("a", u8_t), ("b", i32_t)])
            .expect("container");
        schema.array("Bytes4", u8_t, 4).expect("array");
        Database::open(tag, Rc::new(schema))
    }

    #[test]
    fn test_open_returns_same_database_while_alive() {
        let db1 = open_db("registry_same_db");
        let db2 = Database::open("registry_same_db", Rc::new(MapSchema::new()));
        assert!(Rc::ptr_eq(&db1, &db2));
    }

    #[test]
    fn test_database_revives_after_drop() {
        {
            let _db = open_db("registry_revive");
            assert!(Database::get("registry_revive").is_some());
        }
        Database::cleanup_expired();
        assert!(Database::get("registry_revive").is_none());
        // Re-opening rebuilds a fresh instance under the same name.
        let _db = open_db("registry_revive");
        assert!(Database::get("registry_revive").is_some());
    }

    #[test]
    fn test_get_or_create_identity() {
        let db = open_db("registry_identity");
        let id = db.schema().lookup("Point").expect("id");

        let t1 = db.get_or_create(id).expect("t1");
        let t2 = db.get_or_create(id).expect("t2");
        assert!(Rc::ptr_eq(&t1, &t2));
        assert_eq!(db.live_type_count(), 1);
    }

    #[test]
    fn test_type_cache_weak_revival() {
        let db = open_db("registry_weak");
        let id = db.schema().lookup("Point").expect("id");

        let first = db.get_or_create(id).expect("first");
        let addr = Rc::as_ptr(&first) as usize;
        drop(first);
        assert_eq!(db.live_type_count(), 0);

        // Rebuilt after collection; contents match even though the cache
        // entry had expired.
        let revived = db.get_or_create(id).expect("revived");
        assert_eq!(revived.name(), "Point");
        assert_eq!(revived.attr_count(), 2);
        let _ = addr;
    }

    #[test]
    fn test_container_attr_table_order() {
        let db = open_db("registry_attrs");
        let point = db.lookup_name("Point").expect("Point");

        assert_eq!(point.base_kind(), BaseKind::Container);
        assert_eq!(point.attr_count(), 2);
        assert_eq!(point.attr_index("a"), Some(0));
        assert_eq!(point.attr_index("b"), Some(1));

        let b = point.attr("b").expect("b");
        assert_eq!(b.offset(), 1);
        assert_eq!(b.len(), 4);
        assert!(point.attr("z").is_none());
    }

    #[test]
    fn test_array_type_metadata() {
        let db = open_db("registry_array");
        let arr = db.lookup_name("Bytes4").expect("Bytes4");

        assert_eq!(arr.base_kind(), BaseKind::Array);
        let element = arr.element().expect("element");
        assert_eq!(element.count, 4);
        assert_eq!(element.size, 1);
        assert_eq!(arr.format(), ElemFormat::U8);
    }

    #[test]
    fn test_scalar_format_selection() {
        assert_eq!(
            ElemFormat::from_kind_size(ElemKind::Unsigned, 2).expect("u16"),
            ElemFormat::U16
        );
        assert_eq!(
            ElemFormat::from_kind_size(ElemKind::Float, 8).expect("f64"),
            ElemFormat::F64
        );
        assert!(ElemFormat::from_kind_size(ElemKind::Float, 3).is_err());
    }

    #[test]
    fn test_opaque_kind_is_construction_error() {
        let mut schema = MapSchema::new();
        let odd = schema.scalar("odd", ElemKind::Opaque, 4);
        let db = Database::open("registry_opaque", Rc::new(schema));
        assert!(matches!(
            db.get_or_create(odd),
            Err(Error::InvalidValue(_))
        ));
    }
}
