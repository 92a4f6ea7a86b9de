// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive conversion between bound instances and generic dynamic values.
//!
//! [`decode`] walks a type top-down: scalars decode by display hint, arrays
//! become ordered sequences, containers become declaration-ordered mappings.
//!
//! [`encode`] tries its paths in priority order: a null source is a no-op; a
//! packed form goes straight to the external unpack routine; a structurally
//! compatible bound instance takes the direct byte-copy fast path (truncate
//! to the smaller native size, zero-fill the destination tail); compound
//! destinations fill member-by-member, looking the source up by name and
//! falling back to position — a missing member is deliberately a no-op, not
//! an error; everything else lands in the scalar coercion ladder.
//!
//! The first error in a recursion aborts the remaining sibling and child
//! work for that subtree; nothing masks the original cause.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::object::Instance;
use crate::registry::{BaseKind, ElemFormat};
use crate::value::Value;

thread_local! {
    // Growable scratch reused across pack calls; per-thread because the
    // engine itself is single-threaded by contract.
    static PACK_SCRATCH: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

/// Decode a bound instance into a generic dynamic value.
pub fn decode(inst: &Instance) -> Result<Value> {
    match inst.base_kind() {
        BaseKind::Scalar | BaseKind::Number => inst.read_scalar(),
        BaseKind::Array => {
            let count = inst.len()?;
            let mut out = Vec::with_capacity(count);
            for index in 0..count {
                out.push(decode(&inst.item(index)?)?);
            }
            Ok(Value::Seq(out))
        }
        BaseKind::Container => {
            let dtype = Rc::clone(inst.dtype());
            let mut out = Vec::with_capacity(dtype.attr_count());
            for entry in dtype.attrs() {
                let child = entry.accessor.resolve(inst)?;
                out.push((entry.name.clone(), decode(&child)?));
            }
            Ok(Value::Map(out))
        }
    }
}

/// Encode a generic dynamic value into a bound instance.
pub fn encode(inst: &Instance, source: &Value) -> Result<()> {
    if source.is_null() {
        return Ok(());
    }
    if let Value::Packed(packed) = source {
        return unpack_into(inst, packed);
    }
    if let Value::Object(other) = source {
        if directly_compatible(inst, other) {
            return copy_image(inst, other);
        }
    }
    match inst.base_kind() {
        BaseKind::Container => encode_container(inst, source),
        BaseKind::Array => encode_array(inst, source),
        BaseKind::Scalar | BaseKind::Number => inst.write_scalar(source),
    }
}

/// Produce the packed bitstream form of an instance via the external pack
/// routine, reusing the per-thread scratch buffer.
pub fn to_packed(inst: &Instance) -> Result<Vec<u8>> {
    let schema = Rc::clone(inst.dtype().database().schema());
    let id = inst.type_id();
    PACK_SCRATCH.with(|cell| {
        let mut scratch = cell.borrow_mut();
        scratch.clear();
        inst.with_bytes(|bytes| schema.pack(id, bytes, &mut scratch))??;
        Ok(scratch.clone())
    })
}

/// Whether the fast byte-copy path applies: identical type object, or same
/// database and schema-confirmed structural lineage.
fn directly_compatible(dst: &Instance, src: &Instance) -> bool {
    if Rc::ptr_eq(dst.dtype(), src.dtype()) {
        return true;
    }
    let dst_db = dst.dtype().database();
    let src_db = src.dtype().database();
    Rc::ptr_eq(dst_db, src_db) && dst_db.schema().compatible(src.type_id(), dst.type_id())
}

/// Direct byte copy bounded by the smaller native size; the destination
/// tail is zero-filled.
fn copy_image(dst: &Instance, src: &Instance) -> Result<()> {
    log::debug!(
        "[convert] direct copy '{}' -> '{}'",
        src.dtype().name(),
        dst.dtype().name()
    );
    let image = src.snapshot()?;
    dst.with_bytes_mut(|out| {
        let n = image.len().min(out.len());
        out[..n].copy_from_slice(&image[..n]);
        out[n..].fill(0);
        Ok(())
    })
}

/// Packed fast path: hand the bitstream to the external unpack routine.
fn unpack_into(inst: &Instance, packed: &[u8]) -> Result<()> {
    log::debug!("[convert] packed fast path for '{}'", inst.dtype().name());
    let schema = Rc::clone(inst.dtype().database().schema());
    let id = inst.type_id();
    inst.with_bytes_mut(|dst| schema.unpack(id, packed, dst))
}

fn encode_container(inst: &Instance, source: &Value) -> Result<()> {
    let dtype = Rc::clone(inst.dtype());
    for (index, entry) in dtype.attrs().iter().enumerate() {
        match member_of(inst, source, &entry.name, index)? {
            Some(value) => entry.accessor.assign(inst, &value)?,
            // Missing member: left unmodified, by design.
            None => {}
        }
    }
    Ok(())
}

/// Look up the source value for one declared member: by name when the
/// source supports name lookup, by position when it supports sequence
/// access.
fn member_of(
    inst: &Instance,
    source: &Value,
    name: &str,
    index: usize,
) -> Result<Option<Value>> {
    match source {
        Value::Map(_) => Ok(source.get(name).cloned()),
        Value::Seq(items) => Ok(items.get(index).cloned()),
        Value::Object(other) => match other.base_kind() {
            BaseKind::Container => {
                if other.dtype().attr(name).is_some() {
                    Ok(Some(other.get(name)?))
                } else {
                    Ok(None)
                }
            }
            BaseKind::Array => {
                if index < other.len()? {
                    Ok(Some(other.item(index)?.read()?))
                } else {
                    Ok(None)
                }
            }
            _ => Err(Error::TypeMismatch {
                expected: inst.dtype().name().to_string(),
                got: other.dtype().name().to_string(),
            }),
        },
        _ => Err(Error::TypeMismatch {
            expected: inst.dtype().name().to_string(),
            got: source.kind_name().to_string(),
        }),
    }
}

fn encode_array(inst: &Instance, source: &Value) -> Result<()> {
    let count = inst.len()?;
    match source {
        Value::Seq(items) => {
            let n = items.len().min(count);
            for (index, item) in items.iter().take(n).enumerate() {
                encode(&inst.item(index)?, item)?;
            }
            Ok(())
        }
        // Byte-like input for byte-element arrays is a raw copy.
        Value::Bytes(bytes)
            if matches!(inst.dtype().format(), ElemFormat::U8 | ElemFormat::I8) =>
        {
            inst.with_bytes_mut(|dst| {
                let n = bytes.len().min(dst.len());
                dst[..n].copy_from_slice(&bytes[..n]);
                Ok(())
            })
        }
        Value::Object(other) if other.base_kind() == BaseKind::Array => {
            let n = other.len()?.min(count);
            for index in 0..n {
                let value = other.item(index)?.read()?;
                encode(&inst.item(index)?, &value)?;
            }
            Ok(())
        }
        _ => Err(Error::TypeMismatch {
            expected: inst.dtype().name().to_string(),
            got: source.kind_name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Database;
    use crate::schema::{ElemKind, MapSchema};

    fn point_db(tag: &str) -> Rc<Database> {
        let mut schema = MapSchema::new();
        let u8_t = schema.scalar("uint8", ElemKind::Unsigned, 1);
        let i32_t = schema.scalar("int32", ElemKind::Signed, 4);
        schema
            .container("Point", &[("a", u8_t), ("b", i32_t)])
            .expect("container");
        Database::open(tag, Rc::new(schema))
    }

    #[test]
    fn test_decode_container_scenario() {
        let db = point_db("convert_decode");
        let point = db.lookup_name("Point").expect("Point");
        let inst =
            Instance::from_bytes(&point, &[0x05, 0x01, 0x00, 0x00, 0x00]).expect("instance");

        let value = decode(&inst).expect("decode");
        let entries = value.as_map().expect("map");
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[0].1, Value::UInt(5));
        assert_eq!(entries[1].0, "b");
        assert_eq!(entries[1].1, Value::Int(1));
    }

    #[test]
    fn test_encode_partial_mapping_leaves_other_fields() {
        let db = point_db("convert_partial");
        let point = db.lookup_name("Point").expect("Point");
        let inst =
            Instance::from_bytes(&point, &[0x05, 0x01, 0x00, 0x00, 0x00]).expect("instance");

        encode(
            &inst,
            &Value::Map(vec![("a".to_string(), Value::UInt(7))]),
        )
        .expect("encode");

        assert_eq!(inst.snapshot().expect("bytes"), vec![0x07, 0x01, 0, 0, 0]);
    }

    #[test]
    fn test_encode_null_is_noop() {
        let db = point_db("convert_null");
        let point = db.lookup_name("Point").expect("Point");
        let inst = Instance::from_bytes(&point, &[9, 2, 0, 0, 0]).expect("instance");

        encode(&inst, &Value::Null).expect("encode");
        assert_eq!(inst.snapshot().expect("bytes"), vec![9, 2, 0, 0, 0]);
    }

    #[test]
    fn test_packed_roundtrip() {
        let db = point_db("convert_packed");
        let point = db.lookup_name("Point").expect("Point");
        let src = Instance::from_bytes(&point, &[3, 4, 0, 0, 0]).expect("src");
        let dst = Instance::new(&point).expect("dst");

        let packed = src.to_packed().expect("pack");
        encode(&dst, &packed).expect("unpack");
        assert_eq!(dst.snapshot().expect("bytes"), vec![3, 4, 0, 0, 0]);
    }

    #[test]
    fn test_scalar_source_for_container_is_type_error() {
        let db = point_db("convert_badsrc");
        let point = db.lookup_name("Point").expect("Point");
        let inst = Instance::new(&point).expect("instance");

        assert!(matches!(
            encode(&inst, &Value::Int(1)),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
