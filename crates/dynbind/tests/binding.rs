// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end binding tests through the public API.

use dynbind::{Database, DynamicArray, ElemKind, Instance, MapSchema, Value};
use std::rc::Rc;

/// Nested schema without text fields, so arbitrary byte images survive a
/// decode/encode round trip bit-for-bit.
fn frame_db(tag: &str) -> Rc<Database> {
    let mut schema = MapSchema::new();
    let u8_t = schema.scalar("uint8", ElemKind::Unsigned, 1);
    let i16_t = schema.scalar("int16", ElemKind::Signed, 2);
    let u32_t = schema.scalar("uint32", ElemKind::Unsigned, 4);
    let blob3 = schema.bytes("blob3", 3);
    let coords = schema.array("Coords4", i16_t, 4).expect("array");
    let header = schema
        .container("FrameHeader", &[("seq", u32_t), ("kind", u8_t)])
        .expect("header");
    schema
        .container(
            "Frame",
            &[
                ("header", header),
                ("coords", coords),
                ("gain", i16_t),
                ("opaque", blob3),
            ],
        )
        .expect("frame");
    Database::open(tag, Rc::new(schema))
}

#[test]
fn test_roundtrip_preserves_names_and_order() {
    let db = frame_db("it_roundtrip");
    let frame = db.lookup_name("Frame").expect("Frame");
    let size = frame.native_size();

    // Deterministic pseudo-random images.
    fastrand::seed(7);
    for _ in 0..32 {
        let image: Vec<u8> = (0..size).map(|_| fastrand::u8(..)).collect();
        let inst = Instance::from_bytes(&frame, &image).expect("instance");

        let decoded = inst.read().expect("decode");
        let names: Vec<&str> = decoded
            .as_map()
            .expect("map")
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, ["header", "coords", "gain", "opaque"]);

        let rebuilt = Instance::new(&frame).expect("fresh");
        rebuilt.write(&decoded).expect("encode");
        assert_eq!(rebuilt.snapshot().expect("bytes"), image);
    }
}

#[test]
fn test_lookup_by_name_matches_lookup_by_id() {
    let db = frame_db("it_lookup");
    let by_name = db.lookup_name("FrameHeader").expect("by name");
    let id = db.schema().lookup("FrameHeader").expect("id");
    let by_id = db.get_or_create(id).expect("by id");
    assert!(Rc::ptr_eq(&by_name, &by_id));
}

#[test]
fn test_database_shared_per_name() {
    let db1 = frame_db("it_shared");
    let db2 = Database::open("it_shared", Rc::new(MapSchema::new()));
    assert!(Rc::ptr_eq(&db1, &db2));
    // The original schema still answers through the shared handle.
    assert!(db2.lookup_name("Frame").is_ok());
}

#[test]
fn test_zero_copy_over_caller_memory() {
    let db = frame_db("it_zero_copy");
    let frame = db.lookup_name("Frame").expect("Frame");
    let mut backing = vec![0u8; frame.native_size()];

    {
        // SAFETY: `backing` outlives the instance and is not touched
        // elsewhere while bound.
        let inst = unsafe {
            Instance::from_raw_parts(&frame, backing.as_mut_ptr(), backing.len(), false)
        }
        .expect("bind");
        inst.set(
            "header",
            &Value::Map(vec![("seq".to_string(), Value::UInt(0x01020304))]),
        )
        .expect("set");
        inst.set("opaque", &Value::Bytes(vec![7, 8, 9])).expect("set opaque");
    }

    // Mutations landed in the caller's memory, not a copy.
    let seq = u32::from_ne_bytes([backing[0], backing[1], backing[2], backing[3]]);
    assert_eq!(seq, 0x01020304);
    let opaque_at = backing.len() - 3;
    assert_eq!(&backing[opaque_at..], &[7, 8, 9]);
}

#[test]
fn test_dynamic_array_over_caller_memory() {
    let db = frame_db("it_dynarray");
    let i16_id = db.schema().lookup("int16").expect("id");
    let i16_t = db.get_or_create(i16_id).expect("type");

    let mut backing = Vec::new();
    for v in [-1i16, 0, 1, 2, 3, 4] {
        backing.extend_from_slice(&v.to_ne_bytes());
    }

    // SAFETY: `backing` outlives the array and its element instances.
    let arr = unsafe {
        DynamicArray::from_raw_parts(&i16_t, backing.as_mut_ptr(), 6, 2, false)
    }
    .expect("array");

    assert_eq!(arr.len(), 6);
    assert_eq!(arr.item(0).expect("item").read().expect("read"), Value::Int(-1));

    arr.set(&[Value::Int(-9)]).expect("bulk set");
    drop(arr);
    assert_eq!(i16::from_ne_bytes([backing[0], backing[1]]), -9);
}

#[test]
fn test_packed_form_between_instances() {
    let db = frame_db("it_packed");
    let frame = db.lookup_name("Frame").expect("Frame");

    let src = Instance::new(&frame).expect("src");
    src.set("gain", &Value::Int(-2)).expect("set");
    src.set("opaque", &Value::Bytes(vec![1, 2, 3])).expect("set");

    let packed = src.to_packed().expect("pack");
    let dst = Instance::new(&frame).expect("dst");
    dst.write(&packed).expect("unpack");

    assert_eq!(
        dst.snapshot().expect("dst bytes"),
        src.snapshot().expect("src bytes")
    );
}
