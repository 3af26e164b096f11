//! Structure-of-arrays column storage backing a single schema field across every
//! entity slot in a world.

use crate::component::value::{ObjectHandle, Value};

/// One field's backing array, sized to `capacity * kind.arity()` elements.
///
/// Indexing convention: field `f` at entity slot `i` occupies
/// `column[i * arity .. i * arity + arity]`.
#[derive(Debug, Clone)]
pub enum Column {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    /// 0/1 byte per slot.
    Boolean(Vec<u8>),
    /// Raw slot index, `-1` meaning null.
    EntityRef(Vec<i32>),
    Str(Vec<String>),
    Object(Vec<Option<ObjectHandle>>),
    /// Contiguous float32 lanes backing Vec2/Vec3/Vec4 fields.
    Vector(Vec<f32>),
    Enum8(Vec<i8>),
    Enum16(Vec<i16>),
}

impl Column {
    /// Grow the column so that slot `capacity - 1` is addressable, padding new
    /// elements with the kind's zero value. `arity` is the field's lane count.
    pub fn grow_to(&mut self, capacity: usize, arity: usize) {
        let len = capacity * arity;
        match self {
            Column::Int8(v) => v.resize(len, 0),
            Column::Int16(v) => v.resize(len, 0),
            Column::Float32(v) => v.resize(len, 0.0),
            Column::Float64(v) => v.resize(len, 0.0),
            Column::Boolean(v) => v.resize(len, 0),
            Column::EntityRef(v) => v.resize(len, -1),
            Column::Str(v) => v.resize(len, String::new()),
            Column::Object(v) => v.resize(len, None),
            Column::Vector(v) => v.resize(len, 0.0),
            Column::Enum8(v) => v.resize(len, 0),
            Column::Enum16(v) => v.resize(len, 0),
        }
    }

    pub fn capacity_slots(&self, arity: usize) -> usize {
        let len = match self {
            Column::Int8(v) => v.len(),
            Column::Int16(v) => v.len(),
            Column::Float32(v) => v.len(),
            Column::Float64(v) => v.len(),
            Column::Boolean(v) => v.len(),
            Column::EntityRef(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::Object(v) => v.len(),
            Column::Vector(v) => v.len(),
            Column::Enum8(v) => v.len(),
            Column::Enum16(v) => v.len(),
        };
        len / arity.max(1)
    }

    /// Read the logical value at `slot` for a scalar (arity-1) column.
    pub fn read_scalar(&self, slot: usize) -> Value {
        match self {
            Column::Int8(v) => Value::Int(v[slot] as i64),
            Column::Int16(v) => Value::Int(v[slot] as i64),
            Column::Float32(v) => Value::Float(v[slot] as f64),
            Column::Float64(v) => Value::Float(v[slot]),
            Column::Boolean(v) => Value::Bool(v[slot] != 0),
            Column::EntityRef(v) => {
                let slot_idx = v[slot];
                if slot_idx < 0 {
                    Value::EntityRef(None)
                } else {
                    // Resolution to a live handle happens one layer up, where the
                    // entity manager is reachable; here we only expose the raw slot.
                    Value::Int(slot_idx as i64)
                }
            }
            Column::Str(v) => Value::Str(v[slot].clone()),
            Column::Object(v) => v[slot]
                .clone()
                .map(Value::Object)
                .unwrap_or(Value::EntityRef(None)),
            Column::Enum8(v) => Value::Enum(v[slot] as i64),
            Column::Enum16(v) => Value::Enum(v[slot] as i64),
            Column::Vector(_) => panic!("read_scalar called on a vector column"),
        }
    }

    /// Read the raw `-1`-sentinel slot index out of an `EntityRef` column.
    pub fn read_entity_ref_raw(&self, slot: usize) -> i32 {
        match self {
            Column::EntityRef(v) => v[slot],
            _ => panic!("read_entity_ref_raw called on a non-EntityRef column"),
        }
    }

    /// Read the `arity` lanes of a vector column at `slot`.
    pub fn read_vector(&self, slot: usize, arity: usize) -> Vec<f32> {
        match self {
            Column::Vector(v) => v[slot * arity..slot * arity + arity].to_vec(),
            _ => panic!("read_vector called on a non-vector column"),
        }
    }

    /// Mutable view over the `arity` lanes of a vector column at `slot`.
    pub fn vector_lanes_mut(&mut self, slot: usize, arity: usize) -> &mut [f32] {
        match self {
            Column::Vector(v) => &mut v[slot * arity..slot * arity + arity],
            _ => panic!("vector_lanes_mut called on a non-vector column"),
        }
    }

    pub fn write_scalar(&mut self, slot: usize, value: &Value) {
        match self {
            Column::Int8(v) => v[slot] = expect_int(value) as i8,
            Column::Int16(v) => v[slot] = expect_int(value) as i16,
            Column::Float32(v) => v[slot] = expect_float(value) as f32,
            Column::Float64(v) => v[slot] = expect_float(value),
            Column::Boolean(v) => v[slot] = if expect_bool(value) { 1 } else { 0 },
            Column::EntityRef(v) => v[slot] = expect_entity_slot(value),
            Column::Str(v) => v[slot] = expect_str(value).to_string(),
            Column::Object(v) => v[slot] = Some(expect_object(value).clone()),
            Column::Enum8(v) => v[slot] = expect_enum(value) as i8,
            Column::Enum16(v) => v[slot] = expect_enum(value) as i16,
            Column::Vector(_) => panic!("write_scalar called on a vector column"),
        }
    }

    pub fn write_vector(&mut self, slot: usize, arity: usize, lanes: &[f32]) {
        match self {
            Column::Vector(v) => {
                v[slot * arity..slot * arity + arity].copy_from_slice(&lanes[..arity])
            }
            _ => panic!("write_vector called on a non-vector column"),
        }
    }
}

fn expect_int(value: &Value) -> i64 {
    match value {
        Value::Int(i) => *i,
        Value::Float(f) => *f as i64,
        other => panic!("expected an integer value, got {other:?}"),
    }
}

fn expect_float(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        Value::Int(i) => *i as f64,
        other => panic!("expected a float value, got {other:?}"),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => panic!("expected a boolean value, got {other:?}"),
    }
}

fn expect_str(value: &Value) -> &str {
    match value {
        Value::Str(s) => s,
        other => panic!("expected a string value, got {other:?}"),
    }
}

fn expect_object(value: &Value) -> &ObjectHandle {
    match value {
        Value::Object(o) => o,
        other => panic!("expected an object value, got {other:?}"),
    }
}

fn expect_enum(value: &Value) -> i64 {
    match value {
        Value::Enum(i) | Value::Int(i) => *i,
        other => panic!("expected an enum value, got {other:?}"),
    }
}

fn expect_entity_slot(value: &Value) -> i32 {
    match value {
        Value::EntityRef(None) => -1,
        Value::EntityRef(Some(e)) => e.slot() as i32,
        Value::Int(i) if *i < 0 => -1,
        Value::Int(i) => *i as i32,
        other => panic!("expected an entity reference value, got {other:?}"),
    }
}
