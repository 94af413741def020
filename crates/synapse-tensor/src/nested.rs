//! Nested JSON sequences as tensor payloads.

use bytes::{BufMut, Bytes, BytesMut};
use half::f16;
use serde_json::Value;

use crate::array::Array;
use crate::dtype::{DType, Element};
use crate::error::{value_kind, Result, TensorError};

/// Extents of a nested sequence; `None` when it is ragged.
pub(crate) fn extents(value: &Value) -> Option<Vec<usize>> {
    match value {
        Value::Array(items) => sequence_extents(items),
        _ => Some(Vec::new()),
    }
}

pub(crate) fn sequence_extents(items: &[Value]) -> Option<Vec<usize>> {
    let mut iter = items.iter();
    let Some(first) = iter.next() else {
        return Some(vec![0]);
    };

    let inner = extents(first)?;
    for item in iter {
        if extents(item)? != inner {
            return None;
        }
    }

    let mut dims = Vec::with_capacity(inner.len() + 1);
    dims.push(items.len());
    dims.extend(inner);
    Some(dims)
}

/// Element kind implied by the leaves of a nested sequence.
///
/// Any float leaf gives `float32`, otherwise any number gives `int64`, and
/// all-boolean input gives `bool`. An empty sequence is `float32`.
pub(crate) fn infer_dtype(value: &Value) -> Result<DType> {
    #[derive(Default)]
    struct Leaves {
        float: bool,
        number: bool,
        boolean: bool,
    }

    fn scan(value: &Value, leaves: &mut Leaves) -> Result<()> {
        match value {
            Value::Array(items) => items.iter().try_for_each(|item| scan(item, leaves)),
            Value::Bool(_) => {
                leaves.boolean = true;
                Ok(())
            }
            Value::Number(n) => {
                leaves.number = true;
                leaves.float |= n.is_f64();
                Ok(())
            }
            other => Err(TensorError::TypeMismatch {
                expected: "numeric or boolean element",
                found: value_kind(other).to_string(),
            }),
        }
    }

    let mut leaves = Leaves::default();
    scan(value, &mut leaves)?;

    Ok(if leaves.float {
        DType::Float32
    } else if leaves.number {
        DType::Int64
    } else if leaves.boolean {
        DType::Bool
    } else {
        DType::Float32
    })
}

/// Fails for element kinds a JSON leaf cannot express.
pub(crate) fn check_encodable(dtype: DType, spelling: &str) -> Result<()> {
    if dtype.is_complex() {
        return Err(TensorError::InvalidDType(format!(
            "{spelling} cannot hold plain numeric elements"
        )));
    }
    Ok(())
}

/// Append every leaf of `value`, depth first, as `dtype`.
pub(crate) fn encode_into(value: &Value, dtype: DType, buf: &mut BytesMut) -> Result<()> {
    match value {
        Value::Array(items) => items.iter().try_for_each(|item| encode_into(item, dtype, buf)),
        leaf => encode_leaf(leaf, dtype, buf),
    }
}

/// Build an array from a rectangular nested sequence.
pub(crate) fn to_array(value: &Value, dtype: DType) -> Result<Array> {
    check_encodable(dtype, dtype.name())?;
    let dims = extents(value).ok_or_else(|| TensorError::ShapeMismatch {
        declared: "rectangular sequence".to_string(),
        actual: "ragged sequence".to_string(),
    })?;

    let mut buf = BytesMut::new();
    encode_into(value, dtype, &mut buf)?;
    Array::from_bytes(dtype, dims, buf.freeze())
}

/// Encode a flat run of leaves.
pub(crate) fn encode_leaves(items: &[Value], dtype: DType) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(items.len() * dtype.element_size());
    for item in items {
        encode_into(item, dtype, &mut buf)?;
    }
    Ok(buf.freeze())
}

fn encode_leaf<B: BufMut>(leaf: &Value, dtype: DType, buf: &mut B) -> Result<()> {
    let mismatch = || TensorError::TypeMismatch {
        expected: dtype.name(),
        found: leaf.to_string(),
    };

    match dtype {
        // Narrowing must not round a finite value to infinity.
        DType::Float16 => {
            let value = f16::from_f64(as_float(leaf).ok_or_else(mismatch)?);
            if value.is_infinite() {
                return Err(mismatch());
            }
            value.put_le(buf)
        }
        DType::Float32 => {
            let value = as_float(leaf).ok_or_else(mismatch)? as f32;
            if value.is_infinite() {
                return Err(mismatch());
            }
            value.put_le(buf)
        }
        DType::Float64 => as_float(leaf).ok_or_else(mismatch)?.put_le(buf),
        DType::Int8 => i8::try_from(as_integer(leaf).ok_or_else(mismatch)?)
            .map_err(|_| mismatch())?
            .put_le(buf),
        DType::Int16 => i16::try_from(as_integer(leaf).ok_or_else(mismatch)?)
            .map_err(|_| mismatch())?
            .put_le(buf),
        DType::Int32 => i32::try_from(as_integer(leaf).ok_or_else(mismatch)?)
            .map_err(|_| mismatch())?
            .put_le(buf),
        DType::Int64 => as_integer(leaf).ok_or_else(mismatch)?.put_le(buf),
        DType::UInt8 => u8::try_from(as_integer(leaf).ok_or_else(mismatch)?)
            .map_err(|_| mismatch())?
            .put_le(buf),
        DType::Bool => as_bool(leaf).ok_or_else(mismatch)?.put_le(buf),
        DType::Complex32 | DType::Complex64 | DType::Complex128 => {
            return check_encodable(dtype, dtype.name());
        }
    }
    Ok(())
}

fn as_float(leaf: &Value) -> Option<f64> {
    match leaf {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn as_integer(leaf: &Value) -> Option<i64> {
    match leaf {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn as_bool(leaf: &Value) -> Option<bool> {
    match leaf {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}
