//! Shape descriptors and their wire form.
//!
//! The canonical wire form of a shape is its bracketed decimal list,
//! `"[d0, d1, ..., dn]"`, and `"None"` when no shape is given.

use serde_json::Value;
use std::fmt;

use crate::error::{value_kind, Result, TensorError};

/// Wire form of an absent shape.
pub const SHAPE_NONE: &str = "None";

/// Ordered extents of a tensor, one per dimension.
///
/// The empty shape describes a rank-0 value holding one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self(dims)
    }

    /// Rank-0 shape.
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements, saturating at `usize::MAX`.
    #[inline]
    pub fn numel(&self) -> usize {
        self.checked_numel().unwrap_or(usize::MAX)
    }

    /// Total number of elements, or `None` if the product overflows.
    pub fn checked_numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// Size in bytes of a dense `element_size`-byte array of this shape.
    pub fn checked_byte_len(&self, element_size: usize) -> Option<usize> {
        self.checked_numel()?.checked_mul(element_size)
    }

    pub fn into_dims(self) -> Vec<usize> {
        self.0
    }

    /// Parse a shape string into extents.
    ///
    /// Accepts `"[1, 2]"`, `"(1, 2)"`, `"(1,)"`, `"1, 2"` and `"[]"`.
    /// `"None"` parses to `Ok(None)`. Rank 0 must be spelled `"[]"`; empty
    /// text and `"()"` are rejected.
    pub fn parse(text: &str) -> Result<Option<Shape>> {
        let trimmed = text.trim();
        if trimmed == SHAPE_NONE {
            return Ok(None);
        }

        let inner = match (trimmed.chars().next(), trimmed.chars().last()) {
            (Some('['), Some(']')) => &trimmed[1..trimmed.len() - 1],
            (Some('('), Some(')')) => {
                let inner = &trimmed[1..trimmed.len() - 1];
                if inner.trim().is_empty() {
                    return Err(TensorError::InvalidShape(text.to_string()));
                }
                inner
            }
            _ if trimmed.is_empty() => return Err(TensorError::InvalidShape(text.to_string())),
            _ => trimmed,
        };

        let mut dims = Vec::new();
        let mut items = inner.split(',').map(str::trim).peekable();
        while let Some(item) = items.next() {
            // a single trailing comma, as in "(3,)"
            if item.is_empty() && items.peek().is_none() {
                break;
            }
            let dim = item
                .parse::<usize>()
                .map_err(|_| TensorError::InvalidShape(text.to_string()))?;
            dims.push(dim);
        }
        Ok(Some(Shape(dims)))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_dims(&self.0))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

fn format_dims<D: fmt::Display>(dims: &[D]) -> String {
    let parts: Vec<String> = dims.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

/// Input accepted by [`cast_shape`].
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeInput {
    /// An integer sequence; negative entries are kept as given
    Dims(Vec<i64>),
    /// Any other value; strings pass through, integer arrays are rendered
    Value(Value),
}

impl From<Vec<i64>> for ShapeInput {
    fn from(dims: Vec<i64>) -> Self {
        ShapeInput::Dims(dims)
    }
}

impl<const N: usize> From<[i64; N]> for ShapeInput {
    fn from(dims: [i64; N]) -> Self {
        ShapeInput::Dims(dims.to_vec())
    }
}

impl From<&Shape> for ShapeInput {
    fn from(shape: &Shape) -> Self {
        ShapeInput::Value(Value::String(shape.to_string()))
    }
}

impl From<Shape> for ShapeInput {
    fn from(shape: Shape) -> Self {
        ShapeInput::from(&shape)
    }
}

impl From<Value> for ShapeInput {
    fn from(value: Value) -> Self {
        ShapeInput::Value(value)
    }
}

impl From<&str> for ShapeInput {
    fn from(value: &str) -> Self {
        ShapeInput::Value(Value::String(value.to_string()))
    }
}

impl From<String> for ShapeInput {
    fn from(value: String) -> Self {
        ShapeInput::Value(Value::String(value))
    }
}

/// Cast a shape descriptor to its wire string.
///
/// Strings are returned unchanged and are not re-validated: a caller that
/// supplies a string is trusted to supply a canonical one. Malformed shape
/// text is only detected when the shape is used, for instance by
/// [`Shape::parse`] during decoding.
///
/// ```rust
/// use synapse_tensor::cast_shape;
///
/// assert_eq!(cast_shape(None).unwrap(), "None");
/// assert_eq!(cast_shape(Some(vec![1, 2, 3].into())).unwrap(), "[1, 2, 3]");
/// assert_eq!(cast_shape(Some("1, 2, 3".into())).unwrap(), "1, 2, 3");
/// ```
pub fn cast_shape(input: Option<ShapeInput>) -> Result<String> {
    let dims = match input {
        None | Some(ShapeInput::Value(Value::Null)) => return Ok(SHAPE_NONE.to_string()),
        Some(ShapeInput::Value(Value::String(text))) => return Ok(text),
        Some(ShapeInput::Dims(dims)) => dims,
        Some(ShapeInput::Value(Value::Array(items))) => integer_items(&items)?,
        Some(ShapeInput::Value(other)) => {
            return Err(TensorError::TypeMismatch {
                expected: "integer sequence or shape string",
                found: value_kind(&other).to_string(),
            })
        }
    };
    Ok(format_dims(&dims))
}

fn integer_items(items: &[Value]) -> Result<Vec<i64>> {
    items
        .iter()
        .map(|item| match item {
            Value::Number(n) => n.as_i64().ok_or_else(|| non_integer(item)),
            other => Err(non_integer(other)),
        })
        .collect()
}

fn non_integer(item: &Value) -> TensorError {
    TensorError::InvalidShape(format!(
        "shape element {item} is a {}, not an integer",
        value_kind(item)
    ))
}
