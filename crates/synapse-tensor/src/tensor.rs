//! The tensor value object.
//!
//! A [`Tensor`] holds exactly one payload form together with a validated
//! dtype string and shape string. The structured forms (scalar, vector,
//! matrix, ndarray) are in-memory conveniences; only the buffer form
//! travels, as a [`WireTensor`].

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::array::Array;
use crate::codec;
use crate::dtype::{cast_dtype, DType, DTypeInput};
use crate::error::{Result, TensorError};
use crate::nested;
use crate::shape::{cast_shape, Shape, ShapeInput};

/// An n-dimensional payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NdArray {
    /// Nested JSON sequence of any rank
    Nested(Value),
    /// Native array
    Native(Array),
}

impl From<Value> for NdArray {
    fn from(value: Value) -> Self {
        NdArray::Nested(value)
    }
}

impl From<Array> for NdArray {
    fn from(array: Array) -> Self {
        NdArray::Native(array)
    }
}

/// The single populated payload of a tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Scalar(Value),
    Vector(Vec<Value>),
    /// Rows of equal length
    Matrix(Vec<Vec<Value>>),
    NdArray(NdArray),
    /// Base64 text of the raw little-endian element bytes
    Buffer(String),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Scalar(_) => "scalar",
            Payload::Vector(_) => "vector",
            Payload::Matrix(_) => "matrix",
            Payload::NdArray(_) => "ndarray",
            Payload::Buffer(_) => "buffer",
        }
    }
}

/// A payload with its dtype and shape metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    payload: Payload,
    dtype: String,
    shape: String,
}

impl Tensor {
    /// Validates dtype and shape, then checks the payload extents against
    /// the declared shape.
    ///
    /// Buffer payloads are not inspected here; a broken buffer surfaces as
    /// [`TensorError::DecodeFailure`] from [`Tensor::deserialize`].
    pub fn new(
        payload: Payload,
        dtype: Option<DTypeInput>,
        shape: Option<ShapeInput>,
    ) -> Result<Self> {
        let dtype = cast_dtype(dtype)?
            .ok_or_else(|| TensorError::InvalidDType("a dtype is required".to_string()))?;
        let shape = cast_shape(shape)?;

        let tensor = Self {
            payload,
            dtype,
            shape,
        };
        tensor.validate()?;
        Ok(tensor)
    }

    pub fn scalar(
        value: impl Into<Value>,
        dtype: impl Into<DTypeInput>,
        shape: impl Into<ShapeInput>,
    ) -> Result<Self> {
        Self::new(
            Payload::Scalar(value.into()),
            Some(dtype.into()),
            Some(shape.into()),
        )
    }

    pub fn vector<V: Into<Value>>(
        values: impl IntoIterator<Item = V>,
        dtype: impl Into<DTypeInput>,
        shape: impl Into<ShapeInput>,
    ) -> Result<Self> {
        let values = values.into_iter().map(Into::into).collect();
        Self::new(Payload::Vector(values), Some(dtype.into()), Some(shape.into()))
    }

    pub fn matrix<R, V>(
        rows: impl IntoIterator<Item = R>,
        dtype: impl Into<DTypeInput>,
        shape: impl Into<ShapeInput>,
    ) -> Result<Self>
    where
        R: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        Self::new(Payload::Matrix(rows), Some(dtype.into()), Some(shape.into()))
    }

    pub fn ndarray(
        array: impl Into<NdArray>,
        dtype: impl Into<DTypeInput>,
        shape: impl Into<ShapeInput>,
    ) -> Result<Self> {
        Self::new(
            Payload::NdArray(array.into()),
            Some(dtype.into()),
            Some(shape.into()),
        )
    }

    pub fn buffer(
        encoded: impl Into<String>,
        dtype: impl Into<DTypeInput>,
        shape: impl Into<ShapeInput>,
    ) -> Result<Self> {
        Self::new(
            Payload::Buffer(encoded.into()),
            Some(dtype.into()),
            Some(shape.into()),
        )
    }

    /// Assembles an already-validated buffer tensor.
    pub(crate) fn from_parts(buffer: String, dtype: String, shape: String) -> Self {
        Self {
            payload: Payload::Buffer(buffer),
            dtype,
            shape,
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Dtype string exactly as validated.
    pub fn dtype(&self) -> &str {
        &self.dtype
    }

    /// Shape string exactly as validated.
    pub fn shape(&self) -> &str {
        &self.shape
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self.payload, Payload::Buffer(_))
    }

    /// Element kind named by the dtype string.
    pub fn element_kind(&self) -> Result<DType> {
        self.dtype.parse()
    }

    /// Encode a native array into buffer form.
    pub fn serialize(array: &Array) -> Tensor {
        codec::serialize(array)
    }

    /// Decode a buffer-form tensor into a native array.
    pub fn deserialize(&self) -> Result<Array> {
        codec::deserialize(self)
    }

    /// Materialize any payload form as a native array.
    pub fn to_array(&self) -> Result<Array> {
        let kind = self.element_kind()?;
        let data = match &self.payload {
            Payload::Buffer(_) => return codec::deserialize(self),
            Payload::NdArray(NdArray::Native(array)) => return Ok(array.clone()),
            Payload::Scalar(value) | Payload::NdArray(NdArray::Nested(value)) => {
                let mut buf = BytesMut::new();
                nested::encode_into(value, kind, &mut buf)?;
                buf.freeze()
            }
            Payload::Vector(items) => nested::encode_leaves(items, kind)?,
            Payload::Matrix(rows) => {
                let mut buf = BytesMut::new();
                for row in rows {
                    buf.extend_from_slice(&nested::encode_leaves(row, kind)?);
                }
                buf.freeze()
            }
        };

        let shape = self.declared_shape()?;
        Array::from_bytes(kind, shape, data)
    }

    /// Collapse the payload into buffer form, keeping the dtype and shape
    /// strings as given.
    pub fn to_buffer(&self) -> Result<Tensor> {
        if self.is_buffer() {
            return Ok(self.clone());
        }
        let array = self.to_array()?;
        Ok(Self::from_parts(
            BASE64.encode(array.as_bytes()),
            self.dtype.clone(),
            self.shape.clone(),
        ))
    }

    /// The on-wire `{dtype, shape, buffer}` triple.
    pub fn into_wire(self) -> Result<WireTensor> {
        let tensor = if self.is_buffer() { self } else { self.to_buffer()? };
        let Tensor {
            payload,
            dtype,
            shape,
        } = tensor;
        match payload {
            Payload::Buffer(buffer) => Ok(WireTensor {
                dtype,
                shape,
                buffer,
            }),
            other => Err(TensorError::TypeMismatch {
                expected: "buffer payload",
                found: other.kind().to_string(),
            }),
        }
    }

    fn declared_shape(&self) -> Result<Shape> {
        Shape::parse(&self.shape)?.ok_or_else(|| TensorError::ShapeMismatch {
            declared: self.shape.clone(),
            actual: format!("{} payload", self.payload.kind()),
        })
    }

    fn mismatch(&self, actual: impl Into<String>) -> TensorError {
        TensorError::ShapeMismatch {
            declared: self.shape.clone(),
            actual: actual.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        let kind = self.element_kind()?;

        let actual = match &self.payload {
            Payload::Buffer(_) => return Ok(()),
            Payload::NdArray(NdArray::Native(array)) => {
                if array.dtype() != kind {
                    return Err(TensorError::InvalidDType(format!(
                        "{} does not describe a {} array",
                        self.dtype,
                        array.dtype()
                    )));
                }
                array.dims().to_vec()
            }
            payload if kind.is_complex() => {
                return Err(TensorError::InvalidDType(format!(
                    "{} cannot hold {} elements",
                    self.dtype,
                    payload.kind()
                )));
            }
            Payload::Scalar(value) => {
                if value.is_array() {
                    return Err(self.mismatch("sequence given as scalar"));
                }
                Vec::new()
            }
            Payload::Vector(items) => {
                if items.iter().any(Value::is_array) {
                    return Err(self.mismatch("nested sequence given as vector"));
                }
                vec![items.len()]
            }
            Payload::Matrix(rows) => matrix_extents(rows).ok_or_else(|| self.mismatch("ragged rows"))?,
            Payload::NdArray(NdArray::Nested(value)) => {
                nested::extents(value).ok_or_else(|| self.mismatch("ragged sequence"))?
            }
        };

        let declared = Shape::parse(&self.shape)
            .ok()
            .flatten()
            .ok_or_else(|| self.mismatch(Shape::new(actual.clone()).to_string()))?;

        // a single value may be declared as rank 0 or as one element
        let scalar_as_one = actual.is_empty() && declared.dims() == [1];
        if declared.dims() != actual.as_slice() && !scalar_as_one {
            return Err(self.mismatch(Shape::new(actual).to_string()));
        }
        Ok(())
    }
}

fn matrix_extents(rows: &[Vec<Value>]) -> Option<Vec<usize>> {
    let cols = rows.first().map_or(0, Vec::len);
    let rectangular = rows
        .iter()
        .all(|row| row.len() == cols && !row.iter().any(Value::is_array));
    rectangular.then(|| vec![rows.len(), cols])
}

/// The only on-wire representation of a tensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireTensor {
    pub dtype: String,
    pub shape: String,
    pub buffer: String,
}

impl TryFrom<WireTensor> for Tensor {
    type Error = TensorError;

    fn try_from(wire: WireTensor) -> Result<Self> {
        Tensor::buffer(wire.buffer, wire.dtype, wire.shape)
    }
}
