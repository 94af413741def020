//! Normalization of external tensor representations.

use serde_json::Value;
use tracing::debug;

use crate::array::Array;
use crate::codec;
use crate::dtype::{DType, Element};
use crate::error::Result;
use crate::nested;
use crate::tensor::Tensor;

/// The closed set of inputs [`TensorFactory::create`] accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorInput {
    /// Nested sequence; dtype and shape are inferred from its contents
    Nested(Value),
    /// Typed native array; its dtype is kept
    Array(Array),
    /// Already-built tensor; its dtype and shape strings are kept
    Tensor(Tensor),
}

impl From<Value> for TensorInput {
    fn from(value: Value) -> Self {
        TensorInput::Nested(value)
    }
}

impl From<Array> for TensorInput {
    fn from(array: Array) -> Self {
        TensorInput::Array(array)
    }
}

impl From<Tensor> for TensorInput {
    fn from(tensor: Tensor) -> Self {
        TensorInput::Tensor(tensor)
    }
}

impl<T: Element> From<Vec<T>> for TensorInput {
    fn from(values: Vec<T>) -> Self {
        TensorInput::Array(Array::vector(&values))
    }
}

/// Builds buffer-form tensors from heterogeneous inputs.
pub struct TensorFactory;

impl TensorFactory {
    /// Normalize `input` into a buffer-form tensor.
    ///
    /// ```rust
    /// use serde_json::json;
    /// use synapse_tensor::TensorFactory;
    ///
    /// let tensor = TensorFactory::create(json!([1, 2, 3])).unwrap();
    /// assert_eq!(tensor.dtype(), "torch.int64");
    /// assert_eq!(tensor.deserialize().unwrap().to_vec::<i64>().unwrap(), vec![1, 2, 3]);
    /// ```
    pub fn create(input: impl Into<TensorInput>) -> Result<Tensor> {
        let tensor = match input.into() {
            TensorInput::Nested(value) => {
                let dtype = nested::infer_dtype(&value)?;
                codec::serialize(&nested::to_array(&value, dtype)?)
            }
            TensorInput::Array(array) => codec::serialize(&array),
            TensorInput::Tensor(tensor) => tensor.to_buffer()?,
        };

        debug!(dtype = tensor.dtype(), shape = tensor.shape(), "normalized tensor");
        Ok(tensor)
    }

    /// Like [`TensorFactory::create`] for a nested sequence, with an explicit
    /// element kind instead of an inferred one.
    pub fn create_with_dtype(value: &Value, dtype: DType) -> Result<Tensor> {
        let tensor = codec::serialize(&nested::to_array(value, dtype)?);
        debug!(dtype = tensor.dtype(), shape = tensor.shape(), "normalized tensor");
        Ok(tensor)
    }
}
