//! Tensor codec for the synapse exchange protocol.
//!
//! Converts in-memory multi-dimensional data into a self-describing
//! `{dtype, shape, buffer}` triple and back.
//!
//! - **DType registry**: bare and namespace-qualified dtype spellings
//! - **Shape casting**: canonical `"[d0, d1, ...]"` wire strings
//! - **Tensor**: one payload form plus validated metadata
//! - **Codec**: exact serialize/deserialize round trips
//! - **Factory**: one entry point for nested sequences, arrays and tensors
//!
//! # Example
//!
//! ```rust
//! use synapse_tensor::{Array, Tensor, TensorFactory};
//!
//! let array = Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]).unwrap();
//! let tensor = TensorFactory::create(array.clone()).unwrap();
//!
//! assert_eq!(tensor.dtype(), "torch.float32");
//! assert_eq!(tensor.shape(), "[2, 3]");
//! assert_eq!(tensor.deserialize().unwrap(), array);
//! ```

pub mod array;
pub mod codec;
pub mod dtype;
pub mod error;
pub mod factory;
mod nested;
pub mod shape;
pub mod tensor;

pub use array::Array;
pub use codec::{deserialize, serialize};
pub use dtype::{cast_dtype, Complex, Complex128, Complex32, Complex64, DType, DTypeInput, Element};
pub use error::{Result, TensorError};
pub use factory::{TensorFactory, TensorInput};
pub use shape::{cast_shape, Shape, ShapeInput, SHAPE_NONE};
pub use tensor::{NdArray, Payload, Tensor, WireTensor};

/// Re-export half crate types for convenience
pub use half::f16;
