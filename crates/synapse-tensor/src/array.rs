//! Native in-memory arrays.
//!
//! An [`Array`] is the codec's native form: a dtype, a shape, and the
//! elements as contiguous little-endian bytes in row-major (C) order.

use bytes::{Bytes, BytesMut};

use crate::dtype::{DType, Element};
use crate::error::{Result, TensorError};
use crate::shape::Shape;

/// A dense array with owned data.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    dtype: DType,
    shape: Shape,
    data: Bytes,
}

impl Array {
    /// Creates an array from typed elements laid out in row-major order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use synapse_tensor::{Array, DType};
    ///
    /// let array = Array::from_vec(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]).unwrap();
    /// assert_eq!(array.dtype(), DType::Float32);
    /// assert_eq!(array.numel(), 6);
    /// assert_eq!(array.byte_size(), 24);
    /// ```
    pub fn from_vec<T: Element>(values: Vec<T>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if values.len() != shape.numel() {
            return Err(TensorError::ShapeMismatch {
                declared: shape.to_string(),
                actual: format!("{} elements", values.len()),
            });
        }

        let mut data = BytesMut::with_capacity(values.len() * T::DTYPE.element_size());
        for value in values {
            value.put_le(&mut data);
        }
        Ok(Self {
            dtype: T::DTYPE,
            shape,
            data: data.freeze(),
        })
    }

    /// One-dimensional array over `values`.
    pub fn vector<T: Element>(values: &[T]) -> Self {
        let mut data = BytesMut::with_capacity(values.len() * T::DTYPE.element_size());
        for &value in values {
            value.put_le(&mut data);
        }
        Self {
            dtype: T::DTYPE,
            shape: Shape::new(vec![values.len()]),
            data: data.freeze(),
        }
    }

    /// Rank-0 array holding one value.
    pub fn scalar<T: Element>(value: T) -> Self {
        let mut data = BytesMut::with_capacity(T::DTYPE.element_size());
        value.put_le(&mut data);
        Self {
            dtype: T::DTYPE,
            shape: Shape::scalar(),
            data: data.freeze(),
        }
    }

    /// Wraps raw bytes, checking their length against dtype and shape.
    pub fn from_bytes(dtype: DType, shape: impl Into<Shape>, data: Bytes) -> Result<Self> {
        let shape = shape.into();
        let expected = shape.checked_byte_len(dtype.element_size()).ok_or_else(|| {
            TensorError::DecodeFailure(format!(
                "a {} array of shape {} does not fit in memory",
                dtype, shape
            ))
        })?;
        if data.len() != expected {
            return Err(TensorError::DecodeFailure(format!(
                "{} bytes cannot hold a {} array of shape {} ({} bytes expected)",
                data.len(),
                dtype,
                shape,
                expected
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Creates a new array filled with zeros.
    pub fn zeros(dtype: DType, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        let len = shape
            .checked_byte_len(dtype.element_size())
            .ok_or_else(|| TensorError::InvalidShape(shape.to_string()))?;
        Ok(Self {
            dtype,
            shape,
            data: Bytes::from(vec![0u8; len]),
        })
    }

    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Returns the total number of elements.
    #[inline]
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Alias of [`Array::numel`].
    #[inline]
    pub fn nelement(&self) -> usize {
        self.numel()
    }

    /// Returns the total size in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Copies the elements out as `T`, which must match the array's dtype.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::TypeMismatch {
                expected: self.dtype.name(),
                found: T::DTYPE.name().to_string(),
            });
        }

        let mut cursor = &self.data[..];
        Ok((0..self.numel()).map(|_| T::get_le(&mut cursor)).collect())
    }

    /// Same elements under a new shape with the same element count.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if shape.numel() != self.numel() {
            return Err(TensorError::ShapeMismatch {
                declared: shape.to_string(),
                actual: self.shape.to_string(),
            });
        }
        Ok(Self {
            dtype: self.dtype,
            shape,
            data: self.data.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Complex64;
    use half::f16;

    #[test]
    fn test_from_vec_checks_element_count() {
        let err = Array::from_vec(vec![1i32, 2, 3], [2, 2]).unwrap_err();
        assert!(matches!(err, TensorError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_typed_readback() {
        let array = Array::from_vec(vec![1i64, -2, 3, -4], [2, 2]).unwrap();
        assert_eq!(array.to_vec::<i64>().unwrap(), vec![1, -2, 3, -4]);
        assert!(matches!(
            array.to_vec::<i32>(),
            Err(TensorError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_scalar_is_rank_zero() {
        let array = Array::scalar(f16::from_f32(0.5));
        assert_eq!(array.ndim(), 0);
        assert_eq!(array.numel(), 1);
        assert_eq!(array.byte_size(), 2);
        assert_eq!(array.to_vec::<f16>().unwrap(), vec![f16::from_f32(0.5)]);
    }

    #[test]
    fn test_empty_vector() {
        let array = Array::vector::<f32>(&[]);
        assert_eq!(array.dims(), &[0]);
        assert_eq!(array.nelement(), 0);
        assert!(array.as_bytes().is_empty());
    }

    #[test]
    fn test_complex_layout() {
        let array = Array::vector(&[Complex64::new(1.0, 2.0)]);
        assert_eq!(array.byte_size(), 8);
        assert_eq!(&array.as_bytes()[..4], &1.0f32.to_le_bytes());
        assert_eq!(&array.as_bytes()[4..], &2.0f32.to_le_bytes());
    }

    #[test]
    fn test_from_bytes_length_check() {
        let err = Array::from_bytes(DType::Float32, [3], Bytes::from(vec![0u8; 10])).unwrap_err();
        assert!(matches!(err, TensorError::DecodeFailure(_)));

        let ok = Array::from_bytes(DType::Int16, [2, 2], Bytes::from(vec![0u8; 8])).unwrap();
        assert_eq!(ok, Array::zeros(DType::Int16, [2, 2]).unwrap());
    }

    #[test]
    fn test_reshape() {
        let array = Array::vector(&[1u8, 2, 3, 4, 5, 6]);
        let reshaped = array.reshape([3, 2]).unwrap();
        assert_eq!(reshaped.dims(), &[3, 2]);
        assert_eq!(reshaped.as_bytes(), array.as_bytes());
        assert!(array.reshape([4]).is_err());
    }
}
