//! Buffer serialization.
//!
//! The buffer is the base64 text of the array's raw little-endian bytes in
//! row-major order. The dtype names the element width and the shape names
//! the extents; together they are enough to rebuild the array exactly.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;

use crate::array::Array;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::tensor::{Payload, Tensor};

/// Encode a native array into a buffer-form tensor.
///
/// The dtype is recorded by its qualified name and the shape in its
/// bracketed form. Any rank, including rank 0 and zero-length arrays, is
/// handled the same way.
pub fn serialize(array: &Array) -> Tensor {
    Tensor::from_parts(
        BASE64.encode(array.as_bytes()),
        array.dtype().qualified_name().to_string(),
        array.shape().to_string(),
    )
}

/// Decode a buffer-form tensor into a native array.
///
/// A `"None"` shape decodes to a flat one-dimensional array.
pub fn deserialize(tensor: &Tensor) -> Result<Array> {
    let Payload::Buffer(encoded) = tensor.payload() else {
        return Err(TensorError::TypeMismatch {
            expected: "buffer payload",
            found: tensor.payload().kind().to_string(),
        });
    };

    let dtype = tensor.element_kind()?;
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| TensorError::DecodeFailure(format!("buffer is not valid base64: {e}")))?;

    let shape = match Shape::parse(tensor.shape())? {
        Some(shape) => shape,
        None => {
            if bytes.len() % dtype.element_size() != 0 {
                return Err(TensorError::DecodeFailure(format!(
                    "{} bytes is not a whole number of {} elements",
                    bytes.len(),
                    dtype
                )));
            }
            Shape::new(vec![bytes.len() / dtype.element_size()])
        }
    };

    Array::from_bytes(dtype, shape, Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{Complex128, DType};
    use half::f16;

    #[test]
    fn test_serialize_records_metadata() {
        let array = Array::from_vec(vec![1i32, 2, 3, 4, 5, 6], [2, 3]).unwrap();
        let tensor = serialize(&array);

        assert!(tensor.is_buffer());
        assert_eq!(tensor.dtype(), "torch.int32");
        assert_eq!(tensor.shape(), "[2, 3]");
        assert_eq!(deserialize(&tensor).unwrap(), array);
    }

    #[test]
    fn test_roundtrip_every_rank() {
        let arrays = vec![
            Array::scalar(7.25f64),
            Array::vector(&[f16::from_f32(1.5), f16::from_f32(-2.0)]),
            Array::from_vec(vec![1u8, 2, 3, 4], [2, 2]).unwrap(),
            Array::from_vec((0..24i64).collect::<Vec<_>>(), [2, 3, 4]).unwrap(),
            Array::from_vec(vec![Complex128::new(1.0, -1.0); 3], [3, 1, 1, 1]).unwrap(),
            Array::zeros(DType::Float32, [0]).unwrap(),
            Array::zeros(DType::Bool, [3, 0, 2]).unwrap(),
        ];

        for array in arrays {
            assert_eq!(deserialize(&serialize(&array)).unwrap(), array);
        }
    }

    #[test]
    fn test_invalid_buffer_is_decode_failure() {
        let tensor = Tensor::buffer("invalid", "float32", [3]).unwrap();
        assert!(matches!(
            deserialize(&tensor),
            Err(TensorError::DecodeFailure(_))
        ));

        // valid base64, wrong byte count
        let tensor = Tensor::buffer(BASE64.encode([0u8; 5]), "float32", [3]).unwrap();
        assert!(matches!(
            deserialize(&tensor),
            Err(TensorError::DecodeFailure(_))
        ));
    }

    #[test]
    fn test_overflowing_shape_is_decode_failure() {
        for shape in ["[18446744073709551615, 2]", "[9223372036854775808, 2]"] {
            let tensor = Tensor::buffer("", "float32", shape).unwrap();
            assert!(matches!(
                deserialize(&tensor),
                Err(TensorError::DecodeFailure(_))
            ));
        }
    }

    #[test]
    fn test_empty_shape_text_is_rejected() {
        for shape in ["", "()"] {
            let tensor = Tensor::buffer(BASE64.encode(1.0f32.to_le_bytes()), "float32", shape).unwrap();
            assert!(matches!(
                deserialize(&tensor),
                Err(TensorError::InvalidShape(_))
            ));
        }
    }

    #[test]
    fn test_none_shape_decodes_flat() {
        let tensor = Tensor::buffer(BASE64.encode([1u8, 0, 2, 0]), "torch.int16", "None").unwrap();
        let array = deserialize(&tensor).unwrap();
        assert_eq!(array.dims(), &[2]);
        assert_eq!(array.to_vec::<i16>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_bare_and_qualified_decode_alike() {
        let encoded = BASE64.encode(1.0f32.to_le_bytes());
        let bare = Tensor::buffer(encoded.clone(), "float32", [1]).unwrap();
        let qualified = Tensor::buffer(encoded, "torch.float", [1]).unwrap();
        assert_eq!(deserialize(&bare).unwrap(), deserialize(&qualified).unwrap());
    }

    #[test]
    fn test_structured_payload_is_rejected() {
        let tensor = Tensor::vector([1, 2], "int64", [2]).unwrap();
        assert!(matches!(
            deserialize(&tensor),
            Err(TensorError::TypeMismatch { .. })
        ));
    }
}
