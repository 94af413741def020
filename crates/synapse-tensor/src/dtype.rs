//! Data types for tensor elements.
//!
//! Every kind has one bare name (`"float32"`) and one namespace-qualified
//! wire name (`"torch.float32"`). Both spellings, and the common aliases
//! (`"float"`, `"long"`, `"cdouble"` ...), resolve to the same kind; casting
//! a string never rewrites one spelling into another.

use bytes::{Buf, BufMut};
use half::f16;
use serde_json::Value;
use std::str::FromStr;

use crate::error::{value_kind, Result, TensorError};

/// Namespace prefix of qualified dtype names.
pub const DTYPE_NAMESPACE: &str = "torch.";

/// Data type for tensor elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 16-bit IEEE 754 floating point
    Float16,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// Boolean (1 byte per element)
    Bool,
    /// Complex with two f16 parts
    Complex32,
    /// Complex with two f32 parts
    Complex64,
    /// Complex with two f64 parts
    Complex128,
}

impl DType {
    /// Every registered kind.
    pub const ALL: [DType; 12] = [
        DType::Float16,
        DType::Float32,
        DType::Float64,
        DType::Int8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::UInt8,
        DType::Bool,
        DType::Complex32,
        DType::Complex64,
        DType::Complex128,
    ];

    /// Returns the size in bytes of a single element of this data type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use synapse_tensor::DType;
    ///
    /// assert_eq!(DType::Float32.element_size(), 4);
    /// assert_eq!(DType::Complex64.element_size(), 8);
    /// assert_eq!(DType::Bool.element_size(), 1);
    /// ```
    #[inline]
    pub const fn element_size(&self) -> usize {
        match self {
            DType::Complex128 => 16,
            DType::Float64 | DType::Int64 | DType::Complex64 => 8,
            DType::Float32 | DType::Int32 | DType::Complex32 => 4,
            DType::Float16 | DType::Int16 => 2,
            DType::Int8 | DType::UInt8 | DType::Bool => 1,
        }
    }

    /// Bare canonical name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            DType::Float16 => "float16",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
            DType::Int8 => "int8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt8 => "uint8",
            DType::Bool => "bool",
            DType::Complex32 => "complex32",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        }
    }

    /// Namespace-qualified wire name, as produced for native dtype objects.
    #[inline]
    pub const fn qualified_name(&self) -> &'static str {
        match self {
            DType::Float16 => "torch.float16",
            DType::Float32 => "torch.float32",
            DType::Float64 => "torch.float64",
            DType::Int8 => "torch.int8",
            DType::Int16 => "torch.int16",
            DType::Int32 => "torch.int32",
            DType::Int64 => "torch.int64",
            DType::UInt8 => "torch.uint8",
            DType::Bool => "torch.bool",
            DType::Complex32 => "torch.complex32",
            DType::Complex64 => "torch.complex64",
            DType::Complex128 => "torch.complex128",
        }
    }

    /// Alternate bare spellings.
    pub const fn aliases(&self) -> &'static [&'static str] {
        match self {
            DType::Float16 => &["half"],
            DType::Float32 => &["float"],
            DType::Float64 => &["double"],
            DType::Int16 => &["short"],
            DType::Int32 => &["int"],
            DType::Int64 => &["long"],
            DType::Complex32 => &["chalf"],
            DType::Complex64 => &["cfloat"],
            DType::Complex128 => &["cdouble"],
            DType::Int8 | DType::UInt8 | DType::Bool => &[],
        }
    }

    #[inline]
    pub const fn is_floating_point(&self) -> bool {
        matches!(self, DType::Float16 | DType::Float32 | DType::Float64)
    }

    #[inline]
    pub const fn is_complex(&self) -> bool {
        matches!(
            self,
            DType::Complex32 | DType::Complex64 | DType::Complex128
        )
    }

    /// Resolve any recognized spelling, bare or qualified.
    pub fn lookup(spelling: &str) -> Option<DType> {
        let bare = spelling.strip_prefix(DTYPE_NAMESPACE).unwrap_or(spelling);
        DType::ALL
            .into_iter()
            .find(|dtype| dtype.name() == bare || dtype.aliases().contains(&bare))
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self> {
        DType::lookup(s).ok_or_else(|| TensorError::InvalidDType(s.to_string()))
    }
}

/// Input accepted by [`cast_dtype`].
#[derive(Debug, Clone, PartialEq)]
pub enum DTypeInput {
    /// A native dtype object
    Native(DType),
    /// Any other value; only strings are accepted
    Value(Value),
}

impl From<DType> for DTypeInput {
    fn from(dtype: DType) -> Self {
        DTypeInput::Native(dtype)
    }
}

impl From<Value> for DTypeInput {
    fn from(value: Value) -> Self {
        DTypeInput::Value(value)
    }
}

impl From<&str> for DTypeInput {
    fn from(value: &str) -> Self {
        DTypeInput::Value(Value::String(value.to_string()))
    }
}

impl From<String> for DTypeInput {
    fn from(value: String) -> Self {
        DTypeInput::Value(Value::String(value))
    }
}

/// Cast a dtype descriptor to its wire string.
///
/// Recognized strings come back unchanged, native dtypes map to their
/// qualified name, and absence stays absent.
///
/// ```rust
/// use synapse_tensor::{cast_dtype, DType};
///
/// assert_eq!(cast_dtype(None).unwrap(), None);
/// assert_eq!(cast_dtype(Some("float32".into())).unwrap().as_deref(), Some("float32"));
/// assert_eq!(cast_dtype(Some(DType::Int64.into())).unwrap().as_deref(), Some("torch.int64"));
/// ```
pub fn cast_dtype(input: Option<DTypeInput>) -> Result<Option<String>> {
    match input {
        None | Some(DTypeInput::Value(Value::Null)) => Ok(None),
        Some(DTypeInput::Native(dtype)) => Ok(Some(dtype.qualified_name().to_string())),
        Some(DTypeInput::Value(Value::String(spelling))) => {
            if DType::lookup(&spelling).is_some() {
                Ok(Some(spelling))
            } else {
                Err(TensorError::InvalidDType(spelling))
            }
        }
        Some(DTypeInput::Value(other)) => Err(TensorError::TypeMismatch {
            expected: "dtype string or dtype object",
            found: value_kind(&other).to_string(),
        }),
    }
}

/// Trait for types that can be used as tensor elements.
///
/// Elements are stored little-endian, row-major.
pub trait Element: Copy + Send + Sync + 'static {
    /// The DType corresponding to this element type.
    const DTYPE: DType;

    /// Append this element's little-endian bytes.
    fn put_le<B: BufMut>(self, buf: &mut B);

    /// Read one element; the caller guarantees enough bytes remain.
    fn get_le<B: Buf>(buf: &mut B) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:expr, $put:ident, $get:ident) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            fn put_le<B: BufMut>(self, buf: &mut B) {
                buf.$put(self);
            }

            fn get_le<B: Buf>(buf: &mut B) -> Self {
                buf.$get()
            }
        }
    };
}

impl_element!(f32, DType::Float32, put_f32_le, get_f32_le);
impl_element!(f64, DType::Float64, put_f64_le, get_f64_le);
impl_element!(i8, DType::Int8, put_i8, get_i8);
impl_element!(i16, DType::Int16, put_i16_le, get_i16_le);
impl_element!(i32, DType::Int32, put_i32_le, get_i32_le);
impl_element!(i64, DType::Int64, put_i64_le, get_i64_le);
impl_element!(u8, DType::UInt8, put_u8, get_u8);

impl Element for f16 {
    const DTYPE: DType = DType::Float16;

    fn put_le<B: BufMut>(self, buf: &mut B) {
        buf.put_u16_le(self.to_bits());
    }

    fn get_le<B: Buf>(buf: &mut B) -> Self {
        f16::from_bits(buf.get_u16_le())
    }
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn put_le<B: BufMut>(self, buf: &mut B) {
        buf.put_u8(self as u8);
    }

    fn get_le<B: Buf>(buf: &mut B) -> Self {
        buf.get_u8() != 0
    }
}

/// A complex number stored as `[re, im]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

pub type Complex32 = Complex<f16>;
pub type Complex64 = Complex<f32>;
pub type Complex128 = Complex<f64>;

macro_rules! impl_complex_element {
    ($part:ty, $dtype:expr) => {
        impl Element for Complex<$part> {
            const DTYPE: DType = $dtype;

            fn put_le<B: BufMut>(self, buf: &mut B) {
                self.re.put_le(buf);
                self.im.put_le(buf);
            }

            fn get_le<B: Buf>(buf: &mut B) -> Self {
                let re = <$part>::get_le(buf);
                let im = <$part>::get_le(buf);
                Complex { re, im }
            }
        }
    };
}

impl_complex_element!(f16, DType::Complex32);
impl_complex_element!(f32, DType::Complex64);
impl_complex_element!(f64, DType::Complex128);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_element_sizes() {
        assert_eq!(DType::Float16.element_size(), 2);
        assert_eq!(DType::Float32.element_size(), 4);
        assert_eq!(DType::Float64.element_size(), 8);
        assert_eq!(DType::Int8.element_size(), 1);
        assert_eq!(DType::Int16.element_size(), 2);
        assert_eq!(DType::Int32.element_size(), 4);
        assert_eq!(DType::Int64.element_size(), 8);
        assert_eq!(DType::UInt8.element_size(), 1);
        assert_eq!(DType::Bool.element_size(), 1);
        assert_eq!(DType::Complex32.element_size(), 4);
        assert_eq!(DType::Complex64.element_size(), 8);
        assert_eq!(DType::Complex128.element_size(), 16);
    }

    #[test]
    fn test_every_spelling_casts_to_itself() {
        for dtype in DType::ALL {
            let mut spellings = vec![dtype.name().to_string(), dtype.qualified_name().to_string()];
            for alias in dtype.aliases() {
                spellings.push(alias.to_string());
                spellings.push(format!("{DTYPE_NAMESPACE}{alias}"));
            }

            for spelling in spellings {
                let cast = cast_dtype(Some(spelling.clone().into())).unwrap();
                assert_eq!(cast.as_deref(), Some(spelling.as_str()));
                assert_eq!(DType::lookup(&spelling), Some(dtype));
            }
        }
    }

    #[test]
    fn test_cast_absent() {
        assert_eq!(cast_dtype(None).unwrap(), None);
        assert_eq!(cast_dtype(Some(Value::Null.into())).unwrap(), None);
    }

    #[test]
    fn test_cast_native_is_qualified() {
        assert_eq!(
            cast_dtype(Some(DType::Float32.into())).unwrap().as_deref(),
            Some("torch.float32")
        );
        assert_eq!(
            cast_dtype(Some(DType::Complex128.into())).unwrap().as_deref(),
            Some("torch.complex128")
        );
    }

    #[test]
    fn test_cast_invalid_string() {
        assert_eq!(
            cast_dtype(Some("nonexistent_dtype".into())),
            Err(TensorError::InvalidDType("nonexistent_dtype".into()))
        );
        assert!(matches!(
            cast_dtype(Some("torch.".into())),
            Err(TensorError::InvalidDType(_))
        ));
    }

    #[test]
    fn test_cast_wrong_kind() {
        for value in [json!(123), json!([]), json!({}), json!(true)] {
            assert!(matches!(
                cast_dtype(Some(value.into())),
                Err(TensorError::TypeMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_bare_and_qualified_are_equivalent() {
        assert_eq!(DType::lookup("float32"), DType::lookup("torch.float32"));
        assert_eq!("torch.long".parse::<DType>().unwrap(), DType::Int64);
        assert!("torch.torch.float32".parse::<DType>().is_err());
    }

    #[test]
    fn test_element_trait() {
        assert_eq!(f32::DTYPE, DType::Float32);
        assert_eq!(Complex64::DTYPE, DType::Complex64);

        let mut buf = Vec::new();
        1.5f32.put_le(&mut buf);
        Complex64::new(2.0, -1.0).put_le(&mut buf);
        true.put_le(&mut buf);
        assert_eq!(buf.len(), 4 + 8 + 1);

        let mut cursor = &buf[..];
        assert_eq!(f32::get_le(&mut cursor), 1.5);
        assert_eq!(Complex64::get_le(&mut cursor), Complex::new(2.0, -1.0));
        assert!(bool::get_le(&mut cursor));
    }
}
