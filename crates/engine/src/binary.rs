//! Binary field codec
//!
//! Converts typed field buffers to the archive's byte representation and
//! back. Byte order and floating point precision are fixed per archive, so a
//! codec is built once per open archive and never varies per field.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serialbox_core::{DataFieldInfo, ElementType, Endianness, Error, Precision, Result};

/// Typed contents of one field snapshot, in row-major order
#[derive(Debug, Clone, PartialEq)]
pub enum FieldBuffer {
    /// 32-bit integers
    Int32(Vec<i32>),
    /// 64-bit integers
    Int64(Vec<i64>),
    /// Single precision reals
    Float32(Vec<f32>),
    /// Double precision reals
    Float64(Vec<f64>),
}

impl FieldBuffer {
    /// Buffer of `count` zeros of `element_type`
    pub fn zeros(element_type: ElementType, count: usize) -> Self {
        match element_type {
            ElementType::Int32 => FieldBuffer::Int32(vec![0; count]),
            ElementType::Int64 => FieldBuffer::Int64(vec![0; count]),
            ElementType::Float32 => FieldBuffer::Float32(vec![0.0; count]),
            ElementType::Float64 => FieldBuffer::Float64(vec![0.0; count]),
        }
    }

    /// Element type of the buffer
    pub fn element_type(&self) -> ElementType {
        match self {
            FieldBuffer::Int32(_) => ElementType::Int32,
            FieldBuffer::Int64(_) => ElementType::Int64,
            FieldBuffer::Float32(_) => ElementType::Float32,
            FieldBuffer::Float64(_) => ElementType::Float64,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            FieldBuffer::Int32(v) => v.len(),
            FieldBuffer::Int64(v) => v.len(),
            FieldBuffer::Float32(v) => v.len(),
            FieldBuffer::Float64(v) => v.len(),
        }
    }

    /// True if the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer contents, if this is an `Int32` buffer
    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            FieldBuffer::Int32(v) => Some(v),
            _ => None,
        }
    }

    /// Integer contents, if this is an `Int64` buffer
    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            FieldBuffer::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Real contents, if this is a `Float32` buffer
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            FieldBuffer::Float32(v) => Some(v),
            _ => None,
        }
    }

    /// Real contents, if this is a `Float64` buffer
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            FieldBuffer::Float64(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Vec<i32>> for FieldBuffer {
    fn from(v: Vec<i32>) -> Self {
        FieldBuffer::Int32(v)
    }
}

impl From<Vec<i64>> for FieldBuffer {
    fn from(v: Vec<i64>) -> Self {
        FieldBuffer::Int64(v)
    }
}

impl From<Vec<f32>> for FieldBuffer {
    fn from(v: Vec<f32>) -> Self {
        FieldBuffer::Float32(v)
    }
}

impl From<Vec<f64>> for FieldBuffer {
    fn from(v: Vec<f64>) -> Self {
        FieldBuffer::Float64(v)
    }
}

/// Encoder/decoder bound to one archive's byte order and precision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinarySerializer {
    endianness: Endianness,
    precision: Precision,
}

impl BinarySerializer {
    /// Codec for the given byte order and real precision
    pub fn new(endianness: Endianness, precision: Precision) -> Self {
        BinarySerializer {
            endianness,
            precision,
        }
    }

    /// Byte order
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Real precision
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Encode `buffer` as the bytes of field `info`
    ///
    /// # Errors
    ///
    /// - `TypeMismatch` if the buffer type differs from the field's, or a
    ///   real field disagrees with the archive precision
    /// - `SizeMismatch` if the element count differs from the field's
    pub fn encode(&self, info: &DataFieldInfo, buffer: &FieldBuffer) -> Result<Vec<u8>> {
        self.check_type(info, buffer.element_type())?;
        let expected = info.element_count();
        if buffer.len() != expected {
            return Err(Error::SizeMismatch {
                field: info.name().to_string(),
                expected,
                actual: buffer.len(),
            });
        }
        let mut bytes = vec![0u8; info.byte_size()];
        match self.endianness {
            Endianness::Little => write_into::<LittleEndian>(buffer, &mut bytes),
            Endianness::Big => write_into::<BigEndian>(buffer, &mut bytes),
        }
        Ok(bytes)
    }

    /// Decode the stored bytes of field `info`
    ///
    /// # Errors
    ///
    /// - `SizeMismatch` if `bytes` is not exactly the field's byte size
    /// - `TypeMismatch` if a real field disagrees with the archive precision
    pub fn decode(&self, info: &DataFieldInfo, bytes: &[u8]) -> Result<FieldBuffer> {
        self.check_type(info, info.element_type())?;
        if bytes.len() != info.byte_size() {
            return Err(Error::SizeMismatch {
                field: info.name().to_string(),
                expected: info.byte_size(),
                actual: bytes.len(),
            });
        }
        let mut buffer = FieldBuffer::zeros(info.element_type(), info.element_count());
        match self.endianness {
            Endianness::Little => read_into::<LittleEndian>(bytes, &mut buffer),
            Endianness::Big => read_into::<BigEndian>(bytes, &mut buffer),
        }
        Ok(buffer)
    }

    fn check_type(&self, info: &DataFieldInfo, actual: ElementType) -> Result<()> {
        let expected = info.element_type();
        if actual != expected {
            return Err(Error::TypeMismatch {
                field: info.name().to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        if expected.is_floating() && expected != ElementType::real(self.precision) {
            return Err(Error::TypeMismatch {
                field: info.name().to_string(),
                expected: ElementType::real(self.precision).to_string(),
                actual: expected.to_string(),
            });
        }
        Ok(())
    }
}

fn write_into<E: ByteOrder>(buffer: &FieldBuffer, bytes: &mut [u8]) {
    match buffer {
        FieldBuffer::Int32(v) => E::write_i32_into(v, bytes),
        FieldBuffer::Int64(v) => E::write_i64_into(v, bytes),
        FieldBuffer::Float32(v) => E::write_f32_into(v, bytes),
        FieldBuffer::Float64(v) => E::write_f64_into(v, bytes),
    }
}

fn read_into<E: ByteOrder>(bytes: &[u8], buffer: &mut FieldBuffer) {
    match buffer {
        FieldBuffer::Int32(v) => E::read_i32_into(bytes, v),
        FieldBuffer::Int64(v) => E::read_i64_into(bytes, v),
        FieldBuffer::Float32(v) => E::read_f32_into(bytes, v),
        FieldBuffer::Float64(v) => E::read_f64_into(bytes, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn field(element_type: ElementType, dims: &[usize]) -> DataFieldInfo {
        DataFieldInfo::with_type("f", element_type, dims).unwrap()
    }

    fn double_le() -> BinarySerializer {
        BinarySerializer::new(Endianness::Little, Precision::Double)
    }

    #[test]
    fn test_little_endian_layout() {
        let info = field(ElementType::Int32, &[2]);
        let bytes = double_le()
            .encode(&info, &FieldBuffer::Int32(vec![1, 0x0102_0304]))
            .unwrap();
        assert_eq!(bytes, vec![1, 0, 0, 0, 4, 3, 2, 1]);
    }

    #[test]
    fn test_big_endian_layout() {
        let info = field(ElementType::Int32, &[2]);
        let codec = BinarySerializer::new(Endianness::Big, Precision::Double);
        let bytes = codec
            .encode(&info, &FieldBuffer::Int32(vec![1, 0x0102_0304]))
            .unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 1, 1, 2, 3, 4]);
        assert_eq!(
            codec.decode(&info, &bytes).unwrap(),
            FieldBuffer::Int32(vec![1, 0x0102_0304])
        );
    }

    #[test]
    fn test_type_mismatch() {
        let info = field(ElementType::Float64, &[3]);
        let err = double_le()
            .encode(&info, &FieldBuffer::Int32(vec![1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_precision_mismatch() {
        let info = field(ElementType::Float64, &[1]);
        let single = BinarySerializer::new(Endianness::Little, Precision::Single);
        let err = single
            .encode(&info, &FieldBuffer::Float64(vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        // Integer fields are unaffected by precision
        let ints = field(ElementType::Int64, &[1]);
        assert!(single.encode(&ints, &FieldBuffer::Int64(vec![7])).is_ok());
    }

    #[test]
    fn test_count_mismatch() {
        let info = field(ElementType::Float64, &[3, 3]);
        let err = double_le()
            .encode(&info, &FieldBuffer::Float64(vec![0.0; 8]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                expected: 9,
                actual: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_wrong_length() {
        let info = field(ElementType::Float64, &[3, 3]);
        let err = double_le().decode(&info, &[0u8; 71]).unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                expected: 72,
                actual: 71,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_sized_field() {
        let info = field(ElementType::Int32, &[0, 4]);
        let bytes = double_le().encode(&info, &FieldBuffer::Int32(vec![])).unwrap();
        assert!(bytes.is_empty());
        assert!(double_le().decode(&info, &bytes).unwrap().is_empty());
    }

    fn endianness() -> impl Strategy<Value = Endianness> {
        prop_oneof![Just(Endianness::Little), Just(Endianness::Big)]
    }

    proptest! {
        #[test]
        fn f64_round_trip(e in endianness(), v in prop::collection::vec(any::<f64>(), 0..32)) {
            let info = field(ElementType::Float64, &[v.len()]);
            let codec = BinarySerializer::new(e, Precision::Double);
            let buffer = FieldBuffer::Float64(v);
            let bytes = codec.encode(&info, &buffer).unwrap();
            let decoded = codec.decode(&info, &bytes).unwrap();
            // Compare bitwise so NaN payloads count as equal
            let a: Vec<u64> = buffer.as_f64().unwrap().iter().map(|x| x.to_bits()).collect();
            let b: Vec<u64> = decoded.as_f64().unwrap().iter().map(|x| x.to_bits()).collect();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn f32_round_trip(e in endianness(), v in prop::collection::vec(any::<f32>(), 0..32)) {
            let info = field(ElementType::Float32, &[v.len()]);
            let codec = BinarySerializer::new(e, Precision::Single);
            let bytes = codec.encode(&info, &FieldBuffer::Float32(v.clone())).unwrap();
            let decoded = codec.decode(&info, &bytes).unwrap();
            let a: Vec<u32> = v.iter().map(|x| x.to_bits()).collect();
            let b: Vec<u32> = decoded.as_f32().unwrap().iter().map(|x| x.to_bits()).collect();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn int_round_trip(
            e in endianness(),
            a in prop::collection::vec(any::<i32>(), 0..16),
            b in prop::collection::vec(any::<i64>(), 0..16),
        ) {
            let codec = BinarySerializer::new(e, Precision::Double);
            let info32 = field(ElementType::Int32, &[a.len()]);
            let info64 = field(ElementType::Int64, &[b.len()]);
            let buf32 = FieldBuffer::from(a);
            let buf64 = FieldBuffer::from(b);
            prop_assert_eq!(codec.decode(&info32, &codec.encode(&info32, &buf32).unwrap()).unwrap(), buf32);
            prop_assert_eq!(codec.decode(&info64, &codec.encode(&info64, &buf64).unwrap()).unwrap(), buf64);
        }
    }
}
