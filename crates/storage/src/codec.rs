//! Value-blob codec
//!
//! Deterministic, lossless conversion between a `TypedArray` and the
//! byte blob stored as the engine value. The engine never looks inside
//! the blob; this codec is the only component that does.
//!
//! # Blob layout (little-endian)
//!
//! ```text
//! +------------------+ 0
//! | Magic "CLRV"     | 4 bytes
//! +------------------+ 4
//! | Format version   | u16
//! +------------------+ 6
//! | Element-type tag | u8
//! +------------------+ 7
//! | Rank             | u8 (1..=255)
//! +------------------+ 8
//! | Dims             | rank x u64
//! +------------------+ 8 + 8*rank
//! | Payload          | product(dims) * byte_width, column-major
//! +------------------+
//! ```
//!
//! The layout is versioned; decoding a blob written by a newer format
//! version fails rather than guessing. Decode validates the tag, the
//! rank, and that the payload length matches the declared shape exactly
//! (no trailing bytes).

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use cellar_core::{ElementType, Error, Result, TypedArray};
use std::io::Cursor;

/// Magic bytes at the start of every value blob
pub const VALUE_MAGIC: [u8; 4] = *b"CLRV";

/// Current blob format version
pub const VALUE_FORMAT_VERSION: u16 = 1;

/// Fixed header size before the dimension list
pub const VALUE_HEADER_SIZE: usize = 8;

/// Encode a typed array into a storable byte blob
///
/// Fails with `InvalidShape` only when the rank does not fit the wire
/// format (more than 255 dimensions); every array accepted by
/// `TypedArray::new` with rank <= 255 encodes.
pub fn encode_value(value: &TypedArray) -> Result<Vec<u8>> {
    let rank = value.rank();
    if rank > u8::MAX as usize {
        return Err(Error::InvalidShape(format!(
            "rank {} exceeds wire format maximum of 255",
            rank
        )));
    }

    let mut buf =
        Vec::with_capacity(VALUE_HEADER_SIZE + rank * 8 + value.data().len());
    buf.extend_from_slice(&VALUE_MAGIC);
    // Writes to a Vec cannot fail
    buf.write_u16::<LittleEndian>(VALUE_FORMAT_VERSION)
        .expect("write to Vec");
    buf.push(value.elem().tag());
    buf.push(rank as u8);
    for &dim in value.dims() {
        buf.write_u64::<LittleEndian>(dim).expect("write to Vec");
    }
    buf.extend_from_slice(value.data());
    Ok(buf)
}

/// Decode a byte blob back into a typed array
///
/// Fails with `CorruptValue` for anything that is not a well-formed
/// blob: wrong magic, unsupported version, unknown element-type tag,
/// zero rank, or a payload whose length does not match the declared
/// shape and type exactly.
pub fn decode_value(bytes: &[u8]) -> Result<TypedArray> {
    if bytes.len() < VALUE_HEADER_SIZE {
        return Err(Error::CorruptValue(format!(
            "blob is {} bytes, shorter than the {}-byte header",
            bytes.len(),
            VALUE_HEADER_SIZE
        )));
    }
    if bytes[0..4] != VALUE_MAGIC {
        return Err(Error::CorruptValue(format!(
            "bad magic {:02X?}",
            &bytes[0..4]
        )));
    }

    let mut cursor = Cursor::new(&bytes[4..]);
    let version = cursor.read_u16::<LittleEndian>().expect("header length checked");
    if version > VALUE_FORMAT_VERSION {
        return Err(Error::CorruptValue(format!(
            "format version {} is newer than supported version {}",
            version, VALUE_FORMAT_VERSION
        )));
    }

    let tag = cursor.read_u8().expect("header length checked");
    let elem = ElementType::from_tag(tag)
        .ok_or_else(|| Error::CorruptValue(format!("unknown element-type tag 0x{:02X}", tag)))?;

    let rank = cursor.read_u8().expect("header length checked") as usize;
    if rank == 0 {
        return Err(Error::CorruptValue("rank must be at least 1".to_string()));
    }

    let dims_end = VALUE_HEADER_SIZE + rank * 8;
    if bytes.len() < dims_end {
        return Err(Error::CorruptValue(format!(
            "blob truncated inside dimension list (rank {}, {} bytes)",
            rank,
            bytes.len()
        )));
    }
    let mut dims = Vec::with_capacity(rank);
    for _ in 0..rank {
        dims.push(cursor.read_u64::<LittleEndian>().expect("length checked"));
    }

    let count = dims
        .iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            Error::CorruptValue(format!("element count overflows for dims {:?}", dims))
        })?;
    let expected = count
        .checked_mul(elem.byte_width() as u64)
        .ok_or_else(|| {
            Error::CorruptValue(format!("payload size overflows for dims {:?}", dims))
        })?;

    let payload = &bytes[dims_end..];
    if payload.len() as u64 != expected {
        return Err(Error::CorruptValue(format!(
            "payload is {} bytes but {} {} elements require {}",
            payload.len(),
            count,
            elem.name(),
            expected
        )));
    }

    // Shape was just validated against the payload, so this cannot fail
    TypedArray::new(elem, dims, payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roundtrip_scalar_double() {
        let v = TypedArray::scalar_f64(3.14);
        let blob = encode_value(&v).unwrap();
        let back = decode_value(&blob).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_roundtrip_all_element_types() {
        for elem in ElementType::ALL {
            let data = vec![0xA5u8; 3 * elem.byte_width()];
            let v = TypedArray::new(elem, vec![3], data).unwrap();
            let back = decode_value(&encode_value(&v).unwrap()).unwrap();
            assert_eq!(back, v, "round-trip failed for {}", elem.name());
        }
    }

    #[test]
    fn test_roundtrip_empty_array() {
        let v = TypedArray::new(ElementType::F32, vec![0], vec![]).unwrap();
        let back = decode_value(&encode_value(&v).unwrap()).unwrap();
        assert_eq!(back, v);
        assert!(back.is_empty());
    }

    #[test]
    fn test_roundtrip_zero_dim_in_matrix() {
        let v = TypedArray::new(ElementType::U32, vec![4, 0, 2], vec![]).unwrap();
        let back = decode_value(&encode_value(&v).unwrap()).unwrap();
        assert_eq!(back.dims(), &[4, 0, 2]);
    }

    #[test]
    fn test_roundtrip_text() {
        let v = TypedArray::text("ünïcode 😀");
        let back = decode_value(&encode_value(&v).unwrap()).unwrap();
        assert_eq!(back.as_text(), Some("ünïcode 😀".to_string()));
    }

    #[test]
    fn test_roundtrip_opaque() {
        let v = TypedArray::opaque(vec![0, 1, 2, 255]);
        let back = decode_value(&encode_value(&v).unwrap()).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_blob_layout_is_stable() {
        // Pin the wire layout so format drift is caught
        let v = TypedArray::scalar_bool(true);
        let blob = encode_value(&v).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(b"CLRV");
        expected.extend_from_slice(&1u16.to_le_bytes()); // version
        expected.push(0x0B); // Bool tag
        expected.push(1); // rank
        expected.extend_from_slice(&1u64.to_le_bytes()); // dim
        expected.push(1); // payload: true
        assert_eq!(blob, expected);
    }

    #[test]
    fn test_decode_rejects_short_blob() {
        let err = decode_value(&[0x43, 0x4C]).unwrap_err();
        assert!(matches!(err, Error::CorruptValue(_)));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut blob = encode_value(&TypedArray::scalar_f64(1.0)).unwrap();
        blob[0] = b'X';
        assert!(matches!(
            decode_value(&blob),
            Err(Error::CorruptValue(_))
        ));
    }

    #[test]
    fn test_decode_rejects_newer_version() {
        let mut blob = encode_value(&TypedArray::scalar_f64(1.0)).unwrap();
        blob[4..6].copy_from_slice(&99u16.to_le_bytes());
        let err = decode_value(&blob).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let mut blob = encode_value(&TypedArray::scalar_f64(1.0)).unwrap();
        blob[6] = 0xEE;
        let err = decode_value(&blob).unwrap_err();
        assert!(err.to_string().contains("tag"));
    }

    #[test]
    fn test_decode_rejects_zero_rank() {
        let mut blob = encode_value(&TypedArray::scalar_f64(1.0)).unwrap();
        blob[7] = 0;
        assert!(matches!(
            decode_value(&blob),
            Err(Error::CorruptValue(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_dims() {
        let blob = encode_value(&TypedArray::scalar_f64(1.0)).unwrap();
        // Cut into the dimension list
        assert!(matches!(
            decode_value(&blob[..10]),
            Err(Error::CorruptValue(_))
        ));
    }

    #[test]
    fn test_decode_rejects_payload_length_mismatch() {
        let mut blob = encode_value(&TypedArray::scalar_f64(1.0)).unwrap();
        blob.push(0); // trailing byte
        assert!(matches!(
            decode_value(&blob),
            Err(Error::CorruptValue(_))
        ));

        let blob = encode_value(&TypedArray::scalar_f64(1.0)).unwrap();
        // Drop the last payload byte
        assert!(matches!(
            decode_value(&blob[..blob.len() - 1]),
            Err(Error::CorruptValue(_))
        ));
    }

    #[test]
    fn test_encode_decode_encode_is_identity_on_blobs() {
        let v = TypedArray::from_i64s(&[1, -2, 3]);
        let blob = encode_value(&v).unwrap();
        let blob2 = encode_value(&decode_value(&blob).unwrap()).unwrap();
        assert_eq!(blob, blob2);
    }

    fn element_type_strategy() -> impl Strategy<Value = ElementType> {
        prop::sample::select(ElementType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_shape(
            elem in element_type_strategy(),
            dims in prop::collection::vec(0u64..5, 1..4),
        ) {
            let count: u64 = dims.iter().product();
            let data: Vec<u8> = (0..count as usize * elem.byte_width())
                .map(|i| i as u8)
                .collect();
            let v = TypedArray::new(elem, dims, data).unwrap();

            let blob = encode_value(&v).unwrap();
            let back = decode_value(&blob).unwrap();
            prop_assert_eq!(&back, &v);

            // Blob-side identity as well
            let blob2 = encode_value(&back).unwrap();
            prop_assert_eq!(blob, blob2);
        }
    }
}
