use super::*;
use crate::{
    error::ErrorKind,
    serializer::{Serializer, Skipper, from_slice, to_vec},
};

/// Encodes `value`, checks the size/skip invariants and decodes it back.
fn roundtrip<T, S>(serializer: &S, value: T) -> Vec<u8>
where
    T: PartialEq + std::fmt::Debug,
    S: Serializer<T>,
{
    let bytes = to_vec(serializer, &value).unwrap();
    assert_eq!(serializer.size(&value, &mut Session::new()), bytes.len());

    let (decoded, read): (T, usize) = from_slice(serializer, &bytes).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(read, bytes.len());

    let mut reader: &[u8] = &bytes;
    let skipped = serializer.skip(&mut reader, &mut Session::new()).unwrap();
    assert_eq!(skipped, bytes.len());
    assert!(reader.is_empty());

    bytes
}

#[test]
fn known_encodings() {
    assert_eq!(roundtrip(&Varint::new(), 0u64), [0x00]);
    assert_eq!(roundtrip(&Varint::new(), 1u64), [0x01]);
    assert_eq!(roundtrip(&Varint::new(), 127u64), [0x7F]);
    assert_eq!(roundtrip(&Varint::new(), 128u64), [0x80, 0x01]);
    assert_eq!(roundtrip(&Varint::new(), 255u64), [0xFF, 0x01]);
    assert_eq!(roundtrip(&Varint::new(), 256u64), [0x80, 0x02]);
    assert_eq!(roundtrip(&Varint::new(), 300u32), [0xAC, 0x02]);
}

#[test]
fn unsigned_width_boundaries() {
    for value in [0u8, 1, 127, 128, 255] {
        roundtrip(&Varint::new(), value);
    }
    for value in [0u16, 1, 127, 128, 255, 256, u16::MAX] {
        roundtrip(&Varint::new(), value);
    }
    for value in [0u32, 1, 127, 128, 16383, 16384, u32::MAX / 2, u32::MAX] {
        roundtrip(&Varint::new(), value);
    }
    for value in [0u64, 1, 255, 256, u64::MAX / 2, u64::MAX] {
        roundtrip(&Varint::new(), value);
    }
    for value in [0usize, 1, usize::MAX] {
        roundtrip(&Varint::new(), value);
    }

    assert_eq!(roundtrip(&Varint::new(), u8::MAX).len(), 2);
    assert_eq!(roundtrip(&Varint::new(), u16::MAX).len(), 3);
    assert_eq!(roundtrip(&Varint::new(), u32::MAX).len(), 5);
    assert_eq!(roundtrip(&Varint::new(), u64::MAX).len(), MAX_VARINT_BYTES);
}

#[test]
fn signed_width_boundaries() {
    for value in [0i8, 1, -1, i8::MIN, i8::MAX] {
        roundtrip(&Varint::new(), value);
        roundtrip(&PositiveVarint::new(), value);
    }
    for value in [0i16, -64, 64, i16::MIN, i16::MAX] {
        roundtrip(&Varint::new(), value);
        roundtrip(&PositiveVarint::new(), value);
    }
    for value in [0i32, 1, -1, 63, -64, 64, -65, 127, -128, i32::MIN, i32::MAX]
    {
        roundtrip(&Varint::new(), value);
        roundtrip(&PositiveVarint::new(), value);
    }
    for value in [0i64, -1, i64::MIN, i64::MAX] {
        roundtrip(&Varint::new(), value);
        roundtrip(&PositiveVarint::new(), value);
    }
    for value in [0isize, -1, isize::MIN, isize::MAX] {
        roundtrip(&Varint::new(), value);
        roundtrip(&PositiveVarint::new(), value);
    }
}

#[test]
fn zigzag_keeps_small_negatives_small() {
    assert_eq!(zigzag_i64(0), 0);
    assert_eq!(zigzag_i64(-1), 1);
    assert_eq!(zigzag_i64(1), 2);
    assert_eq!(zigzag_i64(-2), 3);
    assert_eq!(zigzag_i8(i8::MIN), u8::MAX);
    assert_eq!(zigzag_i32(i32::MAX), u32::MAX - 1);

    assert_eq!(roundtrip(&Varint::new(), -1i32), [0x01]);
    assert_eq!(roundtrip(&Varint::new(), -64i32), [0x7F]);
}

#[test]
fn zigzag_is_a_bijection() {
    for value in i8::MIN..=i8::MAX {
        assert_eq!(unzigzag_i8(zigzag_i8(value)), value);
    }
    for value in i16::MIN..=i16::MAX {
        assert_eq!(unzigzag_i16(zigzag_i16(value)), value);
    }
    for value in [i32::MIN, -65_536, -1, 0, 1, 65_536, i32::MAX] {
        assert_eq!(unzigzag_i32(zigzag_i32(value)), value);
    }
    for value in [i64::MIN, i64::MIN + 1, -1, 0, 1, i64::MAX - 1, i64::MAX] {
        assert_eq!(unzigzag_i64(zigzag_i64(value)), value);
    }
}

#[test]
fn positive_variant_does_not_zigzag() {
    assert_eq!(roundtrip(&PositiveVarint::new(), 64i64), [0x40]);
    assert_eq!(roundtrip(&Varint::new(), 64i64), [0x80, 0x01]);

    // a negative value keeps all of its bits
    assert_eq!(
        roundtrip(&PositiveVarint::new(), -1i64).len(),
        MAX_VARINT_BYTES
    );
}

/// Checks that decoding and skipping `bytes` as a `T` both overflow after
/// `expected_read` bytes.
fn assert_overflow<T>(bytes: &[u8], expected_read: usize, name: &str)
where
    T: std::fmt::Debug,
    Varint<T>: Unmarshaler<T> + Skipper,
{
    let codec = Varint::<T>::new();

    let error = from_slice::<T, _>(&codec, bytes).unwrap_err();
    assert!(
        matches!(error.kind(), ErrorKind::Overflow(n) if *n == name),
        "expected overflow of {name}, got {error}"
    );
    assert_eq!(error.bytes(), expected_read);

    let mut reader = bytes;
    let error = codec.skip(&mut reader, &mut Session::new()).unwrap_err();
    assert!(
        matches!(error.kind(), ErrorKind::Overflow(n) if *n == name),
        "expected skip to overflow {name}, got {error}"
    );
    assert_eq!(error.bytes(), expected_read);
    assert_eq!(reader.len(), bytes.len() - expected_read);
}

#[test]
fn terminal_byte_above_mask_overflows() {
    assert_overflow::<u8>(&[0xFF, 0x02], 2, "u8");
    assert_overflow::<u16>(&[0xFF, 0xFF, 0x04], 3, "u16");
    assert_overflow::<u32>(&[0xFF, 0xFF, 0xFF, 0xFF, 0x10], 5, "u32");
    assert_overflow::<u64>(
        &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02],
        10,
        "u64",
    );
    assert_overflow::<i16>(&[0xFF, 0xFF, 0x04], 3, "u16");

    // the largest terminal byte still fits
    assert_eq!(
        from_slice::<u16, _>(&Varint::new(), &[0xFF, 0xFF, 0x03]).unwrap(),
        (u16::MAX, 3)
    );
}

#[test]
fn too_many_continuation_bytes_overflow() {
    assert_overflow::<u16>(&[0x80, 0x80, 0x80, 0x01], 3, "u16");
    assert_overflow::<u32>(&[0x80; 8], 5, "u32");
    assert_overflow::<u64>(&[0x80; 12], 10, "u64");
}

#[test]
fn skip_applies_the_width_of_the_codec() {
    // fits a u32 but overflows a u8 at the second byte
    let bytes = [0x80, 0x80, 0x01, 0x00];
    assert_overflow::<u8>(&bytes, 2, "u8");
    assert_overflow::<i8>(&bytes, 2, "u8");

    let mut reader: &[u8] = &bytes;
    assert_eq!(
        Varint::<u32>::new().skip(&mut reader, &mut Session::new()).unwrap(),
        3
    );
    assert_eq!(reader, [0x00]);

    let mut reader: &[u8] = &bytes;
    assert_eq!(
        PositiveVarint::<i32>::new()
            .skip(&mut reader, &mut Session::new())
            .unwrap(),
        3
    );
}

#[test]
fn positive_varint_skip_uses_the_unsigned_width() {
    let bytes = [0xFF, 0xFF, 0x04];

    let error =
        from_slice::<i16, _>(&PositiveVarint::new(), &bytes).unwrap_err();
    assert_eq!(error.bytes(), 3);

    let mut reader: &[u8] = &bytes;
    let error = PositiveVarint::<i16>::new()
        .skip(&mut reader, &mut Session::new())
        .unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::Overflow("u16")));
    assert_eq!(error.bytes(), 3);
}

#[test]
fn truncated_input_reports_consumed_bytes() {
    let error =
        from_slice::<u32, _>(&Varint::new(), &[0x80, 0x80]).unwrap_err();

    assert!(matches!(error.kind(), ErrorKind::Stream(_)));
    assert_eq!(error.bytes(), 2);
}

#[test]
fn size_matches_encode() {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    for shift in 0..64 {
        let value = 1u64 << shift;
        assert_eq!(size_of(value), encode(value, &mut buf));
        assert_eq!(size_of(value - 1), encode(value - 1, &mut buf));
    }
}
