// Primitive converters between native values and host values.
//
// Every converter has one of two shapes so generated code can reference them
// by path wherever a converter is expected:
//
//   fn(&mut dyn Native, Val) -> SwabResult<H>    native -> host
//   fn(&mut dyn Native, H) -> SwabResult<Val>    host -> native
//
// 64-bit integers are converted from and to raw `Val::I64`. Crossing the
// boundary as wide handles is the caller's job (see `CallFrame::wide`).

use wasmtime::Val;

use crate::error::{SwabError, SwabResult};
use crate::native::Native;

pub(crate) fn expect_i32(raw: &Val) -> SwabResult<i32> {
    match raw {
        Val::I32(v) => Ok(*v),
        other => Err(SwabError::unexpected("i32", other)),
    }
}

pub(crate) fn expect_i64(raw: &Val) -> SwabResult<i64> {
    match raw {
        Val::I64(v) => Ok(*v),
        other => Err(SwabError::unexpected("i64", other)),
    }
}

/// Reinterpret a signed 32-bit raw value as unsigned.
pub fn rebias_u32(raw: i32) -> u32 {
    if raw < 0 {
        (raw as i64 + (1i64 << 32)) as u32
    } else {
        raw as u32
    }
}

/// Reinterpret a signed 64-bit raw value as unsigned.
pub fn rebias_u64(raw: i64) -> u64 {
    if raw < 0 {
        (raw as i128 + (1i128 << 64)) as u64
    } else {
        raw as u64
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

pub fn bool_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<bool> {
    Ok(expect_i32(&raw)? != 0)
}

pub fn bool_to_native(_rt: &mut dyn Native, value: bool) -> SwabResult<Val> {
    Ok(Val::I32(value as i32))
}

/// Native chars are single Latin-1 code units.
pub fn char_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<char> {
    Ok(char::from(expect_i32(&raw)? as u8))
}

pub fn char_to_native(_rt: &mut dyn Native, value: char) -> SwabResult<Val> {
    let code = u32::from(value);
    if code > 0xff {
        return Err(SwabError::CharOutOfRange(value));
    }
    Ok(Val::I32(code as i32))
}

pub fn u8_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<u8> {
    Ok(expect_i32(&raw)? as u8)
}

pub fn u8_to_native(_rt: &mut dyn Native, value: u8) -> SwabResult<Val> {
    Ok(Val::I32(value as i32))
}

pub fn i8_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<i8> {
    Ok(expect_i32(&raw)? as i8)
}

pub fn i8_to_native(_rt: &mut dyn Native, value: i8) -> SwabResult<Val> {
    Ok(Val::I32(value as i32))
}

pub fn u16_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<u16> {
    Ok(expect_i32(&raw)? as u16)
}

pub fn u16_to_native(_rt: &mut dyn Native, value: u16) -> SwabResult<Val> {
    Ok(Val::I32(value as i32))
}

pub fn i16_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<i16> {
    Ok(expect_i32(&raw)? as i16)
}

pub fn i16_to_native(_rt: &mut dyn Native, value: i16) -> SwabResult<Val> {
    Ok(Val::I32(value as i32))
}

pub fn u32_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<u32> {
    Ok(rebias_u32(expect_i32(&raw)?))
}

pub fn u32_to_native(_rt: &mut dyn Native, value: u32) -> SwabResult<Val> {
    Ok(Val::I32(value as i32))
}

pub fn i32_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<i32> {
    expect_i32(&raw)
}

pub fn i32_to_native(_rt: &mut dyn Native, value: i32) -> SwabResult<Val> {
    Ok(Val::I32(value))
}

pub fn u64_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<u64> {
    Ok(rebias_u64(expect_i64(&raw)?))
}

pub fn u64_to_native(_rt: &mut dyn Native, value: u64) -> SwabResult<Val> {
    Ok(Val::I64(value as i64))
}

pub fn i64_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<i64> {
    expect_i64(&raw)
}

pub fn i64_to_native(_rt: &mut dyn Native, value: i64) -> SwabResult<Val> {
    Ok(Val::I64(value))
}

pub fn f32_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<f32> {
    match raw {
        Val::F32(bits) => Ok(f32::from_bits(bits)),
        other => Err(SwabError::unexpected("f32", &other)),
    }
}

pub fn f32_to_native(_rt: &mut dyn Native, value: f32) -> SwabResult<Val> {
    Ok(Val::F32(value.to_bits()))
}

pub fn f64_from_native(_rt: &mut dyn Native, raw: Val) -> SwabResult<f64> {
    match raw {
        Val::F64(bits) => Ok(f64::from_bits(bits)),
        other => Err(SwabError::unexpected("f64", &other)),
    }
}

pub fn f64_to_native(_rt: &mut dyn Native, value: f64) -> SwabResult<Val> {
    Ok(Val::F64(value.to_bits()))
}

/// Placeholder for values of unknown type, which carry nothing.
pub fn unit_from_native(_rt: &mut dyn Native, _raw: Val) -> SwabResult<()> {
    Ok(())
}

pub fn unit_to_native(_rt: &mut dyn Native, _value: ()) -> SwabResult<Val> {
    Ok(Val::I32(0))
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Decode the NUL-terminated string at `raw`. Bytes are read as Latin-1.
pub fn string_from_native(rt: &mut dyn Native, raw: Val) -> SwabResult<String> {
    let address = crate::address_from_native(raw)?;
    if address == 0 {
        return Err(SwabError::NullPointer);
    }
    let bytes = rt.read_c_string(address)?;
    Ok(bytes.into_iter().map(char::from).collect())
}

/// Copy `value` into a fresh NUL-terminated native buffer.
///
/// The caller owns the buffer. Wrappers release it once the call returns.
pub fn str_to_native(rt: &mut dyn Native, value: &str) -> SwabResult<Val> {
    let mut bytes = Vec::with_capacity(value.len() + 1);
    for ch in value.chars() {
        let code = u32::from(ch);
        if code > 0xff {
            return Err(SwabError::CharOutOfRange(ch));
        }
        bytes.push(code as u8);
    }
    bytes.push(0);
    let address = rt.malloc(bytes.len() as u32)?;
    rt.write_bytes(address, &bytes)?;
    Ok(Val::I32(address as i32))
}

pub fn string_to_native(rt: &mut dyn Native, value: String) -> SwabResult<Val> {
    str_to_native(rt, &value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Runtime;
    use proptest::prelude::*;

    fn rt() -> Runtime {
        Runtime::detached().unwrap()
    }

    #[test]
    fn test_rebias() {
        assert_eq!(rebias_u32(-1), u32::MAX);
        assert_eq!(rebias_u32(i32::MIN), 1 << 31);
        assert_eq!(rebias_u32(7), 7);
        assert_eq!(rebias_u64(-1), u64::MAX);
        assert_eq!(rebias_u64(i64::MIN), 1 << 63);
    }

    #[test]
    fn test_char_range() {
        let mut rt = rt();
        assert!(matches!(char_to_native(&mut rt, 'é'), Ok(Val::I32(0xe9))));
        assert!(matches!(char_to_native(&mut rt, '€'), Err(SwabError::CharOutOfRange('€'))));
        assert_eq!(char_from_native(&mut rt, Val::I32(0xe9)).unwrap(), 'é');
    }

    #[test]
    fn test_wrong_category_rejected() {
        let mut rt = rt();
        assert!(matches!(
            i32_from_native(&mut rt, Val::I64(1)),
            Err(SwabError::UnexpectedValue { expected: "i32", .. })
        ));
        assert!(f64_from_native(&mut rt, Val::F32(0)).is_err());
    }

    #[test]
    fn test_null_string_is_error() {
        let mut rt = rt();
        assert!(matches!(string_from_native(&mut rt, Val::I32(0)), Err(SwabError::NullPointer)));
    }

    proptest! {
        #[test]
        fn prop_u32_round_trip(v in any::<u32>()) {
            let mut rt = rt();
            let raw = u32_to_native(&mut rt, v).unwrap();
            prop_assert_eq!(u32_from_native(&mut rt, raw).unwrap(), v);
        }

        #[test]
        fn prop_u64_round_trip(v in any::<u64>()) {
            let mut rt = rt();
            let raw = u64_to_native(&mut rt, v).unwrap();
            prop_assert_eq!(u64_from_native(&mut rt, raw).unwrap(), v);
        }

        #[test]
        fn prop_small_ints_round_trip(a in any::<i8>(), b in any::<u8>(), c in any::<i16>(), d in any::<u16>()) {
            let mut rt = rt();
            let raw = i8_to_native(&mut rt, a).unwrap();
            prop_assert_eq!(i8_from_native(&mut rt, raw).unwrap(), a);
            let raw = u8_to_native(&mut rt, b).unwrap();
            prop_assert_eq!(u8_from_native(&mut rt, raw).unwrap(), b);
            let raw = i16_to_native(&mut rt, c).unwrap();
            prop_assert_eq!(i16_from_native(&mut rt, raw).unwrap(), c);
            let raw = u16_to_native(&mut rt, d).unwrap();
            prop_assert_eq!(u16_from_native(&mut rt, raw).unwrap(), d);
        }

        #[test]
        fn prop_floats_round_trip_bits(a in any::<f32>(), b in any::<f64>()) {
            let mut rt = rt();
            let raw = f32_to_native(&mut rt, a).unwrap();
            prop_assert_eq!(f32_from_native(&mut rt, raw).unwrap().to_bits(), a.to_bits());
            let raw = f64_to_native(&mut rt, b).unwrap();
            prop_assert_eq!(f64_from_native(&mut rt, raw).unwrap().to_bits(), b.to_bits());
        }
    }
}
