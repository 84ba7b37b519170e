//! Fixed-size scalar kinds.
//!
//! Payloads are the value's native-endian bytes. `isize` and `usize` travel
//! as 64-bit values on every target so the wire width never depends on the
//! machine word.

use super::{Decode, Decoder, Encode, Encoder, Kind, Kinded};
use crate::error::WireError;

macro_rules! impl_scalar {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl Kinded for $ty {
            fn kind(&self) -> Kind {
                Kind::$kind
            }
        }

        impl Encode for $ty {
            fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
                enc.write_bytes(&self.to_ne_bytes())
            }
        }

        impl Decode for $ty {
            fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                dec.read_exact(&mut buf)?;
                *self = <$ty>::from_ne_bytes(buf);
                Ok(())
            }
        }
    )*};
}

impl_scalar! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    f32 => Float32,
    f64 => Float64,
}

impl Kinded for bool {
    fn kind(&self) -> Kind {
        Kind::Bool
    }
}

impl Encode for bool {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        enc.write_bytes(&[u8::from(*self)])
    }
}

impl Decode for bool {
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
        let mut buf = [0u8; 1];
        dec.read_exact(&mut buf)?;
        *self = buf[0] != 0;
        Ok(())
    }
}

impl Kinded for isize {
    fn kind(&self) -> Kind {
        Kind::Int
    }
}

impl Encode for isize {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        enc.write_bytes(&(*self as i64).to_ne_bytes())
    }
}

impl Decode for isize {
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
        let mut wide = 0i64;
        wide.decode_payload(dec)?;
        *self = isize::try_from(wide).map_err(|_| WireError::Overflow {
            value: i128::from(wide),
        })?;
        Ok(())
    }
}

impl Kinded for usize {
    fn kind(&self) -> Kind {
        Kind::Uint
    }
}

impl Encode for usize {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        enc.write_bytes(&(*self as u64).to_ne_bytes())
    }
}

impl Decode for usize {
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
        let mut wide = 0u64;
        wide.decode_payload(dec)?;
        *self = usize::try_from(wide).map_err(|_| WireError::Overflow {
            value: i128::from(wide),
        })?;
        Ok(())
    }
}

/// Complex number with 32-bit parts, laid out real then imaginary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex64 {
    pub re: f32,
    pub im: f32,
}

impl Complex64 {
    pub fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

/// Complex number with 64-bit parts, laid out real then imaginary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex128 {
    pub re: f64,
    pub im: f64,
}

impl Complex128 {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

macro_rules! impl_complex {
    ($($ty:ident => $kind:ident),*) => {$(
        impl Kinded for $ty {
            fn kind(&self) -> Kind {
                Kind::$kind
            }
        }

        impl Encode for $ty {
            fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
                self.re.encode_payload(enc)?;
                self.im.encode_payload(enc)
            }
        }

        impl Decode for $ty {
            fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
                self.re.decode_payload(dec)?;
                self.im.decode_payload(dec)
            }
        }
    )*};
}

impl_complex!(Complex64 => Complex64, Complex128 => Complex128);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{from_bytes, to_bytes};

    fn roundtrip<T: Encode + Decode + Default>(value: &T) -> T {
        let bytes = to_bytes(value).unwrap();
        let mut back = T::default();
        from_bytes(&bytes, &mut back).unwrap();
        back
    }

    #[test]
    fn test_integer_roundtrips() {
        assert_eq!(roundtrip(&-5i8), -5);
        assert_eq!(roundtrip(&i16::MIN), i16::MIN);
        assert_eq!(roundtrip(&-70_000i32), -70_000);
        assert_eq!(roundtrip(&i64::MAX), i64::MAX);
        assert_eq!(roundtrip(&200u8), 200);
        assert_eq!(roundtrip(&u16::MAX), u16::MAX);
        assert_eq!(roundtrip(&4_000_000_000u32), 4_000_000_000);
        assert_eq!(roundtrip(&u64::MAX), u64::MAX);
        assert_eq!(roundtrip(&-42isize), -42);
        assert_eq!(roundtrip(&42usize), 42);
    }

    #[test]
    fn test_float_and_bool_roundtrips() {
        assert!(roundtrip(&true));
        assert!(!roundtrip(&false));
        assert_eq!(roundtrip(&3.25f32), 3.25);
        assert_eq!(roundtrip(&-0.125f64), -0.125);
        assert!(roundtrip(&f64::NAN).is_nan());
    }

    #[test]
    fn test_complex_roundtrips() {
        let c = Complex64::new(1.5, -2.0);
        assert_eq!(roundtrip(&c), c);

        let c = Complex128::new(-0.5, 1e300);
        assert_eq!(roundtrip(&c), c);
    }

    #[test]
    fn test_payload_sizes() {
        assert_eq!(to_bytes(&true).unwrap().len(), 2);
        assert_eq!(to_bytes(&1u8).unwrap().len(), 2);
        assert_eq!(to_bytes(&1i32).unwrap().len(), 5);
        assert_eq!(to_bytes(&1isize).unwrap().len(), 9);
        assert_eq!(to_bytes(&1usize).unwrap().len(), 9);
        assert_eq!(to_bytes(&Complex64::default()).unwrap().len(), 9);
        assert_eq!(to_bytes(&Complex128::default()).unwrap().len(), 17);
    }

    #[test]
    fn test_native_width_kinds_differ_from_fixed_width() {
        let bytes = to_bytes(&1isize).unwrap();
        let mut fixed = 0i64;
        assert!(matches!(
            from_bytes(&bytes, &mut fixed),
            Err(WireError::IncompatibleValue { .. })
        ));
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn test_usize_overflow_on_narrow_target() {
        let mut bytes = vec![Kind::Uint.tag()];
        bytes.extend_from_slice(&u64::MAX.to_ne_bytes());
        let mut dst = 0usize;
        assert!(matches!(
            from_bytes(&bytes, &mut dst),
            Err(WireError::Overflow { .. })
        ));
    }
}
