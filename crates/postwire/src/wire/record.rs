//! Record (struct) support.

/// Implement the codec traits for a struct, encoding the listed fields
/// positionally.
///
/// Only listed fields travel on the wire; the rest are left untouched on
/// decode. Field names are not transmitted, so both sides must list the same
/// field types in the same order. Tuple structs list indices.
///
/// ```
/// use postwire::wire::{from_bytes, to_bytes};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Point {
///     x: i64,
///     y: i64,
///     cached_norm: Option<f64>,
/// }
///
/// postwire::wire_record!(Point { x, y });
///
/// let p = Point { x: 3, y: 4, cached_norm: Some(5.0) };
/// let mut back = Point::default();
/// from_bytes(&to_bytes(&p).unwrap(), &mut back).unwrap();
/// assert_eq!((back.x, back.y, back.cached_norm), (3, 4, None));
/// ```
#[macro_export]
macro_rules! wire_record {
    (@count) => { 0usize };
    (@count $head:tt $($tail:tt)*) => { 1usize + $crate::wire_record!(@count $($tail)*) };
    ($ty:ty { $($field:tt),* $(,)? }) => {
        impl $crate::wire::Kinded for $ty {
            fn kind(&self) -> $crate::wire::Kind {
                $crate::wire::Kind::Struct
            }
        }

        impl $crate::wire::Encode for $ty {
            fn encode_payload(
                &self,
                enc: &mut $crate::wire::Encoder<'_>,
            ) -> ::std::result::Result<(), $crate::WireError> {
                enc.write_count($crate::wire_record!(@count $($field)*))?;
                $( enc.encode(&self.$field)?; )*
                Ok(())
            }
        }

        impl $crate::wire::Decode for $ty {
            fn decode_payload(
                &mut self,
                dec: &mut $crate::wire::Decoder<'_>,
            ) -> ::std::result::Result<(), $crate::WireError> {
                dec.expect_fields($crate::wire_record!(@count $($field)*))?;
                $( dec.decode(&mut self.$field)?; )*
                Ok(())
            }
        }

        $crate::__impl_returns!($ty);
    };
}
