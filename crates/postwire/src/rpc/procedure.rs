//! Procedure signatures and the glue between plain Rust functions and the
//! wire.
//!
//! A procedure is any `Fn(A1, .., An) -> R` with up to eight arguments. The
//! arguments must be decodable into fresh `Default` instances; `R` is either
//! the outputs themselves (a value, `()` or a tuple) or a `Result` whose
//! error becomes the failure message.

use crate::error::WireError;
use crate::wire::{Complex128, Complex64, Decode, Decoder, Encode, Encoder, Kind, Kinded};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Failure message sent when a procedure fails with an empty error text.
const UNNAMED_FAILURE: &str = "procedure failed";

/// Shape of a registered procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub inputs: Vec<Kind>,
    /// Positional outputs, not counting the failure signal.
    pub outputs: Vec<Kind>,
    /// Whether the procedure can report a failure.
    pub has_failure: bool,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<&str> = self.inputs.iter().map(|k| k.as_str()).collect();
        let mut outputs: Vec<&str> = self.outputs.iter().map(|k| k.as_str()).collect();
        if self.has_failure {
            outputs.push("failure");
        }
        write!(f, "({}) -> ({})", inputs.join(", "), outputs.join(", "))
    }
}

/// Arguments of a call, encoded positionally after the procedure name.
pub trait Args {
    fn values(&self) -> Vec<&dyn Encode>;
}

/// Outputs of a call, decoded positionally after the failure string.
pub trait Returns {
    fn kinds(&self) -> Vec<Kind>;
    fn outputs(&self) -> Vec<&dyn Encode>;
    fn outputs_mut(&mut self) -> Vec<&mut dyn Decode>;
}

/// What a procedure body returns: outputs, or outputs and a failure signal.
pub trait IntoOutcome {
    type Output: Returns;

    /// Whether the return type carries a failure signal.
    const HAS_FAILURE: bool;

    fn into_outcome(self) -> Result<Self::Output, String>;
}

impl<O: Returns, E: fmt::Display> IntoOutcome for Result<O, E> {
    type Output = O;
    const HAS_FAILURE: bool = true;

    fn into_outcome(self) -> Result<O, String> {
        self.map_err(|e| {
            let message = e.to_string();
            if message.is_empty() {
                UNNAMED_FAILURE.to_string()
            } else {
                message
            }
        })
    }
}

impl Args for () {
    fn values(&self) -> Vec<&dyn Encode> {
        Vec::new()
    }
}

impl Returns for () {
    fn kinds(&self) -> Vec<Kind> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<&dyn Encode> {
        Vec::new()
    }

    fn outputs_mut(&mut self) -> Vec<&mut dyn Decode> {
        Vec::new()
    }
}

impl IntoOutcome for () {
    type Output = ();
    const HAS_FAILURE: bool = false;

    fn into_outcome(self) -> Result<(), String> {
        Ok(())
    }
}

macro_rules! impl_tuples {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Encode),+> Args for ($($name,)+) {
            fn values(&self) -> Vec<&dyn Encode> {
                vec![$(&self.$idx as &dyn Encode),+]
            }
        }

        impl<$($name: Encode + Decode),+> Returns for ($($name,)+) {
            fn kinds(&self) -> Vec<Kind> {
                vec![$(self.$idx.kind()),+]
            }

            fn outputs(&self) -> Vec<&dyn Encode> {
                vec![$(&self.$idx as &dyn Encode),+]
            }

            fn outputs_mut(&mut self) -> Vec<&mut dyn Decode> {
                vec![$(&mut self.$idx as &mut dyn Decode),+]
            }
        }

        impl<$($name: Encode + Decode),+> IntoOutcome for ($($name,)+) {
            type Output = Self;
            const HAS_FAILURE: bool = false;

            fn into_outcome(self) -> Result<Self, String> {
                Ok(self)
            }
        }
    };
}

impl_tuples!(A 0);
impl_tuples!(A 0, B 1);
impl_tuples!(A 0, B 1, C 2);
impl_tuples!(A 0, B 1, C 2, D 3);
impl_tuples!(A 0, B 1, C 2, D 3, E 4);
impl_tuples!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_tuples!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_tuples!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Implement [`Returns`] and [`IntoOutcome`] for types returned as a single
/// output. Invoked by `wire_record!`.
#[doc(hidden)]
#[macro_export]
macro_rules! __impl_returns {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::rpc::Returns for $ty {
            fn kinds(&self) -> ::std::vec::Vec<$crate::wire::Kind> {
                ::std::vec![$crate::wire::Kinded::kind(self)]
            }

            fn outputs(&self) -> ::std::vec::Vec<&dyn $crate::wire::Encode> {
                ::std::vec![self as &dyn $crate::wire::Encode]
            }

            fn outputs_mut(&mut self) -> ::std::vec::Vec<&mut dyn $crate::wire::Decode> {
                ::std::vec![self as &mut dyn $crate::wire::Decode]
            }
        }

        impl $crate::rpc::IntoOutcome for $ty {
            type Output = Self;
            const HAS_FAILURE: bool = false;

            fn into_outcome(self) -> ::std::result::Result<Self, ::std::string::String> {
                ::std::result::Result::Ok(self)
            }
        }
    )+};
}

crate::__impl_returns!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, Complex64, Complex128,
    String,
);

macro_rules! impl_generic_returns {
    ($([$($params:tt)*] $ty:ty),+ $(,)?) => {$(
        impl<$($params)*> Returns for $ty
        where
            Self: Encode + Decode,
        {
            fn kinds(&self) -> Vec<Kind> {
                vec![self.kind()]
            }

            fn outputs(&self) -> Vec<&dyn Encode> {
                vec![self as &dyn Encode]
            }

            fn outputs_mut(&mut self) -> Vec<&mut dyn Decode> {
                vec![self as &mut dyn Decode]
            }
        }

        impl<$($params)*> IntoOutcome for $ty
        where
            Self: Encode + Decode,
        {
            type Output = Self;
            const HAS_FAILURE: bool = false;

            fn into_outcome(self) -> Result<Self, String> {
                Ok(self)
            }
        }
    )+};
}

impl_generic_returns!(
    [T] Vec<T>,
    [T, const N: usize] [T; N],
    [K, V, S] HashMap<K, V, S>,
    [K, V] BTreeMap<K, V>,
);

/// A function that can serve as a procedure.
///
/// `Params` is the tuple of argument types; it only exists to tell the
/// per-arity implementations apart.
pub trait Handler<Params>: Send + Sync + 'static {
    fn signature(&self) -> Signature;

    /// Decode the arguments, run the body and encode its outcome.
    fn call(&self, dec: &mut Decoder<'_>, enc: &mut Encoder<'_>) -> Result<(), WireError>;
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_variables, unused_mut)]
        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoOutcome,
            R::Output: Default,
            $($ty: Decode + Default,)*
        {
            fn signature(&self) -> Signature {
                Signature {
                    inputs: vec![$(<$ty>::default().kind()),*],
                    outputs: <R::Output as Default>::default().kinds(),
                    has_failure: R::HAS_FAILURE,
                }
            }

            fn call(&self, dec: &mut Decoder<'_>, enc: &mut Encoder<'_>) -> Result<(), WireError> {
                $(
                    let mut $ty = <$ty>::default();
                    dec.decode(&mut $ty)?;
                )*
                write_outcome(enc, (self)($($ty),*).into_outcome())
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);
impl_handler!(A1, A2, A3, A4, A5, A6, A7);
impl_handler!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Encode a response: the failure string, then the outputs on success only.
pub(crate) fn write_outcome<O: Returns>(
    enc: &mut Encoder<'_>,
    outcome: Result<O, String>,
) -> Result<(), WireError> {
    match outcome {
        Ok(outputs) => {
            enc.encode("")?;
            for output in outputs.outputs() {
                enc.encode(output)?;
            }
        }
        Err(message) => enc.encode(message.as_str())?,
    }
    Ok(())
}

type ErasedCall =
    dyn Fn(&mut Decoder<'_>, &mut Encoder<'_>) -> Result<(), WireError> + Send + Sync;

/// A registered handler with its argument types erased.
pub(crate) struct Procedure {
    signature: Signature,
    call: Box<ErasedCall>,
}

impl Procedure {
    pub(crate) fn new<H, P>(handler: H) -> Self
    where
        H: Handler<P>,
        P: 'static,
    {
        Self {
            signature: handler.signature(),
            call: Box::new(move |dec: &mut Decoder<'_>, enc: &mut Encoder<'_>| {
                handler.call(dec, enc)
            }),
        }
    }

    pub(crate) fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn call(
        &self,
        dec: &mut Decoder<'_>,
        enc: &mut Encoder<'_>,
    ) -> Result<(), WireError> {
        (self.call)(dec, enc)
    }
}
