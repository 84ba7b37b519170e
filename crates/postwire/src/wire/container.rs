//! Arrays, sequences, strings and maps.

use super::{prealloc, Decode, Decoder, Encode, Encoder, Kind, Kinded};
use crate::error::WireError;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

impl<T: Encode, const N: usize> Kinded for [T; N] {
    fn kind(&self) -> Kind {
        Kind::Array
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        encode_elements(self, enc)
    }
}

impl<T: Encode + Decode, const N: usize> Decode for [T; N] {
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
        let found = dec.read_count()?;
        if found != N as u64 {
            return Err(WireError::ArrayLengthMismatch { expected: N, found });
        }
        for elem in self.iter_mut() {
            dec.decode(elem)?;
        }
        Ok(())
    }
}

impl<T: Encode> Kinded for [T] {
    fn kind(&self) -> Kind {
        Kind::Slice
    }
}

impl<T: Encode> Encode for [T] {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        encode_elements(self, enc)
    }
}

impl<T: Encode> Kinded for Vec<T> {
    fn kind(&self) -> Kind {
        Kind::Slice
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        encode_elements(self, enc)
    }
}

impl<T: Encode + Decode + Default> Decode for Vec<T> {
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
        let count = dec.read_count()?;
        let mut fresh = Vec::with_capacity(prealloc(count));
        for _ in 0..count {
            let mut elem = T::default();
            dec.decode(&mut elem)?;
            fresh.push(elem);
        }
        *self = fresh;
        Ok(())
    }
}

fn encode_elements<T: Encode>(elems: &[T], enc: &mut Encoder<'_>) -> Result<(), WireError> {
    enc.write_count(elems.len())?;
    for elem in elems {
        enc.encode(elem)?;
    }
    Ok(())
}

impl Kinded for str {
    fn kind(&self) -> Kind {
        Kind::String
    }
}

impl Encode for str {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        enc.write_count(self.len())?;
        enc.write_bytes(self.as_bytes())
    }
}

impl Kinded for String {
    fn kind(&self) -> Kind {
        Kind::String
    }
}

impl Encode for String {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        self.as_str().encode_payload(enc)
    }
}

impl Decode for String {
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
        let len = dec.read_count()?;
        let bytes = dec.read_bytes(len)?;
        *self = String::from_utf8(bytes).map_err(WireError::InvalidUtf8)?;
        Ok(())
    }
}

impl<K: Encode, V: Encode, S> Kinded for HashMap<K, V, S> {
    fn kind(&self) -> Kind {
        Kind::Map
    }
}

impl<K: Encode, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        encode_pairs(self.len(), self.iter(), enc)
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: Encode + Decode + Default + Eq + Hash,
    V: Encode + Decode + Default,
    S: BuildHasher + Default,
{
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
        let count = dec.read_count()?;
        let mut fresh = HashMap::with_capacity_and_hasher(prealloc(count), S::default());
        for _ in 0..count {
            let (key, value) = decode_pair(dec)?;
            fresh.insert(key, value);
        }
        *self = fresh;
        Ok(())
    }
}

impl<K: Encode, V: Encode> Kinded for BTreeMap<K, V> {
    fn kind(&self) -> Kind {
        Kind::Map
    }
}

impl<K: Encode, V: Encode> Encode for BTreeMap<K, V> {
    fn encode_payload(&self, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        encode_pairs(self.len(), self.iter(), enc)
    }
}

impl<K, V> Decode for BTreeMap<K, V>
where
    K: Encode + Decode + Default + Ord,
    V: Encode + Decode + Default,
{
    fn decode_payload(&mut self, dec: &mut Decoder<'_>) -> Result<(), WireError> {
        let count = dec.read_count()?;
        let mut fresh = BTreeMap::new();
        for _ in 0..count {
            let (key, value) = decode_pair(dec)?;
            fresh.insert(key, value);
        }
        *self = fresh;
        Ok(())
    }
}

fn encode_pairs<'v, K, V, I>(len: usize, pairs: I, enc: &mut Encoder<'_>) -> Result<(), WireError>
where
    K: Encode + 'v,
    V: Encode + 'v,
    I: Iterator<Item = (&'v K, &'v V)>,
{
    enc.write_count(len)?;
    for (key, value) in pairs {
        enc.encode(key)?;
        enc.encode(value)?;
    }
    Ok(())
}

fn decode_pair<K, V>(dec: &mut Decoder<'_>) -> Result<(K, V), WireError>
where
    K: Decode + Default,
    V: Decode + Default,
{
    let mut key = K::default();
    dec.decode(&mut key)?;
    let mut value = V::default();
    dec.decode(&mut value)?;
    Ok((key, value))
}
