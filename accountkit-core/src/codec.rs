//! Word codec for calldata, signatures and escape calls.
//!
//! Scalars take one word. Sequences are length-prefixed. `Option<T>` is a
//! `0`/`1` tag followed by the value when present. Enums lead with their
//! variant index.

use alloy_primitives::{Address, U256};

use crate::error::{AccountError, AccountResult};
use crate::primitives::{address_to_felt, felt_to_address, Call, Felt};

/// Types that can be written as a sequence of words.
pub trait Encode {
    /// Appends the encoding of `self` to `out`.
    fn encode(&self, out: &mut Vec<Felt>);

    /// Encodes `self` into a fresh vector.
    fn to_words(&self) -> Vec<Felt> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

/// Types that can be read back from a sequence of words.
pub trait Decode: Sized {
    /// Reads one value from `reader`.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidCalldata`] if the words do not encode a `Self`.
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self>;
}

/// Cursor over a word slice.
#[derive(Debug)]
pub struct WordReader<'a> {
    words: &'a [Felt],
    position: usize,
}

impl<'a> WordReader<'a> {
    /// Creates a reader positioned at the first word.
    #[must_use]
    pub const fn new(words: &'a [Felt]) -> Self {
        Self { words, position: 0 }
    }

    /// Reads the next word.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidCalldata`] at the end of input.
    pub fn next_word(&mut self) -> AccountResult<Felt> {
        let word = self
            .words
            .get(self.position)
            .copied()
            .ok_or_else(|| AccountError::calldata("unexpected end of input"))?;
        self.position += 1;
        Ok(word)
    }

    /// Number of words not read yet.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.words.len() - self.position
    }

    /// Fails unless all input was consumed.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidCalldata`] if words are left over.
    pub fn finish(&self) -> AccountResult<()> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(AccountError::calldata(format!(
                "{} trailing words",
                self.remaining()
            )))
        }
    }
}

/// Decodes exactly one `T` from `words`.
///
/// # Errors
/// Returns [`AccountError::InvalidCalldata`] if decoding fails or words are left over.
pub fn decode_all<T: Decode>(words: &[Felt]) -> AccountResult<T> {
    let mut reader = WordReader::new(words);
    let value = T::decode(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

impl Encode for Felt {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(*self);
    }
}

impl Decode for Felt {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        reader.next_word()
    }
}

impl Encode for bool {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(U256::from(u8::from(*self)));
    }
}

impl Decode for bool {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        match u8::decode(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(AccountError::calldata(format!("invalid bool {other}"))),
        }
    }
}

macro_rules! impl_uint_codec {
    ($($ty:ty),*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, out: &mut Vec<Felt>) {
                    out.push(U256::from(*self));
                }
            }

            impl Decode for $ty {
                fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
                    let word = reader.next_word()?;
                    <$ty>::try_from(word).map_err(|_| {
                        AccountError::calldata(concat!("value out of range for ", stringify!($ty)))
                    })
                }
            }
        )*
    };
}

impl_uint_codec!(u8, u32, u64, u128);

impl Encode for Address {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(address_to_felt(*self));
    }
}

impl Decode for Address {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        felt_to_address(reader.next_word()?)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, out: &mut Vec<Felt>) {
        out.push(U256::from(self.len()));
        for item in self {
            item.encode(out);
        }
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        let len = usize::try_from(reader.next_word()?)
            .map_err(|_| AccountError::calldata("length out of range"))?;
        // Every element takes at least one word.
        if len > reader.remaining() {
            return Err(AccountError::calldata("length exceeds input"));
        }
        (0..len).map(|_| T::decode(reader)).collect()
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, out: &mut Vec<Felt>) {
        match self {
            None => out.push(U256::ZERO),
            Some(value) => {
                out.push(U256::from(1));
                value.encode(out);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        if bool::decode(reader)? {
            Ok(Some(T::decode(reader)?))
        } else {
            Ok(None)
        }
    }
}

impl Encode for () {
    fn encode(&self, _out: &mut Vec<Felt>) {}
}

impl Decode for () {
    fn decode(_reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(())
    }
}

impl<A: Encode, B: Encode> Encode for (A, B) {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.0.encode(out);
        self.1.encode(out);
    }
}

impl<A: Decode, B: Decode> Decode for (A, B) {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok((A::decode(reader)?, B::decode(reader)?))
    }
}

impl Encode for Call {
    fn encode(&self, out: &mut Vec<Felt>) {
        self.to.encode(out);
        self.selector.encode(out);
        self.calldata.encode(out);
    }
}

impl Decode for Call {
    fn decode(reader: &mut WordReader<'_>) -> AccountResult<Self> {
        Ok(Self {
            to: Address::decode(reader)?,
            selector: Felt::decode(reader)?,
            calldata: Vec::decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::selector;
    use alloy_primitives::address;

    #[test]
    fn test_call_encoding_layout() {
        let call = Call::new(
            address!("0x0000000000000000000000000000000000000042"),
            selector("transfer"),
            vec![U256::from(5), U256::from(6)],
        );
        let words = call.to_words();
        assert_eq!(
            words,
            vec![
                U256::from(0x42),
                selector("transfer"),
                U256::from(2),
                U256::from(5),
                U256::from(6)
            ]
        );
        assert_eq!(decode_all::<Call>(&words).unwrap(), call);
    }

    #[test]
    fn test_rejects_trailing_words() {
        let err = decode_all::<u32>(&[U256::from(1), U256::from(2)]).unwrap_err();
        assert!(matches!(err, AccountError::InvalidCalldata(_)));
    }

    #[test]
    fn test_rejects_truncated_array() {
        let words = vec![U256::from(3), U256::from(1)];
        assert!(decode_all::<Vec<Felt>>(&words).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_scalars() {
        assert!(decode_all::<u32>(&[U256::from(u64::MAX)]).is_err());
        assert!(decode_all::<bool>(&[U256::from(2)]).is_err());
    }

    #[test]
    fn test_option_encoding() {
        assert_eq!(None::<u32>.to_words(), vec![U256::ZERO]);
        assert_eq!(
            Some(7u32).to_words(),
            vec![U256::from(1), U256::from(7)]
        );
    }
}
