//! Field-level pack/unpack.
//!
//! All multi-byte integers are little-endian. Composite payloads are built
//! by packing fields one after another in wire order; decoding reads them
//! back in the same order.

use crate::error::{ConversionError, DecodeError, EncodeError};
use crate::pdu::{Pdu, ReceivedPdu};

/// A value with a wire encoding.
pub trait Pack {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError>;
}

/// A value that can be read from a received payload.
pub trait Unpack: Sized {
    fn unpack(pdu: &mut ReceivedPdu) -> Result<Self, DecodeError>;
}

macro_rules! impl_int {
    ($($ty:ty),+) => {
        $(
            impl Pack for $ty {
                fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
                    pdu.put_slice(&self.to_le_bytes())
                }
            }

            impl Unpack for $ty {
                fn unpack(pdu: &mut ReceivedPdu) -> Result<Self, DecodeError> {
                    Ok(<$ty>::from_le_bytes(pdu.take_array()?))
                }
            }
        )+
    };
}

impl_int!(u8, u16, u32, u64, i8, i16, i32, i64);

impl Pack for bool {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        u8::from(*self).pack(pdu)
    }
}

impl Unpack for bool {
    fn unpack(pdu: &mut ReceivedPdu) -> Result<Self, DecodeError> {
        Ok(u8::unpack(pdu)? != 0)
    }
}

impl<const N: usize> Pack for [u8; N] {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        pdu.put_slice(self)
    }
}

impl<const N: usize> Unpack for [u8; N] {
    fn unpack(pdu: &mut ReceivedPdu) -> Result<Self, DecodeError> {
        pdu.take_array()
    }
}

impl<A: Pack, B: Pack> Pack for (A, B) {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        self.0.pack(pdu)?;
        self.1.pack(pdu)
    }
}

impl<A: Unpack, B: Unpack> Unpack for (A, B) {
    fn unpack(pdu: &mut ReceivedPdu) -> Result<Self, DecodeError> {
        let a = A::unpack(pdu)?;
        let b = B::unpack(pdu)?;
        Ok((a, b))
    }
}

impl<T: Pack + ?Sized> Pack for &T {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        (**self).pack(pdu)
    }
}

impl Pack for str {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        pack_text(self, pdu)
    }
}

impl Pack for String {
    fn pack(&self, pdu: &mut Pdu) -> Result<(), EncodeError> {
        pack_text(self, pdu)
    }
}

impl Unpack for String {
    fn unpack(pdu: &mut ReceivedPdu) -> Result<Self, DecodeError> {
        unpack_text(pdu)
    }
}

/// Integer widths usable as an array count prefix.
pub trait CountField: Pack + Unpack + Copy {
    const MAX: usize;
    fn from_count(count: usize) -> Self;
    fn to_count(self) -> usize;
}

impl CountField for u8 {
    const MAX: usize = u8::MAX as usize;

    fn from_count(count: usize) -> Self {
        count as u8
    }

    fn to_count(self) -> usize {
        usize::from(self)
    }
}

impl CountField for u16 {
    const MAX: usize = u16::MAX as usize;

    fn from_count(count: usize) -> Self {
        count as u16
    }

    fn to_count(self) -> usize {
        usize::from(self)
    }
}

/// Pack elements back to back, without a count.
pub fn pack_array<T: Pack>(items: &[T], pdu: &mut Pdu) -> Result<(), EncodeError> {
    items.iter().try_for_each(|item| item.pack(pdu))
}

/// Pack a `C`-wide element count followed by the elements.
pub fn pack_counted<C: CountField, T: Pack>(items: &[T], pdu: &mut Pdu) -> Result<(), EncodeError> {
    if items.len() > C::MAX {
        return Err(EncodeError::CountOverflow {
            count: items.len(),
            max: C::MAX,
        });
    }
    C::from_count(items.len()).pack(pdu)?;
    pack_array(items, pdu)
}

/// Pack a count followed by interleaved `(a[i], b[i])` pairs.
///
/// Both slices describe the same elements and must be equally long.
pub fn pack_parallel<C: CountField, A: Pack, B: Pack>(
    a: &[A],
    b: &[B],
    pdu: &mut Pdu,
) -> Result<(), EncodeError> {
    if a.len() != b.len() {
        return Err(EncodeError::ArrayLength {
            declared: a.len(),
            actual: b.len(),
        });
    }
    if a.len() > C::MAX {
        return Err(EncodeError::CountOverflow {
            count: a.len(),
            max: C::MAX,
        });
    }
    C::from_count(a.len()).pack(pdu)?;
    a.iter().zip(b).try_for_each(|(x, y)| {
        x.pack(pdu)?;
        y.pack(pdu)
    })
}

/// Unpack exactly `count` elements.
pub fn unpack_array<T: Unpack>(pdu: &mut ReceivedPdu, count: usize) -> Result<Vec<T>, DecodeError> {
    // Cap the allocation by what the payload can possibly hold.
    let mut items = Vec::with_capacity(count.min(pdu.remaining()));
    for _ in 0..count {
        items.push(T::unpack(pdu)?);
    }
    Ok(items)
}

/// Unpack a `C`-wide count followed by that many elements.
pub fn unpack_counted<C: CountField, T: Unpack>(
    pdu: &mut ReceivedPdu,
) -> Result<Vec<T>, DecodeError> {
    let count = C::unpack(pdu)?.to_count();
    unpack_array(pdu, count)
}

/// Pack `value` as wire type `W`.
pub fn pack_as<W, T>(value: T, pdu: &mut Pdu) -> Result<(), EncodeError>
where
    T: Copy + Into<u64>,
    W: TryFrom<T> + Pack,
{
    let wire = W::try_from(value)
        .map_err(|_| ConversionError::new(short_type_name::<W>(), value.into()))?;
    wire.pack(pdu)
}

/// Unpack wire type `W` and convert it into `T`.
pub fn unpack_as<W, T>(pdu: &mut ReceivedPdu) -> Result<T, DecodeError>
where
    W: Unpack + Copy + Into<u64>,
    T: TryFrom<W>,
{
    let wire = W::unpack(pdu)?;
    T::try_from(wire)
        .map_err(|_| ConversionError::new(short_type_name::<T>(), wire.into()).into())
}

/// Pack a text field: `u8` length counting the terminating NUL, the UTF-8
/// bytes, then the NUL.
pub fn pack_text(text: &str, pdu: &mut Pdu) -> Result<(), EncodeError> {
    let max = usize::from(u8::MAX) - 1;
    if text.len() > max {
        return Err(EncodeError::TextTooLong {
            len: text.len(),
            max,
        });
    }
    ((text.len() + 1) as u8).pack(pdu)?;
    pdu.put_slice(text.as_bytes())?;
    0u8.pack(pdu)
}

/// Unpack a text field written by [`pack_text`].
pub fn unpack_text(pdu: &mut ReceivedPdu) -> Result<String, DecodeError> {
    let len = usize::from(u8::unpack(pdu)?);
    let raw = pdu.take(len)?;
    let text = match raw.split_last() {
        Some((&0, rest)) => rest,
        _ => &raw[..],
    };
    String::from_utf8(text.to_vec()).map_err(|_| DecodeError::InvalidText)
}

/// Decode a whole payload as `T`, then report any trailing bytes.
pub fn unpack_pdu<T: Unpack>(pdu: &mut ReceivedPdu) -> Result<T, DecodeError> {
    let value = T::unpack(pdu)?;
    pdu.finish();
    Ok(value)
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Declare a closed protocol enum with explicit wire discriminants.
///
/// Generates `From<Enum> for repr`, `TryFrom<repr> for Enum` (rejecting unknown
/// values with [`ConversionError`]) and [`Pack`]/[`Unpack`].
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident: $repr:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr($repr)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl ::core::convert::From<$name> for $repr {
            fn from(value: $name) -> $repr {
                value as $repr
            }
        }

        impl ::core::convert::TryFrom<$repr> for $name {
            type Error = $crate::ConversionError;

            fn try_from(value: $repr) -> ::core::result::Result<Self, $crate::ConversionError> {
                $(
                    if value == $value {
                        return Ok($name::$variant);
                    }
                )+
                Err($crate::ConversionError::new(stringify!($name), u64::from(value)))
            }
        }

        impl $crate::Pack for $name {
            fn pack(
                &self,
                pdu: &mut $crate::Pdu,
            ) -> ::core::result::Result<(), $crate::EncodeError> {
                $crate::Pack::pack(&$repr::from(*self), pdu)
            }
        }

        impl $crate::Unpack for $name {
            fn unpack(
                pdu: &mut $crate::ReceivedPdu,
            ) -> ::core::result::Result<Self, $crate::DecodeError> {
                let raw = <$repr as $crate::Unpack>::unpack(pdu)?;
                Ok(<$name as ::core::convert::TryFrom<$repr>>::try_from(raw)?)
            }
        }
    };
}
