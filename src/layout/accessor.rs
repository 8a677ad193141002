//! Typed get/set accessors bound to one layout field

use std::{fmt, marker::PhantomData};

use super::field::ByteOrder;
use crate::{
    error::{MemScopeError, Result},
    memory::Region,
};

mod sealed {
    pub trait Sealed {}
}

/// Integer type that can carry a field's value.
///
/// Implemented for the fixed-width integers `u8..=u64` and `i8..=i64`.
pub trait Carrier: Copy + PartialEq + fmt::Debug + Send + Sync + 'static + sealed::Sealed {
    /// Width in bits
    const BITS: u32;
    const SIGNED: bool;

    /// Two's-complement bits, zero-extended to 64 bits
    fn to_bits(self) -> u64;

    /// Keep the low `BITS` bits of `bits`
    fn from_bits(bits: u64) -> Self;

    /// Width in bytes
    fn byte_len() -> usize {
        Self::BITS as usize / 8
    }

    /// Bits with the top bit of this width copied upwards
    fn sign_extended_bits(self) -> u64 {
        let shift = 64 - Self::BITS;
        (((self.to_bits() << shift) as i64) >> shift) as u64
    }

    /// Decode from exactly `byte_len()` bytes
    fn decode(bytes: &[u8], order: ByteOrder) -> Self {
        let fold = |bits: u64, &b: &u8| (bits << 8) | u64::from(b);
        let bits = match order {
            ByteOrder::BigEndian => bytes.iter().fold(0, fold),
            ByteOrder::LittleEndian => bytes.iter().rev().fold(0, fold),
        };
        Self::from_bits(bits)
    }

    /// Encode into exactly `byte_len()` bytes
    fn encode(self, bytes: &mut [u8], order: ByteOrder) {
        let bits = self.to_bits();
        let last = bytes.len().saturating_sub(1);
        for (i, byte) in bytes.iter_mut().enumerate() {
            let shift = match order {
                ByteOrder::BigEndian => 8 * (last - i),
                ByteOrder::LittleEndian => 8 * i,
            };
            *byte = (bits >> shift) as u8;
        }
    }
}

macro_rules! impl_carrier {
    ($($t:ty => $unsigned:ty, $signed:expr);* $(;)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl Carrier for $t {
                const BITS: u32 = <$t>::BITS;
                const SIGNED: bool = $signed;

                #[inline]
                fn to_bits(self) -> u64 {
                    self as $unsigned as u64
                }

                #[inline]
                fn from_bits(bits: u64) -> Self {
                    bits as $unsigned as $t
                }
            }
        )*
    };
}

impl_carrier! {
    u8 => u8, false;
    u16 => u16, false;
    u32 => u32, false;
    u64 => u64, false;
    i8 => u8, true;
    i16 => u16, true;
    i32 => u32, true;
    i64 => u64, true;
}

const SCRATCH: usize = 8;

/// Accessor for one value field (or one sequence element) of a layout
#[derive(Clone)]
pub struct FieldAccessor<T: Carrier> {
    name: String,
    offset: usize,
    order: ByteOrder,
    _carrier: PhantomData<fn() -> T>,
}

impl<T: Carrier> FieldAccessor<T> {
    pub(crate) fn new(name: impl Into<String>, offset: usize, order: ByteOrder) -> Self {
        Self {
            name: name.into(),
            offset,
            order,
            _carrier: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Read the field from `region`
    #[inline]
    pub fn get(&self, region: &Region) -> Result<T> {
        let mut scratch = [0u8; SCRATCH];
        let bytes = &mut scratch[..T::byte_len()];
        region.read_bytes(self.offset, bytes)?;
        Ok(T::decode(bytes, self.order))
    }

    /// Write `value` into the field of `region`
    #[inline]
    pub fn set(&self, region: &mut Region, value: T) -> Result<()> {
        let mut scratch = [0u8; SCRATCH];
        let bytes = &mut scratch[..T::byte_len()];
        value.encode(bytes, self.order);
        region.write_bytes(self.offset, bytes)
    }

    /// View the field through a wider carrier using zero extension on read
    pub fn as_unsigned<W: Carrier>(self) -> Result<Adapted<T, W>> {
        Adapted::new(self, zero_extend::<T, W>, truncate::<W, T>)
    }

    /// View the field through a wider carrier using sign extension on read
    pub fn as_signed<W: Carrier>(self) -> Result<Adapted<T, W>> {
        Adapted::new(self, sign_extend::<T, W>, truncate::<W, T>)
    }
}

impl<T: Carrier> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("order", &self.order)
            .field("bits", &T::BITS)
            .finish()
    }
}

fn zero_extend<N: Carrier, W: Carrier>(value: N) -> W {
    W::from_bits(value.to_bits())
}

fn sign_extend<N: Carrier, W: Carrier>(value: N) -> W {
    W::from_bits(value.sign_extended_bits())
}

fn truncate<W: Carrier, N: Carrier>(value: W) -> N {
    N::from_bits(value.to_bits())
}

/// A narrow physical field exposed through a wider logical carrier.
///
/// Reads widen with `widen`; writes narrow with `narrow`, which truncates.
#[derive(Clone)]
pub struct Adapted<N: Carrier, W: Carrier> {
    physical: FieldAccessor<N>,
    widen: fn(N) -> W,
    narrow: fn(W) -> N,
}

impl<N: Carrier, W: Carrier> Adapted<N, W> {
    /// Wrap `physical` with explicit conversion functions
    pub fn new(physical: FieldAccessor<N>, widen: fn(N) -> W, narrow: fn(W) -> N) -> Result<Self> {
        if W::BITS <= N::BITS {
            return Err(MemScopeError::invalid_parameter(
                "carrier",
                format!(
                    "Adapted carrier ({} bits) must be wider than field {} ({} bits)",
                    W::BITS,
                    physical.name,
                    N::BITS
                ),
            ));
        }
        Ok(Self {
            physical,
            widen,
            narrow,
        })
    }

    /// The underlying narrow accessor
    pub fn physical(&self) -> &FieldAccessor<N> {
        &self.physical
    }

    #[inline]
    pub fn get(&self, region: &Region) -> Result<W> {
        self.physical.get(region).map(self.widen)
    }

    #[inline]
    pub fn set(&self, region: &mut Region, value: W) -> Result<()> {
        self.physical.set(region, (self.narrow)(value))
    }
}

impl<N: Carrier, W: Carrier> fmt::Debug for Adapted<N, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapted")
            .field("physical", &self.physical)
            .field("logical_bits", &W::BITS)
            .finish()
    }
}

/// Whole-array accessor for a sequence field
#[derive(Debug, Clone)]
pub struct SequenceAccessor {
    name: String,
    offset: usize,
    count: usize,
    element_bits: u32,
    order: ByteOrder,
}

impl SequenceAccessor {
    pub(crate) fn new(
        name: impl Into<String>,
        offset: usize,
        count: usize,
        element_bits: u32,
        order: ByteOrder,
    ) -> Self {
        Self {
            name: name.into(),
            offset,
            count,
            element_bits,
            order,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn element_bits(&self) -> u32 {
        self.element_bits
    }

    /// Total size of the sequence in bytes
    pub fn byte_len(&self) -> usize {
        self.count * (self.element_bits as usize / 8)
    }

    /// Accessor for element `index`
    pub fn element<T: Carrier>(&self, index: usize) -> Result<FieldAccessor<T>> {
        if T::BITS != self.element_bits {
            return Err(MemScopeError::carrier_mismatch(
                &self.name,
                self.element_bits,
                T::BITS,
            ));
        }
        if index >= self.count {
            return Err(MemScopeError::IndexOutOfBounds {
                index,
                count: self.count,
            });
        }
        let offset = self.offset + index * T::byte_len();
        Ok(FieldAccessor::new(
            format!("{}[{}]", self.name, index),
            offset,
            self.order,
        ))
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.byte_len() {
            return Err(MemScopeError::invalid_parameter(
                "len",
                format!(
                    "Sequence {} is {} bytes, buffer is {} bytes",
                    self.name,
                    self.byte_len(),
                    len
                ),
            ));
        }
        Ok(())
    }

    /// Copy the raw sequence bytes into `dst`, which must be exactly `byte_len()` long
    pub fn copy_out(&self, region: &Region, dst: &mut [u8]) -> Result<()> {
        self.check_len(dst.len())?;
        region.read_bytes(self.offset, dst)
    }

    /// Overwrite the raw sequence bytes from `src`, which must be exactly `byte_len()` long
    pub fn copy_in(&self, region: &mut Region, src: &[u8]) -> Result<()> {
        self.check_len(src.len())?;
        region.write_bytes(self.offset, src)
    }

    /// Raw sequence bytes as a vector
    pub fn to_vec(&self, region: &Region) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.byte_len()];
        self.copy_out(region, &mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::MemoryScope;

    #[test]
    fn test_carrier_bits() {
        assert_eq!((-1i8).to_bits(), 0xFF);
        assert_eq!(i16::from_bits(0x1_8000), i16::MIN);
        assert_eq!(0x80u8.sign_extended_bits(), 0xFFFF_FFFF_FFFF_FF80);
        assert_eq!(0x7Fu8.sign_extended_bits(), 0x7F);
        assert_eq!(u64::MAX.sign_extended_bits(), u64::MAX);
    }

    #[test]
    fn test_encode_decode_orders() {
        let mut bytes = [0u8; 4];
        0x0102_0304u32.encode(&mut bytes, ByteOrder::BigEndian);
        assert_eq!(bytes, [1, 2, 3, 4]);
        assert_eq!(u32::decode(&bytes, ByteOrder::LittleEndian), 0x0403_0201);

        0x0102_0304u32.encode(&mut bytes, ByteOrder::LittleEndian);
        assert_eq!(bytes, [4, 3, 2, 1]);
        assert_eq!(u32::decode(&bytes, ByteOrder::native()), u32::from_ne_bytes(bytes));
    }

    #[test]
    fn test_field_get_set() {
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(8).unwrap();
        let port = FieldAccessor::<u16>::new("port", 2, ByteOrder::BigEndian);

        port.set(&mut region, 8080).unwrap();
        assert_eq!(port.get(&region).unwrap(), 8080);
        assert_eq!(&region.to_vec().unwrap()[2..4], &[0x1F, 0x90]);

        let past_end = FieldAccessor::<u32>::new("tail", 6, ByteOrder::BigEndian);
        assert_eq!(
            past_end.get(&region),
            Err(MemScopeError::out_of_bounds(6, 4, 8))
        );
    }

    #[test]
    fn test_adapted_extension() {
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(1).unwrap();
        let tag = FieldAccessor::<u8>::new("tag", 0, ByteOrder::native());

        let unsigned = tag.clone().as_unsigned::<u32>().unwrap();
        let signed = tag.as_signed::<i32>().unwrap();

        unsigned.set(&mut region, 0x1_00F0).unwrap();
        assert_eq!(region.to_vec().unwrap(), vec![0xF0]);
        assert_eq!(unsigned.get(&region).unwrap(), 0xF0);
        assert_eq!(signed.get(&region).unwrap(), -16);

        // The narrow accessor behind the adapter still reads the raw byte
        assert_eq!(unsigned.physical().name(), "tag");
        assert_eq!(unsigned.physical().offset(), 0);
        assert_eq!(signed.physical().get(&region).unwrap(), 0xF0);
    }

    #[test]
    fn test_adapted_rejects_non_widening() {
        let tag = FieldAccessor::<u16>::new("tag", 0, ByteOrder::native());
        assert!(matches!(
            tag.clone().as_unsigned::<u16>(),
            Err(MemScopeError::InvalidParameter { .. })
        ));
        assert!(tag.as_signed::<i8>().is_err());
    }

    #[test]
    fn test_sequence_elements() {
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(8).unwrap();
        let words = SequenceAccessor::new("words", 0, 4, 16, ByteOrder::LittleEndian);

        words.element::<u16>(3).unwrap().set(&mut region, 0xABCD).unwrap();
        assert_eq!(&region.to_vec().unwrap()[6..], &[0xCD, 0xAB]);
        assert_eq!(
            words.element::<u16>(4).unwrap_err(),
            MemScopeError::IndexOutOfBounds { index: 4, count: 4 }
        );
        assert!(matches!(
            words.element::<u32>(0),
            Err(MemScopeError::CarrierMismatch { .. })
        ));

        words.copy_in(&mut region, &[1; 8]).unwrap();
        assert_eq!(words.to_vec(&region).unwrap(), vec![1; 8]);
        assert!(words.copy_in(&mut region, &[1; 7]).is_err());
    }
}
