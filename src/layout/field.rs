//! Field declarations for layout descriptors

use serde::{Deserialize, Serialize};

use crate::error::{MemScopeError, Result};

/// Byte order of a multi-byte field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Most significant byte first; network order
    BigEndian,
    /// Least significant byte first
    LittleEndian,
}

impl ByteOrder {
    /// Network byte order
    pub const NETWORK: ByteOrder = ByteOrder::BigEndian;

    /// Byte order of the host
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }
}

/// What a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// A single 8/16/32/64-bit integer
    Value { bits: u32, signed: bool },
    /// `count` integers of `element_bits` each, laid out back to back
    Sequence { count: usize, element_bits: u32 },
    /// Unnamed filler bytes
    Padding { bytes: usize },
}

/// Integer widths a field may use
pub const SUPPORTED_WIDTHS: [u32; 4] = [8, 16, 32, 64];

/// Declaration of one field, placed by [`super::LayoutBuilder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) order: ByteOrder,
    pub(crate) at: Option<usize>,
}

impl FieldSpec {
    /// Integer field of `bits` width
    pub fn value(name: impl Into<String>, bits: u32, order: ByteOrder, signed: bool) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Value { bits, signed },
            order,
            at: None,
        }
    }

    /// Array of `count` integers of `element_bits` width
    pub fn sequence(
        name: impl Into<String>,
        count: usize,
        element_bits: u32,
        order: ByteOrder,
    ) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Sequence {
                count,
                element_bits,
            },
            order,
            at: None,
        }
    }

    /// Raw byte array of length `len`
    pub fn bytes(name: impl Into<String>, len: usize) -> Self {
        Self::sequence(name, len, 8, ByteOrder::NETWORK)
    }

    /// Unnamed filler
    pub fn padding(bytes: usize) -> Self {
        Self {
            name: String::new(),
            kind: FieldKind::Padding { bytes },
            order: ByteOrder::NETWORK,
            at: None,
        }
    }

    /// Pin the field to an explicit byte offset instead of the running cursor
    pub fn at(mut self, offset: usize) -> Self {
        self.at = Some(offset);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let bits = match self.kind {
            FieldKind::Value { bits, .. } => bits,
            FieldKind::Sequence { element_bits, .. } => element_bits,
            FieldKind::Padding { .. } => return Ok(()),
        };
        if self.name.is_empty() {
            return Err(MemScopeError::invalid_parameter(
                "name",
                "Field name cannot be empty",
            ));
        }
        if !SUPPORTED_WIDTHS.contains(&bits) {
            return Err(MemScopeError::invalid_parameter(
                "bits",
                format!("Field {} has unsupported width {} bits", self.name, bits),
            ));
        }
        Ok(())
    }

    /// Size in bytes, `None` on overflow
    pub(crate) fn byte_len(&self) -> Option<usize> {
        match self.kind {
            FieldKind::Value { bits, .. } => Some(bits as usize / 8),
            FieldKind::Sequence {
                count,
                element_bits,
            } => count.checked_mul(element_bits as usize / 8),
            FieldKind::Padding { bytes } => Some(bytes),
        }
    }
}

/// A placed field inside a built [`super::LayoutDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) kind: FieldKind,
    pub(crate) order: ByteOrder,
    pub(crate) offset: usize,
    pub(crate) size: usize,
}

impl Field {
    /// Field name; empty for padding
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Byte offset from the start of the layout
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// One past the last byte of the field
    pub fn end(&self) -> usize {
        self.offset + self.size
    }

    pub fn is_padding(&self) -> bool {
        matches!(self.kind, FieldKind::Padding { .. })
    }

    pub(crate) fn display_name(&self) -> String {
        if self.is_padding() {
            format!("<padding@{}>", self.offset)
        } else {
            self.name.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_order_matches_target() {
        let expected = if u16::from_ne_bytes([0, 1]) == 1 {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        assert_eq!(ByteOrder::native(), expected);
        assert_eq!(ByteOrder::NETWORK, ByteOrder::BigEndian);
    }

    #[test]
    fn test_spec_sizes() {
        assert_eq!(
            FieldSpec::value("port", 16, ByteOrder::NETWORK, false).byte_len(),
            Some(2)
        );
        assert_eq!(FieldSpec::bytes("addr", 16).byte_len(), Some(16));
        assert_eq!(
            FieldSpec::sequence("words", 3, 32, ByteOrder::LittleEndian).byte_len(),
            Some(12)
        );
        assert_eq!(FieldSpec::padding(5).byte_len(), Some(5));
        assert_eq!(
            FieldSpec::sequence("huge", usize::MAX, 16, ByteOrder::NETWORK).byte_len(),
            None
        );
    }

    #[test]
    fn test_spec_validation() {
        assert!(FieldSpec::value("x", 24, ByteOrder::NETWORK, false)
            .validate()
            .is_err());
        assert!(FieldSpec::value("", 8, ByteOrder::NETWORK, false)
            .validate()
            .is_err());
        assert!(FieldSpec::padding(3).validate().is_ok());
        assert!(FieldSpec::bytes("b", 0).validate().is_ok());
    }
}
