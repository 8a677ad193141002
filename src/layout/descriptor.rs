//! Declarative field maps over region bytes

use std::collections::HashSet;

use super::{
    accessor::{Carrier, FieldAccessor, SequenceAccessor},
    field::{ByteOrder, Field, FieldKind, FieldSpec},
};
use crate::{
    error::{MemScopeError, Result},
    memory::Region,
};

/// Builder collecting field declarations in order
#[derive(Debug, Clone)]
pub struct LayoutBuilder {
    name: String,
    specs: Vec<FieldSpec>,
}

impl LayoutBuilder {
    /// Append a field declaration
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Append an integer field
    pub fn value(self, name: impl Into<String>, bits: u32, order: ByteOrder, signed: bool) -> Self {
        self.field(FieldSpec::value(name, bits, order, signed))
    }

    /// Append an integer array
    pub fn sequence(
        self,
        name: impl Into<String>,
        count: usize,
        element_bits: u32,
        order: ByteOrder,
    ) -> Self {
        self.field(FieldSpec::sequence(name, count, element_bits, order))
    }

    /// Append a byte array
    pub fn bytes(self, name: impl Into<String>, len: usize) -> Self {
        self.field(FieldSpec::bytes(name, len))
    }

    /// Append filler bytes
    pub fn padding(self, bytes: usize) -> Self {
        self.field(FieldSpec::padding(bytes))
    }

    /// Place every field and validate the result.
    ///
    /// Fields without an explicit offset go at the running cursor, which
    /// advances past each field in declaration order. No implicit alignment
    /// is inserted.
    pub fn build(self) -> Result<LayoutDescriptor> {
        let mut names = HashSet::new();
        let mut fields = Vec::with_capacity(self.specs.len());
        let mut cursor = 0usize;

        for spec in self.specs {
            spec.validate()?;
            if !spec.name.is_empty() && !names.insert(spec.name.clone()) {
                return Err(MemScopeError::invalid_parameter(
                    "name",
                    format!("Duplicate field {} in layout {}", spec.name, self.name),
                ));
            }

            let offset = spec.at.unwrap_or(cursor);
            let size = spec
                .byte_len()
                .ok_or_else(|| MemScopeError::invalid_parameter("count", "Field size overflows"))?;
            cursor = offset
                .checked_add(size)
                .ok_or_else(|| MemScopeError::invalid_parameter("offset", "Field end overflows"))?;

            fields.push(Field {
                name: spec.name,
                kind: spec.kind,
                order: spec.order,
                offset,
                size,
            });
        }

        fields.sort_by_key(|field| field.offset);

        let mut size = 0usize;
        let mut widest: Option<&Field> = None;
        for field in fields.iter().filter(|field| field.size > 0) {
            if let Some(previous) = widest {
                if previous.end() > field.offset {
                    return Err(MemScopeError::layout_overlap(
                        previous.display_name(),
                        field.display_name(),
                    ));
                }
            }
            if field.end() > size {
                size = field.end();
                widest = Some(field);
            }
        }

        Ok(LayoutDescriptor {
            name: self.name,
            fields,
            size,
        })
    }
}

/// Ordered, validated set of fields with a total size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutDescriptor {
    name: String,
    fields: Vec<Field>,
    size: usize,
}

impl LayoutDescriptor {
    /// Start declaring a layout
    pub fn builder(name: impl Into<String>) -> LayoutBuilder {
        LayoutBuilder {
            name: name.into(),
            specs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total size in bytes: the end of the last field
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fields sorted by offset, padding included
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a named field
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.fields
            .iter()
            .find(|field| !field.is_padding() && field.name == name)
            .ok_or_else(|| MemScopeError::field_not_found(name))
    }

    /// Byte offset of a named field
    pub fn offset_of(&self, name: &str) -> Result<usize> {
        self.field(name).map(Field::offset)
    }

    /// Fails with `InsufficientSpace` unless `region` can hold the layout
    pub fn check_fits(&self, region: &Region) -> Result<()> {
        if region.len() < self.size {
            return Err(MemScopeError::insufficient_space(self.size, region.len()));
        }
        Ok(())
    }

    /// Typed accessor for a value field
    pub fn accessor<T: Carrier>(&self, name: &str) -> Result<FieldAccessor<T>> {
        let field = self.field(name)?;
        match field.kind {
            FieldKind::Value { bits, .. } if bits == T::BITS => {
                Ok(FieldAccessor::new(name, field.offset, field.order))
            }
            FieldKind::Value { bits, .. } => {
                Err(MemScopeError::carrier_mismatch(name, bits, T::BITS))
            }
            _ => Err(MemScopeError::invalid_parameter(
                "name",
                format!("Field {} is a sequence; use an element accessor", name),
            )),
        }
    }

    /// Typed accessor for element `index` of a sequence field
    pub fn element_accessor<T: Carrier>(&self, name: &str, index: usize) -> Result<FieldAccessor<T>> {
        self.sequence_accessor(name)?.element(index)
    }

    /// Whole-array accessor for a sequence field
    pub fn sequence_accessor(&self, name: &str) -> Result<SequenceAccessor> {
        let field = self.field(name)?;
        match field.kind {
            FieldKind::Sequence {
                count,
                element_bits,
            } => Ok(SequenceAccessor::new(
                name,
                field.offset,
                count,
                element_bits,
                field.order,
            )),
            _ => Err(MemScopeError::invalid_parameter(
                "name",
                format!("Field {} is not a sequence", name),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::MemoryScope;

    fn header() -> LayoutDescriptor {
        LayoutDescriptor::builder("header")
            .value("kind", 16, ByteOrder::BigEndian, false)
            .value("length", 32, ByteOrder::BigEndian, false)
            .bytes("tag", 8)
            .build()
            .unwrap()
    }

    #[test]
    fn test_offsets_follow_declaration_order() {
        let layout = header();
        assert_eq!(layout.size(), 14);
        assert_eq!(layout.offset_of("kind").unwrap(), 0);
        assert_eq!(layout.offset_of("length").unwrap(), 2);
        assert_eq!(layout.offset_of("tag").unwrap(), 6);
        assert_eq!(
            layout.offset_of("missing"),
            Err(MemScopeError::field_not_found("missing"))
        );
    }

    #[test]
    fn test_empty_layout() {
        let layout = LayoutDescriptor::builder("empty").build().unwrap();
        assert_eq!(layout.size(), 0);
        assert!(layout.fields().is_empty());
    }

    #[test]
    fn test_explicit_offsets_sorted() {
        let layout = LayoutDescriptor::builder("sparse")
            .field(FieldSpec::value("b", 8, ByteOrder::NETWORK, false).at(4))
            .field(FieldSpec::value("a", 8, ByteOrder::NETWORK, false).at(1))
            .build()
            .unwrap();
        let names: Vec<_> = layout.fields().iter().map(Field::name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(layout.size(), 5);
    }

    #[test]
    fn test_padding_shifts_cursor() {
        let layout = LayoutDescriptor::builder("padded")
            .padding(1)
            .value("family", 8, ByteOrder::native(), false)
            .build()
            .unwrap();
        assert_eq!(layout.offset_of("family").unwrap(), 1);
        assert_eq!(layout.fields().len(), 2);
    }

    #[test]
    fn test_overlap_rejected() {
        let result = LayoutDescriptor::builder("bad")
            .bytes("addr", 8)
            .field(FieldSpec::value("port", 16, ByteOrder::NETWORK, false).at(6))
            .build();
        assert_eq!(result, Err(MemScopeError::layout_overlap("addr", "port")));

        // A short field nested inside a wide one is caught too
        let result = LayoutDescriptor::builder("nested")
            .bytes("wide", 16)
            .field(FieldSpec::value("a", 8, ByteOrder::NETWORK, false).at(20))
            .field(FieldSpec::value("b", 8, ByteOrder::NETWORK, false).at(10))
            .build();
        assert_eq!(result, Err(MemScopeError::layout_overlap("wide", "b")));
    }

    #[test]
    fn test_duplicate_and_width_rejected() {
        assert!(matches!(
            LayoutDescriptor::builder("dup").bytes("x", 1).bytes("x", 1).build(),
            Err(MemScopeError::InvalidParameter { .. })
        ));
        assert!(matches!(
            LayoutDescriptor::builder("odd")
                .value("x", 12, ByteOrder::NETWORK, false)
                .build(),
            Err(MemScopeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_accessor_checks() {
        let layout = header();
        assert_eq!(
            layout.accessor::<u32>("kind").unwrap_err(),
            MemScopeError::carrier_mismatch("kind", 16, 32)
        );
        assert!(layout.accessor::<u8>("tag").is_err());
        assert!(layout.sequence_accessor("kind").is_err());
        assert_eq!(
            layout.element_accessor::<u8>("tag", 8).unwrap_err(),
            MemScopeError::IndexOutOfBounds { index: 8, count: 8 }
        );
    }

    #[test]
    fn test_accessors_over_region() {
        let layout = header();
        let scope = MemoryScope::confined();
        let mut region = scope.allocate(layout.size()).unwrap();
        layout.check_fits(&region).unwrap();

        layout.accessor::<u16>("kind").unwrap().set(&mut region, 7).unwrap();
        layout
            .accessor::<u32>("length")
            .unwrap()
            .set(&mut region, 0x0A0B_0C0D)
            .unwrap();
        layout
            .element_accessor::<u8>("tag", 7)
            .unwrap()
            .set(&mut region, 0xEE)
            .unwrap();

        assert_eq!(
            region.to_vec().unwrap(),
            vec![0, 7, 0x0A, 0x0B, 0x0C, 0x0D, 0, 0, 0, 0, 0, 0, 0, 0xEE]
        );

        let small = scope.allocate(4).unwrap();
        assert_eq!(
            layout.check_fits(&small),
            Err(MemScopeError::insufficient_space(14, 4))
        );
    }
}
