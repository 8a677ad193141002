//! Declarative struct layouts over native regions
//!
//! A [`LayoutDescriptor`] maps named fields to byte offsets inside a
//! [`crate::memory::Region`]. Offsets come from declaration order unless a
//! field is pinned with [`FieldSpec::at`]. Accessors obtained from a
//! descriptor read and write one field with an explicit byte order, going
//! through the region's scope and bounds checks on every call.
//!
//! ```text
//! builder("header")            offset  size
//!   .value("kind", 16, BE)        0      2
//!   .value("length", 32, BE)      2      4
//!   .bytes("tag", 8)              6      8
//!                               total   14
//! ```

pub mod accessor;
pub mod descriptor;
pub mod field;

pub use accessor::{Adapted, Carrier, FieldAccessor, SequenceAccessor};
pub use descriptor::{LayoutBuilder, LayoutDescriptor};
pub use field::{ByteOrder, Field, FieldKind, FieldSpec};
