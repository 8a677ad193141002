//! Error types and handling for memscope

/// Result type alias for memscope operations
pub type Result<T> = std::result::Result<T, MemScopeError>;

/// Error types for scoped memory, layouts and the sockaddr codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemScopeError {
    /// Region accessed after its owning scope stopped being alive
    #[error("Use after close: scope is no longer alive")]
    UseAfterClose,

    /// Confined scope touched from a thread other than its owner
    #[error("Thread confinement violation: access outside owning thread")]
    ThreadConfinementViolation,

    /// Close attempted on a scope that is already closed (or being closed)
    #[error("Scope already closed")]
    AlreadyClosed,

    /// Close attempted while forks still pin the scope
    #[error("Cannot close scope: {forks} active fork(s)")]
    ActiveForksPreventClose { forks: usize },

    /// Logical address kind does not match the requested family
    #[error("Unsupported address family for requested protocol family")]
    UnsupportedAddressFamily,

    /// Family tag in a sockaddr region is neither AF_INET nor AF_INET6
    #[error("Protocol family mismatch: unknown family tag {family}")]
    ProtocolFamilyMismatch { family: u32 },

    /// Memory allocation failures
    #[error("Memory error: {message}")]
    Memory { message: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Region too small for the requested view or allocation
    #[error("Insufficient space: requested {requested}, available {available}")]
    InsufficientSpace { requested: usize, available: usize },

    /// Alignment requirements not met
    #[error("Alignment error: address {address:#x} not aligned to {alignment}")]
    Alignment { address: usize, alignment: usize },

    /// Byte range falls outside the region
    #[error("Out of bounds: offset {offset} + {len} exceeds region size {size}")]
    OutOfBounds { offset: usize, len: usize, size: usize },

    /// Named field missing from a layout
    #[error("Field not found: {name}")]
    FieldNotFound { name: String },

    /// Accessor carrier width differs from the field width
    #[error("Carrier mismatch on field {field}: expected {expected} bits, got {actual} bits")]
    CarrierMismatch {
        field: String,
        expected: u32,
        actual: u32,
    },

    /// Two layout fields share bytes
    #[error("Layout overlap: field {first} overlaps field {second}")]
    LayoutOverlap { first: String, second: String },

    /// Sequence element index past the end of the sequence
    #[error("Index out of bounds: index {index}, count {count}")]
    IndexOutOfBounds { index: usize, count: usize },
}

impl MemScopeError {
    /// Create a memory error
    pub fn memory(message: impl Into<String>) -> Self {
        Self::Memory {
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an insufficient space error
    pub fn insufficient_space(requested: usize, available: usize) -> Self {
        Self::InsufficientSpace {
            requested,
            available,
        }
    }

    /// Create an alignment error
    pub fn alignment(address: usize, alignment: usize) -> Self {
        Self::Alignment { address, alignment }
    }

    /// Create an out of bounds error
    pub fn out_of_bounds(offset: usize, len: usize, size: usize) -> Self {
        Self::OutOfBounds { offset, len, size }
    }

    /// Create a field not found error
    pub fn field_not_found(name: impl Into<String>) -> Self {
        Self::FieldNotFound { name: name.into() }
    }

    /// Create a carrier mismatch error
    pub fn carrier_mismatch(field: impl Into<String>, expected: u32, actual: u32) -> Self {
        Self::CarrierMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Create a layout overlap error
    pub fn layout_overlap(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self::LayoutOverlap {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Whether the caller may retry the same operation later.
    ///
    /// Only a close blocked by forks qualifies: it succeeds once the forks are released.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ActiveForksPreventClose { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MemScopeError::memory("Out of memory");
        assert!(matches!(err, MemScopeError::Memory { .. }));

        let err = MemScopeError::field_not_found("sin_port");
        assert!(matches!(err, MemScopeError::FieldNotFound { .. }));

        let err = MemScopeError::insufficient_space(28, 16);
        assert!(matches!(err, MemScopeError::InsufficientSpace { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = MemScopeError::memory("Test message");
        let display = format!("{}", err);
        assert!(display.contains("Memory error"));
        assert!(display.contains("Test message"));

        let err = MemScopeError::ActiveForksPreventClose { forks: 2 };
        assert!(format!("{}", err).contains("2 active fork"));
    }

    #[test]
    fn test_retryable() {
        assert!(MemScopeError::ActiveForksPreventClose { forks: 1 }.is_retryable());
        assert!(!MemScopeError::AlreadyClosed.is_retryable());
        assert!(!MemScopeError::UseAfterClose.is_retryable());
    }
}
