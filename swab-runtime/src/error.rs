// Error types for the swab runtime.

use thiserror::Error;

/// Everything that can go wrong while driving a native module.
#[derive(Debug, Error)]
pub enum SwabError {
    #[error("no native module is loaded on this thread")]
    NotLoaded,
    #[error("a native module is already loaded on this thread")]
    AlreadyLoaded,
    #[error("runtime is already borrowed; callbacks must use the context they are given")]
    Reentrant,
    #[error("native module does not export `{0}`")]
    MissingExport(String),
    #[error("native call returned no value")]
    MissingResult,
    #[error("callback received no argument {0}")]
    MissingArgument(usize),
    #[error("expected {expected} value, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: String,
    },
    #[error("native allocation of {size} bytes failed")]
    AllocationExhausted { size: u32 },
    #[error("null pointer dereference")]
    NullPointer,
    #[error("access of {len} bytes at {address:#x} is outside linear memory")]
    OutOfBounds { address: u32, len: u32 },
    #[error("invalid wide handle {0}")]
    InvalidWideHandle(i32),
    #[error("{value} is not a valid {type_name}")]
    UnknownEnumValue { type_name: &'static str, value: i64 },
    #[error("'{0}' does not fit in a native char")]
    CharOutOfRange(char),
    #[error("expected {expected} elements, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },
    #[error("indirect function table has no slot left")]
    TableExhausted,
    #[error("{count} elements do not fit in a native offset")]
    CountOverflow { count: u64 },
    #[error("table slot {0} was not installed by the host")]
    NotHostSlot(u32),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Wasm(#[from] wasmtime::Error),
}

/// Convenience alias used throughout the runtime and generated code.
pub type SwabResult<T> = Result<T, SwabError>;

impl SwabError {
    /// Recover a runtime error that travelled through a trap.
    ///
    /// Host closures report failures by trapping; the original error is
    /// carried inside the wasmtime error and restored here.
    pub fn from_wasm(err: wasmtime::Error) -> Self {
        match err.downcast::<SwabError>() {
            Ok(inner) => inner,
            Err(other) => SwabError::Wasm(other),
        }
    }

    pub(crate) fn unexpected(expected: &'static str, found: &wasmtime::Val) -> Self {
        SwabError::UnexpectedValue {
            expected,
            found: format!("{found:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wasm_restores_runtime_error() {
        let err = wasmtime::Error::new(SwabError::NullPointer);
        assert!(matches!(SwabError::from_wasm(err), SwabError::NullPointer));
    }

    #[test]
    fn test_from_wasm_keeps_foreign_error() {
        let err = wasmtime::Error::msg("boom");
        match SwabError::from_wasm(err) {
            SwabError::Wasm(e) => assert_eq!(e.to_string(), "boom"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
