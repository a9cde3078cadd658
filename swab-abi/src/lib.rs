// Boundary contract between generated C shims, generated Rust glue and the runtime.
//
// Both sides of the boundary are produced by different crates, so every name and
// byte layout they must agree on lives here.

pub mod wasm_binary;

pub use wasm_binary::{trampoline_module, ModuleBuilder};

// ---------------------------------------------------------------------------
// Import object
// ---------------------------------------------------------------------------

/// Module name of every host-provided import.
pub const ENV_MODULE: &str = "env";
/// Linear memory import (and preferred export) name.
pub const MEMORY_NAME: &str = "memory";
/// Indirect function table import (and preferred export) name.
pub const TABLE_NAME: &str = "__indirect_function_table";

/// `__swab_wide __swab_compose_wide(int32_t high, uint32_t low)`
pub const COMPOSE_WIDE: &str = "__swab_compose_wide";
/// `int32_t __swab_wide_high(__swab_wide handle)`
pub const WIDE_HIGH: &str = "__swab_wide_high";
/// `uint32_t __swab_wide_low(__swab_wide handle)`
pub const WIDE_LOW: &str = "__swab_wide_low";

/// The three host primitives a wide-integer shim depends on.
pub const WIDE_IMPORTS: [&str; 3] = [COMPOSE_WIDE, WIDE_HIGH, WIDE_LOW];

/// C typedef name of the opaque 64-bit placeholder.
pub const WIDE_TYPEDEF: &str = "__swab_wide";

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

pub const MALLOC: &str = "malloc";
pub const FREE: &str = "free";

/// Reactor-style initializer, run once after instantiation when exported.
pub const INITIALIZE: &str = "_initialize";
/// Static constructor runner emitted by some toolchains instead of `_initialize`.
pub const CALL_CTORS: &str = "__wasm_call_ctors";

// ---------------------------------------------------------------------------
// Trampoline modules
// ---------------------------------------------------------------------------

pub const TRAMPOLINE_IMPORT_MODULE: &str = "e";
pub const TRAMPOLINE_IMPORT_FIELD: &str = "f";
pub const TRAMPOLINE_EXPORT: &str = "f";

// ---------------------------------------------------------------------------
// Loader defaults
// ---------------------------------------------------------------------------

/// Minimum linear memory, in 64 KiB pages.
pub const MIN_MEMORY_PAGES: u32 = 32;
/// Initial indirect table capacity.
pub const DEFAULT_TABLE_CAPACITY: u32 = 1;
/// Size of a native pointer on wasm32.
pub const POINTER_SIZE: u32 = 4;

// ---------------------------------------------------------------------------
// Value categories
// ---------------------------------------------------------------------------

/// Core wasm value type carried by a parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValCategory {
    I32,
    I64,
    F32,
    F64,
}

impl ValCategory {
    /// Binary-format type code.
    pub const fn code(self) -> u8 {
        match self {
            ValCategory::I32 => 0x7f,
            ValCategory::I64 => 0x7e,
            ValCategory::F32 => 0x7d,
            ValCategory::F64 => 0x7c,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValCategory::I32 => "i32",
            ValCategory::I64 => "i64",
            ValCategory::F32 => "f32",
            ValCategory::F64 => "f64",
        }
    }

    /// Rust path of this variant, for generated sources.
    pub const fn path(self) -> &'static str {
        match self {
            ValCategory::I32 => "swab_runtime::ValCategory::I32",
            ValCategory::I64 => "swab_runtime::ValCategory::I64",
            ValCategory::F32 => "swab_runtime::ValCategory::F32",
            ValCategory::F64 => "swab_runtime::ValCategory::F64",
        }
    }
}

/// Call signature of a function crossing the indirect table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    pub params: Vec<ValCategory>,
    /// `None` for a void return.
    pub result: Option<ValCategory>,
}

impl Signature {
    pub fn new(params: Vec<ValCategory>, result: Option<ValCategory>) -> Self {
        Signature { params, result }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p.name())?;
        }
        match self.result {
            Some(r) => write!(f, ") -> {}", r.name()),
            None => write!(f, ")"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_binary_format() {
        assert_eq!(ValCategory::I32.code(), 0x7f);
        assert_eq!(ValCategory::I64.code(), 0x7e);
        assert_eq!(ValCategory::F32.code(), 0x7d);
        assert_eq!(ValCategory::F64.code(), 0x7c);
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature::new(vec![ValCategory::I32, ValCategory::F64], Some(ValCategory::I64));
        assert_eq!(sig.to_string(), "(i32, f64) -> i64");
        assert_eq!(Signature::new(vec![], None).to_string(), "()");
    }
}
