//! Host bindings for `native/basic.c`, generated from `basic.toml` at build
//! time.

#[allow(dead_code, clippy::all)]
mod basic {
    include!(concat!(env!("OUT_DIR"), "/basic_bindings.rs"));
}

pub use basic::*;
