// Generate the bindings for native/basic.c into OUT_DIR.
//
// The C half (`basic_bindings.c`) is compiled into the wasm module with
// native/basic.c, e.g.
// `clang --target=wasm32-wasi -mexec-model=reactor -Wl,--import-memory,--import-table`.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=basic.toml");

    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());

    let config_path = manifest_dir.join("basic.toml");
    let mut config = swab_codegen::BindConfig::from_path(&config_path)
        .unwrap_or_else(|e| panic!("Failed to load {}: {e}", config_path.display()));
    config.c_output = out_dir.join("basic_bindings.c");
    config.rust_output = out_dir.join("basic_bindings.rs");
    config.import_symbols = out_dir.join("imports.txt");
    config.export_symbols = out_dir.join("exports.txt");

    let bindings = swab_codegen::generate(&config)
        .unwrap_or_else(|e| panic!("Failed to generate bindings: {e}"));
    for diagnostic in &bindings.diagnostics {
        println!("cargo:warning={diagnostic}");
    }
    bindings
        .write(&config)
        .unwrap_or_else(|e| panic!("Failed to write bindings: {e}"));
}
