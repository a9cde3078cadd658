// swab-codegen: reads a declarative description of C types and functions,
// generates the C shims compiled into the wasm module and the Rust glue the
// host calls them through.

pub mod c_gen;
pub mod config;
pub mod context;
pub mod ctype;
pub mod declarator;
pub mod error;
pub mod naming;
pub mod rust_gen;
pub mod trampoline;

use std::path::Path;

use log::{debug, info};

pub use crate::config::{BindConfig, FunctionDecl, parse_type};
pub use crate::context::GenContext;
pub use crate::ctype::{CKind, CType, SubstitutionTable};
pub use crate::declarator::{format_decl, format_function_decl, format_type};
pub use crate::error::{ConfigError, Diagnostic, DiagnosticKind, GenError, GenResult};

use crate::rust_gen::functions::{emit_creators, emit_function, emit_type_layout};

/// Everything one run produces, still in memory.
#[derive(Debug, Clone)]
pub struct Bindings {
    pub c_source: String,
    pub rust_source: String,
    /// Symbols the native module imports, in first-use order.
    pub imports: Vec<String>,
    /// Symbols the native module must export, in first-use order.
    pub exports: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Bindings {
    /// Write the four outputs to the paths named by `config`, creating
    /// parent directories as needed.
    pub fn write(&self, config: &BindConfig) -> GenResult<()> {
        let outputs = [
            (&config.c_output, self.c_source.clone()),
            (&config.rust_output, self.rust_source.clone()),
            (&config.import_symbols, symbol_list(&self.imports)),
            (&config.export_symbols, symbol_list(&self.exports)),
        ];
        for (path, text) in outputs {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| GenError::io(parent, e))?;
            }
            std::fs::write(path, text).map_err(|e| GenError::io(path, e))?;
            debug!("wrote {}", path.display());
        }
        Ok(())
    }
}

fn symbol_list(symbols: &[String]) -> String {
    let mut text = symbols.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

struct ParsedFunction {
    name: String,
    takes: Vec<CType>,
    returns: CType,
}

/// Generate bindings for `config`. Nothing touches the filesystem.
pub fn generate(config: &BindConfig) -> GenResult<Bindings> {
    let mut table = SubstitutionTable::default();
    let mut declared = Vec::with_capacity(config.types.len());
    for (name, description) in &config.types {
        let ty = parse_type(description)?;
        table.insert(name.clone(), ty.clone());
        declared.push((name.clone(), ty));
    }

    let mut functions = Vec::with_capacity(config.functions.len());
    for (name, decl) in &config.functions {
        let takes = decl.takes.iter().map(parse_type).collect::<Result<Vec<_>, _>>()?;
        let returns = parse_type(&decl.returns)?;
        functions.push(ParsedFunction {
            name: name.clone(),
            takes,
            returns,
        });
    }

    if !config.allow_unresolved {
        check_resolved(&table, &declared, &functions)?;
    }

    info!(
        "generating bindings for {} types and {} functions",
        declared.len(),
        functions.len()
    );

    let mut ctx = GenContext::new(table);
    c_gen::emit_prelude(&mut ctx, &config.includes, &config.includes_relative);
    rust_gen::emit_preamble(&mut ctx, &config.wasm_binary);
    ctx.export("malloc");
    ctx.export("free");
    for symbol in &config.extra_imports {
        ctx.import(symbol);
    }
    for symbol in &config.extra_exports {
        ctx.export(symbol);
    }

    for (name, ty) in &declared {
        debug!("type `{name}`: {}", ctype::leaf_name(&ty.kind));
        if ty.fields().is_some() {
            emit_creators(&mut ctx, name);
        }
        // Enums and function pointers get their host items through their
        // conversion.
        let resolved = ctx.resolve(&CType::user(name.as_str()));
        rust_gen::convert::host_conv(&mut ctx, &resolved);
        emit_type_layout(&mut ctx, name);
    }

    for function in &functions {
        debug!("function `{}`", function.name);
        emit_function(&mut ctx, &function.name, &function.takes, &function.returns)?;
    }

    info!(
        "generated {} exports, {} imports, {} trampolines, {} diagnostics",
        ctx.exports.len(),
        ctx.imports.len(),
        ctx.trampolines.len(),
        ctx.diagnostics.len()
    );

    Ok(Bindings {
        c_source: ctx.c_out,
        rust_source: ctx.rust_out,
        imports: ctx.imports.into_iter().collect(),
        exports: ctx.exports.into_iter().collect(),
        diagnostics: ctx.diagnostics,
    })
}

/// Fail on the first `user` name no declared type or builtin answers to.
fn check_resolved(
    table: &SubstitutionTable,
    declared: &[(String, CType)],
    functions: &[ParsedFunction],
) -> Result<(), ConfigError> {
    let check = |ty: &CType, context: String| {
        let mut names = Vec::new();
        ty.user_names(&mut names);
        match names.into_iter().find(|name| !table.contains(name)) {
            Some(name) => Err(ConfigError::UnresolvedType {
                name: name.to_string(),
                context,
            }),
            None => Ok(()),
        }
    };
    for (name, ty) in declared {
        check(ty, format!("type `{name}`"))?;
    }
    for function in functions {
        for ty in function.takes.iter().chain(std::iter::once(&function.returns)) {
            check(ty, format!("function `{}`", function.name))?;
        }
    }
    Ok(())
}

/// Run the generate command: load the config at `config_path`, generate,
/// and write the outputs next to it.
pub fn run_generate(config_path: &Path) -> GenResult<Bindings> {
    let mut config = BindConfig::from_path(config_path)?;
    let config_dir = config_path.parent().unwrap_or(Path::new("."));
    config.resolve_outputs(config_dir);

    info!("loaded {}", config_path.display());
    let bindings = generate(&config)?;
    bindings.write(&config)?;
    info!(
        "wrote {} and {}",
        config.c_output.display(),
        config.rust_output.display()
    );
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION: &str = r#"{
        "wasmBinary": "basic.wasm",
        "cOutput": "out/bindings.c",
        "rustOutput": "out/bindings.rs",
        "importSymbols": "out/imports.txt",
        "exportSymbols": "out/exports.txt",
        "includesRelative": ["basic.h"],
        "types": {
            "version": { "kind": "struct", "fields": {
                "major": "uint32_t", "minor": "uint32_t", "patch": "uint32_t"
            } }
        },
        "functions": {
            "make_version": {
                "takes": ["uint32_t", "uint32_t", "uint32_t"],
                "returns": { "kind": "pointer", "to": "version" }
            }
        }
    }"#;

    #[test]
    fn test_generate_struct_and_function() {
        let config = BindConfig::from_json_str(VERSION).unwrap();
        let bindings = generate(&config).unwrap();

        assert!(bindings.c_source.starts_with("// Generated by swab-codegen. Do not edit.\n"));
        assert!(bindings.c_source.contains("#include \"basic.h\"\n"));
        assert!(bindings.rust_source.contains("pub const WASM_BINARY: &str = \"basic.wasm\";"));
        assert!(bindings.rust_source.contains("pub struct VersionPtr {"));
        assert!(bindings.rust_source.contains("pub fn make_version(rt: &mut dyn swab_runtime::Native, a0: u32, a1: u32, a2: u32) -> swab_runtime::SwabResult<VersionPtr> {"));
        assert!(bindings.rust_source.contains("pub fn create_version("));
        assert_eq!(&bindings.exports[..2], ["malloc", "free"]);
        assert!(bindings.exports.iter().any(|s| s == "make_version"));
        // Nothing 64-bit crossed, so the wide primitives are not needed.
        assert!(bindings.imports.is_empty());
        assert!(bindings.diagnostics.is_empty());
    }

    #[test]
    fn test_unresolved_fails_fast() {
        let config = BindConfig::from_json_str(
            r#"{
                "wasmBinary": "m.wasm", "cOutput": "m.c", "rustOutput": "m.rs",
                "importSymbols": "i.txt", "exportSymbols": "e.txt",
                "functions": { "f": { "takes": ["mystery"] } }
            }"#,
        )
        .unwrap();
        match generate(&config) {
            Err(GenError::Config(ConfigError::UnresolvedType { name, context })) => {
                assert_eq!(name, "mystery");
                assert_eq!(context, "function `f`");
            }
            other => panic!("expected an unresolved type, got {other:?}"),
        }
    }

    #[test]
    fn test_allow_unresolved_degrades_to_void() {
        let config = BindConfig::from_json_str(
            r#"{
                "wasmBinary": "m.wasm", "cOutput": "m.c", "rustOutput": "m.rs",
                "importSymbols": "i.txt", "exportSymbols": "e.txt",
                "allowUnresolved": true,
                "functions": { "f": { "takes": [{ "kind": "pointer", "to": "mystery" }] } }
            }"#,
        )
        .unwrap();
        let bindings = generate(&config).unwrap();
        assert_eq!(bindings.diagnostics.len(), 1);
        assert_eq!(bindings.diagnostics[0].kind, DiagnosticKind::Unresolved);
        assert!(bindings.rust_source.contains("a0: swab_runtime::WasmPointer<u8>"));
    }

    #[test]
    fn test_symbol_list() {
        assert_eq!(symbol_list(&[]), "");
        assert_eq!(symbol_list(&["a".to_string(), "b".to_string()]), "a\nb\n");
    }
}
