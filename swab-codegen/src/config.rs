// Configuration types for swab-codegen, deserialized from a JSON or TOML file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::ctype::{CKind, CType};
use crate::error::{ConfigError, GenError, GenResult};

/// Top-level config file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindConfig {
    /// Path of the compiled module, as the generated `load()` will open it.
    pub wasm_binary: String,
    pub c_output: PathBuf,
    pub rust_output: PathBuf,
    /// Newline-delimited list of symbols the module must import.
    pub import_symbols: PathBuf,
    /// Newline-delimited list of symbols the module must export.
    pub export_symbols: PathBuf,
    #[serde(default)]
    pub extra_exports: Vec<String>,
    #[serde(default)]
    pub extra_imports: Vec<String>,
    /// Emitted as `#include <...>`.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Emitted as `#include "..."`.
    #[serde(default)]
    pub includes_relative: Vec<String>,
    /// Named types, in declaration order. Values are type descriptions.
    #[serde(default)]
    pub types: IndexMap<String, Value>,
    #[serde(default)]
    pub functions: IndexMap<String, FunctionDecl>,
    /// Let unknown type names degrade to `void` instead of failing.
    #[serde(default)]
    pub allow_unresolved: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionDecl {
    #[serde(default, alias = "parameters")]
    pub takes: Vec<Value>,
    #[serde(default = "void_description", alias = "returnType")]
    pub returns: Value,
}

fn void_description() -> Value {
    serde_json::json!({ "kind": "void" })
}

impl BindConfig {
    /// Load a config, choosing the format by file extension.
    pub fn from_path(path: &Path) -> GenResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GenError::io(path, e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("toml") => Self::from_toml_str(&text),
            other => Err(GenError::UnsupportedExtension(
                other.unwrap_or_default().to_string(),
            )),
        }
    }

    pub fn from_json_str(text: &str) -> GenResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_toml_str(text: &str) -> GenResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Make output paths relative to `base` (the config file's directory).
    pub fn resolve_outputs(&mut self, base: &Path) {
        for path in [
            &mut self.c_output,
            &mut self.rust_output,
            &mut self.import_symbols,
            &mut self.export_symbols,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Parse a type description: a bare string names a type, an object gives
/// its shape under `kind`. Unknown kinds are taken as type names.
pub fn parse_type(value: &Value) -> Result<CType, ConfigError> {
    let obj = match value {
        Value::String(name) => return Ok(CType::user(name.clone())),
        Value::Object(obj) => obj,
        _ => return Err(malformed(value, "expected a type name or an object")),
    };
    let kind = obj
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(value, "missing `kind`"))?;

    let ty = match kind {
        "bool" => CKind::Bool.into(),
        "char" => CKind::Char.into(),
        "u8" => CKind::U8.into(),
        "i8" => CKind::I8.into(),
        "u16" => CKind::U16.into(),
        "i16" => CKind::I16.into(),
        "u32" => CKind::U32.into(),
        "i32" => CKind::I32.into(),
        "u64" => CKind::U64.into(),
        "i64" => CKind::I64.into(),
        "f32" => CKind::F32.into(),
        "f64" => CKind::F64.into(),
        "void" => CType::void(),
        "pointer" => {
            let to = obj.get("to").ok_or_else(|| malformed(value, "pointer without `to`"))?;
            CType::pointer(parse_type(to)?)
        }
        "array" => {
            let of = obj.get("of").ok_or_else(|| malformed(value, "array without `of`"))?;
            let length = obj
                .get("length")
                .and_then(Value::as_u64)
                .filter(|n| *n > 0 && *n <= u64::from(u32::MAX))
                .ok_or_else(|| malformed(value, "array needs a positive `length`"))?;
            CType::array(parse_type(of)?, length as u32)
        }
        "functionPointer" => {
            let takes = obj
                .get("takes")
                .and_then(Value::as_array)
                .ok_or_else(|| malformed(value, "function pointer without `takes`"))?;
            let returns = obj
                .get("returns")
                .ok_or_else(|| malformed(value, "function pointer without `returns`"))?;
            CKind::FunctionPointer {
                takes: takes.iter().map(parse_type).collect::<Result<_, _>>()?,
                returns: Box::new(parse_type(returns)?),
            }
            .into()
        }
        "enum" => {
            let entries = obj
                .get("values")
                .and_then(Value::as_object)
                .ok_or_else(|| malformed(value, "enum without `values`"))?;
            let mut values = IndexMap::new();
            for (name, v) in entries {
                let v = v
                    .as_i64()
                    .ok_or_else(|| malformed(value, "enum values must be integers"))?;
                values.insert(name.clone(), v);
            }
            CKind::Enum { values }.into()
        }
        "struct" | "union" => {
            let entries = obj
                .get("fields")
                .and_then(Value::as_object)
                .ok_or_else(|| malformed(value, "aggregate without `fields`"))?;
            let mut fields = IndexMap::new();
            for (name, field) in entries {
                fields.insert(name.clone(), parse_type(field)?);
            }
            if kind == "struct" {
                CKind::Struct { fields }.into()
            } else {
                CKind::Union { fields }.into()
            }
        }
        "user" => {
            let name = obj
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(value, "user type without `name`"))?;
            CType::user(name)
        }
        other => CType::user(other),
    };
    Ok(ty)
}

fn malformed(fragment: &Value, reason: &str) -> ConfigError {
    ConfigError::MalformedType {
        fragment: fragment.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_shapes() {
        let ty = parse_type(&json!({ "kind": "pointer", "to": "int" })).unwrap();
        assert_eq!(ty.structural_key(), "ptr(user:int)");

        let ty = parse_type(&json!({ "kind": "array", "of": { "kind": "u8" }, "length": 4 })).unwrap();
        assert_eq!(ty.structural_key(), "arr(u8;4)");

        let ty = parse_type(&json!({
            "kind": "functionPointer",
            "takes": ["int", { "kind": "i64" }],
            "returns": { "kind": "void" }
        }))
        .unwrap();
        assert_eq!(ty.structural_key(), "fn(user:int,i64)->void");

        let ty = parse_type(&json!({ "kind": "enum", "values": { "RED": 0, "GREEN": 2 } })).unwrap();
        assert_eq!(ty.structural_key(), "enum{RED=0,GREEN=2}");
    }

    #[test]
    fn test_field_order_preserved() {
        let ty = parse_type(&json!({
            "kind": "struct",
            "fields": { "zeta": "int", "alpha": "int", "mid": "int" }
        }))
        .unwrap();
        let names: Vec<_> = ty.fields().unwrap().keys().cloned().collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_unknown_kind_is_user() {
        let ty = parse_type(&json!({ "kind": "version_info" })).unwrap();
        assert_eq!(ty, CType::user("version_info"));
        let ty = parse_type(&json!({ "kind": "user", "name": "struct v" })).unwrap();
        assert_eq!(ty, CType::user("struct v"));
    }

    #[test]
    fn test_malformed() {
        for bad in [
            json!(3),
            json!({ "kind": "pointer" }),
            json!({ "kind": "array", "of": "int", "length": 0 }),
            json!({ "kind": "functionPointer", "takes": [] }),
            json!({ "kind": "enum", "values": { "A": "x" } }),
            json!({ "to": "int" }),
        ] {
            let err = parse_type(&bad).unwrap_err();
            assert!(matches!(err, ConfigError::MalformedType { .. }), "{bad}");
        }
    }

    #[test]
    fn test_toml_and_json_agree() {
        let json = r#"{
            "wasmBinary": "build/basic.wasm",
            "cOutput": "out/basic.c",
            "rustOutput": "out/basic.rs",
            "importSymbols": "out/imports.txt",
            "exportSymbols": "out/exports.txt",
            "types": { "version_info": { "kind": "struct", "fields": { "major": "int" } } },
            "functions": { "addI64": { "parameters": ["int64_t", "int64_t"], "returnType": "int64_t" } }
        }"#;
        let toml = r#"
            wasmBinary = "build/basic.wasm"
            cOutput = "out/basic.c"
            rustOutput = "out/basic.rs"
            importSymbols = "out/imports.txt"
            exportSymbols = "out/exports.txt"

            [types.version_info]
            kind = "struct"
            fields = { major = "int" }

            [functions.addI64]
            takes = ["int64_t", "int64_t"]
            returns = "int64_t"
        "#;
        let a = BindConfig::from_json_str(json).unwrap();
        let b = BindConfig::from_toml_str(toml).unwrap();
        assert_eq!(a.types, b.types);
        assert_eq!(a.functions["addI64"].takes, b.functions["addI64"].takes);
        assert_eq!(a.functions["addI64"].returns, b.functions["addI64"].returns);
        assert!(!a.allow_unresolved);
    }

    #[test]
    fn test_missing_return_is_void() {
        let decl: FunctionDecl = serde_json::from_str(r#"{ "takes": ["int"] }"#).unwrap();
        assert_eq!(parse_type(&decl.returns).unwrap(), CType::void());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swab.yaml");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            BindConfig::from_path(&path),
            Err(GenError::UnsupportedExtension(ext)) if ext == "yaml"
        ));
    }
}
