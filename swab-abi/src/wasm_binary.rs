// Minimal wasm binary-format writer.
//
// Only the sections a trampoline needs are supported: type, import, export.
// Sections are written in ascending id order regardless of call order.

use crate::{Signature, TRAMPOLINE_EXPORT, TRAMPOLINE_IMPORT_FIELD, TRAMPOLINE_IMPORT_MODULE};

const MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];
const VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

const SECTION_TYPE: u8 = 1;
const SECTION_IMPORT: u8 = 2;
const SECTION_EXPORT: u8 = 7;

const FUNC_TYPE_FORM: u8 = 0x60;
const EXTERN_FUNC: u8 = 0x00;

/// Append `value` as unsigned LEB128.
pub fn write_uleb128(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    write_uleb128(out, name.len() as u32);
    out.extend_from_slice(name.as_bytes());
}

struct FuncImport {
    module: String,
    field: String,
    type_index: u32,
}

struct FuncExport {
    name: String,
    func_index: u32,
}

/// Section-by-section builder for a function-only module.
#[derive(Default)]
pub struct ModuleBuilder {
    types: Vec<Signature>,
    imports: Vec<FuncImport>,
    exports: Vec<FuncExport>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a function type; returns its type index.
    pub fn func_type(&mut self, sig: &Signature) -> u32 {
        self.types.push(sig.clone());
        (self.types.len() - 1) as u32
    }

    /// Import a function of type `type_index`; returns its function index.
    pub fn import_func(&mut self, module: &str, field: &str, type_index: u32) -> u32 {
        self.imports.push(FuncImport {
            module: module.to_string(),
            field: field.to_string(),
            type_index,
        });
        (self.imports.len() - 1) as u32
    }

    pub fn export_func(&mut self, name: &str, func_index: u32) {
        self.exports.push(FuncExport {
            name: name.to_string(),
            func_index,
        });
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION);

        if !self.types.is_empty() {
            let mut body = Vec::new();
            write_uleb128(&mut body, self.types.len() as u32);
            for sig in &self.types {
                body.push(FUNC_TYPE_FORM);
                write_uleb128(&mut body, sig.params.len() as u32);
                body.extend(sig.params.iter().map(|p| p.code()));
                match sig.result {
                    Some(r) => {
                        write_uleb128(&mut body, 1);
                        body.push(r.code());
                    }
                    None => write_uleb128(&mut body, 0),
                }
            }
            write_section(&mut out, SECTION_TYPE, &body);
        }

        if !self.imports.is_empty() {
            let mut body = Vec::new();
            write_uleb128(&mut body, self.imports.len() as u32);
            for import in &self.imports {
                write_name(&mut body, &import.module);
                write_name(&mut body, &import.field);
                body.push(EXTERN_FUNC);
                write_uleb128(&mut body, import.type_index);
            }
            write_section(&mut out, SECTION_IMPORT, &body);
        }

        if !self.exports.is_empty() {
            let mut body = Vec::new();
            write_uleb128(&mut body, self.exports.len() as u32);
            for export in &self.exports {
                write_name(&mut body, &export.name);
                body.push(EXTERN_FUNC);
                write_uleb128(&mut body, export.func_index);
            }
            write_section(&mut out, SECTION_EXPORT, &body);
        }

        out
    }
}

fn write_section(out: &mut Vec<u8>, id: u8, body: &[u8]) {
    out.push(id);
    write_uleb128(out, body.len() as u32);
    out.extend_from_slice(body);
}

/// Module that imports `e.f` with signature `sig` and re-exports it as `f`.
///
/// Instantiating it against a host function yields a wasm function of the
/// right type, which can then be stored into the native module's table.
pub fn trampoline_module(sig: &Signature) -> Vec<u8> {
    let mut builder = ModuleBuilder::new();
    let ty = builder.func_type(sig);
    let func = builder.import_func(TRAMPOLINE_IMPORT_MODULE, TRAMPOLINE_IMPORT_FIELD, ty);
    builder.export_func(TRAMPOLINE_EXPORT, func);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValCategory;

    #[test]
    fn test_uleb128() {
        let mut out = Vec::new();
        write_uleb128(&mut out, 0);
        write_uleb128(&mut out, 127);
        write_uleb128(&mut out, 128);
        write_uleb128(&mut out, 624_485);
        assert_eq!(out, vec![0x00, 0x7f, 0x80, 0x01, 0xe5, 0x8e, 0x26]);
    }

    #[test]
    fn test_trampoline_i32_to_void() {
        let bytes = trampoline_module(&Signature::new(vec![ValCategory::I32], None));
        assert_eq!(
            bytes,
            vec![
                0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
                0x01, 0x05, 0x01, 0x60, 0x01, 0x7f, 0x00, // type
                0x02, 0x07, 0x01, 0x01, 0x65, 0x01, 0x66, 0x00, 0x00, // import e.f
                0x07, 0x05, 0x01, 0x01, 0x66, 0x00, 0x00, // export f
            ]
        );
    }

    #[test]
    fn test_trampoline_with_result() {
        let sig = Signature::new(vec![ValCategory::I64, ValCategory::F32], Some(ValCategory::F64));
        let bytes = trampoline_module(&sig);
        // type section: count, form, 2 params, 1 result
        assert_eq!(&bytes[8..17], &[0x01, 0x07, 0x01, 0x60, 0x02, 0x7e, 0x7d, 0x01, 0x7c]);
    }

    #[test]
    fn test_empty_signature() {
        let bytes = trampoline_module(&Signature::new(vec![], None));
        assert_eq!(&bytes[8..14], &[0x01, 0x04, 0x01, 0x60, 0x00, 0x00]);
    }

    #[test]
    fn test_distinct_signatures_distinct_bytes() {
        let a = trampoline_module(&Signature::new(vec![ValCategory::I32], None));
        let b = trampoline_module(&Signature::new(vec![ValCategory::I32], Some(ValCategory::I32)));
        assert_ne!(a, b);
    }
}
