// C shim generation: everything compiled into the native module alongside
// the user's code so the host can size, build, read and tear down native
// values without passing aggregates or 64-bit integers across the boundary.

pub mod accessors;
pub mod copy;
pub mod lifecycle;
pub mod sizeof;
pub mod wide;

use swab_abi::{COMPOSE_WIDE, ENV_MODULE, WIDE_HIGH, WIDE_IMPORTS, WIDE_LOW, WIDE_TYPEDEF};

use crate::ctype::{CKind, CType};
use crate::declarator::format_type;
use crate::context::GenContext;

/// Fixed text at the top of every generated C file, followed by the
/// configured includes.
pub fn emit_prelude(ctx: &mut GenContext, includes: &[String], includes_relative: &[String]) {
    let out = &mut ctx.c_out;
    out.push_str("// Generated by swab-codegen. Do not edit.\n\n");
    out.push_str("#include <stdint.h>\n");
    out.push_str("#include <stddef.h>\n");
    out.push_str("#include <stdlib.h>\n");
    out.push_str("#include <string.h>\n\n");

    out.push_str(&format!("typedef int32_t {WIDE_TYPEDEF};\n\n"));
    let decls = [
        (COMPOSE_WIDE, format!("{WIDE_TYPEDEF} {COMPOSE_WIDE}(int32_t high, uint32_t low)")),
        (WIDE_HIGH, format!("int32_t {WIDE_HIGH}({WIDE_TYPEDEF} handle)")),
        (WIDE_LOW, format!("uint32_t {WIDE_LOW}({WIDE_TYPEDEF} handle)")),
    ];
    for (name, decl) in decls {
        out.push_str(&format!(
            "__attribute__((import_module(\"{ENV_MODULE}\"), import_name(\"{name}\")))\nextern {decl};\n"
        ));
    }
    out.push('\n');
    out.push_str(&format!(
        "static inline {WIDE_TYPEDEF} __swab_wrap_wide(int64_t value) {{\n  \
         return {COMPOSE_WIDE}((int32_t)(value >> 32), (uint32_t)value);\n}}\n\n"
    ));
    out.push_str(&format!(
        "static inline int64_t __swab_unwrap_wide({WIDE_TYPEDEF} handle) {{\n  \
         return (int64_t)(((uint64_t)(uint32_t){WIDE_HIGH}(handle) << 32) | (uint64_t){WIDE_LOW}(handle));\n}}\n"
    ));

    if !includes.is_empty() || !includes_relative.is_empty() {
        out.push('\n');
    }
    for include in includes {
        out.push_str(&format!("#include <{include}>\n"));
    }
    for include in includes_relative {
        out.push_str(&format!("#include \"{include}\"\n"));
    }
    out.push('\n');
}

/// Register the wide primitives as required imports.
pub(crate) fn use_wide(ctx: &mut GenContext) {
    for name in WIDE_IMPORTS {
        ctx.import(name);
    }
}

/// The opaque 32-bit handle type, spelled through its typedef.
pub(crate) fn wide_type() -> CType {
    CType::from(CKind::I32).with_orig(CType::user(WIDE_TYPEDEF))
}

/// What a value of `ty` crosses the boundary as: aggregates by address,
/// arrays as a pointer to their first element, 64-bit integers as wide
/// handles.
pub(crate) fn boundary_type(ty: &CType) -> CType {
    match &ty.kind {
        _ if ty.is_wide() => wide_type(),
        _ if ty.is_aggregate() => CType::pointer(ty.clone()),
        CKind::Array { of, .. } => CType::pointer((**of).clone()),
        _ => ty.clone(),
    }
}

/// Whether a value of `ty` needs an adapter to cross the boundary.
pub(crate) fn needs_adapter(ty: &CType) -> bool {
    ty.is_wide() || ty.is_aggregate()
}

pub(crate) fn spell(ty: &CType) -> String {
    format_type(ty, "")
}

/// Stem for generated names: the declared name when there is one.
pub(crate) fn name_stem(ty: &CType, fallback: &str) -> String {
    match ty.declared_name() {
        Some(name) => sanitize(name),
        None => fallback.to_string(),
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
