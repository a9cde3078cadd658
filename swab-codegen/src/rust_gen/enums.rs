// Rust enum generation for native enums.

use std::collections::HashSet;

use crate::c_gen::{name_stem, spell};
use crate::context::GenContext;
use crate::ctype::{CKind, CType};
use crate::error::DiagnosticKind;
use crate::naming::{to_upper_camel, to_variant_name};
use crate::rust_gen::RT;

/// Claim the Rust name of the enum `ty`.
pub fn reserve(ctx: &mut GenContext, ty: &CType) -> String {
    let stem = name_stem(ty, "");
    let wanted = if stem.is_empty() {
        "Enum".to_string()
    } else {
        to_upper_camel(&stem)
    };
    ctx.claim_rust_name(&wanted)
}

/// Emit the enum `ty` under `name`.
///
/// Enumerators that share a value become aliases: `from_value` yields the
/// first one declared.
pub fn emit(ctx: &mut GenContext, ty: &CType, name: &str) {
    let CKind::Enum { values } = &ty.kind else {
        return;
    };

    let mut variants: Vec<(String, &str, i32)> = Vec::new();
    let mut seen_names = HashSet::new();
    for (enumerator, value) in values {
        let Ok(value) = i32::try_from(*value) else {
            ctx.diagnose(
                DiagnosticKind::UnsupportedConversion,
                format!("enumerator `{enumerator}` = {value} does not fit in an int, skipped"),
            );
            continue;
        };
        let mut variant = to_variant_name(enumerator);
        if !seen_names.insert(variant.clone()) {
            variant = format!("{variant}{}", variants.len());
            seen_names.insert(variant.clone());
        }
        variants.push((variant, enumerator.as_str(), value));
    }

    let mut out = String::with_capacity(1024);
    out.push_str(&format!("/// `{}`.\n", spell(ty)));
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]\n");
    out.push_str(&format!("pub enum {name} {{\n"));
    for (variant, _, _) in &variants {
        out.push_str(&format!("    {variant},\n"));
    }
    out.push_str("}\n\n");

    out.push_str(&format!("impl {name} {{\n"));

    out.push_str("    pub const fn value(self) -> i32 {\n        match self {\n");
    for (variant, _, value) in &variants {
        out.push_str(&format!("            {name}::{variant} => {value},\n"));
    }
    out.push_str("        }\n    }\n\n");

    out.push_str("    pub fn from_value(value: i32) -> Option<Self> {\n        match value {\n");
    let mut seen_values = HashSet::new();
    for (variant, _, value) in &variants {
        if seen_values.insert(*value) {
            out.push_str(&format!("            {value} => Some({name}::{variant}),\n"));
        }
    }
    out.push_str("            _ => None,\n        }\n    }\n\n");

    out.push_str("    /// Enumerator name as declared.\n");
    out.push_str("    pub const fn name(self) -> &'static str {\n        match self {\n");
    for (variant, enumerator, _) in &variants {
        out.push_str(&format!("            {name}::{variant} => {enumerator:?},\n"));
    }
    out.push_str("        }\n    }\n\n");

    out.push_str(&format!(
        "    pub fn from_native(rt: {RT}, raw: swab_runtime::Val) -> swab_runtime::SwabResult<Self> {{\n        \
         let value = swab_runtime::convert::i32_from_native(rt, raw)?;\n        \
         Self::from_value(value).ok_or(swab_runtime::SwabError::UnknownEnumValue {{\n            \
         type_name: {name:?},\n            \
         value: i64::from(value),\n        \
         }})\n    \
         }}\n\n"
    ));
    out.push_str(&format!(
        "    pub fn to_native(_rt: {RT}, value: Self) -> swab_runtime::SwabResult<swab_runtime::Val> {{\n        \
         Ok(swab_runtime::Val::I32(value.value()))\n    \
         }}\n"
    ));
    out.push_str("}\n\n");

    ctx.rust_out.push_str(&out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctype::SubstitutionTable;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn color_ctx() -> (GenContext, CType) {
        let mut values = IndexMap::new();
        values.insert("RED".to_string(), 0);
        values.insert("GREEN".to_string(), 2);
        values.insert("VERT".to_string(), 2);
        let mut table = SubstitutionTable::default();
        table.insert("color", CKind::Enum { values }.into());
        let mut ctx = GenContext::new(table);
        let ty = ctx.resolve(&CType::user("color"));
        (ctx, ty)
    }

    #[test]
    fn test_enum_items() {
        let (mut ctx, ty) = color_ctx();
        let name = reserve(&mut ctx, &ty);
        assert_eq!(name, "Color");
        emit(&mut ctx, &ty, &name);
        let out = &ctx.rust_out;
        assert!(out.contains("pub enum Color {\n    Red,\n    Green,\n    Vert,\n}"));
        assert!(out.contains("            Color::Vert => 2,\n"));
        // Aliases resolve to the first enumerator with the value.
        assert!(out.contains("            2 => Some(Color::Green),\n            _ => None,"));
        assert!(out.contains("            Color::Red => \"RED\",\n"));
        assert!(out.contains("type_name: \"Color\","));
    }

    #[test]
    fn test_out_of_range_enumerator_skipped() {
        let mut values = IndexMap::new();
        values.insert("BIG".to_string(), i64::from(u32::MAX));
        let ty = CType::from(CKind::Enum { values });
        let mut ctx = GenContext::new(SubstitutionTable::default());
        let name = reserve(&mut ctx, &ty);
        assert_eq!(name, "Enum");
        emit(&mut ctx, &ty, &name);
        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(ctx.rust_out.contains("pub enum Enum {\n}"));
    }
}
