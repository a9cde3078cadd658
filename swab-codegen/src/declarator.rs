// C declarator formatting.
//
// Declarators nest inside-out (`int *[3]` reads pointer, then array, then
// int), so formatting threads the text built so far down the type tree and
// wraps it on both sides at each level.

use crate::ctype::{CKind, CType};

/// Spell `ty` as a C type, with `trailing` as the declarator text so far.
pub fn format_type(ty: &CType, trailing: &str) -> String {
    if let Some(orig) = &ty.orig {
        return format_type(orig, trailing);
    }
    match &ty.kind {
        CKind::Pointer { to } => format_type(to, &format!("*{trailing}")),
        CKind::Array { of, length } => {
            if trailing.is_empty() {
                format_type(of, &format!("[{length}]"))
            } else {
                format_type(of, &format!("({trailing})[{length}]"))
            }
        }
        CKind::FunctionPointer { takes, returns } => {
            let args = if takes.is_empty() {
                "void".to_string()
            } else {
                takes
                    .iter()
                    .map(|t| format_type(t, ""))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format_type(returns, &format!("(*{trailing})({args})"))
        }
        CKind::Enum { values } => {
            let body = values
                .iter()
                .map(|(name, value)| format!("{name} = {value}"))
                .collect::<Vec<_>>()
                .join(", ");
            join("enum { ".to_string() + &body + " }", trailing)
        }
        CKind::Struct { fields } | CKind::Union { fields } => {
            let keyword = if matches!(ty.kind, CKind::Struct { .. }) {
                "struct"
            } else {
                "union"
            };
            let mut body = String::new();
            for (name, field) in fields {
                body.push_str(&format_decl(field, name));
                body.push_str("; ");
            }
            join(format!("{keyword} {{ {body}}}"), trailing)
        }
        CKind::User { name } => join(name.clone(), trailing),
        leaf => join(primitive_spelling(leaf).to_string(), trailing),
    }
}

fn join(base: String, trailing: &str) -> String {
    if trailing.is_empty() {
        base
    } else {
        format!("{base} {trailing}")
    }
}

fn primitive_spelling(kind: &CKind) -> &'static str {
    match kind {
        CKind::Bool => "_Bool",
        CKind::Char => "char",
        CKind::U8 => "uint8_t",
        CKind::I8 => "int8_t",
        CKind::U16 => "uint16_t",
        CKind::I16 => "int16_t",
        CKind::U32 => "uint32_t",
        CKind::I32 => "int32_t",
        CKind::U64 => "uint64_t",
        CKind::I64 => "int64_t",
        CKind::F32 => "float",
        CKind::F64 => "double",
        _ => "void",
    }
}

/// Declaration of `name` with type `ty`.
pub fn format_decl(ty: &CType, name: &str) -> String {
    format_type(ty, name)
}

/// Function header `ret name(params)`.
pub fn format_function_decl(name: &str, params: &[(String, CType)], ret: &CType) -> String {
    let args = if params.is_empty() {
        "void".to_string()
    } else {
        params
            .iter()
            .map(|(param, ty)| format_decl(ty, param))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format_type(ret, &format!("{name}({args})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctype::SubstitutionTable;
    use indexmap::IndexMap;

    fn i32_ty() -> CType {
        CKind::I32.into()
    }

    #[test]
    fn test_pointer_and_array() {
        assert_eq!(format_decl(&CType::pointer(i32_ty()), "p"), "int32_t *p");
        assert_eq!(format_decl(&CType::array(i32_ty(), 3), "a"), "int32_t (a)[3]");
        assert_eq!(
            format_decl(&CType::array(CType::pointer(i32_ty()), 3), "a"),
            "int32_t *(a)[3]"
        );
        assert_eq!(
            format_decl(&CType::pointer(CType::array(i32_ty(), 3)), "p"),
            "int32_t (*p)[3]"
        );
        assert_eq!(format_type(&CType::array(i32_ty(), 4), ""), "int32_t [4]");
        assert_eq!(format_type(&CType::pointer(CType::void()), ""), "void *");
    }

    #[test]
    fn test_function_pointer() {
        let cb = CType::from(CKind::FunctionPointer {
            takes: vec![i32_ty(), CKind::F64.into()],
            returns: Box::new(CType::void()),
        });
        assert_eq!(format_decl(&cb, "cb"), "void (*cb)(int32_t, double)");

        let nullary = CType::from(CKind::FunctionPointer {
            takes: vec![],
            returns: Box::new(i32_ty()),
        });
        assert_eq!(format_type(&nullary, ""), "int32_t (*)(void)");
    }

    #[test]
    fn test_aggregates_and_enums() {
        let mut fields = IndexMap::new();
        fields.insert("x".to_string(), CType::from(CKind::F32));
        fields.insert("tag".to_string(), CType::from(CKind::U8));
        let s = CType::from(CKind::Struct { fields });
        assert_eq!(format_decl(&s, "s"), "struct { float x; uint8_t tag; } s");

        let mut values = IndexMap::new();
        values.insert("A".to_string(), 0);
        values.insert("B".to_string(), 1);
        let e = CType::from(CKind::Enum { values });
        assert_eq!(format_type(&e, ""), "enum { A = 0, B = 1 }");
    }

    #[test]
    fn test_prefers_orig() {
        let table = SubstitutionTable::default();
        let ty = table.substitute(&CType::pointer(CType::user("size_t")));
        assert_eq!(format_decl(&ty, "n"), "size_t *n");
    }

    #[test]
    fn test_function_decl() {
        let params = vec![
            ("a".to_string(), CType::from(CKind::I64)),
            ("b".to_string(), CType::pointer(CType::from(CKind::Char))),
        ];
        assert_eq!(
            format_function_decl("f", &params, &CType::pointer(CType::from(CKind::Char))),
            "char *f(int64_t a, char *b)"
        );
        assert_eq!(format_function_decl("g", &[], &CType::void()), "void g(void)");
    }

    #[test]
    fn test_deterministic() {
        let ty = CType::pointer(CType::array(CType::user("Node"), 2));
        let first = format_decl(&ty, "n");
        let _ = format_decl(&CType::pointer(i32_ty()), "other");
        assert_eq!(format_decl(&ty, "n"), first);
        assert_eq!(first, "Node (*n)[2]");
    }
}
