// Constructors and destructors.
//
// Value constructors allocate and return an address, so a struct never
// crosses the boundary by value. Destructors of a struct destroy what its
// pointer fields point to and recurse into embedded structs; names are
// reserved before recursing so self-referential types terminate.

use crate::c_gen::{boundary_type, name_stem, spell, use_wide};
use crate::context::GenContext;
use crate::ctype::{CKind, CType};
use crate::declarator::{format_decl, format_function_decl};
use crate::error::DiagnosticKind;

/// Constructor and destructor symbols of one type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lifecycle {
    pub ctor: Option<String>,
    pub dtor: Option<String>,
}

/// Lifecycle functions for `ty` (resolved), emitting them on first request.
pub fn get_lifecycle(ctx: &mut GenContext, ty: &CType) -> Lifecycle {
    let key = ty.structural_key();
    if let Some(found) = ctx.lifecycles.get(&key) {
        return found.clone();
    }
    match &ty.kind {
        CKind::Struct { .. } => struct_value(ctx, ty, key),
        CKind::Union { .. } => union_value(ctx, ty, key),
        CKind::Pointer { to } => {
            let target = ctx.resolve(to);
            match target.kind {
                CKind::Struct { .. } => struct_pointer(ctx, ty, &target, key),
                CKind::Union { .. } => union_pointer(ctx, ty, &target, key),
                _ => plain_pointer(ctx, ty, &target, key),
            }
        }
        _ => {
            ctx.diagnose(
                DiagnosticKind::UnsupportedConversion,
                format!("no constructor or destructor for `{}`", spell(ty)),
            );
            ctx.lifecycles.insert(key, Lifecycle::default());
            Lifecycle::default()
        }
    }
}

fn stem_with(verb: &str, stem: &str, suffix: &str) -> String {
    if stem.is_empty() {
        format!("{verb}{suffix}")
    } else {
        format!("{verb}_{stem}{suffix}")
    }
}

fn object_decl(ty: &CType) -> String {
    format_decl(&CType::pointer(ty.clone()), "__object")
}

fn resolved_fields(ctx: &mut GenContext, ty: &CType) -> Vec<(String, CType)> {
    let fields: Vec<(String, CType)> = ty
        .fields()
        .map(|f| f.iter().map(|(n, t)| (n.clone(), t.clone())).collect())
        .unwrap_or_default();
    fields
        .into_iter()
        .map(|(name, field)| (name, ctx.resolve(&field)))
        .collect()
}

/// Statement storing boundary argument `arg` into `__object->field`.
fn assign_field(ctx: &mut GenContext, field: &str, ty: &CType, arg: &str) -> String {
    if ty.is_wide() {
        use_wide(ctx);
        format!("__object->{field} = __swab_unwrap_wide({arg});")
    } else if ty.is_aggregate() {
        format!("__object->{field} = *{arg};")
    } else if matches!(ty.kind, CKind::Array { .. }) {
        format!("memcpy(__object->{field}, {arg}, sizeof(__object->{field}));")
    } else {
        format!("__object->{field} = {arg};")
    }
}

fn dtor_prototype(name: &str, param: &CType) -> String {
    let header = format_function_decl(name, &[(String::new(), param.clone())], &CType::void());
    format!("{header};\n")
}

fn struct_value(ctx: &mut GenContext, ty: &CType, key: String) -> Lifecycle {
    let stem = name_stem(ty, "");
    let ctor = ctx.gensym(&stem_with("new", &stem, ""));
    let dtor = ctx.gensym(&stem_with("delete", &stem, ""));
    let lifecycle = Lifecycle {
        ctor: Some(ctor.clone()),
        dtor: Some(dtor.clone()),
    };
    ctx.lifecycles.insert(key, lifecycle.clone());

    let fields = resolved_fields(ctx, ty);

    // Constructor
    let mut params = Vec::new();
    let mut body = String::new();
    for (i, (field, field_ty)) in fields.iter().enumerate() {
        let arg = format!("__arg_{i}");
        body.push_str(&format!("  {}\n", assign_field(ctx, field, field_ty, &arg)));
        params.push((arg, boundary_type(field_ty)));
    }
    let header = format_function_decl(&ctor, &params, &CType::pointer(ty.clone()));
    ctx.c_out.push_str(&format!(
        "{header} {{\n  {} = malloc(sizeof *__object);\n  if (!__object) return NULL;\n{body}  return __object;\n}}\n\n",
        object_decl(ty)
    ));
    ctx.export(&ctor);

    // Destructor
    let mut prototypes = String::new();
    let mut body = String::new();
    for (field, field_ty) in &fields {
        match field_ty.kind {
            CKind::Pointer { .. } => {
                if let Some(callee) = get_lifecycle(ctx, field_ty).dtor {
                    prototypes.push_str(&dtor_prototype(&callee, field_ty));
                    body.push_str(&format!(
                        "  if (__object->{field}) {callee}(__object->{field});\n"
                    ));
                }
            }
            CKind::Struct { .. } => {
                if let Some(callee) = get_lifecycle(ctx, field_ty).dtor {
                    prototypes.push_str(&dtor_prototype(&callee, &CType::pointer(field_ty.clone())));
                    body.push_str(&format!("  {callee}(&__object->{field});\n"));
                }
            }
            _ => {}
        }
    }
    if body.is_empty() {
        body.push_str("  (void)__object;\n");
    }
    let header = format_function_decl(&dtor, &[("__object".to_string(), CType::pointer(ty.clone()))], &CType::void());
    ctx.c_out.push_str(&format!("{prototypes}{header} {{\n{body}}}\n\n"));
    ctx.export(&dtor);

    lifecycle
}

fn union_value(ctx: &mut GenContext, ty: &CType, key: String) -> Lifecycle {
    let stem = name_stem(ty, "");
    let ctor = ctx.gensym(&stem_with("new", &stem, ""));
    let lifecycle = Lifecycle {
        ctor: Some(ctor.clone()),
        dtor: None,
    };
    ctx.lifecycles.insert(key, lifecycle.clone());
    ctx.diagnose(
        DiagnosticKind::UnsupportedConversion,
        format!(
            "union `{}` has no value destructor; the active member is unknown",
            spell(ty)
        ),
    );

    let fields = resolved_fields(ctx, ty);
    let mut params = vec![("__tag".to_string(), CType::from(CKind::I32))];
    let mut cases = String::new();
    for (i, (field, field_ty)) in fields.iter().enumerate() {
        let arg = format!("__arg_{i}");
        let stmt = assign_field(ctx, field, field_ty, &arg);
        cases.push_str(&format!("  case {i}:\n    {stmt}\n    break;\n"));
        params.push((arg, boundary_type(field_ty)));
    }
    let header = format_function_decl(&ctor, &params, &CType::pointer(ty.clone()));
    ctx.c_out.push_str(&format!(
        "{header} {{\n  {} = calloc(1, sizeof *__object);\n  if (!__object) return NULL;\n  switch (__tag) {{\n{cases}  }}\n  return __object;\n}}\n\n",
        object_decl(ty)
    ));
    ctx.export(&ctor);

    lifecycle
}

fn pointer_ctor(ctx: &mut GenContext, ctor: &str, ty: &CType, target: &CType) {
    let size = if target.is_void() {
        "1".to_string()
    } else {
        format!("sizeof({})", spell(target))
    };
    let header = format_function_decl(ctor, &[], ty);
    ctx.c_out
        .push_str(&format!("{header} {{\n  return calloc(1, {size});\n}}\n\n"));
    ctx.export(ctor);
}

fn reserve_pointer(ctx: &mut GenContext, target: &CType, key: String) -> (String, String) {
    let stem = name_stem(target, "");
    let ctor = ctx.gensym(&stem_with("new", &stem, "_ptr"));
    let dtor = ctx.gensym(&stem_with("delete", &stem, "_ptr"));
    ctx.lifecycles.insert(
        key,
        Lifecycle {
            ctor: Some(ctor.clone()),
            dtor: Some(dtor.clone()),
        },
    );
    (ctor, dtor)
}

fn struct_pointer(ctx: &mut GenContext, ty: &CType, target: &CType, key: String) -> Lifecycle {
    let (ctor, dtor) = reserve_pointer(ctx, target, key);
    pointer_ctor(ctx, &ctor, ty, target);

    let value_dtor = get_lifecycle(ctx, target).dtor;
    let mut text = String::new();
    let mut body = "  if (!__object) return;\n".to_string();
    if let Some(value_dtor) = value_dtor {
        text.push_str(&dtor_prototype(&value_dtor, ty));
        body.push_str(&format!("  {value_dtor}(__object);\n"));
    }
    body.push_str("  free(__object);\n");
    let header = format_function_decl(&dtor, &[("__object".to_string(), ty.clone())], &CType::void());
    text.push_str(&format!("{header} {{\n{body}}}\n\n"));
    ctx.c_out.push_str(&text);
    ctx.export(&dtor);

    Lifecycle {
        ctor: Some(ctor),
        dtor: Some(dtor),
    }
}

fn union_pointer(ctx: &mut GenContext, ty: &CType, target: &CType, key: String) -> Lifecycle {
    let (ctor, dtor) = reserve_pointer(ctx, target, key);
    pointer_ctor(ctx, &ctor, ty, target);
    ctx.diagnose(
        DiagnosticKind::PartialCleanup,
        format!(
            "destroying `{}` frees the union but not what its members point to",
            spell(ty)
        ),
    );
    emit_free_dtor(ctx, &dtor, ty);
    Lifecycle {
        ctor: Some(ctor),
        dtor: Some(dtor),
    }
}

fn plain_pointer(ctx: &mut GenContext, ty: &CType, target: &CType, key: String) -> Lifecycle {
    let (ctor, dtor) = reserve_pointer(ctx, target, key);
    pointer_ctor(ctx, &ctor, ty, target);
    emit_free_dtor(ctx, &dtor, ty);
    Lifecycle {
        ctor: Some(ctor),
        dtor: Some(dtor),
    }
}

fn emit_free_dtor(ctx: &mut GenContext, dtor: &str, ty: &CType) {
    let header = format_function_decl(dtor, &[("__object".to_string(), ty.clone())], &CType::void());
    ctx.c_out
        .push_str(&format!("{header} {{\n  free(__object);\n}}\n\n"));
    ctx.export(dtor);
}
