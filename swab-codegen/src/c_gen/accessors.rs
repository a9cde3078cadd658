// Field getters and setters for structs and unions.

use crate::c_gen::{boundary_type, name_stem, use_wide};
use crate::context::GenContext;
use crate::ctype::{CKind, CType};
use crate::declarator::format_function_decl;

/// Accessors of one aggregate, in field order.
#[derive(Debug, Clone, Default)]
pub struct AccessorSet {
    pub fields: Vec<FieldAccessor>,
}

#[derive(Debug, Clone)]
pub struct FieldAccessor {
    pub name: String,
    /// Field type, resolved.
    pub ty: CType,
    pub getter: String,
    /// Emitted only once a mutable view asks for it.
    pub setter: Option<String>,
}

impl AccessorSet {
    fn complete(&self, field_count: usize, setters: bool) -> bool {
        self.fields.len() == field_count
            && (!setters || self.fields.iter().all(|f| f.setter.is_some()))
    }
}

/// Accessors for `agg`, emitting whatever is missing.
///
/// Getters hand aggregate fields out by address and array fields as a
/// pointer to their first element; 64-bit fields travel as wide handles.
pub fn get_accessors(ctx: &mut GenContext, agg: &CType, setters: bool) -> AccessorSet {
    let Some(fields) = agg.fields() else {
        return AccessorSet::default();
    };
    let key = agg.structural_key();
    let mut set = ctx.accessors.get(&key).cloned().unwrap_or_default();
    if set.complete(fields.len(), setters) {
        return set;
    }

    let stem = name_stem(agg, "");
    for (index, (field, field_ty)) in fields.iter().enumerate() {
        let field_ty = ctx.resolve(field_ty);
        let base = |verb: &str| {
            if stem.is_empty() {
                format!("{verb}_{field}")
            } else {
                format!("{stem}_{verb}_{field}")
            }
        };
        if set.fields.len() <= index {
            let getter = ctx.gensym(&base("get"));
            emit_getter(ctx, agg, &getter, field, &field_ty);
            set.fields.push(FieldAccessor {
                name: field.clone(),
                ty: field_ty.clone(),
                getter,
                setter: None,
            });
        }
        if setters && set.fields[index].setter.is_none() {
            let setter = ctx.gensym(&base("set"));
            emit_setter(ctx, agg, &setter, field, &field_ty);
            set.fields[index].setter = Some(setter);
        }
    }

    ctx.accessors.insert(key, set.clone());
    set
}

fn obj_param(agg: &CType) -> (String, CType) {
    ("obj".to_string(), CType::pointer(agg.clone()))
}

fn emit_getter(ctx: &mut GenContext, agg: &CType, name: &str, field: &str, ty: &CType) {
    let expr = if ty.is_wide() {
        use_wide(ctx);
        format!("__swab_wrap_wide(obj->{field})")
    } else if ty.is_aggregate() {
        format!("&obj->{field}")
    } else {
        format!("obj->{field}")
    };
    let header = format_function_decl(name, &[obj_param(agg)], &boundary_type(ty));
    ctx.c_out
        .push_str(&format!("{header} {{\n  return {expr};\n}}\n\n"));
    ctx.export(name);
}

fn emit_setter(ctx: &mut GenContext, agg: &CType, name: &str, field: &str, ty: &CType) {
    let stmt = if ty.is_wide() {
        use_wide(ctx);
        format!("obj->{field} = __swab_unwrap_wide(value);")
    } else if ty.is_aggregate() {
        format!("obj->{field} = *value;")
    } else if matches!(ty.kind, CKind::Array { .. }) {
        format!("memcpy(obj->{field}, value, sizeof(obj->{field}));")
    } else {
        format!("obj->{field} = value;")
    };
    let params = [obj_param(agg), ("value".to_string(), boundary_type(ty))];
    let header = format_function_decl(name, &params, &CType::void());
    ctx.c_out.push_str(&format!("{header} {{\n  {stmt}\n}}\n\n"));
    ctx.export(name);
}
