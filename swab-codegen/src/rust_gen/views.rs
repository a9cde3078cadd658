// Struct and union views.
//
// Each aggregate gets two address-holding views: `{Name}Value` for an
// aggregate reached by value (a field, an array element, a function result)
// and `{Name}Ptr` for a pointer to one, which adds setters and destruction.

use crate::c_gen::accessors::{get_accessors, FieldAccessor};
use crate::c_gen::lifecycle::get_lifecycle;
use crate::c_gen::{name_stem, spell};
use crate::context::GenContext;
use crate::ctype::{CKind, CType};
use crate::naming::{to_snake_case, to_upper_camel};
use crate::rust_gen::convert::{host_conv, layout_fn};
use crate::rust_gen::{address_val, Arg, CallPlan, Callee, Returns, RT};

/// Rust names claimed for one aggregate.
#[derive(Debug, Clone)]
pub struct ViewNames {
    pub base: String,
    value_emitted: bool,
    pointer_emitted: bool,
}

/// Base name of the views of `agg`, claimed on first request.
pub fn view_base(ctx: &mut GenContext, agg: &CType) -> String {
    let key = agg.structural_key();
    if let Some(names) = ctx.views.get(&key) {
        return names.base.clone();
    }
    let stem = name_stem(agg, "");
    let wanted = if stem.is_empty() {
        "Anon".to_string()
    } else {
        to_upper_camel(&stem)
    };
    let base = ctx.claim_rust_type(&wanted, &["Value", "Ptr"]);
    ctx.views.insert(
        key,
        ViewNames {
            base: base.clone(),
            value_emitted: false,
            pointer_emitted: false,
        },
    );
    base
}

/// Mark one view of `agg` emitted, returning whether it already was.
fn claim(ctx: &mut GenContext, agg: &CType, pointer: bool) -> bool {
    let key = agg.structural_key();
    let Some(names) = ctx.views.get_mut(&key) else {
        return false;
    };
    let flag = if pointer {
        &mut names.pointer_emitted
    } else {
        &mut names.value_emitted
    };
    std::mem::replace(flag, true)
}

fn emit_struct_header(out: &mut String, name: &str, doc: &str) {
    out.push_str(&format!("{doc}\n"));
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq)]\n");
    out.push_str(&format!("pub struct {name} {{\n    address: u32,\n}}\n\n"));
    out.push_str(&format!(
        "impl swab_runtime::Aggregate for {name} {{\n    \
         fn from_address(address: u32) -> Self {{\n        \
         {name} {{ address }}\n    \
         }}\n\n    \
         fn address(&self) -> u32 {{\n        \
         self.address\n    \
         }}\n\
         }}\n\n"
    ));
}

fn getter(ctx: &mut GenContext, out: &mut String, field: &FieldAccessor, null_check: bool) {
    let conv = host_conv(ctx, &field.ty);
    let returns = if field.ty.is_void() {
        Returns::Void
    } else {
        Returns::Value {
            to_host: conv.to_host.clone(),
            wide: field.ty.is_wide(),
            non_null: None,
        }
    };
    let plan = CallPlan {
        callee: Callee::Export(field.getter.clone()),
        args: vec![Arg::Raw(address_val("self.address"))],
        returns,
    };
    let method = to_snake_case(&field.name);
    out.push_str(&format!(
        "    pub fn get_{method}(&self, rt: {RT}) -> swab_runtime::SwabResult<{}> {{\n",
        conv.host_type
    ));
    if null_check {
        out.push_str(NULL_CHECK);
    }
    out.push_str(&plan.render(8));
    out.push_str("    }\n\n");
}

const NULL_CHECK: &str =
    "        if self.address == 0 {\n            return Err(swab_runtime::SwabError::NullPointer);\n        }\n";

/// Argument storing a host value into native memory that outlives the call.
/// Strings are handed over; arrays are copied from a temporary buffer.
pub(crate) fn stored_arg(ctx: &mut GenContext, ty: &CType, value: &str) -> (String, Arg) {
    let conv = host_conv(ctx, ty);
    let array = matches!(ty.kind, CKind::Array { .. });
    let (param, to_native) = if array {
        (conv.host_type.clone(), conv.to_native.clone())
    } else {
        (conv.param_type.clone(), conv.to_native_param.clone())
    };
    let arg = Arg::Host {
        value: value.to_string(),
        to_native,
        temp: array,
        wide: ty.is_wide(),
    };
    (param, arg)
}

fn setter(ctx: &mut GenContext, out: &mut String, field: &FieldAccessor) {
    let Some(symbol) = &field.setter else {
        return;
    };
    let (param, arg) = stored_arg(ctx, &field.ty, "value");
    let plan = CallPlan {
        callee: Callee::Export(symbol.clone()),
        args: vec![Arg::Raw(address_val("self.address")), arg],
        returns: Returns::Void,
    };
    let method = to_snake_case(&field.name);
    out.push_str(&format!(
        "    pub fn set_{method}(&self, rt: {RT}, value: {param}) -> swab_runtime::SwabResult<()> {{\n"
    ));
    out.push_str(NULL_CHECK);
    out.push_str(&plan.render(8));
    out.push_str("    }\n\n");
}

fn destroy(out: &mut String, symbol: &str, receiver: &str, doc: &str) {
    out.push_str(&format!("    /// {doc}\n"));
    out.push_str(&format!(
        "    pub fn destroy({receiver}, rt: {RT}) -> swab_runtime::SwabResult<()> {{\n        \
         rt.call({symbol:?}, &[{}])?;\n        \
         Ok(())\n    \
         }}\n\n",
        address_val("self.address")
    ));
}

/// Emit `{Name}Value` for `agg` if it has not been emitted yet.
pub fn emit_value_view(ctx: &mut GenContext, agg: &CType) {
    let base = view_base(ctx, agg);
    if claim(ctx, agg, false) {
        return;
    }
    let name = format!("{base}Value");
    let accessors = get_accessors(ctx, agg, false);

    let mut out = String::new();
    emit_struct_header(
        &mut out,
        &name,
        &format!("/// `{}` in native memory, reached by value.", spell(agg)),
    );
    out.push_str(&format!("impl {name} {{\n"));
    for field in &accessors.fields {
        getter(ctx, &mut out, field, false);
    }
    if matches!(agg.kind, CKind::Struct { .. }) {
        if let Some(dtor) = get_lifecycle(ctx, agg).dtor {
            destroy(
                &mut out,
                &dtor,
                "&self",
                "Destroy what the pointer fields own. The storage itself stays allocated.",
            );
        }
    }
    out.push_str(&format!(
        "    /// Hand the storage back to the native allocator.\n    \
         pub fn free(self, rt: {RT}) -> swab_runtime::SwabResult<()> {{\n        \
         rt.free(self.address)\n    \
         }}\n\
         }}\n\n"
    ));
    ctx.rust_out.push_str(&out);
}

/// Emit `{Name}Ptr` for `ptr_ty`, a pointer to `agg`, if it has not been
/// emitted yet.
pub fn emit_pointer_view(ctx: &mut GenContext, ptr_ty: &CType, agg: &CType) {
    let base = view_base(ctx, agg);
    if claim(ctx, agg, true) {
        return;
    }
    let name = format!("{base}Ptr");
    let value = format!("{base}Value");
    emit_value_view(ctx, agg);
    let accessors = get_accessors(ctx, agg, true);
    let layout = layout_fn(ctx, agg);

    let mut out = String::new();
    emit_struct_header(&mut out, &name, &format!("/// `{}`.", spell(ptr_ty)));
    out.push_str(&format!("impl {name} {{\n"));
    out.push_str(&format!(
        "    pub fn is_null(&self) -> bool {{\n        self.address == 0\n    }}\n\n\
         \x20   /// The pointee, as a by-value view.\n    \
         pub fn value(&self) -> {value} {{\n        \
         {value} {{ address: self.address }}\n    \
         }}\n\n\
         \x20   /// Typed pointer onto the same address, for indexing into arrays.\n    \
         pub fn as_pointer(&self, rt: {RT}) -> swab_runtime::SwabResult<swab_runtime::WasmPointer<{value}>> {{\n        \
         Ok(swab_runtime::WasmPointer::new(self.address, {layout}(rt)?))\n    \
         }}\n\n"
    ));
    for field in &accessors.fields {
        getter(ctx, &mut out, field, true);
        setter(ctx, &mut out, field);
    }
    if let Some(dtor) = get_lifecycle(ctx, ptr_ty).dtor {
        destroy(
            &mut out,
            &dtor,
            "self",
            "Destroy the pointee and free it. Null is a no-op.",
        );
    }
    out.push_str("}\n\n");
    ctx.rust_out.push_str(&out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctype::SubstitutionTable;
    use indexmap::IndexMap;

    fn ctx() -> GenContext {
        let mut table = SubstitutionTable::default();
        let mut fields = IndexMap::new();
        fields.insert("major".to_string(), CType::user("int"));
        fields.insert("buildId".to_string(), CType::user("uint64_t"));
        fields.insert("name".to_string(), CType::pointer(CType::user("char")));
        table.insert("version_info", CKind::Struct { fields }.into());

        let mut number = IndexMap::new();
        number.insert("i".to_string(), CType::user("int"));
        number.insert("f".to_string(), CType::user("float"));
        table.insert("number", CKind::Union { fields: number }.into());
        GenContext::new(table)
    }

    #[test]
    fn test_pointer_view_methods() {
        let mut ctx = ctx();
        let ptr = ctx.resolve(&CType::pointer(CType::user("version_info")));
        let agg = ctx.resolve(&CType::user("version_info"));
        view_base(&mut ctx, &agg);
        emit_pointer_view(&mut ctx, &ptr, &agg);
        let out = &ctx.rust_out;

        assert!(out.contains("pub struct VersionInfoPtr {\n    address: u32,\n}"));
        assert!(out.contains("pub struct VersionInfoValue {\n    address: u32,\n}"));
        assert!(out.contains("pub fn get_build_id(&self, rt: &mut dyn swab_runtime::Native) -> swab_runtime::SwabResult<u64> {"));
        assert!(out.contains("let raw = swab_runtime::wide_from_native(rt, raw)?;"));
        assert!(out.contains("pub fn set_build_id(&self, rt: &mut dyn swab_runtime::Native, value: u64)"));
        assert!(out.contains("let arg1 = frame.wide(rt, arg1)?;"));
        // Strings stored into a struct are handed over, not freed after the call.
        assert!(out.contains("pub fn set_name(&self, rt: &mut dyn swab_runtime::Native, value: &str)"));
        assert!(!out.contains("frame.temp"));
        assert!(out.contains("pub fn destroy(self, rt: &mut dyn swab_runtime::Native)"));
        assert!(out.contains("pub fn destroy(&self, rt: &mut dyn swab_runtime::Native)"));

        emit_pointer_view(&mut ctx, &ptr, &agg);
        assert_eq!(ctx.rust_out.matches("pub struct VersionInfoPtr").count(), 1);
    }

    #[test]
    fn test_union_value_view_has_no_destroy() {
        let mut ctx = ctx();
        let agg = ctx.resolve(&CType::user("number"));
        emit_value_view(&mut ctx, &agg);
        assert!(ctx.rust_out.contains("pub fn get_f(&self"));
        assert!(!ctx.rust_out.contains("pub fn destroy"));
        assert!(ctx.rust_out.contains("pub fn free(self"));
    }

    #[test]
    fn test_names_do_not_collide() {
        let mut ctx = ctx();
        ctx.claim_rust_name("NumberValue");
        let agg = ctx.resolve(&CType::user("number"));
        let base = view_base(&mut ctx, &agg);
        assert_ne!(base, "Number");
        assert!(base.starts_with("Number"));
    }
}
