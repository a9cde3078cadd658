// Function pointer types.
//
// A function pointer is either a native table slot or a host closure. Host
// closures are installed through the trampoline of their signature the
// first time they are handed to native code; the slot stays occupied until
// `release` is called on the installed value.
//
// 64-bit values travel as plain i64 here: table calls go through core wasm
// signatures, which carry them directly.

use swab_abi::Signature;

use crate::c_gen::{name_stem, spell};
use crate::context::GenContext;
use crate::ctype::{CKind, CType};
use crate::error::DiagnosticKind;
use crate::naming::to_upper_camel;
use crate::rust_gen::convert::{host_conv, HostConv};
use crate::rust_gen::{Arg, CallPlan, Callee, Returns, RT};
use crate::trampoline::get_trampoline;

/// Claim the Rust name of the function pointer type `ty`.
pub fn reserve(ctx: &mut GenContext, ty: &CType) -> String {
    let stem = name_stem(ty, "");
    let wanted = if stem.is_empty() {
        "Callback".to_string()
    } else {
        to_upper_camel(&stem)
    };
    ctx.claim_rust_name(&wanted)
}

/// Conversion of one callback parameter or result. Aggregates and nested
/// function pointers are passed as raw addresses.
fn callback_conv(ctx: &mut GenContext, ty: &CType, fn_ty: &CType) -> HostConv {
    if ty.is_aggregate() || matches!(ty.kind, CKind::FunctionPointer { .. }) {
        ctx.diagnose(
            DiagnosticKind::UnsupportedConversion,
            format!(
                "`{}` in function pointer `{}` is passed as a raw address",
                spell(ty),
                spell(fn_ty)
            ),
        );
        return HostConv::primitive("u32");
    }
    host_conv(ctx, ty)
}

pub fn emit(ctx: &mut GenContext, ty: &CType, name: &str) {
    let CKind::FunctionPointer { takes, returns } = &ty.kind else {
        return;
    };
    let params: Vec<CType> = takes.iter().map(|t| ctx.resolve(t)).collect();
    let ret = ctx.resolve(returns);

    let convs: Vec<HostConv> = params.iter().map(|p| callback_conv(ctx, p, ty)).collect();
    let ret_conv = if ret.is_void() {
        None
    } else {
        Some(callback_conv(ctx, &ret, ty))
    };

    let sig = Signature::new(
        params.iter().filter_map(CType::val_category).collect(),
        ret.val_category(),
    );
    let trampoline = get_trampoline(ctx, &sig);

    let ret_type = ret_conv
        .as_ref()
        .map(|c| c.host_type.clone())
        .unwrap_or_else(|| "()".to_string());
    let mut fn_params = vec![RT.to_string()];
    fn_params.extend(convs.iter().map(|c| c.host_type.clone()));
    let fn_sig = format!(
        "Fn({}) -> swab_runtime::SwabResult<{ret_type}> + Send + Sync",
        fn_params.join(", ")
    );
    let arc = format!("std::sync::Arc<dyn {fn_sig}>");

    let arg_names: Vec<String> = (0..convs.len()).map(|i| format!("a{i}")).collect();
    let typed_params: String = arg_names
        .iter()
        .zip(&convs)
        .map(|(a, c)| format!(", {a}: {}", c.host_type))
        .collect();
    let forwarded: String = arg_names.iter().map(|a| format!(", {a}")).collect();

    let plan = CallPlan {
        callee: Callee::Slot("slot".to_string()),
        args: arg_names
            .iter()
            .zip(&convs)
            .map(|(a, c)| Arg::Host {
                value: a.clone(),
                to_native: c.to_native.clone(),
                temp: c.allocates,
                wide: false,
            })
            .collect(),
        returns: match &ret_conv {
            None => Returns::Void,
            Some(c) => Returns::Value {
                to_host: c.to_host.clone(),
                wide: false,
                non_null: None,
            },
        },
    };

    let mut out = String::with_capacity(4096);
    out.push_str(&format!("/// `{}`.\n", spell(ty)));
    out.push_str("#[derive(Clone)]\n");
    out.push_str(&format!("pub enum {name} {{\n"));
    out.push_str("    /// Function in the native table, by slot.\n    Native(u32),\n");
    out.push_str("    /// Host closure, installed into the table when handed to native code.\n");
    out.push_str(&format!("    Host({arc}),\n}}\n\n"));

    out.push_str(&format!(
        "impl std::fmt::Debug for {name} {{\n    \
         fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {{\n        \
         match self {{\n            \
         {name}::Native(slot) => f.debug_tuple(\"Native\").field(slot).finish(),\n            \
         {name}::Host(_) => f.write_str(\"Host(..)\"),\n        \
         }}\n    \
         }}\n\
         }}\n\n"
    ));

    out.push_str(&format!("impl {name} {{\n"));
    out.push_str(&format!(
        "    pub fn host(f: impl {fn_sig} + 'static) -> Self {{\n        \
         {name}::Host(std::sync::Arc::new(f))\n    \
         }}\n\n"
    ));
    out.push_str(&format!(
        "    /// Table slot, once installed.\n    \
         pub fn slot(&self) -> Option<u32> {{\n        \
         match self {{\n            \
         {name}::Native(slot) => Some(*slot),\n            \
         {name}::Host(_) => None,\n        \
         }}\n    \
         }}\n\n"
    ));

    out.push_str(&format!(
        "    pub fn call(&self, rt: {RT}{typed_params}) -> swab_runtime::SwabResult<{ret_type}> {{\n        \
         match self {{\n            \
         {name}::Host(f) => f(rt{forwarded}),\n            \
         {name}::Native(slot) => {{\n                \
         let slot = *slot;\n                \
         if slot == 0 {{\n                    \
         return Err(swab_runtime::SwabError::NullPointer);\n                \
         }}\n"
    ));
    out.push_str(&plan.render(16));
    out.push_str("            }\n        }\n    }\n\n");

    out.push_str(&format!(
        "    /// Install into the table if needed, yielding the `Native` form.\n    \
         pub fn install(self, rt: {RT}) -> swab_runtime::SwabResult<Self> {{\n        \
         let slot = match self {{\n            \
         {name}::Native(slot) => slot,\n            \
         {name}::Host(f) => Self::install_host(rt, f)?,\n        \
         }};\n        \
         Ok({name}::Native(slot))\n    \
         }}\n\n"
    ));
    out.push_str(&format!(
        "    /// Clear the table slot of an installed host closure.\n    \
         pub fn release(self, rt: {RT}) -> swab_runtime::SwabResult<()> {{\n        \
         match self {{\n            \
         {name}::Native(slot) => rt.release_function(slot),\n            \
         {name}::Host(_) => Ok(()),\n        \
         }}\n    \
         }}\n\n"
    ));

    // Host side of the trampoline: raw arguments in, raw result out.
    let mut body = String::new();
    for (i, conv) in convs.iter().enumerate() {
        body.push_str(&format!(
            "                let a{i} = {}(rt, swab_runtime::arg(args, {i})?)?;\n",
            conv.to_host
        ));
    }
    match &ret_conv {
        None => {
            body.push_str(&format!("                f(rt{forwarded})?;\n"));
            body.push_str("                Ok(None)\n");
        }
        Some(conv) => {
            body.push_str(&format!("                let out = f(rt{forwarded})?;\n"));
            body.push_str(&format!(
                "                Ok(Some({}(rt, out)?))\n",
                conv.to_native
            ));
        }
    }
    let args_binding = if convs.is_empty() { "_args" } else { "args" };
    out.push_str(&format!(
        "    fn install_host(rt: {RT}, f: {arc}) -> swab_runtime::SwabResult<u32> {{\n        \
         rt.wrap_function(\n            \
         &{trampoline},\n            \
         swab_runtime::host_fn(move |rt, {args_binding}| {{\n\
         {body}\
         \x20           }}),\n        \
         )\n    \
         }}\n\n"
    ));

    out.push_str(&format!(
        "    pub fn from_native(_rt: {RT}, raw: swab_runtime::Val) -> swab_runtime::SwabResult<Self> {{\n        \
         Ok({name}::Native(swab_runtime::address_from_native(raw)?))\n    \
         }}\n\n"
    ));
    out.push_str(&format!(
        "    /// Installs host closures; the slot is not released afterwards.\n    \
         pub fn to_native(rt: {RT}, value: Self) -> swab_runtime::SwabResult<swab_runtime::Val> {{\n        \
         let slot = match value {{\n            \
         {name}::Native(slot) => slot,\n            \
         {name}::Host(f) => Self::install_host(rt, f)?,\n        \
         }};\n        \
         Ok(swab_runtime::Val::I32(slot as i32))\n    \
         }}\n"
    ));
    out.push_str("}\n\n");

    ctx.rust_out.push_str(&out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ctype::SubstitutionTable;

    fn callback(takes: Vec<CType>, returns: CType) -> CType {
        CKind::FunctionPointer {
            takes,
            returns: Box::new(returns),
        }
        .into()
    }

    #[test]
    fn test_callback_items() {
        let mut ctx = GenContext::new(SubstitutionTable::default());
        let ty = ctx.resolve(&callback(
            vec![CType::user("int64_t"), CType::pointer(CType::user("char"))],
            CType::user("double"),
        ));
        let name = reserve(&mut ctx, &ty);
        assert_eq!(name, "Callback");
        emit(&mut ctx, &ty, &name);
        let out = &ctx.rust_out;

        assert!(out.contains(
            "Host(std::sync::Arc<dyn Fn(&mut dyn swab_runtime::Native, i64, String) -> swab_runtime::SwabResult<f64> + Send + Sync>),"
        ));
        assert!(out.contains("params: &[swab_runtime::ValCategory::I64, swab_runtime::ValCategory::I32],"));
        assert!(out.contains("result: Some(swab_runtime::ValCategory::F64),"));
        // Strings passed to a native callback are temporaries of the call;
        // 64-bit values are not wrapped.
        assert!(out.contains("let arg1 = frame.temp(arg1)?;"));
        assert!(!out.contains("frame.wide"));
        assert!(out.contains("let a0 = swab_runtime::convert::i64_from_native(rt, swab_runtime::arg(args, 0)?)?;"));
        assert!(out.contains("Ok(Some(swab_runtime::convert::f64_to_native(rt, out)?))"));
        assert!(ctx.diagnostics.is_empty());
    }

    #[test]
    fn test_void_nullary_callback() {
        let mut ctx = GenContext::new(SubstitutionTable::default());
        let ty = ctx.resolve(&callback(vec![], CType::void()));
        emit(&mut ctx, &ty, "Tick");
        assert!(ctx.rust_out.contains("swab_runtime::host_fn(move |rt, _args| {"));
        assert!(ctx.rust_out.contains("                f(rt)?;\n                Ok(None)\n"));
        assert!(ctx.rust_out.contains("params: &[],"));
    }

    #[test]
    fn test_aggregate_param_falls_back_to_address() {
        let mut table = SubstitutionTable::default();
        let mut fields = indexmap::IndexMap::new();
        fields.insert("x".to_string(), CType::user("int"));
        table.insert("point", CKind::Struct { fields }.into());
        let mut ctx = GenContext::new(table);
        let ty = ctx.resolve(&callback(vec![CType::user("point")], CType::void()));
        emit(&mut ctx, &ty, "OnPoint");
        assert_eq!(ctx.diagnostics.len(), 1);
        assert!(ctx.rust_out.contains("dyn Fn(&mut dyn swab_runtime::Native, u32)"));
    }
}
