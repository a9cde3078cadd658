// Module-level functions: wrappers for configured native functions,
// constructors for declared structs and unions, and element layouts of
// declared types.

use crate::c_gen::lifecycle::get_lifecycle;
use crate::c_gen::sizeof::get_sizeof;
use crate::c_gen::wide::wrap_function;
use crate::c_gen::{boundary_type, name_stem};
use crate::context::GenContext;
use crate::ctype::{CKind, CType};
use crate::declarator::format_function_decl;
use crate::error::ConfigError;
use crate::naming::{escape_reserved, to_fn_name, to_snake_case};
use crate::rust_gen::convert::{host_conv, layout_fn};
use crate::rust_gen::views::stored_arg;
use crate::rust_gen::{Arg, CallPlan, Callee, Returns, RT};
use swab_abi::ValCategory;

/// Locals used by generated bodies; parameters must not shadow them.
const BODY_LOCALS: &[&str] = &["rt", "frame", "raw", "slot", "value"];

fn param_ident(name: &str) -> String {
    let ident = escape_reserved(&to_snake_case(name));
    let is_local = BODY_LOCALS.contains(&ident.as_str())
        || (ident.starts_with("arg") && ident[3..].chars().all(|c| c.is_ascii_digit()));
    if is_local {
        format!("{ident}_")
    } else {
        ident
    }
}

fn render_fn(ctx: &mut GenContext, doc: &str, name: &str, params: &[(String, String)], ret: &str, plan: &CallPlan) {
    let params: String = params
        .iter()
        .map(|(param, ty)| format!(", {param}: {ty}"))
        .collect();
    ctx.rust_out.push_str(&format!(
        "/// {doc}\npub fn {name}(rt: {RT}{params}) -> swab_runtime::SwabResult<{ret}> {{\n{}}}\n\n",
        plan.render(4)
    ));
}

/// Wrapper for the configured native function `name`.
pub fn emit_function(
    ctx: &mut GenContext,
    name: &str,
    params: &[CType],
    ret: &CType,
) -> Result<(), ConfigError> {
    let params: Vec<CType> = params.iter().map(|p| ctx.resolve(p)).collect();
    let ret = ctx.resolve(ret);
    let symbol = wrap_function(ctx, name, &params, &ret)?;

    let mut rust_params = Vec::new();
    let mut args = Vec::new();
    let mut c_params = Vec::new();
    for (i, param) in params.iter().enumerate() {
        let conv = host_conv(ctx, param);
        let local = format!("a{i}");
        args.push(Arg::Host {
            value: local.clone(),
            to_native: conv.to_native_param.clone(),
            temp: conv.allocates,
            wide: param.is_wide(),
        });
        rust_params.push((local.clone(), conv.param_type));
        c_params.push((local, param.clone()));
    }

    let (ret_type, returns) = if ret.is_void() {
        ("()".to_string(), Returns::Void)
    } else {
        let conv = host_conv(ctx, &ret);
        let non_null = if ret.is_aggregate() {
            get_sizeof(ctx, &ret)
        } else {
            None
        };
        (
            conv.host_type,
            Returns::Value {
                to_host: conv.to_host,
                wide: ret.is_wide(),
                non_null,
            },
        )
    };

    let plan = CallPlan {
        callee: Callee::Export(symbol),
        args,
        returns,
    };
    let fn_name = ctx.claim_rust_name(&to_fn_name(name));
    let doc = format!("Calls `{}`.", format_function_decl(name, &c_params, &ret));
    render_fn(ctx, &doc, &fn_name, &rust_params, &ret_type, &plan);
    Ok(())
}

/// Zero of the category `ty` crosses the boundary as.
fn zero_val(ty: &CType) -> &'static str {
    match boundary_type(ty).val_category() {
        Some(ValCategory::F32) => "swab_runtime::Val::F32(0)",
        Some(ValCategory::F64) => "swab_runtime::Val::F64(0)",
        Some(ValCategory::I64) => "swab_runtime::Val::I64(0)",
        _ => "swab_runtime::Val::I32(0)",
    }
}

/// `create_*` functions for the declared struct or union `type_name`.
pub fn emit_creators(ctx: &mut GenContext, type_name: &str) {
    let ty = ctx.resolve(&CType::user(type_name));
    let Some(fields) = ty.fields().cloned() else {
        return;
    };
    let ptr_ty = ctx.resolve(&CType::pointer(CType::user(type_name)));
    let view = host_conv(ctx, &ptr_ty);
    let sizeof = get_sizeof(ctx, &ty);
    let snake = to_snake_case(&name_stem(&ty, type_name));
    let returns = || Returns::Value {
        to_host: view.to_host.clone(),
        wide: false,
        non_null: sizeof.clone(),
    };

    let Some(ctor) = get_lifecycle(ctx, &ty).ctor else {
        return;
    };
    let fields: Vec<(String, CType)> = fields
        .iter()
        .map(|(name, field)| (name.clone(), ctx.resolve(field)))
        .collect();

    if matches!(ty.kind, CKind::Struct { .. }) {
        let mut params = Vec::new();
        let mut args = Vec::new();
        for (field, field_ty) in &fields {
            let ident = param_ident(field);
            let (param_type, arg) = stored_arg(ctx, field_ty, &ident);
            params.push((ident, param_type));
            args.push(arg);
        }
        let plan = CallPlan {
            callee: Callee::Export(ctor),
            args,
            returns: returns(),
        };
        let name = ctx.claim_rust_name(&format!("create_{snake}"));
        let doc = format!("Allocate a `{type_name}` holding the given fields.");
        render_fn(ctx, &doc, &name, &params, &view.host_type, &plan);
    } else {
        for (selected, (field, field_ty)) in fields.iter().enumerate() {
            let mut args = vec![Arg::Raw(format!("swab_runtime::Val::I32({selected})"))];
            let mut params = Vec::new();
            for (i, (_, other)) in fields.iter().enumerate() {
                if i == selected {
                    let (param_type, arg) = stored_arg(ctx, field_ty, "value");
                    params.push(("value".to_string(), param_type));
                    args.push(arg);
                } else {
                    args.push(Arg::Raw(zero_val(other).to_string()));
                }
            }
            let plan = CallPlan {
                callee: Callee::Export(ctor.clone()),
                args,
                returns: returns(),
            };
            let name = ctx.claim_rust_name(&format!("create_{snake}_{}", to_snake_case(field)));
            let doc = format!("Allocate a `{type_name}` with `{field}` active.");
            render_fn(ctx, &doc, &name, &params, &view.host_type, &plan);
        }
    }

    if let Some(ctor) = get_lifecycle(ctx, &ptr_ty).ctor {
        let plan = CallPlan {
            callee: Callee::Export(ctor),
            args: Vec::new(),
            returns: returns(),
        };
        let name = ctx.claim_rust_name(&format!("create_{snake}_ptr"));
        let doc = format!("Allocate a zeroed `{type_name}`.");
        render_fn(ctx, &doc, &name, &[], &view.host_type, &plan);
    }
}

/// `{name}_layout(rt)`: element layout of a declared type, for allocating
/// and indexing typed pointers to it.
pub fn emit_type_layout(ctx: &mut GenContext, type_name: &str) {
    let ty = ctx.resolve(&CType::user(type_name));
    if ty.is_void() {
        return;
    }
    let layout = layout_fn(ctx, &ty);
    let host = host_conv(ctx, &ty).host_type;
    let snake = to_snake_case(&name_stem(&ty, type_name));
    let name = ctx.claim_rust_name(&format!("{snake}_layout"));
    ctx.rust_out.push_str(&format!(
        "/// Element layout of `{type_name}`.\n\
         pub fn {name}(rt: {RT}) -> swab_runtime::SwabResult<swab_runtime::ElementLayout<{host}>> {{\n    \
         {layout}(rt)\n\
         }}\n\n"
    ));
}
