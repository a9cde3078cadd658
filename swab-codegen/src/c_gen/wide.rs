// Function adapters.
//
// A function whose signature touches a 64-bit integer or an aggregate is
// exported through a wrapper: wide parameters arrive as handles, aggregate
// parameters by address, and aggregate results are copied into a fresh
// allocation the caller owns. Every other function is exported as is.

use crate::c_gen::{boundary_type, needs_adapter, use_wide};
use crate::context::GenContext;
use crate::ctype::{CKind, CType};
use crate::declarator::{format_decl, format_function_decl};
use crate::error::ConfigError;

/// Symbol the host calls for `name`, emitting an adapter if one is needed.
/// `params` and `ret` must be resolved.
pub fn wrap_function(
    ctx: &mut GenContext,
    name: &str,
    params: &[CType],
    ret: &CType,
) -> Result<String, ConfigError> {
    if matches!(ret.kind, CKind::Array { .. }) {
        return Err(ConfigError::InvalidSignature {
            function: name.to_string(),
            reason: "functions cannot return arrays".to_string(),
        });
    }
    if let Some(symbol) = ctx.wrappers.get(name) {
        return Ok(symbol.clone());
    }
    if !params.iter().any(needs_adapter) && !needs_adapter(ret) {
        ctx.export(name);
        ctx.wrappers.insert(name.to_string(), name.to_string());
        return Ok(name.to_string());
    }

    let wrapper = ctx.gensym(&format!("wrap_{name}"));
    let mut args = Vec::new();
    let mut call_args = Vec::new();
    for (i, param) in params.iter().enumerate() {
        let arg = format!("__arg_{i}");
        call_args.push(if param.is_wide() {
            use_wide(ctx);
            format!("__swab_unwrap_wide({arg})")
        } else if param.is_aggregate() {
            format!("*{arg}")
        } else {
            arg.clone()
        });
        args.push((arg, boundary_type(param)));
    }
    let call = format!("{name}({})", call_args.join(", "));

    let body = if ret.is_void() {
        format!("  {call};\n")
    } else if ret.is_wide() {
        use_wide(ctx);
        format!("  return __swab_wrap_wide({call});\n")
    } else if ret.is_aggregate() {
        format!(
            "  {} = {call};\n  {} = malloc(sizeof *__out);\n  if (__out) *__out = __value;\n  return __out;\n",
            format_decl(ret, "__value"),
            format_decl(&CType::pointer(ret.clone()), "__out"),
        )
    } else {
        format!("  return {call};\n")
    };

    let header = format_function_decl(&wrapper, &args, &boundary_type(ret));
    ctx.c_out.push_str(&format!("{header} {{\n{body}}}\n\n"));
    ctx.export(&wrapper);
    ctx.wrappers.insert(name.to_string(), wrapper.clone());
    Ok(wrapper)
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
        table.insert("version", CKind::Struct { fields }.into());
        GenContext::new(table)
    }

    #[test]
    fn test_plain_function_is_exported_directly() {
        let mut ctx = ctx();
        let int = ctx.resolve(&CType::user("int"));
        let symbol = wrap_function(&mut ctx, "add", &[int.clone(), int.clone()], &int).unwrap();
        assert_eq!(symbol, "add");
        assert!(ctx.c_out.is_empty());
        assert!(ctx.exports.contains("add"));
    }

    #[test]
    fn test_wide_adapter() {
        let mut ctx = ctx();
        let wide = ctx.resolve(&CType::user("int64_t"));
        let symbol = wrap_function(&mut ctx, "addI64", &[wide.clone(), wide.clone()], &wide).unwrap();
        assert_eq!(symbol, "__wrap_addI64_0");
        assert!(ctx.c_out.contains(
            "__swab_wide __wrap_addI64_0(__swab_wide __arg_0, __swab_wide __arg_1) {\n  \
             return __swab_wrap_wide(addI64(__swab_unwrap_wide(__arg_0), __swab_unwrap_wide(__arg_1)));\n}"
        ));
        assert!(!ctx.exports.contains("addI64"));
        assert_eq!(ctx.imports.len(), 3);

        // Cached by function name.
        let again = wrap_function(&mut ctx, "addI64", &[wide.clone(), wide.clone()], &wide).unwrap();
        assert_eq!(again, symbol);
    }

    #[test]
    fn test_aggregate_adapter() {
        let mut ctx = ctx();
        let version = ctx.resolve(&CType::user("version"));
        let symbol = wrap_function(&mut ctx, "bump", &[version.clone()], &version).unwrap();
        assert!(ctx.c_out.contains(&format!("version *{symbol}(version *__arg_0) {{")));
        assert!(ctx.c_out.contains("  version __value = bump(*__arg_0);\n  version *__out = malloc(sizeof *__out);"));
        assert!(ctx.imports.is_empty());
    }

    #[test]
    fn test_array_return_rejected() {
        let mut ctx = ctx();
        let arr = ctx.resolve(&CType::array(CType::user("int"), 2));
        let err = wrap_function(&mut ctx, "bad", &[], &arr).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSignature { function, .. } if function == "bad"));
    }
}
