// `size_t __sizeof_N(void)` exports.

use crate::c_gen::spell;
use crate::context::GenContext;
use crate::ctype::CType;

/// Symbol of the sizeof export for `ty`, emitting it on first request.
///
/// `None` for void, whose size is fixed at one byte and needs no export.
pub fn get_sizeof(ctx: &mut GenContext, ty: &CType) -> Option<String> {
    if ty.is_void() {
        return None;
    }
    let key = ty.structural_key();
    if let Some(name) = ctx.sizeofs.get(&key) {
        return Some(name.clone());
    }

    let name = ctx.gensym("sizeof");
    ctx.c_out.push_str(&format!(
        "size_t {name}(void) {{\n  return sizeof({});\n}}\n\n",
        spell(ty)
    ));
    ctx.export(&name);
    ctx.sizeofs.insert(key, name.clone());
    Some(name)
}
