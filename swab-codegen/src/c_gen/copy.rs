// `void __copy_N(void *dst, const void *src)` exports, used when a typed
// pointer assigns a struct, union or array element in place.

use crate::c_gen::spell;
use crate::context::GenContext;
use crate::ctype::CType;

pub fn get_copy(ctx: &mut GenContext, ty: &CType) -> String {
    let key = ty.structural_key();
    if let Some(name) = ctx.copies.get(&key) {
        return name.clone();
    }
    let name = ctx.gensym("copy");
    ctx.c_out.push_str(&format!(
        "void {name}(void *__dst, const void *__src) {{\n  memcpy(__dst, __src, sizeof({}));\n}}\n\n",
        spell(ty)
    ));
    ctx.export(&name);
    ctx.copies.insert(key, name.clone());
    name
}
