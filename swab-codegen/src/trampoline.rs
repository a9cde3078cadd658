// Trampoline descriptors: one `static` per distinct call signature, holding
// the binary module that gives host closures of that signature a shape the
// indirect table accepts.

use swab_abi::{trampoline_module, Signature};

use crate::context::GenContext;

/// Name of the `static swab_runtime::Trampoline` for `sig`, emitting it on
/// first request.
pub fn get_trampoline(ctx: &mut GenContext, sig: &Signature) -> String {
    if let Some(name) = ctx.trampolines.get(sig) {
        return name.clone();
    }
    let id = ctx.trampolines.len() as u32;
    let name = format!("__TRAMPOLINE_{id}");
    let bytes = trampoline_module(sig);

    let out = &mut ctx.rust_out;
    out.push_str(&format!("/// Trampoline for `{sig}`.\n"));
    out.push_str(&format!(
        "static {name}: swab_runtime::Trampoline = swab_runtime::Trampoline {{\n"
    ));
    out.push_str(&format!("    id: {id},\n"));
    out.push_str("    module: &[\n");
    for chunk in bytes.chunks(12) {
        let line = chunk
            .iter()
            .map(|b| format!("0x{b:02x},"))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!("        {line}\n"));
    }
    out.push_str("    ],\n");
    let params = sig
        .params
        .iter()
        .map(|p| p.path())
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("    params: &[{params}],\n"));
    match sig.result {
        Some(result) => out.push_str(&format!("    result: Some({}),\n", result.path())),
        None => out.push_str("    result: None,\n"),
    }
    out.push_str("};\n\n");

    ctx.trampolines.insert(sig.clone(), name.clone());
    name
}
