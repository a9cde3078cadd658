// Host conversions: which Rust type stands for a native type, and which
// converter functions move values between the two.
//
// Converters are referenced by path. Primitive ones live in
// `swab_runtime::convert`; the rest are generated next to the items that
// need them.

use crate::c_gen::copy::get_copy;
use crate::c_gen::sizeof::get_sizeof;
use crate::context::GenContext;
use crate::ctype::{leaf_name, CKind, CType};
use crate::rust_gen::{callbacks, enums, views, RT};

/// How values of one native type appear on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConv {
    pub host_type: String,
    /// Type taken by generated functions, when it differs from `host_type`
    /// (`&str` for strings).
    pub param_type: String,
    /// `fn(&mut dyn Native, Val) -> SwabResult<host_type>`
    pub to_host: String,
    /// `fn(&mut dyn Native, host_type) -> SwabResult<Val>`
    pub to_native: String,
    /// `fn(&mut dyn Native, param_type) -> SwabResult<Val>`
    pub to_native_param: String,
    /// `to_native` allocates a buffer the caller owns.
    pub allocates: bool,
}

impl HostConv {
    fn new(host_type: impl Into<String>, to_host: impl Into<String>, to_native: impl Into<String>) -> Self {
        let host_type = host_type.into();
        let to_native = to_native.into();
        HostConv {
            param_type: host_type.clone(),
            host_type,
            to_host: to_host.into(),
            to_native_param: to_native.clone(),
            to_native,
            allocates: false,
        }
    }

    pub(crate) fn primitive(name: &str) -> Self {
        HostConv::new(
            name,
            format!("swab_runtime::convert::{name}_from_native"),
            format!("swab_runtime::convert::{name}_to_native"),
        )
    }

    fn aggregate(view: String) -> Self {
        HostConv::new(
            view.clone(),
            format!("swab_runtime::aggregate_from_native::<{view}>"),
            format!("swab_runtime::aggregate_to_native::<{view}>"),
        )
    }

    fn with_host(mut self, host_type: &str) -> Self {
        self.host_type = host_type.to_string();
        self.param_type = host_type.to_string();
        self
    }

    fn string() -> Self {
        HostConv {
            host_type: "String".to_string(),
            param_type: "&str".to_string(),
            to_host: "swab_runtime::convert::string_from_native".to_string(),
            to_native: "swab_runtime::convert::string_to_native".to_string(),
            to_native_param: "swab_runtime::convert::str_to_native".to_string(),
            allocates: true,
        }
    }
}

/// Host conversion for `ty` (resolved), generating whatever it needs.
///
/// Named items are registered before they are generated, so a type that
/// reaches itself through a pointer gets the cached entry on the way back.
pub fn host_conv(ctx: &mut GenContext, ty: &CType) -> HostConv {
    let key = ty.structural_key();
    if let Some(conv) = ctx.convs.get(&key) {
        return conv.clone();
    }

    match &ty.kind {
        CKind::Void | CKind::User { .. } => cache(ctx, key, HostConv::primitive("unit").with_host("()")),
        CKind::Enum { .. } => {
            let name = enums::reserve(ctx, ty);
            let conv = HostConv::new(
                name.clone(),
                format!("{name}::from_native"),
                format!("{name}::to_native"),
            );
            cache(ctx, key, conv.clone());
            enums::emit(ctx, ty, &name);
            conv
        }
        CKind::FunctionPointer { .. } => {
            let name = callbacks::reserve(ctx, ty);
            let conv = HostConv::new(
                name.clone(),
                format!("{name}::from_native"),
                format!("{name}::to_native"),
            );
            cache(ctx, key, conv.clone());
            callbacks::emit(ctx, ty, &name);
            conv
        }
        CKind::Struct { .. } | CKind::Union { .. } => {
            let base = views::view_base(ctx, ty);
            let conv = cache(ctx, key, HostConv::aggregate(format!("{base}Value")));
            views::emit_value_view(ctx, ty);
            conv
        }
        CKind::Pointer { to } => {
            let target = ctx.resolve(to);
            match target.kind {
                CKind::Char => cache(ctx, key, HostConv::string()),
                CKind::Struct { .. } | CKind::Union { .. } => {
                    let base = views::view_base(ctx, &target);
                    let conv = cache(ctx, key, HostConv::aggregate(format!("{base}Ptr")));
                    views::emit_pointer_view(ctx, ty, &target);
                    conv
                }
                _ => {
                    let conv = typed_pointer(ctx, &target);
                    cache(ctx, key, conv)
                }
            }
        }
        CKind::Array { of, length } => {
            let elem = ctx.resolve(of);
            let conv = array(ctx, &elem, *length);
            cache(ctx, key, conv)
        }
        kind => cache(ctx, key, HostConv::primitive(leaf_name(kind))),
    }
}

fn cache(ctx: &mut GenContext, key: String, conv: HostConv) -> HostConv {
    ctx.convs.insert(key, conv.clone());
    conv
}

/// Conversion of the element a typed pointer points to. Void elements are
/// read as bytes.
fn element_conv(ctx: &mut GenContext, elem: &CType) -> HostConv {
    if elem.is_void() {
        HostConv::primitive("u8")
    } else {
        host_conv(ctx, elem)
    }
}

fn typed_pointer(ctx: &mut GenContext, target: &CType) -> HostConv {
    let layout = layout_fn(ctx, target);
    let elem = element_conv(ctx, target).host_type;
    let pointer = format!("swab_runtime::WasmPointer<{elem}>");
    let to_host = ctx.gensym("to_host");
    ctx.rust_out.push_str(&format!(
        "fn {to_host}(rt: {RT}, raw: swab_runtime::Val) -> swab_runtime::SwabResult<{pointer}> {{\n    \
         let address = swab_runtime::address_from_native(raw)?;\n    \
         Ok(swab_runtime::WasmPointer::new(address, {layout}(rt)?))\n}}\n\n"
    ));
    HostConv::new(
        pointer,
        to_host,
        format!("swab_runtime::pointer_to_native::<{elem}>"),
    )
}

fn array(ctx: &mut GenContext, elem: &CType, length: u32) -> HostConv {
    let layout = layout_fn(ctx, elem);
    let elem = element_conv(ctx, elem).host_type;
    let to_host = ctx.gensym("to_host");
    let to_native = ctx.gensym("to_native");
    ctx.rust_out.push_str(&format!(
        "fn {to_host}(rt: {RT}, raw: swab_runtime::Val) -> swab_runtime::SwabResult<Vec<{elem}>> {{\n    \
         let address = swab_runtime::address_from_native(raw)?;\n    \
         let layout = {layout}(rt)?;\n    \
         swab_runtime::WasmPointer::new(address, layout).read_array(rt, {length})\n}}\n\n"
    ));
    ctx.rust_out.push_str(&format!(
        "fn {to_native}(rt: {RT}, value: Vec<{elem}>) -> swab_runtime::SwabResult<swab_runtime::Val> {{\n    \
         let layout = {layout}(rt)?;\n    \
         swab_runtime::array_to_native(rt, layout, {length}, value)\n}}\n\n"
    ));
    let mut conv = HostConv::new(format!("Vec<{elem}>"), to_host, to_native);
    conv.allocates = true;
    conv
}

// ---------------------------------------------------------------------------
// Element layouts
// ---------------------------------------------------------------------------

/// Name of a generated `fn(rt) -> SwabResult<ElementLayout<H>>` describing
/// how one `elem` is stored in native memory.
pub fn layout_fn(ctx: &mut GenContext, elem: &CType) -> String {
    let key = elem.structural_key();
    if let Some(name) = ctx.layouts.get(&key) {
        return name.clone();
    }
    let name = ctx.gensym("layout");
    ctx.layouts.insert(key, name.clone());

    let (size, tag) = match &elem.kind {
        CKind::Bool => ("1".to_string(), "Bool".to_string()),
        CKind::Char => ("1".to_string(), "Char".to_string()),
        CKind::U8 => ("1".to_string(), "U8".to_string()),
        CKind::I8 => ("1".to_string(), "I8".to_string()),
        CKind::U16 => ("2".to_string(), "U16".to_string()),
        CKind::I16 => ("2".to_string(), "I16".to_string()),
        CKind::U32 => ("4".to_string(), "U32".to_string()),
        CKind::I32 | CKind::Enum { .. } => ("4".to_string(), "I32".to_string()),
        CKind::U64 => ("8".to_string(), "U64".to_string()),
        CKind::I64 => ("8".to_string(), "I64".to_string()),
        CKind::F32 => ("4".to_string(), "F32".to_string()),
        CKind::F64 => ("8".to_string(), "F64".to_string()),
        CKind::Pointer { .. } | CKind::FunctionPointer { .. } => {
            (swab_abi::POINTER_SIZE.to_string(), "Pointer".to_string())
        }
        CKind::Struct { .. } | CKind::Union { .. } | CKind::Array { .. } => {
            let copy = get_copy(ctx, elem);
            let size = match get_sizeof(ctx, elem) {
                Some(symbol) => format!("rt.size_of({symbol:?})?"),
                None => "1".to_string(),
            };
            let variant = if elem.is_aggregate() { "Aggregate" } else { "Array" };
            (size, format!("{variant} {{ copy: {copy:?} }}"))
        }
        CKind::Void | CKind::User { .. } => ("1".to_string(), "U8".to_string()),
    };
    let conv = element_conv(ctx, elem);
    let rt = if size.contains("rt.") { "rt" } else { "_rt" };

    ctx.rust_out.push_str(&format!(
        "fn {name}({rt}: {RT}) -> swab_runtime::SwabResult<swab_runtime::ElementLayout<{host}>> {{\n    \
         Ok(swab_runtime::ElementLayout {{\n        \
         size: {size},\n        \
         tag: swab_runtime::ElementTag::{tag},\n        \
         from_native: {from},\n        \
         to_native: {to},\n    \
         }})\n}}\n\n",
        host = conv.host_type,
        from = conv.to_host,
        to = conv.to_native,
    ));
    name
}
