// Rust host glue generation.
//
// Everything lands in one file meant to be `include!`d by the consumer.
// Item order does not matter to Rust, so generators append whole items as
// they finish and may recurse into each other freely.

pub mod callbacks;
pub mod convert;
pub mod enums;
pub mod functions;
pub mod views;

use crate::context::GenContext;

/// Parameter type every generated function takes its runtime as.
pub const RT: &str = "&mut dyn swab_runtime::Native";

pub fn emit_preamble(ctx: &mut GenContext, wasm_binary: &str) {
    let out = &mut ctx.rust_out;
    out.push_str("// Generated by swab-codegen. Do not edit.\n\n");
    out.push_str("/// Native module these bindings were generated for.\n");
    out.push_str(&format!("pub const WASM_BINARY: &str = {wasm_binary:?};\n\n"));
    out.push_str("/// Load [`WASM_BINARY`] into this thread's runtime.\n");
    out.push_str("pub fn load() -> swab_runtime::SwabResult<()> {\n");
    out.push_str("    swab_runtime::load(WASM_BINARY, swab_runtime::LoadOptions::default())\n");
    out.push_str("}\n\n");
}

/// `swab_runtime::Val` carrying a 32-bit address held in `expr`.
pub(crate) fn address_val(expr: &str) -> String {
    format!("swab_runtime::Val::I32({expr} as i32)")
}

// ---------------------------------------------------------------------------
// Native calls
// ---------------------------------------------------------------------------

pub(crate) enum Callee {
    /// Exported symbol.
    Export(String),
    /// Table slot held in a local.
    Slot(String),
}

pub(crate) enum Arg {
    /// Expression that already evaluates to a `swab_runtime::Val`.
    Raw(String),
    /// Host value converted with `to_native`, then optionally recorded as a
    /// temporary of the call or replaced by a wide handle.
    Host {
        value: String,
        to_native: String,
        temp: bool,
        wide: bool,
    },
}

pub(crate) enum Returns {
    Void,
    Value {
        to_host: String,
        wide: bool,
        /// Sizeof export reported when a null result means allocation failed.
        non_null: Option<String>,
    },
}

/// One native call and the conversions around it.
pub(crate) struct CallPlan {
    pub callee: Callee,
    pub args: Vec<Arg>,
    pub returns: Returns,
}

impl CallPlan {
    /// Function body performing the call, indented by `indent` spaces.
    pub fn render(&self, indent: usize) -> String {
        let scoped = self.args.iter().any(|arg| {
            matches!(arg, Arg::Host { temp, wide, .. } if *temp || *wide)
        });
        let inner = if scoped { indent + 4 } else { indent };
        let pad = " ".repeat(inner);

        let mut lines = Vec::new();
        let mut vals = Vec::new();
        for (i, arg) in self.args.iter().enumerate() {
            match arg {
                Arg::Raw(expr) => vals.push(expr.clone()),
                Arg::Host {
                    value,
                    to_native,
                    temp,
                    wide,
                } => {
                    let local = format!("arg{i}");
                    lines.push(format!("let {local} = {to_native}(rt, {value})?;"));
                    if *temp {
                        lines.push(format!("let {local} = frame.temp({local})?;"));
                    }
                    if *wide {
                        lines.push(format!("let {local} = frame.wide(rt, {local})?;"));
                    }
                    vals.push(local);
                }
            }
        }

        let vals = vals.join(", ");
        let call = match &self.callee {
            Callee::Export(symbol) => format!("rt.call({symbol:?}, &[{vals}])?"),
            Callee::Slot(slot) => format!("rt.call_indirect({slot}, &[{vals}])?"),
        };
        match &self.returns {
            Returns::Void => {
                lines.push(format!("{call};"));
                lines.push("Ok(())".to_string());
            }
            Returns::Value {
                to_host,
                wide,
                non_null,
            } => {
                lines.push(format!("let raw = swab_runtime::expect_value({call})?;"));
                if *wide {
                    lines.push("let raw = swab_runtime::wide_from_native(rt, raw)?;".to_string());
                }
                if let Some(sizeof) = non_null {
                    lines.push(format!(
                        "let raw = swab_runtime::non_null(raw, rt.size_of({sizeof:?})?)?;"
                    ));
                }
                lines.push(format!("{to_host}(rt, raw)"));
            }
        }

        let mut body = String::new();
        let outer = " ".repeat(indent);
        if scoped {
            body.push_str(&format!(
                "{outer}swab_runtime::CallFrame::scope(rt, |rt, frame| {{\n"
            ));
        }
        for line in lines {
            body.push_str(&pad);
            body.push_str(&line);
            body.push('\n');
        }
        if scoped {
            body.push_str(&format!("{outer}}})\n"));
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_call() {
        let plan = CallPlan {
            callee: Callee::Export("add".to_string()),
            args: vec![Arg::Host {
                value: "a0".to_string(),
                to_native: "swab_runtime::convert::i32_to_native".to_string(),
                temp: false,
                wide: false,
            }],
            returns: Returns::Value {
                to_host: "swab_runtime::convert::i32_from_native".to_string(),
                wide: false,
                non_null: None,
            },
        };
        assert_eq!(
            plan.render(4),
            "    let arg0 = swab_runtime::convert::i32_to_native(rt, a0)?;\n\
             \x20   let raw = swab_runtime::expect_value(rt.call(\"add\", &[arg0])?)?;\n\
             \x20   swab_runtime::convert::i32_from_native(rt, raw)\n"
        );
    }

    #[test]
    fn test_scoped_call() {
        let plan = CallPlan {
            callee: Callee::Slot("slot".to_string()),
            args: vec![
                Arg::Raw(address_val("self.address")),
                Arg::Host {
                    value: "a1".to_string(),
                    to_native: "swab_runtime::convert::i64_to_native".to_string(),
                    temp: false,
                    wide: true,
                },
            ],
            returns: Returns::Void,
        };
        let body = plan.render(4);
        assert!(body.starts_with("    swab_runtime::CallFrame::scope(rt, |rt, frame| {\n"));
        assert!(body.contains("        let arg1 = frame.wide(rt, arg1)?;\n"));
        assert!(body.contains(
            "rt.call_indirect(slot, &[swab_runtime::Val::I32(self.address as i32), arg1])?;"
        ));
        assert!(body.ends_with("        Ok(())\n    })\n"));
    }
}
