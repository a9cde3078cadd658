// Generation context: output buffers, symbol sets and the per-type caches
// that keep every artifact emitted once per structural key.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use swab_abi::Signature;

use crate::c_gen::accessors::AccessorSet;
use crate::c_gen::lifecycle::Lifecycle;
use crate::ctype::{CKind, CType, SubstitutionTable};
use crate::error::{Diagnostic, DiagnosticKind};
use crate::rust_gen::convert::HostConv;
use crate::rust_gen::views::ViewNames;

/// Central state for one generation run.
pub struct GenContext {
    pub table: SubstitutionTable,

    /// Native C source.
    pub c_out: String,
    /// Host Rust source.
    pub rust_out: String,
    /// Symbols the native module must import, in first-use order.
    pub imports: IndexSet<String>,
    /// Symbols the native module must export, in first-use order.
    pub exports: IndexSet<String>,
    pub diagnostics: Vec<Diagnostic>,

    counter: u32,

    pub(crate) sizeofs: HashMap<String, String>,
    pub(crate) accessors: HashMap<String, AccessorSet>,
    pub(crate) lifecycles: HashMap<String, Lifecycle>,
    pub(crate) copies: HashMap<String, String>,
    /// C function name -> adapter name.
    pub(crate) wrappers: HashMap<String, String>,

    pub(crate) convs: HashMap<String, HostConv>,
    pub(crate) layouts: HashMap<String, String>,
    pub(crate) views: HashMap<String, ViewNames>,
    pub(crate) trampolines: HashMap<Signature, String>,

    /// Rust item names already taken at module level.
    rust_names: HashSet<String>,
    unresolved: HashSet<String>,
}

impl GenContext {
    pub fn new(table: SubstitutionTable) -> Self {
        GenContext {
            table,
            c_out: String::with_capacity(16 * 1024),
            rust_out: String::with_capacity(32 * 1024),
            imports: IndexSet::new(),
            exports: IndexSet::new(),
            diagnostics: Vec::new(),
            counter: 0,
            sizeofs: HashMap::new(),
            accessors: HashMap::new(),
            lifecycles: HashMap::new(),
            copies: HashMap::new(),
            wrappers: HashMap::new(),
            convs: HashMap::new(),
            layouts: HashMap::new(),
            views: HashMap::new(),
            trampolines: HashMap::new(),
            rust_names: HashSet::new(),
            unresolved: HashSet::new(),
        }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.counter;
        self.counter += 1;
        id
    }

    /// Fresh identifier `__{base}_{n}`. One counter per run.
    pub fn gensym(&mut self, base: &str) -> String {
        let id = self.next_id();
        format!("__{base}_{id}")
    }

    pub fn import(&mut self, symbol: &str) {
        self.imports.insert(symbol.to_string());
    }

    pub fn export(&mut self, symbol: &str) {
        self.exports.insert(symbol.to_string());
    }

    pub fn diagnose(&mut self, kind: DiagnosticKind, message: String) {
        let diagnostic = Diagnostic { kind, message };
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    /// Claim a module-level Rust item name, suffixing it if already taken.
    pub fn claim_rust_name(&mut self, base: &str) -> String {
        if self.rust_names.insert(base.to_string()) {
            return base.to_string();
        }
        loop {
            let candidate = format!("{base}_{}", self.next_id());
            if self.rust_names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Like [`claim_rust_name`](Self::claim_rust_name) for a type whose
    /// name is used with each of `suffixes` appended.
    pub fn claim_rust_type(&mut self, base: &str, suffixes: &[&str]) -> String {
        let mut candidate = base.to_string();
        loop {
            let free = suffixes
                .iter()
                .all(|s| !self.rust_names.contains(&format!("{candidate}{s}")));
            if free {
                for s in suffixes {
                    self.rust_names.insert(format!("{candidate}{s}"));
                }
                return candidate;
            }
            candidate = format!("{base}{}", self.next_id());
        }
    }

    /// Bring `ty` to a substituted form.
    ///
    /// Types already substituted pass through untouched, so their
    /// structural keys stay stable; written forms and `user` names are
    /// substituted, following alias chains.
    pub fn resolve(&mut self, ty: &CType) -> CType {
        let mut current = if ty.orig.is_none() || matches!(ty.kind, CKind::User { .. }) {
            self.substitute_once(ty)
        } else {
            ty.clone()
        };
        let mut hops = 0;
        while let CKind::User { name } = &current.kind {
            if hops > self.table.len() {
                let name = name.clone();
                self.diagnose(
                    DiagnosticKind::Unresolved,
                    format!("type alias cycle through `{name}`, using void"),
                );
                return CType {
                    kind: CKind::Void,
                    orig: current.orig,
                };
            }
            current = self.substitute_once(&current);
            hops += 1;
        }
        current
    }

    fn substitute_once(&mut self, ty: &CType) -> CType {
        // Substitution visits exactly the `user` nodes of the written tree.
        let mut names = Vec::new();
        ty.user_names(&mut names);
        for name in names {
            if !self.table.contains(name) && self.unresolved.insert(name.to_string()) {
                self.diagnose(
                    DiagnosticKind::Unresolved,
                    format!("unknown type `{name}`, using void"),
                );
            }
        }
        self.table.substitute(ty)
    }
}
