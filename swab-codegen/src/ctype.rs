// Native type model: the closed set of C shapes the generator understands,
// plus the one-shot name substitution that resolves typedef-style names.

use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;
use swab_abi::ValCategory;

/// A native type, optionally remembering the form it was written in
/// before substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct CType {
    pub kind: CKind,
    /// Pre-substitution form. Used for spelling the type in C and naming
    /// generated items; never part of the structural key.
    pub orig: Option<Rc<CType>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CKind {
    Bool,
    Char,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Pointer { to: Box<CType> },
    Array { of: Box<CType>, length: u32 },
    FunctionPointer { takes: Vec<CType>, returns: Box<CType> },
    Enum { values: IndexMap<String, i64> },
    Struct { fields: IndexMap<String, CType> },
    Union { fields: IndexMap<String, CType> },
    Void,
    User { name: String },
}

impl From<CKind> for CType {
    fn from(kind: CKind) -> Self {
        CType { kind, orig: None }
    }
}

impl CType {
    pub fn user(name: impl Into<String>) -> Self {
        CKind::User { name: name.into() }.into()
    }

    pub fn pointer(to: CType) -> Self {
        CKind::Pointer { to: Box::new(to) }.into()
    }

    pub fn array(of: CType, length: u32) -> Self {
        CKind::Array {
            of: Box::new(of),
            length,
        }
        .into()
    }

    pub fn void() -> Self {
        CKind::Void.into()
    }

    pub fn with_orig(mut self, orig: CType) -> Self {
        self.orig = Some(Rc::new(orig));
        self
    }

    /// The form this type was written in.
    pub fn unsubstituted(&self) -> &CType {
        match &self.orig {
            Some(orig) => orig,
            None => self,
        }
    }

    /// Canonical serialization ignoring `orig`. Structurally equal types
    /// share every generated artifact through this key.
    pub fn structural_key(&self) -> String {
        let mut out = String::new();
        self.write_key(&mut out);
        out
    }

    fn write_key(&self, out: &mut String) {
        match &self.kind {
            CKind::Pointer { to } => {
                out.push_str("ptr(");
                to.write_key(out);
                out.push(')');
            }
            CKind::Array { of, length } => {
                out.push_str("arr(");
                of.write_key(out);
                let _ = write!(out, ";{length})");
            }
            CKind::FunctionPointer { takes, returns } => {
                out.push_str("fn(");
                for (i, param) in takes.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    param.write_key(out);
                }
                out.push_str(")->");
                returns.write_key(out);
            }
            CKind::Enum { values } => {
                out.push_str("enum{");
                for (i, (name, value)) in values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{name}={value}");
                }
                out.push('}');
            }
            CKind::Struct { fields } | CKind::Union { fields } => {
                out.push_str(if matches!(self.kind, CKind::Struct { .. }) {
                    "struct{"
                } else {
                    "union{"
                });
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(name);
                    out.push(':');
                    ty.write_key(out);
                }
                out.push('}');
            }
            CKind::User { name } => {
                out.push_str("user:");
                out.push_str(name);
            }
            leaf => out.push_str(leaf_name(leaf)),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, CKind::Void)
    }

    /// 64-bit integers, which cross the boundary as wide handles.
    pub fn is_wide(&self) -> bool {
        matches!(self.kind, CKind::I64 | CKind::U64)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.kind, CKind::Struct { .. } | CKind::Union { .. })
    }

    pub fn fields(&self) -> Option<&IndexMap<String, CType>> {
        match &self.kind {
            CKind::Struct { fields } | CKind::Union { fields } => Some(fields),
            _ => None,
        }
    }

    /// Declared name of this type: the last whitespace-separated segment of
    /// the user name it was written as (`struct v` names `v`).
    pub fn declared_name(&self) -> Option<&str> {
        match &self.unsubstituted().kind {
            CKind::User { name } => name.split_whitespace().next_back(),
            _ => None,
        }
    }

    /// Core wasm category this type is carried as inside the module.
    /// `None` for void.
    pub fn val_category(&self) -> Option<ValCategory> {
        match self.kind {
            CKind::Void => None,
            CKind::I64 | CKind::U64 => Some(ValCategory::I64),
            CKind::F32 => Some(ValCategory::F32),
            CKind::F64 => Some(ValCategory::F64),
            _ => Some(ValCategory::I32),
        }
    }

    /// Collect every `user` name reachable in this type as written.
    pub fn user_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.kind {
            CKind::User { name } => out.push(name),
            CKind::Pointer { to } => to.user_names(out),
            CKind::Array { of, .. } => of.user_names(out),
            CKind::FunctionPointer { takes, returns } => {
                for param in takes {
                    param.user_names(out);
                }
                returns.user_names(out);
            }
            CKind::Struct { fields } | CKind::Union { fields } => {
                for ty in fields.values() {
                    ty.user_names(out);
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn leaf_name(kind: &CKind) -> &'static str {
    match kind {
        CKind::Bool => "bool",
        CKind::Char => "char",
        CKind::U8 => "u8",
        CKind::I8 => "i8",
        CKind::U16 => "u16",
        CKind::I16 => "i16",
        CKind::U32 => "u32",
        CKind::I32 => "i32",
        CKind::U64 => "u64",
        CKind::I64 => "i64",
        CKind::F32 => "f32",
        CKind::F64 => "f64",
        CKind::Void => "void",
        CKind::Pointer { .. } => "pointer",
        CKind::Array { .. } => "array",
        CKind::FunctionPointer { .. } => "functionPointer",
        CKind::Enum { .. } => "enum",
        CKind::Struct { .. } => "struct",
        CKind::Union { .. } => "union",
        CKind::User { .. } => "user",
    }
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Aliases for the wasm32 data model. `long` is 32 bits there.
const SEEDS: &[(&str, CKind)] = &[
    ("int8_t", CKind::I8),
    ("uint8_t", CKind::U8),
    ("signed char", CKind::I8),
    ("unsigned char", CKind::U8),
    ("short", CKind::I16),
    ("int16_t", CKind::I16),
    ("unsigned short", CKind::U16),
    ("uint16_t", CKind::U16),
    ("int", CKind::I32),
    ("int32_t", CKind::I32),
    ("unsigned int", CKind::U32),
    ("uint32_t", CKind::U32),
    ("size_t", CKind::U32),
    ("long", CKind::I32),
    ("unsigned long", CKind::U32),
    ("long long", CKind::I64),
    ("int64_t", CKind::I64),
    ("unsigned long long", CKind::U64),
    ("uint64_t", CKind::U64),
    ("float", CKind::F32),
    ("double", CKind::F64),
    ("_Bool", CKind::Bool),
    ("bool", CKind::Bool),
    ("char", CKind::Char),
    (swab_abi::WIDE_TYPEDEF, CKind::I32),
];

/// Name to type table consulted by [`SubstitutionTable::substitute`].
#[derive(Debug, Clone)]
pub struct SubstitutionTable {
    entries: IndexMap<String, CType>,
}

impl Default for SubstitutionTable {
    fn default() -> Self {
        let entries = SEEDS
            .iter()
            .map(|(name, kind)| (name.to_string(), CType::from(kind.clone())))
            .collect();
        SubstitutionTable { entries }
    }
}

impl SubstitutionTable {
    pub fn insert(&mut self, name: impl Into<String>, ty: CType) {
        self.entries.insert(name.into(), ty);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&CType> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `user` names in `ty`.
    ///
    /// Compound shapes are rebuilt with substituted children and tagged with
    /// the input as `orig`. A `user` node is replaced by its table entry,
    /// whose own children are left as written, so self-referential names
    /// terminate. Unknown names become `void`.
    pub fn substitute(&self, ty: &CType) -> CType {
        let orig = || ty.orig.clone().unwrap_or_else(|| Rc::new(ty.clone()));
        let kind = match &ty.kind {
            CKind::Pointer { to } => CKind::Pointer {
                to: Box::new(self.substitute(to)),
            },
            CKind::Array { of, length } => CKind::Array {
                of: Box::new(self.substitute(of)),
                length: *length,
            },
            CKind::FunctionPointer { takes, returns } => CKind::FunctionPointer {
                takes: takes.iter().map(|t| self.substitute(t)).collect(),
                returns: Box::new(self.substitute(returns)),
            },
            CKind::Struct { fields } => CKind::Struct {
                fields: self.substitute_fields(fields),
            },
            CKind::Union { fields } => CKind::Union {
                fields: self.substitute_fields(fields),
            },
            CKind::User { name } => {
                let found = self
                    .entries
                    .get(name)
                    .map(|entry| entry.kind.clone())
                    .unwrap_or(CKind::Void);
                return CType {
                    kind: found,
                    orig: Some(orig()),
                };
            }
            _ => return ty.clone(),
        };
        CType {
            kind,
            orig: Some(orig()),
        }
    }

    fn substitute_fields(&self, fields: &IndexMap<String, CType>) -> IndexMap<String, CType> {
        fields
            .iter()
            .map(|(name, ty)| (name.clone(), self.substitute(ty)))
            .collect()
    }
}
