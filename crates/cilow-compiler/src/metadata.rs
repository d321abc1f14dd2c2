//! Metadata references and the compilation-unit description.
//!
//! IL operands name types, fields, methods and user strings through
//! 32-bit tokens. A [`MetadataResolver`] turns those tokens into typed
//! references; [`TokenTable`] is the serializable implementation used by
//! the CLI and tests.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use cilow_asm::SyncMode;

use crate::constant::Constant;
use crate::types::Type;

fn void() -> Type {
    Type::Void
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct MethodRef {
    pub declaring: Type,
    pub name: String,
    #[serde(default)]
    pub params: Vec<Type>,
    #[serde(default = "void")]
    pub ret: Type,
    #[serde(default)]
    pub is_static: bool,
}

impl MethodRef {
    pub fn new(declaring: Type, name: impl Into<String>) -> Self {
        Self {
            declaring,
            name: name.into(),
            params: Vec::new(),
            ret: Type::Void,
            is_static: false,
        }
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Type>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    pub fn returns(mut self, ret: Type) -> Self {
        self.ret = ret;
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn is_ctor(&self) -> bool {
        self.name == ".ctor"
    }

    pub fn has_return(&self) -> bool {
        !self.ret.is_void()
    }

    /// Number of values consumed from the stack, including the instance.
    pub fn stack_arity(&self) -> usize {
        self.params.len() + usize::from(!self.is_static)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.declaring, self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FieldRef {
    pub declaring: Type,
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub is_static: bool,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.name)
    }
}

/// What a metadata token resolves to.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Member {
    Type { ty: Type },
    Field(FieldRef),
    Method(MethodRef),
    String { value: String },
}

impl Member {
    pub fn kind(&self) -> &'static str {
        match self {
            Member::Type { .. } => "type",
            Member::Field(_) => "field",
            Member::Method(_) => "method",
            Member::String { .. } => "string",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("unknown metadata token 0x{0:08X}")]
    UnknownToken(u32),
    #[error("token 0x{token:08X} is a {found}, expected a {expected}")]
    WrongKind {
        token: u32,
        found: &'static str,
        expected: &'static str,
    },
}

/// Resolves metadata tokens found in IL operands.
pub trait MetadataResolver {
    fn resolve(&self, token: u32) -> Result<Member, MetadataError>;
}

impl<T: MetadataResolver + ?Sized> MetadataResolver for &T {
    fn resolve(&self, token: u32) -> Result<Member, MetadataError> {
        (**self).resolve(token)
    }
}

/// Token map loaded alongside a unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenTable {
    tokens: IndexMap<u32, Member>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: u32, member: Member) {
        self.tokens.insert(token, member);
    }

    pub fn with(mut self, token: u32, member: Member) -> Self {
        self.insert(token, member);
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl MetadataResolver for TokenTable {
    fn resolve(&self, token: u32) -> Result<Member, MetadataError> {
        self.tokens
            .get(&token)
            .cloned()
            .ok_or(MetadataError::UnknownToken(token))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocalDef {
    #[serde(default)]
    pub name: Option<String>,
    pub ty: Type,
}

/// One method of a unit: its signature, locals and raw IL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodBody {
    pub method: MethodRef,
    #[serde(default)]
    pub locals: Vec<LocalDef>,
    #[serde(with = "hex_bytes")]
    pub code: Vec<u8>,
    /// Exported methods are callable by the host by name.
    #[serde(default)]
    pub export: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub init: Option<Constant>,
    #[serde(default)]
    pub export: bool,
    #[serde(default)]
    pub sync: Option<SyncMode>,
}

/// A compilation unit: one behaviour type with its fields and methods.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<MethodBody>,
}

impl UnitDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn self_type(&self) -> Type {
        Type::Behaviour(self.name.clone())
    }

    /// Types that refer to this unit's own instance.
    pub fn is_self_type(&self, ty: &Type) -> bool {
        match ty {
            Type::Behaviour(name) | Type::Class(name) => *name == self.name,
            _ => false,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodBody> {
        self.methods.iter().find(|m| m.method.name == name)
    }
}

/// IL bytes travel as a hex string in unit files.
mod hex_bytes {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        let text: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.len() % 2 != 0 {
            return Err(D::Error::custom("odd number of hex digits"));
        }
        digits
            .chunks(2)
            .map(|pair| {
                let hi = pair[0].to_digit(16);
                let lo = pair[1].to_digit(16);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => Ok((hi * 16 + lo) as u8),
                    _ => Err(D::Error::custom(format!(
                        "invalid hex digit in `{}{}`",
                        pair[0], pair[1]
                    ))),
                }
            })
            .collect()
    }
}
