//! Static types of IL values and their target VM names.

use std::fmt;

use serde::{Deserialize, Serialize};

use cilow_core::mangle_type_name;

/// Target VM type name for behaviour instances.
pub const BEHAVIOUR_VM_TYPE: &str = "VRCUdonUdonBehaviour";

/// Static type of a value flowing through the evaluation stack.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Type {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    Object,
    SystemType,
    Array(Box<Type>),
    Class(String),
    Struct(String),
    Enum { name: String, underlying: Box<Type> },
    /// Delegate types are lowered to invocation-list arrays.
    Delegate(String),
    /// A script behaviour type, compiled as its own unit.
    Behaviour(String),
}

impl Type {
    pub fn array_of(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn object_array() -> Type {
        Type::array_of(Type::Object)
    }

    /// Full managed name, e.g. `System.Int32` or `UnityEngine.Vector3[]`.
    pub fn full_name(&self) -> String {
        match self {
            Type::Void => "System.Void".into(),
            Type::Boolean => "System.Boolean".into(),
            Type::Char => "System.Char".into(),
            Type::SByte => "System.SByte".into(),
            Type::Byte => "System.Byte".into(),
            Type::Int16 => "System.Int16".into(),
            Type::UInt16 => "System.UInt16".into(),
            Type::Int32 => "System.Int32".into(),
            Type::UInt32 => "System.UInt32".into(),
            Type::Int64 => "System.Int64".into(),
            Type::UInt64 => "System.UInt64".into(),
            Type::Single => "System.Single".into(),
            Type::Double => "System.Double".into(),
            Type::String => "System.String".into(),
            Type::Object => "System.Object".into(),
            Type::SystemType => "System.Type".into(),
            Type::Array(elem) => format!("{}[]", elem.full_name()),
            Type::Class(name)
            | Type::Struct(name)
            | Type::Enum { name, .. }
            | Type::Delegate(name)
            | Type::Behaviour(name) => name.clone(),
        }
    }

    /// Target VM type name used in the data section and extern identifiers.
    pub fn vm_name(&self) -> String {
        match self {
            Type::Array(elem) => format!("{}Array", elem.vm_name()),
            t if t.is_delegate() => "SystemObjectArray".into(),
            Type::Behaviour(_) => BEHAVIOUR_VM_TYPE.into(),
            _ => mangle_type_name(&self.full_name()),
        }
    }

    /// Parse a full managed name of a primitive, falling back to a class.
    pub fn from_full_name(name: &str) -> Type {
        if let Some(elem) = name.strip_suffix("[]") {
            return Type::array_of(Type::from_full_name(elem));
        }
        match name {
            "System.Void" => Type::Void,
            "System.Boolean" => Type::Boolean,
            "System.Char" => Type::Char,
            "System.SByte" => Type::SByte,
            "System.Byte" => Type::Byte,
            "System.Int16" => Type::Int16,
            "System.UInt16" => Type::UInt16,
            "System.Int32" => Type::Int32,
            "System.UInt32" => Type::UInt32,
            "System.Int64" => Type::Int64,
            "System.UInt64" => Type::UInt64,
            "System.Single" => Type::Single,
            "System.Double" => Type::Double,
            "System.String" => Type::String,
            "System.Object" => Type::Object,
            "System.Type" => Type::SystemType,
            other => Type::Class(other.to_string()),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Type::Char
                | Type::SByte
                | Type::Byte
                | Type::Int16
                | Type::UInt16
                | Type::Int32
                | Type::UInt32
                | Type::Int64
                | Type::UInt64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Single | Type::Double)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integral() || self.is_floating()
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            Type::Char | Type::Byte | Type::UInt16 | Type::UInt32 | Type::UInt64
        )
    }

    pub fn is_value_type(&self) -> bool {
        match self {
            Type::String
            | Type::Object
            | Type::SystemType
            | Type::Array(_)
            | Type::Class(_)
            | Type::Delegate(_)
            | Type::Behaviour(_)
            | Type::Void => false,
            _ => true,
        }
    }

    pub fn is_reference(&self) -> bool {
        !self.is_value_type() && !self.is_void()
    }

    pub fn is_delegate(&self) -> bool {
        matches!(self, Type::Delegate(_))
            || matches!(self, Type::Class(n) if n == "System.Delegate" || n == "System.MulticastDelegate")
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Enums behave as their underlying integral type on the stack.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Enum { underlying, .. } => underlying,
            other => other,
        }
    }

    /// Width in bits for integral types.
    pub fn bits(&self) -> Option<u32> {
        match self.underlying() {
            Type::SByte | Type::Byte => Some(8),
            Type::Int16 | Type::UInt16 | Type::Char => Some(16),
            Type::Int32 | Type::UInt32 => Some(32),
            Type::Int64 | Type::UInt64 => Some(64),
            _ => None,
        }
    }

    /// The type the IL evaluation stack widens this type to.
    pub fn stack_type(&self) -> Type {
        match self.underlying() {
            Type::Boolean
            | Type::Char
            | Type::SByte
            | Type::Byte
            | Type::Int16
            | Type::UInt16
            | Type::Int32 => Type::Int32,
            other => other.clone(),
        }
    }

    pub fn unsigned_counterpart(&self) -> Type {
        match self.underlying() {
            Type::SByte => Type::Byte,
            Type::Int16 => Type::UInt16,
            Type::Int32 => Type::UInt32,
            Type::Int64 => Type::UInt64,
            other => other.clone(),
        }
    }

    pub fn signed_counterpart(&self) -> Type {
        match self.underlying() {
            Type::Byte => Type::SByte,
            Type::UInt16 | Type::Char => Type::Int16,
            Type::UInt32 => Type::Int32,
            Type::UInt64 => Type::Int64,
            other => other.clone(),
        }
    }

    /// Binary numeric promotion for arithmetic on two stack values.
    ///
    /// Types narrower than 32 bits widen first; unsigned is kept only when
    /// both sides are unsigned of the same width.
    pub fn promote(a: &Type, b: &Type) -> Option<Type> {
        let a = a.stack_type();
        let b = b.stack_type();
        if !a.is_numeric() || !b.is_numeric() {
            return None;
        }
        if a == b {
            return Some(a);
        }
        let ty = if a == Type::Double || b == Type::Double {
            Type::Double
        } else if a == Type::Single || b == Type::Single {
            Type::Single
        } else if a.bits() == Some(64) || b.bits() == Some(64) {
            Type::Int64
        } else {
            Type::Int32
        };
        Some(ty)
    }

    /// Whether a value of type `from` can be stored into `self` without a
    /// representation change.
    pub fn is_assignable_from(&self, from: &Type) -> bool {
        if self == from {
            return true;
        }
        match (self, from) {
            (Type::Object, _) => !from.is_void(),
            (to, Type::Delegate(_)) if to.is_delegate() => true,
            (Type::Delegate(_), from) if from.is_delegate() => true,
            (Type::Enum { underlying, .. }, from) => underlying.as_ref() == from,
            (to, Type::Enum { underlying, .. }) => underlying.as_ref() == to,
            (Type::Class(name), from) if from.is_reference() => {
                name == "UnityEngine.Object" || name == "UnityEngine.Component"
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
