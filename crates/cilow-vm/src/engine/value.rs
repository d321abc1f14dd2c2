//! Heap values.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use cilow_asm::Literal;

/// VM type name of behaviour instances.
pub const BEHAVIOUR_TYPE: &str = "VRCUdonUdonBehaviour";

/// Numeric and character types the built-in externs compute with.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NumTy {
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
}

impl NumTy {
    pub fn from_vm_name(name: &str) -> Option<NumTy> {
        Some(match name {
            "SystemBoolean" => NumTy::Boolean,
            "SystemChar" => NumTy::Char,
            "SystemSByte" => NumTy::SByte,
            "SystemByte" => NumTy::Byte,
            "SystemInt16" => NumTy::Int16,
            "SystemUInt16" => NumTy::UInt16,
            "SystemInt32" => NumTy::Int32,
            "SystemUInt32" => NumTy::UInt32,
            "SystemInt64" => NumTy::Int64,
            "SystemUInt64" => NumTy::UInt64,
            "SystemSingle" => NumTy::Single,
            "SystemDouble" => NumTy::Double,
            _ => return None,
        })
    }

    /// `Convert.ToX` member suffix, e.g. `Int32`.
    pub fn from_short_name(name: &str) -> Option<NumTy> {
        NumTy::from_vm_name(&format!("System{name}"))
    }

    /// `System.Int32` and so on; variant names match the managed names.
    pub fn full_name(self) -> String {
        format!("System.{self:?}")
    }

    pub fn is_floating(self) -> bool {
        matches!(self, NumTy::Single | NumTy::Double)
    }

    /// Bits that take part in a shift count.
    pub fn shift_mask(self) -> u32 {
        match self {
            NumTy::Int64 | NumTy::UInt64 => 63,
            _ => 31,
        }
    }

    /// Wrap an integer into this type, two's-complement style.
    pub fn wrap(self, v: i128) -> Value {
        match self {
            NumTy::Boolean => Value::Bool(v != 0),
            NumTy::Char => Value::Char(char::from_u32(v as u16 as u32).unwrap_or('\u{FFFD}')),
            NumTy::SByte => Value::SByte(v as i8),
            NumTy::Byte => Value::Byte(v as u8),
            NumTy::Int16 => Value::Int16(v as i16),
            NumTy::UInt16 => Value::UInt16(v as u16),
            NumTy::Int32 => Value::Int32(v as i32),
            NumTy::UInt32 => Value::UInt32(v as u32),
            NumTy::Int64 => Value::Int64(v as i64),
            NumTy::UInt64 => Value::UInt64(v as u64),
            NumTy::Single => Value::Single(v as f32),
            NumTy::Double => Value::Double(v as f64),
        }
    }

    pub fn from_f64(self, v: f64) -> Value {
        match self {
            NumTy::Single => Value::Single(v as f32),
            NumTy::Double => Value::Double(v),
            NumTy::Boolean => Value::Bool(v != 0.0),
            // Saturating cast, then wrap like an integer conversion.
            other => other.wrap(v.trunc() as i128),
        }
    }

    pub fn default_value(self) -> Value {
        self.wrap(0)
    }
}

/// Shared, mutable array storage; arrays have reference semantics.
#[derive(Clone, Debug)]
pub struct ArrayRef(Rc<RefCell<ArrayData>>);

#[derive(Clone, Debug)]
pub struct ArrayData {
    /// VM type name of the elements.
    pub elem: String,
    pub items: Vec<Value>,
}

impl ArrayRef {
    pub fn new(elem: impl Into<String>, items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(ArrayData {
            elem: elem.into(),
            items,
        })))
    }

    /// Array of `len` default values of `elem`.
    pub fn filled(elem: &str, len: usize) -> Self {
        let fill = Value::default_for(elem);
        Self::new(elem, vec![fill; len])
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn elem(&self) -> String {
        self.0.borrow().elem.clone()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().items.get(index).cloned()
    }

    /// Returns `false` when `index` is out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.borrow_mut().items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }

    pub fn same(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    /// A `System.Type`, by full name.
    Type(String),
    /// The running behaviour.
    Behaviour,
    /// Opaque host object, by VM type name.
    Handle(String),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    /// Zero value of a VM type; reference types default to null.
    pub fn default_for(type_name: &str) -> Value {
        match NumTy::from_vm_name(type_name) {
            Some(ty) => ty.default_value(),
            None => Value::Null,
        }
    }

    /// Initial heap value of a data entry.
    pub fn from_literal(type_name: &str, literal: &Literal) -> Value {
        let ty = NumTy::from_vm_name(type_name);
        match literal {
            Literal::Null => Value::Null,
            Literal::This if type_name == BEHAVIOUR_TYPE => Value::Behaviour,
            Literal::This => Value::Handle(type_name.to_string()),
            Literal::Bool(b) => match ty {
                Some(ty) => ty.wrap(i128::from(*b)),
                None => Value::Bool(*b),
            },
            Literal::Int(n) => ty.unwrap_or(NumTy::Int32).wrap(i128::from(*n)),
            Literal::UInt(n) => ty.unwrap_or(NumTy::UInt32).wrap(i128::from(*n)),
            Literal::Address(a) => ty.unwrap_or(NumTy::UInt32).wrap(i128::from(*a)),
            Literal::Float(x) => ty.unwrap_or(NumTy::Double).from_f64(*x),
            Literal::Char(c) => match ty {
                Some(NumTy::Char) | None => Value::Char(*c),
                Some(ty) => ty.wrap(i128::from(u32::from(*c))),
            },
            Literal::Str(s) => Value::str(s),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn num_ty(&self) -> Option<NumTy> {
        Some(match self {
            Value::Bool(_) => NumTy::Boolean,
            Value::Char(_) => NumTy::Char,
            Value::SByte(_) => NumTy::SByte,
            Value::Byte(_) => NumTy::Byte,
            Value::Int16(_) => NumTy::Int16,
            Value::UInt16(_) => NumTy::UInt16,
            Value::Int32(_) => NumTy::Int32,
            Value::UInt32(_) => NumTy::UInt32,
            Value::Int64(_) => NumTy::Int64,
            Value::UInt64(_) => NumTy::UInt64,
            Value::Single(_) => NumTy::Single,
            Value::Double(_) => NumTy::Double,
            _ => return None,
        })
    }

    /// Integral reading of any integer, char or bool.
    pub fn as_int(&self) -> Option<i128> {
        Some(match *self {
            Value::Bool(b) => i128::from(b),
            Value::Char(c) => i128::from(u32::from(c)),
            Value::SByte(v) => i128::from(v),
            Value::Byte(v) => i128::from(v),
            Value::Int16(v) => i128::from(v),
            Value::UInt16(v) => i128::from(v),
            Value::Int32(v) => i128::from(v),
            Value::UInt32(v) => i128::from(v),
            Value::Int64(v) => i128::from(v),
            Value::UInt64(v) => i128::from(v),
            _ => return None,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Single(v) => Some(f64::from(v)),
            Value::Double(v) => Some(v),
            _ => self.as_int().map(|v| v as f64),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Managed full name of the value's runtime type.
    pub fn type_full_name(&self) -> String {
        match self {
            Value::Null => "System.Object".into(),
            Value::Str(_) => "System.String".into(),
            Value::Array(a) => format!("{}[]", full_name(&a.elem())),
            Value::Type(_) => "System.Type".into(),
            Value::Behaviour => "VRC.Udon.UdonBehaviour".into(),
            Value::Handle(ty) => full_name(ty),
            other => match other.num_ty() {
                Some(ty) => ty.full_name(),
                None => "System.Object".into(),
            },
        }
    }

    /// Identity: same array, same behaviour, same host object, or both null.
    /// Strings compare by content, as interned literals would.
    pub fn same_ref(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Behaviour, Value::Behaviour) => true,
            (Value::Array(a), Value::Array(b)) => a.same(b),
            (Value::Handle(a), Value::Handle(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }

    /// `object.Equals`: same runtime type and value, or same reference.
    pub fn equals(&self, other: &Value) -> bool {
        match (self.num_ty(), other.num_ty()) {
            (Some(a), Some(b)) if a == b => match a {
                NumTy::Single | NumTy::Double => self.as_f64() == other.as_f64(),
                _ => self.as_int() == other.as_int(),
            },
            (Some(_), _) | (_, Some(_)) => false,
            _ => self.same_ref(other),
        }
    }

    pub fn hash_code(&self) -> i32 {
        match self {
            Value::Str(s) => s
                .bytes()
                .fold(17i32, |h, b| h.wrapping_mul(31).wrapping_add(i32::from(b))),
            other => match other.as_int() {
                Some(v) => v as i32,
                None => other.as_f64().map(|f| f.to_bits() as i32).unwrap_or(0),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.equals(other)
    }
}

/// Managed full name for a VM type name, where known.
pub fn full_name(vm_name: &str) -> String {
    if let Some(elem) = vm_name.strip_suffix("Array") {
        return format!("{}[]", full_name(elem));
    }
    if let Some(rest) = vm_name.strip_prefix("UnityEngine") {
        return format!("UnityEngine.{rest}");
    }
    if let Some(rest) = vm_name.strip_prefix("System") {
        return format!("System.{rest}");
    }
    vm_name.to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::SByte(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Single(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(a) => {
                f.write_str("[")?;
                for (i, item) in a.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Type(name) => write!(f, "typeof({name})"),
            Value::Behaviour => f.write_str("this"),
            Value::Handle(ty) => write!(f, "<{ty}>"),
        }
    }
}
