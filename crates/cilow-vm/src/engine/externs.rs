//! Extern identifiers and the built-in extern library.
//!
//! An identifier reads `Owner.__member__P1_P2__Ret` (the parameter list is
//! omitted when empty). The VM implements the arithmetic, conversion, array
//! and object externs the compiler emits by itself; anything else must be
//! registered by the host.

use std::collections::HashMap;

use super::error::RuntimeError;
use super::value::{ArrayRef, NumTy, Value};

pub(crate) const EVENT_RECEIVER: &str = "VRCUdonCommonInterfacesIUdonEventReceiver";

/// Parsed form of an extern identifier.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature<'a> {
    pub owner: &'a str,
    pub member: &'a str,
    pub params: Vec<&'a str>,
    pub ret: &'a str,
}

impl<'a> Signature<'a> {
    pub fn parse(id: &'a str) -> Option<Self> {
        let (owner, rest) = id.split_once(".__")?;
        let parts: Vec<&str> = rest.split("__").collect();
        let (member, params, ret) = match parts.as_slice() {
            [member, ret] => (*member, Vec::new(), *ret),
            [member, params, ret] => (*member, params.split('_').collect(), *ret),
            _ => return None,
        };
        if owner.is_empty() || member.is_empty() || ret.is_empty() {
            return None;
        }
        Some(Self {
            owner,
            member,
            params,
            ret,
        })
    }

    pub fn returns(&self) -> bool {
        self.ret != "SystemVoid"
    }

    /// Stack operands consumed by the EXTERN, instance and result included.
    pub fn arity(&self, is_static: bool) -> usize {
        self.params.len() + usize::from(!is_static) + usize::from(self.returns())
    }
}

/// Host implementation of an extern.
///
/// Receives every operand in push order: the instance (for instance
/// externs), the parameters, then the result slot, which it overwrites.
/// Changes to the instance are written back as well.
pub type HostFn = Box<dyn Fn(&mut [Value]) -> Result<(), RuntimeError>>;

pub(crate) struct HostExtern {
    pub(crate) is_static: bool,
    pub(crate) f: HostFn,
}

/// Externs supplied by the embedding host.
#[derive(Default)]
pub struct ExternLibrary {
    host: HashMap<String, HostExtern>,
}

impl ExternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: impl Into<String>,
        is_static: bool,
        f: impl Fn(&mut [Value]) -> Result<(), RuntimeError> + 'static,
    ) {
        self.host.insert(
            id.into(),
            HostExtern {
                is_static,
                f: Box::new(f),
            },
        );
    }

    pub fn with(
        mut self,
        id: impl Into<String>,
        is_static: bool,
        f: impl Fn(&mut [Value]) -> Result<(), RuntimeError> + 'static,
    ) -> Self {
        self.register(id, is_static, f);
        self
    }

    pub(crate) fn host(&self, id: &str) -> Option<&HostExtern> {
        self.host.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.host.contains_key(id) || Signature::parse(id).and_then(|s| Builtin::resolve(&s)).is_some()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Cmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    fn eval<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Cmp::Eq => a == b,
            Cmp::Ne => a != b,
            Cmp::Lt => a < b,
            Cmp::Le => a <= b,
            Cmp::Gt => a > b,
            Cmp::Ge => a >= b,
        }
    }
}

/// Externs the VM implements itself.
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum Builtin {
    Arith(Arith),
    Negate,
    Not,
    Compare(Cmp),
    Convert(NumTy),
    Truncate,
    ArrayCtor(String),
    ArrayGet,
    ArraySet,
    ArrayLength,
    ReferenceEquals,
    Equals,
    GetHashCode,
    GetType,
    FullName,
    SendCustomEvent,
    SetProgramVariable,
    GetProgramVariable,
}

impl Builtin {
    pub(crate) fn resolve(sig: &Signature<'_>) -> Option<Builtin> {
        let arith = match sig.member {
            "op_Addition" => Some(Arith::Add),
            "op_Subtraction" => Some(Arith::Sub),
            "op_Multiplication" => Some(Arith::Mul),
            "op_Division" => Some(Arith::Div),
            "op_Modulus" => Some(Arith::Rem),
            "op_LogicalAnd" => Some(Arith::And),
            "op_LogicalOr" => Some(Arith::Or),
            "op_LogicalXor" => Some(Arith::Xor),
            "op_LeftShift" => Some(Arith::Shl),
            "op_RightShift" => Some(Arith::Shr),
            _ => None,
        };
        if let Some(op) = arith {
            return NumTy::from_vm_name(sig.owner).map(|_| Builtin::Arith(op));
        }
        let cmp = match sig.member {
            "op_Equality" => Some(Cmp::Eq),
            "op_Inequality" => Some(Cmp::Ne),
            "op_LessThan" => Some(Cmp::Lt),
            "op_LessThanOrEqual" => Some(Cmp::Le),
            "op_GreaterThan" => Some(Cmp::Gt),
            "op_GreaterThanOrEqual" => Some(Cmp::Ge),
            _ => None,
        };
        if let Some(op) = cmp {
            return Some(Builtin::Compare(op));
        }

        let builtin = match (sig.owner, sig.member) {
            (owner, "op_UnaryMinus") if NumTy::from_vm_name(owner).is_some() => Builtin::Negate,
            (owner, "op_UnaryNegation") if NumTy::from_vm_name(owner).is_some() => Builtin::Not,
            ("SystemConvert", member) => {
                let to = member.strip_prefix("To")?;
                Builtin::Convert(NumTy::from_short_name(to)?)
            }
            ("SystemMath", "Truncate") => Builtin::Truncate,
            ("SystemObject", "ReferenceEquals") => Builtin::ReferenceEquals,
            ("SystemObject", "Equals") => Builtin::Equals,
            ("SystemObject", "GetHashCode") => Builtin::GetHashCode,
            ("SystemObject", "GetType") => Builtin::GetType,
            ("SystemType", "get_FullName") => Builtin::FullName,
            (EVENT_RECEIVER, "SendCustomEvent") => Builtin::SendCustomEvent,
            (EVENT_RECEIVER, "SetProgramVariable") => Builtin::SetProgramVariable,
            (EVENT_RECEIVER, "GetProgramVariable") => Builtin::GetProgramVariable,
            (owner, member) => {
                let elem = owner.strip_suffix("Array")?;
                match member {
                    "ctor" => Builtin::ArrayCtor(elem.to_string()),
                    "Get" => Builtin::ArrayGet,
                    "Set" => Builtin::ArraySet,
                    "get_Length" => Builtin::ArrayLength,
                    _ => return None,
                }
            }
        };
        Some(builtin)
    }

    pub(crate) fn is_static(&self) -> bool {
        !matches!(
            self,
            Builtin::ArrayGet
                | Builtin::ArraySet
                | Builtin::ArrayLength
                | Builtin::Equals
                | Builtin::GetHashCode
                | Builtin::GetType
                | Builtin::FullName
                | Builtin::SendCustomEvent
                | Builtin::SetProgramVariable
                | Builtin::GetProgramVariable
        )
    }

    /// Evaluate a built-in that does not touch the VM itself.
    ///
    /// `args` holds the instance and parameters, not the result slot.
    pub(crate) fn eval(&self, sig: &Signature<'_>, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
        let arg = |i: usize| args.get(i).ok_or_else(|| type_error("an operand", &Value::Null));
        let value = match self {
            Builtin::Arith(op) => {
                let ty = num_ty(sig.ret)?;
                arith(*op, ty, arg(0)?, arg(1)?)?
            }
            Builtin::Negate => {
                let ty = num_ty(sig.ret)?;
                let a = arg(0)?;
                if ty.is_floating() {
                    ty.from_f64(-float(a)?)
                } else {
                    ty.wrap(-int(a)?)
                }
            }
            Builtin::Not => {
                let ty = num_ty(sig.ret)?;
                match ty {
                    NumTy::Boolean => Value::Bool(!boolean(arg(0)?)?),
                    _ => ty.wrap(!int(arg(0)?)?),
                }
            }
            Builtin::Compare(op) => Value::Bool(compare(*op, sig.owner, arg(0)?, arg(1)?)?),
            Builtin::Convert(to) => convert(*to, arg(0)?)?,
            Builtin::Truncate => Value::Double(float(arg(0)?)?.trunc()),
            Builtin::ArrayCtor(elem) => {
                let len = int(arg(0)?)?;
                let size = usize::try_from(len)
                    .map_err(|_| RuntimeError::IndexOutOfRange { index: len, len: 0 })?;
                Value::Array(ArrayRef::filled(elem, size))
            }
            Builtin::ArrayGet => {
                let array = array(arg(0)?)?;
                let index = index(array, arg(1)?)?;
                array.get(index).unwrap_or(Value::Null)
            }
            Builtin::ArraySet => {
                let array = array(arg(0)?)?;
                let index = index(array, arg(1)?)?;
                array.set(index, arg(2)?.clone());
                return Ok(None);
            }
            Builtin::ArrayLength => Value::Int32(array(arg(0)?)?.len() as i32),
            Builtin::ReferenceEquals => Value::Bool(arg(0)?.same_ref(arg(1)?)),
            Builtin::Equals => Value::Bool(arg(0)?.equals(arg(1)?)),
            Builtin::GetHashCode => Value::Int32(arg(0)?.hash_code()),
            Builtin::GetType => Value::Type(arg(0)?.type_full_name()),
            Builtin::FullName => match arg(0)? {
                Value::Type(name) => Value::str(name),
                other => return Err(type_error("a System.Type", other)),
            },
            Builtin::SendCustomEvent | Builtin::SetProgramVariable | Builtin::GetProgramVariable => {
                return Err(RuntimeError::UnknownExtern(sig.member.to_string()));
            }
        };
        Ok(sig.returns().then_some(value))
    }
}

fn type_error(expected: &'static str, found: &Value) -> RuntimeError {
    RuntimeError::TypeError {
        expected,
        found: found.to_string(),
    }
}

fn num_ty(name: &str) -> Result<NumTy, RuntimeError> {
    NumTy::from_vm_name(name).ok_or_else(|| RuntimeError::TypeError {
        expected: "a numeric type",
        found: name.to_string(),
    })
}

fn int(v: &Value) -> Result<i128, RuntimeError> {
    v.as_int().ok_or_else(|| type_error("an integer", v))
}

fn float(v: &Value) -> Result<f64, RuntimeError> {
    v.as_f64().ok_or_else(|| type_error("a number", v))
}

fn boolean(v: &Value) -> Result<bool, RuntimeError> {
    v.as_bool().ok_or_else(|| type_error("a boolean", v))
}

fn array(v: &Value) -> Result<&ArrayRef, RuntimeError> {
    v.as_array().ok_or_else(|| type_error("an array", v))
}

fn index(array: &ArrayRef, v: &Value) -> Result<usize, RuntimeError> {
    let index = int(v)?;
    usize::try_from(index)
        .ok()
        .filter(|&i| i < array.len())
        .ok_or(RuntimeError::IndexOutOfRange {
            index,
            len: array.len(),
        })
}

fn arith(op: Arith, ty: NumTy, a: &Value, b: &Value) -> Result<Value, RuntimeError> {
    if ty == NumTy::Boolean {
        let (x, y) = (boolean(a)?, boolean(b)?);
        return match op {
            Arith::And => Ok(Value::Bool(x & y)),
            Arith::Or => Ok(Value::Bool(x | y)),
            Arith::Xor => Ok(Value::Bool(x ^ y)),
            _ => Err(type_error("a number", a)),
        };
    }
    if ty.is_floating() {
        let (x, y) = (float(a)?, float(b)?);
        let v = match op {
            Arith::Add => x + y,
            Arith::Sub => x - y,
            Arith::Mul => x * y,
            Arith::Div => x / y,
            Arith::Rem => x % y,
            _ => return Err(type_error("an integer", a)),
        };
        return Ok(ty.from_f64(v));
    }
    let (x, y) = (int(a)?, int(b)?);
    let v = match op {
        Arith::Add => x.wrapping_add(y),
        Arith::Sub => x.wrapping_sub(y),
        Arith::Mul => x.wrapping_mul(y),
        Arith::Div if y == 0 => return Err(RuntimeError::DivideByZero),
        Arith::Rem if y == 0 => return Err(RuntimeError::DivideByZero),
        Arith::Div => x.wrapping_div(y),
        Arith::Rem => x.wrapping_rem(y),
        Arith::And => x & y,
        Arith::Or => x | y,
        Arith::Xor => x ^ y,
        Arith::Shl => x.wrapping_shl(y as u32 & ty.shift_mask()),
        Arith::Shr => x >> (y as u32 & ty.shift_mask()),
    };
    Ok(ty.wrap(v))
}

fn compare(op: Cmp, owner: &str, a: &Value, b: &Value) -> Result<bool, RuntimeError> {
    match NumTy::from_vm_name(owner) {
        Some(ty) if ty.is_floating() => Ok(op.eval(float(a)?, float(b)?)),
        Some(_) => Ok(op.eval(int(a)?, int(b)?)),
        None => {
            let same = match (a, b) {
                (Value::Str(x), Value::Str(y)) => x == y,
                _ => a.same_ref(b),
            };
            match op {
                Cmp::Eq => Ok(same),
                Cmp::Ne => Ok(!same),
                _ => Err(type_error("an ordered value", a)),
            }
        }
    }
}

/// `Convert.ToX`: integers wrap, floats truncate toward zero.
fn convert(to: NumTy, v: &Value) -> Result<Value, RuntimeError> {
    if to == NumTy::Boolean {
        return Ok(Value::Bool(float(v)? != 0.0));
    }
    if to.is_floating() {
        return match v.as_int() {
            Some(i) => Ok(to.from_f64(i as f64)),
            None => Ok(to.from_f64(float(v)?)),
        };
    }
    match v.as_int() {
        Some(i) => Ok(to.wrap(i)),
        None => Ok(to.from_f64(float(v)?)),
    }
}
