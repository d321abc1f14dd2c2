//! Extern signatures and the table of externs the target VM exposes.
//!
//! Every operation the VM cannot express natively (arithmetic, conversions,
//! array access, host API) is an EXTERN call named by a signature string of
//! the form `Owner.__member__P1_P2__Ret`.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::metadata::MethodRef;
use crate::ops::{BinaryOp, CompareOp, UnaryOp};
use crate::types::Type;

const EVENT_RECEIVER: &str = "VRCUdonCommonInterfacesIUdonEventReceiver";

/// Structured form of an extern identifier.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ExternSignature {
    pub owner: String,
    pub member: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub ret: String,
    /// Static externs take no instance operand.
    #[serde(default)]
    pub is_static: bool,
}

impl ExternSignature {
    pub fn new(owner: &Type, member: &str, params: &[Type], ret: &Type, is_static: bool) -> Self {
        Self {
            owner: owner.vm_name(),
            member: member.to_string(),
            params: params.iter().map(Type::vm_name).collect(),
            ret: ret.vm_name(),
            is_static,
        }
    }

    /// Signature of a managed method; constructors become static `ctor`
    /// externs returning the declaring type.
    pub fn from_method(method: &MethodRef) -> Self {
        if method.is_ctor() {
            return Self::new(
                &method.declaring,
                "ctor",
                &method.params,
                &method.declaring,
                true,
            );
        }
        Self::new(
            &method.declaring,
            &method.name,
            &method.params,
            &method.ret,
            method.is_static,
        )
    }

    pub fn identifier(&self) -> String {
        if self.params.is_empty() {
            format!("{}.__{}__{}", self.owner, self.member, self.ret)
        } else {
            format!(
                "{}.__{}__{}__{}",
                self.owner,
                self.member,
                self.params.join("_"),
                self.ret
            )
        }
    }

    pub fn returns_value(&self) -> bool {
        self.ret != "SystemVoid"
    }

    /// Operands pushed before EXTERN, including instance and result.
    pub fn operand_count(&self) -> usize {
        self.params.len() + usize::from(!self.is_static) + usize::from(self.returns_value())
    }
}

impl fmt::Display for ExternSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// The set of externs available to compiled code.
pub trait ExternTable {
    /// Identifier for a signature, `None` when the target does not expose it.
    fn resolve(&self, sig: &ExternSignature) -> Option<String>;

    fn contains(&self, identifier: &str) -> bool;
}

impl<T: ExternTable + ?Sized> ExternTable for &T {
    fn resolve(&self, sig: &ExternSignature) -> Option<String> {
        (**self).resolve(sig)
    }

    fn contains(&self, identifier: &str) -> bool {
        (**self).contains(identifier)
    }
}

/// Accepts every signature and derives its identifier by naming rules.
#[derive(Clone, Copy, Debug, Default)]
pub struct SignatureNaming;

impl ExternTable for SignatureNaming {
    fn resolve(&self, sig: &ExternSignature) -> Option<String> {
        Some(sig.identifier())
    }

    fn contains(&self, _identifier: &str) -> bool {
        true
    }
}

/// An explicit allow-list of externs, loadable from JSON.
#[derive(Clone, Debug, Default)]
pub struct ExternRegistry {
    by_signature: IndexMap<ExternSignature, String>,
    identifiers: HashSet<String>,
}

impl ExternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sig: ExternSignature) {
        let id = sig.identifier();
        self.identifiers.insert(id.clone());
        self.by_signature.insert(sig, id);
    }

    pub fn with(mut self, sig: ExternSignature) -> Self {
        self.insert(sig);
        self
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let sigs: Vec<ExternSignature> = serde_json::from_str(text)?;
        Ok(sigs.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }

    pub fn signatures(&self) -> impl Iterator<Item = &ExternSignature> {
        self.by_signature.keys()
    }
}

impl FromIterator<ExternSignature> for ExternRegistry {
    fn from_iter<I: IntoIterator<Item = ExternSignature>>(iter: I) -> Self {
        let mut registry = Self::new();
        for sig in iter {
            registry.insert(sig);
        }
        registry
    }
}

impl ExternTable for ExternRegistry {
    fn resolve(&self, sig: &ExternSignature) -> Option<String> {
        self.by_signature.get(sig).cloned()
    }

    fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }
}

/// Signatures the compiler itself emits.
pub mod well_known {
    use super::*;

    pub fn binary(op: BinaryOp, ty: &Type) -> ExternSignature {
        let rhs = if op.is_shift() { &Type::Int32 } else { ty };
        ExternSignature::new(ty, op.member(), &[ty.clone(), rhs.clone()], ty, true)
    }

    pub fn unary(op: UnaryOp, ty: &Type) -> ExternSignature {
        ExternSignature::new(ty, op.member(), &[ty.clone()], ty, true)
    }

    pub fn compare(op: CompareOp, ty: &Type) -> ExternSignature {
        ExternSignature::new(ty, op.member(), &[ty.clone(), ty.clone()], &Type::Boolean, true)
    }

    /// `System.Convert.ToX(from)`.
    pub fn convert(from: &Type, to: &Type) -> ExternSignature {
        let member = format!("To{}", to.underlying().full_name().trim_start_matches("System."));
        ExternSignature::new(
            &Type::Class("System.Convert".into()),
            &member,
            &[from.clone()],
            to.underlying(),
            true,
        )
    }

    /// `System.Math.Truncate`, used before float-to-integer conversion.
    pub fn truncate(ty: &Type) -> ExternSignature {
        let ty = if *ty == Type::Single { &Type::Double } else { ty };
        ExternSignature::new(
            &Type::Class("System.Math".into()),
            "Truncate",
            &[ty.clone()],
            ty,
            true,
        )
    }

    pub fn array_ctor(array: &Type) -> ExternSignature {
        ExternSignature::new(array, "ctor", &[Type::Int32], array, true)
    }

    pub fn array_get(array: &Type) -> ExternSignature {
        let elem = array.element().cloned().unwrap_or(Type::Object);
        ExternSignature::new(array, "Get", &[Type::Int32], &elem, false)
    }

    pub fn array_set(array: &Type) -> ExternSignature {
        let elem = array.element().cloned().unwrap_or(Type::Object);
        ExternSignature::new(array, "Set", &[Type::Int32, elem], &Type::Void, false)
    }

    pub fn array_length(array: &Type) -> ExternSignature {
        ExternSignature::new(array, "get_Length", &[], &Type::Int32, false)
    }

    pub fn reference_equals() -> ExternSignature {
        ExternSignature::new(
            &Type::Object,
            "ReferenceEquals",
            &[Type::Object, Type::Object],
            &Type::Boolean,
            true,
        )
    }

    pub fn object_equals() -> ExternSignature {
        ExternSignature::new(&Type::Object, "Equals", &[Type::Object], &Type::Boolean, false)
    }

    /// Instance call used to raise a null-reference fault.
    pub fn get_hash_code() -> ExternSignature {
        ExternSignature::new(&Type::Object, "GetHashCode", &[], &Type::Int32, false)
    }

    pub fn get_type() -> ExternSignature {
        ExternSignature::new(&Type::Object, "GetType", &[], &Type::SystemType, false)
    }

    pub fn type_full_name() -> ExternSignature {
        ExternSignature::new(&Type::SystemType, "get_FullName", &[], &Type::String, false)
    }

    pub fn string_equals() -> ExternSignature {
        compare(CompareOp::Eq, &Type::String)
    }

    fn receiver() -> Type {
        Type::Class(EVENT_RECEIVER.into())
    }

    pub fn send_custom_event() -> ExternSignature {
        ExternSignature::new(&receiver(), "SendCustomEvent", &[Type::String], &Type::Void, false)
    }

    pub fn set_program_variable() -> ExternSignature {
        ExternSignature::new(
            &receiver(),
            "SetProgramVariable",
            &[Type::String, Type::Object],
            &Type::Void,
            false,
        )
    }

    pub fn get_program_variable() -> ExternSignature {
        ExternSignature::new(
            &receiver(),
            "GetProgramVariable",
            &[Type::String],
            &Type::Object,
            false,
        )
    }

    /// Everything above for the primitive types, suitable for seeding an
    /// [`ExternRegistry`].
    pub fn all() -> Vec<ExternSignature> {
        let numeric = [
            Type::Int32,
            Type::UInt32,
            Type::Int64,
            Type::UInt64,
            Type::Single,
            Type::Double,
        ];
        let mut out = Vec::new();
        for ty in &numeric {
            for op in [
                BinaryOp::Add,
                BinaryOp::Sub,
                BinaryOp::Mul,
                BinaryOp::Div,
                BinaryOp::Rem,
            ] {
                out.push(binary(op, ty));
            }
            if ty.is_integral() {
                for op in [
                    BinaryOp::And,
                    BinaryOp::Or,
                    BinaryOp::Xor,
                    BinaryOp::Shl,
                    BinaryOp::Shr,
                ] {
                    out.push(binary(op, ty));
                }
            } else {
                out.push(truncate(ty));
            }
            if !ty.is_unsigned() {
                out.push(unary(UnaryOp::Neg, ty));
            }
            for op in CompareOp::ALL {
                out.push(compare(op, ty));
            }
            for to in &numeric {
                if to != ty {
                    out.push(convert(ty, to));
                }
            }
            out.push(convert(ty, &Type::Boolean));
        }
        for op in [BinaryOp::And, BinaryOp::Or, BinaryOp::Xor] {
            out.push(binary(op, &Type::Boolean));
        }
        out.push(unary(UnaryOp::Not, &Type::Boolean));
        out.push(compare(CompareOp::Eq, &Type::Boolean));
        out.push(compare(CompareOp::Ne, &Type::Boolean));
        out.push(string_equals());
        out.push(compare(CompareOp::Ne, &Type::String));
        for elem in [Type::Object, Type::Int32, Type::Single, Type::String] {
            let array = Type::array_of(elem);
            out.push(array_ctor(&array));
            out.push(array_get(&array));
            out.push(array_set(&array));
            out.push(array_length(&array));
        }
        out.extend([
            reference_equals(),
            object_equals(),
            get_hash_code(),
            get_type(),
            type_full_name(),
            send_custom_event(),
            set_program_variable(),
            get_program_variable(),
        ]);
        out
    }
}
