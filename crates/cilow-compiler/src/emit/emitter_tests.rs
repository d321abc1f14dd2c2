use cilow_asm::Opcode;
use indoc::indoc;

use crate::constant::Constant;
use crate::error::CompileError;
use crate::metadata::MethodRef;
use crate::types::Type;
use crate::variables::{ReferenceVar, Var, Variables};

use super::*;

fn listing(e: &Emitter, vars: &Variables) -> String {
    let code = e.build(vars, &|_| None).unwrap();
    let mut out = String::new();
    for instr in code {
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}

fn element_ref(
    e: &mut Emitter,
    vars: &mut Variables,
    names: &mut NamePool,
    array: Var,
    index: Var,
) -> Var {
    let array_ty = vars.ty(array).clone();
    let elem = array_ty.element().unwrap().clone();
    let vm = array_ty.vm_name();
    let elem_vm = elem.vm_name();
    let getter = e
        .extern_slot(vars, names, &format!("{vm}.__Get__SystemInt32__{elem_vm}"))
        .unwrap();
    let setter = e
        .extern_slot(
            vars,
            names,
            &format!("{vm}.__Set__SystemInt32_{elem_vm}__SystemVoid"),
        )
        .unwrap();
    let backing = vars.temporary(&elem);
    vars.reference(
        &elem,
        ReferenceVar {
            backing,
            location: vec![array, index],
            getter,
            setter,
        },
    )
}

#[test]
fn forward_label_is_patched() {
    let mut e = Emitter::new(0x10);
    let vars = Variables::new("M");
    let done = e.create_label();
    e.add_jump(Target::Label(done));
    e.emit(Opcode::Nop);
    e.apply_label(done).unwrap();
    e.emit(Opcode::Pop);

    assert_eq!(e.address(), 0x20);
    assert_eq!(e.label_address(done), Ok(0x1C));
    assert_eq!(
        listing(&e, &vars),
        indoc! {"
            JUMP, 0x0000001C
            NOP
            POP
        "}
    );
}

#[test]
fn label_applied_twice() {
    let mut e = Emitter::new(0);
    let l = e.create_label();
    e.apply_label(l).unwrap();

    assert_eq!(e.apply_label(l), Err(CompileError::LabelAppliedTwice(l.id())));
}

#[test]
fn unapplied_label_fails_build() {
    let mut e = Emitter::new(0);
    let vars = Variables::new("M");
    let l = e.create_label();
    e.add_jump(Target::Label(l));

    assert_eq!(
        e.build(&vars, &|_| None),
        Err(CompileError::LabelNotApplied(l.id()))
    );
}

#[test]
fn entries_resolve_through_the_link_map() {
    let mut e = Emitter::new(0);
    let vars = Variables::new("M");
    e.add_jump(Target::Entry("Other".into()));

    let linked = e
        .build(&vars, &|name| (name == "Other").then_some(0x80))
        .unwrap();
    assert_eq!(linked[0].address(), Some(0x80));
    assert_eq!(
        e.build(&vars, &|_| None),
        Err(CompileError::UnknownMethod("Other".into()))
    );
}

#[test]
fn array_element_reference_loads_and_stores() {
    let mut e = Emitter::new(0);
    let mut vars = Variables::new("M");
    let mut names = NamePool::new();
    let array = vars
        .local(0, Some("values"), &Type::array_of(Type::Int32))
        .unwrap();
    let index = vars.local(1, Some("i"), &Type::Int32).unwrap();
    let x = vars.local(2, Some("x"), &Type::Int32).unwrap();
    let r = element_ref(&mut e, &mut vars, &mut names, array, index);

    e.add_copy(&vars, r, x).unwrap();
    e.add_copy(&vars, x, r).unwrap();

    insta::assert_snapshot!(listing(&e, &vars), @r"
    PUSH, __M_lcl_values
    PUSH, __M_lcl_i
    PUSH, __M_tmp_SystemInt32_0
    EXTERN, __extern_0
    PUSH, __M_tmp_SystemInt32_0
    PUSH, __M_lcl_x
    COPY
    PUSH, __M_lcl_x
    PUSH, __M_tmp_SystemInt32_0
    COPY
    PUSH, __M_lcl_values
    PUSH, __M_lcl_i
    PUSH, __M_tmp_SystemInt32_0
    EXTERN, __extern_1
    ");
}

#[test]
fn struct_field_write_writes_back_inner_to_outer() {
    let vector = Type::Struct("UnityEngine.Vector3".into());
    let mut e = Emitter::new(0);
    let mut vars = Variables::new("M");
    let mut names = NamePool::new();
    let array = vars
        .local(0, Some("points"), &Type::array_of(vector.clone()))
        .unwrap();
    let index = vars.local(1, Some("i"), &Type::Int32).unwrap();
    let element = element_ref(&mut e, &mut vars, &mut names, array, index);
    let get_x = e
        .extern_slot(&mut vars, &mut names, "UnityEngineVector3.__get_x__SystemSingle")
        .unwrap();
    let set_x = e
        .extern_slot(&mut vars, &mut names, "UnityEngineVector3.__set_x__SystemSingle__SystemVoid")
        .unwrap();
    let backing = vars.temporary(&Type::Single);
    let field = vars.reference(
        &Type::Single,
        ReferenceVar {
            backing,
            location: vec![element],
            getter: get_x,
            setter: set_x,
        },
    );
    let one = e
        .constant(&mut vars, &mut names, Constant::F32(1.0), &Type::Single)
        .unwrap();

    e.add_copy(&vars, one, field).unwrap();

    insta::assert_snapshot!(listing(&e, &vars), @r"
    PUSH, __const_SystemSingle_0
    PUSH, __M_lcl_points
    PUSH, __M_lcl_i
    PUSH, __M_tmp_UnityEngineVector3_0
    EXTERN, __extern_0
    PUSH, __M_tmp_SystemSingle_0
    COPY
    PUSH, __M_tmp_UnityEngineVector3_0
    PUSH, __M_tmp_SystemSingle_0
    EXTERN, __extern_3
    PUSH, __M_lcl_points
    PUSH, __M_lcl_i
    PUSH, __M_tmp_UnityEngineVector3_0
    EXTERN, __extern_1
    ");
}

#[test]
fn constants_share_names_across_methods() {
    let mut names = NamePool::new();
    let mut first = Variables::new("A");
    let mut second = Variables::new("B");
    let mut ea = Emitter::new(0);
    let mut eb = Emitter::new(0);

    let a = ea
        .constant(&mut first, &mut names, Constant::I32(7), &Type::Int32)
        .unwrap();
    let a_again = ea
        .constant(&mut first, &mut names, Constant::I32(7), &Type::Int32)
        .unwrap();
    let other = ea
        .constant(&mut first, &mut names, Constant::I32(8), &Type::Int32)
        .unwrap();
    let b = eb
        .constant(&mut second, &mut names, Constant::I32(7), &Type::Int32)
        .unwrap();

    assert_eq!(a, a_again);
    assert_eq!(first.name(a), "__const_SystemInt32_0");
    assert_eq!(first.name(other), "__const_SystemInt32_1");
    assert_eq!(second.name(b), first.name(a));
}

#[test]
fn extern_operand_names_the_pool_slot() {
    let mut e = Emitter::new(0);
    let mut vars = Variables::new("M");
    let mut names = NamePool::new();
    let slot = e
        .extern_slot(&mut vars, &mut names, "SystemInt32.__op_UnaryMinus__SystemInt32__SystemInt32")
        .unwrap();
    let v = vars.local(0, None, &Type::Int32).unwrap();
    let out = vars.temporary(&Type::Int32);

    e.add_extern(&vars, slot, &[v], Some(out)).unwrap();

    assert_eq!(
        listing(&e, &vars),
        indoc! {"
            PUSH, __M_lcl_0
            PUSH, __M_tmp_SystemInt32_0
            EXTERN, __extern_0
        "}
    );
    assert_eq!(e.address(), 24);
}

#[test]
fn method_pointer_cannot_be_pushed() {
    let mut e = Emitter::new(0);
    let mut vars = Variables::new("M");
    let ptr = vars.method_pointer(MethodRef::new(Type::Behaviour("U".into()), "OnHit"));

    assert!(matches!(
        e.push_operand(&vars, ptr, Access::Read),
        Err(CompileError::Unsupported(_))
    ));
}
