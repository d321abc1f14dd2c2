use crate::{mangle_type_name, sanitize_ident};

#[test]
fn mangle_drops_namespace_dots() {
    assert_eq!(mangle_type_name("System.String"), "SystemString");
}

#[test]
fn mangle_drops_nested_and_generic_markers() {
    assert_eq!(mangle_type_name("Outer+Inner"), "OuterInner");
    assert_eq!(
        mangle_type_name("System.Collections.Generic.List`1"),
        "SystemCollectionsGenericList"
    );
}

#[test]
fn mangle_is_idempotent() {
    let once = mangle_type_name("UnityEngine.Vector3");
    assert_eq!(mangle_type_name(&once), once);
}

#[test]
fn sanitize_replaces_punctuation() {
    assert_eq!(sanitize_ident("<Value>k__BackingField"), "_Value_k__BackingField");
    assert_eq!(sanitize_ident("a.b"), "a_b");
}

#[test]
fn sanitize_guards_leading_digit() {
    assert_eq!(sanitize_ident("0abc"), "_0abc");
}
