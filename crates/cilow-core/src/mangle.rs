//! Name mangling for target VM identifiers.
//!
//! The target VM names types by their full managed name with every separator
//! removed (`System.Int32` -> `SystemInt32`). Heap variable names must be plain
//! identifiers, so anything a managed name may carry beyond `[A-Za-z0-9_]`
//! is dropped or replaced.

/// Mangle a full managed type name into a target VM type name.
///
/// Namespace dots, nested-type pluses and generic arity markers are removed.
///
/// # Examples
/// ```
/// use cilow_core::mangle_type_name;
/// assert_eq!(mangle_type_name("System.Int32"), "SystemInt32");
/// assert_eq!(mangle_type_name("UnityEngine.Transform"), "UnityEngineTransform");
/// ```
pub fn mangle_type_name(full_name: &str) -> String {
    let mut out = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' | '+' | '/' => {}
            // Generic arity suffix: `List`1` -> `List`
            '`' => {
                while chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                    chars.next();
                }
            }
            '[' | ']' | ',' | ' ' | '<' | '>' => {}
            c => out.push(c),
        }
    }
    out
}

/// Make an arbitrary name usable as a heap variable identifier.
///
/// Keeps ASCII alphanumerics and underscores, maps every other character to
/// `_`, and prefixes a leading digit with `_`.
pub fn sanitize_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.push('_');
    }
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}
