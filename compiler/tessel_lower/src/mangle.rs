//! Mangled names for function instantiations.
//!
//! `__{module}__{function}` followed by `__{key}_{value}` for every
//! parametric binding, keys in sorted order. Inside each part `_` is written
//! `_U` and a module path `.` is written `_D`, so every underscore that
//! survives escaping is followed by `_`, `U`, `D` or a digit. That makes the
//! name decodable left to right and the mapping injective.

use std::fmt::Write;

use tessel_ast::SymbolicBindings;

use crate::ConversionError;

/// Mangle `function` of `module_name` under `bindings`.
///
/// `free_keys` are the parametric names the function declares; every one
/// must be bound. Bindings for other names are ignored.
pub fn mangle_name(
    module_name: &str,
    function: &str,
    free_keys: &[&str],
    bindings: &SymbolicBindings,
) -> Result<String, ConversionError> {
    let mut keys: Vec<&str> = free_keys.to_vec();
    keys.sort_unstable();
    keys.dedup();

    if keys.iter().any(|key| !bindings.contains(key)) {
        return Err(ConversionError::InsufficientBindings {
            function: function.to_string(),
            needed: keys.iter().map(ToString::to_string).collect(),
            got: bindings.keys().map(ToString::to_string).collect(),
        });
    }

    let mut mangled = String::from("__");
    push_escaped(&mut mangled, module_name);
    mangled.push_str("__");
    push_escaped(&mut mangled, function);
    for key in keys {
        if let Some(value) = bindings.get(key) {
            mangled.push_str("__");
            push_escaped(&mut mangled, key);
            let _ = write!(mangled, "_{value}");
        }
    }
    Ok(mangled)
}

fn push_escaped(out: &mut String, part: &str) {
    for c in part.chars() {
        match c {
            '_' => out.push_str("_U"),
            '.' => out.push_str("_D"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests;
