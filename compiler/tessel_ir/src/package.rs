//! Append-only collection of finalized functions.

use std::fmt;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::Function;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PackageError {
    #[error("function `{0}` is already defined in the package")]
    DuplicateFunction(String),
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Package {
    name: String,
    functions: Vec<Function>,
    index: FxHashMap<String, usize>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a finalized function. Names are unique within a package.
    pub fn add_function(&mut self, function: Function) -> Result<(), PackageError> {
        if self.index.contains_key(function.name()) {
            return Err(PackageError::DuplicateFunction(function.name().to_string()));
        }
        debug!(package = %self.name, function = function.name(), "append function");
        self.index
            .insert(function.name().to_string(), self.functions.len());
        self.functions.push(function);
        Ok(())
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Functions in the order they were added.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Text form of the whole package.
    pub fn dump_ir(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "package {}", self.name)?;
        for function in &self.functions {
            writeln!(f)?;
            writeln!(f, "{function}")?;
        }
        Ok(())
    }
}
