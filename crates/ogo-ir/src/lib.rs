pub mod codegen;
mod error;
pub mod flatten;
pub mod runtime;
pub mod types;
mod util;

pub use crate::error::{Error, Result};
pub use crate::flatten::{flatten, mangle, FlatDecl, Program, Symbol, SymbolKey};
pub use crate::runtime::RuntimeSymbol;
pub use crate::types::{Target, Type, TypeMap};
use parser::ast::File;
use std::collections::BTreeMap;

/// Every parsed package of a program, keyed by import path. The command
/// package is keyed `main`.
#[derive(Debug, Clone, Default)]
pub struct DeclGraph {
    pub packages: BTreeMap<String, Package>,
}

#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Files keyed by file name, so iteration follows file order.
    pub files: BTreeMap<String, File>,
}

impl Package {
    /// The name from the package clause.
    pub fn name(&self) -> Option<&str> {
        self.files.values().next().map(|f| f.package.as_str())
    }
}

/// Flattens, type checks and generates C for the program rooted at `main`.
pub fn gen_c(graph: &DeclGraph, target: Target) -> Result<String> {
    let mut program = flatten(graph)?;
    let mut types = TypeMap::default();
    types.check(&mut program.decls)?;
    for (name, t) in types.iter() {
        log::debug!("{name}: {}", t.to_expr());
    }
    codegen::generate(&program, &types, target)
}
