use crate::flatten::SymbolKey;
use crate::runtime::RuntimeSymbol;
use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported {kind}: {detail}")]
    Unsupported { kind: String, detail: String },
    #[error("undefined: {0}")]
    Unresolved(SymbolKey),
    #[error("package `{0}` not found")]
    MissingPackage(String),
    #[error("import cycle not allowed: {}", .0.iter().join(" -> "))]
    ImportCycle(Vec<String>),
    #[error("`{first}` and `{second}` both mangle to `{mangled}`")]
    ManglingCollision {
        mangled: String,
        first: SymbolKey,
        second: SymbolKey,
    },
    #[error("malformed program: {0}")]
    Malformed(String),
    #[error("`{0}` has no inferred type")]
    Untyped(String),
    #[error("`{0}` is called but was never required")]
    MissingRuntime(RuntimeSymbol),
    #[error("undefined: {0}")]
    UnknownIdentifier(String),
    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn unsupported(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Unsupported {
            kind: kind.into(),
            detail: detail.into(),
        }
    }
}
