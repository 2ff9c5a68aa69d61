//! Typed error channel (spec.md §7).
//!
//! Structural errors (`InvalidSymbol`, `InvalidEdge`, `Io`) abort the
//! current top-level operation and are surfaced to the caller.
//! Recoverable errors (`TypeMismatch` outside strict mode, `FieldOutOfRange`
//! on optional queries) are discarded locally by callers that choose to;
//! they are still constructed and returned rather than silently dropped
//! inside this crate, so a caller always has the option to treat them as
//! fatal.

use derive_more::{Display, Error};

use crate::pta::ids::NodeId;

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum PtaError {
    #[display(fmt = "invalid symbol: reserved id {_0} used where an IR-backed id was required")]
    InvalidSymbol(NodeId),

    #[display(fmt = "invalid edge: {_0}")]
    InvalidEdge(String),

    #[display(fmt = "field {field} out of range (flattened count is {count})")]
    FieldOutOfRange { field: u32, count: u32 },

    #[display(fmt = "type mismatch on gep over {_0}: {_1}")]
    TypeMismatch(NodeId, String),

    #[display(fmt = "no IR value associated with dummy node {_0}")]
    NoValue(NodeId),

    #[display(fmt = "out of budget after {_0} worklist steps")]
    OutOfBudget(u64),

    #[display(fmt = "i/o error: {_0}")]
    Io(String),
}

impl From<std::io::Error> for PtaError {
    fn from(e: std::io::Error) -> Self {
        PtaError::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PtaError>;
