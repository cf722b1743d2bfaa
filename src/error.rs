//! Error taxonomy for the code generator.
//!
//! This is deliberately a single flat `enum` with three variants, one
//! per failure class named in the specification: an unsupported source
//! construct, a broken internal invariant, and a resource limit. None of
//! these are recoverable inside this crate; they all propagate to the
//! driver. A cross-translation-unit unresolved symbol is *not* an
//! error here — it is the ordinary, successful output of fixup
//! resolution (see `crate::encoder`).
//!
//! `Error`/`Display` are implemented by hand rather than pulled in from
//! `thiserror`, the same way `cranelift-codegen`'s own `LookupError`
//! and `DataValueCastFailure` do, to keep this crate's dependency list
//! short.

use std::fmt;

/// The result type used throughout this crate.
pub type CodegenResult<T> = Result<T, CodegenError>;

/// A fatal failure of the code generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// A construct that the implemented C subset does not cover:
    /// variadic arguments, `switch`, `goto`, floating-point types, and
    /// the like.
    Unsupported(String),

    /// A broken invariant of the IR, assembly IR, or allocator state
    /// that indicates a bug in this crate rather than a malformed
    /// input: a type mismatch between instruction operands, a block
    /// left unterminated, a `FIELD` op against the wrong struct type.
    InvariantViolation(String),

    /// A resource limit was exceeded: the register allocator could not
    /// fit a live interval, or a call exceeded the supported argument
    /// arity.
    ResourceExhausted(String),
}

impl CodegenError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        CodegenError::Unsupported(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        CodegenError::InvariantViolation(msg.into())
    }

    pub fn exhausted(msg: impl Into<String>) -> Self {
        CodegenError::ResourceExhausted(msg.into())
    }
}

// Manually implementing `Error`/`Display` instead of deriving them via
// `thiserror` keeps this crate's dependency footprint to what lowering
// IR to machine code actually needs.
impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodegenError::Unsupported(msg) => write!(f, "unsupported construct: {msg}"),
            CodegenError::InvariantViolation(msg) => write!(f, "internal invariant violated: {msg}"),
            CodegenError::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
        }
    }
}

impl std::error::Error for CodegenError {}
