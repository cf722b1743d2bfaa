//! Compilation flags (§4.7 "Configuration"), mirroring
//! `cranelift_codegen::settings::Flags`'s role as the single
//! passed-through configuration object every pass reads from instead
//! of taking its own ad hoc parameters.

/// Tunables read by the passes between IR construction and encoding.
/// Threaded through by reference rather than thread-local or global
/// state, matching the source's settings object.
#[derive(Clone, Debug)]
pub struct Flags {
    /// Whether the prologue/epilogue may omit the frame pointer when a
    /// function never takes a local's address. Not read anywhere yet —
    /// [`crate::regalloc::allocate_function`] unconditionally keeps RBP
    /// (§4.4: "RBP is unconditionally used (no frame-pointer
    /// omission)"); this flag exists for a future pass to consult.
    pub enable_frame_pointer_elimination: bool,
    /// The maximum number of arguments a `CALL` may pass.
    /// [`crate::ir::Builder::build_call`] enforces this same limit
    /// (today as a literal `6`, matching this default) by rejecting
    /// calls with [`crate::error::CodegenError::ResourceExhausted`].
    pub max_call_arity: usize,
    /// Whether [`crate::ir::verify_function`] runs after IR
    /// construction. Defaults to on in debug builds, matching the
    /// `verifier-always` Cargo feature's name.
    pub verify_ir: bool,
}

impl Default for Flags {
    fn default() -> Flags {
        Flags {
            enable_frame_pointer_elimination: false,
            max_call_arity: 6,
            verify_ir: cfg!(debug_assertions) || cfg!(feature = "verifier-always"),
        }
    }
}

impl Flags {
    pub fn new() -> Flags {
        Flags::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let flags = Flags::new();
        assert!(!flags.enable_frame_pointer_elimination);
        assert_eq!(flags.max_call_arity, 6);
    }
}
