//! Compilation configuration.
//!
//! The reference keeps a single process-wide `program_options_t` (`ecc.h`)
//! filled in by the excluded CLI driver and read everywhere else. Per the
//! spec's design notes this becomes a plain value threaded through the
//! pipeline entry point instead of global state.

/// Options bearing on the CORE translation pipeline (spec.md §1-§4.8).
///
/// Flags that only matter to the excluded driver (output file path,
/// assembler/linker invocation, `#include` search paths) are not modeled
/// here; they belong to the external collaborator, not this crate.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CompileOptions {
    /// Promote warnings to errors, gating compilation on them too.
    pub warnings_as_errors: bool,
    /// Emit every collected diagnostic, not just the first per production.
    pub verbose_diagnostics: bool,
    /// Keep the nop/label cleanup peephole pass over emitted AIR
    /// (spec.md §1 Non-goals: "optimization beyond simple local peephole
    /// passes" is in scope; this flag lets a caller disable even that).
    pub peephole: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions { warnings_as_errors: false, verbose_diagnostics: false, peephole: true }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_do_not_promote_warnings() {
        let opts = CompileOptions::new();
        assert!(!opts.warnings_as_errors);
        assert!(opts.peephole);
    }
}
