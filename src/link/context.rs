//! Shared state threaded through every link pass.
//!
//! There is no ambient or thread-local state anywhere in the pipeline: each
//! pass receives the [`LinkContext`] explicitly. It owns the diagnostics
//! sink, the symbol source stack, the name mangler and the compilation
//! package identity (name plus 8-bit package id).

use crate::diagnostics::Diagnostics;
use crate::link::symbols::SymbolTable;
use crate::resources::{NameMangler, NameManglerPolicy};

/// Everything the passes need to know about the current link invocation.
pub struct LinkContext {
    /// The package being built, from the manifest.
    pub compilation_package: String,
    /// The 8-bit package id (`0x01` for the framework package, else `0x7f`).
    pub package_id: u8,
    /// Mangler for merged library names.
    pub mangler: NameMangler,
    /// Priority-ordered symbol sources.
    pub symbols: SymbolTable,
    /// Shared diagnostic sink.
    pub diagnostics: Diagnostics,
    /// Emit note-level diagnostics describing each step.
    pub verbose: bool,
    /// Build minimum platform API level; 0 when unknown.
    pub min_sdk_version: u16,
}

impl LinkContext {
    /// A context with no packages merged and an empty symbol stack.
    #[must_use]
    pub fn new() -> Self {
        LinkContext {
            compilation_package: String::new(),
            package_id: 0,
            mangler: NameMangler::default(),
            symbols: SymbolTable::new(),
            diagnostics: Diagnostics::new(),
            verbose: false,
            min_sdk_version: 0,
        }
    }

    /// Replace the mangler policy (after merging, when the set of merged
    /// packages is known).
    pub fn set_mangler_policy(&mut self, policy: NameManglerPolicy) {
        self.mangler = NameMangler::new(policy);
    }

    /// Emit a note when verbose mode is on.
    pub fn note(&self, message: impl Into<String>) {
        if self.verbose {
            self.diagnostics.note(None, message);
        }
    }
}

impl Default for LinkContext {
    fn default() -> Self {
        LinkContext::new()
    }
}
