//! Ordered grouping of parameters for display and transmission.

use crate::model::parameter::Parameter;

/// A named, ordered group of parameters.
///
/// Entry order is the display and transmission order; nothing in the model
/// or codec may reorder it. `disclosed` is the list UI's expand state — it
/// has no meaning here but must survive a round-trip through the codec.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterCategory {
    pub name: String,
    /// Marks debug-only categories the embedding app may hide in release
    /// builds.
    pub is_debug: bool,
    /// UI expand state, carried verbatim.
    pub disclosed: bool,
    pub entries: Vec<Parameter>,
}

impl ParameterCategory {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_debug: false,
            disclosed: true,
            entries: Vec::new(),
        }
    }

    pub fn debug(name: &str) -> Self {
        Self {
            is_debug: true,
            ..Self::new(name)
        }
    }

    /// Appends a parameter, preserving insertion order.
    pub fn push(&mut self, parameter: Parameter) {
        self.entries.push(parameter);
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with(mut self, parameter: Parameter) -> Self {
        self.entries.push(parameter);
        self
    }

    /// Finds an entry by parameter name.
    pub fn entry(&self, name: &str) -> Option<&Parameter> {
        self.entries.iter().find(|p| p.name == name)
    }

    /// Finds an entry mutably by parameter name.
    pub fn entry_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.entries.iter_mut().find(|p| p.name == name)
    }

    /// Reverts every entry to its default value.
    pub fn revert_all(&mut self) {
        for parameter in &mut self.entries {
            parameter.revert_to_default();
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
