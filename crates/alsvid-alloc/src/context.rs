//! Shared analysis context for allocator runs.

use alsvid_ir::Module;

use crate::deps::DependencyMap;
use crate::error::AllocResult;
use crate::layers::Layers;

/// Memoized per-module analysis results.
///
/// Dependency extraction and layering are computed once per allocator
/// invocation and handed to every component by reference; the context is
/// invalidated whenever the module's statements change.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Two-qubit dependencies per statement.
    pub deps: DependencyMap,
    /// Layer decomposition.
    pub layers: Layers,
}

impl Analysis {
    /// Analyze `module`.
    pub fn of(module: &Module) -> AllocResult<Self> {
        Ok(Self {
            deps: DependencyMap::build(module)?,
            layers: Layers::build(module),
        })
    }
}
