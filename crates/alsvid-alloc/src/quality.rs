//! Module quality metrics.

use rustc_hash::FxHashMap;
use tracing::warn;

use alsvid_ir::Module;

use crate::error::AllocResult;
use crate::layers::Layers;

/// Quality figures for a module, measured on the primitive basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleQuality {
    /// Number of layers.
    pub depth: u32,
    /// Number of statements.
    pub gates: u32,
    /// Sum of per-gate weights over all statements.
    pub weighted_cost: u64,
}

/// Evaluate `module` after inlining to the `{u, cx}` basis.
///
/// Gates without a weight are counted in `gates`/`depth` but contribute
/// nothing to `weighted_cost` (with a warning).
pub fn evaluate(module: &Module, weights: &FxHashMap<String, u32>) -> AllocResult<ModuleQuality> {
    let mut inlined = module.clone();
    inlined.inline(&["u", "cx"])?;

    let layers = Layers::build(&inlined);

    let mut counts: FxHashMap<&str, u64> = FxHashMap::default();
    for stmt in inlined.statements() {
        *counts.entry(stmt.op_name()).or_insert(0) += 1;
    }

    let mut weighted_cost = 0u64;
    for (name, count) in &counts {
        match weights.get(*name) {
            Some(&w) => weighted_cost += u64::from(w) * count,
            None => warn!("no weight for gate '{name}'"),
        }
    }

    Ok(ModuleQuality {
        depth: layers.len() as u32,
        gates: inlined.statements().len() as u32,
        weighted_cost,
    })
}
