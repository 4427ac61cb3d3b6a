//! Top-level allocation drivers.
//!
//! Every driver consumes a module (inlined to the primitive basis), the
//! coupling graph and the shared [`Analysis`](crate::context::Analysis), and
//! rewrites the module in place while reporting the chosen initial mapping
//! and the weighted cost.

pub mod bmt;
pub mod dynprog;
pub mod ibm;
pub mod jku;
pub mod simple;

use alsvid_ir::Module;

use crate::context::Analysis;
use crate::error::{AllocError, AllocResult};
use crate::finders::MappingFinderKind;
use crate::graph::CouplingGraph;
use crate::mapping::Mapping;
use crate::path::PathFinderKind;
use crate::solution::CostConfig;
use crate::builders::SolutionBuilderKind;

pub use bmt::LayeredBmtAllocator;
pub use dynprog::DynprogAllocator;
pub use ibm::IbmAllocator;
pub use jku::JkuAllocator;
pub use simple::SimpleAllocator;

/// What an allocator run produced, next to the rewritten module.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    /// Initial logical→physical mapping (device-padded).
    pub initial: Mapping,
    /// Mapping after all inserted SWAPs.
    pub final_mapping: Mapping,
    /// Weighted cost of the corrective operations.
    pub cost: u64,
}

/// The closed set of allocator variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorKind {
    /// Identity placement + path-guided routing.
    IdentityPathGuided,
    /// Seeded random placement + path-guided routing.
    RandomPathGuided,
    /// Dependency-frequency placement + path-guided routing.
    WeightedPathGuided,
    /// Identity placement + bridge-only solving.
    IdentityQbitter,
    /// Exact dynamic programming over the permutation lattice.
    Dynprog,
    /// Randomized per-layer greedy with serialization fallback.
    Ibm,
    /// A* search with a precomputed cost table.
    Jku,
    /// Layer-by-layer bounded partitioning.
    LayeredBmt,
}

impl AllocatorKind {
    /// Configuration key of this variant.
    pub fn name(self) -> &'static str {
        match self {
            AllocatorKind::IdentityPathGuided => "ident_path_guided",
            AllocatorKind::RandomPathGuided => "random_path_guided",
            AllocatorKind::WeightedPathGuided => "weighted_path_guided",
            AllocatorKind::IdentityQbitter => "ident_qbitter",
            AllocatorKind::Dynprog => "dynprog",
            AllocatorKind::Ibm => "ibm",
            AllocatorKind::Jku => "jku",
            AllocatorKind::LayeredBmt => "layered_bmt",
        }
    }

    /// Parse a configuration key.
    pub fn from_name(name: &str) -> AllocResult<Self> {
        Ok(match name {
            "ident_path_guided" => AllocatorKind::IdentityPathGuided,
            "random_path_guided" => AllocatorKind::RandomPathGuided,
            "weighted_path_guided" => AllocatorKind::WeightedPathGuided,
            "ident_qbitter" => AllocatorKind::IdentityQbitter,
            "dynprog" => AllocatorKind::Dynprog,
            "ibm" => AllocatorKind::Ibm,
            "jku" => AllocatorKind::Jku,
            "layered_bmt" => AllocatorKind::LayeredBmt,
            other => return Err(AllocError::UnknownAllocator(other.to_string())),
        })
    }
}

/// Shared allocator knobs.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorConfig {
    /// Operation cost weights.
    pub costs: CostConfig,
    /// Seed for every randomized component.
    pub seed: u64,
    /// Trial count for the randomized per-layer search.
    pub trials: u32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            costs: CostConfig::default(),
            seed: 0xA15D,
            trials: 20,
        }
    }
}

/// Run the chosen allocator over `module`, rewriting it in place.
pub fn run_allocator(
    kind: AllocatorKind,
    module: &mut Module,
    g: &CouplingGraph,
    analysis: &Analysis,
    config: &AllocatorConfig,
) -> AllocResult<AllocationOutcome> {
    let path_guided = SolutionBuilderKind::PathGuided {
        finder: PathFinderKind::Bfs,
        improve_initial: false,
    };
    match kind {
        AllocatorKind::IdentityPathGuided => SimpleAllocator {
            finder: MappingFinderKind::Identity,
            builder: path_guided,
        }
        .allocate(module, g, analysis, config.costs),
        AllocatorKind::RandomPathGuided => SimpleAllocator {
            finder: MappingFinderKind::Random { seed: config.seed },
            builder: path_guided,
        }
        .allocate(module, g, analysis, config.costs),
        AllocatorKind::WeightedPathGuided => SimpleAllocator {
            finder: MappingFinderKind::Weighted,
            builder: SolutionBuilderKind::PathGuided {
                finder: PathFinderKind::Bfs,
                improve_initial: true,
            },
        }
        .allocate(module, g, analysis, config.costs),
        AllocatorKind::IdentityQbitter => SimpleAllocator {
            finder: MappingFinderKind::Identity,
            builder: SolutionBuilderKind::Qbitter,
        }
        .allocate(module, g, analysis, config.costs),
        AllocatorKind::Dynprog => DynprogAllocator.allocate(module, g, analysis, config.costs),
        AllocatorKind::Ibm => IbmAllocator {
            seed: config.seed,
            trials: config.trials,
        }
        .allocate(module, g, analysis, config.costs),
        AllocatorKind::Jku => JkuAllocator.allocate(module, g, analysis, config.costs),
        AllocatorKind::LayeredBmt => {
            LayeredBmtAllocator.allocate(module, g, analysis, config.costs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            AllocatorKind::IdentityPathGuided,
            AllocatorKind::RandomPathGuided,
            AllocatorKind::WeightedPathGuided,
            AllocatorKind::IdentityQbitter,
            AllocatorKind::Dynprog,
            AllocatorKind::Ibm,
            AllocatorKind::Jku,
            AllocatorKind::LayeredBmt,
        ] {
            assert_eq!(AllocatorKind::from_name(kind.name()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_config_error() {
        assert!(matches!(
            AllocatorKind::from_name("sabre"),
            Err(AllocError::UnknownAllocator(_))
        ));
    }
}
