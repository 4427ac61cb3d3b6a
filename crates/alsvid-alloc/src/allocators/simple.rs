//! Pipeline allocator: mapping finder + solution builder.

use alsvid_ir::Module;
use tracing::debug;

use crate::builders::SolutionBuilderKind;
use crate::context::Analysis;
use crate::error::AllocResult;
use crate::finders::MappingFinderKind;
use crate::graph::CouplingGraph;
use crate::rewrite::apply_solution;
use crate::solution::CostConfig;

use super::AllocationOutcome;

/// The two-stage allocator: find an initial placement, then solve every
/// dependency against it.
#[derive(Debug, Clone, Copy)]
pub struct SimpleAllocator {
    /// Initial-placement strategy.
    pub finder: MappingFinderKind,
    /// Dependency-solving strategy.
    pub builder: SolutionBuilderKind,
}

impl SimpleAllocator {
    /// Allocate `module`, rewriting it in place.
    pub fn allocate(
        &self,
        module: &mut Module,
        g: &CouplingGraph,
        analysis: &Analysis,
        costs: CostConfig,
    ) -> AllocResult<AllocationOutcome> {
        let entries = analysis.deps.entries();
        let initial = self.finder.find(g, entries);
        debug!(deps = entries.len(), "simple allocation");

        let solution = self.builder.build(initial, entries, g, costs)?;
        let initial = solution.initial.clone();
        let final_mapping = apply_solution(module, g, &solution)?;

        Ok(AllocationOutcome {
            initial,
            final_mapping,
            cost: solution.cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathFinderKind;
    use alsvid_ir::QubitId;

    #[test]
    fn test_legal_program_is_untouched() {
        let mut m = Module::with_size(2, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        let g = CouplingGraph::qx2();
        let analysis = Analysis::of(&m).unwrap();

        let outcome = SimpleAllocator {
            finder: MappingFinderKind::Identity,
            builder: SolutionBuilderKind::PathGuided {
                finder: PathFinderKind::Bfs,
                improve_initial: false,
            },
        }
        .allocate(&mut m, &g, &analysis, CostConfig::default())
        .unwrap();

        assert_eq!(outcome.cost, 0);
        assert_eq!(outcome.initial, vec![0, 1, 2, 3, 4]);
        assert_eq!(outcome.final_mapping, outcome.initial);
        assert_eq!(m.statements().len(), 1);
    }
}
