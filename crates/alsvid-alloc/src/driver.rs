//! The programmatic compilation entry point.

use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument};

use alsvid_ir::{Module, Statement};

use crate::allocators::{run_allocator, AllocatorConfig, AllocatorKind};
use crate::context::Analysis;
use crate::error::{AllocError, AllocResult};
use crate::graph::CouplingGraph;
use crate::mapping::{identity_mapping, Mapping};
use crate::quality::{evaluate, ModuleQuality};
use crate::rewrite::apply_solution;
use crate::solution::{CostConfig, Solution};
use crate::verify::{verify_architecture, verify_semantics};

/// Everything a compilation run needs to know.
#[derive(Debug, Clone)]
pub struct CompilationSettings {
    /// The target device.
    pub arch: CouplingGraph,
    /// Which allocator drives the run.
    pub allocator: AllocatorKind,
    /// Per-gate weights for the quality evaluation.
    pub gate_weights: FxHashMap<String, u32>,
    /// Corrective-operation cost weights.
    pub costs: CostConfig,
    /// Seed for every randomized component.
    pub seed: u64,
    /// Trial count for the randomized per-layer allocator.
    pub trials: u32,
    /// Regroup statements layer by layer before allocating.
    pub reorder: bool,
    /// Run the architecture and semantic verifiers on the result.
    pub verify: bool,
    /// Allocate even when the program is already legal as placed.
    pub force: bool,
}

impl CompilationSettings {
    /// Settings with conventional defaults for `arch`.
    pub fn new(arch: CouplingGraph) -> Self {
        Self {
            arch,
            allocator: AllocatorKind::WeightedPathGuided,
            gate_weights: [("u".to_string(), 1), ("cx".to_string(), 10)]
                .into_iter()
                .collect(),
            costs: CostConfig::default(),
            seed: 0xA15D,
            trials: 20,
            reorder: false,
            verify: true,
            force: false,
        }
    }
}

/// The result of a compilation run.
#[derive(Debug)]
pub struct CompiledModule {
    /// The rewritten module, on physical registers.
    pub module: Module,
    /// Initial logical→physical mapping, one entry per program qubit.
    pub initial: Mapping,
    /// Mapping after all inserted SWAPs, one entry per program qubit.
    pub final_mapping: Mapping,
    /// Weighted cost of the corrective operations.
    pub cost: u64,
    /// Architecture verdict; `None` when verification was off.
    pub arch_ok: Option<bool>,
    /// Semantic verdict; `None` when verification was off or the device is
    /// too large to simulate.
    pub semantics_ok: Option<bool>,
    /// Quality figures of the rewritten module.
    pub quality: ModuleQuality,
}

/// Compile `module` for the device in `settings`.
///
/// The module is inlined to the `{u, cx}` basis, optionally regrouped by
/// layers, allocated, and finally measured and verified. Verification
/// failures are reported on the result, never as errors.
#[instrument(skip_all, fields(allocator = settings.allocator.name()))]
pub fn compile(module: Module, settings: &CompilationSettings) -> AllocResult<CompiledModule> {
    let g = &settings.arch;
    let l = module.num_qubits();
    if l > g.size() {
        return Err(AllocError::ProgramTooLarge {
            required: l,
            available: g.size(),
        });
    }

    let mut working = module;
    working.inline(&["u", "cx"])?;
    let original = settings.verify.then(|| working.clone());

    let mut analysis = Analysis::of(&working)?;
    if settings.reorder {
        let order = analysis.layers.statement_order();
        let reordered: Vec<Statement> = {
            let stmts = working.statements();
            order.iter().map(|&i| stmts[i].clone()).collect()
        };
        working.set_statements(reordered);
        analysis = Analysis::of(&working)?;
    }

    info!(
        qubits = l,
        device = g.size(),
        statements = working.statements().len(),
        "compiling"
    );

    let already_legal = analysis
        .deps
        .entries()
        .iter()
        .all(|e| e.deps.iter().all(|d| g.is_native(d.from, d.to)));

    let outcome = if already_legal && !settings.force {
        debug!("program is legal in place; skipping allocation");
        let solution = Solution {
            initial: identity_mapping(g.size()),
            op_seqs: Vec::new(),
            cost: 0,
        };
        let final_mapping = apply_solution(&mut working, g, &solution)?;
        crate::allocators::AllocationOutcome {
            initial: solution.initial,
            final_mapping,
            cost: 0,
        }
    } else {
        let config = AllocatorConfig {
            costs: settings.costs,
            seed: settings.seed,
            trials: settings.trials,
        };
        run_allocator(settings.allocator, &mut working, g, &analysis, &config)?
    };
    info!(cost = outcome.cost, "allocation complete");

    let arch_ok = settings.verify.then(|| verify_architecture(&working, g));
    let semantics_ok = match original.as_ref() {
        Some(orig) => match verify_semantics(orig, &working, &outcome.initial) {
            Ok(ok) => Some(ok),
            Err(AllocError::DeviceTooLarge { .. }) => {
                debug!("device too large for the semantic verifier; skipping");
                None
            }
            Err(e) => return Err(e),
        },
        None => None,
    };
    if arch_ok == Some(false) || semantics_ok == Some(false) {
        info!(?arch_ok, ?semantics_ok, "verification flagged the result");
    }

    let quality = evaluate(&working, &settings.gate_weights)?;

    Ok(CompiledModule {
        initial: outcome.initial[..l as usize].to_vec(),
        final_mapping: outcome.final_mapping[..l as usize].to_vec(),
        cost: outcome.cost,
        arch_ok,
        semantics_ok,
        quality,
        module: working,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_ir::QubitId;

    #[test]
    fn test_empty_program() {
        let result = compile(
            Module::with_size(0, 0),
            &CompilationSettings::new(CouplingGraph::qx2()),
        )
        .unwrap();
        assert_eq!(result.cost, 0);
        assert!(result.initial.is_empty());
        assert!(result.module.statements().is_empty());
        assert_eq!(result.quality.gates, 0);
    }

    #[test]
    fn test_legal_program_short_circuits() {
        let mut m = Module::with_size(2, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        let result = compile(m, &CompilationSettings::new(CouplingGraph::qx2())).unwrap();
        assert_eq!(result.cost, 0);
        assert_eq!(result.initial, vec![0, 1]);
        assert_eq!(
            result.module.statements(),
            &[Statement::Cx {
                control: QubitId(0),
                target: QubitId(1)
            }]
        );
        assert_eq!(result.arch_ok, Some(true));
        assert_eq!(result.semantics_ok, Some(true));
    }

    #[test]
    fn test_program_too_large() {
        let m = Module::with_size(9, 0);
        let err = compile(m, &CompilationSettings::new(CouplingGraph::qx2())).unwrap_err();
        assert!(matches!(err, AllocError::ProgramTooLarge { .. }));
    }

    #[test]
    fn test_force_runs_allocator() {
        let mut m = Module::with_size(2, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        let mut settings = CompilationSettings::new(CouplingGraph::qx2());
        settings.force = true;
        settings.allocator = AllocatorKind::IdentityPathGuided;
        let result = compile(m, &settings).unwrap();
        assert_eq!(result.cost, 0);
        assert_eq!(result.arch_ok, Some(true));
        assert_eq!(result.semantics_ok, Some(true));
    }
}
