//! Randomized per-layer allocator.
//!
//! For each layer, runs a bounded number of trials of a greedy search over
//! swaps, each trial steering by squared distances perturbed with seeded
//! Gaussian noise. A layer no trial can satisfy is serialized statement by
//! statement; a lone statement that still cannot be placed is fatal.

use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64;
use tracing::debug;

use alsvid_ir::{Module, Statement};

use crate::context::Analysis;
use crate::deps::{Dep, DependencyMap};
use crate::error::{AllocError, AllocResult};
use crate::graph::CouplingGraph;
use crate::mapping::{invert_mapping, mapping_to_string, Mapping};
use crate::path::PathFinderKind;
use crate::rewrite::apply_solution;
use crate::solution::{CostConfig, OpSequence, Operation, Solution};

use super::AllocationOutcome;

/// Distance stand-in for disconnected pairs; large enough to dominate, small
/// enough to square without overflow.
const FAR: u64 = 1 << 20;

/// The randomized trial-based allocator.
#[derive(Debug, Clone, Copy)]
pub struct IbmAllocator {
    /// RNG seed; fixed seed means identical output.
    pub seed: u64,
    /// Trials per layer.
    pub trials: u32,
}

struct LayerResult {
    map: Mapping,
    ops: Vec<Operation>,
    success: bool,
}

impl IbmAllocator {
    /// Allocate `module`, rewriting it in place.
    ///
    /// Statements are regrouped layer by layer first — swaps are emitted at
    /// layer boundaries, so the emission order must follow the layer walk.
    pub fn allocate(
        &self,
        module: &mut Module,
        g: &CouplingGraph,
        analysis: &Analysis,
        costs: CostConfig,
    ) -> AllocResult<AllocationOutcome> {
        let p = g.size() as usize;

        let order = analysis.layers.statement_order();
        let stmts = module.statements();
        let reordered: Vec<Statement> = order.iter().map(|&i| stmts[i].clone()).collect();
        module.set_statements(reordered);
        let analysis = Analysis::of(module)?;

        let mut dist = vec![vec![0u64; p]; p];
        for i in 0..p {
            for j in 0..p {
                if i == j {
                    continue;
                }
                dist[i][j] = match PathFinderKind::Bfs.find(g, i as u32, j as u32) {
                    Ok(path) => (path.len() - 1) as u64,
                    Err(_) => FAR,
                };
            }
        }

        let mut rng = Pcg64::seed_from_u64(self.seed);
        let normal =
            Normal::new(0.0, 1.0 / p as f64).expect("standard deviation is positive");

        // Seed mapping: walk the device, packing qubits next to their
        // neighbours.
        let mut current = vec![0u32; p];
        {
            let mut allocated = vec![false; p];
            let mut i = 0;
            'seed: for u in 0..p {
                if !allocated[u] {
                    current[i] = u as u32;
                    allocated[u] = true;
                    i += 1;
                    if i >= p {
                        break 'seed;
                    }
                }
                for &v in g.succ(u as u32) {
                    if !allocated[v as usize] {
                        current[i] = v;
                        allocated[v as usize] = true;
                        i += 1;
                        if i >= p {
                            break 'seed;
                        }
                    }
                }
            }
        }

        let mut op_seqs: Vec<OpSequence> = Vec::new();
        let mut total_cost = 0u64;
        let mut first_layer = true;
        let mut initial: Mapping = current.clone();

        for layer in analysis.layers.iter() {
            let result =
                self.try_allocate_layer(layer, &analysis.deps, &current, g, &dist, &mut rng, normal)?;

            if result.success {
                current = result.map;
                let mut pending = result.ops;
                if first_layer {
                    // The first placed layer fixes the initial mapping; its
                    // swaps are absorbed into it.
                    initial = current.clone();
                    pending.clear();
                    first_layer = false;
                }
                total_cost += u64::from(costs.swap) * pending.len() as u64;
                self.emit_layer(
                    layer,
                    &analysis.deps,
                    &current,
                    g,
                    costs,
                    pending,
                    &mut op_seqs,
                    &mut total_cost,
                )?;
            } else {
                debug!("serializing layer of {} statements", layer.len());
                for &stmt in layer {
                    let single = [stmt];
                    let result = self.try_allocate_layer(
                        &single,
                        &analysis.deps,
                        &current,
                        g,
                        &dist,
                        &mut rng,
                        normal,
                    )?;
                    if !result.success {
                        return Err(AllocError::Unroutable {
                            stmt,
                            mapping: mapping_to_string(&current),
                        });
                    }
                    current = result.map;
                    let mut pending = result.ops;
                    if first_layer {
                        initial = current.clone();
                        pending.clear();
                        first_layer = false;
                    }
                    total_cost += u64::from(costs.swap) * pending.len() as u64;
                    self.emit_layer(
                        &single,
                        &analysis.deps,
                        &current,
                        g,
                        costs,
                        pending,
                        &mut op_seqs,
                        &mut total_cost,
                    )?;
                }
            }
        }

        let solution = Solution {
            initial: initial.clone(),
            op_seqs,
            cost: total_cost,
        };
        let final_mapping = apply_solution(module, g, &solution)?;

        Ok(AllocationOutcome {
            initial,
            final_mapping,
            cost: total_cost,
        })
    }

    /// Attach `pending` swaps to the layer's first dependency statement and
    /// emit the per-dependency CNOT or reversal.
    #[allow(clippy::too_many_arguments)]
    fn emit_layer(
        &self,
        layer: &[usize],
        deps: &DependencyMap,
        current: &Mapping,
        g: &CouplingGraph,
        costs: CostConfig,
        mut pending: Vec<Operation>,
        op_seqs: &mut Vec<OpSequence>,
        total_cost: &mut u64,
    ) -> AllocResult<()> {
        for &stmt in layer {
            let stmt_deps = deps.deps_of(stmt);
            if stmt_deps.is_empty() {
                continue;
            }
            if stmt_deps.len() > 1 {
                return Err(AllocError::MultiDependency {
                    stmt,
                    count: stmt_deps.len(),
                });
            }
            let dep = stmt_deps[0];
            let u = current[dep.from as usize];
            let v = current[dep.to as usize];
            let op = if g.is_native(u, v) {
                Operation::Cnot {
                    from: dep.from,
                    to: dep.to,
                }
            } else if g.connected(u, v) {
                *total_cost += u64::from(costs.rev);
                Operation::Rev {
                    from: dep.from,
                    to: dep.to,
                }
            } else {
                return Err(AllocError::Unroutable {
                    stmt,
                    mapping: mapping_to_string(current),
                });
            };

            let mut ops = std::mem::take(&mut pending);
            ops.push(op);
            op_seqs.push(OpSequence { stmt, ops });
        }
        debug_assert!(pending.is_empty(), "swaps with no dependency to carry them");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn try_allocate_layer(
        &self,
        layer: &[usize],
        deps_map: &DependencyMap,
        current: &Mapping,
        g: &CouplingGraph,
        dist: &[Vec<u64>],
        rng: &mut Pcg64,
        normal: Normal<f64>,
    ) -> AllocResult<LayerResult> {
        let p = g.size() as usize;

        let mut deps: Vec<Dep> = Vec::new();
        for &stmt in layer {
            let stmt_deps = deps_map.deps_of(stmt);
            if stmt_deps.len() > 1 {
                return Err(AllocError::MultiDependency {
                    stmt,
                    count: stmt_deps.len(),
                });
            }
            deps.extend_from_slice(stmt_deps);
        }

        let layer_dist = |map: &Mapping| -> u64 {
            deps.iter()
                .map(|d| dist[map[d.from as usize] as usize][map[d.to as usize] as usize])
                .sum()
        };

        if layer_dist(current) == deps.len() as u64 {
            return Ok(LayerResult {
                map: current.clone(),
                ops: Vec::new(),
                success: true,
            });
        }

        let mut best: Option<(u32, Mapping, Vec<Operation>)> = None;

        for _ in 0..self.trials {
            let mut trial_map = current.clone();
            let mut trial_assign = invert_mapping(p as u32, &trial_map);
            let mut trial_ops: Vec<Operation> = Vec::new();

            // Symmetric perturbed squared distances.
            let mut rdist = vec![vec![0f64; p]; p];
            for i in 0..p {
                for j in i..p {
                    let scale = 1.0 + normal.sample(rng);
                    let d = dist[i][j] as f64;
                    let val = scale * d * d;
                    rdist[i][j] = val;
                    rdist[j][i] = val;
                }
            }

            let layer_rdist = |map: &Mapping| -> f64 {
                deps.iter()
                    .map(|d| rdist[map[d.from as usize] as usize][map[d.to as usize] as usize])
                    .sum()
            };

            let mut rounds = 1u32;
            let max_rounds = 2 * p as u32 + 1;
            loop {
                let mut avail = vec![true; p];
                loop {
                    let mut min_cost = layer_rdist(&trial_map);
                    let mut best_swap: Option<(usize, usize)> = None;

                    for u in 0..p {
                        for &v in g.adj(u as u32) {
                            let v = v as usize;
                            if !avail[u] || !avail[v] {
                                continue;
                            }
                            let mut cand = trial_map.clone();
                            let la = trial_assign[u] as usize;
                            let lb = trial_assign[v] as usize;
                            cand.swap(la, lb);
                            let cand_cost = layer_rdist(&cand);
                            if cand_cost < min_cost {
                                min_cost = cand_cost;
                                best_swap = Some((u, v));
                            }
                        }
                    }

                    match best_swap {
                        Some((u, v)) => {
                            let la = trial_assign[u];
                            let lb = trial_assign[v];
                            trial_map.swap(la as usize, lb as usize);
                            trial_assign.swap(u, v);
                            avail[u] = false;
                            avail[v] = false;
                            trial_ops.push(Operation::Swap { a: la, b: lb });
                        }
                        None => break,
                    }
                }

                if layer_dist(&trial_map) == deps.len() as u64 {
                    break;
                }
                rounds += 1;
                if rounds >= max_rounds {
                    break;
                }
            }

            if layer_dist(&trial_map) == deps.len() as u64
                && best.as_ref().is_none_or(|(r, _, _)| rounds < *r)
            {
                best = Some((rounds, trial_map, trial_ops));
            }
        }

        Ok(match best {
            Some((_, map, ops)) => LayerResult {
                map,
                ops,
                success: true,
            },
            None => LayerResult {
                map: current.clone(),
                ops: Vec::new(),
                success: false,
            },
        })
    }
}
