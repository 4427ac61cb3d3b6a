//! Exact allocation by dynamic programming over the permutation lattice.

use alsvid_ir::Module;
use tracing::debug;

use crate::context::Analysis;
use crate::deps::Dep;
use crate::error::{AllocError, AllocResult};
use crate::graph::CouplingGraph;
use crate::mapping::invert_mapping;
use crate::rewrite::apply_solution;
use crate::solution::{CostConfig, OpSequence, Operation, Solution};
use crate::token_swap::TokenSwapTable;

use super::AllocationOutcome;

const INF: u64 = u64::MAX;

/// Optimal allocator: for every dependency and every device permutation,
/// tracks the cheapest way to reach a permutation satisfying the dependency.
/// Cost-optimal under the configured weights, factorial in device size —
/// construction refuses large devices via the token-swap guard.
#[derive(Debug, Clone, Copy)]
pub struct DynprogAllocator;

impl DynprogAllocator {
    /// Allocate `module`, rewriting it in place.
    pub fn allocate(
        &self,
        module: &mut Module,
        g: &CouplingGraph,
        analysis: &Analysis,
        costs: CostConfig,
    ) -> AllocResult<AllocationOutcome> {
        let table = TokenSwapTable::build(g)?;
        let n = table.num_perms();

        let mut deps: Vec<(usize, Dep)> = Vec::new();
        for entry in analysis.deps.entries() {
            if entry.deps.len() != 1 {
                return Err(AllocError::MultiDependency {
                    stmt: entry.stmt,
                    count: entry.deps.len(),
                });
            }
            deps.push((entry.stmt, entry.deps[0]));
        }
        let steps = deps.len();
        debug!(perms = n, deps = steps, "dynprog allocation");

        // Physical→logical view of every permutation, for swap lookups.
        let assigns: Vec<Vec<u32>> = (0..n)
            .map(|i| invert_mapping(g.size(), table.perm(i as u32)))
            .collect();

        let mut cost = vec![vec![INF; n]; steps + 1];
        let mut parent = vec![vec![u32::MAX; n]; steps + 1];
        cost[0] = vec![0; n];

        for t in 1..=steps {
            let dep = deps[t - 1].1;
            for tgt in 0..n {
                let perm = table.perm(tgt as u32);
                let u = perm[dep.from as usize];
                let v = perm[dep.to as usize];
                if !g.connected(u, v) {
                    continue;
                }
                let rev_extra = if g.is_reverse_edge(u, v) {
                    u64::from(costs.rev)
                } else {
                    0
                };

                let mut best = INF;
                let mut best_src = u32::MAX;
                for src in 0..n {
                    let base = cost[t - 1][src];
                    if base == INF {
                        continue;
                    }
                    let candidate = if src == tgt {
                        base + rev_extra
                    } else {
                        let Some(k) = table.nof_swaps(&assigns[src], &assigns[tgt]) else {
                            continue;
                        };
                        base + u64::from(costs.swap) * u64::from(k) + rev_extra
                    };
                    if candidate < best {
                        best = candidate;
                        best_src = src as u32;
                    }
                }
                if best < INF {
                    cost[t][tgt] = best;
                    parent[t][tgt] = best_src;
                }
            }

            if cost[t].iter().all(|&c| c == INF) {
                return Err(AllocError::Unroutable {
                    stmt: deps[t - 1].0,
                    mapping: "no reachable permutation satisfies the dependency".into(),
                });
            }
        }

        // Cheapest final state, then the permutation chain back to the start.
        let (best_idx, best_cost) = cost[steps]
            .iter()
            .enumerate()
            .min_by_key(|&(_, &c)| c)
            .map(|(i, &c)| (i as u32, c))
            .expect("permutation table is never empty");

        let mut chain = vec![0u32; steps + 1];
        chain[steps] = best_idx;
        for t in (1..=steps).rev() {
            chain[t - 1] = parent[t][chain[t] as usize];
        }

        let initial = table.perm(chain[0]).to_vec();
        let mut op_seqs = Vec::with_capacity(steps);
        for t in 1..=steps {
            let (stmt, dep) = deps[t - 1];
            let (src, tgt) = (chain[t - 1], chain[t]);
            let mut ops = Vec::new();

            if src != tgt {
                let mut assign = assigns[src as usize].clone();
                let swap_steps = table
                    .swaps(&assigns[src as usize], &assigns[tgt as usize])
                    .expect("transition chosen over a reachable permutation");
                for &(su, sv) in swap_steps {
                    ops.push(Operation::Swap {
                        a: assign[su as usize],
                        b: assign[sv as usize],
                    });
                    assign.swap(su as usize, sv as usize);
                }
            }

            let perm = table.perm(tgt);
            let u = perm[dep.from as usize];
            let v = perm[dep.to as usize];
            if g.is_native(u, v) {
                ops.push(Operation::Cnot {
                    from: dep.from,
                    to: dep.to,
                });
            } else {
                ops.push(Operation::Rev {
                    from: dep.from,
                    to: dep.to,
                });
            }
            op_seqs.push(OpSequence { stmt, ops });
        }

        let solution = Solution {
            initial: initial.clone(),
            op_seqs,
            cost: best_cost,
        };
        let final_mapping = apply_solution(module, g, &solution)?;

        Ok(AllocationOutcome {
            initial,
            final_mapping,
            cost: best_cost,
        })
    }
}
