//! Solution builders: turn (initial mapping, dependency list) into per-
//! statement operation sequences.

use rustc_hash::FxHashMap;

use crate::deps::{Dep, DepEntry};
use crate::error::{AllocError, AllocResult};
use crate::graph::CouplingGraph;
use crate::mapping::{invert_mapping, Mapping};
use crate::path::PathFinderKind;
use crate::solution::{CostConfig, OpSequence, Operation, Solution};

/// Strategy producing the operation sequences of a [`Solution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionBuilderKind {
    /// Route every dependency along a shortest path, swapping qubits
    /// together and falling back to reversals and bridges where they are
    /// cheaper. Mutates the running mapping as swaps accumulate.
    PathGuided {
        /// Path strategy for the routing.
        finder: PathFinderKind,
        /// Promote the first routing of untouched qubits into edits of the
        /// initial mapping instead of emitting SWAPs.
        improve_initial: bool,
    },
    /// Satisfy every non-adjacent dependency with a bridge; never moves a
    /// qubit. Fails when a dependency has no one-intermediate path.
    Qbitter,
}

impl SolutionBuilderKind {
    /// Build a solution for `entries` starting from `initial`.
    pub fn build(
        &self,
        initial: Mapping,
        entries: &[DepEntry],
        g: &CouplingGraph,
        costs: CostConfig,
    ) -> AllocResult<Solution> {
        match self {
            SolutionBuilderKind::PathGuided {
                finder,
                improve_initial,
            } => path_guided(initial, entries, g, costs, *finder, *improve_initial),
            SolutionBuilderKind::Qbitter => qbitter(initial, entries, g, costs),
        }
    }
}

fn single_dep(entry: &DepEntry) -> AllocResult<Dep> {
    if entry.deps.len() != 1 {
        return Err(AllocError::MultiDependency {
            stmt: entry.stmt,
            count: entry.deps.len(),
        });
    }
    Ok(entry.deps[0])
}

fn count_frequencies(entries: &[DepEntry]) -> FxHashMap<(u32, u32), u32> {
    let mut freq = FxHashMap::default();
    for entry in entries {
        for dep in &entry.deps {
            *freq.entry((dep.from, dep.to)).or_insert(0) += 1;
        }
    }
    freq
}

fn path_guided(
    initial: Mapping,
    entries: &[DepEntry],
    g: &CouplingGraph,
    costs: CostConfig,
    finder: PathFinderKind,
    improve_initial: bool,
) -> AllocResult<Solution> {
    let p = g.size();
    let mut solution = Solution {
        initial: initial.clone(),
        op_seqs: Vec::with_capacity(entries.len()),
        cost: 0,
    };

    let mut freq = count_frequencies(entries);
    let mut frozen = vec![false; p as usize];
    let mut current = initial;

    for entry in entries {
        let dep = single_dep(entry)?;
        let key = (dep.from, dep.to);
        let (a, b) = (dep.from as usize, dep.to as usize);
        let mut ops = Vec::new();
        let mut promote = improve_initial;

        let mut u = current[a];
        let mut v = current[b];
        let mut inv = invert_mapping(p, &current);
        let path = finder.find(g, u, v)?;

        // A one-intermediate pair used for the last time is cheaper bridged
        // than swapped there and back.
        if path.len() == 3 && freq[&key] <= 1 {
            ops.push(Operation::Bridge {
                from: dep.from,
                mid: inv[path[1] as usize],
                to: dep.to,
            });
            solution.cost += u64::from(costs.bridge);
            for &q in &path {
                frozen[q as usize] = true;
            }
            if let Some(count) = freq.get_mut(&key) {
                *count -= 1;
            }
            solution.op_seqs.push(OpSequence {
                stmt: entry.stmt,
                ops,
            });
            continue;
        }

        if path.len() > 2 {
            for &q in &path {
                if frozen[q as usize] {
                    promote = false;
                }
                frozen[q as usize] = true;
            }

            for i in (1..=path.len() - 2).rev() {
                let (mut su, mut sv) = (path[i], path[i + 1]);
                if g.is_reverse_edge(su, sv) {
                    std::mem::swap(&mut su, &mut sv);
                }

                let sa = inv[su as usize];
                let sb = inv[sv as usize];
                ops.push(Operation::Swap { a: sa, b: sb });

                if promote {
                    solution.initial.swap(sa as usize, sb as usize);
                }
                current.swap(sa as usize, sb as usize);
                inv.swap(su as usize, sv as usize);
            }

            if promote {
                // First touch of every qubit on the path: fold the swaps
                // into the initial placement instead.
                ops.clear();
            } else {
                solution.cost += u64::from(costs.swap) * ops.len() as u64;
            }

            u = current[a];
            v = current[b];
        }

        if g.is_native(u, v) {
            ops.push(Operation::Cnot {
                from: dep.from,
                to: dep.to,
            });
        } else if freq[&key] <= 1 {
            // Last occurrence across a reverse-only edge.
            ops.push(Operation::Rev {
                from: dep.from,
                to: dep.to,
            });
            solution.cost += u64::from(costs.rev);
        } else {
            // The pair recurs: flip it around once so every future
            // occurrence is native.
            if !frozen[u as usize] && !frozen[v as usize] {
                solution.initial.swap(a, b);
            } else {
                ops.push(Operation::Swap {
                    a: dep.from,
                    b: dep.to,
                });
                solution.cost += u64::from(costs.swap);
            }
            current.swap(a, b);
            ops.push(Operation::Cnot {
                from: dep.from,
                to: dep.to,
            });
        }

        frozen[u as usize] = true;
        frozen[v as usize] = true;
        if let Some(count) = freq.get_mut(&key) {
            *count -= 1;
        }
        solution.op_seqs.push(OpSequence {
            stmt: entry.stmt,
            ops,
        });
    }

    Ok(solution)
}

fn qbitter(
    initial: Mapping,
    entries: &[DepEntry],
    g: &CouplingGraph,
    costs: CostConfig,
) -> AllocResult<Solution> {
    let p = g.size();
    let inv = invert_mapping(p, &initial);
    let mut solution = Solution {
        initial: initial.clone(),
        op_seqs: Vec::with_capacity(entries.len()),
        cost: 0,
    };

    for entry in entries {
        let dep = single_dep(entry)?;
        let u = initial[dep.from as usize];
        let v = initial[dep.to as usize];

        let op = if g.is_native(u, v) {
            Operation::Cnot {
                from: dep.from,
                to: dep.to,
            }
        } else if g.connected(u, v) {
            solution.cost += u64::from(costs.rev);
            Operation::Rev {
                from: dep.from,
                to: dep.to,
            }
        } else {
            let path = PathFinderKind::Bfs.find(g, u, v)?;
            if path.len() != 3 {
                return Err(AllocError::BridgeUnavailable {
                    from: u,
                    to: v,
                    len: path.len(),
                });
            }
            solution.cost += u64::from(costs.bridge);
            Operation::Bridge {
                from: dep.from,
                mid: inv[path[1] as usize],
                to: dep.to,
            }
        };

        solution.op_seqs.push(OpSequence {
            stmt: entry.stmt,
            ops: vec![op],
        });
    }

    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::identity_mapping;

    fn entries_of(pairs: &[(u32, u32)]) -> Vec<DepEntry> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(from, to))| DepEntry {
                stmt: i,
                deps: vec![Dep { from, to }],
            })
            .collect()
    }

    fn plain_path_guided() -> SolutionBuilderKind {
        SolutionBuilderKind::PathGuided {
            finder: PathFinderKind::Bfs,
            improve_initial: false,
        }
    }

    #[test]
    fn test_adjacent_native_is_free() {
        let g = CouplingGraph::linear(3);
        let sol = plain_path_guided()
            .build(identity_mapping(3), &entries_of(&[(0, 1)]), &g, CostConfig::default())
            .unwrap();
        assert_eq!(sol.cost, 0);
        assert_eq!(sol.op_seqs.len(), 1);
        assert_eq!(sol.op_seqs[0].ops, vec![Operation::Cnot { from: 0, to: 1 }]);
    }

    #[test]
    fn test_reverse_last_occurrence_gets_rev() {
        let g = CouplingGraph::linear(3);
        let sol = plain_path_guided()
            .build(identity_mapping(3), &entries_of(&[(1, 0)]), &g, CostConfig::default())
            .unwrap();
        assert_eq!(sol.cost, 4);
        assert_eq!(sol.op_seqs[0].ops, vec![Operation::Rev { from: 1, to: 0 }]);
    }

    #[test]
    fn test_recurring_reverse_flips_initial() {
        // (1, 0) twice on a 0→1 device: flipping the placement once beats
        // paying the reversal twice.
        let g = CouplingGraph::linear(2);
        let sol = plain_path_guided()
            .build(
                identity_mapping(2),
                &entries_of(&[(1, 0), (1, 0)]),
                &g,
                CostConfig::default(),
            )
            .unwrap();
        assert_eq!(sol.initial, vec![1, 0]);
        assert_eq!(sol.cost, 0);
        assert_eq!(sol.op_seqs[0].ops, vec![Operation::Cnot { from: 1, to: 0 }]);
        assert_eq!(sol.op_seqs[1].ops, vec![Operation::Cnot { from: 1, to: 0 }]);
    }

    #[test]
    fn test_far_pair_on_line_swaps() {
        let g = CouplingGraph::linear(5);
        let sol = plain_path_guided()
            .build(identity_mapping(5), &entries_of(&[(0, 4)]), &g, CostConfig::default())
            .unwrap();
        let swaps = sol.op_seqs[0]
            .ops
            .iter()
            .filter(|op| matches!(op, Operation::Swap { .. }))
            .count();
        // Path 0-1-2-3-4: three swaps walk the target next to the control.
        assert_eq!(swaps, 3);
        assert_eq!(sol.cost, 3 * 7);
        assert!(matches!(
            sol.op_seqs[0].ops.last(),
            Some(Operation::Cnot { from: 0, to: 4 })
        ));
    }

    #[test]
    fn test_improve_initial_discards_swaps() {
        let g = CouplingGraph::linear(5);
        let builder = SolutionBuilderKind::PathGuided {
            finder: PathFinderKind::Bfs,
            improve_initial: true,
        };
        let sol = builder
            .build(identity_mapping(5), &entries_of(&[(0, 4)]), &g, CostConfig::default())
            .unwrap();
        assert_eq!(sol.cost, 0);
        assert_eq!(sol.op_seqs[0].ops, vec![Operation::Cnot { from: 0, to: 4 }]);
        // The edit lands logical 4 next to logical 0.
        assert!(g.connected(sol.initial[0], sol.initial[4]));
    }

    #[test]
    fn test_promotion_blocked_by_frozen_qubits() {
        let g = CouplingGraph::linear(5);
        let builder = SolutionBuilderKind::PathGuided {
            finder: PathFinderKind::Bfs,
            improve_initial: true,
        };
        // First dependency freezes qubits 0 and 1; routing (0, 4) then
        // touches frozen 0, so its swaps must be real.
        let sol = builder
            .build(
                identity_mapping(5),
                &entries_of(&[(0, 1), (0, 4)]),
                &g,
                CostConfig::default(),
            )
            .unwrap();
        assert_eq!(sol.initial, vec![0, 1, 2, 3, 4]);
        assert!(sol.cost >= 7);
    }

    #[test]
    fn test_lone_distance_two_pair_bridges() {
        let g = CouplingGraph::linear(3);
        let sol = plain_path_guided()
            .build(identity_mapping(3), &entries_of(&[(0, 2)]), &g, CostConfig::default())
            .unwrap();
        assert_eq!(sol.cost, 10);
        assert_eq!(
            sol.op_seqs[0].ops,
            vec![Operation::Bridge {
                from: 0,
                mid: 1,
                to: 2
            }]
        );
    }

    #[test]
    fn test_repeated_distance_two_pair_swaps_instead() {
        let g = CouplingGraph::linear(3);
        let sol = plain_path_guided()
            .build(
                identity_mapping(3),
                &entries_of(&[(0, 2), (0, 2)]),
                &g,
                CostConfig::default(),
            )
            .unwrap();
        // First occurrence routes with a swap; second is then adjacent.
        assert!(matches!(
            sol.op_seqs[0].ops[0],
            Operation::Swap { .. }
        ));
        assert_eq!(sol.cost, 7);
    }

    #[test]
    fn test_qbitter_never_moves_qubits() {
        let g = CouplingGraph::linear(3);
        let sol = SolutionBuilderKind::Qbitter
            .build(
                identity_mapping(3),
                &entries_of(&[(0, 2), (0, 2)]),
                &g,
                CostConfig::default(),
            )
            .unwrap();
        assert_eq!(sol.initial, vec![0, 1, 2]);
        assert_eq!(sol.cost, 20);
        for seq in &sol.op_seqs {
            assert!(matches!(seq.ops[0], Operation::Bridge { mid: 1, .. }));
        }
    }

    #[test]
    fn test_qbitter_rejects_long_paths() {
        let g = CouplingGraph::linear(4);
        let err = SolutionBuilderKind::Qbitter
            .build(identity_mapping(4), &entries_of(&[(0, 3)]), &g, CostConfig::default())
            .unwrap_err();
        assert!(matches!(err, AllocError::BridgeUnavailable { len: 4, .. }));
    }
}
