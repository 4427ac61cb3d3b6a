//! Layered bounded-partition allocator.
//!
//! Phase one walks the layer-ordered dependency stream and greedily extends
//! a partial placement for as long as every new dependency either lands on
//! a coupled pair or can claim free physical qubits; when the placement can
//! no longer absorb a dependency the block is closed and a fresh placement
//! starts. Phase two stitches consecutive block placements together with a
//! token-routing swap chain along a spanning tree of the device.

use std::collections::VecDeque;

use alsvid_ir::{Module, Statement};
use tracing::debug;

use crate::context::Analysis;
use crate::deps::Dep;
use crate::error::{AllocError, AllocResult};
use crate::graph::CouplingGraph;
use crate::mapping::{fill_mapping, invert_mapping, mapping_to_string, Mapping, UNDEF};
use crate::rewrite::apply_solution;
use crate::solution::{CostConfig, OpSequence, Operation, Solution};

use super::AllocationOutcome;

/// The layered partition allocator.
#[derive(Debug, Clone, Copy)]
pub struct LayeredBmtAllocator;

struct Block {
    mapping: Mapping,
    deps: Vec<(usize, Dep)>,
}

impl LayeredBmtAllocator {
    /// Allocate `module`, rewriting it in place.
    pub fn allocate(
        &self,
        module: &mut Module,
        g: &CouplingGraph,
        analysis: &Analysis,
        costs: CostConfig,
    ) -> AllocResult<AllocationOutcome> {
        let p = g.size();

        let order = analysis.layers.statement_order();
        let stmts = module.statements();
        let reordered: Vec<Statement> = order.iter().map(|&i| stmts[i].clone()).collect();
        module.set_statements(reordered);
        let analysis = Analysis::of(module)?;

        // Phase 1: partition the dependency stream into embeddable blocks.
        let mut blocks: Vec<Block> = Vec::new();
        let mut mapping: Mapping = vec![UNDEF; p as usize];
        let mut inverse = vec![UNDEF; p as usize];
        let mut deps: Vec<(usize, Dep)> = Vec::new();
        let mut open = false;

        for entry in analysis.deps.entries() {
            if entry.deps.len() != 1 {
                return Err(AllocError::MultiDependency {
                    stmt: entry.stmt,
                    count: entry.deps.len(),
                });
            }
            let dep = entry.deps[0];

            if !try_place(g, &mut mapping, &mut inverse, dep) {
                // Close the running block and start over with this pair.
                let prev = blocks.last().map(|b| b.mapping.clone());
                close_block(&mut blocks, &mut mapping, &mut deps, prev, p);
                inverse = vec![UNDEF; p as usize];
                if !try_place(g, &mut mapping, &mut inverse, dep) {
                    return Err(AllocError::Unroutable {
                        stmt: entry.stmt,
                        mapping: mapping_to_string(&mapping),
                    });
                }
            }
            deps.push((entry.stmt, dep));
            open = true;
        }
        if open {
            let prev = blocks.last().map(|b| b.mapping.clone());
            close_block(&mut blocks, &mut mapping, &mut deps, prev, p);
        }
        debug!(blocks = blocks.len(), "layered partition");

        // Phase 2: emit per-block operations, routing tokens between blocks.
        let mut op_seqs: Vec<OpSequence> = Vec::new();
        let mut total_cost = 0u64;
        let initial = blocks
            .first()
            .map_or_else(|| crate::mapping::identity_mapping(p), |b| b.mapping.clone());

        for k in 0..blocks.len() {
            let mut pending: Vec<Operation> = Vec::new();
            if k > 0 {
                let steps = route_tokens(g, &blocks[k - 1].mapping, &blocks[k].mapping)?;
                let mut assign = invert_mapping(p, &blocks[k - 1].mapping);
                for (u, v) in steps {
                    pending.push(Operation::Swap {
                        a: assign[u as usize],
                        b: assign[v as usize],
                    });
                    assign.swap(u as usize, v as usize);
                }
                total_cost += u64::from(costs.swap) * pending.len() as u64;
            }

            for &(stmt, dep) in &blocks[k].deps {
                let u = blocks[k].mapping[dep.from as usize];
                let v = blocks[k].mapping[dep.to as usize];
                let op = if g.is_native(u, v) {
                    Operation::Cnot {
                        from: dep.from,
                        to: dep.to,
                    }
                } else {
                    total_cost += u64::from(costs.rev);
                    Operation::Rev {
                        from: dep.from,
                        to: dep.to,
                    }
                };
                let mut ops = std::mem::take(&mut pending);
                ops.push(op);
                op_seqs.push(OpSequence { stmt, ops });
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
}

/// Extend the partial placement with `dep`, or report that it cannot absorb
/// the pair.
fn try_place(g: &CouplingGraph, mapping: &mut Mapping, inverse: &mut Mapping, dep: Dep) -> bool {
    let (a, b) = (dep.from as usize, dep.to as usize);
    match (mapping[a] != UNDEF, mapping[b] != UNDEF) {
        (true, true) => g.connected(mapping[a], mapping[b]),
        (true, false) => {
            let Some(&v) = g
                .adj(mapping[a])
                .iter()
                .find(|&&v| inverse[v as usize] == UNDEF)
            else {
                return false;
            };
            mapping[b] = v;
            inverse[v as usize] = dep.to;
            true
        }
        (false, true) => {
            let Some(&u) = g
                .adj(mapping[b])
                .iter()
                .find(|&&u| inverse[u as usize] == UNDEF)
            else {
                return false;
            };
            mapping[a] = u;
            inverse[u as usize] = dep.from;
            true
        }
        (false, false) => {
            let Some((u, v)) = g.native_edges().find(|&(u, v)| {
                inverse[u as usize] == UNDEF && inverse[v as usize] == UNDEF
            }) else {
                return false;
            };
            mapping[a] = u;
            mapping[b] = v;
            inverse[u as usize] = dep.from;
            inverse[v as usize] = dep.to;
            true
        }
    }
}

/// Fill the block's placement (preferring the previous block's homes for
/// untouched qubits) and archive it.
fn close_block(
    blocks: &mut Vec<Block>,
    mapping: &mut Mapping,
    deps: &mut Vec<(usize, Dep)>,
    prev: Option<Mapping>,
    p: u32,
) {
    if let Some(prev) = prev {
        let mut taken = vec![false; p as usize];
        for &phys in mapping.iter() {
            if phys != UNDEF {
                taken[phys as usize] = true;
            }
        }
        for (logical, slot) in mapping.iter_mut().enumerate() {
            if *slot == UNDEF && logical < prev.len() {
                let home = prev[logical];
                if home != UNDEF && !taken[home as usize] {
                    *slot = home;
                    taken[home as usize] = true;
                }
            }
        }
    }
    fill_mapping(mapping, p);
    blocks.push(Block {
        mapping: std::mem::take(mapping),
        deps: std::mem::take(deps),
    });
    *mapping = vec![UNDEF; p as usize];
}

/// Physical swap steps turning assignment `from` into assignment `to`.
///
/// Positions are eliminated in reverse BFS-discovery order, so the
/// not-yet-frozen region stays connected and every token can still reach
/// its home through it.
fn route_tokens(g: &CouplingGraph, from: &Mapping, to: &Mapping) -> AllocResult<Vec<(u32, u32)>> {
    let p = g.size() as usize;

    // BFS discovery order over every component.
    let mut discovery: Vec<u32> = Vec::with_capacity(p);
    let mut seen = vec![false; p];
    for root in 0..p as u32 {
        if seen[root as usize] {
            continue;
        }
        seen[root as usize] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(u) = queue.pop_front() {
            discovery.push(u);
            for &v in g.adj(u) {
                if !seen[v as usize] {
                    seen[v as usize] = true;
                    queue.push_back(v);
                }
            }
        }
    }

    let mut current = from.clone();
    let mut assign = invert_mapping(p as u32, &current);
    let target_assign = invert_mapping(p as u32, to);

    let mut frozen = vec![false; p];
    let mut steps: Vec<(u32, u32)> = Vec::new();

    for &pos in discovery.iter().rev() {
        let wanted = target_assign[pos as usize];
        if assign[pos as usize] == wanted {
            frozen[pos as usize] = true;
            continue;
        }
        let start = current[wanted as usize];

        // BFS through unfrozen vertices only.
        let mut parent = vec![u32::MAX; p];
        let mut marked = vec![false; p];
        let mut queue = VecDeque::from([start]);
        marked[start as usize] = true;
        while let Some(u) = queue.pop_front() {
            if u == pos {
                break;
            }
            for &v in g.adj(u) {
                if !marked[v as usize] && !frozen[v as usize] {
                    marked[v as usize] = true;
                    parent[v as usize] = u;
                    queue.push_back(v);
                }
            }
        }
        if !marked[pos as usize] {
            return Err(AllocError::NoPath {
                from: start,
                to: pos,
            });
        }

        let mut path = vec![pos];
        let mut x = pos;
        while x != start {
            x = parent[x as usize];
            path.push(x);
        }
        path.reverse();

        for w in path.windows(2) {
            let (u, v) = (w[0], w[1]);
            let (la, lb) = (assign[u as usize], assign[v as usize]);
            current.swap(la as usize, lb as usize);
            assign.swap(u as usize, v as usize);
            steps.push((u, v));
        }
        frozen[pos as usize] = true;
    }

    debug_assert_eq!(current, *to);
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_ir::QubitId;

    fn run(module: &mut Module, g: &CouplingGraph) -> AllocationOutcome {
        let analysis = Analysis::of(module).unwrap();
        LayeredBmtAllocator
            .allocate(module, g, &analysis, CostConfig::default())
            .unwrap()
    }

    #[test]
    fn test_embeddable_program_is_one_block() {
        let mut m = Module::with_size(3, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        m.cx(QubitId(1), QubitId(2)).unwrap();
        let g = CouplingGraph::linear(3);
        let outcome = run(&mut m, &g);
        assert_eq!(outcome.cost, 0);
        assert_eq!(m.statements().len(), 2);
    }

    #[test]
    fn test_triangle_splits_blocks() {
        // K3 cannot embed in a line; phase two must pay swaps.
        let mut m = Module::with_size(3, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        m.cx(QubitId(0), QubitId(2)).unwrap();
        m.cx(QubitId(1), QubitId(2)).unwrap();
        let g = CouplingGraph::linear(3);
        let outcome = run(&mut m, &g);
        assert!(outcome.cost > 0);
    }

    #[test]
    fn test_route_tokens_realizes_target() {
        let g = CouplingGraph::linear(4);
        let from = vec![0, 1, 2, 3];
        let to = vec![3, 1, 0, 2];
        let steps = route_tokens(&g, &from, &to).unwrap();
        let mut assign = invert_mapping(4, &from);
        let target = invert_mapping(4, &to);
        for (u, v) in steps {
            assert!(g.connected(u, v));
            assign.swap(u as usize, v as usize);
        }
        assert_eq!(assign, target);
    }

    #[test]
    fn test_route_tokens_identity_is_empty() {
        let g = CouplingGraph::linear(3);
        let m = vec![1, 0, 2];
        assert!(route_tokens(&g, &m, &m).unwrap().is_empty());
    }
}
