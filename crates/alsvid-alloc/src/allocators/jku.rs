//! A* allocator with a precomputed pairwise cost table.
//!
//! Processes the program layer by layer. For each layer an A* search over
//! swap combinations finds the cheapest mapping under which every CNOT of
//! the layer is at worst one reversal away; a second heuristic peeks at the
//! next CNOT layer. Unmapped qubits are seeded greedily just before the
//! search. A final backward sweep assigns the qubits only ever touched by
//! single-qubit gates and recovers the initial mapping.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use alsvid_ir::{Module, QubitId, Statement};
use tracing::debug;

use crate::context::Analysis;
use crate::deps::Dep;
use crate::error::{AllocError, AllocResult};
use crate::graph::CouplingGraph;
use crate::mapping::{fill_mapping, mapping_to_string, InverseMap, Mapping, UNDEF};
use crate::path::PathFinderKind;
use crate::rewrite::{declare_intrinsics, INTRINSIC_REV_CX, INTRINSIC_SWAP};
use crate::solution::CostConfig;

use super::AllocationOutcome;

/// Table value for disconnected pairs.
const FAR: u32 = 1 << 20;

/// Fixed-cost increment per swap; the table is scaled the same way.
const SWAP_STEP: u32 = 7;
/// A state is done with a dependency once its table cost is at most one
/// reversal.
const REV_STEP: u32 = 4;

#[derive(Debug, Clone)]
struct AStarNode {
    cost_fixed: u32,
    cost_table_heur: u32,
    cost_next_heur: u32,
    depth: u32,
    mapping: Mapping,
    inverse: InverseMap,
    swaps: Vec<(u32, u32)>,
    finished: bool,
}

impl AStarNode {
    fn total(&self) -> u32 {
        self.cost_fixed + self.cost_table_heur + self.cost_next_heur
    }
}

impl PartialEq for AStarNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AStarNode {}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the maximum, so "better" must compare greater:
        // lower total first, then finished states, then the state with the
        // smaller heuristic remainder (the more progressed one).
        other
            .total()
            .cmp(&self.total())
            .then_with(|| self.finished.cmp(&other.finished))
            .then_with(|| {
                (other.total() - other.cost_fixed).cmp(&(self.total() - self.cost_fixed))
            })
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

enum Emit {
    /// A swap between two physical qubits, emitted between layers.
    Swap(u32, u32),
    /// A statement already rewritten onto physical operands.
    Fixed(Statement),
    /// A statement waiting for its qubits to be placed (backward sweep).
    Pending(Statement),
}

/// The A* heuristic allocator.
#[derive(Debug, Clone, Copy)]
pub struct JkuAllocator;

impl JkuAllocator {
    /// Allocate `module`, rewriting it in place.
    pub fn allocate(
        &self,
        module: &mut Module,
        g: &CouplingGraph,
        analysis: &Analysis,
        costs: CostConfig,
    ) -> AllocResult<AllocationOutcome> {
        let p = g.size() as usize;
        let l = module.num_qubits() as usize;

        // Regroup statements by layer; swaps land on layer boundaries.
        let order = analysis.layers.statement_order();
        let stmts = module.statements();
        let reordered: Vec<Statement> = order.iter().map(|&i| stmts[i].clone()).collect();
        module.set_statements(reordered);
        let analysis = Analysis::of(module)?;

        let table = build_cost_table(g)?;

        let mut mapping: Mapping = vec![UNDEF; l];
        let mut inverse: InverseMap = vec![UNDEF; p];

        // Layer indices that carry at least one CNOT.
        let mut cnot_layers: VecDeque<usize> = VecDeque::new();
        for (i, layer) in analysis.layers.iter().enumerate() {
            if layer.iter().any(|&s| !analysis.deps.deps_of(s).is_empty()) {
                cnot_layers.push_back(i);
            }
        }

        let layer_deps = |i: usize| -> Vec<(usize, Dep)> {
            analysis
                .layers
                .get(i)
                .iter()
                .filter_map(|&s| {
                    analysis
                        .deps
                        .deps_of(s)
                        .first()
                        .map(|&d| (s, d))
                })
                .collect()
        };

        let mut emitted: Vec<Emit> = Vec::new();
        let mut nswaps = 0u64;
        let mut nrevs = 0u64;

        for i in 0..analysis.layers.len() {
            for &stmt in analysis.layers.get(i) {
                let deps = analysis.deps.deps_of(stmt);
                if deps.len() > 1 {
                    return Err(AllocError::MultiDependency {
                        stmt,
                        count: deps.len(),
                    });
                }
            }

            let node = astar(
                g,
                &table,
                &mut cnot_layers,
                i,
                &layer_deps,
                &mut mapping,
                &mut inverse,
            )?;
            mapping = node.mapping;
            inverse = node.inverse;

            if i != 0 {
                for &(u, v) in &node.swaps {
                    emitted.push(Emit::Swap(u, v));
                    nswaps += 1;
                }
            }

            for &stmt_idx in analysis.layers.get(i) {
                let stmt = analysis_statement(module, stmt_idx);
                let deps = analysis.deps.deps_of(stmt_idx);

                if deps.is_empty() {
                    if stmt.qubits().iter().all(|q| mapping[q.index()] != UNDEF) {
                        let mut remapped = stmt;
                        remapped.map_qubits(&mut |q| QubitId(mapping[q.index()]));
                        emitted.push(Emit::Fixed(remapped));
                    } else {
                        emitted.push(Emit::Pending(stmt));
                    }
                    continue;
                }

                let dep = deps[0];
                let u = mapping[dep.from as usize];
                let v = mapping[dep.to as usize];
                let (wrapper, _) = split_wrapper(&stmt);

                let payload = if g.is_native(u, v) {
                    Statement::Cx {
                        control: QubitId(u),
                        target: QubitId(v),
                    }
                } else if g.connected(u, v) {
                    nrevs += 1;
                    Statement::Call {
                        gate: INTRINSIC_REV_CX.into(),
                        qubits: vec![QubitId(u), QubitId(v)],
                    }
                } else {
                    return Err(AllocError::Unroutable {
                        stmt: stmt_idx,
                        mapping: mapping_to_string(&mapping),
                    });
                };
                emitted.push(Emit::Fixed(rewrap(payload, wrapper)));
            }
        }

        // Backward sweep: undo swaps to learn per-point mappings, place the
        // qubits that only single-qubit gates touch, recover the initial
        // mapping.
        let mut back_mapping = mapping.clone();
        let mut back_inverse = inverse.clone();
        for emit in emitted.iter_mut().rev() {
            match emit {
                Emit::Swap(u, v) => {
                    let a = back_inverse[*u as usize];
                    let b = back_inverse[*v as usize];
                    if a != UNDEF {
                        back_mapping[a as usize] = *v;
                    }
                    if b != UNDEF {
                        back_mapping[b as usize] = *u;
                    }
                    back_inverse.swap(*u as usize, *v as usize);
                }
                Emit::Pending(stmt) => {
                    for q in stmt.qubits() {
                        if back_mapping[q.index()] == UNDEF {
                            let free = back_inverse
                                .iter()
                                .position(|&x| x == UNDEF)
                                .expect("device has room for every program qubit");
                            back_mapping[q.index()] = free as u32;
                            back_inverse[free] = q.0;
                        }
                    }
                    let mut remapped = stmt.clone();
                    remapped.map_qubits(&mut |q| QubitId(back_mapping[q.index()]));
                    *emit = Emit::Fixed(remapped);
                }
                Emit::Fixed(_) => {}
            }
        }

        let statements: Vec<Statement> = emitted
            .into_iter()
            .map(|e| match e {
                Emit::Swap(u, v) => Statement::Call {
                    gate: INTRINSIC_SWAP.into(),
                    qubits: vec![QubitId(u), QubitId(v)],
                },
                Emit::Fixed(stmt) => stmt,
                Emit::Pending(_) => unreachable!("backward sweep resolves every pending statement"),
            })
            .collect();

        module.set_qregs(g.registers().to_vec());
        declare_intrinsics(module)?;
        module.set_statements(statements);

        let mut initial = back_mapping;
        fill_mapping(&mut initial, g.size());
        let mut final_mapping = mapping;
        fill_mapping(&mut final_mapping, g.size());

        let cost = nswaps * u64::from(costs.swap) + nrevs * u64::from(costs.rev);
        debug!(swaps = nswaps, revs = nrevs, cost, "jku allocation");

        Ok(AllocationOutcome {
            initial,
            final_mapping,
            cost,
        })
    }
}

fn analysis_statement(module: &Module, idx: usize) -> Statement {
    module.statements()[idx].clone()
}

fn split_wrapper(stmt: &Statement) -> (Option<(String, u64)>, Statement) {
    match stmt {
        Statement::If { creg, value, inner } => {
            (Some((creg.clone(), *value)), (**inner).clone())
        }
        other => (None, other.clone()),
    }
}

fn rewrap(payload: Statement, wrapper: Option<(String, u64)>) -> Statement {
    match wrapper {
        Some((creg, value)) => Statement::If {
            creg,
            value,
            inner: Box::new(payload),
        },
        None => payload,
    }
}

/// `table[u][v] = 7·(hops − 1) + 4` extra when every hop is reverse-only.
fn build_cost_table(g: &CouplingGraph) -> AllocResult<Vec<Vec<u32>>> {
    let p = g.size() as usize;
    let mut table = vec![vec![0u32; p]; p];
    for u in 0..p {
        for v in 0..p {
            if u == v {
                continue;
            }
            let path = match PathFinderKind::Bfs.find(g, u as u32, v as u32) {
                Ok(path) => path,
                Err(_) => {
                    table[u][v] = FAR;
                    continue;
                }
            };
            let mut cost = (path.len() as u32 - 2) * SWAP_STEP;
            let only_reverse = path
                .windows(2)
                .all(|w| !g.is_native(w[0], w[1]));
            if only_reverse {
                cost += REV_STEP;
            }
            table[u][v] = cost;
        }
    }
    Ok(table)
}

struct ExpandState<'a> {
    g: &'a CouplingGraph,
    table: &'a [Vec<u32>],
    queue: &'a mut BinaryHeap<AStarNode>,
    qubits_in_layer: &'a [u32],
    processed: Vec<bool>,
    swaps: Vec<(u32, u32)>,
    curr_deps: &'a [(usize, Dep)],
    next_deps: &'a [(usize, Dep)],
}

#[allow(clippy::too_many_arguments)]
fn astar(
    g: &CouplingGraph,
    table: &[Vec<u32>],
    cnot_layers: &mut VecDeque<usize>,
    layer: usize,
    layer_deps: &dyn Fn(usize) -> Vec<(usize, Dep)>,
    mapping: &mut Mapping,
    inverse: &mut InverseMap,
) -> AllocResult<AStarNode> {
    let p = inverse.len();

    if cnot_layers.front() == Some(&layer) {
        cnot_layers.pop_front();
    }
    let next_layer = cnot_layers.front().copied();

    let curr_deps = layer_deps(layer);
    let next_deps = next_layer.map(layer_deps).unwrap_or_default();

    let mut qubits_in_layer = Vec::new();
    let mut max_cost = 0u32;

    for &(stmt, dep) in &curr_deps {
        let (a, b) = (dep.from as usize, dep.to as usize);
        qubits_in_layer.push(dep.from);
        qubits_in_layer.push(dep.to);

        if mapping[a] == UNDEF && mapping[b] == UNDEF {
            // Claim the smallest wholly-free coupling edge.
            let mut edge = None;
            for u in 0..p as u32 {
                if inverse[u as usize] != UNDEF {
                    continue;
                }
                for &v in g.succ(u) {
                    if inverse[v as usize] != UNDEF {
                        continue;
                    }
                    if edge.is_none_or(|(eu, ev)| (u, v) < (eu, ev)) {
                        edge = Some((u, v));
                    }
                }
            }
            let Some((u, v)) = edge else {
                return Err(AllocError::Unroutable {
                    stmt,
                    mapping: mapping_to_string(mapping),
                });
            };
            mapping[a] = u;
            mapping[b] = v;
            inverse[u as usize] = dep.from;
            inverse[v as usize] = dep.to;
        } else if mapping[a] == UNDEF || mapping[b] == UNDEF {
            let (unmapped, mapped) = if mapping[a] == UNDEF {
                (a, b)
            } else {
                (b, a)
            };
            let u = mapping[mapped] as usize;

            let mut best: Option<(u32, u32)> = None; // (cost, vertex)
            for v in 0..p {
                if inverse[v] != UNDEF {
                    continue;
                }
                let cost = if mapped == a { table[u][v] } else { table[v][u] };
                if best.is_none_or(|(c, _)| cost < c) {
                    best = Some((cost, v as u32));
                }
            }
            let Some((cost, v)) = best else {
                return Err(AllocError::Unroutable {
                    stmt,
                    mapping: mapping_to_string(mapping),
                });
            };
            if cost >= FAR {
                return Err(AllocError::Unroutable {
                    stmt,
                    mapping: mapping_to_string(mapping),
                });
            }
            mapping[unmapped] = v;
            inverse[v as usize] = if unmapped == a { dep.from } else { dep.to };
        }

        let cost = table[mapping[a] as usize][mapping[b] as usize];
        if cost >= FAR {
            return Err(AllocError::Unroutable {
                stmt,
                mapping: mapping_to_string(mapping),
            });
        }
        max_cost = max_cost.max(cost);
    }

    let seed = AStarNode {
        cost_fixed: 0,
        cost_table_heur: max_cost,
        cost_next_heur: 0,
        depth: 0,
        mapping: mapping.clone(),
        inverse: inverse.clone(),
        swaps: Vec::new(),
        finished: max_cost <= REV_STEP,
    };

    let mut queue = BinaryHeap::new();
    queue.push(seed);

    while !queue.peek().expect("queue never drains without an answer").finished {
        let node = queue.pop().expect("peeked just above");

        let mut state = ExpandState {
            g,
            table,
            queue: &mut queue,
            qubits_in_layer: &qubits_in_layer,
            processed: vec![false; p],
            swaps: Vec::new(),
            curr_deps: &curr_deps,
            next_deps: &next_deps,
        };
        expand_node(&node, 0, &mut state);

        if queue.is_empty() {
            let stmt = curr_deps.first().map_or(0, |&(s, _)| s);
            return Err(AllocError::Unroutable {
                stmt,
                mapping: mapping_to_string(mapping),
            });
        }
    }

    Ok(queue.pop().expect("loop ends on a finished head"))
}

fn expand_node(node: &AStarNode, idx: usize, state: &mut ExpandState<'_>) {
    if idx == state.qubits_in_layer.len() {
        if state.swaps.is_empty() {
            return;
        }

        let mut next = AStarNode {
            cost_fixed: node.cost_fixed + SWAP_STEP * state.swaps.len() as u32,
            cost_table_heur: 0,
            cost_next_heur: 0,
            depth: node.depth + 5,
            mapping: node.mapping.clone(),
            inverse: node.inverse.clone(),
            swaps: node.swaps.clone(),
            finished: true,
        };

        for &(u, v) in &state.swaps {
            let a = next.inverse[u as usize];
            let b = next.inverse[v as usize];
            if a != UNDEF {
                next.mapping[a as usize] = v;
            }
            if b != UNDEF {
                next.mapping[b as usize] = u;
            }
            next.inverse.swap(u as usize, v as usize);
        }
        next.swaps.extend_from_slice(&state.swaps);

        for &(_, dep) in state.curr_deps {
            let cost = state.table[next.mapping[dep.from as usize] as usize]
                [next.mapping[dep.to as usize] as usize];
            next.cost_table_heur += cost;
            next.finished = next.finished && cost <= REV_STEP;
        }

        for &(_, dep) in state.next_deps {
            let u = next.mapping[dep.from as usize];
            let v = next.mapping[dep.to as usize];
            let heur = if u == UNDEF && v == UNDEF {
                0
            } else if u == UNDEF || v == UNDEF {
                let mapped = if u == UNDEF {
                    next.mapping[dep.to as usize]
                } else {
                    next.mapping[dep.from as usize]
                } as usize;
                (0..next.inverse.len())
                    .filter(|&w| next.inverse[w] == UNDEF)
                    .map(|w| state.table[mapped][w])
                    .min()
                    .unwrap_or(0)
            } else if u != v {
                state.table[u as usize][v as usize]
            } else {
                0
            };
            next.cost_next_heur += heur;
        }

        state.queue.push(next);
        return;
    }

    expand_node(node, idx + 1, state);

    let base = node.mapping[state.qubits_in_layer[idx] as usize];
    if base == UNDEF || state.processed[base as usize] {
        return;
    }
    let neighbours: Vec<u32> = state.g.adj(base).to_vec();
    for v in neighbours {
        if state.processed[v as usize] {
            continue;
        }
        let (su, sv) = if state.g.is_reverse_edge(base, v) {
            (v, base)
        } else {
            (base, v)
        };
        state.processed[su as usize] = true;
        state.processed[sv as usize] = true;
        state.swaps.push((su, sv));

        expand_node(node, idx + 1, state);

        state.swaps.pop();
        state.processed[su as usize] = false;
        state.processed[sv as usize] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_ir::ClbitId;

    fn run(module: &mut Module, g: &CouplingGraph) -> AllocationOutcome {
        let analysis = Analysis::of(module).unwrap();
        JkuAllocator
            .allocate(module, g, &analysis, CostConfig::default())
            .unwrap()
    }

    #[test]
    fn test_cost_table_values() {
        let g = CouplingGraph::linear(3);
        let table = build_cost_table(&g).unwrap();
        assert_eq!(table[0][1], 0); // adjacent, native
        assert_eq!(table[1][0], 4); // adjacent, reverse-only
        assert_eq!(table[0][2], 7); // one hop away, native steps exist
        assert_eq!(table[2][0], 7 + 4); // one hop, every step reversed
    }

    #[test]
    fn test_single_cnot_is_free() {
        let mut m = Module::with_size(2, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        let g = CouplingGraph::linear(2);
        let outcome = run(&mut m, &g);
        assert_eq!(outcome.cost, 0);
        assert_eq!(
            m.statements(),
            &[Statement::Cx {
                control: QubitId(0),
                target: QubitId(1)
            }]
        );
    }

    #[test]
    fn test_lone_reversed_pair_seeds_natively() {
        // With nothing placed yet, seeding lines the control up with the
        // native edge direction; no reversal is needed.
        let mut m = Module::with_size(2, 0);
        m.cx(QubitId(1), QubitId(0)).unwrap();
        let g = CouplingGraph::linear(2);
        let outcome = run(&mut m, &g);
        assert_eq!(outcome.cost, 0);
        assert_eq!(outcome.initial[..2], [1, 0]);
        assert_eq!(
            m.statements(),
            &[Statement::Cx {
                control: QubitId(0),
                target: QubitId(1)
            }]
        );
    }

    #[test]
    fn test_pinned_reversed_pair_pays_reversal() {
        // The first layer pins the placement; the opposing CNOT in the next
        // layer crosses the edge backwards.
        let mut m = Module::with_size(2, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        m.cx(QubitId(1), QubitId(0)).unwrap();
        let g = CouplingGraph::linear(2);
        let outcome = run(&mut m, &g);
        assert_eq!(outcome.cost, 4);
        match &m.statements()[1] {
            Statement::Call { gate, qubits } => {
                assert_eq!(gate, INTRINSIC_REV_CX);
                assert_eq!(qubits, &[QubitId(1), QubitId(0)]);
            }
            other => panic!("expected reversal intrinsic, got {other:?}"),
        }
    }

    #[test]
    fn test_lone_single_qubit_gates_get_placed() {
        let mut m = Module::with_size(2, 1);
        m.h(QubitId(1)).unwrap();
        m.measure(QubitId(1), ClbitId(0)).unwrap();
        let g = CouplingGraph::linear(3);
        let outcome = run(&mut m, &g);
        assert_eq!(outcome.cost, 0);
        assert_eq!(m.statements().len(), 2);
        // Both statements follow logical qubit 1 to one physical home.
        let homes: Vec<_> = m
            .statements()
            .iter()
            .map(|s| s.qubits()[0])
            .collect();
        assert_eq!(homes[0], homes[1]);
        assert_eq!(outcome.initial[1], homes[0].0);
    }

    #[test]
    fn test_far_pair_gets_swapped_in() {
        let mut m = Module::with_size(4, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        m.cx(QubitId(2), QubitId(3)).unwrap();
        m.cx(QubitId(0), QubitId(3)).unwrap();
        let g = CouplingGraph::linear(4);
        let outcome = run(&mut m, &g);
        // Layer two forces movement: some swaps must be paid.
        assert!(outcome.cost > 0);
        let swaps = m
            .statements()
            .iter()
            .filter(
                |s| matches!(s, Statement::Call { gate, .. } if gate == INTRINSIC_SWAP),
            )
            .count();
        assert!(swaps > 0);
    }
}
