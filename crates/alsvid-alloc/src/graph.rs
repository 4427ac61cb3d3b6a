//! The device coupling graph.
//!
//! Vertices are the physical qubits `0..P`; a directed edge `(u, v)` means a
//! native CNOT with control `u` and target `v`. The graph always keeps its
//! undirected closure: adding `(u, v)` also records `(v, u)` and marks it as
//! a *reverse* edge unless the opposite direction was (or later becomes)
//! native. Routing may use reverse edges freely; emitting a CNOT across one
//! costs a Hadamard-wrapped reversal.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use alsvid_ir::Register;

use crate::error::{AllocError, AllocResult};
use crate::path::PathFinderKind;

/// Directed coupling graph over dense physical qubit ids.
#[derive(Debug, Clone)]
pub struct CouplingGraph {
    succ: Vec<Vec<u32>>,
    pred: Vec<Vec<u32>>,
    reverse: FxHashSet<(u32, u32)>,
    weights: FxHashMap<(u32, u32), f64>,
    weighted: bool,
    names: Vec<String>,
    name_to_id: FxHashMap<String, u32>,
    registers: Vec<Register>,
}

impl CouplingGraph {
    /// Create a graph with `n` qubits in a single register `q`.
    pub fn new(n: u32) -> Self {
        Self::with_registers(vec![Register::new("q", n)])
    }

    /// Create a graph whose qubits are laid out by the given registers.
    pub fn with_registers(registers: Vec<Register>) -> Self {
        let mut names = Vec::new();
        let mut name_to_id = FxHashMap::default();
        for reg in &registers {
            for i in 0..reg.size {
                let name = format!("{}[{}]", reg.name, i);
                name_to_id.insert(name.clone(), names.len() as u32);
                names.push(name);
            }
        }
        let n = names.len();
        Self {
            succ: vec![Vec::new(); n],
            pred: vec![Vec::new(); n],
            reverse: FxHashSet::default(),
            weights: FxHashMap::default(),
            weighted: false,
            names,
            name_to_id,
            registers,
        }
    }

    /// Number of physical qubits.
    #[inline]
    pub fn size(&self) -> u32 {
        self.succ.len() as u32
    }

    #[inline]
    fn check_vertex(&self, v: u32) {
        assert!(
            v < self.size(),
            "physical qubit {v} out of range (device has {})",
            self.size()
        );
    }

    /// Add a native edge `(u, v)`; the reverse direction is recorded as a
    /// reverse edge unless it is (or becomes) native itself.
    pub fn add_edge(&mut self, u: u32, v: u32) {
        self.check_vertex(u);
        self.check_vertex(v);

        if self.has_edge(u, v) {
            // Upgrade a closure edge to a native one.
            self.reverse.remove(&(u, v));
        } else {
            self.succ[u as usize].push(v);
            self.pred[v as usize].push(u);
        }
        if !self.has_edge(v, u) {
            self.succ[v as usize].push(u);
            self.pred[u as usize].push(v);
            self.reverse.insert((v, u));
        }
    }

    /// Add a native edge carrying a weight (e.g. an error rate).
    pub fn add_weighted_edge(&mut self, u: u32, v: u32, w: f64) {
        self.add_edge(u, v);
        self.weights.insert((u, v), w);
        self.weighted = true;
    }

    /// True when `(u, v)` is usable in this direction, closure included.
    pub fn has_edge(&self, u: u32, v: u32) -> bool {
        self.check_vertex(u);
        self.check_vertex(v);
        self.succ[u as usize].contains(&v)
    }

    /// True when `(u, v)` exists only to complete the undirected closure.
    pub fn is_reverse_edge(&self, u: u32, v: u32) -> bool {
        self.reverse.contains(&(u, v))
    }

    /// True when a native CNOT with control `u`, target `v` exists.
    pub fn is_native(&self, u: u32, v: u32) -> bool {
        self.has_edge(u, v) && !self.is_reverse_edge(u, v)
    }

    /// True when the qubits are coupled in some direction.
    pub fn connected(&self, u: u32, v: u32) -> bool {
        self.has_edge(u, v)
    }

    /// Successors of `u` (closure included), in insertion order.
    pub fn succ(&self, u: u32) -> &[u32] {
        self.check_vertex(u);
        &self.succ[u as usize]
    }

    /// Predecessors of `u` (closure included), in insertion order.
    pub fn pred(&self, u: u32) -> &[u32] {
        self.check_vertex(u);
        &self.pred[u as usize]
    }

    /// Undirected neighbourhood of `u`.
    pub fn adj(&self, u: u32) -> &[u32] {
        // Closure keeps succ symmetric, so succ is the full neighbourhood.
        self.succ(u)
    }

    /// Native directed edges, in `(u asc, insertion)` order.
    pub fn native_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (0..self.size()).flat_map(move |u| {
            self.succ[u as usize]
                .iter()
                .filter(move |&&v| !self.is_reverse_edge(u, v))
                .map(move |&v| (u, v))
        })
    }

    /// True when at least one edge carries a weight.
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// Weight of the native edge `(u, v)`, if any.
    pub fn weight(&self, u: u32, v: u32) -> Option<f64> {
        self.weights.get(&(u, v)).copied()
    }

    /// Printable name of a vertex.
    pub fn name(&self, v: u32) -> &str {
        self.check_vertex(v);
        &self.names[v as usize]
    }

    /// Vertex id for a `reg[i]` name.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.name_to_id.get(name).copied()
    }

    /// The device registers.
    pub fn registers(&self) -> &[Register] {
        &self.registers
    }

    /// Shortest undirected path between two qubits (BFS delegate).
    pub fn shortest_path(&self, u: u32, v: u32) -> AllocResult<Vec<u32>> {
        PathFinderKind::Bfs.find(self, u, v)
    }

    // --- named devices ---

    /// Linear chain `0 → 1 → … → n-1`.
    pub fn linear(n: u32) -> Self {
        let mut g = Self::new(n);
        for i in 0..n.saturating_sub(1) {
            g.add_edge(i, i + 1);
        }
        g
    }

    /// Fully connected device.
    pub fn full(n: u32) -> Self {
        let mut g = Self::new(n);
        for u in 0..n {
            for v in (u + 1)..n {
                g.add_edge(u, v);
            }
        }
        g
    }

    /// The 5-qubit IBM QX2 coupling:
    /// `0→1, 0→2, 1→2, 3→2, 3→4, 4→2`.
    pub fn qx2() -> Self {
        let mut g = Self::new(5);
        for (u, v) in [(0, 1), (0, 2), (1, 2), (3, 2), (3, 4), (4, 2)] {
            g.add_edge(u, v);
        }
        g
    }

    /// The 5-qubit IBM QX4 coupling:
    /// `1→0, 2→0, 2→1, 3→2, 3→4, 2→4`.
    pub fn qx4() -> Self {
        let mut g = Self::new(5);
        for (u, v) in [(1, 0), (2, 0), (2, 1), (3, 2), (3, 4), (2, 4)] {
            g.add_edge(u, v);
        }
        g
    }

    // --- loaders ---

    /// Parse the JSON device description:
    ///
    /// ```json
    /// {
    ///   "qubits": 2,
    ///   "registers": [{ "name": "q", "qubits": 2 }],
    ///   "adj": [[{ "v": "q[1]" }], []]
    /// }
    /// ```
    ///
    /// `adj[i]` lists the native successors of flat vertex `i` by name; an
    /// entry may carry a weight `w`.
    pub fn from_json_str(text: &str) -> AllocResult<Self> {
        let desc: ArchDesc = serde_json::from_str(text)?;
        let total: u32 = desc.registers.iter().map(|r| r.qubits).sum();
        if total != desc.qubits {
            return Err(AllocError::InvalidArch(format!(
                "registers sum to {total} qubits, expected {}",
                desc.qubits
            )));
        }
        let mut g = Self::with_registers(
            desc.registers
                .into_iter()
                .map(|r| Register::new(r.name, r.qubits))
                .collect(),
        );
        if desc.adj.len() != g.size() as usize {
            return Err(AllocError::InvalidArch(format!(
                "adjacency table has {} rows, expected {}",
                desc.adj.len(),
                g.size()
            )));
        }
        for (u, row) in desc.adj.iter().enumerate() {
            for entry in row {
                let v = g
                    .id_of(&entry.v)
                    .ok_or_else(|| AllocError::InvalidArch(format!("unknown vertex '{}'", entry.v)))?;
                match entry.w {
                    Some(w) => g.add_weighted_edge(u as u32, v, w),
                    None => g.add_edge(u as u32, v),
                }
            }
        }
        Ok(g)
    }

    /// Parse the plain-text form: first token is the qubit count, then one
    /// `u v` pair per edge.
    pub fn from_text(text: &str) -> AllocResult<Self> {
        let mut tokens = text.split_whitespace();
        let n: u32 = tokens
            .next()
            .ok_or_else(|| AllocError::InvalidArch("empty description".into()))?
            .parse()
            .map_err(|_| AllocError::InvalidArch("qubit count is not a number".into()))?;
        let mut g = Self::new(n);
        loop {
            let Some(u) = tokens.next() else { break };
            let v = tokens
                .next()
                .ok_or_else(|| AllocError::InvalidArch("dangling edge endpoint".into()))?;
            let parse = |s: &str| -> AllocResult<u32> {
                let id: u32 = s
                    .parse()
                    .map_err(|_| AllocError::InvalidArch(format!("bad vertex '{s}'")))?;
                if id >= n {
                    return Err(AllocError::InvalidArch(format!("vertex {id} out of range")));
                }
                Ok(id)
            };
            g.add_edge(parse(u)?, parse(v)?);
        }
        Ok(g)
    }
}

#[derive(Debug, Deserialize)]
struct ArchDesc {
    qubits: u32,
    registers: Vec<RegDesc>,
    adj: Vec<Vec<AdjDesc>>,
}

#[derive(Debug, Deserialize)]
struct RegDesc {
    name: String,
    qubits: u32,
}

#[derive(Debug, Deserialize)]
struct AdjDesc {
    v: String,
    #[serde(default)]
    w: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_and_reverse_marks() {
        let g = CouplingGraph::linear(3);
        assert!(g.is_native(0, 1));
        assert!(g.has_edge(1, 0));
        assert!(g.is_reverse_edge(1, 0));
        assert!(!g.is_native(1, 0));
        assert!(!g.connected(0, 2));
    }

    #[test]
    fn test_reverse_upgrades_to_native() {
        let mut g = CouplingGraph::new(2);
        g.add_edge(0, 1);
        assert!(g.is_reverse_edge(1, 0));
        g.add_edge(1, 0);
        assert!(g.is_native(1, 0));
        assert!(g.is_native(0, 1));
    }

    #[test]
    fn test_qx2_shape() {
        let g = CouplingGraph::qx2();
        assert_eq!(g.size(), 5);
        assert!(g.is_native(0, 1));
        assert!(g.is_native(4, 2));
        assert!(g.is_reverse_edge(2, 4));
        assert_eq!(g.native_edges().count(), 6);
    }

    #[test]
    fn test_names() {
        let g = CouplingGraph::qx2();
        assert_eq!(g.name(3), "q[3]");
        assert_eq!(g.id_of("q[4]"), Some(4));
        assert_eq!(g.id_of("nope[0]"), None);
    }

    #[test]
    fn test_json_round() {
        let text = r#"{
            "qubits": 3,
            "registers": [{ "name": "q", "qubits": 3 }],
            "adj": [
                [{ "v": "q[1]" }],
                [{ "v": "q[2]", "w": 0.25 }],
                []
            ]
        }"#;
        let g = CouplingGraph::from_json_str(text).unwrap();
        assert!(g.is_native(0, 1));
        assert!(g.is_native(1, 2));
        assert!(g.is_weighted());
        assert_eq!(g.weight(1, 2), Some(0.25));
        assert_eq!(g.weight(0, 1), None);
    }

    #[test]
    fn test_json_bad_vertex() {
        let text = r#"{
            "qubits": 1,
            "registers": [{ "name": "q", "qubits": 1 }],
            "adj": [[{ "v": "q[7]" }]]
        }"#;
        assert!(matches!(
            CouplingGraph::from_json_str(text),
            Err(AllocError::InvalidArch(_))
        ));
    }

    #[test]
    fn test_text_form() {
        let g = CouplingGraph::from_text("3\n0 1\n1 2\n").unwrap();
        assert!(g.is_native(0, 1));
        assert!(g.is_reverse_edge(2, 1));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_is_fatal() {
        let g = CouplingGraph::linear(2);
        g.has_edge(0, 9);
    }
}
