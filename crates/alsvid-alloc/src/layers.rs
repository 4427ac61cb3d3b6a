//! Program layering.
//!
//! A layer is a maximal set of statements touching pairwise-disjoint bits.
//! Qubits and classical bits share one index space, classical bits offset by
//! the qubit count; a conditional statement reads its whole classical
//! register, so it conflicts with everything that touches any bit of it.

use alsvid_ir::{Module, Statement};

/// Statement indices forming one layer, in program order.
pub type Layer = Vec<usize>;

/// The layer decomposition of a module.
#[derive(Debug, Clone, Default)]
pub struct Layers {
    layers: Vec<Layer>,
}

impl Layers {
    /// Partition `module` into layers.
    pub fn build(module: &Module) -> Self {
        let qubits = module.num_qubits();
        let clbits = module.num_clbits();
        let mut latest = vec![-1i64; (qubits + clbits) as usize];
        let mut layers: Vec<Layer> = Vec::new();

        for (idx, stmt) in module.statements().iter().enumerate() {
            let bits = used_bits(module, stmt);
            let layer = bits
                .iter()
                .map(|&b| latest[b as usize] + 1)
                .max()
                .unwrap_or(0) as usize;
            for &b in &bits {
                latest[b as usize] = layer as i64;
            }
            if layers.len() <= layer {
                layers.push(Layer::new());
            }
            layers[layer].push(idx);
        }

        Self { layers }
    }

    /// Number of layers (the program depth).
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True for the empty program.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The layers in order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// A single layer.
    pub fn get(&self, i: usize) -> &Layer {
        &self.layers[i]
    }

    /// Statement indices concatenated layer by layer.
    pub fn statement_order(&self) -> Vec<usize> {
        self.layers.iter().flatten().copied().collect()
    }
}

/// The combined-bit footprint of a statement.
pub fn used_bits(module: &Module, stmt: &Statement) -> Vec<u32> {
    let qubits = module.num_qubits();
    match stmt {
        Statement::Measure { qubit, clbit } => vec![qubit.0, qubits + clbit.0],
        Statement::If { creg, inner, .. } => {
            let mut bits = used_bits(module, inner);
            let offset = module.creg_offset(creg).unwrap_or(0);
            let size = module.creg_size(creg).unwrap_or(0);
            for i in 0..size {
                let bit = qubits + offset + i;
                if !bits.contains(&bit) {
                    bits.push(bit);
                }
            }
            bits
        }
        other => other.qubits().iter().map(|q| q.0).collect(),
    }
}
