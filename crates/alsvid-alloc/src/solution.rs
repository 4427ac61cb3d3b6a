//! Allocation results: operations, solutions, cost weights.

use crate::mapping::Mapping;

/// A rewriting action attached to a statement. Operands are logical qubits;
/// the rewriter resolves them against the running mapping when emitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Emit the CNOT as-is; the pair is natively adjacent.
    Cnot {
        /// Control (logical).
        from: u32,
        /// Target (logical).
        to: u32,
    },
    /// Emit the Hadamard-wrapped reversal; only the opposite direction is
    /// native.
    Rev {
        /// Control (logical).
        from: u32,
        /// Target (logical).
        to: u32,
    },
    /// Exchange two logical qubits; mutates the running mapping.
    Swap {
        /// One side.
        a: u32,
        /// Other side.
        b: u32,
    },
    /// Long CNOT through a middle qubit adjacent to both ends.
    Bridge {
        /// Control (logical).
        from: u32,
        /// Middle (logical).
        mid: u32,
        /// Target (logical).
        to: u32,
    },
}

/// The operations replacing one statement.
#[derive(Debug, Clone, Default)]
pub struct OpSequence {
    /// Statement index in the module.
    pub stmt: usize,
    /// Replacement operations, in emission order.
    pub ops: Vec<Operation>,
}

/// A full allocation: initial placement plus per-statement rewrites.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    /// Initial logical→physical assignment (device-padded).
    pub initial: Mapping,
    /// Rewrites for every dependency-carrying statement, in program order.
    pub op_seqs: Vec<OpSequence>,
    /// Weighted cost of everything beyond plainly-emitted CNOTs.
    pub cost: u64,
}

/// Weights of the corrective operations.
///
/// The conventional defaults price a SWAP as three CNOTs plus four
/// Hadamards, a reversal as its four Hadamards, and a bridge at the
/// long-CNOT figure the cost model inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostConfig {
    /// Cost of one SWAP.
    pub swap: u32,
    /// Cost of one reversed CNOT.
    pub rev: u32,
    /// Cost of one bridge.
    pub bridge: u32,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            swap: 7,
            rev: 4,
            bridge: 10,
        }
    }
}

impl CostConfig {
    /// Derive costs from per-gate weights: a SWAP is three CXes and four
    /// wrapping Hadamards, a reversal four Hadamards, a bridge three extra
    /// CXes.
    pub fn from_gate_weights(cx: u32, h: u32) -> Self {
        Self {
            swap: 3 * cx + 4 * h,
            rev: 4 * h,
            bridge: 3 * cx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_costs() {
        let c = CostConfig::default();
        assert_eq!((c.swap, c.rev, c.bridge), (7, 4, 10));
    }

    #[test]
    fn test_unit_weights_recover_convention() {
        let c = CostConfig::from_gate_weights(1, 1);
        assert_eq!(c.swap, 7);
        assert_eq!(c.rev, 4);
        assert_eq!(c.bridge, 3);
    }
}
