//! Program statements.

use serde::{Deserialize, Serialize};

use crate::gate::StandardGate;
use crate::qubit::{ClbitId, QubitId};

/// One statement of a straight-line program.
///
/// Statements are plain data; a statement used inside a
/// [`crate::gate::GateDecl`] body reads its qubit operands as formal
/// parameter indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Application of a fixed single-qubit gate.
    Unary {
        /// The gate.
        gate: StandardGate,
        /// Target qubit.
        qubit: QubitId,
    },
    /// The primitive single-qubit rotation `U(θ, φ, λ)`.
    U {
        /// θ angle.
        theta: f64,
        /// φ angle.
        phi: f64,
        /// λ angle.
        lambda: f64,
        /// Target qubit.
        qubit: QubitId,
    },
    /// Controlled-NOT.
    Cx {
        /// Control qubit.
        control: QubitId,
        /// Target qubit.
        target: QubitId,
    },
    /// Call to a declared gate.
    Call {
        /// Declared gate name.
        gate: String,
        /// Actual qubit arguments, in formal-parameter order.
        qubits: Vec<QubitId>,
    },
    /// Measurement into a classical bit.
    Measure {
        /// Measured qubit.
        qubit: QubitId,
        /// Destination bit.
        clbit: ClbitId,
    },
    /// Reset to |0⟩.
    Reset {
        /// Target qubit.
        qubit: QubitId,
    },
    /// Barrier over a qubit set.
    Barrier {
        /// Qubits the barrier spans.
        qubits: Vec<QubitId>,
    },
    /// Classically-controlled wrapper: `if (creg == value) inner`.
    If {
        /// Name of the classical register read.
        creg: String,
        /// Comparison value.
        value: u64,
        /// The controlled quantum operation.
        inner: Box<Statement>,
    },
}

impl Statement {
    /// Qubit operands of this statement, conditionals included.
    pub fn qubits(&self) -> Vec<QubitId> {
        match self {
            Statement::Unary { qubit, .. }
            | Statement::U { qubit, .. }
            | Statement::Reset { qubit }
            | Statement::Measure { qubit, .. } => vec![*qubit],
            Statement::Cx { control, target } => vec![*control, *target],
            Statement::Call { qubits, .. } | Statement::Barrier { qubits } => qubits.clone(),
            Statement::If { inner, .. } => inner.qubits(),
        }
    }

    /// Rewrite every qubit operand through `f`, in place.
    pub fn map_qubits(&mut self, f: &mut impl FnMut(QubitId) -> QubitId) {
        match self {
            Statement::Unary { qubit, .. }
            | Statement::U { qubit, .. }
            | Statement::Reset { qubit }
            | Statement::Measure { qubit, .. } => *qubit = f(*qubit),
            Statement::Cx { control, target } => {
                *control = f(*control);
                *target = f(*target);
            }
            Statement::Call { qubits, .. } | Statement::Barrier { qubits } => {
                for q in qubits.iter_mut() {
                    *q = f(*q);
                }
            }
            Statement::If { inner, .. } => inner.map_qubits(f),
        }
    }

    /// Printable operation name (the gate for calls and unary gates).
    pub fn op_name(&self) -> &str {
        match self {
            Statement::Unary { gate, .. } => gate.name(),
            Statement::U { .. } => "u",
            Statement::Cx { .. } => "cx",
            Statement::Call { gate, .. } => gate,
            Statement::Measure { .. } => "measure",
            Statement::Reset { .. } => "reset",
            Statement::Barrier { .. } => "barrier",
            Statement::If { inner, .. } => inner.op_name(),
        }
    }

    /// True for the statement kinds permitted inside a gate declaration body.
    pub fn valid_in_body(&self) -> bool {
        matches!(
            self,
            Statement::Unary { .. }
                | Statement::U { .. }
                | Statement::Cx { .. }
                | Statement::Call { .. }
                | Statement::Barrier { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qubits_of_cx() {
        let s = Statement::Cx {
            control: QubitId(2),
            target: QubitId(0),
        };
        assert_eq!(s.qubits(), vec![QubitId(2), QubitId(0)]);
        assert_eq!(s.op_name(), "cx");
    }

    #[test]
    fn test_map_qubits_through_if() {
        let mut s = Statement::If {
            creg: "c".into(),
            value: 1,
            inner: Box::new(Statement::Unary {
                gate: StandardGate::X,
                qubit: QubitId(1),
            }),
        };
        s.map_qubits(&mut |q| QubitId(q.0 + 10));
        assert_eq!(s.qubits(), vec![QubitId(11)]);
    }

    #[test]
    fn test_body_validity() {
        assert!(
            Statement::Cx {
                control: QubitId(0),
                target: QubitId(1)
            }
            .valid_in_body()
        );
        assert!(
            !Statement::Reset {
                qubit: QubitId(0)
            }
            .valid_in_body()
        );
    }
}
