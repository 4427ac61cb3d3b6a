//! Error types for the IR crate.

use crate::qubit::{ClbitId, QubitId};
use thiserror::Error;

/// Errors that can occur while building or transforming a module.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Qubit index outside the declared register space.
    #[error("Qubit {qubit:?} out of range (module has {size} qubits)")]
    QubitOutOfRange {
        /// The offending qubit.
        qubit: QubitId,
        /// Declared qubit count.
        size: u32,
    },

    /// Classical bit index outside the declared register space.
    #[error("Classical bit {clbit:?} out of range (module has {size} bits)")]
    ClbitOutOfRange {
        /// The offending bit.
        clbit: ClbitId,
        /// Declared bit count.
        size: u32,
    },

    /// Call references a gate that was never declared.
    #[error("Unknown gate '{0}'")]
    UnknownGate(String),

    /// Conditional references a classical register that was never declared.
    #[error("Unknown classical register '{0}'")]
    UnknownRegister(String),

    /// Register name declared twice.
    #[error("Register '{0}' already declared")]
    DuplicateRegister(String),

    /// Gate name declared twice.
    #[error("Gate '{0}' already declared")]
    DuplicateGate(String),

    /// Call arity does not match the declaration.
    #[error("Gate '{gate}' takes {expected} qubits, got {got}")]
    ArityMismatch {
        /// The called gate.
        gate: String,
        /// Declared formal count.
        expected: u32,
        /// Actual argument count.
        got: u32,
    },

    /// Same qubit used twice in one operation.
    #[error("Duplicate qubit {qubit:?} in '{op}'")]
    DuplicateQubit {
        /// The repeated qubit.
        qubit: QubitId,
        /// Operation name for context.
        op: String,
    },

    /// Statement kind not allowed inside a gate declaration body.
    #[error("Statement '{0}' is not allowed in a gate body")]
    InvalidBodyStatement(String),
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
