//! Error types for the allocation engine.

use thiserror::Error;

/// Errors that can occur during allocation.
///
/// Everything here terminates the compilation; verification outcomes are
/// reported as data on the compiled module instead (the caller decides what
/// a failed verification means).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AllocError {
    /// Error bubbled up from the program representation.
    #[error(transparent)]
    Ir(#[from] alsvid_ir::IrError),

    /// The coupling graph is disconnected between two required qubits.
    #[error("No path between physical qubits {from} and {to}")]
    NoPath {
        /// Source physical qubit.
        from: u32,
        /// Destination physical qubit.
        to: u32,
    },

    /// Weighted path finder invoked on an unweighted graph.
    #[error("Weighted path finder requires an edge-weighted coupling graph")]
    NotWeighted,

    /// Allocator key not recognized at configuration time.
    #[error("Unknown allocator '{0}'")]
    UnknownAllocator(String),

    /// Permutation-table component refused a device above its size limit.
    #[error("Device has {qubits} physical qubits; {component} supports at most {limit}")]
    DeviceTooLarge {
        /// Physical qubit count.
        qubits: u32,
        /// The refusing component.
        component: &'static str,
        /// Its limit.
        limit: u32,
    },

    /// More logical qubits than the device provides.
    #[error("Program uses {required} qubits but the device has only {available}")]
    ProgramTooLarge {
        /// Logical qubit count.
        required: u32,
        /// Physical qubit count.
        available: u32,
    },

    /// A statement could not be placed even on its own.
    #[error("Statement {stmt} cannot be routed under mapping [{mapping}]")]
    Unroutable {
        /// Statement index in the module.
        stmt: usize,
        /// The mapping at the failure point, printable form.
        mapping: String,
    },

    /// A statement carries more than one two-qubit dependency.
    ///
    /// The engine works on inlined programs; a multi-dependency statement
    /// means inlining was skipped.
    #[error("Statement {stmt} carries {count} dependencies; inline the module first")]
    MultiDependency {
        /// Statement index.
        stmt: usize,
        /// Dependency count.
        count: usize,
    },

    /// Bridge-only solution builder found a dependency with no length-3 path.
    #[error("No bridge available between physical qubits {from} and {to} (path length {len})")]
    BridgeUnavailable {
        /// Source physical qubit.
        from: u32,
        /// Destination physical qubit.
        to: u32,
        /// Actual shortest path vertex count.
        len: usize,
    },

    /// Malformed coupling-graph description.
    #[error("Invalid architecture description: {0}")]
    InvalidArch(String),

    /// JSON syntax error in a coupling-graph description.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for allocation operations.
pub type AllocResult<T> = Result<T, AllocError>;
