//! Alsvid Program Representation
//!
//! This crate provides the straight-line program representation consumed by
//! the Alsvid allocation engine. A [`Module`] owns the declared registers,
//! the gate declarations and an ordered list of [`Statement`]s; there is no
//! graph structure — allocation works on the textual statement order.
//!
//! # Core Components
//!
//! - **Qubits and Classical Bits**: [`QubitId`], [`ClbitId`] flat indices
//!   into the module's combined register space
//! - **Gates**: [`StandardGate`] for the fixed single-qubit set and
//!   [`GateDecl`] for user-declared composite gates
//! - **Statements**: [`Statement`] — gate applications, CX, calls,
//!   measurement, reset, barrier and classically-controlled wrappers
//! - **Module**: [`Module`] — registers + declarations + statements, with
//!   deep cloning and gate inlining
//!
//! # Example: Building a Bell Pair
//!
//! ```rust
//! use alsvid_ir::{Module, QubitId, ClbitId};
//!
//! let mut module = Module::new();
//! module.add_qreg("q", 2).unwrap();
//! module.add_creg("c", 2).unwrap();
//!
//! module.h(QubitId(0)).unwrap();
//! module.cx(QubitId(0), QubitId(1)).unwrap();
//! module.measure(QubitId(0), ClbitId(0)).unwrap();
//! module.measure(QubitId(1), ClbitId(1)).unwrap();
//!
//! assert_eq!(module.num_qubits(), 2);
//! assert_eq!(module.statements().len(), 4);
//! ```

pub mod error;
pub mod gate;
pub mod module;
pub mod qubit;
pub mod statement;

pub use error::{IrError, IrResult};
pub use gate::{GateDecl, StandardGate};
pub use module::{Module, Register};
pub use qubit::{ClbitId, QubitId};
pub use statement::Statement;
