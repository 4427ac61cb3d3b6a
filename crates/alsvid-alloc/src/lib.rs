//! Alsvid Qubit Allocation Engine
//!
//! This crate maps logical quantum programs onto physical devices whose
//! two-qubit gates are constrained to a directed coupling graph. It chooses
//! an initial logical→physical placement and inserts SWAP, reversed-CNOT
//! and bridge operations so that every CNOT of the rewritten program acts
//! on coupled qubits, minimizing a weighted cost.
//!
//! # Architecture
//!
//! ```text
//! Module ──► DependencyMap + Layers (Analysis)
//!                   │
//!                   ▼
//!             Allocator ◄── CouplingGraph
//!    (mapping finder + solution builder,
//!     dynamic programming, randomized
//!     per-layer, A*, layered partition)
//!                   │
//!                   ▼
//!      Rewritten Module + Mapping + Cost ──► Verifiers + Quality
//! ```
//!
//! # Example
//!
//! ```rust
//! use alsvid_alloc::{compile, AllocatorKind, CompilationSettings, CouplingGraph};
//! use alsvid_ir::{Module, QubitId};
//!
//! let mut module = Module::with_size(3, 0);
//! module.cx(QubitId(0), QubitId(1)).unwrap();
//! module.cx(QubitId(0), QubitId(2)).unwrap();
//!
//! let mut settings = CompilationSettings::new(CouplingGraph::linear(3));
//! settings.allocator = AllocatorKind::WeightedPathGuided;
//!
//! let result = compile(module, &settings).unwrap();
//! assert_eq!(result.arch_ok, Some(true));
//! ```
//!
//! # Components
//!
//! - [`graph::CouplingGraph`] — the device: directed edges, reverse-edge
//!   closure, optional weights, JSON/text loaders
//! - [`path::PathFinderKind`] — BFS and Dijkstra path strategies
//! - [`token_swap::TokenSwapTable`] — exact minimum swap sequences between
//!   device permutations (factorial, size-guarded)
//! - [`deps::DependencyMap`] / [`layers::Layers`] — program analysis
//! - [`finders::MappingFinderKind`] — identity / random / weighted initial
//!   placements
//! - [`builders::SolutionBuilderKind`] — path-guided and bridge-preferring
//!   dependency solving
//! - [`allocators`] — the five driver families
//! - [`verify`] — architecture and semantic verification
//! - [`quality`] — depth / gate-count / weighted-cost metrics
//! - [`driver::compile`] — the programmatic entry point

pub mod allocators;
pub mod builders;
pub mod context;
pub mod deps;
pub mod driver;
pub mod error;
pub mod finders;
pub mod graph;
pub mod layers;
pub mod mapping;
pub mod path;
pub mod quality;
pub mod rewrite;
pub mod solution;
pub mod token_swap;
pub mod verify;

pub use allocators::{AllocationOutcome, AllocatorConfig, AllocatorKind};
pub use builders::SolutionBuilderKind;
pub use context::Analysis;
pub use deps::{Dep, DepEntry, DependencyMap};
pub use driver::{compile, CompilationSettings, CompiledModule};
pub use error::{AllocError, AllocResult};
pub use finders::MappingFinderKind;
pub use graph::CouplingGraph;
pub use layers::Layers;
pub use mapping::{
    fill_mapping, identity_mapping, invert_mapping, mapping_to_string, InverseMap, Mapping,
    MappingDisplay, UNDEF,
};
pub use path::PathFinderKind;
pub use quality::{evaluate, ModuleQuality};
pub use solution::{CostConfig, OpSequence, Operation, Solution};
pub use token_swap::{SwapStep, TokenSwapTable, MAX_PERMUTATION_QUBITS};
pub use verify::{verify_architecture, verify_semantics, VERIFIER_MAX_QUBITS};
