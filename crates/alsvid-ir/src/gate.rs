//! Standard gates and user gate declarations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::statement::Statement;

/// The fixed single-qubit gate set.
///
/// Everything here is expressible as a `U(θ, φ, λ)`; [`StandardGate::angles`]
/// gives the canonical decomposition used when inlining to the primitive
/// basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardGate {
    /// Hadamard.
    H,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
    /// S (sqrt Z).
    S,
    /// S-dagger.
    Sdg,
    /// T (fourth root of Z).
    T,
    /// T-dagger.
    Tdg,
}

impl StandardGate {
    /// Lower-case gate name, as printed in the assembly form.
    pub fn name(self) -> &'static str {
        match self {
            StandardGate::H => "h",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
        }
    }

    /// The `U(θ, φ, λ)` angles realizing this gate.
    pub fn angles(self) -> (f64, f64, f64) {
        use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
        match self {
            StandardGate::H => (FRAC_PI_2, 0.0, PI),
            StandardGate::X => (PI, 0.0, PI),
            StandardGate::Y => (PI, FRAC_PI_2, FRAC_PI_2),
            StandardGate::Z => (0.0, 0.0, PI),
            StandardGate::S => (0.0, 0.0, FRAC_PI_2),
            StandardGate::Sdg => (0.0, 0.0, -FRAC_PI_2),
            StandardGate::T => (0.0, 0.0, FRAC_PI_4),
            StandardGate::Tdg => (0.0, 0.0, -FRAC_PI_4),
        }
    }
}

impl fmt::Display for StandardGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A declared composite gate.
///
/// The body is a statement list over *formal* qubit indices `0..qubits`;
/// calls in the body may only reference gates declared earlier. Bodies carry
/// no measurements, resets or conditionals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecl {
    /// Gate name, unique within a module.
    pub name: String,
    /// Number of formal qubit parameters.
    pub qubits: u32,
    /// Body statements; qubit operands are formal indices.
    pub body: Vec<Statement>,
}

impl GateDecl {
    /// Create a declaration.
    pub fn new(name: impl Into<String>, qubits: u32, body: Vec<Statement>) -> Self {
        Self {
            name: name.into(),
            qubits,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_names() {
        assert_eq!(StandardGate::H.name(), "h");
        assert_eq!(StandardGate::Sdg.name(), "sdg");
        assert_eq!(format!("{}", StandardGate::T), "t");
    }

    #[test]
    fn test_angles_are_u_form() {
        let (theta, phi, lambda) = StandardGate::H.angles();
        assert!((theta - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(phi, 0.0);
        assert!((lambda - std::f64::consts::PI).abs() < 1e-12);
    }
}
