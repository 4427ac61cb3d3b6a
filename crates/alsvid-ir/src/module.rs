//! The program module: registers, gate declarations, statements.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::{GateDecl, StandardGate};
use crate::qubit::{ClbitId, QubitId};
use crate::statement::Statement;

/// A named quantum or classical register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    /// Register name.
    pub name: String,
    /// Number of bits.
    pub size: u32,
}

impl Register {
    /// Create a register.
    pub fn new(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// A straight-line quantum program.
///
/// Qubits and classical bits are addressed by flat indices across the
/// declared registers, in declaration order. `Clone` is a deep copy — the
/// module owns all of its statements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    qregs: Vec<Register>,
    cregs: Vec<Register>,
    gates: Vec<GateDecl>,
    #[serde(skip)]
    gate_index: FxHashMap<String, usize>,
    stmts: Vec<Statement>,
}

impl Module {
    /// Create an empty module.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a module with a single qubit register `q` and classical
    /// register `c`.
    pub fn with_size(qubits: u32, clbits: u32) -> Self {
        let mut module = Self::new();
        if qubits > 0 {
            module.qregs.push(Register::new("q", qubits));
        }
        if clbits > 0 {
            module.cregs.push(Register::new("c", clbits));
        }
        module
    }

    /// Declare a quantum register.
    pub fn add_qreg(&mut self, name: impl Into<String>, size: u32) -> IrResult<()> {
        let name = name.into();
        if self.qregs.iter().chain(&self.cregs).any(|r| r.name == name) {
            return Err(IrError::DuplicateRegister(name));
        }
        self.qregs.push(Register::new(name, size));
        Ok(())
    }

    /// Declare a classical register.
    pub fn add_creg(&mut self, name: impl Into<String>, size: u32) -> IrResult<()> {
        let name = name.into();
        if self.qregs.iter().chain(&self.cregs).any(|r| r.name == name) {
            return Err(IrError::DuplicateRegister(name));
        }
        self.cregs.push(Register::new(name, size));
        Ok(())
    }

    /// Total qubit count across quantum registers.
    pub fn num_qubits(&self) -> u32 {
        self.qregs.iter().map(|r| r.size).sum()
    }

    /// Total bit count across classical registers.
    pub fn num_clbits(&self) -> u32 {
        self.cregs.iter().map(|r| r.size).sum()
    }

    /// The quantum registers, in declaration order.
    pub fn qregs(&self) -> &[Register] {
        &self.qregs
    }

    /// The classical registers, in declaration order.
    pub fn cregs(&self) -> &[Register] {
        &self.cregs
    }

    /// Replace the quantum registers wholesale.
    ///
    /// Used when a module is rewritten onto a device: the logical registers
    /// give way to the device's physical ones. Statements are not touched.
    pub fn set_qregs(&mut self, regs: Vec<Register>) {
        self.qregs = regs;
    }

    /// Flat offset of classical register `name`, or `None` if undeclared.
    pub fn creg_offset(&self, name: &str) -> Option<u32> {
        let mut offset = 0;
        for reg in &self.cregs {
            if reg.name == name {
                return Some(offset);
            }
            offset += reg.size;
        }
        None
    }

    /// Size of classical register `name`, or `None` if undeclared.
    pub fn creg_size(&self, name: &str) -> Option<u32> {
        self.cregs.iter().find(|r| r.name == name).map(|r| r.size)
    }

    /// Printable `reg[i]` form of a flat qubit index.
    pub fn qubit_name(&self, qubit: QubitId) -> String {
        let mut rest = qubit.0;
        for reg in &self.qregs {
            if rest < reg.size {
                return format!("{}[{}]", reg.name, rest);
            }
            rest -= reg.size;
        }
        format!("{qubit}")
    }

    /// Register a gate declaration.
    ///
    /// Bodies may only contain gate applications, CXes, calls to earlier
    /// declarations and barriers, and every operand must be a formal index
    /// below the declared arity.
    pub fn declare_gate(&mut self, decl: GateDecl) -> IrResult<()> {
        if self.gate_index.contains_key(&decl.name) {
            return Err(IrError::DuplicateGate(decl.name));
        }
        for stmt in &decl.body {
            if !stmt.valid_in_body() {
                return Err(IrError::InvalidBodyStatement(stmt.op_name().to_string()));
            }
            for q in stmt.qubits() {
                if q.0 >= decl.qubits {
                    return Err(IrError::QubitOutOfRange {
                        qubit: q,
                        size: decl.qubits,
                    });
                }
            }
            if let Statement::Call { gate, qubits } = stmt {
                let inner = self
                    .gate(gate)
                    .ok_or_else(|| IrError::UnknownGate(gate.clone()))?;
                if inner.qubits as usize != qubits.len() {
                    return Err(IrError::ArityMismatch {
                        gate: gate.clone(),
                        expected: inner.qubits,
                        got: qubits.len() as u32,
                    });
                }
            }
        }
        self.gate_index.insert(decl.name.clone(), self.gates.len());
        self.gates.push(decl);
        Ok(())
    }

    /// Look up a gate declaration by name.
    pub fn gate(&self, name: &str) -> Option<&GateDecl> {
        self.gate_index.get(name).map(|&i| &self.gates[i])
    }

    /// Rebuild the gate-name index from the declaration list. Must be called
    /// after deserialization (the index is skipped during serialization).
    pub fn rebuild_index(&mut self) {
        self.gate_index = self
            .gates
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.clone(), i))
            .collect();
    }

    /// All gate declarations, in declaration order.
    pub fn gates(&self) -> &[GateDecl] {
        &self.gates
    }

    /// The statement list.
    pub fn statements(&self) -> &[Statement] {
        &self.stmts
    }

    /// Replace the whole statement list (rewriter entry point).
    pub fn set_statements(&mut self, stmts: Vec<Statement>) {
        self.stmts = stmts;
    }

    /// Validate and append a statement.
    pub fn push(&mut self, stmt: Statement) -> IrResult<()> {
        self.check_statement(&stmt, false)?;
        self.stmts.push(stmt);
        Ok(())
    }

    fn check_qubit(&self, q: QubitId) -> IrResult<()> {
        let size = self.num_qubits();
        if q.0 >= size {
            return Err(IrError::QubitOutOfRange { qubit: q, size });
        }
        Ok(())
    }

    fn check_statement(&self, stmt: &Statement, nested: bool) -> IrResult<()> {
        for q in stmt.qubits() {
            self.check_qubit(q)?;
        }
        match stmt {
            Statement::Cx { control, target } => {
                if control == target {
                    return Err(IrError::DuplicateQubit {
                        qubit: *control,
                        op: "cx".into(),
                    });
                }
            }
            Statement::Call { gate, qubits } => {
                let decl = self
                    .gate(gate)
                    .ok_or_else(|| IrError::UnknownGate(gate.clone()))?;
                if decl.qubits as usize != qubits.len() {
                    return Err(IrError::ArityMismatch {
                        gate: gate.clone(),
                        expected: decl.qubits,
                        got: qubits.len() as u32,
                    });
                }
                for (i, q) in qubits.iter().enumerate() {
                    if qubits[..i].contains(q) {
                        return Err(IrError::DuplicateQubit {
                            qubit: *q,
                            op: gate.clone(),
                        });
                    }
                }
            }
            Statement::Measure { clbit, .. } => {
                let size = self.num_clbits();
                if clbit.0 >= size {
                    return Err(IrError::ClbitOutOfRange {
                        clbit: *clbit,
                        size,
                    });
                }
            }
            Statement::If { creg, inner, .. } => {
                if nested {
                    return Err(IrError::InvalidBodyStatement("if".into()));
                }
                if self.creg_size(creg).is_none() {
                    return Err(IrError::UnknownRegister(creg.clone()));
                }
                if matches!(**inner, Statement::If { .. } | Statement::Barrier { .. }) {
                    return Err(IrError::InvalidBodyStatement(inner.op_name().to_string()));
                }
                self.check_statement(inner, true)?;
            }
            _ => {}
        }
        Ok(())
    }

    // --- statement sugar ---

    /// Append a standard single-qubit gate.
    pub fn unary(&mut self, gate: StandardGate, qubit: QubitId) -> IrResult<()> {
        self.push(Statement::Unary { gate, qubit })
    }

    /// Append a Hadamard.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<()> {
        self.unary(StandardGate::H, qubit)
    }

    /// Append a Pauli-X.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<()> {
        self.unary(StandardGate::X, qubit)
    }

    /// Append a `U(θ, φ, λ)`.
    pub fn u(&mut self, theta: f64, phi: f64, lambda: f64, qubit: QubitId) -> IrResult<()> {
        self.push(Statement::U {
            theta,
            phi,
            lambda,
            qubit,
        })
    }

    /// Append a CX.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<()> {
        self.push(Statement::Cx { control, target })
    }

    /// Append a call to a declared gate.
    pub fn call(
        &mut self,
        gate: impl Into<String>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<()> {
        self.push(Statement::Call {
            gate: gate.into(),
            qubits: qubits.into_iter().collect(),
        })
    }

    /// Append a measurement.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<()> {
        self.push(Statement::Measure { qubit, clbit })
    }

    /// Append a reset.
    pub fn reset(&mut self, qubit: QubitId) -> IrResult<()> {
        self.push(Statement::Reset { qubit })
    }

    /// Append a barrier.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<()> {
        self.push(Statement::Barrier {
            qubits: qubits.into_iter().collect(),
        })
    }

    /// Append a classically-controlled statement.
    pub fn if_eq(
        &mut self,
        creg: impl Into<String>,
        value: u64,
        inner: Statement,
    ) -> IrResult<()> {
        self.push(Statement::If {
            creg: creg.into(),
            value,
            inner: Box::new(inner),
        })
    }

    // --- inlining ---

    /// Expand every call to a gate outside `basis` through its declaration,
    /// and rewrite fixed single-qubit gates outside `basis` to their `U`
    /// form. Declarations themselves are kept (they are harmless).
    pub fn inline(&mut self, basis: &[&str]) -> IrResult<()> {
        let stmts = std::mem::take(&mut self.stmts);
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.inline_statement(stmt, basis, &mut out)?;
        }
        self.stmts = out;
        Ok(())
    }

    fn inline_statement(
        &self,
        stmt: Statement,
        basis: &[&str],
        out: &mut Vec<Statement>,
    ) -> IrResult<()> {
        match stmt {
            Statement::Unary { gate, qubit } => {
                if basis.contains(&gate.name()) {
                    out.push(Statement::Unary { gate, qubit });
                } else {
                    let (theta, phi, lambda) = gate.angles();
                    out.push(Statement::U {
                        theta,
                        phi,
                        lambda,
                        qubit,
                    });
                }
            }
            Statement::Call { gate, qubits } => {
                if basis.contains(&gate.as_str()) {
                    out.push(Statement::Call { gate, qubits });
                } else {
                    let decl = self
                        .gate(&gate)
                        .ok_or_else(|| IrError::UnknownGate(gate.clone()))?;
                    for body_stmt in &decl.body {
                        let mut concrete = body_stmt.clone();
                        concrete.map_qubits(&mut |formal| qubits[formal.index()]);
                        self.inline_statement(concrete, basis, out)?;
                    }
                }
            }
            Statement::If { creg, value, inner } => {
                let mut expanded = Vec::new();
                self.inline_statement(*inner, basis, &mut expanded)?;
                for s in expanded {
                    out.push(Statement::If {
                        creg: creg.clone(),
                        value,
                        inner: Box::new(s),
                    });
                }
            }
            other => out.push(other),
        }
        Ok(())
    }
}
