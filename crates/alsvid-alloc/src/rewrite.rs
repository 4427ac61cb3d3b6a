//! Applies a [`Solution`] to a module, emitting intrinsic gates.
//!
//! The rewritten module lives on the device's physical registers: every
//! operand is translated through the running mapping, SWAPs become
//! `intrinsic_swap__` calls (mutating that mapping as they go), reversals
//! become `intrinsic_rev_cx__`, bridges become `intrinsic_lcx__`. The
//! intrinsics carry real bodies so later inlining and verification can see
//! through them.

use rustc_hash::FxHashMap;

use alsvid_ir::{GateDecl, IrResult, Module, QubitId, StandardGate, Statement};

use crate::error::AllocResult;
use crate::graph::CouplingGraph;
use crate::mapping::{fill_mapping, Mapping};
use crate::solution::{Operation, Solution};

/// Name of the SWAP intrinsic.
pub const INTRINSIC_SWAP: &str = "intrinsic_swap__";
/// Name of the reversed-CNOT intrinsic.
pub const INTRINSIC_REV_CX: &str = "intrinsic_rev_cx__";
/// Name of the long-CNOT (bridge) intrinsic.
pub const INTRINSIC_LCX: &str = "intrinsic_lcx__";

/// Declare the intrinsic gates on `module` if they are not present yet.
pub fn declare_intrinsics(module: &mut Module) -> IrResult<()> {
    let cx = |c: u32, t: u32| Statement::Cx {
        control: QubitId(c),
        target: QubitId(t),
    };
    let h = |q: u32| Statement::Unary {
        gate: StandardGate::H,
        qubit: QubitId(q),
    };

    if module.gate(INTRINSIC_SWAP).is_none() {
        module.declare_gate(GateDecl::new(
            INTRINSIC_SWAP,
            2,
            vec![cx(0, 1), cx(1, 0), cx(0, 1)],
        ))?;
    }
    if module.gate(INTRINSIC_REV_CX).is_none() {
        module.declare_gate(GateDecl::new(
            INTRINSIC_REV_CX,
            2,
            vec![h(0), h(1), cx(1, 0), h(0), h(1)],
        ))?;
    }
    if module.gate(INTRINSIC_LCX).is_none() {
        module.declare_gate(GateDecl::new(
            INTRINSIC_LCX,
            3,
            vec![cx(0, 1), cx(1, 2), cx(0, 1), cx(1, 2)],
        ))?;
    }
    Ok(())
}

fn intrinsic_call(gate: &str, qubits: impl IntoIterator<Item = u32>) -> Statement {
    Statement::Call {
        gate: gate.into(),
        qubits: qubits.into_iter().map(QubitId).collect(),
    }
}

fn wrap(payload: Statement, wrapper: Option<(&str, u64)>) -> Statement {
    match wrapper {
        Some((creg, value)) => Statement::If {
            creg: creg.to_string(),
            value,
            inner: Box::new(payload),
        },
        None => payload,
    }
}

/// Rewrite `module` in place according to `solution`.
///
/// Returns the final mapping after all inserted SWAPs.
pub fn apply_solution(
    module: &mut Module,
    g: &CouplingGraph,
    solution: &Solution,
) -> AllocResult<Mapping> {
    let p = g.size();
    let mut mapping = solution.initial.clone();
    fill_mapping(&mut mapping, p);

    let ops_by_stmt: FxHashMap<usize, &Vec<Operation>> = solution
        .op_seqs
        .iter()
        .map(|seq| (seq.stmt, &seq.ops))
        .collect();

    let statements = module.statements().to_vec();
    let mut out = Vec::with_capacity(statements.len());

    for (idx, stmt) in statements.into_iter().enumerate() {
        let Some(ops) = ops_by_stmt.get(&idx) else {
            let mut remapped = stmt;
            remapped.map_qubits(&mut |q| QubitId(mapping[q.index()]));
            out.push(remapped);
            continue;
        };

        let (wrapper, original) = match &stmt {
            Statement::If { creg, value, inner } => {
                (Some((creg.as_str(), *value)), (**inner).clone())
            }
            other => (None, other.clone()),
        };

        for op in ops.iter() {
            match *op {
                Operation::Swap { a, b } => {
                    let (u, v) = (mapping[a as usize], mapping[b as usize]);
                    out.push(intrinsic_call(INTRINSIC_SWAP, [u, v]));
                    mapping.swap(a as usize, b as usize);
                }
                Operation::Cnot { from, to } => {
                    // A still-composite call keeps its own gate; the mapping
                    // just relocates its operands.
                    let payload = if let Statement::Call { .. } = &original {
                        let mut call = original.clone();
                        call.map_qubits(&mut |q| QubitId(mapping[q.index()]));
                        call
                    } else {
                        Statement::Cx {
                            control: QubitId(mapping[from as usize]),
                            target: QubitId(mapping[to as usize]),
                        }
                    };
                    out.push(wrap(payload, wrapper));
                }
                Operation::Rev { from, to } => {
                    let payload = intrinsic_call(
                        INTRINSIC_REV_CX,
                        [mapping[from as usize], mapping[to as usize]],
                    );
                    out.push(wrap(payload, wrapper));
                }
                Operation::Bridge { from, mid, to } => {
                    let payload = intrinsic_call(
                        INTRINSIC_LCX,
                        [
                            mapping[from as usize],
                            mapping[mid as usize],
                            mapping[to as usize],
                        ],
                    );
                    out.push(wrap(payload, wrapper));
                }
            }
        }
    }

    module.set_qregs(g.registers().to_vec());
    declare_intrinsics(module)?;
    module.set_statements(out);
    Ok(mapping)
}
