//! Two-qubit dependency extraction.
//!
//! Walks a module twice: first the gate declarations, caching each body's
//! dependency list in terms of formal parameter positions, then the
//! statements, translating cached lists through the actual arguments. A
//! statement's dependencies appear in call order.

use rustc_hash::FxHashMap;

use alsvid_ir::{IrError, Module, Statement};

use crate::error::AllocResult;

/// A control→target interaction between logical qubits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dep {
    /// Control qubit.
    pub from: u32,
    /// Target qubit.
    pub to: u32,
}

/// The dependencies of one statement, with its position in the module.
#[derive(Debug, Clone)]
pub struct DepEntry {
    /// Statement index in the module.
    pub stmt: usize,
    /// Dependencies, in call order.
    pub deps: Vec<Dep>,
}

/// Per-statement dependency table.
#[derive(Debug, Clone, Default)]
pub struct DependencyMap {
    per_stmt: Vec<Vec<Dep>>,
    entries: Vec<DepEntry>,
}

impl DependencyMap {
    /// Extract dependencies from every statement of `module`.
    pub fn build(module: &Module) -> AllocResult<Self> {
        let mut decl_cache: FxHashMap<String, Vec<Dep>> = FxHashMap::default();
        for decl in module.gates() {
            let mut deps = Vec::new();
            for stmt in &decl.body {
                collect(stmt, &decl_cache, &mut deps)?;
            }
            decl_cache.insert(decl.name.clone(), deps);
        }

        let mut per_stmt = Vec::with_capacity(module.statements().len());
        let mut entries = Vec::new();
        for (idx, stmt) in module.statements().iter().enumerate() {
            let mut deps = Vec::new();
            collect(stmt, &decl_cache, &mut deps)?;
            if !deps.is_empty() {
                entries.push(DepEntry {
                    stmt: idx,
                    deps: deps.clone(),
                });
            }
            per_stmt.push(deps);
        }

        Ok(Self { per_stmt, entries })
    }

    /// Dependencies of statement `stmt` (empty for single-qubit operations,
    /// barriers, measurements and resets).
    pub fn deps_of(&self, stmt: usize) -> &[Dep] {
        &self.per_stmt[stmt]
    }

    /// Statements that carry at least one dependency, in program order.
    pub fn entries(&self) -> &[DepEntry] {
        &self.entries
    }
}

fn collect(
    stmt: &Statement,
    decl_cache: &FxHashMap<String, Vec<Dep>>,
    out: &mut Vec<Dep>,
) -> AllocResult<()> {
    match stmt {
        Statement::Cx { control, target } => {
            out.push(Dep {
                from: control.0,
                to: target.0,
            });
        }
        Statement::Call { gate, qubits } => {
            let body_deps = decl_cache
                .get(gate)
                .ok_or_else(|| IrError::UnknownGate(gate.clone()))?;
            for dep in body_deps {
                out.push(Dep {
                    from: qubits[dep.from as usize].0,
                    to: qubits[dep.to as usize].0,
                });
            }
        }
        Statement::If { inner, .. } => collect(inner, decl_cache, out)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alsvid_ir::{ClbitId, GateDecl, QubitId, StandardGate};

    #[test]
    fn test_cx_yields_one_dep() {
        let mut m = Module::with_size(3, 1);
        m.h(QubitId(0)).unwrap();
        m.cx(QubitId(2), QubitId(1)).unwrap();
        m.measure(QubitId(0), ClbitId(0)).unwrap();

        let deps = DependencyMap::build(&m).unwrap();
        assert!(deps.deps_of(0).is_empty());
        assert_eq!(deps.deps_of(1), &[Dep { from: 2, to: 1 }]);
        assert!(deps.deps_of(2).is_empty());
        assert_eq!(deps.entries().len(), 1);
        assert_eq!(deps.entries()[0].stmt, 1);
    }

    #[test]
    fn test_call_substitutes_formals() {
        let mut m = Module::with_size(4, 0);
        m.declare_gate(GateDecl::new(
            "pair",
            3,
            vec![
                Statement::Cx {
                    control: QubitId(0),
                    target: QubitId(2),
                },
                Statement::Unary {
                    gate: StandardGate::H,
                    qubit: QubitId(1),
                },
                Statement::Cx {
                    control: QubitId(2),
                    target: QubitId(1),
                },
            ],
        ))
        .unwrap();
        m.call("pair", [QubitId(3), QubitId(0), QubitId(1)]).unwrap();

        let deps = DependencyMap::build(&m).unwrap();
        assert_eq!(
            deps.deps_of(0),
            &[Dep { from: 3, to: 1 }, Dep { from: 1, to: 0 }]
        );
    }

    #[test]
    fn test_nested_declarations() {
        let mut m = Module::with_size(2, 0);
        m.declare_gate(GateDecl::new(
            "inner",
            2,
            vec![Statement::Cx {
                control: QubitId(1),
                target: QubitId(0),
            }],
        ))
        .unwrap();
        m.declare_gate(GateDecl::new(
            "outer",
            2,
            vec![Statement::Call {
                gate: "inner".into(),
                qubits: vec![QubitId(1), QubitId(0)],
            }],
        ))
        .unwrap();
        m.call("outer", [QubitId(0), QubitId(1)]).unwrap();

        let deps = DependencyMap::build(&m).unwrap();
        // outer(0,1) → inner(1,0) → cx 0,1
        assert_eq!(deps.deps_of(0), &[Dep { from: 0, to: 1 }]);
    }

    #[test]
    fn test_if_wrapped_cx() {
        let mut m = Module::with_size(2, 1);
        m.if_eq(
            "c",
            1,
            Statement::Cx {
                control: QubitId(0),
                target: QubitId(1),
            },
        )
        .unwrap();
        let deps = DependencyMap::build(&m).unwrap();
        assert_eq!(deps.deps_of(0), &[Dep { from: 0, to: 1 }]);
    }
}
