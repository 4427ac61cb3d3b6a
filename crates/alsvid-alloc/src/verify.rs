//! Architecture and semantic verification of rewritten modules.

use ndarray::Array2;
use num_complex::Complex64;
use tracing::debug;

use alsvid_ir::{Module, Statement};

use crate::error::{AllocError, AllocResult};
use crate::graph::CouplingGraph;
use crate::mapping::{fill_mapping, invert_mapping, Mapping, UNDEF};
use crate::rewrite::{INTRINSIC_LCX, INTRINSIC_REV_CX, INTRINSIC_SWAP};

/// Largest device the unitary-based semantic check will simulate.
pub const VERIFIER_MAX_QUBITS: u32 = 12;

const EPSILON: f64 = 1e-8;

/// Check that every two-qubit operation of `module` sits on a legal edge:
/// CNOTs on native edges, reversal intrinsics on the exact reverse of one,
/// swap and bridge intrinsics on edges in either orientation.
pub fn verify_architecture(module: &Module, g: &CouplingGraph) -> bool {
    module.statements().iter().all(|s| statement_legal(g, s))
}

fn statement_legal(g: &CouplingGraph, stmt: &Statement) -> bool {
    let in_range = stmt.qubits().iter().all(|q| q.0 < g.size());
    if !in_range {
        return false;
    }
    match stmt {
        Statement::If { inner, .. } => statement_legal(g, inner),
        Statement::Cx { control, target } => g.is_native(control.0, target.0),
        Statement::Call { gate, qubits } => match gate.as_str() {
            INTRINSIC_SWAP => {
                let (u, v) = (qubits[0].0, qubits[1].0);
                g.is_native(u, v) || g.is_native(v, u)
            }
            INTRINSIC_REV_CX => {
                let (u, v) = (qubits[0].0, qubits[1].0);
                g.is_native(v, u)
            }
            INTRINSIC_LCX => {
                let (a, w, b) = (qubits[0].0, qubits[1].0, qubits[2].0);
                (g.is_native(a, w) || g.is_native(w, a))
                    && (g.is_native(w, b) || g.is_native(b, w))
            }
            _ => true,
        },
        _ => true,
    }
}

/// One non-unitary checkpoint, in logical coordinates.
#[derive(Debug, PartialEq)]
enum Event {
    Measure { qubit: u32, clbit: u32 },
    Reset { qubit: u32 },
    Conditional { creg: String, value: u64, op: String, qubits: Vec<u32> },
}

/// Check that `rewritten` computes what `original` computes once logical
/// qubit `i` is read as physical qubit `initial[i]`.
///
/// Gates are compared as accumulated unitaries after inlining both programs
/// to the `{u, cx}` basis, with the rewritten side matched against the
/// original composed with the net permutation of its own SWAPs.
/// Measurements, resets and conditionals are compared structurally, in
/// order, through the running mapping.
///
/// Fails with a device-size error above [`VERIFIER_MAX_QUBITS`].
pub fn verify_semantics(
    original: &Module,
    rewritten: &Module,
    initial: &Mapping,
) -> AllocResult<bool> {
    let p = rewritten.num_qubits();
    if p > VERIFIER_MAX_QUBITS {
        return Err(AllocError::DeviceTooLarge {
            qubits: p,
            component: "semantic verifier",
            limit: VERIFIER_MAX_QUBITS,
        });
    }
    let l = original.num_qubits();

    let mut start = initial.to_vec();
    fill_mapping(&mut start, p);

    // Walk the rewritten program once: track the physical→logical view
    // through the SWAP intrinsics and collect non-unitary events.
    let mut assign = invert_mapping(p, &start);
    let mut rewritten_events = Vec::new();
    for stmt in rewritten.statements() {
        match stmt {
            Statement::Call { gate, qubits } if gate == INTRINSIC_SWAP => {
                assign.swap(qubits[0].index(), qubits[1].index());
            }
            Statement::Measure { qubit, clbit } => {
                let logical = assign[qubit.index()];
                if logical >= l {
                    return Ok(false);
                }
                rewritten_events.push(Event::Measure {
                    qubit: logical,
                    clbit: clbit.0,
                });
            }
            Statement::Reset { qubit } => {
                let logical = assign[qubit.index()];
                if logical >= l {
                    return Ok(false);
                }
                rewritten_events.push(Event::Reset { qubit: logical });
            }
            Statement::If { creg, value, inner } => {
                let Some(event) = conditional_event(creg, *value, inner, Some(&assign)) else {
                    return Ok(false);
                };
                rewritten_events.push(event);
            }
            _ => {}
        }
    }
    let final_assign = assign;

    let mut original_events = Vec::new();
    for stmt in original.statements() {
        match stmt {
            Statement::Measure { qubit, clbit } => original_events.push(Event::Measure {
                qubit: qubit.0,
                clbit: clbit.0,
            }),
            Statement::Reset { qubit } => original_events.push(Event::Reset { qubit: qubit.0 }),
            Statement::If { creg, value, inner } => {
                let Some(event) = conditional_event(creg, *value, inner, None) else {
                    return Ok(false);
                };
                original_events.push(event);
            }
            _ => {}
        }
    }

    // Allocators may regroup commuting statements, so events are compared
    // per bit-stream: every qubit, classical bit and condition register must
    // see the same sequence.
    if !events_match(&original_events, &rewritten_events) {
        debug!("semantic mismatch in measurement/conditional structure");
        return Ok(false);
    }

    // Unitary comparison on the gate streams.
    let mut orig_inlined = original.clone();
    orig_inlined.inline(&["u", "cx"])?;
    let mut rewr_inlined = rewritten.clone();
    rewr_inlined.inline(&["u", "cx"])?;

    let u_orig = unitary_of(orig_inlined.statements(), p, |q| start[q as usize]);
    let u_rewr = unitary_of(rewr_inlined.statements(), p, |q| q);

    // The rewritten program additionally carries the net permutation of its
    // swaps: logical `q` starts at start[q] and ends at final[q].
    let final_mapping = invert_mapping(p, &final_assign);
    let expected = permute_rows(&u_orig, &start, &final_mapping, p);

    Ok(equal_up_to_phase(&expected, &u_rewr))
}

fn events_match(original: &[Event], rewritten: &[Event]) -> bool {
    type Streams<'a, K> = rustc_hash::FxHashMap<K, Vec<&'a Event>>;

    fn project(events: &[Event]) -> (Streams<'_, u32>, Streams<'_, u32>, Streams<'_, String>) {
        let mut qubits: Streams<'_, u32> = Default::default();
        let mut clbits: Streams<'_, u32> = Default::default();
        let mut cregs: Streams<'_, String> = Default::default();
        for event in events {
            match event {
                Event::Measure { qubit, clbit } => {
                    qubits.entry(*qubit).or_default().push(event);
                    clbits.entry(*clbit).or_default().push(event);
                }
                Event::Reset { qubit } => {
                    qubits.entry(*qubit).or_default().push(event);
                }
                Event::Conditional { creg, qubits: qs, .. } => {
                    for q in qs {
                        qubits.entry(*q).or_default().push(event);
                    }
                    cregs.entry(creg.clone()).or_default().push(event);
                }
            }
        }
        (qubits, clbits, cregs)
    }

    let (oq, oc, og) = project(original);
    let (rq, rc, rg) = project(rewritten);
    oq == rq && oc == rc && og == rg
}

fn conditional_event(
    creg: &str,
    value: u64,
    inner: &Statement,
    assign: Option<&Mapping>,
) -> Option<Event> {
    let logical = |q: u32| -> u32 {
        match assign {
            Some(assign) => assign[q as usize],
            None => q,
        }
    };
    let (op, qubits) = match inner {
        Statement::Call { gate, qubits } if gate == INTRINSIC_REV_CX => {
            ("cx".to_string(), vec![logical(qubits[0].0), logical(qubits[1].0)])
        }
        Statement::Call { gate, qubits } if gate == INTRINSIC_LCX => {
            ("cx".to_string(), vec![logical(qubits[0].0), logical(qubits[2].0)])
        }
        Statement::Cx { control, target } => {
            ("cx".to_string(), vec![logical(control.0), logical(target.0)])
        }
        other => (
            other.op_name().to_string(),
            other.qubits().iter().map(|q| logical(q.0)).collect(),
        ),
    };
    if qubits.iter().any(|&q| q == UNDEF) {
        return None;
    }
    Some(Event::Conditional {
        creg: creg.to_string(),
        value,
        op,
        qubits,
    })
}

// --- unitary accumulation ---

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// `U(θ, φ, λ)` in the standard convention.
fn u_matrix(theta: f64, phi: f64, lambda: f64) -> [Complex64; 4] {
    let half = theta / 2.0;
    [
        c(half.cos(), 0.0),
        -Complex64::from_polar(half.sin(), lambda),
        Complex64::from_polar(half.sin(), phi),
        Complex64::from_polar(half.cos(), phi + lambda),
    ]
}

fn unitary_of(stmts: &[Statement], n: u32, relabel: impl Fn(u32) -> u32) -> Array2<Complex64> {
    let dim = 1usize << n;
    let mut u = Array2::<Complex64>::eye(dim);

    for stmt in stmts {
        match stmt {
            Statement::Unary { gate, qubit } => {
                let (theta, phi, lambda) = gate.angles();
                apply_1q(&mut u, u_matrix(theta, phi, lambda), relabel(qubit.0), n);
            }
            Statement::U {
                theta,
                phi,
                lambda,
                qubit,
            } => {
                apply_1q(&mut u, u_matrix(*theta, *phi, *lambda), relabel(qubit.0), n);
            }
            Statement::Cx { control, target } => {
                apply_cx(&mut u, relabel(control.0), relabel(target.0), n);
            }
            // Non-unitary statements are checked structurally; calls are
            // gone after inlining to the primitive basis.
            _ => {}
        }
    }
    u
}

fn apply_1q(u: &mut Array2<Complex64>, m: [Complex64; 4], q: u32, n: u32) {
    let dim = 1usize << n;
    let bit = 1usize << q;
    for col in 0..dim {
        for i in 0..dim {
            if i & bit != 0 {
                continue;
            }
            let j = i | bit;
            let a = u[[i, col]];
            let b = u[[j, col]];
            u[[i, col]] = m[0] * a + m[1] * b;
            u[[j, col]] = m[2] * a + m[3] * b;
        }
    }
}

fn apply_cx(u: &mut Array2<Complex64>, control: u32, target: u32, n: u32) {
    let dim = 1usize << n;
    let cbit = 1usize << control;
    let tbit = 1usize << target;
    for col in 0..dim {
        for i in 0..dim {
            if i & cbit == 0 || i & tbit != 0 {
                continue;
            }
            let j = i | tbit;
            let a = u[[i, col]];
            u[[i, col]] = u[[j, col]];
            u[[j, col]] = a;
        }
    }
}

/// Compose a unitary with the bit permutation taking `from[l]` to `to[l]`.
fn permute_rows(u: &Array2<Complex64>, from: &Mapping, to: &Mapping, n: u32) -> Array2<Complex64> {
    let dim = 1usize << n;
    let mut out = Array2::<Complex64>::zeros((dim, dim));
    for x in 0..dim {
        let mut y = 0usize;
        for l in 0..from.len() {
            if x & (1usize << from[l]) != 0 {
                y |= 1usize << to[l];
            }
        }
        for col in 0..dim {
            out[[y, col]] = u[[x, col]];
        }
    }
    out
}

fn equal_up_to_phase(a: &Array2<Complex64>, b: &Array2<Complex64>) -> bool {
    let mut phase = None;
    let mut best = 0.0f64;
    for (x, y) in b.iter().zip(a.iter()) {
        if x.norm() > best {
            best = x.norm();
            phase = Some(y / x);
        }
    }
    let Some(phase) = phase else {
        return a.iter().all(|x| x.norm() < EPSILON);
    };
    if (phase.norm() - 1.0).abs() > EPSILON {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - phase * y).norm() < EPSILON)
}
