//! End-to-end allocation scenarios on the 5-qubit QX2 device and small
//! line devices, exercising every allocator through the public `compile`
//! entry point.

use alsvid_alloc::{
    compile, AllocatorKind, CompilationSettings, CostConfig, CouplingGraph,
};
use alsvid_ir::{ClbitId, GateDecl, Module, QubitId, Statement};

use proptest::prelude::*;

fn settings(arch: CouplingGraph, allocator: AllocatorKind) -> CompilationSettings {
    let mut settings = CompilationSettings::new(arch);
    settings.allocator = allocator;
    settings
}

fn count_gate(module: &Module, name: &str) -> usize {
    module
        .statements()
        .iter()
        .filter(|s| matches!(s, Statement::Call { gate, .. } if gate == name))
        .count()
}

#[test]
fn adjacent_cnot_compiles_to_itself() {
    for allocator in [
        AllocatorKind::IdentityPathGuided,
        AllocatorKind::Dynprog,
        AllocatorKind::Ibm,
        AllocatorKind::Jku,
        AllocatorKind::LayeredBmt,
    ] {
        let mut m = Module::with_size(2, 0);
        m.cx(QubitId(0), QubitId(1)).unwrap();
        let result = compile(m, &settings(CouplingGraph::qx2(), allocator)).unwrap();
        assert_eq!(result.cost, 0, "allocator {allocator:?}");
        assert_eq!(result.initial, vec![0, 1]);
        assert_eq!(
            result.module.statements(),
            &[Statement::Cx {
                control: QubitId(0),
                target: QubitId(1)
            }]
        );
        assert_eq!(result.arch_ok, Some(true));
        assert_eq!(result.semantics_ok, Some(true));
    }
}

#[test]
fn dependency_guided_finder_solves_qx2_without_swaps() {
    let mut m = Module::with_size(5, 0);
    for (a, b) in [(2, 1), (2, 0), (1, 0), (4, 3), (4, 0), (3, 0)] {
        m.cx(QubitId(a), QubitId(b)).unwrap();
    }
    let result = compile(
        m,
        &settings(CouplingGraph::qx2(), AllocatorKind::WeightedPathGuided),
    )
    .unwrap();

    assert_eq!(result.initial, vec![2, 1, 0, 4, 3]);
    assert_eq!(result.cost, 0);
    assert_eq!(count_gate(&result.module, "intrinsic_swap__"), 0);
    assert_eq!(result.arch_ok, Some(true));
    assert_eq!(result.semantics_ok, Some(true));
}

#[test]
fn declared_gate_body_feeds_dependencies() {
    // A two-qubit declared gate used twice; its body dependencies drive the
    // allocation just like plain CNOTs.
    let mut m = Module::with_size(5, 0);
    m.declare_gate(GateDecl::new(
        "test",
        3,
        vec![
            Statement::Cx {
                control: QubitId(0),
                target: QubitId(1),
            },
            Statement::Cx {
                control: QubitId(0),
                target: QubitId(2),
            },
            Statement::Cx {
                control: QubitId(1),
                target: QubitId(2),
            },
        ],
    ))
    .unwrap();
    m.call("test", [QubitId(0), QubitId(1), QubitId(2)]).unwrap();
    m.call("test", [QubitId(4), QubitId(0), QubitId(1)]).unwrap();

    let result = compile(
        m,
        &settings(CouplingGraph::qx2(), AllocatorKind::WeightedPathGuided),
    )
    .unwrap();
    assert_eq!(result.arch_ok, Some(true));
    assert_eq!(result.semantics_ok, Some(true));
}

#[test]
fn far_pair_on_line_costs_three_swaps() {
    let mut m = Module::with_size(5, 0);
    m.cx(QubitId(0), QubitId(4)).unwrap();
    let result = compile(
        m,
        &settings(CouplingGraph::linear(5), AllocatorKind::IdentityPathGuided),
    )
    .unwrap();

    assert_eq!(count_gate(&result.module, "intrinsic_swap__"), 3);
    assert_eq!(result.cost, 3 * 7);
    assert_eq!(result.arch_ok, Some(true));
    assert_eq!(result.semantics_ok, Some(true));
}

#[test]
fn lone_bridge_beats_swapping() {
    let mut m = Module::with_size(3, 0);
    m.cx(QubitId(0), QubitId(2)).unwrap();
    let result = compile(
        m,
        &settings(CouplingGraph::linear(3), AllocatorKind::IdentityPathGuided),
    )
    .unwrap();
    assert_eq!(count_gate(&result.module, "intrinsic_lcx__"), 1);
    assert_eq!(result.cost, u64::from(CostConfig::default().bridge));
    assert_eq!(result.arch_ok, Some(true));
    assert_eq!(result.semantics_ok, Some(true));

    // The exact allocator places the pair adjacently instead and must stay
    // within the swap-then-unswap bound.
    let mut m = Module::with_size(3, 0);
    m.cx(QubitId(0), QubitId(2)).unwrap();
    let exact = compile(
        m,
        &settings(CouplingGraph::linear(3), AllocatorKind::Dynprog),
    )
    .unwrap();
    assert!(exact.cost <= 2 * u64::from(CostConfig::default().swap));
    assert_eq!(exact.cost, 0);
}

#[test]
fn quality_counts_weighted_primitives() {
    let mut m = Module::with_size(4, 0);
    for (a, b) in [(0, 1), (0, 2), (0, 3), (0, 1), (0, 1), (0, 2), (0, 2)] {
        m.cx(QubitId(a), QubitId(b)).unwrap();
    }
    let result = compile(
        m,
        &settings(CouplingGraph::full(4), AllocatorKind::IdentityPathGuided),
    )
    .unwrap();
    assert_eq!(result.quality.depth, 7);
    assert_eq!(result.quality.gates, 7);
    assert_eq!(result.quality.weighted_cost, 70);
}

#[test]
fn fixed_seed_reproduces_bitwise() {
    let build = || {
        let mut m = Module::with_size(5, 1);
        m.h(QubitId(0)).unwrap();
        m.cx(QubitId(0), QubitId(3)).unwrap();
        m.cx(QubitId(1), QubitId(4)).unwrap();
        m.cx(QubitId(2), QubitId(0)).unwrap();
        m.measure(QubitId(0), ClbitId(0)).unwrap();
        m
    };
    for allocator in [AllocatorKind::RandomPathGuided, AllocatorKind::Ibm] {
        let mut s = settings(CouplingGraph::linear(5), allocator);
        s.seed = 271_828;
        let first = compile(build(), &s).unwrap();
        let second = compile(build(), &s).unwrap();
        assert_eq!(
            first.module.statements(),
            second.module.statements(),
            "allocator {allocator:?}"
        );
        assert_eq!(first.initial, second.initial);
        assert_eq!(first.cost, second.cost);
    }
}

#[test]
fn exact_allocator_is_a_lower_bound() {
    let programs: Vec<Vec<(u32, u32)>> = vec![
        vec![(0, 1), (0, 2), (1, 2)],
        vec![(0, 2), (2, 0), (1, 0)],
        vec![(2, 1), (0, 2), (1, 0), (2, 0)],
    ];
    for deps in programs {
        let build = |deps: &[(u32, u32)]| {
            let mut m = Module::with_size(3, 0);
            for &(a, b) in deps {
                m.cx(QubitId(a), QubitId(b)).unwrap();
            }
            m
        };
        let mut s = settings(CouplingGraph::linear(3), AllocatorKind::Dynprog);
        s.force = true;
        let exact = compile(build(&deps), &s).unwrap();

        // Only allocators speaking the same swap/reversal vocabulary are
        // bounded; the path-guided builder may undercut with bridges.
        for allocator in [
            AllocatorKind::Ibm,
            AllocatorKind::Jku,
            AllocatorKind::LayeredBmt,
        ] {
            let mut s = settings(CouplingGraph::linear(3), allocator);
            s.force = true;
            let heuristic = compile(build(&deps), &s).unwrap();
            assert!(
                exact.cost <= heuristic.cost,
                "{allocator:?} beat the exact optimum on {deps:?}"
            );
        }
    }
}

#[test]
fn all_allocators_produce_verified_output() {
    let build = || {
        let mut m = Module::with_size(4, 2);
        m.h(QubitId(0)).unwrap();
        m.cx(QubitId(0), QubitId(3)).unwrap();
        m.cx(QubitId(1), QubitId(2)).unwrap();
        m.cx(QubitId(3), QubitId(1)).unwrap();
        m.measure(QubitId(3), ClbitId(0)).unwrap();
        m.measure(QubitId(1), ClbitId(1)).unwrap();
        m
    };
    for allocator in [
        AllocatorKind::IdentityPathGuided,
        AllocatorKind::RandomPathGuided,
        AllocatorKind::WeightedPathGuided,
        AllocatorKind::Dynprog,
        AllocatorKind::Ibm,
        AllocatorKind::Jku,
        AllocatorKind::LayeredBmt,
    ] {
        let result = compile(build(), &settings(CouplingGraph::linear(4), allocator)).unwrap();
        assert_eq!(result.arch_ok, Some(true), "allocator {allocator:?}");
        assert_eq!(result.semantics_ok, Some(true), "allocator {allocator:?}");
    }
}

#[test]
fn json_device_round_trip() {
    let text = r#"{
        "qubits": 5,
        "registers": [{ "name": "q", "qubits": 5 }],
        "adj": [
            [{ "v": "q[1]" }, { "v": "q[2]" }],
            [{ "v": "q[2]" }],
            [],
            [{ "v": "q[2]" }, { "v": "q[4]" }],
            [{ "v": "q[2]" }]
        ]
    }"#;
    let g = CouplingGraph::from_json_str(text).unwrap();
    let mut m = Module::with_size(5, 0);
    m.cx(QubitId(0), QubitId(1)).unwrap();
    m.cx(QubitId(3), QubitId(4)).unwrap();
    let result = compile(m, &settings(g, AllocatorKind::IdentityPathGuided)).unwrap();
    assert_eq!(result.cost, 0);
    assert_eq!(result.arch_ok, Some(true));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever the dependency stream, the path-guided pipeline must end
    /// architecture-legal and semantics-preserving.
    #[test]
    fn path_guided_output_always_verifies(
        deps in proptest::collection::vec((0u32..4, 0u32..4), 0..8)
    ) {
        let mut m = Module::with_size(4, 0);
        for (a, b) in deps {
            if a != b {
                m.cx(QubitId(a), QubitId(b)).unwrap();
            }
        }
        let mut s = settings(CouplingGraph::linear(4), AllocatorKind::IdentityPathGuided);
        s.force = true;
        let result = compile(m, &s).unwrap();
        prop_assert_eq!(result.arch_ok, Some(true));
        prop_assert_eq!(result.semantics_ok, Some(true));
    }

    /// The weighted finder never produces an inconsistent placement.
    #[test]
    fn weighted_finder_outputs_verify(
        deps in proptest::collection::vec((0u32..5, 0u32..5), 1..10)
    ) {
        let mut m = Module::with_size(5, 0);
        for (a, b) in deps {
            if a != b {
                m.cx(QubitId(a), QubitId(b)).unwrap();
            }
        }
        let result = compile(
            m,
            &settings(CouplingGraph::qx2(), AllocatorKind::WeightedPathGuided),
        )
        .unwrap();
        prop_assert_eq!(result.arch_ok, Some(true));
        prop_assert_eq!(result.semantics_ok, Some(true));
    }
}
