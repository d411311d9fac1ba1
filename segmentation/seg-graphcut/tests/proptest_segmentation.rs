//! Property-based tests for the segmentation pipeline.
//!
//! Volumes are drawn from three intensity levels so cut values never nearly
//! tie across different boundaries; exact ties resolve to the minimal source
//! set on every backend.
//!
//! Run with: cargo test -p seg-graphcut -- proptest

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use approx::assert_relative_eq;
use proptest::prelude::*;
use seg_graphcut::{
    DirectionPolicy, GraphCutParams, SegmentationRequest, Sigma, boundary_weight, segment,
};
use seg_maxflow::SolverKind;
use seg_types::{GridDims, Volume};

// =============================================================================
// Strategies
// =============================================================================

#[derive(Debug, Clone)]
struct Case {
    volume: Volume<u8>,
    foreground: Volume<u8>,
    background: Volume<u8>,
}

fn arb_dims() -> impl Strategy<Value = GridDims> {
    (1usize..=3, 1usize..=3, 1usize..=3)
        .prop_map(|(x, y, z)| GridDims::new(x, y, z))
        .prop_filter("need two voxels for two seeds", |d| d.voxel_count() >= 2)
}

fn arb_direction() -> impl Strategy<Value = DirectionPolicy> {
    prop_oneof![
        Just(DirectionPolicy::Symmetric),
        Just(DirectionPolicy::BrightToDark),
        Just(DirectionPolicy::DarkToBright),
    ]
}

/// Per voxel: intensity level and seed role (0 free, 1 foreground,
/// 2 background). The first voxel is always foreground and the last always
/// background so neither set is empty.
fn arb_case() -> impl Strategy<Value = Case> {
    arb_dims().prop_flat_map(|dims| {
        let n = dims.voxel_count();
        let level = prop_oneof![Just(0u8), Just(100), Just(200)];
        let role = prop_oneof![6 => Just(0u8), 1 => Just(1), 1 => Just(2)];
        let levels = prop::collection::vec(level, n);
        let roles = prop::collection::vec(role, n);
        (levels, roles).prop_map(move |(levels, mut roles)| {
            roles[0] = 1;
            roles[n - 1] = 2;
            let mask = |class: u8| -> Vec<u8> {
                roles.iter().map(|&r| u8::from(r == class)).collect()
            };
            let volume = Volume::from_vec(dims, levels).unwrap();
            let foreground = Volume::from_vec(dims, mask(1)).unwrap();
            let background = Volume::from_vec(dims, mask(2)).unwrap();
            Case {
                volume,
                foreground,
                background,
            }
        })
    })
}

fn run(case: &Case, params: &GraphCutParams) -> (Vec<u8>, f64) {
    let request =
        SegmentationRequest::new("proptest", &case.volume, &case.foreground, &case.background);
    let output = segment(&request, params).unwrap();
    (output.labels.into_vec(), output.stats.flow)
}

fn params(solver: SolverKind, direction: DirectionPolicy) -> GraphCutParams {
    GraphCutParams::default()
        .with_sigma(Sigma::Fixed(50.0))
        .with_direction(direction)
        .with_solver(solver)
}

// =============================================================================
// Seed consistency
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_seeds_keep_their_class(case in arb_case(), direction in arb_direction()) {
        for solver in SolverKind::ALL {
            let (labels, _) = run(&case, &params(solver, direction));
            for (i, &label) in labels.iter().enumerate() {
                if case.foreground.as_slice()[i] > 0 {
                    prop_assert_eq!(label, 255);
                }
                if case.background.as_slice()[i] > 0 {
                    prop_assert_eq!(label, 0);
                }
                prop_assert!(label == 0 || label == 255);
            }
        }
    }

    #[test]
    fn proptest_adding_seeds_keeps_old_seeds(case in arb_case(), extra in 0usize..48) {
        let n = case.volume.len();
        let extra = extra % n;
        let (before, _) = run(&case, &params(SolverKind::Adjacency, DirectionPolicy::Symmetric));

        let mut grown = case.clone();
        if grown.background.as_slice()[extra] == 0 {
            grown.foreground.as_mut_slice()[extra] = 1;
        }
        let (after, _) = run(&grown, &params(SolverKind::Adjacency, DirectionPolicy::Symmetric));
        for i in 0..n {
            if case.foreground.as_slice()[i] > 0 {
                prop_assert_eq!(before[i], 255);
                prop_assert_eq!(after[i], 255);
            }
        }
    }
}

// =============================================================================
// Backend equivalence
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_backends_agree(case in arb_case(), direction in arb_direction()) {
        let (reference, reference_flow) = run(&case, &params(SolverKind::Adjacency, direction));
        for solver in [SolverKind::Layered, SolverKind::Grid] {
            let (labels, flow) = run(&case, &params(solver, direction));
            prop_assert_eq!(&labels, &reference, "{}", solver);
            assert_relative_eq!(flow, reference_flow, epsilon = 1e-9, max_relative = 1e-9);
        }
    }

    #[test]
    fn proptest_symmetric_weights_ignore_order(
        a in 0.0f64..4096.0,
        b in 0.0f64..4096.0,
        sigma in 0.5f64..500.0,
    ) {
        let policy = DirectionPolicy::Symmetric;
        let (ab, ba) = boundary_weight(a, b, sigma, policy).unwrap();
        let (ab_swapped, ba_swapped) = boundary_weight(b, a, sigma, policy).unwrap();
        prop_assert_eq!(ab, ba);
        prop_assert_eq!(ab, ab_swapped);
        prop_assert_eq!(ba, ba_swapped);
        prop_assert!((0.0..=1.0).contains(&ab));
    }

    #[test]
    fn proptest_directed_weights_swap(
        a in 0.0f64..4096.0,
        b in 0.0f64..4096.0,
        sigma in 0.5f64..500.0,
    ) {
        let policy = DirectionPolicy::BrightToDark;
        let (ab, ba) = boundary_weight(a, b, sigma, policy).unwrap();
        let (ab_swapped, ba_swapped) = boundary_weight(b, a, sigma, policy).unwrap();
        prop_assert_eq!(ab, ba_swapped);
        prop_assert_eq!(ba, ab_swapped);
    }
}

#[test]
fn seeded_pairs_are_never_reassigned() {
    // Fixed regression input for the strategy above: two seeds only.
    let dims = GridDims::new(2, 1, 1);
    let case = Case {
        volume: Volume::from_vec(dims, vec![0, 200]).unwrap(),
        foreground: Volume::from_vec(dims, vec![1, 0]).unwrap(),
        background: Volume::from_vec(dims, vec![0, 1]).unwrap(),
    };
    for solver in SolverKind::ALL {
        let (labels, flow) = run(&case, &params(solver, DirectionPolicy::Symmetric));
        assert_eq!(labels, vec![255, 0]);
        assert_relative_eq!(flow, (-200.0f64 * 200.0 / 5000.0).exp(), max_relative = 1e-12);
    }
}
