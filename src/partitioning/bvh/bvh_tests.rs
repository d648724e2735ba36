use crate::bounding_volume::{Aabb, BoundingVolume, Plane};
use crate::math::{Point, Real, Vector};
use crate::partitioning::{Bvh, BvhItemData, CullParams};

fn make_test_aabb(i: usize) -> Aabb {
    Aabb::from_half_extents(Vector::repeat(3.0 * i as Real).into(), Vector::repeat(1.0))
}

fn make_item_data(owner: u32) -> BvhItemData {
    BvhItemData {
        owner,
        subindex: 0,
        pairable: false,
        pairable_type: 0,
        pairable_mask: 0,
    }
}

fn pairable_item_data(owner: u32, pairable_type: u32, pairable_mask: u32) -> BvhItemData {
    BvhItemData {
        owner,
        subindex: 0,
        pairable: true,
        pairable_type,
        pairable_mask,
    }
}

fn cull_aabb_ids(bvh: &Bvh, aabb: &Aabb) -> Vec<u32> {
    let mut buf = vec![0u32; bvh.item_count().max(1)];
    let mut params = CullParams::new(&mut buf);
    bvh.cull_aabb(aabb, &mut params);
    let mut ids = params.results().to_vec();
    ids.sort_unstable();
    ids
}

#[test]
fn bvh_build_and_removal() {
    // Check various combinations of insertion count and removal pattern.
    // The tree validity is asserted at every step.
    #[derive(Copy, Clone, Debug)]
    enum RemovalPattern {
        InOrder,
        RevOrder,
        EvenOdd,
    }

    for removal_pattern in [
        RemovalPattern::InOrder,
        RemovalPattern::RevOrder,
        RemovalPattern::EvenOdd,
    ] {
        for len in 1..=50 {
            let mut bvh = Bvh::new();
            let mut ids: Vec<u32> = Vec::new();

            for i in 0..len {
                ids.push(bvh.insert(make_test_aabb(i), make_item_data(i as u32)));
                bvh.assert_well_formed();
            }

            for _ in 0..3 {
                bvh.assert_well_formed();

                match removal_pattern {
                    RemovalPattern::InOrder => {
                        for i in 0..len {
                            bvh.remove(ids[i]);
                            bvh.assert_well_formed();
                        }
                    }
                    RemovalPattern::RevOrder => {
                        for i in (0..len).rev() {
                            bvh.remove(ids[i]);
                            bvh.assert_well_formed();
                        }
                    }
                    RemovalPattern::EvenOdd => {
                        for i in (0..len).filter(|i| i % 2 == 0) {
                            bvh.remove(ids[i]);
                            bvh.assert_well_formed();
                        }
                        for i in (0..len).filter(|i| i % 2 != 0) {
                            bvh.remove(ids[i]);
                            bvh.assert_well_formed();
                        }
                    }
                }

                assert!(bvh.is_empty());
                assert_eq!(bvh.node_count(), 0);
                assert_eq!(bvh.leaf_count(), 0);

                // Re-insert everything (ids may be reused).
                ids.clear();
                for i in 0..len {
                    ids.push(bvh.insert(make_test_aabb(i), make_item_data(i as u32)));
                }
            }
        }
    }
}

#[test]
fn cull_aabb_matches_brute_force() {
    let mut rng = oorandom::Rand32::new(42);
    let mut bvh = Bvh::with_margin(0.0);
    let mut expected: Vec<(u32, Aabb)> = Vec::new();

    for i in 0..100u32 {
        let center: Point<Real> =
            Vector::from_fn(|_, _| (rng.rand_float() * 100.0) as Real).into();
        let half_extents = Vector::from_fn(|_, _| (0.5 + rng.rand_float() * 5.0) as Real);
        let aabb = Aabb::from_half_extents(center, half_extents);

        let id = bvh.insert(aabb, make_item_data(i));
        expected.push((id, aabb));
    }

    bvh.assert_well_formed();

    for _ in 0..40 {
        let center: Point<Real> =
            Vector::from_fn(|_, _| (rng.rand_float() * 100.0) as Real).into();
        let half_extents = Vector::from_fn(|_, _| (1.0 + rng.rand_float() * 20.0) as Real);
        let query = Aabb::from_half_extents(center, half_extents);

        let culled = cull_aabb_ids(&bvh, &query);

        let mut brute: Vec<u32> = expected
            .iter()
            .filter(|(_, aabb)| aabb.intersects(&query))
            .map(|(id, _)| *id)
            .collect();
        brute.sort_unstable();

        assert_eq!(culled, brute);
    }
}

#[test]
fn cull_segment_matches_brute_force() {
    let mut rng = oorandom::Rand32::new(7);
    let mut bvh = Bvh::with_margin(0.0);
    let mut expected: Vec<(u32, Aabb)> = Vec::new();

    for i in 0..80u32 {
        let center: Point<Real> =
            Vector::from_fn(|_, _| (rng.rand_float() * 50.0) as Real).into();
        let half_extents = Vector::from_fn(|_, _| (0.5 + rng.rand_float() * 3.0) as Real);
        let aabb = Aabb::from_half_extents(center, half_extents);

        let id = bvh.insert(aabb, make_item_data(i));
        expected.push((id, aabb));
    }

    for _ in 0..40 {
        let from: Point<Real> = Vector::from_fn(|_, _| (rng.rand_float() * 50.0) as Real).into();
        let to: Point<Real> = Vector::from_fn(|_, _| (rng.rand_float() * 50.0) as Real).into();

        let mut buf = vec![0u32; expected.len()];
        let mut params = CullParams::new(&mut buf);
        bvh.cull_segment(&from, &to, &mut params);
        let mut culled = params.results().to_vec();
        culled.sort_unstable();

        let mut brute: Vec<u32> = expected
            .iter()
            .filter(|(_, aabb)| aabb.intersects_segment(&from, &to))
            .map(|(id, _)| *id)
            .collect();
        brute.sort_unstable();

        assert_eq!(culled, brute);
    }
}

#[test]
fn cull_segment_axis_parallel() {
    let mut bvh = Bvh::with_margin(0.0);
    let a = bvh.insert(make_test_aabb(0), make_item_data(0));
    let _b = bvh.insert(make_test_aabb(5), make_item_data(1));

    // A segment along the first axis, passing through the first box only.
    let mut from: Point<Real> = Vector::repeat(0.0).into();
    let mut to: Point<Real> = Vector::repeat(0.0).into();
    from[0] = -10.0;
    to[0] = 2.0;

    let mut buf = [0u32; 8];
    let mut params = CullParams::new(&mut buf);
    bvh.cull_segment(&from, &to, &mut params);

    assert_eq!(params.results(), &[a]);
}

#[test]
fn cull_point_finds_containing_items() {
    let mut bvh = Bvh::with_margin(0.0);
    let a = bvh.insert(make_test_aabb(0), make_item_data(0));
    let _b = bvh.insert(make_test_aabb(4), make_item_data(1));

    let point: Point<Real> = Vector::repeat(0.5).into();
    let mut buf = [0u32; 8];
    let mut params = CullParams::new(&mut buf);
    bvh.cull_point(&point, &mut params);
    assert_eq!(params.results(), &[a]);

    let far: Point<Real> = Vector::repeat(100.0).into();
    let mut params = CullParams::new(&mut buf);
    bvh.cull_point(&far, &mut params);
    assert_eq!(params.result_count(), 0);
}

#[test]
fn cull_convex_matches_brute_force() {
    let mut rng = oorandom::Rand32::new(99);
    let mut bvh = Bvh::with_margin(0.0);
    let mut expected: Vec<(u32, Aabb)> = Vec::new();

    for i in 0..60u32 {
        let center: Point<Real> =
            Vector::from_fn(|_, _| (rng.rand_float() * 40.0 - 20.0) as Real).into();
        let half_extents = Vector::from_fn(|_, _| (0.5 + rng.rand_float() * 2.0) as Real);
        let aabb = Aabb::from_half_extents(center, half_extents);

        let id = bvh.insert(aabb, make_item_data(i));
        expected.push((id, aabb));
    }

    // An axis-aligned convex region: the box [0, 10]^d described by planes.
    let mut planes = Vec::new();
    for i in 0..crate::math::DIM {
        let mut normal = Vector::repeat(0.0);
        normal[i] = 1.0;
        planes.push(Plane::new(normal, 10.0));
        let mut normal = Vector::repeat(0.0);
        normal[i] = -1.0;
        planes.push(Plane::new(normal, 0.0));
    }

    let mut buf = vec![0u32; expected.len()];
    let mut params = CullParams::new(&mut buf);
    bvh.cull_convex(&planes, &mut params);
    let mut culled = params.results().to_vec();
    culled.sort_unstable();

    let mut brute: Vec<u32> = expected
        .iter()
        .filter(|(_, aabb)| aabb.intersects_planes(&planes))
        .map(|(id, _)| *id)
        .collect();
    brute.sort_unstable();

    assert_eq!(culled, brute);
}

#[test]
fn basic_insert_and_query() {
    let mut bvh = Bvh::new();
    let a = bvh.insert(
        Aabb::new(Vector::repeat(0.0).into(), Vector::repeat(1.0).into()),
        make_item_data(0),
    );
    let b = bvh.insert(
        Aabb::new(Vector::repeat(5.0).into(), Vector::repeat(6.0).into()),
        make_item_data(1),
    );

    let query = Aabb::new(Vector::repeat(0.0).into(), Vector::repeat(2.0).into());
    assert_eq!(cull_aabb_ids(&bvh, &query), vec![a]);

    let everything = Aabb::new(Vector::repeat(-10.0).into(), Vector::repeat(10.0).into());
    let mut all = cull_aabb_ids(&bvh, &everything);
    all.sort_unstable();
    assert_eq!(all, vec![a, b]);
}

#[test]
fn move_within_margin_is_free() {
    let mut bvh = Bvh::with_margin(0.5);
    let mut ids = Vec::new();
    for i in 0..10 {
        ids.push(bvh.insert(make_test_aabb(i), make_item_data(i as u32)));
    }
    bvh.assert_well_formed();

    let nodes_before = bvh.node_count();

    // Same bound: idempotent no-op.
    assert!(!bvh.set_aabb(ids[3], &make_test_aabb(3)));
    assert_eq!(bvh.node_count(), nodes_before);
    bvh.assert_well_formed();

    // Small shift: still inside the expanded bound, no restructuring.
    let small = make_test_aabb(3);
    let shifted = Aabb::new(
        small.mins + Vector::repeat(0.1),
        small.maxs + Vector::repeat(0.1),
    );
    assert!(!bvh.set_aabb(ids[3], &shifted));
    assert_eq!(bvh.node_count(), nodes_before);
    bvh.assert_well_formed();

    // Large shift: the item gets relocated, invariants still hold.
    let far = Aabb::new(
        small.mins + Vector::repeat(100.0),
        small.maxs + Vector::repeat(100.0),
    );
    assert!(bvh.set_aabb(ids[3], &far));
    bvh.refit();
    bvh.assert_well_formed();

    assert_eq!(cull_aabb_ids(&bvh, &far), vec![ids[3]]);
    assert!(!cull_aabb_ids(&bvh, &make_test_aabb(3)).contains(&ids[3]));
}

#[test]
fn move_within_leaf_defers_refit() {
    let mut bvh = Bvh::with_margin(1.0);
    let a = bvh.insert(
        Aabb::from_half_extents(Vector::repeat(0.0).into(), Vector::repeat(1.0)),
        make_item_data(0),
    );
    let _b = bvh.insert(
        Aabb::from_half_extents(Vector::repeat(4.0).into(), Vector::repeat(1.0)),
        make_item_data(1),
    );
    assert_eq!(bvh.node_count(), 1);

    // Exits its own expanded bound but stays inside the shared leaf bound:
    // an in-place update, no restructuring.
    let moved = Aabb::from_half_extents(Vector::repeat(2.5).into(), Vector::repeat(1.0));
    assert!(bvh.set_aabb(a, &moved));
    assert_eq!(bvh.node_count(), 1);
    bvh.assert_well_formed();

    bvh.refit();
    bvh.assert_well_formed();

    assert!(cull_aabb_ids(&bvh, &moved).contains(&a));
}

#[test]
fn full_leaves_split() {
    let mut bvh = Bvh::new();
    let mut ids = Vec::new();
    for i in 0..16u32 {
        // All items co-located: leaves must split once full.
        ids.push(bvh.insert(make_test_aabb(0), make_item_data(i)));
        bvh.assert_well_formed();
    }

    assert!(bvh.leaf_count() >= 4);

    let query = make_test_aabb(0);
    let mut found = cull_aabb_ids(&bvh, &query);
    found.sort_unstable();
    ids.sort_unstable();
    assert_eq!(found, ids);
}

#[test]
fn pairable_partition_can_skip_half_the_tree() {
    let mut bvh = Bvh::new();
    let aabb = make_test_aabb(0);
    let plain = bvh.insert(aabb, make_item_data(0));
    let paired = bvh.insert(aabb, pairable_item_data(1, 0b01, 0b01));
    bvh.assert_well_formed();

    let mut buf = [0u32; 8];

    let mut params = CullParams::new(&mut buf);
    params.test_pairable_only = true;
    bvh.cull_aabb(&aabb, &mut params);
    assert_eq!(params.results(), &[paired]);

    let mut params = CullParams::new(&mut buf);
    bvh.cull_aabb(&aabb, &mut params);
    let mut all = params.results().to_vec();
    all.sort_unstable();
    assert_eq!(all, vec![plain, paired]);
}

#[test]
fn cull_mask_filters_items() {
    const KIND_A: u32 = 0b01;
    const KIND_B: u32 = 0b10;

    let mut bvh = Bvh::new();
    let aabb = make_test_aabb(0);
    let a = bvh.insert(aabb, pairable_item_data(0, KIND_A, 0));
    let _b = bvh.insert(aabb, pairable_item_data(1, KIND_B, 0));

    let mut buf = [0u32; 8];
    let mut params = CullParams::new(&mut buf);
    params.mask = KIND_A;
    params.pairable_type = 0;
    bvh.cull_aabb(&aabb, &mut params);

    assert_eq!(params.results(), &[a]);
}

#[test]
fn cull_truncates_silently() {
    let mut bvh = Bvh::with_margin(0.0);
    for i in 0..10u32 {
        let _ = bvh.insert(make_test_aabb(0), make_item_data(i));
    }

    let mut buf = [0u32; 4];
    let mut params = CullParams::new(&mut buf);
    bvh.cull_aabb(&make_test_aabb(0), &mut params);

    assert_eq!(params.result_count(), 4);
    assert_eq!(params.result_count_overall(), 10);
}

#[test]
#[should_panic(expected = "use of a removed BVH item id")]
fn use_after_remove_panics() {
    let mut bvh = Bvh::new();
    let id = bvh.insert(make_test_aabb(0), make_item_data(0));
    bvh.remove(id);
    let _ = bvh.set_aabb(id, &make_test_aabb(1));
}
