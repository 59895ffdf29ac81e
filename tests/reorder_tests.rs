use label_playlist_sync::reorder::{apply_reorder, compute_reorders_with_limit};
use label_playlist_sync::{compute_reorders, ReorderOperation, TracklistError, MAX_REORDER_LENGTH};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn permutations(items: &[u32]) -> Vec<Vec<u32>> {
    if items.is_empty() {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            out.push(tail);
        }
    }
    out
}

/// Apply reorders one after another, checking each against the state the
/// previous ones left behind.
fn replay(mut current: Vec<u32>, reorders: &[ReorderOperation]) -> Vec<u32> {
    for r in reorders {
        assert!(r.range_length >= 1);
        assert!(r.insert_before < r.range_start, "backward moves only: {:?}", r);
        apply_reorder(&mut current, r).unwrap();
    }
    current
}

#[test]
fn every_permutation_up_to_five_items_round_trips() {
    for n in 0..=5u32 {
        let items: Vec<u32> = (0..n).collect();
        let perms = permutations(&items);
        for current in &perms {
            for target in &perms {
                let reorders = compute_reorders(target, current).unwrap();
                assert_eq!(&replay(current.clone(), &reorders), target, "current={:?}", current);
            }
        }
    }
}

#[test]
fn identical_orderings_need_no_reorders() {
    for n in 0..20u32 {
        let x: Vec<u32> = (0..n).collect();
        assert!(compute_reorders(&x, &x).unwrap().is_empty());
    }
}

#[test]
fn random_large_permutations_round_trip_within_block_limit() {
    let mut rng = StdRng::seed_from_u64(42);
    for n in [10u32, 57, 150, 400] {
        for _ in 0..20 {
            let mut current: Vec<u32> = (0..n).collect();
            let mut target = current.clone();
            current.shuffle(&mut rng);
            target.shuffle(&mut rng);
            let reorders = compute_reorders(&target, &current).unwrap();
            assert!(reorders.iter().all(|r| r.range_length <= MAX_REORDER_LENGTH));
            assert!(reorders.len() <= n as usize);
            assert_eq!(replay(current, &reorders), target);
        }
    }
}

#[test]
fn long_runs_are_split_at_the_limit() {
    // 250 items in order behind one stray item: the run must move in 100-item blocks
    let mut current: Vec<u32> = vec![1000];
    current.extend(0..250);
    let mut target: Vec<u32> = (0..250).collect();
    target.push(1000);

    let reorders = compute_reorders(&target, &current).unwrap();
    let lengths: Vec<usize> = reorders.iter().map(|r| r.range_length).collect();
    assert_eq!(lengths, vec![100, 100, 50]);
    assert_eq!(replay(current, &reorders), target);
}

#[test]
fn custom_limit_is_respected() {
    let current: Vec<u32> = vec![5, 6, 7, 8, 0, 1, 2, 3, 4];
    let target: Vec<u32> = (0..9).collect();
    let reorders = compute_reorders_with_limit(&target, &current, 2).unwrap();
    assert!(reorders.iter().all(|r| r.range_length <= 2));
    assert_eq!(replay(current, &reorders), target);
}

#[test]
fn last_item_first_round_trips() {
    let current = vec![0u32, 1, 2];
    let target = vec![2u32, 0, 1];
    let reorders = compute_reorders(&target, &current).unwrap();
    assert_eq!(replay(current, &reorders), target);
}

#[test]
fn mismatched_sets_are_a_contract_error() {
    let err = compute_reorders(&[1u32, 2], &[1u32, 2, 3]).unwrap_err();
    assert_eq!(err, TracklistError::SetMismatch { only_in_target: 0, only_in_current: 1 });
}

#[test]
fn reorder_serializes_as_the_remote_body() {
    let r = ReorderOperation { range_start: 7, range_length: 3, insert_before: 2 };
    assert_eq!(
        serde_json::to_value(r).unwrap(),
        serde_json::json!({"range_start": 7, "range_length": 3, "insert_before": 2})
    );
}

#[test]
fn block_grows_at_a_later_cursor() {
    let current = vec![0u32, 3, 4, 1, 2];
    let target = vec![0u32, 1, 2, 3, 4];
    assert_eq!(
        compute_reorders(&target, &current).unwrap(),
        vec![ReorderOperation { range_start: 3, range_length: 2, insert_before: 1 }]
    );
}
