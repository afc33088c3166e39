use rand::seq::SliceRandom;
use treedex::{BPlusTree, LongBPlusTree, TreeError};

fn shuffled(count: i64) -> Vec<i64> {
    let mut keys: Vec<i64> = (0..count).collect();
    keys.shuffle(&mut rand::thread_rng());
    keys
}

/// Drives one generic tree through a full life cycle: fill through
/// `compute_if_absent`, scan, point-check, drain ascending, refill through
/// `put`, drain in insertion order, then clear.
fn exercise_generic(order: usize, count: i64) {
    let mut tree: BPlusTree<i64, String> = BPlusTree::new(order).unwrap();
    let keys = shuffled(count);

    for &key in &keys {
        tree.compute_if_absent(key, || key.to_string());
        assert_eq!(tree.get(&key), Some(&key.to_string()));
    }
    assert_eq!(tree.len() as i64, count);

    // bounded window: the upper end is exclusive
    let start = count / 4;
    let end = start * 3;
    let window: Vec<i64> = tree
        .range(Some(&start), Some(&end))
        .unwrap()
        .map(|value| value.parse().unwrap())
        .collect();
    assert_eq!(window, (start..end).collect::<Vec<_>>());

    // unbounded start walks from the first leaf
    let head: Vec<i64> = tree
        .range(None, Some(&start))
        .unwrap()
        .map(|value| value.parse().unwrap())
        .collect();
    assert_eq!(head, (0..start).collect::<Vec<_>>());

    // hits and misses
    assert!(tree.get(&(count / 2)).is_some());
    assert_eq!(tree.get(&(count + 2)), None);
    assert_eq!(tree.remove(&(count + 2)), None);
    assert_eq!(tree.len() as i64, count);

    for key in 0..count {
        assert_eq!(tree.remove(&key), Some(key.to_string()));
        assert_eq!(tree.get(&key), None);
    }
    assert!(tree.is_empty());
    assert_eq!(tree.height(), 0);

    for &key in &keys {
        assert_eq!(tree.put(key, key.to_string()), None);
    }
    assert_eq!(tree.len() as i64, count);
    for &key in &keys {
        assert_eq!(tree.remove(&key), Some(key.to_string()));
        assert_eq!(tree.get(&key), None);
    }
    assert!(tree.is_empty());

    let kept = keys.len().min(10);
    for &key in keys.iter().take(kept) {
        tree.put(key, key.to_string());
    }
    assert_eq!(tree.get_all().len(), kept);
    tree.clear();
    assert!(tree.is_empty());

    tree.compute_if_absent(999, || "zzz".to_string());
    assert_eq!(tree.get(&999).map(String::as_str), Some("zzz"));
}

/// Same life cycle for the integer-keyed tree; its range window is
/// inclusive on both ends.
fn exercise_long(order: usize, count: i64) {
    let mut tree: LongBPlusTree<String> = LongBPlusTree::new(order).unwrap();
    let keys = shuffled(count);

    for &key in &keys {
        tree.compute_if_absent(key, || key.to_string());
        assert_eq!(tree.get(key), Some(&key.to_string()));
    }
    assert_eq!(tree.len() as i64, count);

    let start = count / 4;
    let end = start * 3;
    let window: Vec<i64> = tree.range(start, end).unwrap().map(|value| value.parse().unwrap()).collect();
    assert_eq!(window, (start..=end).collect::<Vec<_>>());

    let everything: Vec<i64> = tree
        .range(i64::MIN, i64::MAX)
        .unwrap()
        .map(|value| value.parse().unwrap())
        .collect();
    assert_eq!(everything, (0..count).collect::<Vec<_>>());

    for key in 0..count {
        assert_eq!(tree.remove(key), Some(key.to_string()));
        assert_eq!(tree.get(key), None);
        assert_eq!(tree.len() as i64, count - key - 1);
    }
    assert_eq!(tree.height(), 0);

    for &key in &keys {
        assert_eq!(tree.put(key, key.to_string()), None);
    }
    for &key in &keys {
        assert_eq!(tree.remove(key), Some(key.to_string()));
    }
    assert!(tree.is_empty());
}

#[test]
fn generic_tree_orders() {
    exercise_generic(3, 16);
    exercise_generic(4, 16);
    exercise_generic(8, 64);
    exercise_generic(64, 10_000);
}

#[test]
fn long_tree_orders() {
    exercise_long(3, 16);
    exercise_long(4, 16);
    exercise_long(8, 64);
    exercise_long(64, 10_000);
}

#[test]
fn insertion_order_does_not_matter() {
    let count = 512i64;
    let mut permutations = vec![(0..count).collect::<Vec<_>>(), (0..count).rev().collect()];
    permutations.push(shuffled(count));

    for order in [3usize, 4, 8, 64] {
        for keys in &permutations {
            let mut tree: LongBPlusTree<i64> = LongBPlusTree::new(order).unwrap();
            for &key in keys {
                tree.put(key, key);
            }
            let stored: Vec<i64> = tree.get_all().into_iter().copied().collect();
            assert_eq!(stored, (0..count).collect::<Vec<_>>());
        }
    }
}

#[test]
fn displacement_round_trip() {
    let mut tree: LongBPlusTree<&str> = LongBPlusTree::new(4).unwrap();
    assert_eq!(tree.put(1, "v1"), None);
    assert_eq!(tree.put(1, "v2"), Some("v1"));
    assert_eq!(tree.get(1), Some(&"v2"));
    assert_eq!(tree.remove(1), Some("v2"));
    assert_eq!(tree.get(1), None);
    assert_eq!(tree.remove(1), None);
}

#[test]
fn invalid_arguments_leave_trees_unchanged() {
    assert_eq!(LongBPlusTree::<i64>::new(2).err(), Some(TreeError::OrderTooSmall(2)));
    assert_eq!(BPlusTree::<i64, i64>::new(2).err(), Some(TreeError::OrderTooSmall(2)));

    let mut long_tree: LongBPlusTree<i64> = LongBPlusTree::new(4).unwrap();
    long_tree.put(1, 1);
    assert_eq!(long_tree.range(5, 3).err(), Some(TreeError::InvalidRange));
    assert_eq!(long_tree.len(), 1);

    let mut generic: BPlusTree<i64, i64> = BPlusTree::new(4).unwrap();
    generic.put(1, 1);
    assert_eq!(generic.range(Some(&5), Some(&3)).err(), Some(TreeError::InvalidRange));
    assert_eq!(generic.len(), 1);
}

#[test]
fn empty_tree_operations() {
    let mut tree: LongBPlusTree<i64> = LongBPlusTree::new(3).unwrap();
    assert_eq!(tree.get(0), None);
    assert_eq!(tree.remove(0), None);
    assert!(tree.get_all().is_empty());
    assert_eq!(tree.range(i64::MIN, i64::MAX).unwrap().count(), 0);
    assert_eq!(tree.height(), 0);
    assert!(tree.is_empty());
}
