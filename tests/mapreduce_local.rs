use parloom::algorithm::FnAlgorithm;
use parloom::algorithms::{MergeCounts, ModuloKey, ReduceAddVec};
use parloom::shuffle::Key;
use parloom::testing::assert_keyed_result;
use parloom::{MapReduceHorizontal, MapReduceVertical, promise};
use std::collections::BTreeMap;

#[test]
fn horizontal_groups_by_key_and_sums() {
    let node = MapReduceHorizontal::create(
        parloom::AlgorithmAdapter::create(ModuloKey::new()),
        parloom::AlgorithmAdapter::create(ReduceAddVec::new(0u64)),
        4,
    );
    node.initialize();

    // 1 and 769 collide on key 1; 2 stands alone.
    let result = node
        .submit(promise::ready(promise::pack(vec![1u64, 769, 2])))
        .wait();
    assert_keyed_result(&result, &[(1, 770), (2, 2)]);

    node.dispose();
}

#[test]
fn horizontal_omits_keys_without_values() {
    let node = MapReduceHorizontal::create(
        parloom::AlgorithmAdapter::create(ModuloKey::new()),
        parloom::AlgorithmAdapter::create(ReduceAddVec::new(0u64)),
        2,
    );
    node.initialize();

    let result = node.submit(promise::ready(promise::pack(vec![5u64]))).wait();
    assert_eq!(result.len(), 1);
    assert_eq!(result[&5], 5);

    let empty = node.submit(promise::ready(Vec::new())).wait();
    assert!(empty.is_empty());

    node.dispose();
}

#[test]
fn horizontal_handles_many_inputs_across_epochs() {
    let node = MapReduceHorizontal::create(
        parloom::AlgorithmAdapter::create(ModuloKey::new()),
        parloom::AlgorithmAdapter::create(ReduceAddVec::new(0u64)),
        4,
    );
    node.initialize();

    // Two back-to-back submissions must not leak state between epochs.
    for _ in 0..2 {
        let inputs: Vec<u64> = (0..1000).collect();
        let result = node.submit(promise::ready(promise::pack(inputs))).wait();
        assert_eq!(result.len(), 768);
        // Key k collects k and k + 768 for k < 232, k alone above.
        assert_eq!(result[&0], 768);
        assert_eq!(result[&231], 231 + 231 + 768);
        assert_eq!(result[&232], 232);
        assert_eq!(result.values().sum::<u64>(), (0..1000).sum::<u64>());
    }

    node.dispose();
}

fn count_mapper() -> parloom::node::NodePtr<u64, BTreeMap<Key, u64>> {
    parloom::AlgorithmAdapter::create(FnAlgorithm::new("count_by_key", |x: u64| {
        BTreeMap::from([((x % 768) as Key, 1u64)])
    }))
}

#[test]
fn vertical_folds_intermediate_mappings() {
    let node = MapReduceVertical::create(
        count_mapper(),
        parloom::AlgorithmAdapter::create(MergeCounts::new()),
        4,
    );
    node.initialize();

    // 5 inputs exercise the odd-generation pairing.
    let result = node
        .submit(promise::ready(promise::pack(vec![1u64, 1, 769, 2, 3])))
        .wait();
    assert_keyed_result(&result, &[(1, 3), (2, 1), (3, 1)]);

    node.dispose();
}

#[test]
fn vertical_degenerate_input_counts() {
    let node = MapReduceVertical::create(
        count_mapper(),
        parloom::AlgorithmAdapter::create(MergeCounts::new()),
        2,
    );
    node.initialize();

    let single = node.submit(promise::ready(promise::pack(vec![7u64]))).wait();
    assert_keyed_result(&single, &[(7, 1)]);

    let empty = node.submit(promise::ready(Vec::new())).wait();
    assert!(empty.is_empty());

    node.dispose();
}

#[test]
fn vertical_matches_horizontal_on_counting() {
    let inputs: Vec<u64> = (0..500).map(|i| i % 10).collect();

    let vertical = MapReduceVertical::create(
        count_mapper(),
        parloom::AlgorithmAdapter::create(MergeCounts::new()),
        4,
    );
    vertical.initialize();
    let via_vertical = vertical
        .submit(promise::ready(promise::pack(inputs.clone())))
        .wait();
    vertical.dispose();

    let horizontal = MapReduceHorizontal::create(
        parloom::AlgorithmAdapter::create(FnAlgorithm::new("ones_by_key", |x: u64| {
            BTreeMap::from([((x % 768) as Key, vec![1u64])])
        })),
        parloom::AlgorithmAdapter::create(ReduceAddVec::new(0u64)),
        4,
    );
    horizontal.initialize();
    let via_horizontal = horizontal
        .submit(promise::ready(promise::pack(inputs)))
        .wait();
    horizontal.dispose();

    assert_eq!(via_vertical, via_horizontal);
}

#[test]
fn mapreduce_thread_count_and_name() {
    let node = MapReduceHorizontal::create(
        parloom::AlgorithmAdapter::create(ModuloKey::new()),
        parloom::AlgorithmAdapter::create(ReduceAddVec::new(0u64)),
        3,
    );
    assert_eq!(node.thread_count(), 3);
    assert_eq!(node.name(), "mapreduce_h(modulo_key,reduce_add_vec,3,1)");
}
