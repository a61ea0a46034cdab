use parloom::algorithm::FnAlgorithm;
use parloom::algorithms::{Increase, Nop, QuickSort};
use parloom::testing::{assert_collections_equal, assert_same_elements};
use parloom::{AlgorithmAdapter, Pipeline, TaskPool, promise};

#[test]
fn pool_preserves_submission_order_of_results() {
    let pool = TaskPool::create(
        AlgorithmAdapter::create(FnAlgorithm::new("square", |x: u64| x * x)),
        4,
    );
    pool.initialize();

    // Handles resolve per item, so reading them in submission order gives
    // results in submission order no matter which worker ran what.
    let handles: Vec<_> = (0..200).map(|i| pool.submit(promise::ready(i))).collect();
    let outputs = promise::unpack(handles);
    let expected: Vec<u64> = (0..200).map(|i| i * i).collect();
    assert_collections_equal(&outputs, &expected);

    pool.dispose();
}

#[test]
fn pipeline_applies_second_stage_to_first_stage_output() {
    let pipe = Pipeline::create(
        AlgorithmAdapter::create(Increase::new(1i64)),
        AlgorithmAdapter::create(QuickSort::new()),
    );
    pipe.initialize();

    let sorted = pipe.submit(promise::ready(vec![5, 2, 9])).wait();
    assert_eq!(sorted, vec![3, 6, 10]);

    pipe.dispose();
}

#[test]
fn pipeline_of_pools_processes_every_item() {
    let pipe = Pipeline::create(
        TaskPool::create(AlgorithmAdapter::create(Increase::new(10u64)), 3),
        TaskPool::create(
            AlgorithmAdapter::create(FnAlgorithm::new("sum", |v: Vec<u64>| {
                v.into_iter().sum::<u64>()
            })),
            2,
        ),
    );
    pipe.initialize();

    let handles: Vec<_> = (0..50)
        .map(|i| pipe.submit(promise::ready(vec![i, i + 1])))
        .collect();
    let outputs = promise::unpack(handles);
    let expected: Vec<u64> = (0..50).map(|i| 2 * i + 21).collect();
    assert_same_elements(&outputs, &expected);

    pipe.dispose();
}

#[test]
fn pool_of_pipelines_replicates_the_whole_stage() {
    let pipeline = Pipeline::create(
        AlgorithmAdapter::create(Increase::new(1i32)),
        AlgorithmAdapter::create(Nop::new()),
    );
    let pool = TaskPool::create(pipeline, 2);
    pool.initialize();

    let handles: Vec<_> = (0..40)
        .map(|i| pool.submit(promise::ready(vec![i])))
        .collect();
    let outputs = promise::unpack(handles);
    let expected: Vec<Vec<i32>> = (0..40).map(|i| vec![i + 1]).collect();
    assert_collections_equal(&outputs, &expected);

    pool.dispose();
}

#[test]
fn thread_counts_compose_additively() {
    let adapter = AlgorithmAdapter::create(Nop::<u8>::new());
    assert_eq!(adapter.thread_count(), 0);

    let pool = TaskPool::create(AlgorithmAdapter::create(Nop::<u8>::new()), 4);
    assert_eq!(pool.thread_count(), 4);

    let pipe = Pipeline::create(
        TaskPool::create(AlgorithmAdapter::create(Nop::<u8>::new()), 3),
        TaskPool::create(AlgorithmAdapter::create(Nop::<u8>::new()), 2),
    );
    assert_eq!(pipe.thread_count(), 3 + 2 + 2);

    // Pooling a pipeline replicates it once per worker.
    let nested = TaskPool::create(
        Pipeline::create(
            AlgorithmAdapter::create(Nop::<u8>::new()),
            AlgorithmAdapter::create(Nop::<u8>::new()),
        ),
        2,
    );
    assert_eq!(nested.thread_count(), 2 + 2 * 2);
}

#[test]
fn names_compose_recursively() {
    let node = Pipeline::create(
        AlgorithmAdapter::create(Increase::new(1u64)),
        TaskPool::create(AlgorithmAdapter::create(QuickSort::<u64>::new()), 4),
    );
    assert_eq!(node.name(), "pipeline(increase,taskpool(4,quick_sort))");
}

#[test]
fn default_parallelism_sizes_a_working_pool() {
    let workers = parloom::default_parallelism();
    assert!(workers >= 1);

    let pool = TaskPool::create(
        AlgorithmAdapter::create(FnAlgorithm::new("double", |x: u64| x * 2)),
        workers,
    );
    assert_eq!(pool.thread_count(), workers);
    pool.initialize();
    assert_eq!(pool.submit(promise::ready(21)).wait(), 42);
    pool.dispose();
}

#[test]
fn initialize_and_dispose_are_idempotent() {
    let pool = TaskPool::create(AlgorithmAdapter::create(Nop::<u32>::new()), 2);
    pool.initialize();
    pool.initialize();
    assert_eq!(pool.submit(promise::ready(7)).wait(), 7);
    pool.dispose();
    pool.dispose();
}

#[test]
#[should_panic(expected = "not initialized")]
fn pipeline_submit_before_initialize_panics() {
    let pipe = Pipeline::create(
        AlgorithmAdapter::create(Nop::<u8>::new()),
        AlgorithmAdapter::create(Nop::<u8>::new()),
    );
    let _ = pipe.submit(promise::ready(1));
}

#[test]
#[should_panic(expected = "cannot replicate")]
fn replicating_an_initialized_pool_panics() {
    let pool = TaskPool::create(AlgorithmAdapter::create(Nop::<u8>::new()), 2);
    pool.initialize();
    let _ = pool.replicate();
}
