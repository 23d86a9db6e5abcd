use std::{num::NonZeroUsize, time::Duration};

use comms::msg::PARAMETER_KEY;
use machine_learning::{LayerSpec, Network};
use ndarray::array;
use parameter_server::KvAggregator;
use tokio::io::{self as tokio_io, DuplexStream, ReadHalf, WriteHalf};
use worker::{Dataset, KvStore, ParameterStore, Sample, Worker, WorkerErr};

const BUF_SIZE: usize = 1 << 16;

type Store = KvStore<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

fn network() -> Network {
    let specs = [
        LayerSpec::new("fully_connected", "2").with_output(2).with_seed(3),
        LayerSpec::new("sigmoid_loss", "2"),
    ];

    Network::from_specs(&specs, NonZeroUsize::new(2).unwrap()).unwrap()
}

fn connect(aggregator: &mut KvAggregator, max_iterations: usize) -> Store {
    let (server_side, client_side) = tokio_io::duplex(BUF_SIZE);

    let (rx, tx) = tokio_io::split(server_side);
    let (rx, tx) = comms::channel(rx, tx);
    aggregator.spawn(rx, tx);

    let (rx, tx) = tokio_io::split(client_side);
    let (rx, tx) = comms::channel(rx, tx);
    KvStore::new(rx, tx, NonZeroUsize::new(max_iterations).unwrap())
}

#[tokio::test]
async fn workers_train_against_a_shared_table() {
    let mut aggregator = KvAggregator::new(0.5);
    let initial = network().parameters();
    aggregator.insert(PARAMETER_KEY, initial.clone()).unwrap();

    let tasks: Vec<_> = (0..2)
        .map(|id| {
            let store = connect(&mut aggregator, 3);
            let dataset = Dataset::new(vec![
                Sample::new(array![1., 0.], 0, false),
                Sample::new(array![0., 1.], 1, false),
                Sample::new(array![1., 1.], 1, false),
                Sample::new(array![0., 0.], 0, true),
            ]);

            tokio::spawn(async move { Worker::new(id, network(), store).run(&dataset).await })
        })
        .collect();

    for task in tasks {
        let report = task.await.unwrap().unwrap();
        assert_eq!(report.history.len(), 3);
        assert!(report.history.iter().all(|s| s.training.total() == 3));
    }

    aggregator.run().await.unwrap();

    let final_params = aggregator.get(PARAMETER_KEY).unwrap().unwrap();
    assert_ne!(final_params, initial);
}

#[tokio::test(start_paused = true)]
async fn pull_gives_up_after_three_attempts() {
    let mut aggregator = KvAggregator::new(0.5);
    let mut store = connect(&mut aggregator, 1).with_retry_delay(Duration::from_secs(1));

    let err = store.pull().await.unwrap_err();

    assert!(matches!(
        err,
        WorkerErr::MissingKey { ref key, attempts: 3 } if key == PARAMETER_KEY
    ));

    store.close().await.unwrap();
    aggregator.run().await.unwrap();
}

#[tokio::test]
async fn put_seeds_the_key() {
    let mut aggregator = KvAggregator::new(0.5);
    let mut store = connect(&mut aggregator, 1);
    let params = network().parameters();

    store.put(PARAMETER_KEY, &params).await.unwrap();
    assert_eq!(store.pull().await.unwrap(), params);

    store.close().await.unwrap();
    aggregator.run().await.unwrap();
}
