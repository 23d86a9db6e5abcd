use std::{io, num::NonZeroUsize};

use comms::{
    Group, Member,
    msg::{Command, Msg, Payload},
    wire::{StatsPair, StatsRecord, WireParameter},
};
use machine_learning::{LayerParameter, param};
use ndarray::array;
use parameter_server::{CollectiveAggregator, ServerErr};
use tokio::io::{self as tokio_io, DuplexStream, ReadHalf, WriteHalf};

const BUF_SIZE: usize = 4096;

type Root = Group<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;
type Leaf = Member<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

fn group(members: usize) -> (Root, Vec<Leaf>) {
    let mut group = Group::new();
    let mut leaves = Vec::new();

    for _ in 0..members {
        let (root_side, member_side) = tokio_io::duplex(BUF_SIZE);
        let (rx, tx) = tokio_io::split(root_side);
        let (rx, tx) = comms::channel(rx, tx);
        group.join(rx, tx);

        let (rx, tx) = tokio_io::split(member_side);
        let (rx, tx) = comms::channel(rx, tx);
        leaves.push(Member::new(rx, tx));
    }

    (group, leaves)
}

fn iterations(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn params() -> Vec<LayerParameter> {
    vec![
        LayerParameter::new(array![[1.]], array![0.]),
        LayerParameter::empty(),
    ]
}

fn batch(values: &[f32]) -> Msg {
    let arrays: Vec<Vec<WireParameter>> = values
        .iter()
        .map(|&v| {
            param::to_wire(&[
                LayerParameter::new(array![[v]], array![v]),
                LayerParameter::empty(),
            ])
        })
        .collect();

    Msg::Data(Payload::Gradients(arrays))
}

fn stats(total: usize, correct: usize) -> Msg {
    Msg::Data(Payload::Stats(StatsPair {
        training: StatsRecord { total, correct },
        validation: StatsRecord::default(),
    }))
}

async fn round(leaf: &mut Leaf, msg: Msg) -> io::Result<Msg> {
    leaf.reduce(&msg).await?;
    leaf.broadcast().await
}

async fn end_iteration(leaf: &mut Leaf) -> io::Result<Msg> {
    let sentinel = round(leaf, batch(&[])).await?;
    assert_eq!(sentinel, Msg::Data(Payload::Params(Vec::new())));

    round(leaf, stats(2, 1)).await
}

#[tokio::test]
async fn averages_every_member_then_stops() {
    let (mut root, leaves) = group(2);
    let aggregator = CollectiveAggregator::new(params(), 0.5, iterations(1));
    let server = tokio::spawn(async move { aggregator.run(&mut root).await });

    let tasks: Vec<_> = leaves
        .into_iter()
        .zip([vec![2.], vec![4., 0.]])
        .map(|(mut leaf, grads)| {
            tokio::spawn(async move {
                let updated = round(&mut leaf, batch(&grads)).await?;
                let control = end_iteration(&mut leaf).await?;
                Ok::<_, io::Error>((updated, control))
            })
        })
        .collect();

    // three arrays summing to 6, the update is 0.5 / 3 * 6
    let expected = param::to_wire(&[
        LayerParameter::new(array![[0.]], array![-1.]),
        LayerParameter::empty(),
    ]);

    for task in tasks {
        let (updated, control) = task.await.unwrap().unwrap();
        assert_eq!(updated, Msg::Data(Payload::Params(expected.clone())));
        assert_eq!(control, Msg::Control(Command::Stop));
    }

    let final_params = server.await.unwrap().unwrap();
    assert_eq!(param::to_wire(&final_params), expected);
}

#[tokio::test]
async fn sentinel_rounds_count_iterations() {
    let (mut root, leaves) = group(3);
    let aggregator = CollectiveAggregator::new(params(), 0.1, iterations(2));
    let server = tokio::spawn(async move { aggregator.run(&mut root).await });

    let tasks: Vec<_> = leaves
        .into_iter()
        .map(|mut leaf| {
            tokio::spawn(async move {
                let first = end_iteration(&mut leaf).await?;
                let second = end_iteration(&mut leaf).await?;
                Ok::<_, io::Error>((first, second))
            })
        })
        .collect();

    for task in tasks {
        let (first, second) = task.await.unwrap().unwrap();
        assert_eq!(first, Msg::Control(Command::Continue { iteration: 1 }));
        assert_eq!(second, Msg::Control(Command::Stop));
    }

    assert_eq!(server.await.unwrap().unwrap(), params());
}

#[tokio::test]
async fn unexpected_contribution_is_an_error() {
    let (mut root, mut leaves) = group(1);
    leaves[0].reduce(&stats(1, 1)).await.unwrap();

    let res = CollectiveAggregator::new(params(), 0.1, iterations(1))
        .run(&mut root)
        .await;

    assert!(matches!(
        res,
        Err(ServerErr::UnexpectedMessage {
            expected: "data/gradients",
            got: "data/stats"
        })
    ));
}

#[tokio::test]
async fn layer_count_skew_is_an_error() {
    let (mut root, mut leaves) = group(1);
    let skewed = Msg::Data(Payload::Gradients(vec![param::to_wire(&[
        LayerParameter::empty(),
    ])]));
    leaves[0].reduce(&skewed).await.unwrap();

    let res = CollectiveAggregator::new(params(), 0.1, iterations(1))
        .run(&mut root)
        .await;

    assert!(matches!(res, Err(ServerErr::Ml(_))));
}
