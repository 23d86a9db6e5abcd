use std::io;

use comms::{
    Group, Member,
    msg::{Command, Msg, Payload},
    wire::{StatsPair, StatsRecord, Tensor2D, WireParameter},
};
use tokio::io as tokio_io;

const BUF_SIZE: usize = 4096;

fn stats(total: usize, correct: usize) -> Msg {
    Msg::Data(Payload::Stats(StatsPair {
        training: StatsRecord { total, correct },
        validation: StatsRecord::default(),
    }))
}

#[tokio::test]
async fn send_recv() {
    let msg = Msg::Control(Command::Continue { iteration: 1 });

    let (one, two) = tokio_io::duplex(BUF_SIZE);
    let (rx, tx) = tokio_io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    tx.send(&msg).await.unwrap();

    let (rx, tx) = tokio_io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let received: Msg = rx.recv().await.unwrap();
    assert_eq!(received, msg);
}

#[tokio::test]
async fn frames_larger_than_the_duplex_buffer_arrive_whole() {
    let weight = Tensor2D::new(64, 64, (0..64 * 64).map(|i| i as f32).collect()).unwrap();
    let bias = Tensor2D::new(1, 64, vec![1.5; 64]).unwrap();
    let msg = Msg::Data(Payload::Params(vec![WireParameter { weight, bias }]));

    let (one, two) = tokio_io::duplex(64);
    let (rx, tx) = tokio_io::split(one);
    let (_, mut sending) = comms::channel(rx, tx);
    let (rx, tx) = tokio_io::split(two);
    let (mut receiving, _) = comms::channel(rx, tx);

    let expected = msg.clone();
    let sender = tokio::spawn(async move { sending.send(&msg).await });

    let received: Msg = receiving.recv().await.unwrap();
    sender.await.unwrap().unwrap();
    assert_eq!(received, expected);
}

#[tokio::test]
async fn closed_stream_is_an_error() {
    let (one, two) = tokio_io::duplex(BUF_SIZE);
    drop(one);

    let (rx, tx) = tokio_io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let err = rx.recv::<Msg>().await.unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn group_reduces_every_member_then_broadcasts() -> io::Result<()> {
    const MEMBERS: usize = 3;

    let mut group = Group::new();
    let mut members = Vec::new();

    for _ in 0..MEMBERS {
        let (root_side, member_side) = tokio_io::duplex(BUF_SIZE);
        let (rx, tx) = tokio_io::split(root_side);
        let (rx, tx) = comms::channel(rx, tx);
        group.join(rx, tx);

        let (rx, tx) = tokio_io::split(member_side);
        let (rx, tx) = comms::channel(rx, tx);
        members.push(Member::new(rx, tx));
    }

    assert_eq!(group.len(), MEMBERS);

    let tasks: Vec<_> = members
        .into_iter()
        .enumerate()
        .map(|(i, mut member)| {
            tokio::spawn(async move {
                member.reduce(&stats(i + 1, i)).await?;
                member.broadcast().await
            })
        })
        .collect();

    let total = group
        .reduce(0, |acc, msg| match msg {
            Msg::Data(Payload::Stats(s)) => Ok::<_, io::Error>(acc + s.training.total),
            other => Err(io::Error::other(format!("unexpected {}", other.kind()))),
        })
        .await?;

    assert_eq!(total, 1 + 2 + 3);

    let reply = Msg::Control(Command::Stop);
    group.broadcast(&reply).await?;

    for task in tasks {
        assert_eq!(task.await.unwrap()?, reply);
    }

    Ok(())
}

#[tokio::test]
async fn group_reduce_surfaces_fold_errors() {
    let (root_side, member_side) = tokio_io::duplex(BUF_SIZE);
    let (rx, tx) = tokio_io::split(root_side);
    let (rx, tx) = comms::channel(rx, tx);
    let mut group = Group::new();
    group.join(rx, tx);

    let (rx, tx) = tokio_io::split(member_side);
    let (rx, tx) = comms::channel(rx, tx);
    let mut member = Member::new(rx, tx);
    member.reduce(&Msg::Err("boom".into())).await.unwrap();

    let res = group
        .reduce((), |_, msg| match msg {
            Msg::Err(detail) => Err(io::Error::other(detail)),
            _ => Ok(()),
        })
        .await;

    assert!(res.is_err());
}
