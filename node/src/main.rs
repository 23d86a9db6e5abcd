mod config;

use std::{env, fs::File, io::BufReader, path::Path};

use anyhow::{Context, anyhow, bail};
use comms::{Group, Member, msg::PARAMETER_KEY};
use log::info;
use machine_learning::TrainingConfig;
use parameter_server::{CollectiveAggregator, KvAggregator, LocalAggregator};
use tokio::{
    net::{TcpListener, TcpStream},
    task::JoinSet,
};
use worker::{
    CollectiveStore, DataSource, Dataset, KvStore, LocalStore, ShardSpec, TextSource, Worker,
};

use crate::config::{NodeConfig, Strategy};

const USAGE: &str = "usage: node <job.json> aggregator\n       node <job.json> worker <id> <dataset.txt>\n       node <job.json> local <dataset.txt>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [job, role, rest @ ..] = args.as_slice() else {
        bail!(USAGE);
    };

    let config = NodeConfig::load(Path::new(job))?;

    match (role.as_str(), rest, config.strategy) {
        ("aggregator", [], Strategy::Collective) => run_collective_aggregator(config).await,
        ("aggregator", [], Strategy::Kv) => run_kv_aggregator(config).await,
        ("worker", [id, dataset], Strategy::Collective | Strategy::Kv) => {
            let id = id.parse().with_context(|| format!("invalid worker id {id:?}"))?;
            run_worker(config, id, Path::new(dataset)).await
        }
        ("local", [dataset], Strategy::Local) => run_local(config, Path::new(dataset)).await,
        (role, _, strategy) => Err(anyhow!(
            "role {role:?} does not fit the {strategy:?} strategy\n{USAGE}"
        )),
    }
}

/// Reads the whole dataset file and keeps this worker's shard of it.
fn load_shard(path: &Path, shard: ShardSpec) -> anyhow::Result<Dataset> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let samples = TextSource::new(BufReader::new(file)).samples()?;

    Ok(Dataset::new(shard.slice(&samples).to_vec()))
}

fn shard(config: &NodeConfig, worker_id: usize) -> anyhow::Result<ShardSpec> {
    ShardSpec::new(worker_id, config.workers).ok_or_else(|| {
        anyhow!(
            "worker id {worker_id} is out of range for {} workers",
            config.workers
        )
    })
}

async fn run_collective_aggregator(config: NodeConfig) -> anyhow::Result<()> {
    let TrainingConfig {
        stepsize,
        max_iterations,
        ..
    } = config.training;
    let params = config.training.build_network()?.parameters();

    let listener = TcpListener::bind(&config.address).await?;
    info!(address = config.address.as_str(); "waiting for workers");

    let mut group = Group::new();
    for _ in 0..config.workers.get() {
        let (stream, peer) = listener.accept().await?;
        info!(peer = peer.to_string().as_str(); "worker joined");

        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        group.join(rx, tx);
    }

    let aggregator = CollectiveAggregator::new(params, stepsize, max_iterations);
    aggregator.run(&mut group).await?;

    info!("training finished");
    Ok(())
}

async fn run_kv_aggregator(config: NodeConfig) -> anyhow::Result<()> {
    let params = config.training.build_network()?.parameters();

    let mut aggregator = KvAggregator::new(config.training.stepsize);
    aggregator.insert(PARAMETER_KEY, params)?;

    let listener = TcpListener::bind(&config.address).await?;
    info!(address = config.address.as_str(); "waiting for workers");

    for _ in 0..config.workers.get() {
        let (stream, _) = listener.accept().await?;
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);
        aggregator.spawn(rx, tx);
    }

    aggregator.run().await?;

    info!("training finished");
    Ok(())
}

async fn run_worker(config: NodeConfig, worker_id: usize, dataset: &Path) -> anyhow::Result<()> {
    let dataset = load_shard(dataset, shard(&config, worker_id)?)?;
    let network = config.training.build_network()?;

    let stream = TcpStream::connect(&config.address)
        .await
        .with_context(|| format!("failed to connect to {}", config.address))?;
    let (rx, tx) = stream.into_split();
    let (rx, tx) = comms::channel(rx, tx);

    let report = match config.strategy {
        Strategy::Collective => {
            let store = CollectiveStore::new(Member::new(rx, tx));
            Worker::new(worker_id, network, store).run(&dataset).await?
        }
        Strategy::Kv => {
            let store = KvStore::new(rx, tx, config.training.max_iterations);
            Worker::new(worker_id, network, store).run(&dataset).await?
        }
        Strategy::Local => bail!("the local strategy has no remote workers"),
    };

    if let Some(last) = report.history.last() {
        info!(
            worker_id = worker_id,
            training_error = last.training.error().unwrap_or(f32::NAN),
            validation_error = last.validation.error().unwrap_or(f32::NAN);
            "final accuracy"
        );
    }

    Ok(())
}

async fn run_local(config: NodeConfig, dataset: &Path) -> anyhow::Result<()> {
    let network = config.training.build_network()?;
    let aggregator = LocalAggregator::new(network.parameters(), config.training.stepsize);

    let mut tasks = JoinSet::new();
    for worker_id in 0..config.workers.get() {
        let dataset = load_shard(dataset, shard(&config, worker_id)?)?;
        let store = LocalStore::new(aggregator.clone(), config.training.max_iterations);
        let worker = Worker::new(worker_id, network.clone(), store);

        tasks.spawn(async move { worker.run(&dataset).await });
    }

    while let Some(res) = tasks.join_next().await {
        res??;
    }

    info!(layers = aggregator.parameters().len(); "training finished");
    Ok(())
}
