use std::{collections::HashMap, io, sync::Arc};

use comms::{
    FrameReceiver, FrameSender,
    msg::{Command, GRADIENT_KEY, Msg, PARAMETER_KEY, Payload},
};
use log::{debug, info, warn};
use machine_learning::{LayerParameter, param};
use parking_lot::Mutex;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    task::JoinSet,
};

use crate::{
    Result, ServerErr,
    storage::{DeltaSum, check_gradients},
};

/// The keys and their values, plus the gradient batches pushed since the last fold.
///
/// Every batch waiting under `GRADIENT_KEY` fits the value of `PARAMETER_KEY`.
#[derive(Debug, Default)]
struct Table {
    values: HashMap<String, Vec<LayerParameter>>,
    pending: HashMap<String, Vec<Vec<LayerParameter>>>,
}

impl Table {
    /// Stores `params` under `key`.
    ///
    /// # Returns
    /// A `Conflict` if `key` is `PARAMETER_KEY` and some pending batch does not fit `params`.
    fn set(&mut self, key: String, params: Vec<LayerParameter>) -> Result<()> {
        if key == PARAMETER_KEY {
            let pending = self.pending.get(GRADIENT_KEY).into_iter().flatten();

            for grads in pending {
                if let Err(source) = check_gradients(&params, grads) {
                    return Err(ServerErr::Conflict { key, source });
                }
            }
        }

        self.values.insert(key, params);
        Ok(())
    }

    /// Queues `batch` under `key`, gradients are checked against `PARAMETER_KEY`.
    ///
    /// # Returns
    /// A `MissingKey` if gradients arrive before the parameters, or the first
    /// array that does not fit them. Nothing is queued on error.
    fn push(&mut self, key: String, mut batch: Vec<Vec<LayerParameter>>) -> Result<()> {
        if key == GRADIENT_KEY {
            let Some(params) = self.values.get(PARAMETER_KEY) else {
                return Err(ServerErr::MissingKey(PARAMETER_KEY.to_string()));
            };

            for grads in &batch {
                check_gradients(params, grads)?;
            }
        }

        self.pending.entry(key).or_default().append(&mut batch);
        Ok(())
    }

    /// Folds the gradient batches pushed so far into the stored parameters.
    ///
    /// The batches are only dropped once their update is applied.
    fn fold(&mut self, stepsize: f32) -> Result<()> {
        let Some(params) = self.values.get_mut(PARAMETER_KEY) else {
            return Ok(());
        };
        let Some(batches) = self.pending.get_mut(GRADIENT_KEY) else {
            return Ok(());
        };
        if batches.is_empty() {
            return Ok(());
        }

        let mut delta = DeltaSum::new(params.as_slice());
        for grads in batches.iter() {
            delta.add(grads)?;
        }

        debug!(arrays = delta.count(); "folding pushed gradients");
        delta.apply(params, stepsize)?;
        batches.clear();

        Ok(())
    }

    fn pull(&mut self, key: &str, stepsize: f32) -> Result<Option<Msg>> {
        if key == PARAMETER_KEY {
            self.fold(stepsize)?;
        }

        Ok(self
            .values
            .get(key)
            .map(|params| Msg::Data(Payload::Params(param::to_wire(params)))))
    }
}

/// The aggregator side of the key-value strategy.
///
/// Each connection is served by its own task, all of them share one table.
/// Workers push gradient batches under `GRADIENT_KEY` and pull `PARAMETER_KEY`,
/// which folds every pending batch before answering.
pub struct KvAggregator {
    table: Arc<Mutex<Table>>,
    stepsize: f32,
    tasks: JoinSet<Result<()>>,
    next_conn: usize,
}

impl KvAggregator {
    /// Creates a new empty `KvAggregator`.
    ///
    /// # Arguments
    /// * `stepsize` - The learning rate.
    pub fn new(stepsize: f32) -> Self {
        Self {
            table: Arc::default(),
            stepsize,
            tasks: JoinSet::new(),
            next_conn: 0,
        }
    }

    /// Stores `params` under `key`, replacing any previous value.
    ///
    /// # Returns
    /// A `Conflict` if `params` replaces the parameters with a shape the pending
    /// gradients do not fit.
    pub fn insert(&self, key: &str, params: Vec<LayerParameter>) -> Result<()> {
        self.table.lock().set(key.to_string(), params)
    }

    /// The value under `key` with every pending batch folded in.
    pub fn get(&self, key: &str) -> Result<Option<Vec<LayerParameter>>> {
        let mut table = self.table.lock();
        if key == PARAMETER_KEY {
            table.fold(self.stepsize)?;
        }

        Ok(table.values.get(key).cloned())
    }

    /// Binds a new connection and spawns the task serving it.
    ///
    /// # Arguments
    /// * `rx` - The receiving end of the communication.
    /// * `tx` - The sending end of the communication.
    pub fn spawn<R, W>(&mut self, rx: FrameReceiver<R>, tx: FrameSender<W>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let table = Arc::clone(&self.table);
        let stepsize = self.stepsize;
        let conn = self.next_conn;
        self.next_conn += 1;

        self.tasks.spawn(serve(conn, table, stepsize, rx, tx));
    }

    /// Waits until every connection disconnected.
    ///
    /// # Returns
    /// The first error any connection task ended with.
    pub async fn run(&mut self) -> Result<()> {
        while let Some(res) = self.tasks.join_next().await {
            res.map_err(io::Error::other)??;
        }

        Ok(())
    }
}

async fn serve<R, W>(
    conn: usize,
    table: Arc<Mutex<Table>>,
    stepsize: f32,
    mut rx: FrameReceiver<R>,
    mut tx: FrameSender<W>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(conn = conn; "connection opened");

    loop {
        let msg: Msg = rx.recv().await?;

        let reply = match msg {
            Msg::Control(Command::Put { key }) => {
                let msg: Msg = rx.recv().await?;
                let Msg::Data(Payload::Params(params)) = msg else {
                    return Err(unexpected("data/params", &msg));
                };

                let res = param::from_wire(params)
                    .map_err(ServerErr::from)
                    .and_then(|params| table.lock().set(key, params));

                match res {
                    Ok(()) => Msg::Control(Command::Ack),
                    Err(e) => {
                        warn!(conn = conn; "put rejected: {e}");
                        Msg::Err(e.to_string())
                    }
                }
            }
            Msg::Control(Command::Push { key }) => {
                let msg: Msg = rx.recv().await?;
                let Msg::Data(Payload::Gradients(batch)) = msg else {
                    return Err(unexpected("data/gradients", &msg));
                };

                let arrays: machine_learning::Result<Vec<_>> =
                    batch.into_iter().map(param::from_wire).collect();

                let res = arrays.map_err(ServerErr::from).and_then(|arrays| {
                    debug!(conn = conn, arrays = arrays.len(); "push");
                    table.lock().push(key, arrays)
                });

                match res {
                    Ok(()) => Msg::Control(Command::Ack),
                    Err(e) => {
                        warn!(conn = conn; "push rejected: {e}");
                        Msg::Err(e.to_string())
                    }
                }
            }
            Msg::Control(Command::Pull { key }) => {
                let res = table.lock().pull(&key, stepsize);

                match res {
                    Ok(Some(reply)) => reply,
                    Ok(None) => Msg::Control(Command::Missing { key }),
                    Err(e) => {
                        warn!(conn = conn; "pull failed: {e}");
                        Msg::Err(e.to_string())
                    }
                }
            }
            Msg::Control(Command::Disconnect) => {
                info!(conn = conn; "connection closed");
                return Ok(());
            }
            other => return Err(unexpected("control", &other)),
        };

        tx.send(&reply).await?;
    }
}

fn unexpected(expected: &'static str, msg: &Msg) -> ServerErr {
    ServerErr::UnexpectedMessage {
        expected,
        got: msg.kind(),
    }
}
