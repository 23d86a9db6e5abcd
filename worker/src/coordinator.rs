//! Keeps a worker that ran out of data in step with the ones still training.

use machine_learning::Network;

use crate::{Result, store::ParameterStore};

/// Takes part in parameter rounds with dummy contributions until the aggregator
/// marks the end of the logical iteration with an empty parameter array.
///
/// Every round blocks on the aggregator's answer, so the loop only spins as fast
/// as the workers that still have data produce batches.
///
/// # Arguments
/// * `store` - The worker's parameter store.
/// * `network` - The worker's network, it adopts every update received meanwhile.
///
/// # Returns
/// The amount of rounds that carried parameters.
pub async fn drain<S: ParameterStore>(store: &mut S, network: &mut Network) -> Result<usize> {
    let mut rounds = 0;

    loop {
        store.push(None).await?;
        let params = store.pull().await?;

        if params.is_empty() {
            return Ok(rounds);
        }

        network.adopt(params)?;
        rounds += 1;
    }
}
