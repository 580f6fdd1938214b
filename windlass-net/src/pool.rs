// windlass-net/src/pool.rs
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use windlass_common::error::{Result, WindlassError};

/// Bounded admission control for outbound transfers.
///
/// At most `max_transfers` catalog fetches and artifact downloads run at
/// once, however many callers submit work. There is no request queue to
/// grow without bound: a submission either takes a free slot, waits for the
/// next one ([`acquire`](Self::acquire)), or is rejected outright
/// ([`try_acquire`](Self::try_acquire)). This is the pipeline's backpressure
/// policy for outbound network load.
#[derive(Debug, Clone)]
pub struct TransferPool {
    semaphore: Arc<Semaphore>,
    max_transfers: usize,
}

impl TransferPool {
    pub fn new(max_transfers: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_transfers)),
            max_transfers,
        }
    }

    pub fn max_transfers(&self) -> usize {
        self.max_transfers
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free transfer slot.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WindlassError::Generic("transfer pool closed".to_string()))
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(&self) -> Result<Option<OwnedSemaphorePermit>> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(Some(permit)),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(WindlassError::Generic(
                "transfer pool closed".to_string(),
            )),
        }
    }
}
