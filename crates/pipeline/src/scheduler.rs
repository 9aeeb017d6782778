//! Bounded admission to shared inference resources.
//!
//! Two process-wide pools gate the expensive model backends: a tight
//! GPU-class pool and a roomier CPU-class pool. Callers wait
//! asynchronously for a slot, run exactly one collaborator call under
//! it, and the slot is released on every exit path.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::PipelineError;

/// One admission-controlled pool.
#[derive(Clone)]
pub struct ResourcePool {
    name: &'static str,
    semaphore: Arc<Semaphore>,
}

impl ResourcePool {
    pub fn new(name: &'static str, slots: usize) -> Self {
        Self {
            name,
            semaphore: Arc::new(Semaphore::new(slots.max(1))),
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run one resource-bound operation under a slot.
    ///
    /// The wait for admission is cancellable; once admitted, the
    /// future runs to completion (an in-flight inference call is never
    /// interrupted) and the caller observes cancellation again at its
    /// next checkpoint.
    pub async fn run<F, T>(&self, cancel: &CancellationToken, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = T>,
    {
        let permit = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            permit = self.semaphore.clone().acquire_owned() => {
                permit.map_err(|_| PipelineError::PoolClosed)?
            }
        };
        tracing::trace!(pool = self.name, "slot acquired");

        let out = fut.await;
        drop(permit);
        Ok(out)
    }
}

/// The process-wide pool pair shared by every call.
#[derive(Clone)]
pub struct ResourcePools {
    /// Gate for GPU-resident model invocation.
    pub gpu: ResourcePool,
    /// Gate for CPU-bound inference work.
    pub cpu: ResourcePool,
}

impl ResourcePools {
    pub fn new(gpu_slots: usize, cpu_slots: usize) -> Self {
        Self {
            gpu: ResourcePool::new("gpu", gpu_slots),
            cpu: ResourcePool::new("cpu", cpu_slots),
        }
    }
}

impl Default for ResourcePools {
    fn default() -> Self {
        Self::new(3, 6)
    }
}
