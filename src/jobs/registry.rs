use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Opaque job identifier, only ever used as a registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job id -> cancellation flag. One mutex guards the whole map, so register,
/// cancel, lookup and unregister never interleave.
///
/// Nothing is cleaned up implicitly: whoever registers a job must unregister
/// it. `JobRegistration` does that on drop.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    flags: Mutex<HashMap<JobId, bool>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, HashMap<JobId, bool>> {
        // A panicking holder cannot leave the map half-written; keep going.
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates (or resets) the entry with the flag cleared.
    pub fn register(&self, job: &JobId) {
        let previous = self.flags().insert(job.clone(), false);
        if previous.is_some() {
            warn!(job = %job, "Job was already registered, flag reset");
        } else {
            info!(job = %job, "Registered job");
        }
    }

    /// Sets the flag. Returns whether the job was registered at all.
    pub fn cancel(&self, job: &JobId) -> bool {
        match self.flags().get_mut(job) {
            Some(flag) => {
                *flag = true;
                info!(job = %job, "Cancelled job");
                true
            }
            None => false,
        }
    }

    /// Unknown jobs read as not cancelled.
    pub fn is_cancelled(&self, job: &JobId) -> bool {
        self.flags().get(job).copied().unwrap_or(false)
    }

    /// Removes the entry and returns the flag it held at removal. A cancel
    /// that lands before this call is always reported; one after it is a no-op.
    pub fn unregister(&self, job: &JobId) -> bool {
        match self.flags().remove(job) {
            Some(cancelled) => {
                info!(job = %job, cancelled, "Unregistered job");
                cancelled
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_registered(&self, job: &JobId) -> bool {
        self.flags().contains_key(job)
    }

    #[cfg(test)]
    pub fn active_jobs(&self) -> usize {
        self.flags().len()
    }
}

/// Handle given to every worker of one job. Reads go through the registry.
#[derive(Debug, Clone)]
pub struct CancelToken {
    registry: Arc<CancellationRegistry>,
    job: JobId,
}

impl CancelToken {
    pub fn new(registry: Arc<CancellationRegistry>, job: JobId) -> Self {
        Self { registry, job }
    }

    pub fn is_cancelled(&self) -> bool {
        self.registry.is_cancelled(&self.job)
    }

    pub fn job(&self) -> &JobId {
        &self.job
    }
}

/// Registers a job for as long as it lives; unregisters on every exit path,
/// unwinding included.
pub struct JobRegistration {
    token: CancelToken,
    released: bool,
}

impl JobRegistration {
    pub fn register(registry: &Arc<CancellationRegistry>, job: JobId) -> Self {
        registry.register(&job);
        Self {
            token: CancelToken::new(Arc::clone(registry), job),
            released: false,
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Unregisters now and returns whether the job ended up cancelled.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.token.registry.unregister(&self.token.job)
    }
}

impl Drop for JobRegistration {
    fn drop(&mut self) {
        if !self.released {
            self.token.registry.unregister(&self.token.job);
        }
    }
}
