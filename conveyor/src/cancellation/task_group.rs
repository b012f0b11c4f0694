//! Structured group of named, cancellable tasks.

use super::CancellationToken;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

type TaskResult = Result<(), String>;

/// Owns one task per stage loop plus the shared cancellation token.
///
/// The first task to fail cancels the rest; [`wait`](Self::wait) joins
/// every task and reports that first failure.
#[derive(Default)]
pub struct StageTaskGroup {
    token: Arc<CancellationToken>,
    handles: Mutex<Vec<(String, JoinHandle<TaskResult>)>>,
    first_error: Mutex<Option<String>>,
}

impl StageTaskGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The group's shared token.
    #[must_use]
    pub fn token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.token)
    }

    /// Spawns a named task wired to the group's token.
    pub fn spawn<F, Fut>(&self, name: impl Into<String>, task: F)
    where
        F: FnOnce(Arc<CancellationToken>) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let name = name.into();
        let handle = tokio::spawn(task(Arc::clone(&self.token)));
        self.handles.lock().push((name, handle));
    }

    /// Cancels every task in the group.
    pub fn cancel_all(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// Number of tasks spawned and not yet waited on.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Joins every task. Returns the first failure, if any; a failure
    /// also cancels the remaining tasks.
    ///
    /// # Errors
    ///
    /// Returns the first task error or panic message.
    pub async fn wait(&self) -> TaskResult {
        let handles = std::mem::take(&mut *self.handles.lock());
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => info!(task = %name, "task finished"),
                Ok(Err(err)) => {
                    warn!(task = %name, error = %err, "task failed");
                    self.record_error(format!("task '{name}' failed: {err}"));
                }
                Err(join_err) => {
                    warn!(task = %name, error = %join_err, "task panicked");
                    self.record_error(format!("task '{name}' panicked: {join_err}"));
                }
            }
        }
        match self.first_error.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record_error(&self, err: String) {
        {
            let mut first = self.first_error.lock();
            if first.is_none() {
                *first = Some(err.clone());
            }
        }
        self.token.cancel(err);
    }
}
