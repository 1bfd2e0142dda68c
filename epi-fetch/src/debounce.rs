use std::{future::Future, time::Duration};

/// A cancellable delayed task.
///
/// Scheduling again aborts whatever was pending, so only the last call within the delay runs.
#[derive(Debug, Default)]
pub(crate) struct DebounceHandle(Option<tokio::task::JoinHandle<()>>);

impl DebounceHandle {
    pub fn schedule<Fut>(&mut self, delay: Duration, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                self.0 = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    task.await;
                }));
            }
            Err(e) => {
                tracing::warn!("no tokio runtime to schedule debounced task on, skipping: {e}");
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.0.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

/// Cancel the pending task if the handle is dropped for any reason, e.g. the owning store going away.
impl Drop for DebounceHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[tokio::test]
    async fn test_only_last_schedule_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let last_value = Arc::new(AtomicUsize::new(0));
        let mut handle = DebounceHandle::default();

        for value in 1..=3 {
            let runs = runs.clone();
            let last_value = last_value.clone();
            handle.schedule(Duration::from_millis(30), async move {
                runs.fetch_add(1, Ordering::Relaxed);
                last_value.store(value, Ordering::Relaxed);
            });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(handle.is_pending());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(runs.load(Ordering::Relaxed), 1);
        assert_eq!(last_value.load(Ordering::Relaxed), 3);
        assert!(!handle.is_pending());
    }

    #[tokio::test]
    async fn test_cancel_and_drop() {
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handle = DebounceHandle::default();
        handle.schedule(Duration::from_millis(20), {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        handle.cancel();

        let mut dropped = DebounceHandle::default();
        dropped.schedule(Duration::from_millis(20), {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::Relaxed);
            }
        });
        drop(dropped);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(runs.load(Ordering::Relaxed), 0);
    }
}
