use std::{sync::atomic::AtomicU64, time::Duration};

macro_rules! defined_id_gen {
    ($name:ident) => {
        pub(crate) fn $name() -> u64 {
            static COUNTER: AtomicU64 = AtomicU64::new(0);
            COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        }
    };
}

defined_id_gen!(new_store_id);
defined_id_gen!(new_subscriber_id);

/// Add a std duration to a chrono datetime, saturating at the max representable datetime
/// rather than panicking for huge values such as [`Duration::MAX`].
pub(crate) fn safe_dt_dur_add(
    dt: chrono::DateTime<chrono::Utc>,
    duration: Duration,
) -> chrono::DateTime<chrono::Utc> {
    chrono::TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| dt.checked_add_signed(delta))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}

pub(crate) fn elapsed_ms(started_at: chrono::DateTime<chrono::Utc>) -> i64 {
    (chrono::Utc::now() - started_at).num_milliseconds()
}

/// Runs `f` when dropped, including when the owning future is dropped mid-await.
pub(crate) struct OnDrop<F>
where
    F: FnOnce(),
{
    f: Option<F>,
}

impl<F> OnDrop<F>
where
    F: FnOnce(),
{
    pub fn new(f: F) -> Self {
        Self { f: Some(f) }
    }
}

impl<F> Drop for OnDrop<F>
where
    F: FnOnce(),
{
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}
