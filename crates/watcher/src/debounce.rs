use std::time::Duration;
use tokio::time::Instant;

/// Pending work of the loop: when the next pass is due and why.
///
/// A burst of events keeps pushing the deadline `debounce` past the latest
/// event, but never past `max_batch` after the first one.
#[derive(Debug)]
pub(crate) struct DebounceState {
    debounce: Duration,
    max_batch: Duration,
    dirty: bool,
    pending: usize,
    last_event: Option<Instant>,
    first_event: Option<Instant>,
    retry_at: Option<Instant>,
    reason: Option<String>,
    force_immediate: bool,
}

impl DebounceState {
    pub(crate) const fn new(debounce: Duration, max_batch: Duration) -> Self {
        Self {
            debounce,
            max_batch,
            dirty: false,
            pending: 0,
            last_event: None,
            first_event: None,
            retry_at: None,
            reason: None,
            force_immediate: false,
        }
    }

    pub(crate) fn record_event(&mut self, count: usize, reason: &str) {
        let now = Instant::now();
        self.pending += count.max(1);
        self.reason = Some(reason.to_string());
        self.last_event = Some(now);
        self.first_event.get_or_insert(now);
        self.dirty = true;
    }

    pub(crate) fn force_run(&mut self, reason: String) {
        self.pending += 1;
        self.reason = Some(reason);
        self.force_immediate = true;
        self.dirty = true;
    }

    /// Schedules a pass `delay` from now unless something sooner is due.
    pub(crate) fn schedule_retry(&mut self, delay: Duration, reason: &str) {
        self.retry_at = Some(Instant::now() + delay);
        self.reason.get_or_insert_with(|| reason.to_string());
        self.dirty = true;
    }

    pub(crate) const fn pending(&self) -> usize {
        self.pending
    }

    pub(crate) const fn should_run(&self) -> bool {
        self.dirty
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        if !self.dirty {
            return None;
        }
        if self.force_immediate {
            return Some(Instant::now());
        }

        [
            self.last_event.map(|last| last + self.debounce),
            self.first_event.map(|first| first + self.max_batch),
            self.retry_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub(crate) fn take_reason(&mut self) -> Option<String> {
        self.reason.take()
    }

    pub(crate) fn reset(&mut self) {
        self.dirty = false;
        self.pending = 0;
        self.last_event = None;
        self.first_event = None;
        self.retry_at = None;
        self.reason = None;
        self.force_immediate = false;
    }

    #[cfg(test)]
    const fn force_flag(&self) -> bool {
        self.force_immediate
    }
}

#[cfg(test)]
mod tests {
    use super::DebounceState;
    use std::time::Duration;
    use tokio::time::{self, Instant};

    #[tokio::test(start_paused = true)]
    async fn debounce_generates_deadline() {
        let mut state = DebounceState::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(state.next_deadline(), None);
        state.record_event(1, "mutation");
        assert!(state.should_run());
        assert_eq!(state.next_deadline(), Some(Instant::now() + Duration::from_millis(100)));
    }

    #[tokio::test(start_paused = true)]
    async fn force_run_sets_immediate_deadline() {
        let mut state = DebounceState::new(Duration::from_secs(5), Duration::from_secs(10));
        state.force_run("manual".to_string());
        assert!(state.should_run());
        assert!(state.force_flag());
        assert_eq!(state.next_deadline(), Some(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn bursts_are_capped_by_max_batch() {
        let mut state = DebounceState::new(Duration::from_millis(500), Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..8 {
            state.record_event(1, "mutation");
            time::advance(Duration::from_millis(200)).await;
        }
        assert_eq!(state.pending(), 8);
        assert_eq!(state.next_deadline(), Some(start + Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_competes_with_debounce() {
        let mut state = DebounceState::new(Duration::from_millis(500), Duration::from_secs(3));
        state.schedule_retry(Duration::from_secs(2), "board-not-ready");
        assert_eq!(state.next_deadline(), Some(Instant::now() + Duration::from_secs(2)));

        state.record_event(1, "mutation");
        assert_eq!(state.next_deadline(), Some(Instant::now() + Duration::from_millis(500)));
        assert_eq!(state.take_reason().as_deref(), Some("mutation"));

        state.reset();
        assert!(!state.should_run());
        assert_eq!(state.next_deadline(), None);
    }
}
