use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

/// UI sink for the loading screen.
pub trait LoadingIndicator: Send + Sync {
    fn progress(&self, percent: u8, completed: usize, total: usize);
    fn dismiss(&self);
    fn failure(&self, message: &str);
}

/// Headless indicator.
#[derive(Debug, Default)]
pub struct NullIndicator;

impl LoadingIndicator for NullIndicator {
    fn progress(&self, _percent: u8, _completed: usize, _total: usize) {}
    fn dismiss(&self) {}
    fn failure(&self, _message: &str) {}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProgressState {
    pub completed: usize,
    pub total: usize,
}

impl ProgressState {
    pub fn percentage(self) -> u8 {
        if self.completed >= self.total {
            return 100;
        }
        let ratio = self.completed as f64 / self.total.max(1) as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// Counts probe settlements for one load cycle.
pub struct ProgressAggregator {
    indicator: Arc<dyn LoadingIndicator>,
    completed: AtomicUsize,
    total: AtomicUsize,
    reported: Mutex<u8>,
    finished: AtomicBool,
}

impl ProgressAggregator {
    pub fn new(indicator: Arc<dyn LoadingIndicator>) -> Self {
        Self {
            indicator,
            completed: AtomicUsize::new(0),
            total: AtomicUsize::new(1),
            reported: Mutex::new(0),
            finished: AtomicBool::new(false),
        }
    }

    /// Re-arms the aggregator for a new cycle without reporting anything.
    pub fn reset(&self) {
        let mut reported = self.reported.lock().expect("progress poisoned");
        *reported = 0;
        self.total.store(1, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);
    }

    /// Begins counting. A zero-item cycle still counts as one unit of work.
    pub fn start(&self, probe_count: usize) {
        self.reset();
        let total = probe_count.max(1);
        self.total.store(total, Ordering::SeqCst);
        self.indicator.progress(0, 0, total);
    }

    /// Records one settlement; extra ticks past `total` are ignored.
    pub fn tick(&self) {
        let total = self.total.load(Ordering::SeqCst);
        let advanced = self
            .completed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |done| {
                (done < total).then_some(done + 1)
            });
        if advanced.is_err() {
            return;
        }

        self.report();
    }

    // Reads and reports under one lock so the indicator never sees a
    // smaller value after a larger one.
    fn report(&self) {
        let mut reported = self.reported.lock().expect("progress poisoned");
        let state = self.state();
        let percent = state.percentage();
        if percent > *reported {
            *reported = percent;
            self.indicator.progress(percent, state.completed, state.total);
        }
    }

    /// Marks the whole cycle done, e.g. when there was nothing to probe.
    pub fn complete(&self) {
        let total = self.total.load(Ordering::SeqCst);
        self.completed.fetch_max(total, Ordering::SeqCst);
        self.report();
    }

    pub fn state(&self) -> ProgressState {
        ProgressState {
            completed: self.completed.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
        }
    }

    pub fn percentage(&self) -> u8 {
        self.state().percentage()
    }

    /// Dismisses the indicator. Only the first call has an effect.
    pub fn finish(&self) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.indicator.dismiss();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}
