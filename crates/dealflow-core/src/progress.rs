// Ingest progress
//
// A ProgressSource yields raw percentages while the insight service works.
// TickerProgress simulates them on a fixed interval up to a ceiling; a real
// source (e.g. upload byte counts) can replace it without touching the
// coordinator. ProgressReporter turns whatever the source yields into a
// clamped, non-decreasing value observable through a watch channel.

use futures::{future, Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::IntervalStream;

use crate::config::WorkflowConfig;

/// Stream of raw progress percentages
pub type ProgressStream = Pin<Box<dyn Stream<Item = u8> + Send>>;

/// Source of progress values for one ingest
pub trait ProgressSource: Send + Sync {
    /// Start a new progress stream; called once per ingest, inside the runtime
    fn start(&self) -> ProgressStream;
}

/// Simulated progress: `step` percent every `tick`, stopping at `ceiling`
#[derive(Debug, Clone)]
pub struct TickerProgress {
    tick: Duration,
    step: u8,
    ceiling: u8,
}

impl TickerProgress {
    pub fn new(tick: Duration, step: u8, ceiling: u8) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            step: step.max(1),
            ceiling: ceiling.min(100),
        }
    }

    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(config.progress_tick, config.progress_step, config.progress_ceiling)
    }
}

impl ProgressSource for TickerProgress {
    fn start(&self) -> ProgressStream {
        let (step, ceiling) = (self.step, self.ceiling);
        let first = tokio::time::Instant::now() + self.tick;
        let ticks = IntervalStream::new(tokio::time::interval_at(first, self.tick));

        Box::pin(ticks.scan(0u8, move |percent, _| {
            if *percent >= ceiling {
                return future::ready(None);
            }
            *percent = percent.saturating_add(step).min(ceiling);
            future::ready(Some(*percent))
        }))
    }
}

/// Source that never reports; progress jumps to 100 on completion
#[derive(Debug, Clone, Default)]
pub struct NoProgress;

impl ProgressSource for NoProgress {
    fn start(&self) -> ProgressStream {
        Box::pin(futures::stream::empty())
    }
}

/// Publishes monotonic progress for one ingest
#[derive(Debug)]
pub struct ProgressReporter {
    sender: watch::Sender<u8>,
}

impl ProgressReporter {
    /// Create a reporter starting at 0 and a receiver observing it
    pub fn channel() -> (Self, watch::Receiver<u8>) {
        let (sender, receiver) = watch::channel(0);
        (Self { sender }, receiver)
    }

    /// Publish `percent` if it moves progress forward; returns whether it did
    pub fn report(&self, percent: u8) -> bool {
        let percent = percent.min(100);
        self.sender.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        })
    }

    /// Mark the ingest finished
    pub fn finish(&self) -> bool {
        self.report(100)
    }

    /// Latest published value
    pub fn current(&self) -> u8 {
        *self.sender.borrow()
    }
}
