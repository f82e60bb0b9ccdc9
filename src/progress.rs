//! Conversion progress reporting and cancellation.
//!
//! Index conversions run for a long time inside an external job
//! scheduler. The builders report coarse named steps through a
//! [`ProgressSink`] so that the orchestration layer can surface
//! liveness without polling internals, and poll an [`Interrupt`] flag
//! between records so the job can be cancelled without leaving a
//! half-published generation behind.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::error::{Result, SileneError};

/// Steps of the forward index conversion, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardStep {
    GetDocIds,
    GatherOffsets,
    Force,
    Finished,
}

/// Steps of the reverse index conversion, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReverseStep {
    AccumulateStatistics,
    CountOffsets,
    CreateIntermediate,
    SortIntermediate,
    Sizing,
    FinalizeDocs,
    Force,
    Finished,
}

/// Receives conversion step transitions.
pub trait ProgressSink<S: Debug + Copy>: Send + Sync {
    fn progress(&self, step: S);
}

/// Discards all progress events.
pub struct NullProgress;

impl<S: Debug + Copy> ProgressSink<S> for NullProgress {
    fn progress(&self, _step: S) {}
}

/// Logs each step transition at info level.
pub struct LogProgress {
    name: String,
}

impl LogProgress {
    pub fn new<S: Into<String>>(name: S) -> LogProgress {
        LogProgress { name: name.into() }
    }
}

impl<S: Debug + Copy> ProgressSink<S> for LogProgress {
    fn progress(&self, step: S) {
        info!("{}: {:?}", self.name, step);
    }
}

/// A shared cancellation flag checked between journal records.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Interrupt {
        Interrupt::default()
    }

    /// Request cancellation of the conversion holding this handle.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Err([`SileneError::Interrupted`]) once cancellation is requested.
    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            Err(SileneError::Interrupted)
        } else {
            Ok(())
        }
    }
}
