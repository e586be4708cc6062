use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{info, warn};
use u810::{InputSink, ReportPipe, Session, SessionStats};

use crate::errors::{AppError, Result};

/// Cancels a pipe's outstanding request from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A pipe whose blocking `wait` gives up once its token is cancelled.
pub trait CancelPipe: ReportPipe {
    fn cancel_token(&self) -> CancelToken;
}

/// A session driven on its own thread until it closes, then detached there.
pub struct SessionHandle {
    name: String,
    calibrate: bool,
    cancel: CancelToken,
    thread: Option<JoinHandle<SessionStats>>,
}

impl SessionHandle {
    pub fn spawn<P, S>(session: Session<P, S>) -> Result<Self>
    where
        P: CancelPipe + Send + 'static,
        S: InputSink + Send + 'static,
    {
        let cancel = session.pipe().cancel_token();
        let name = session.name().to_string();
        let calibrate = session.config().calibrate;
        let thread = thread::Builder::new()
            .name("u810-session".into())
            .spawn(move || {
                let mut session = session;
                session.run();
                u810::detach(session)
            })?;
        Ok(Self {
            name,
            calibrate,
            cancel,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn calibrate(&self) -> bool {
        self.calibrate
    }

    /// True once the report stream has ended on its own (unplug, fault).
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancels the outstanding request and waits for the worker to detach.
    pub fn stop(mut self) -> Result<SessionStats> {
        self.cancel.cancel();
        let thread = self.thread.take().ok_or(AppError::WorkerPanicked)?;
        let stats = thread.join().map_err(|_| AppError::WorkerPanicked)?;
        info!(
            "{}: worker stopped ({} resubmissions, {} dropped events)",
            self.name, stats.resubmissions, stats.dropped_events
        );
        Ok(stats)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.cancel.cancel();
            if thread.join().is_err() {
                warn!("{}: worker panicked", self.name);
            }
        }
    }
}
