//! Single-result background loading.
//!
//! The worker publishes exactly one result through a bounded channel. The owner polls without
//! blocking and keeps the result once it shows up.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use crate::worker::Worker;

use cb::channel::{Receiver, TryRecvError};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("{0:?} is still loading")]
    NotReady(String),
    #[error("loading {name:?} failed: {reason}")]
    Failed { name: String, reason: String },
    #[error("the worker loading {0:?} stopped without a result")]
    Disconnected(String),
    #[error("couldn't spawn a worker for {name:?}: {reason}")]
    Spawn { name: String, reason: String },
}

/// Fraction of the work done, shared with the worker.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicU32>);

impl Progress {
    pub fn set(&self, fraction: f32) {
        self.0.store(fraction.clamp(0., 1.).to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }
}

/// Loads one `T` on a worker thread.
#[derive(Debug)]
pub struct AsyncLoader<T: Send + 'static> {
    name: String,
    rx: Receiver<Result<T, LoaderError>>,
    result: Option<Result<T, LoaderError>>,
    progress: Progress,
    // Joined on drop.
    _worker: Worker<()>,
}

impl<T: Send + 'static> AsyncLoader<T> {
    pub fn spawn<F>(name: &str, f: F) -> Result<Self, LoaderError>
    where
        F: FnOnce(&Progress) -> Result<T, LoaderError> + Send + 'static,
    {
        let (tx, rx) = cb::channel::bounded(1);
        let progress = Progress::default();
        let worker_progress = progress.clone();
        let worker_name = name.to_owned();
        let worker = Worker::new(name, move || {
            let res = f(&worker_progress);
            if res.is_ok() {
                worker_progress.set(1.);
            }
            debug!("Worker for {:?} finished.", worker_name);
            // Only fails when the loader is gone, and then nobody wants the result.
            let _ = tx.send(res);
        })
        .map_err(|e| {
            error!("Couldn't spawn a loader thread for {:?}: {}", name, e);
            LoaderError::Spawn {
                name: name.to_owned(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            name: name.to_owned(),
            rx,
            result: None,
            progress,
            _worker: worker,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks for the result without blocking. True once a result (success or failure) is held.
    pub fn poll(&mut self) -> bool {
        if self.result.is_none() {
            match self.rx.try_recv() {
                Ok(res) => {
                    info!("{:?} finished loading.", self.name);
                    self.result = Some(res);
                }
                Err(TryRecvError::Empty) => (),
                Err(TryRecvError::Disconnected) => {
                    error!("The worker loading {:?} stopped without a result.", self.name);
                    self.result = Some(Err(LoaderError::Disconnected(self.name.clone())));
                }
            }
        }
        self.result.is_some()
    }

    /// True once the value loaded successfully.
    pub fn ready(&mut self) -> bool {
        self.poll();
        matches!(self.result, Some(Ok(_)))
    }

    /// The loaded value, `NotReady` while the worker is still going.
    pub fn get(&mut self) -> Result<&T, LoaderError> {
        self.poll();
        match &self.result {
            Some(Ok(value)) => Ok(value),
            Some(Err(e)) => Err(e.clone()),
            None => Err(LoaderError::NotReady(self.name.clone())),
        }
    }

    /// Blocks until the worker publishes its result.
    pub fn wait(&mut self) -> Result<&T, LoaderError> {
        if self.result.is_none() {
            let res = self
                .rx
                .recv()
                .unwrap_or_else(|_| Err(LoaderError::Disconnected(self.name.clone())));
            self.result = Some(res);
        }
        self.get()
    }

    pub fn progress(&self) -> f32 {
        self.progress.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_released() {
        let (go_tx, go_rx) = cb::channel::bounded::<()>(1);
        let mut loader = AsyncLoader::spawn("gated", move |progress| {
            progress.set(0.5);
            go_rx.recv().map_err(|e| LoaderError::Failed {
                name: "gated".to_owned(),
                reason: e.to_string(),
            })?;
            Ok(7u32)
        })
        .unwrap();
        assert!(!loader.ready());
        assert_eq!(loader.get(), Err(LoaderError::NotReady("gated".to_owned())));
        go_tx.send(()).unwrap();
        assert_eq!(loader.wait(), Ok(&7));
        assert!(loader.ready());
        assert_eq!(loader.progress(), 1.);
    }

    #[test]
    fn failures_are_kept() {
        let mut loader: AsyncLoader<u32> = AsyncLoader::spawn("broken", |_| {
            Err(LoaderError::Failed {
                name: "broken".to_owned(),
                reason: "no data".to_owned(),
            })
        })
        .unwrap();
        assert!(matches!(loader.wait(), Err(LoaderError::Failed { .. })));
        assert!(loader.poll());
        assert!(!loader.ready());
    }

    #[test]
    fn progress_is_clamped() {
        let p = Progress::default();
        p.set(3.);
        assert_eq!(p.get(), 1.);
        p.set(0.25);
        assert_eq!(p.get(), 0.25);
    }
}
