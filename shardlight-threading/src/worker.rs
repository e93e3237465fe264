//! # Worker
//!
//! A named thread that is joined when its handle goes away.

use std::thread::JoinHandle;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Effectively a `JoinHandle` that joins on drop and logs a panicked worker instead of
/// propagating it.
#[derive(Debug)]
pub struct Worker<T: Send + 'static> {
    name: String,
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> Worker<T> {
    /// Creates a `Worker`.
    ///
    /// # Arguments
    ///
    /// * `name` Name of the thread. Used during debugging only.
    /// * `f` The function being run by the thread.
    ///
    /// # Remarks
    ///
    /// Nothing interrupts `f`. Dropping the handle waits for it to return.
    pub fn new<F: FnOnce() -> T + Send + 'static>(name: &str, f: F) -> Result<Self, std::io::Error> {
        let handle = std::thread::Builder::new().name(name.to_owned()).spawn(f)?;
        trace!("Spawned thread {:?}.", name);
        Ok(Worker {
            name: name.to_owned(),
            handle: Some(handle),
        })
    }
}

impl<T: Send + 'static> Drop for Worker<T> {
    fn drop(&mut self) {
        if let Some(Err(_)) = self.handle.take().map(JoinHandle::join) {
            error!("Thread {:?} panicked.", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    use super::*;

    #[test]
    fn dropping_joins() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let worker = Worker::new("sleeper", move || {
            std::thread::sleep(Duration::from_millis(20));
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
        drop(worker);
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn a_panicked_worker_is_logged_not_rethrown() {
        let worker = Worker::new("doomed", || -> u32 { panic!("worker gave up") }).unwrap();
        drop(worker);
    }
}
