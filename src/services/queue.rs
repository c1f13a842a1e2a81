use std::sync::Mutex;

use tokio::sync::mpsc::{self, error::TrySendError};

/// Fixed-capacity FIFO shared between producers and one draining worker.
///
/// Pushing never waits: a full queue rejects the item and reports `false`.
pub struct BoundedQueue<T> {
    name: &'static str,
    tx: mpsc::Sender<T>,
    rx: Mutex<Option<mpsc::Receiver<T>>>,
}

impl<T> BoundedQueue<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            name,
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn try_push(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(queue = self.name, capacity = self.capacity(), "queue full, dropping");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(queue = self.name, "queue closed, dropping");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Hands the receiving end to the worker. Only the first call gets it.
    pub fn take_receiver(&self) -> Option<mpsc::Receiver<T>> {
        self.rx.lock().ok().and_then(|mut guard| guard.take())
    }
}
