#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use nodemon::domains::{Envelope, NodeRecord};
use nodemon::error::{NodeMonError, Result};
use nodemon::interfaces::listener::ClientListener;
use nodemon::interfaces::messenger::{MessageHandler, Messenger};
use nodemon::interfaces::scheduler::Scheduler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Node(String, Vec<u8>),
    Group(String, Vec<u8>),
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<Sent>>,
    pub fail_for: Mutex<Vec<String>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, node_id: &str) {
        self.fail_for.lock().unwrap().push(node_id.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn envelopes(&self) -> Vec<(String, Envelope)> {
        self.sent()
            .into_iter()
            .map(|sent| match sent {
                Sent::Node(id, bytes) | Sent::Group(id, bytes) => {
                    (id, Envelope::from_bytes(&bytes).unwrap())
                }
            })
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, node_id: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_for.lock().unwrap().iter().any(|id| id == node_id) {
            return Err(NodeMonError::Transport(format!("unreachable {node_id}")));
        }
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Node(node_id.to_string(), bytes.to_vec()));
        Ok(())
    }

    async fn broadcast_message(&self, group_id: &str, bytes: &[u8]) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Group(group_id.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// Delivers every send straight into the handlers registered for the target id.
#[derive(Default)]
pub struct LoopbackMessenger {
    pub from: String,
    pub routes: Mutex<Vec<(String, Arc<dyn MessageHandler>)>>,
}

impl LoopbackMessenger {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
            routes: Mutex::new(Vec::new()),
        }
    }

    pub fn route(&self, id: &str, handler: Arc<dyn MessageHandler>) {
        self.routes.lock().unwrap().push((id.to_string(), handler));
    }
}

#[async_trait]
impl Messenger for LoopbackMessenger {
    async fn send_message(&self, node_id: &str, bytes: &[u8]) -> Result<()> {
        self.broadcast_message(node_id, bytes).await
    }

    async fn broadcast_message(&self, group_id: &str, bytes: &[u8]) -> Result<()> {
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .routes
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == group_id)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler.on_message(group_id, &self.from, bytes).await;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingListener {
    pub id: String,
    pub updates: Mutex<Vec<(String, Vec<u8>)>>,
    pub snapshots: Mutex<Vec<Vec<NodeRecord>>>,
}

impl RecordingListener {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            ..Self::default()
        })
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

#[async_trait]
impl ClientListener for RecordingListener {
    fn id(&self) -> &str {
        &self.id
    }

    async fn on_data_update(&self, node_id: &str, bytes: &[u8]) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((node_id.to_string(), bytes.to_vec()));
        Ok(())
    }

    async fn on_world_state(&self, records: &[NodeRecord]) -> Result<()> {
        self.snapshots.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

/// Scheduler stand-in that records what it is offered.
pub struct CollectingScheduler {
    pub outgoing: Mutex<Vec<Envelope>>,
    pub accept: bool,
}

impl CollectingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outgoing: Mutex::new(Vec::new()),
            accept: true,
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            outgoing: Mutex::new(Vec::new()),
            accept: false,
        })
    }

    pub fn taken(&self) -> Vec<Envelope> {
        self.outgoing.lock().unwrap().clone()
    }
}

impl Scheduler for CollectingScheduler {
    fn enqueue_outgoing(&self, envelope: Envelope) -> bool {
        if self.accept {
            self.outgoing.lock().unwrap().push(envelope);
        }
        self.accept
    }

    fn enqueue_incoming(&self, _envelope: Envelope) -> bool {
        false
    }

    fn start(&self) {}

    fn stop(&self) {}
}

/// Polls `check` until it holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
