use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::domains::{Envelope, MessageType};
use crate::error::{NodeMonError, Result};
use crate::interfaces::listener::ClientListener;
use crate::interfaces::scheduler::Scheduler;
use crate::interfaces::world_state::WorldState;
use crate::services::queue::BoundedQueue;

type ListenerSet = Arc<Mutex<Vec<Arc<dyn ClientListener>>>>;

/// Fans outgoing envelopes out to locally attached clients and answers
/// per-client snapshot requests.
///
/// Like [`DataScheduler`](crate::services::scheduler::DataScheduler), the
/// worker starts once and cannot be restarted after `stop`.
pub struct ProxyScheduler {
    queue: BoundedQueue<Envelope>,
    listeners: ListenerSet,
    listener_count: AtomicUsize,
    world_state: Arc<dyn WorldState>,
    stopped: Arc<AtomicBool>,
}

impl ProxyScheduler {
    pub fn new(config: &Config, world_state: Arc<dyn WorldState>) -> Self {
        Self {
            queue: BoundedQueue::new("proxy", config.queue_size),
            listeners: Arc::new(Mutex::new(Vec::new())),
            listener_count: AtomicUsize::new(0),
            world_state,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Adds `listener` unless one with the same id is already registered.
    pub async fn register_listener(&self, listener: Arc<dyn ClientListener>) -> bool {
        let mut guard = self.listeners.lock().await;
        if guard.iter().any(|existing| existing.id() == listener.id()) {
            return false;
        }
        debug!(client = listener.id(), "client registered");
        guard.push(listener);
        self.listener_count.store(guard.len(), Ordering::Release);
        true
    }

    pub async fn unregister_listener(&self, client_id: &str) -> bool {
        let mut guard = self.listeners.lock().await;
        let before = guard.len();
        guard.retain(|existing| existing.id() != client_id);
        self.listener_count.store(guard.len(), Ordering::Release);
        let removed = guard.len() != before;
        if removed {
            debug!(client = client_id, "client unregistered");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.listener_count.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Queues a full snapshot for the client registered as `client_id`.
    pub fn request_world_state(&self, client_id: &str) -> bool {
        let request = Envelope::world_state_request(self.world_state.local_node_id(), client_id);
        self.enqueue_outgoing(request)
    }
}

impl Scheduler for ProxyScheduler {
    fn enqueue_outgoing(&self, envelope: Envelope) -> bool {
        if self.listener_count() == 0 {
            return false;
        }
        self.queue.try_push(envelope)
    }

    fn enqueue_incoming(&self, envelope: Envelope) -> bool {
        warn!(
            sender = envelope.sender_id(),
            "proxy scheduler does not carry incoming envelopes"
        );
        false
    }

    fn start(&self) {
        let Some(rx) = self.queue.take_receiver() else {
            warn!(
                stopped = self.is_stopped(),
                "proxy worker was already started, not restarting"
            );
            return;
        };
        self.stopped.store(false, Ordering::Release);
        tokio::spawn(run_proxy(
            rx,
            self.listeners.clone(),
            self.world_state.clone(),
            self.stopped.clone(),
        ));
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

async fn run_proxy(
    mut rx: mpsc::Receiver<Envelope>,
    listeners: ListenerSet,
    world_state: Arc<dyn WorldState>,
    stopped: Arc<AtomicBool>,
) {
    while !stopped.load(Ordering::Acquire) {
        let Some(envelope) = rx.recv().await else {
            break;
        };
        if stopped.load(Ordering::Acquire) {
            break;
        }
        match envelope.message_type() {
            MessageType::UpdateData => deliver_data(&listeners, &envelope).await,
            MessageType::UpdateWorldState => {
                deliver_snapshot(&listeners, world_state.as_ref(), &envelope).await
            }
        }
    }
    debug!("proxy worker stopped");
}

async fn deliver_data(listeners: &ListenerSet, envelope: &Envelope) {
    let bytes = match envelope.to_bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(node_id = envelope.data_node_id(), error = %err, "cannot serialize client update");
            return;
        }
    };
    let guard = listeners.lock().await;
    for listener in guard.iter() {
        if let Err(err) = listener
            .on_data_update(envelope.data_node_id(), &bytes)
            .await
        {
            warn!(client = listener.id(), error = %err, "client update failed");
        }
    }
}

async fn deliver_snapshot(
    listeners: &ListenerSet,
    world_state: &dyn WorldState,
    envelope: &Envelope,
) {
    let guard = listeners.lock().await;
    let listener = match find_listener(&guard, envelope.recipient_id()) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "world state requested for unregistered client");
            return;
        }
    };
    let snapshot = world_state.nodes_snapshot();
    if let Err(err) = listener.on_world_state(&snapshot).await {
        warn!(client = listener.id(), error = %err, "snapshot delivery failed");
    }
}

fn find_listener<'a>(
    listeners: &'a [Arc<dyn ClientListener>],
    client_id: &str,
) -> Result<&'a Arc<dyn ClientListener>> {
    listeners
        .iter()
        .find(|listener| listener.id() == client_id)
        .ok_or_else(|| NodeMonError::UnknownClient(client_id.to_string()))
}
