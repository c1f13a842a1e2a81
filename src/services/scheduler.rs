use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::domains::{Envelope, MessageType, TransportType};
use crate::error::{NodeMonError, Result};
use crate::interfaces::messenger::Messenger;
use crate::interfaces::scheduler::Scheduler;
use crate::interfaces::world_state::WorldState;
use crate::services::queue::BoundedQueue;

/// Byte budget for the outgoing worker.
///
/// Bytes are counted as they are sent; once the count reaches the MTU the
/// worker pauses for one interval and the count starts over.
#[derive(Debug, Clone)]
pub struct ThroughputPacer {
    mtu: usize,
    sent_data_size: usize,
}

impl ThroughputPacer {
    pub fn new(mtu: usize) -> Self {
        Self {
            mtu,
            sent_data_size: 0,
        }
    }

    /// Records a send. Returns true when the caller must pause now.
    pub fn record(&mut self, bytes: usize) -> bool {
        self.sent_data_size += bytes;
        if self.sent_data_size >= self.mtu {
            self.sent_data_size = 0;
            return true;
        }
        false
    }

    pub fn sent_data_size(&self) -> usize {
        self.sent_data_size
    }
}

/// Drains the peer-bound outgoing queue and the incoming queue.
///
/// Workers start once. A stopped scheduler stays stopped: its receivers went
/// with the exited workers and a later `start` only logs a warning.
pub struct DataScheduler {
    outgoing: BoundedQueue<Envelope>,
    incoming: BoundedQueue<Envelope>,
    messenger: Arc<dyn Messenger>,
    world_state: Arc<dyn WorldState>,
    proxy: Option<Arc<dyn Scheduler>>,
    mtu: usize,
    throughput_interval: Duration,
    stopped: Arc<AtomicBool>,
}

impl DataScheduler {
    pub fn new(
        config: &Config,
        messenger: Arc<dyn Messenger>,
        world_state: Arc<dyn WorldState>,
    ) -> Self {
        Self {
            outgoing: BoundedQueue::new("outgoing", config.queue_size),
            incoming: BoundedQueue::new("incoming", config.queue_size),
            messenger,
            world_state,
            proxy: None,
            mtu: config.mtu,
            throughput_interval: config.throughput_interval(),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Applied incoming envelopes are also offered to `proxy` for local clients.
    pub fn with_proxy(mut self, proxy: Arc<dyn Scheduler>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn outgoing_len(&self) -> usize {
        self.outgoing.len()
    }

    pub fn incoming_len(&self) -> usize {
        self.incoming.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Scheduler for DataScheduler {
    fn enqueue_outgoing(&self, envelope: Envelope) -> bool {
        self.outgoing.try_push(envelope)
    }

    fn enqueue_incoming(&self, envelope: Envelope) -> bool {
        self.incoming.try_push(envelope)
    }

    fn start(&self) {
        let (Some(outgoing), Some(incoming)) =
            (self.outgoing.take_receiver(), self.incoming.take_receiver())
        else {
            warn!(
                stopped = self.is_stopped(),
                "data scheduler workers were already started, not restarting"
            );
            return;
        };
        self.stopped.store(false, Ordering::Release);
        tokio::spawn(run_outgoing(
            outgoing,
            self.messenger.clone(),
            self.stopped.clone(),
            ThroughputPacer::new(self.mtu),
            self.throughput_interval,
        ));
        tokio::spawn(run_incoming(
            incoming,
            self.world_state.clone(),
            self.proxy.clone(),
            self.stopped.clone(),
        ));
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

async fn run_outgoing(
    mut rx: mpsc::Receiver<Envelope>,
    messenger: Arc<dyn Messenger>,
    stopped: Arc<AtomicBool>,
    mut pacer: ThroughputPacer,
    interval: Duration,
) {
    while !stopped.load(Ordering::Acquire) {
        let Some(envelope) = rx.recv().await else {
            break;
        };
        if stopped.load(Ordering::Acquire) {
            break;
        }
        match dispatch(messenger.as_ref(), &envelope).await {
            Ok(sent) => {
                if pacer.record(sent) {
                    tokio::time::sleep(interval).await;
                }
            }
            Err(err) => {
                warn!(
                    recipient = envelope.recipient_id(),
                    data_type = %envelope.data_type(),
                    error = %err,
                    "dropping outgoing envelope"
                );
            }
        }
    }
    debug!("outgoing worker stopped");
}

async fn dispatch(messenger: &dyn Messenger, envelope: &Envelope) -> Result<usize> {
    match envelope.transport_type() {
        TransportType::UdpUnicast | TransportType::UdpMulticast => {
            let bytes = envelope.to_bytes()?;
            messenger
                .send_message(envelope.recipient_id(), &bytes)
                .await?;
            Ok(bytes.len())
        }
        TransportType::Tcp => Err(NodeMonError::Unsupported(
            "tcp envelopes are delivered by the proxy scheduler".to_string(),
        )),
    }
}

async fn run_incoming(
    mut rx: mpsc::Receiver<Envelope>,
    world_state: Arc<dyn WorldState>,
    proxy: Option<Arc<dyn Scheduler>>,
    stopped: Arc<AtomicBool>,
) {
    while !stopped.load(Ordering::Acquire) {
        let Some(envelope) = rx.recv().await else {
            break;
        };
        if stopped.load(Ordering::Acquire) {
            break;
        }
        if let Err(err) = world_state.update_data(envelope.data_node_id(), &envelope) {
            warn!(
                node_id = envelope.data_node_id(),
                sender = envelope.sender_id(),
                error = %err,
                "skipping incoming envelope"
            );
            continue;
        }
        if let Some(proxy) = &proxy {
            let forwarded = envelope
                .with_message_type(MessageType::UpdateData)
                .with_transport(TransportType::Tcp);
            if !proxy.enqueue_outgoing(forwarded) {
                debug!("no client took the incoming update");
            }
        }
    }
    debug!("incoming worker stopped");
}
