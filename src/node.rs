use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::domains::{Envelope, Payload};
use crate::error::Result;
use crate::interfaces::messenger::{MessageHandler, Messenger};
use crate::interfaces::scheduler::Scheduler;
use crate::interfaces::world_state::WorldState;
use crate::services::proxy::ProxyScheduler;
use crate::services::scheduler::DataScheduler;
use crate::services::throughput::{Dispatch, ThroughputController};

/// One monitored node: its schedulers, its controller and the inbound path.
pub struct NodeMon {
    node_id: String,
    world_state: Arc<dyn WorldState>,
    scheduler: Arc<DataScheduler>,
    proxy: Option<Arc<ProxyScheduler>>,
    controller: ThroughputController,
}

impl NodeMon {
    pub fn new(
        config: &Config,
        messenger: Arc<dyn Messenger>,
        world_state: Arc<dyn WorldState>,
    ) -> Result<Self> {
        config.validate()?;
        let node_id = world_state.local_node_id();

        let proxy = config
            .clients_lane_enabled()
            .then(|| Arc::new(ProxyScheduler::new(config, world_state.clone())));

        let mut scheduler = DataScheduler::new(config, messenger, world_state.clone());
        if let Some(proxy) = &proxy {
            scheduler = scheduler.with_proxy(proxy.clone());
        }
        let scheduler = Arc::new(scheduler);

        let controller = ThroughputController::new(
            config,
            node_id.clone(),
            scheduler.clone(),
            proxy.clone().map(|proxy| proxy as Arc<dyn Scheduler>),
        );

        Ok(Self {
            node_id,
            world_state,
            scheduler,
            proxy,
            controller,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn scheduler(&self) -> &Arc<DataScheduler> {
        &self.scheduler
    }

    pub fn proxy(&self) -> Option<&Arc<ProxyScheduler>> {
        self.proxy.as_ref()
    }

    pub fn controller(&self) -> &ThroughputController {
        &self.controller
    }

    pub fn start(&self) {
        self.scheduler.start();
        if let Some(proxy) = &self.proxy {
            proxy.start();
        }
    }

    pub fn stop(&self) {
        self.scheduler.stop();
        if let Some(proxy) = &self.proxy {
            proxy.stop();
        }
    }

    /// Records a local observation and disseminates it.
    pub fn publish(&self, payload: Payload) -> Dispatch {
        let envelope = Envelope::new(self.node_id.clone(), self.node_id.clone(), payload);
        if let Err(err) = self.world_state.update_data(&self.node_id, &envelope) {
            warn!(error = %err, "local update not recorded");
        }
        self.controller.publish(envelope)
    }

    /// Disseminates an envelope built elsewhere, e.g. data about another node.
    pub fn publish_envelope(&self, envelope: Envelope) -> Dispatch {
        self.controller.publish(envelope)
    }
}

#[async_trait]
impl MessageHandler for NodeMon {
    async fn on_message(&self, group_id: &str, node_id: &str, bytes: &[u8]) {
        let envelope = match Envelope::from_bytes(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(group = group_id, from = node_id, error = %err, "undecodable message");
                return;
            }
        };
        if envelope.sender_id() == self.node_id {
            debug!(group = group_id, "ignoring own message");
            return;
        }
        if !self.scheduler.enqueue_incoming(envelope) {
            warn!(group = group_id, from = node_id, "incoming queue full, message dropped");
        }
    }
}
