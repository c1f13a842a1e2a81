use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::domains::{Envelope, MessageType, TransportType};
use crate::interfaces::scheduler::Scheduler;
use crate::services::fragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Local,
    Masters,
    Clients,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneCount {
    pub accepted: usize,
    pub dropped: usize,
}

impl LaneCount {
    fn record(&mut self, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.dropped += 1;
        }
    }
}

/// What one `publish` call produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub fragments: usize,
    pub local: LaneCount,
    pub masters: LaneCount,
    pub clients: LaneCount,
}

impl Dispatch {
    pub fn lane(&self, lane: Lane) -> LaneCount {
        match lane {
            Lane::Local => self.local,
            Lane::Masters => self.masters,
            Lane::Clients => self.clients,
        }
    }

    pub fn dropped(&self) -> usize {
        self.local.dropped + self.masters.dropped + self.clients.dropped
    }
}

/// Splits locally produced envelopes to the MTU and routes every fragment to
/// the enabled delivery lanes. Runs on the caller's task and never waits.
pub struct ThroughputController {
    local_node_id: String,
    mtu: usize,
    transport: TransportType,
    local_group_id: String,
    masters_group_id: String,
    local_lane: bool,
    masters_lane: bool,
    outgoing: Arc<dyn Scheduler>,
    clients: Option<Arc<dyn Scheduler>>,
}

impl ThroughputController {
    pub fn new(
        config: &Config,
        local_node_id: impl Into<String>,
        outgoing: Arc<dyn Scheduler>,
        clients: Option<Arc<dyn Scheduler>>,
    ) -> Self {
        let clients = if config.clients_lane_enabled() {
            clients
        } else {
            None
        };
        Self {
            local_node_id: local_node_id.into(),
            mtu: config.mtu,
            transport: config.transport,
            local_group_id: config.local_group_id.clone(),
            masters_group_id: config.masters_group_id.clone(),
            local_lane: config.local_lane_enabled(),
            masters_lane: config.masters_lane_enabled(),
            outgoing,
            clients,
        }
    }

    pub fn is_enabled(&self, lane: Lane) -> bool {
        match lane {
            Lane::Local => self.local_lane,
            Lane::Masters => self.masters_lane,
            Lane::Clients => self.clients.is_some(),
        }
    }

    pub fn publish(&self, envelope: Envelope) -> Dispatch {
        let fragments = match fragment::split(&envelope, self.mtu) {
            Ok(fragments) => fragments,
            Err(err) => {
                warn!(
                    node_id = envelope.data_node_id(),
                    error = %err,
                    "cannot size envelope, forwarding unsplit"
                );
                vec![envelope]
            }
        };

        let mut report = Dispatch {
            fragments: fragments.len(),
            ..Dispatch::default()
        };
        if report.fragments > 1 {
            debug!(fragments = report.fragments, mtu = self.mtu, "envelope split");
        }

        let peer_transport = match self.transport {
            TransportType::Tcp => TransportType::UdpUnicast,
            other => other,
        };
        for fragment in &fragments {
            if self.local_lane {
                let packed = fragment.repack(
                    MessageType::UpdateData,
                    &self.local_node_id,
                    &self.local_group_id,
                    peer_transport,
                );
                report.local.record(self.outgoing.enqueue_outgoing(packed));
            }
            if self.masters_lane {
                let packed = fragment.repack(
                    MessageType::UpdateData,
                    &self.local_node_id,
                    &self.masters_group_id,
                    peer_transport,
                );
                report.masters.record(self.outgoing.enqueue_outgoing(packed));
            }
            if let Some(clients) = &self.clients {
                let packed = fragment.repack(
                    MessageType::UpdateData,
                    &self.local_node_id,
                    fragment.recipient_id(),
                    TransportType::Tcp,
                );
                report.clients.record(clients.enqueue_outgoing(packed));
            }
        }

        if report.local.dropped + report.masters.dropped > 0 {
            warn!(
                local = report.local.dropped,
                masters = report.masters.dropped,
                "outgoing queue full, fragments dropped"
            );
        }
        report
    }
}
