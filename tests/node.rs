mod common;

use std::sync::Arc;

use common::{eventually, LoopbackMessenger, RecordingListener};
use nodemon::domains::{Host, Link, NodeInfo, Payload, Topology};
use nodemon::interfaces::messenger::MessageHandler;
use nodemon::providers::memory::MemoryWorldState;
use nodemon::{Config, Envelope, NodeMon};

struct Peer {
    node: Arc<NodeMon>,
    world: Arc<MemoryWorldState>,
    messenger: Arc<LoopbackMessenger>,
}

fn peer(id: &str, config: &Config) -> Peer {
    let world = Arc::new(MemoryWorldState::new(id));
    let messenger = Arc::new(LoopbackMessenger::new(id));
    let node = Arc::new(NodeMon::new(config, messenger.clone(), world.clone()).unwrap());
    node.start();
    Peer {
        node,
        world,
        messenger,
    }
}

#[tokio::test]
async fn a_published_link_update_reaches_the_other_node() {
    let config = Config::default();
    let a = peer("n1", &config);
    let b = peer("n2", &config);
    a.messenger.route(&config.local_group_id, b.node.clone());

    let report = a.node.publish(Payload::Link(vec![Link::new("n1", "n2")]));
    assert_eq!(report.local.accepted, 1);
    assert!(a.world.get("n1").is_some());

    assert!(eventually(|| b.world.get("n1").is_some()).await);
    assert_eq!(b.world.get("n1").unwrap().links, vec![Link::new("n1", "n2")]);
}

#[tokio::test]
async fn fragmented_topology_is_reassembled_on_the_receiver() {
    let config = Config {
        mtu: 700,
        ..Config::default()
    };
    let a = peer("n1", &config);
    let b = peer("n2", &config);
    a.messenger.route(&config.local_group_id, b.node.clone());

    let mut topology = Topology::new("lan", "255.255.255.0");
    for i in 1..=20 {
        let ip = format!("10.0.0.{i}");
        topology.internals.insert(ip.clone(), Host::new(ip));
    }
    topology
        .local_gws
        .insert("10.0.0.254".to_string(), Host::new("10.0.0.254"));

    let report = a.node.publish(Payload::Topology(topology.clone()));
    assert!(report.fragments > 1);

    let complete = || {
        b.world
            .get("n1")
            .and_then(|record| record.topology)
            .map(|t| t.internals.len() == 20 && !t.local_gws.is_empty())
            .unwrap_or(false)
    };
    assert!(eventually(complete).await);
    assert_eq!(b.world.get("n1").unwrap().topology, Some(topology));
}

#[tokio::test]
async fn received_updates_are_forwarded_to_local_clients() {
    let sender_config = Config::default();
    let receiver_config = Config {
        clients_delivery: true,
        ..Config::default()
    };
    let a = peer("n1", &sender_config);
    let b = peer("n2", &receiver_config);
    a.messenger.route(&sender_config.local_group_id, b.node.clone());

    let client = RecordingListener::new("client-1");
    let proxy = b.node.proxy().expect("clients lane enabled").clone();
    assert!(proxy.register_listener(client.clone()).await);

    a.node.publish(Payload::Info(NodeInfo {
        hostname: "alpha".to_string(),
        ..NodeInfo::default()
    }));
    assert!(eventually(|| client.update_count() == 1).await);
    assert_eq!(client.updates.lock().unwrap()[0].0, "n1");
}

#[tokio::test]
async fn own_and_undecodable_messages_are_not_queued() {
    let config = Config::default();
    let world = Arc::new(MemoryWorldState::new("n1"));
    let node = NodeMon::new(&config, Arc::new(LoopbackMessenger::new("n1")), world).unwrap();

    let own = Envelope::new("n1", "n1", Payload::Empty).to_bytes().unwrap();
    node.on_message("nodemon", "n1", &own).await;
    node.on_message("nodemon", "n2", b"\x00\x01garbage").await;
    assert_eq!(node.scheduler().incoming_len(), 0);

    let other = Envelope::new("n2", "n2", Payload::Empty).to_bytes().unwrap();
    node.on_message("nodemon", "n2", &other).await;
    assert_eq!(node.scheduler().incoming_len(), 1);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let config = Config {
        queue_size: 0,
        ..Config::default()
    };
    let result = NodeMon::new(
        &config,
        Arc::new(LoopbackMessenger::new("n1")),
        Arc::new(MemoryWorldState::new("n1")),
    );
    assert!(result.is_err());
    assert!(config.validate().is_err());
}

#[tokio::test]
async fn a_tcp_node_serves_its_updates_to_local_clients() {
    let config = Config {
        transport: nodemon::TransportType::Tcp,
        ..Config::default()
    };
    let node = peer("n1", &config);
    let proxy = node.node.proxy().expect("tcp transport enables the clients lane").clone();
    let client = RecordingListener::new("client-1");
    proxy.register_listener(client.clone()).await;

    let report = node.node.publish(Payload::Link(vec![Link::new("n1", "n2")]));
    assert_eq!(report.clients.accepted, 1);
    assert_eq!(report.local, Default::default());
    assert!(eventually(|| client.update_count() == 1).await);
}
