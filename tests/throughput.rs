mod common;

use common::CollectingScheduler;
use nodemon::domains::{Envelope, Link, Payload, TransportType};
use nodemon::services::throughput::{Lane, ThroughputController};
use nodemon::Config;

fn links(n: usize) -> Payload {
    Payload::Link(
        (0..n)
            .map(|i| Link::new(format!("10.0.{}.{}", i / 250, i % 250), "10.0.0.254"))
            .collect(),
    )
}

#[test]
fn local_lane_targets_the_local_group() {
    let config = Config::default();
    let outgoing = CollectingScheduler::new();
    let controller = ThroughputController::new(&config, "n1", outgoing.clone(), None);

    let report = controller.publish(Envelope::new("n1", "n1", links(2)));
    assert_eq!(report.fragments, 1);
    assert_eq!(report.local.accepted, 1);
    assert_eq!(report.masters.accepted, 0);

    let sent = outgoing.taken();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient_id(), config.local_group_id);
    assert_eq!(sent[0].sender_id(), "n1");
    assert_eq!(sent[0].transport_type(), TransportType::UdpMulticast);
}

#[test]
fn masters_only_leaves_the_local_group_untouched() {
    let config = Config {
        local_delivery: false,
        masters_delivery: true,
        ..Config::default()
    };
    let outgoing = CollectingScheduler::new();
    let clients = CollectingScheduler::new();
    let controller =
        ThroughputController::new(&config, "n1", outgoing.clone(), Some(clients.clone()));
    assert!(!controller.is_enabled(Lane::Local));
    assert!(controller.is_enabled(Lane::Masters));
    assert!(!controller.is_enabled(Lane::Clients));

    let report = controller.publish(Envelope::new("n1", "n1", links(1)));
    assert_eq!(report.lane(Lane::Local).accepted, 0);
    assert_eq!(report.lane(Lane::Masters).accepted, 1);
    assert_eq!(report.lane(Lane::Clients), Default::default());
    assert!(!outgoing.taken().is_empty());
    assert!(outgoing
        .taken()
        .iter()
        .all(|env| env.recipient_id() == config.masters_group_id));
    assert!(clients.taken().is_empty());
}

#[test]
fn every_fragment_reaches_every_enabled_lane() {
    let config = Config {
        mtu: 600,
        masters_delivery: true,
        clients_delivery: true,
        ..Config::default()
    };
    let outgoing = CollectingScheduler::new();
    let clients = CollectingScheduler::new();
    let controller =
        ThroughputController::new(&config, "n1", outgoing.clone(), Some(clients.clone()));

    let report = controller.publish(Envelope::new("n1", "n9", links(30)));
    assert!(report.fragments > 1);
    assert_eq!(report.local.accepted, report.fragments);
    assert_eq!(report.masters.accepted, report.fragments);
    assert_eq!(report.clients.accepted, report.fragments);
    assert_eq!(outgoing.taken().len(), 2 * report.fragments);

    for env in clients.taken() {
        assert_eq!(env.transport_type(), TransportType::Tcp);
        assert_eq!(env.data_node_id(), "n9");
        assert_eq!(env.sender_id(), "n1");
    }
}

#[test]
fn tcp_transport_alone_feeds_the_clients_lane() {
    let config = Config {
        transport: TransportType::Tcp,
        ..Config::default()
    };
    let outgoing = CollectingScheduler::new();
    let clients = CollectingScheduler::new();
    let controller =
        ThroughputController::new(&config, "n1", outgoing.clone(), Some(clients.clone()));
    assert!(controller.is_enabled(Lane::Clients));

    let report = controller.publish(Envelope::new("n1", "n1", links(1)));
    assert_eq!(report.clients.accepted, 1);
    assert!(outgoing.taken().is_empty());
    let sent = clients.taken();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].transport_type(), TransportType::Tcp);
}

#[test]
fn udp_transport_keeps_clients_off_by_default() {
    let config = Config::default();
    let clients = CollectingScheduler::new();
    let controller = ThroughputController::new(
        &config,
        "n1",
        CollectingScheduler::new(),
        Some(clients.clone()),
    );
    assert!(!controller.is_enabled(Lane::Clients));
    controller.publish(Envelope::new("n1", "n1", links(1)));
    assert!(clients.taken().is_empty());
}

#[test]
fn full_queues_are_counted_not_fatal() {
    let config = Config {
        masters_delivery: true,
        ..Config::default()
    };
    let controller =
        ThroughputController::new(&config, "n1", CollectingScheduler::rejecting(), None);
    let report = controller.publish(Envelope::new("n1", "n1", links(3)));
    assert_eq!(report.local.dropped, 1);
    assert_eq!(report.masters.dropped, 1);
    assert_eq!(report.dropped(), 2);
}

#[test]
fn tcp_transport_disables_the_local_lane_and_unicasts_masters() {
    let config = Config {
        transport: TransportType::Tcp,
        masters_delivery: true,
        ..Config::default()
    };
    let outgoing = CollectingScheduler::new();
    let controller = ThroughputController::new(&config, "n1", outgoing.clone(), None);
    assert!(!controller.is_enabled(Lane::Local));

    controller.publish(Envelope::new("n1", "n1", links(1)));
    let sent = outgoing.taken();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].transport_type(), TransportType::UdpUnicast);
}
