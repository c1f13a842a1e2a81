//! Size-driven splitting of oversized envelopes.
//!
//! Sizes are tracked incrementally against the compact JSON encoding: the
//! envelope with empty collections is the fixed overhead, every element adds
//! its own encoded length plus one separator byte when it is not the first in
//! its collection. A fragment's running size therefore equals its real
//! `serialized_size`.

use crate::domains::envelope::encoded_len;
use crate::domains::{Envelope, Link, Payload, Topology};
use crate::error::Result;

/// Splits `envelope` into fragments that each fit in `mtu` bytes.
///
/// Envelopes that already fit, and payload kinds without a split policy, come
/// back unchanged as a single fragment.
pub fn split(envelope: &Envelope, mtu: usize) -> Result<Vec<Envelope>> {
    if envelope.serialized_size()? <= mtu {
        return Ok(vec![envelope.clone()]);
    }
    let fragments = match envelope.payload() {
        Payload::Link(links) => split_links(envelope, links, mtu)?,
        Payload::Topology(topology) => split_topology(envelope, topology, mtu)?,
        Payload::Group(_) | Payload::Info(_) | Payload::Empty => Vec::new(),
    };
    if fragments.is_empty() {
        return Ok(vec![envelope.clone()]);
    }
    Ok(fragments)
}

fn split_links(envelope: &Envelope, links: &[Link], mtu: usize) -> Result<Vec<Envelope>> {
    let base = envelope
        .with_payload(Payload::Link(Vec::new()))
        .serialized_size()?;
    let mut fragments = Vec::new();
    let mut batch: Vec<Link> = Vec::new();
    let mut used = base;

    for link in links {
        let len = encoded_len(link)?;
        let mut cost = len + usize::from(!batch.is_empty());
        if !batch.is_empty() && used + cost > mtu {
            fragments.push(envelope.with_payload(Payload::Link(std::mem::take(&mut batch))));
            used = base;
            cost = len;
        }
        batch.push(link.clone());
        used += cost;
    }
    if !batch.is_empty() {
        fragments.push(envelope.with_payload(Payload::Link(batch)));
    }
    Ok(fragments)
}

#[derive(Clone, Copy)]
enum Side {
    Internal,
    External,
}

fn side_mut(topology: &mut Topology, side: Side) -> &mut crate::domains::HostMap {
    match side {
        Side::Internal => &mut topology.internals,
        Side::External => &mut topology.externals,
    }
}

fn split_topology(envelope: &Envelope, topology: &Topology, mtu: usize) -> Result<Vec<Envelope>> {
    let base = envelope
        .with_payload(Payload::Topology(topology.shell()))
        .serialized_size()?;
    let entries = topology
        .internals
        .iter()
        .map(|(ip, host)| (Side::Internal, ip, host))
        .chain(
            topology
                .externals
                .iter()
                .map(|(ip, host)| (Side::External, ip, host)),
        );

    let mut fragments = Vec::new();
    let mut builder = topology.shell();
    let mut used = base;

    for (side, ip, host) in entries {
        // "ip":{...}
        let len = encoded_len(ip)? + 1 + encoded_len(host)?;
        let mut cost = len + usize::from(!side_mut(&mut builder, side).is_empty());
        if builder.host_count() > 0 && used + cost > mtu {
            let full = std::mem::replace(&mut builder, topology.shell());
            fragments.push(envelope.with_payload(Payload::Topology(full)));
            used = base;
            cost = len;
        }
        side_mut(&mut builder, side).insert(ip.clone(), host.clone());
        used += cost;
    }

    builder.local_gws = topology.local_gws.clone();
    builder.remote_gws = topology.remote_gws.clone();
    fragments.push(envelope.with_payload(Payload::Topology(builder)));
    Ok(fragments)
}
