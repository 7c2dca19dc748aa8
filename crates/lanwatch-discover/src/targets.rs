//! Target subnet resolution.
//!
//! Combines the networks of local interfaces (minus any excluded
//! interfaces) with user-supplied expressions, then drops every subnet
//! that another target already covers.

use std::net::Ipv4Addr;

use ipnet::{Ipv4Net, Ipv4Subnets};
use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};

use crate::error::{DiscoverError, Result};

/// An IPv4 network attached to a named local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceNetwork {
    pub name: String,
    pub network: Ipv4Net,
}

/// Source of local interface networks.
pub trait InterfaceSource: Send + Sync {
    fn ipv4_networks(&self) -> Result<Vec<InterfaceNetwork>>;
}

/// Reads interfaces from the operating system.
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn ipv4_networks(&self) -> Result<Vec<InterfaceNetwork>> {
        let interfaces =
            NetworkInterface::show().map_err(|e| DiscoverError::Interfaces(e.to_string()))?;

        let mut networks = Vec::new();
        for iface in interfaces {
            for addr in &iface.addr {
                let Addr::V4(v4) = addr else { continue };
                let Some(netmask) = v4.netmask else { continue };

                let network = ipnet::ipv4_mask_to_prefix(netmask)
                    .ok()
                    .and_then(|prefix| Ipv4Net::new(v4.ip, prefix).ok());
                match network {
                    Some(net) => networks.push(InterfaceNetwork {
                        name: iface.name.clone(),
                        network: net.trunc(),
                    }),
                    None => tracing::warn!(
                        interface = %iface.name,
                        ip = %v4.ip,
                        netmask = %netmask,
                        "Skipping address with non-contiguous netmask"
                    ),
                }
            }
        }

        Ok(networks)
    }
}

/// Build the target subnet list for a discovery session.
///
/// - neither list given: every interface network
/// - only `exclude`: every interface network not on an excluded interface
/// - only `subs`: the parsed expressions
/// - both: the union of the two
///
/// Loopback networks are never taken from interfaces; name them in `subs`
/// to scan them.
///
/// Empty lists count as absent. Returns [`DiscoverError::NoUsableTarget`]
/// when nothing is left to scan.
pub fn resolve_targets(
    exclude: Option<&[String]>,
    subs: Option<&[String]>,
    interfaces: &dyn InterfaceSource,
) -> Result<Vec<Ipv4Net>> {
    let exclude = exclude.filter(|e| !e.is_empty());
    let subs = subs.filter(|s| !s.is_empty());

    let mut candidates = Vec::new();

    if subs.is_none() || exclude.is_some() {
        candidates.extend(interface_subnets(interfaces, exclude.unwrap_or_default()));
    }

    if let Some(subs) = subs {
        for expr in subs {
            candidates.extend(parse_target(expr)?);
        }
    }

    let targets = remove_redundant(candidates);
    if targets.is_empty() {
        return Err(DiscoverError::NoUsableTarget);
    }

    tracing::info!(
        count = targets.len(),
        targets = ?targets.iter().map(ToString::to_string).collect::<Vec<_>>(),
        "Resolved target subnets"
    );

    Ok(targets)
}

fn interface_subnets(interfaces: &dyn InterfaceSource, exclude: &[String]) -> Vec<Ipv4Net> {
    let networks = match interfaces.ipv4_networks() {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "No network interfaces found");
            return Vec::new();
        }
    };

    for name in exclude {
        if !networks.iter().any(|n| &n.name == name) {
            tracing::warn!(interface = %name, "Excluded interface has no IPv4 network");
        }
    }
    tracing::debug!(excluded = ?exclude, "Collecting interface networks");

    networks
        .into_iter()
        .filter(|n| !exclude.contains(&n.name))
        .filter(|n| {
            let loopback = n.network.network().is_loopback();
            if loopback {
                tracing::debug!(interface = %n.name, network = %n.network, "Skipping loopback network");
            }
            !loopback
        })
        .map(|n| n.network)
        .collect()
}

/// Parse one target expression into subnets.
///
/// Accepts CIDR (`10.0.0.7/24`, host bits dropped), dotted ranges where
/// any octet may be `lo-hi` (`192.168.2-3.1-100`), or a bare address.
/// A dotted range covers every address from the all-low-bounds address
/// to the all-high-bounds address, summarized into the fewest CIDR blocks.
pub fn parse_target(expr: &str) -> Result<Vec<Ipv4Net>> {
    let expr = expr.trim();

    if expr.contains('/') {
        let net: Ipv4Net = expr
            .parse()
            .map_err(|e: ipnet::AddrParseError| DiscoverError::invalid_target(expr, e.to_string()))?;
        Ok(vec![net.trunc()])
    } else if expr.contains('-') {
        let (first, last) = parse_octet_range(expr)?;
        Ok(Ipv4Subnets::new(first, last, 0).collect())
    } else {
        let addr: Ipv4Addr = expr
            .parse()
            .map_err(|e: std::net::AddrParseError| DiscoverError::invalid_target(expr, e.to_string()))?;
        let net = Ipv4Net::new(addr, 32)
            .map_err(|e| DiscoverError::invalid_target(expr, e.to_string()))?;
        Ok(vec![net])
    }
}

fn parse_octet_range(expr: &str) -> Result<(Ipv4Addr, Ipv4Addr)> {
    let parts: Vec<&str> = expr.split('.').collect();
    if parts.len() != 4 {
        return Err(DiscoverError::invalid_target(
            expr,
            format!("expected 4 octets, found {}", parts.len()),
        ));
    }

    let mut low = [0u8; 4];
    let mut high = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        let (lo, hi) = match part.split_once('-') {
            Some((a, b)) => (parse_octet(expr, a)?, parse_octet(expr, b)?),
            None => {
                let v = parse_octet(expr, part)?;
                (v, v)
            }
        };
        if lo > hi {
            return Err(DiscoverError::invalid_target(
                expr,
                format!("octet range {lo}-{hi} is reversed"),
            ));
        }
        low[i] = lo;
        high[i] = hi;
    }

    Ok((Ipv4Addr::from(low), Ipv4Addr::from(high)))
}

fn parse_octet(expr: &str, s: &str) -> Result<u8> {
    s.trim()
        .parse::<u8>()
        .map_err(|_| DiscoverError::invalid_target(expr, format!("'{s}' is not an octet (0-255)")))
}

/// Drop duplicates and every subnet contained in another candidate.
///
/// Containment is evaluated against the complete candidate list before
/// anything is removed, so the result does not depend on the order in
/// which redundant entries are found. Survivors keep their input order.
pub fn remove_redundant(candidates: Vec<Ipv4Net>) -> Vec<Ipv4Net> {
    let mut unique: Vec<Ipv4Net> = Vec::with_capacity(candidates.len());
    for net in candidates.into_iter().map(|n| n.trunc()) {
        if !unique.contains(&net) {
            unique.push(net);
        }
    }

    let covered: Vec<bool> = unique
        .iter()
        .map(|net| {
            unique
                .iter()
                .any(|other| other != net && other.contains(net))
        })
        .collect();

    unique
        .into_iter()
        .zip(covered)
        .filter_map(|(net, covered)| (!covered).then_some(net))
        .collect()
}
