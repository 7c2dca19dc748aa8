//! Lazy, fixed-size batching of a subnet's host addresses.

use std::net::Ipv4Addr;

use ipnet::{Ipv4AddrRange, Ipv4Net};

/// Walks the usable host addresses of one subnet in ascending order,
/// handing them out `chunk_size` at a time.
///
/// Usable hosts exclude the network and broadcast addresses for prefixes
/// shorter than /31; a /31 yields both addresses and a /32 yields its
/// single address.
#[derive(Debug, Clone)]
pub struct AddressChunker {
    subnet: Ipv4Net,
    hosts: Ipv4AddrRange,
    chunk_size: usize,
}

impl AddressChunker {
    /// `chunk_size` must be positive; [`DiscoverConfig::validate`](crate::config::DiscoverConfig::validate)
    /// rejects zero before a session is built.
    pub fn new(subnet: Ipv4Net, chunk_size: usize) -> Self {
        Self {
            subnet,
            hosts: subnet.hosts(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn subnet(&self) -> Ipv4Net {
        self.subnet
    }

    /// The next batch of addresses, or `None` once the subnet is exhausted.
    pub fn next_chunk(&mut self) -> Option<Vec<Ipv4Addr>> {
        let chunk: Vec<Ipv4Addr> = self.hosts.by_ref().take(self.chunk_size).collect();
        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

impl Iterator for AddressChunker {
    type Item = Vec<Ipv4Addr>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk()
    }
}
