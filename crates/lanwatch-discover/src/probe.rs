//! ICMP echo reachability probing.
//!
//! One echo request per address, each with its own timeout, with at most
//! `concurrency` requests in flight. An address that does not answer in
//! time is reported as down; hosts that filter echo are invisible here.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use surge_ping::{Client, Config, PingIdentifier, PingSequence};

use crate::config::DiscoverConfig;
use crate::error::{DiscoverError, Result};

const PAYLOAD: [u8; 56] = [0; 56];

/// Tests a batch of addresses for liveness.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// The addresses of `batch` that answered, in `batch` order.
    async fn alive(&self, batch: &[Ipv4Addr]) -> Result<Vec<Ipv4Addr>>;
}

/// Echo-request prober backed by `surge-ping`.
pub struct IcmpProbe {
    timeout: Duration,
    retries: u32,
    concurrency: usize,
}

impl IcmpProbe {
    pub fn new(timeout: Duration, concurrency: usize) -> Self {
        Self {
            timeout,
            retries: 0,
            concurrency: concurrency.max(1),
        }
    }

    /// Send up to `retries` more echoes to an address that timed out.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn from_config(config: &DiscoverConfig) -> Self {
        Self::new(config.probe_timeout(), config.max_concurrent_probes)
            .with_retries(config.probe_retries)
    }

    async fn echo(&self, client: &Client, ip: Ipv4Addr, ident: u16) -> bool {
        let mut pinger = client.pinger(IpAddr::V4(ip), PingIdentifier(ident)).await;
        pinger.timeout(self.timeout);

        for attempt in 0..=self.retries {
            match pinger.ping(PingSequence(attempt as u16), &PAYLOAD).await {
                Ok((_, rtt)) => {
                    tracing::trace!(ip = %ip, rtt_us = rtt.as_micros() as u64, "Echo reply");
                    return true;
                }
                Err(e) => tracing::trace!(ip = %ip, attempt, error = %e, "No echo reply"),
            }
        }

        false
    }
}

#[async_trait]
impl ReachabilityProbe for IcmpProbe {
    async fn alive(&self, batch: &[Ipv4Addr]) -> Result<Vec<Ipv4Addr>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let client = Client::new(&Config::default())
            .map_err(|e| DiscoverError::Probe(format!("cannot open ICMP socket: {e}")))?;
        let client = &client;

        Ok(sweep(batch, self.concurrency, move |i, ip| {
            self.echo(client, ip, i as u16)
        })
        .await)
    }
}

/// Run `echo` over `batch` with at most `concurrency` calls in flight and
/// keep the addresses that answered, in `batch` order.
async fn sweep<F, Fut>(batch: &[Ipv4Addr], concurrency: usize, echo: F) -> Vec<Ipv4Addr>
where
    F: Fn(usize, Ipv4Addr) -> Fut,
    Fut: Future<Output = bool>,
{
    let replies: Vec<bool> = stream::iter(batch.iter().copied().enumerate())
        .map(|(i, ip)| echo(i, ip))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    batch
        .iter()
        .zip(replies)
        .filter_map(|(&ip, up)| up.then_some(ip))
        .collect()
}
