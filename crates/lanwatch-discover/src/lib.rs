//! lanwatch-discover: Chunked LAN host discovery.
//!
//! Resolves target subnets from local interfaces and custom ranges, walks
//! them in fixed-size address chunks, probes each chunk for live hosts,
//! and enriches every live host with its MAC address, reverse-DNS name,
//! and hardware vendor. Results are pulled one batch at a time from a
//! [`session::DiscoverySession`] and stored per scan run.

pub mod chunker;
pub mod config;
pub mod error;
pub mod names;
pub mod neighbor;
pub mod persist;
pub mod probe;
pub mod scheduler;
pub mod session;
pub mod targets;
pub mod vendor;
