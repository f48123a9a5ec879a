// # UDP Address Probe
//
// Discovers the local address the network stack would use to reach a public
// host, without sending any traffic.
//
// ## How it works
//
// Connecting a UDP socket only selects a route and a source address; no
// datagram is written. Reading the socket's local address back gives the
// outbound address for that family. Hosts behind NAT get their private
// address, which is what gets published.
//
// ## Targets
//
// - IPv4: `1.1.1.1:53`
// - IPv6: `[2606:4700:4700::1111]:53`
//
// A family with no route (no IPv6 connectivity, for example) is reported as
// `ProbeOutcome::NotAvailable` and skipped by the scheduler.

use async_trait::async_trait;
use cfddns_core::{AddressProbe, IpVersion, ProbeOutcome};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

/// Default IPv4 probe target
pub const DEFAULT_V4_TARGET: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 53);

/// Default IPv6 probe target
pub const DEFAULT_V6_TARGET: SocketAddr = SocketAddr::new(
    IpAddr::V6(Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111)),
    53,
);

/// Outbound address probe based on connected UDP sockets
#[derive(Debug, Clone)]
pub struct UdpAddressProbe {
    v4_target: SocketAddr,
    v6_target: SocketAddr,
}

impl UdpAddressProbe {
    pub fn new() -> Self {
        Self {
            v4_target: DEFAULT_V4_TARGET,
            v6_target: DEFAULT_V6_TARGET,
        }
    }

    /// Probe against custom targets
    ///
    /// Each target must belong to the family it is used for.
    pub fn with_targets(v4_target: SocketAddr, v6_target: SocketAddr) -> Self {
        Self {
            v4_target,
            v6_target,
        }
    }

    fn target(&self, version: IpVersion) -> SocketAddr {
        match version {
            IpVersion::V4 => self.v4_target,
            IpVersion::V6 => self.v6_target,
        }
    }
}

impl Default for UdpAddressProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressProbe for UdpAddressProbe {
    async fn probe(&self, version: IpVersion) -> ProbeOutcome {
        let target = self.target(version);
        if IpVersion::of(&target.ip()) != version {
            return ProbeOutcome::not_available(format!(
                "probe target {} is not an {} address",
                target, version
            ));
        }

        let bind: SocketAddr = match version {
            IpVersion::V4 => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpVersion::V6 => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = match UdpSocket::bind(bind).await {
            Ok(s) => s,
            Err(e) => return ProbeOutcome::not_available(format!("bind {}: {}", bind, e)),
        };

        if let Err(e) = socket.connect(target).await {
            debug!("{} route to {} unavailable: {}", version, target, e);
            return ProbeOutcome::not_available(format!("connect {}: {}", target, e));
        }

        match socket.local_addr() {
            Ok(local) if local.ip().is_unspecified() => {
                ProbeOutcome::not_available(format!("no source address for {}", target))
            }
            Ok(local) => {
                debug!("{} outbound address: {}", version, local.ip());
                ProbeOutcome::Address(local.ip())
            }
            Err(e) => ProbeOutcome::not_available(format!("local address: {}", e)),
        }
    }
}
