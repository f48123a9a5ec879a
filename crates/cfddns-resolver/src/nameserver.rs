//! Single DNS server backends for the explicit resolver

use async_trait::async_trait;
use cfddns_core::{Error, RecordType, Resolution, Result, ServerEndpoint};
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::EndpointAddr;
use crate::lookup::first_address;

/// One DNS server queried without internal fallback
///
/// # Trust Level: Untrusted
///
/// Answers come from the network and are only used as a hint. An
/// implementation must bound every query with a timeout and must not retry;
/// the explicit resolver moves on to the next server instead.
#[async_trait]
pub trait NameServer: Send + Sync {
    /// Query this server only
    ///
    /// A name without records of `record_type` (NOERROR without answers or
    /// NXDOMAIN) is `Ok(Resolution::Empty)`. SERVFAIL, REFUSED, timeouts and
    /// transport errors are `Err`.
    async fn query(&self, fqdn: &str, record_type: RecordType) -> Result<Resolution>;

    /// Endpoint for logging
    fn endpoint(&self) -> String;
}

/// UDP name server backed by hickory-resolver
pub struct HickoryNameServer {
    addr: EndpointAddr,
    timeout: Duration,
    resolver: OnceCell<TokioResolver>,
}

impl HickoryNameServer {
    pub fn new(endpoint: ServerEndpoint, timeout: Duration) -> Self {
        Self {
            addr: EndpointAddr::new(endpoint),
            timeout,
            resolver: OnceCell::new(),
        }
    }

    async fn resolver(&self) -> Result<&TokioResolver> {
        self.resolver
            .get_or_try_init(|| async {
                let addr = self.addr.get().await?;

                let mut config = ResolverConfig::new();
                config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));

                let mut opts = ResolverOpts::default();
                opts.timeout = self.timeout;
                opts.attempts = 1;
                // Every tick must see the live answer
                opts.cache_size = 0;

                let resolver =
                    Resolver::builder_with_config(config, TokioConnectionProvider::default())
                        .with_options(opts)
                        .build();
                Ok::<_, Error>(resolver)
            })
            .await
    }
}

#[async_trait]
impl NameServer for HickoryNameServer {
    async fn query(&self, fqdn: &str, record_type: RecordType) -> Result<Resolution> {
        // One bound for the whole attempt, including a hostname endpoint's lookup
        let attempt = async {
            let resolver = self.resolver().await?;
            let resolution = first_address(resolver, fqdn, record_type)
                .await
                .map_err(|e| {
                    Error::resolution(format!(
                        "{} {} via {}: {}",
                        record_type,
                        fqdn,
                        self.addr.endpoint(),
                        e
                    ))
                })?;
            Ok::<_, Error>(resolution)
        };

        tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| {
                Error::resolution(format!(
                    "{} {} via {}: i/o timeout",
                    record_type,
                    fqdn,
                    self.addr.endpoint()
                ))
            })?
    }

    fn endpoint(&self) -> String {
        self.addr.endpoint().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::test_server::{self, NOERROR, NXDOMAIN, REFUSED, Reply, SERVFAIL};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

    fn name_server(addr: SocketAddr, timeout: Duration) -> HickoryNameServer {
        HickoryNameServer::new(
            ServerEndpoint::new(addr.ip().to_string(), addr.port()),
            timeout,
        )
    }

    #[test]
    fn endpoint_is_displayed_as_configured() {
        let ns = HickoryNameServer::new(
            ServerEndpoint::new("2606:4700:4700::1111", 53),
            Duration::from_secs(10),
        );
        assert_eq!(ns.endpoint(), "[2606:4700:4700::1111]:53");
    }

    #[tokio::test]
    async fn answer_is_returned() {
        let addr = test_server::spawn(Reply::A(Ipv4Addr::new(203, 0, 113, 7))).await;
        let ns = name_server(addr, Duration::from_secs(2));

        let answer = ns.query("www.example.com", RecordType::A).await.unwrap();

        assert_eq!(answer, Resolution::Address(IpAddr::from([203, 0, 113, 7])));
    }

    #[tokio::test]
    async fn nxdomain_and_nodata_are_empty() {
        for rcode in [NXDOMAIN, NOERROR] {
            let addr = test_server::spawn(Reply::Rcode(rcode)).await;
            let ns = name_server(addr, Duration::from_secs(2));

            let answer = ns.query("www.example.com", RecordType::A).await;

            assert!(
                matches!(answer, Ok(Resolution::Empty)),
                "rcode {}: {:?}",
                rcode,
                answer
            );
        }
    }

    #[tokio::test]
    async fn servfail_and_refused_are_errors() {
        for rcode in [SERVFAIL, REFUSED] {
            let addr = test_server::spawn(Reply::Rcode(rcode)).await;
            let ns = name_server(addr, Duration::from_secs(2));

            let answer = ns.query("www.example.com", RecordType::A).await;

            assert!(
                matches!(answer, Err(Error::Resolution(_))),
                "rcode {}: {:?}",
                rcode,
                answer
            );
        }
    }

    #[tokio::test]
    async fn silent_server_times_out_as_an_error() {
        // Bound but never answers
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let ns = name_server(silent.local_addr().unwrap(), Duration::from_millis(200));

        let result = ns.query("www.example.com", RecordType::A).await;

        assert!(result.is_err(), "expected a timeout, got {:?}", result);
        assert!(!result.unwrap_err().is_fatal());
    }
}
