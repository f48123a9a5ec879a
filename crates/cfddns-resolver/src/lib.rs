// # DNS Resolvers
//
// Two strategies behind `cfddns_core::Resolver`:
//
// - `SystemResolver`: hickory configured from the host's resolver settings
//   (/etc/resolv.conf on Unix), so record types and negative answers are
//   reported the same way as in explicit mode
// - `ExplicitResolver`: an ordered list of DNS servers. Each query tries the
//   servers in order and stops at the first one that answers; a server that
//   errors or times out hands over to the next one.
//
// Use `build_resolver` to turn a `ResolverMode` into a shared resolver.

use async_trait::async_trait;
use cfddns_core::{Error, RecordType, Resolution, Resolver, ResolverMode, Result, ServerEndpoint};
use hickory_resolver::TokioResolver;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

mod lookup;
mod nameserver;

pub use nameserver::{HickoryNameServer, NameServer};

/// Per-server query timeout, also the bound of a system lookup
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the resolver selected by the configuration
///
/// # Errors
///
/// Returns a configuration error if the host resolver settings can not be
/// read (system mode) or the server list is empty (explicit mode).
pub fn build_resolver(mode: &ResolverMode) -> Result<Arc<dyn Resolver>> {
    match mode {
        ResolverMode::System => Ok(Arc::new(SystemResolver::new()?)),
        ResolverMode::Explicit(servers) => {
            let resolver = ExplicitResolver::from_endpoints(servers, DEFAULT_QUERY_TIMEOUT)?;
            Ok(Arc::new(resolver))
        }
    }
}

/// Platform resolver
pub struct SystemResolver {
    resolver: TokioResolver,
    timeout: Duration,
}

impl SystemResolver {
    /// Read the host resolver configuration
    pub fn new() -> Result<Self> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| Error::config(format!("read system resolver configuration: {}", e)))?
            .build();
        Ok(Self::with_resolver(resolver, DEFAULT_QUERY_TIMEOUT))
    }

    pub(crate) fn with_resolver(resolver: TokioResolver, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, fqdn: &str, record_type: RecordType) -> Result<Resolution> {
        tokio::time::timeout(
            self.timeout,
            lookup::first_address(&self.resolver, fqdn, record_type),
        )
        .await
        .map_err(|_| Error::resolution(format!("{} {}: i/o timeout", record_type, fqdn)))?
        .map_err(|e| Error::resolution(format!("{} {}: {}", record_type, fqdn, e)))
    }

    fn describe(&self) -> String {
        "system resolver".to_string()
    }
}

/// Ordered list of DNS servers with per-query fallback
///
/// Fallback is per query: the next query starts again from the first server.
pub struct ExplicitResolver {
    servers: Vec<Box<dyn NameServer>>,
}

impl ExplicitResolver {
    /// Create from already-built name servers
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `servers` is empty.
    pub fn new(servers: Vec<Box<dyn NameServer>>) -> Result<Self> {
        if servers.is_empty() {
            return Err(Error::config("explicit resolver needs at least one server"));
        }
        Ok(Self { servers })
    }

    /// One hickory-backed name server per endpoint, in order
    pub fn from_endpoints(endpoints: &[ServerEndpoint], timeout: Duration) -> Result<Self> {
        let servers = endpoints
            .iter()
            .map(|e| Box::new(HickoryNameServer::new(e.clone(), timeout)) as Box<dyn NameServer>)
            .collect();
        Self::new(servers)
    }
}

#[async_trait]
impl Resolver for ExplicitResolver {
    async fn resolve(&self, fqdn: &str, record_type: RecordType) -> Result<Resolution> {
        for server in &self.servers {
            match server.query(fqdn, record_type).await {
                Ok(resolution) => {
                    debug!(
                        "{} {} via {}: {:?}",
                        fqdn,
                        record_type,
                        server.endpoint(),
                        resolution
                    );
                    return Ok(resolution);
                }
                Err(e) => {
                    warn!("dns server {} failed for {}: {}", server.endpoint(), fqdn, e);
                }
            }
        }

        Err(Error::ResolverExhausted {
            fqdn: fqdn.to_string(),
            attempts: self.servers.len(),
        })
    }

    fn describe(&self) -> String {
        let endpoints: Vec<String> = self.servers.iter().map(|s| s.endpoint()).collect();
        format!("dns servers [{}]", endpoints.join(", "))
    }
}

/// Lazily resolved socket address of an endpoint
///
/// Hostname endpoints are looked up with the platform resolver on first use
/// so that a transient failure at startup does not abort the agent.
#[derive(Debug)]
pub(crate) struct EndpointAddr {
    endpoint: ServerEndpoint,
    addr: OnceCell<SocketAddr>,
}

impl EndpointAddr {
    pub(crate) fn new(endpoint: ServerEndpoint) -> Self {
        Self {
            endpoint,
            addr: OnceCell::new(),
        }
    }

    pub(crate) fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    pub(crate) async fn get(&self) -> Result<SocketAddr> {
        self.addr
            .get_or_try_init(|| async {
                if let Ok(ip) = self.endpoint.host.parse::<IpAddr>() {
                    return Ok::<_, Error>(SocketAddr::new(ip, self.endpoint.port));
                }
                tokio::net::lookup_host((self.endpoint.host.as_str(), self.endpoint.port))
                    .await
                    .map_err(|e| {
                        Error::resolution(format!("resolve dns server {}: {}", self.endpoint, e))
                    })?
                    .next()
                    .ok_or_else(|| {
                        Error::resolution(format!("dns server {} has no address", self.endpoint))
                    })
            })
            .await
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::test_server::{self, NXDOMAIN, Reply, SERVFAIL};
    use hickory_resolver::Resolver as HickoryResolver;
    use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
    use hickory_resolver::name_server::TokioConnectionProvider;
    use hickory_resolver::proto::xfer::Protocol;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    /// Name server with a canned answer that records every query
    struct FakeNameServer {
        name: &'static str,
        answer: std::result::Result<Resolution, &'static str>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl FakeNameServer {
        fn boxed(
            name: &'static str,
            answer: std::result::Result<Resolution, &'static str>,
            log: &Arc<Mutex<Vec<&'static str>>>,
        ) -> Box<dyn NameServer> {
            Box::new(Self {
                name,
                answer,
                log: log.clone(),
            })
        }
    }

    #[async_trait]
    impl NameServer for FakeNameServer {
        async fn query(&self, _fqdn: &str, _record_type: RecordType) -> Result<Resolution> {
            self.log.lock().unwrap().push(self.name);
            self.answer.map_err(Error::resolution)
        }

        fn endpoint(&self) -> String {
            self.name.to_string()
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn falls_back_to_the_next_server() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let resolver = ExplicitResolver::new(vec![
            FakeNameServer::boxed("s1", Err("i/o timeout"), &log),
            FakeNameServer::boxed("s2", Ok(Resolution::Address(ip("203.0.113.7"))), &log),
            FakeNameServer::boxed("s3", Ok(Resolution::Empty), &log),
        ])
        .unwrap();

        let answer = resolver.resolve("www.example.com", RecordType::A).await.unwrap();

        assert_eq!(answer, Resolution::Address(ip("203.0.113.7")));
        assert_eq!(*log.lock().unwrap(), vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn each_query_starts_from_the_first_server() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let resolver = ExplicitResolver::new(vec![
            FakeNameServer::boxed("s1", Err("refused"), &log),
            FakeNameServer::boxed("s2", Ok(Resolution::Empty), &log),
        ])
        .unwrap();

        resolver.resolve("www.example.com", RecordType::A).await.unwrap();
        resolver.resolve("www.example.com", RecordType::Aaaa).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["s1", "s2", "s1", "s2"]);
    }

    #[tokio::test]
    async fn empty_answer_stops_the_fallback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let resolver = ExplicitResolver::new(vec![
            FakeNameServer::boxed("s1", Ok(Resolution::Empty), &log),
            FakeNameServer::boxed("s2", Ok(Resolution::Address(ip("203.0.113.7"))), &log),
        ])
        .unwrap();

        let answer = resolver.resolve("www.example.com", RecordType::A).await.unwrap();

        assert_eq!(answer, Resolution::Empty);
        assert_eq!(*log.lock().unwrap(), vec!["s1"]);
    }

    #[tokio::test]
    async fn all_servers_failing_is_exhaustion() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let resolver = ExplicitResolver::new(vec![
            FakeNameServer::boxed("s1", Err("timeout"), &log),
            FakeNameServer::boxed("s2", Err("SERVFAIL"), &log),
        ])
        .unwrap();

        let err = resolver
            .resolve("www.example.com", RecordType::A)
            .await
            .unwrap_err();

        match err {
            Error::ResolverExhausted { fqdn, attempts } => {
                assert_eq!(fqdn, "www.example.com");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected ResolverExhausted, got {:?}", other),
        }
        assert!(!resolver
            .resolve("www.example.com", RecordType::A)
            .await
            .unwrap_err()
            .is_fatal());
    }

    #[test]
    fn empty_server_list_is_rejected() {
        assert!(ExplicitResolver::new(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn build_resolver_follows_the_mode() {
        // Hosts without resolver settings can only fail as a configuration error
        match build_resolver(&ResolverMode::System) {
            Ok(system) => assert_eq!(system.describe(), "system resolver"),
            Err(e) => assert!(e.is_fatal(), "unexpected error {:?}", e),
        }

        let mode = ResolverMode::from_list("1.1.1.1, [2606:4700:4700::1111]:5353").unwrap();
        let explicit = build_resolver(&mode).unwrap();
        assert_eq!(
            explicit.describe(),
            "dns servers [1.1.1.1:53, [2606:4700:4700::1111]:5353]"
        );
    }

    fn endpoint(addr: SocketAddr) -> ServerEndpoint {
        ServerEndpoint::new(addr.ip().to_string(), addr.port())
    }

    #[tokio::test]
    async fn servfail_server_hands_over_to_the_next() {
        let failing = test_server::spawn(Reply::Rcode(SERVFAIL)).await;
        let answering = test_server::spawn(Reply::A(Ipv4Addr::new(203, 0, 113, 7))).await;
        let resolver = ExplicitResolver::from_endpoints(
            &[endpoint(failing), endpoint(answering)],
            Duration::from_secs(2),
        )
        .unwrap();

        let answer = resolver.resolve("www.example.com", RecordType::A).await.unwrap();

        assert_eq!(answer, Resolution::Address(ip("203.0.113.7")));
    }

    #[tokio::test]
    async fn nxdomain_server_ends_the_fallback_as_empty() {
        let nxdomain = test_server::spawn(Reply::Rcode(NXDOMAIN)).await;
        let answering = test_server::spawn(Reply::A(Ipv4Addr::new(203, 0, 113, 7))).await;
        let resolver = ExplicitResolver::from_endpoints(
            &[endpoint(nxdomain), endpoint(answering)],
            Duration::from_secs(2),
        )
        .unwrap();

        let answer = resolver.resolve("missing.example.com", RecordType::A).await.unwrap();

        assert_eq!(answer, Resolution::Empty);
    }

    fn system_resolver_using(addr: SocketAddr) -> SystemResolver {
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));
        let mut opts = ResolverOpts::default();
        opts.attempts = 1;
        opts.cache_size = 0;
        let resolver = HickoryResolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build();
        SystemResolver::with_resolver(resolver, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn system_resolver_reports_nonexistent_names_as_empty() {
        let addr = test_server::spawn(Reply::Rcode(NXDOMAIN)).await;

        let answer = system_resolver_using(addr)
            .resolve("missing.example.com", RecordType::A)
            .await;

        assert!(matches!(answer, Ok(Resolution::Empty)), "{:?}", answer);
    }

    #[tokio::test]
    async fn system_resolver_reports_servfail_as_an_error() {
        let addr = test_server::spawn(Reply::Rcode(SERVFAIL)).await;

        let answer = system_resolver_using(addr)
            .resolve("www.example.com", RecordType::A)
            .await;

        assert!(matches!(answer, Err(Error::Resolution(_))), "{:?}", answer);
    }

    #[tokio::test]
    async fn ip_literal_endpoints_need_no_lookup() {
        let addr = EndpointAddr::new(ServerEndpoint::new("2606:4700:4700::1111", 53));
        assert_eq!(
            addr.get().await.unwrap(),
            "[2606:4700:4700::1111]:53".parse::<SocketAddr>().unwrap()
        );
    }
}
