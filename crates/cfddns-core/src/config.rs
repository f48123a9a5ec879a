//! Configuration types for the cfddns agent
//!
//! All configuration is assembled once at startup into an immutable
//! [`AgentConfig`] and passed into the scheduler by value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::record::IpVersion;

/// Smallest accepted check interval
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Default check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Default first backoff delay after a failed tick
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(60);

/// Upper bound for the doubling backoff delay
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Default port for explicit DNS servers
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Sentinel that disables a family on the command line
pub const DISABLED_SENTINEL: &str = "no";

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Zone name, e.g. "example.com"
    pub zone: String,

    /// Relative hostname to keep updated, e.g. "www"
    pub hostname: String,

    /// IPv4 handling
    #[serde(default)]
    pub ipv4: FamilySetting,

    /// IPv6 handling
    #[serde(default)]
    pub ipv6: FamilySetting,

    /// Steady-state check interval
    #[serde(default = "default_interval")]
    pub interval: Duration,

    /// Retry policy after failed ticks
    #[serde(default)]
    pub backoff: BackoffPolicy,

    /// Resolver used for the staleness check
    #[serde(default)]
    pub resolver: ResolverMode,

    /// Consult the resolver before listing provider records
    #[serde(default = "default_fast_path")]
    pub fast_path: bool,
}

impl AgentConfig {
    /// Create a configuration with defaults for everything but zone and hostname
    pub fn new(zone: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            hostname: hostname.into(),
            ipv4: FamilySetting::default(),
            ipv6: FamilySetting::default(),
            interval: DEFAULT_CHECK_INTERVAL,
            backoff: BackoffPolicy::default(),
            resolver: ResolverMode::default(),
            fast_path: true,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_family(mut self, version: IpVersion, setting: FamilySetting) -> Self {
        match version {
            IpVersion::V4 => self.ipv4 = setting,
            IpVersion::V6 => self.ipv6 = setting,
        }
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverMode) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_fast_path(mut self, enabled: bool) -> Self {
        self.fast_path = enabled;
        self
    }

    /// Setting for one family
    pub fn family(&self, version: IpVersion) -> &FamilySetting {
        match version {
            IpVersion::V4 => &self.ipv4,
            IpVersion::V6 => &self.ipv6,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone.trim().is_empty() {
            return Err(crate::Error::config("zone not specified"));
        }

        if self.hostname.trim().is_empty() {
            return Err(crate::Error::config("hostname not specified"));
        }

        if self.interval < MIN_CHECK_INTERVAL {
            return Err(crate::Error::config(format!(
                "check interval can not be less than {}s, got {:?}",
                MIN_CHECK_INTERVAL.as_secs(),
                self.interval
            )));
        }

        if self.ipv4 == FamilySetting::Disabled && self.ipv6 == FamilySetting::Disabled {
            return Err(crate::Error::config(
                "both IPv4 and IPv6 updates are disabled, nothing to do",
            ));
        }

        for version in IpVersion::ALL {
            if let FamilySetting::Static(ip) = self.family(version)
                && IpVersion::of(ip) != version
            {
                return Err(crate::Error::config(format!(
                    "{} setting holds a non-{} address: {}",
                    version, version, ip
                )));
            }
        }

        self.backoff.validate()?;
        self.resolver.validate()?;

        Ok(())
    }
}

fn default_interval() -> Duration {
    DEFAULT_CHECK_INTERVAL
}

fn default_fast_path() -> bool {
    true
}

/// How one address family is handled each tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "address", rename_all = "snake_case")]
pub enum FamilySetting {
    /// Discover the outbound address with the address probe
    #[default]
    Probe,
    /// Never touch this family's record
    Disabled,
    /// Publish this fixed address
    Static(IpAddr),
}

impl FamilySetting {
    /// Parse a command-line value: empty → probe, "no" → disabled, else a literal address
    pub fn parse(value: &str, version: IpVersion) -> Result<Self, crate::Error> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(FamilySetting::Probe);
        }
        if value == DISABLED_SENTINEL {
            return Ok(FamilySetting::Disabled);
        }

        let ip: IpAddr = value.parse().map_err(|_| {
            crate::Error::config(format!(
                "invalid {} setting '{}': expected an address, empty, or \"{}\"",
                version, value, DISABLED_SENTINEL
            ))
        })?;

        if IpVersion::of(&ip) != version {
            return Err(crate::Error::config(format!(
                "{} setting holds a non-{} address: {}",
                version, version, ip
            )));
        }

        Ok(FamilySetting::Static(ip))
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, FamilySetting::Disabled)
    }
}

/// Backoff policy applied after failed ticks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// First retry delay
    pub initial: Duration,
    /// Cap for the doubling delay
    pub max: Duration,
    /// Return to `initial` once a tick fully succeeds
    pub reset_on_success: bool,
}

impl BackoffPolicy {
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    pub fn with_reset_on_success(mut self, reset: bool) -> Self {
        self.reset_on_success = reset;
        self
    }

    /// Delay following `current`
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.initial.is_zero() {
            return Err(crate::Error::config("initial backoff must be > 0"));
        }
        if self.max < self.initial {
            return Err(crate::Error::config(format!(
                "maximum backoff {:?} is below initial backoff {:?}",
                self.max, self.initial
            )));
        }
        Ok(())
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_BACKOFF,
            max: DEFAULT_MAX_BACKOFF,
            reset_on_success: true,
        }
    }
}

/// Resolver selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "servers", rename_all = "snake_case")]
pub enum ResolverMode {
    /// Platform resolver
    #[default]
    System,
    /// Ordered list of DNS servers, tried in order per query
    Explicit(Vec<ServerEndpoint>),
}

impl ResolverMode {
    /// Build from the `--resolver` value; empty means the system resolver
    pub fn from_list(list: &str) -> Result<Self, crate::Error> {
        let servers = parse_server_list(list)?;
        if servers.is_empty() {
            Ok(ResolverMode::System)
        } else {
            Ok(ResolverMode::Explicit(servers))
        }
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if let ResolverMode::Explicit(servers) = self
            && servers.is_empty()
        {
            return Err(crate::Error::config("explicit resolver list is empty"));
        }
        Ok(())
    }
}

/// One DNS server endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerEndpoint {
    /// IP literal or hostname (IPv6 without brackets)
    pub host: String,
    pub port: u16,
}

impl ServerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse "host", "host:port", "[v6]", "[v6]:port" or a bare IPv6 literal
    pub fn parse(entry: &str) -> Result<Self, crate::Error> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(crate::Error::config("empty resolver entry"));
        }

        let (host, port) = if let Some(rest) = entry.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                crate::Error::config(format!("unterminated '[' in resolver entry '{}'", entry))
            })?;
            match tail {
                "" => (host, None),
                _ => match tail.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => {
                        return Err(crate::Error::config(format!(
                            "unexpected text after ']' in resolver entry '{}'",
                            entry
                        )));
                    }
                },
            }
        } else if entry.matches(':').count() > 1 {
            // Bare IPv6 literal
            (entry, None)
        } else {
            match entry.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (entry, None),
            }
        };

        if host.is_empty() {
            return Err(crate::Error::config(format!(
                "missing host in resolver entry '{}'",
                entry
            )));
        }

        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|_| {
                crate::Error::config(format!("invalid port in resolver entry '{}'", entry))
            })?,
            None => DEFAULT_DNS_PORT,
        };

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Split a resolver list on commas, semicolons and whitespace
pub fn parse_server_list(list: &str) -> Result<Vec<ServerEndpoint>, crate::Error> {
    list.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(ServerEndpoint::parse)
        .collect()
}

/// Provider credentials
///
/// The Debug implementation never prints secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Global API key plus the account email
    ApiKey { key: String, email: String },
    /// Scoped API token
    Token(String),
}

impl Credentials {
    /// Pick a credential form from the raw inputs
    ///
    /// A key takes precedence over a token. A key without an email is rejected.
    pub fn from_parts(
        key: Option<&str>,
        token: Option<&str>,
        email: Option<&str>,
    ) -> Result<Self, crate::Error> {
        fn non_empty(s: Option<&str>) -> Option<&str> {
            s.map(str::trim).filter(|s| !s.is_empty())
        }

        match (non_empty(key), non_empty(token)) {
            (Some(key), _) => {
                let email = non_empty(email).ok_or_else(|| {
                    crate::Error::config("email can not be empty while key is used")
                })?;
                Ok(Credentials::ApiKey {
                    key: key.to_string(),
                    email: email.to_string(),
                })
            }
            (None, Some(token)) => Ok(Credentials::Token(token.to_string())),
            (None, None) => Err(crate::Error::config("key or token is empty")),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiKey { email, .. } => f
                .debug_struct("ApiKey")
                .field("key", &"<REDACTED>")
                .field("email", email)
                .finish(),
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<REDACTED>").finish(),
        }
    }
}

/// Parse a Go-style duration such as "90s", "1m", "1m30s", "2h" or "500ms"
pub fn parse_duration(input: &str) -> Result<Duration, crate::Error> {
    let input = input.trim();
    if input.is_empty() {
        return Err(crate::Error::config("duration string cannot be empty"));
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    let mut rest = input;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| {
                crate::Error::config(format!("missing unit in duration '{}'", input))
            })?;
        if digits_end == 0 {
            return Err(crate::Error::config(format!(
                "expected a number in duration '{}'",
                input
            )));
        }

        let (number, tail) = rest.split_at(digits_end);
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);

        let value: u64 = number.parse().map_err(|_| {
            crate::Error::config(format!("duration value too large in '{}'", input))
        })?;

        let part = match unit {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            other => {
                return Err(crate::Error::config(format!(
                    "unsupported duration unit '{}' in '{}' (use ms, s, m or h)",
                    other, input
                )));
            }
        }
        .ok_or_else(|| crate::Error::config(format!("duration '{}' overflows", input)))?;

        total = total
            .checked_add(part)
            .ok_or_else(|| crate::Error::config(format!("duration '{}' overflows", input)))?;
        rest = tail;
    }

    Ok(total)
}
