//! Command-line and environment configuration

use cfddns_core::config::parse_duration;
use cfddns_core::{
    AgentConfig, Credentials, Error, FamilySetting, IpVersion, ResolverMode, Result,
};
use clap::Parser;

/// Log levels accepted by `--log-level`
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// No Debug derive: the struct holds the raw API key and token
#[derive(Parser)]
#[command(name = "cfddnsd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keep a Cloudflare A/AAAA record pointed at this host")]
pub struct Args {
    /// Cloudflare global API key (requires --email)
    #[arg(long, env = "CF_API_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Cloudflare API token, used when no key is given
    #[arg(long, env = "CF_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Cloudflare account email
    #[arg(long, env = "CF_API_EMAIL")]
    pub email: Option<String>,

    /// Zone name, like example.com
    #[arg(long, default_value = "")]
    pub zone: String,

    /// Hostname to update, like www without example.com
    #[arg(long, default_value = "")]
    pub name: String,

    /// IPv4 address to publish; empty probes the system, "no" skips IPv4
    #[arg(long, default_value = "")]
    pub ipv4: String,

    /// IPv6 address to publish; empty probes the system, "no" skips IPv6
    #[arg(long, default_value = "")]
    pub ipv6: String,

    /// Interval between checks (minimum 30s)
    #[arg(long, default_value = "1m")]
    pub duration: String,

    /// DNS servers checked before contacting the provider; empty uses the system resolver
    #[arg(long, default_value = "")]
    pub resolver: String,

    /// Always list records through the provider API
    #[arg(long)]
    pub no_fast_path: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "CFDDNS_LOG_LEVEL")]
    pub log_level: String,
}

impl Args {
    /// Validate the raw inputs into the agent configuration and credentials
    pub fn settings(&self) -> Result<(AgentConfig, Credentials)> {
        let credentials = Credentials::from_parts(
            self.key.as_deref(),
            self.token.as_deref(),
            self.email.as_deref(),
        )?;

        if self.zone.trim().is_empty() || self.name.trim().is_empty() {
            return Err(Error::config("zone or name not specified"));
        }

        let config = AgentConfig::new(self.zone.trim(), self.name.trim())
            .with_interval(parse_duration(&self.duration)?)
            .with_family(IpVersion::V4, FamilySetting::parse(&self.ipv4, IpVersion::V4)?)
            .with_family(IpVersion::V6, FamilySetting::parse(&self.ipv6, IpVersion::V6)?)
            .with_resolver(ResolverMode::from_list(&self.resolver)?)
            .with_fast_path(!self.no_fast_path);

        config.validate()?;

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "log level '{}' is not valid. Valid levels: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            )));
        }

        Ok((config, credentials))
    }
}
