use std::fmt;
use std::time::Duration;

use crate::address::EngineAddress;
use crate::error::Result;

/// Environment variable naming the engine address.
pub const ENV_HOST: &str = "DOCKER_HOST";
/// Environment variable pinning the engine API version.
pub const ENV_API_VERSION: &str = "DOCKER_API_VERSION";

/// Default connect timeout for engine dials.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one engine client.
///
/// Built explicitly, or populated from the process environment through
/// [`EngineConfig::from_env`].
#[derive(Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Engine socket address.
    pub address: EngineAddress,
    /// API version prefix (e.g. `1.43`), `None` for the engine default.
    pub api_version: Option<String>,
    /// Timeout for establishing the socket connection.
    pub connect_timeout: Duration,
    /// Read timeout applied to streams after connect. `None` blocks forever.
    pub read_timeout: Option<Duration>,
    /// Opaque registry credential blob forwarded as-is.
    /// Never logged; redacted in debug output.
    pub registry_auth: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: EngineAddress::default(),
            api_version: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            registry_auth: None,
        }
    }
}

impl EngineConfig {
    /// Populate from `DOCKER_HOST` and `DOCKER_API_VERSION`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Populate from an arbitrary variable lookup.
    ///
    /// Unset or blank variables leave the default in place.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(host) = non_blank(ENV_HOST) {
            config.address = host.parse()?;
        }
        if let Some(version) = non_blank(ENV_API_VERSION) {
            config.api_version = Some(version.trim().trim_start_matches('v').to_string());
        }

        Ok(config)
    }

    /// Override the engine address.
    pub fn with_address(mut self, address: EngineAddress) -> Self {
        self.address = address;
        self
    }

    /// Attach an opaque registry credential blob.
    pub fn with_registry_auth(mut self, auth: impl Into<String>) -> Self {
        self.registry_auth = Some(auth.into());
        self
    }

    /// Prefix an API path with the configured version, if any.
    pub fn versioned_path(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        match &self.api_version {
            Some(version) => format!("/v{version}{path}"),
            None => path,
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("EngineConfig");
        dbg.field("address", &self.address)
            .field("api_version", &self.api_version)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout);
        if let Some(auth) = &self.registry_auth {
            dbg.field(
                "registry_auth",
                &format_args!("<redacted:{} bytes>", auth.len()),
            );
        } else {
            dbg.field("registry_auth", &Option::<String>::None);
        }
        dbg.finish()
    }
}
