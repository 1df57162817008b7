use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Default engine socket on Linux and macOS.
pub const DEFAULT_UNIX_SOCKET: &str = "/var/run/docker.sock";

/// Default plaintext engine port for `tcp://` addresses without a port.
pub const DEFAULT_TCP_PORT: u16 = 2375;

/// Where the container engine listens.
///
/// Accepted forms:
/// - `unix:///var/run/docker.sock` or a bare absolute path
/// - `tcp://host:port`, `http://host:port`, or a bare `host:port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAddress {
    /// Unix domain socket path.
    Unix(PathBuf),
    /// TCP host and port.
    Tcp { host: String, port: u16 },
}

impl EngineAddress {
    /// Unix socket address.
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Self::Unix(path.as_ref().to_path_buf())
    }

    /// TCP address.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Unix(_) => "unix-domain-socket",
            Self::Tcp { .. } => "tcp",
        }
    }

    fn parse_host_port(input: &str, original: &str) -> Result<Self> {
        let authority = input.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Err(TransportError::InvalidAddress(original.to_string()));
        }

        // `[::1]:2375` keeps its brackets so the pair stays resolvable.
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !port.contains(']') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| TransportError::InvalidAddress(original.to_string()))?;
                (host, port)
            }
            _ => (authority, DEFAULT_TCP_PORT),
        };

        Ok(Self::tcp(host, port))
    }
}

impl Default for EngineAddress {
    fn default() -> Self {
        Self::unix(DEFAULT_UNIX_SOCKET)
    }
}

impl FromStr for EngineAddress {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim();
        if input.is_empty() {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }

        if let Some(path) = input.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(TransportError::InvalidAddress(s.to_string()));
            }
            return Ok(Self::unix(path));
        }

        if let Some(rest) = input
            .strip_prefix("tcp://")
            .or_else(|| input.strip_prefix("http://"))
        {
            return Self::parse_host_port(rest, s);
        }

        if input.starts_with("npipe://") {
            return Err(TransportError::Unsupported(
                "named pipe engine addresses".to_string(),
            ));
        }

        if input.contains("://") {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }

        if input.starts_with('/') {
            return Ok(Self::unix(input));
        }

        Self::parse_host_port(input, s)
    }
}

impl fmt::Display for EngineAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_scheme() {
        let addr: EngineAddress = "unix:///var/run/docker.sock".parse().unwrap();
        assert_eq!(addr, EngineAddress::unix("/var/run/docker.sock"));
    }

    #[test]
    fn parses_bare_path() {
        let addr: EngineAddress = "/tmp/engine.sock".parse().unwrap();
        assert_eq!(addr, EngineAddress::unix("/tmp/engine.sock"));
    }

    #[test]
    fn parses_tcp_and_http_schemes() {
        let tcp: EngineAddress = "tcp://10.0.0.5:2376".parse().unwrap();
        assert_eq!(tcp, EngineAddress::tcp("10.0.0.5", 2376));

        let http: EngineAddress = "http://localhost:8080/".parse().unwrap();
        assert_eq!(http, EngineAddress::tcp("localhost", 8080));
    }

    #[test]
    fn tcp_without_port_uses_default() {
        let addr: EngineAddress = "tcp://engine.local".parse().unwrap();
        assert_eq!(addr, EngineAddress::tcp("engine.local", DEFAULT_TCP_PORT));
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let addr: EngineAddress = "tcp://[::1]:2375".parse().unwrap();
        assert_eq!(addr, EngineAddress::tcp("[::1]", 2375));

        let no_port: EngineAddress = "tcp://[::1]".parse().unwrap();
        assert_eq!(no_port, EngineAddress::tcp("[::1]", DEFAULT_TCP_PORT));
    }

    #[test]
    fn parses_bare_host_port() {
        let addr: EngineAddress = "127.0.0.1:2375".parse().unwrap();
        assert_eq!(addr, EngineAddress::tcp("127.0.0.1", 2375));
    }

    #[test]
    fn rejects_invalid_addresses() {
        assert!(matches!(
            "".parse::<EngineAddress>(),
            Err(TransportError::InvalidAddress(_))
        ));
        assert!(matches!(
            "unix://".parse::<EngineAddress>(),
            Err(TransportError::InvalidAddress(_))
        ));
        assert!(matches!(
            "ssh://user@host".parse::<EngineAddress>(),
            Err(TransportError::InvalidAddress(_))
        ));
        assert!(matches!(
            "tcp://host:notaport".parse::<EngineAddress>(),
            Err(TransportError::InvalidAddress(_))
        ));
        assert!(matches!(
            "npipe:////./pipe/docker_engine".parse::<EngineAddress>(),
            Err(TransportError::Unsupported(_))
        ));
    }

    #[test]
    fn display_roundtrips() {
        for input in ["unix:///var/run/docker.sock", "tcp://localhost:2375"] {
            let addr: EngineAddress = input.parse().unwrap();
            assert_eq!(addr.to_string(), input);
        }
    }

    #[test]
    fn default_is_engine_socket() {
        assert_eq!(
            EngineAddress::default(),
            EngineAddress::unix(DEFAULT_UNIX_SOCKET)
        );
    }
}
