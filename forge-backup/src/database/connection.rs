//! `host[:port]` connection strings.

/// Host and optional port parsed from a forge `HOST` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    /// `None` means the client tool's default port
    pub port: Option<String>,
}

impl HostPort {
    /// Split on the first colon. A missing or empty port segment is not an error.
    pub fn parse(value: &str) -> Self {
        match value.split_once(':') {
            Some((host, port)) => Self {
                host: host.to_string(),
                port: Some(port.trim().to_string()).filter(|p| !p.is_empty()),
            },
            None => Self {
                host: value.to_string(),
                port: None,
            },
        }
    }

    /// `--host=` plus an optional `--port=` argument.
    pub fn host_arg(&self) -> String {
        format!("--host={}", self.host)
    }

    pub fn port_arg(&self) -> Option<String> {
        self.port.as_ref().map(|p| format!("--port={}", p))
    }
}
