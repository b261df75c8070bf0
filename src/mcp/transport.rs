//! Transport configuration for tool-providing servers.

use std::collections::{BTreeMap, HashMap};

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::VoxError;

/// How to reach one tool-providing server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Spawn a local process and speak over its stdin/stdout.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        /// Extra variables layered over the inherited environment.
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// Streamable HTTP endpoint.
    #[serde(alias = "sse", alias = "streamable_http")]
    Http {
        url: String,
        /// Sent verbatim on every request, `Authorization` included.
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl TransportConfig {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self::Stdio {
            command: command.into(),
            args,
            env: BTreeMap::new(),
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self::Http {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::Http { .. } => "http",
        }
    }

    pub fn validate(&self, server: &str) -> Result<(), VoxError> {
        match self {
            Self::Stdio { command, .. } if command.trim().is_empty() => Err(
                VoxError::Configuration(format!("server '{server}': stdio transport needs a command")),
            ),
            Self::Http { url, .. } if url.trim().is_empty() => Err(VoxError::Configuration(
                format!("server '{server}': http transport needs a url"),
            )),
            Self::Http { headers, .. } => http_headers(headers).map(|_| ()).map_err(|e| match e {
                VoxError::Configuration(message) => {
                    VoxError::Configuration(format!("server '{server}': {message}"))
                }
                other => other,
            }),
            _ => Ok(()),
        }
    }
}

/// Set by the transport itself on every request.
const RESERVED_HEADERS: [&str; 4] = [
    "accept",
    "mcp-session-id",
    "mcp-protocol-version",
    "last-event-id",
];

/// Convert configured headers into the typed map the HTTP transport sends.
pub fn http_headers(
    headers: &BTreeMap<String, String>,
) -> Result<HashMap<HeaderName, HeaderValue>, VoxError> {
    headers
        .iter()
        .map(|(name, value)| {
            let header = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|_| VoxError::Configuration(format!("invalid header name '{name}'")))?;
            if RESERVED_HEADERS.contains(&header.as_str()) {
                return Err(VoxError::Configuration(format!(
                    "header '{name}' is managed by the transport"
                )));
            }
            let value = HeaderValue::from_str(value)
                .map_err(|_| VoxError::Configuration(format!("invalid value for header '{name}'")))?;
            Ok((header, value))
        })
        .collect()
}

#[cfg(feature = "mcp")]
pub use connect::MCPRunningService;

#[cfg(feature = "mcp")]
mod connect {
    use rmcp::model::ClientInfo;
    use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceExt};
    use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
    use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
    use tokio::process::Command;

    use super::{http_headers, TransportConfig};

    pub type DynClientService = Box<dyn DynService<RoleClient>>;
    pub type MCPRunningService = RunningService<RoleClient, DynClientService>;

    impl TransportConfig {
        /// Open the channel and run the initialize handshake.
        pub async fn connect(
            &self,
            client_info: ClientInfo,
        ) -> Result<MCPRunningService, ClientInitializeError> {
            match self {
                Self::Stdio { command, args, env } => {
                    let mut cmd = Command::new(command);
                    cmd.args(args).envs(env);
                    let transport = TokioChildProcess::new(cmd).map_err(|error| {
                        ClientInitializeError::transport::<TokioChildProcess>(
                            error,
                            "spawn stdio transport",
                        )
                    })?;
                    client_info.into_dyn().serve(transport).await
                }
                Self::Http { url, headers } => {
                    let headers = http_headers(headers)
                        .map_err(|e| ClientInitializeError::ConnectionClosed(e.to_string()))?;
                    let config = StreamableHttpClientTransportConfig::with_uri(url.clone())
                        .custom_headers(headers);
                    let transport = StreamableHttpClientTransport::from_config(config);
                    client_info.into_dyn().serve(transport).await
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_type_is_accepted_as_http() {
        let config: TransportConfig =
            serde_json::from_value(serde_json::json!({"type": "sse", "url": "http://x/mcp"}))
                .expect("sse alias should deserialize");
        assert_eq!(config, TransportConfig::http("http://x/mcp"));
    }

    #[test]
    fn stdio_defaults_args_and_env() {
        let config: TransportConfig =
            serde_json::from_value(serde_json::json!({"type": "stdio", "command": "node"}))
                .expect("stdio should deserialize");
        assert_eq!(config, TransportConfig::stdio("node", Vec::new()));
        assert_eq!(config.kind(), "stdio");
    }

    #[test]
    fn validate_rejects_blank_command_and_url() {
        assert!(TransportConfig::stdio(" ", Vec::new()).validate("a").is_err());
        assert!(TransportConfig::http("").validate("b").is_err());
        assert!(TransportConfig::http("http://x").validate("c").is_ok());
    }

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn every_configured_header_is_forwarded_verbatim() {
        let map = http_headers(&headers(&[
            ("Authorization", "Basic dXNlcjpwYXNz"),
            ("X-Api-Key", "k-123"),
            ("x-tenant", "kitchen"),
        ]))
        .expect("headers convert");

        assert_eq!(map.len(), 3);
        assert_eq!(map[&HeaderName::from_static("authorization")], "Basic dXNlcjpwYXNz");
        assert_eq!(map[&HeaderName::from_static("x-api-key")], "k-123");
        assert_eq!(map[&HeaderName::from_static("x-tenant")], "kitchen");
    }

    #[test]
    fn bad_or_reserved_headers_fail_validation() {
        let err = http_headers(&headers(&[("bad header", "v")])).expect_err("space in name");
        assert!(matches!(err, VoxError::Configuration(ref m) if m.contains("bad header")));

        let err = http_headers(&headers(&[("X-Note", "line\nbreak")])).expect_err("newline in value");
        assert!(matches!(err, VoxError::Configuration(ref m) if m.contains("X-Note")));

        let config = TransportConfig::Http {
            url: "http://x/mcp".into(),
            headers: headers(&[("Mcp-Session-Id", "s1")]),
        };
        let err = config.validate("home").expect_err("reserved header");
        assert!(matches!(err, VoxError::Configuration(ref m) if m.contains("home") && m.contains("Mcp-Session-Id")));
    }
}
