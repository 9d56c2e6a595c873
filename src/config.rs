/// Protocol generation this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server configuration, loadable from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name advertised in the `initialize` descriptor.
    pub server_name: String,
    /// Version advertised in the `initialize` descriptor.
    pub server_version: String,
    /// Protocol version string acknowledged during the handshake.
    pub protocol_version: String,
    /// When set, tool arguments are additionally validated against the full
    /// resolved JSON Schema, not just the required-keys check.
    pub strict_arguments: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: env!("CARGO_PKG_NAME").to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            strict_arguments: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment.
    ///
    /// - `MCP_SERVER_NAME` (optional) — advertised server name
    /// - `MCP_SERVER_VERSION` (optional) — advertised server version
    /// - `MCP_STRICT_ARGUMENTS` (optional, default false) — full-schema
    ///   argument validation on tool calls
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server_name = name;
        }
        if let Ok(version) = std::env::var("MCP_SERVER_VERSION") {
            config.server_version = version;
        }
        if let Ok(strict) = std::env::var("MCP_STRICT_ARGUMENTS") {
            config.strict_arguments = match strict.as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => {
                    return Err("MCP_STRICT_ARGUMENTS must be one of 1/0/true/false".to_string());
                }
            };
        }

        Ok(config)
    }
}
