use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use mcp_capability_server::capability::CapabilityBuilder;
use mcp_capability_server::config::ServerConfig;
use mcp_capability_server::dispatcher::Dispatcher;
use mcp_capability_server::error::ConfigError;
use mcp_capability_server::protocol::{PromptMessage, PromptResult, ToolResult};
use mcp_capability_server::server::StdioServer;

/// Demo registry: an echo tool and a summarize prompt.
fn demo_dispatcher(config: ServerConfig) -> Result<Dispatcher, ConfigError> {
    let echo = CapabilityBuilder::tool("echo", |args, _ctx| {
        let message = args.get("message").and_then(Value::as_str).unwrap_or_default();
        Ok(ToolResult::text(message))
    })
    .description("Echo a message back to the caller")
    .schema_json(json!({
        "properties": {
            "message": { "type": "string", "description": "Text to echo back" }
        },
        "required": ["message"]
    }))
    .build()?;

    let summarize = CapabilityBuilder::prompt("summarize", |args, _ctx| {
        let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
        Ok(PromptResult::new(vec![PromptMessage::new(
            "user",
            format!("Summarize the following text:\n\n{text}"),
        )]))
    })
    .description("Produce a summarization prompt for a block of text")
    .schema_json(json!({
        "properties": {
            "text": { "type": "string", "description": "Text to summarize" }
        },
        "required": ["text"]
    }))
    .build()?;

    Dispatcher::builder(config).tool(echo).prompt(summarize).build()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Logs go to stderr; stdout carries the protocol stream.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mcp-capability-server: configuration error: {e}");
            std::process::exit(1);
        }
    };

    let dispatcher = match demo_dispatcher(config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("mcp-capability-server: invalid capability registry: {e}");
            std::process::exit(1);
        }
    };

    let mut server = StdioServer::new(dispatcher);
    if let Err(e) = server.run().await {
        eprintln!("mcp-capability-server: fatal error: {e}");
        std::process::exit(1);
    }
}
