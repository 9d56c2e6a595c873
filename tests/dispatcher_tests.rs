//! Dispatcher tests: method routing, two-phase invocation (resolve, validate,
//! invoke), and envelope construction.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use mcp_capability_server::capability::CapabilityBuilder;
use mcp_capability_server::config::ServerConfig;
use mcp_capability_server::dispatcher::Dispatcher;
use mcp_capability_server::error::DispatchError;
use mcp_capability_server::protocol::{
    JsonRpcRequest, PromptMessage, PromptResult, RpcId, ToolResult,
};

fn role_schema(ctx: Option<&Value>) -> Value {
    if ctx.and_then(|c| c["user"]["role"].as_str()) == Some("admin") {
        json!({
            "properties": {
                "action": { "type": "string" },
                "target": { "type": "string" }
            },
            "required": ["action", "target"]
        })
    } else {
        json!({
            "properties": { "action": { "type": "string" } },
            "required": ["action"]
        })
    }
}

/// Dispatcher with a counting tool, a role-dependent tool, and one prompt.
fn build_dispatcher(context: Option<Value>) -> (Dispatcher, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let run = CapabilityBuilder::tool("run", move |args, _ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        let action = args.get("action").and_then(Value::as_str).unwrap_or_default();
        Ok(ToolResult::text(format!("ran {action}")))
    })
    .description("Run an action")
    .schema_json(json!({
        "properties": { "action": { "type": "string" } },
        "required": ["action"]
    }))
    .build()
    .unwrap();

    let gated = CapabilityBuilder::tool("gated", |_args, _ctx| Ok(ToolResult::text("gated ok")))
        .schema_resolver(role_schema)
        .build()
        .unwrap();

    let failing = CapabilityBuilder::tool("failing", |_args, _ctx| {
        Err("disk on fire".into())
    })
    .build()
    .unwrap();

    let greet = CapabilityBuilder::prompt("greet", |args, _ctx| {
        let name = args.get("name").and_then(Value::as_str).unwrap_or("there");
        Ok(PromptResult::new(vec![PromptMessage::new(
            "user",
            format!("Say hello to {name}"),
        )])
        .with_description("greeting prompt"))
    })
    .schema_json(json!({
        "properties": { "name": { "type": "string" } },
        "required": ["name"]
    }))
    .build()
    .unwrap();

    let mut builder = Dispatcher::builder(ServerConfig::default())
        .tool(run)
        .tool(gated)
        .tool(failing)
        .prompt(greet);
    if let Some(ctx) = context {
        builder = builder.context(ctx);
    }

    (builder.build().unwrap(), calls)
}

fn request(id: i64, method: &str, params: Value) -> JsonRpcRequest {
    JsonRpcRequest::new(RpcId::Number(id), method, Some(params))
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[test]
fn tools_list_preserves_registration_order() {
    let (dispatcher, _) = build_dispatcher(None);

    let req = JsonRpcRequest::new(RpcId::Number(1), "tools/list", None);
    let response = dispatcher.handle(&req).unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();

    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["run", "gated", "failing"]);
}

#[test]
fn tools_list_resolves_schema_against_bound_context() {
    let (admin, _) = build_dispatcher(Some(json!({ "user": { "role": "admin" } })));
    let (user, _) = build_dispatcher(Some(json!({ "user": { "role": "user" } })));
    let (anonymous, _) = build_dispatcher(None);

    let req = JsonRpcRequest::new(RpcId::Number(1), "tools/list", None);

    let gated_schema = |dispatcher: &Dispatcher| {
        let response = dispatcher.handle(&req).unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        let gated = tools.iter().find(|t| t["name"] == "gated").unwrap();
        gated["inputSchema"]["required"].clone()
    };

    assert_eq!(gated_schema(&admin), json!(["action", "target"]));
    assert_eq!(gated_schema(&user), json!(["action"]));
    assert_eq!(gated_schema(&anonymous), json!(["action"]));
}

#[test]
fn listing_aborts_when_a_resolver_fails() {
    let broken = CapabilityBuilder::tool("broken", |_args, _ctx| Ok(ToolResult::text("ok")))
        .schema_resolver(|_ctx| json!(false))
        .build()
        .unwrap();
    let dispatcher = Dispatcher::builder(ServerConfig::default())
        .tool(broken)
        .build()
        .unwrap();

    assert!(dispatcher.list_tools(None).is_err());

    let req = JsonRpcRequest::new(RpcId::Number(1), "tools/list", None);
    let response = dispatcher.handle(&req).unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32603);
    assert!(error.message.contains("boolean"));
}

#[test]
fn prompts_list_advertises_argument_lists() {
    let (dispatcher, _) = build_dispatcher(None);

    let req = JsonRpcRequest::new(RpcId::Number(1), "prompts/list", None);
    let response = dispatcher.handle(&req).unwrap();
    let prompts = response.result.unwrap()["prompts"].as_array().unwrap().clone();

    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0]["name"], "greet");
    assert_eq!(prompts[0]["arguments"][0]["name"], "name");
    assert_eq!(prompts[0]["arguments"][0]["required"], json!(true));
}

// ---------------------------------------------------------------------------
// Tool invocation
// ---------------------------------------------------------------------------

#[test]
fn call_tool_success_envelope_carries_handler_result() {
    let (dispatcher, calls) = build_dispatcher(None);

    let req = request(2, "tools/call", json!({ "name": "run", "arguments": { "action": "build" } }));
    let response = dispatcher.handle(&req).unwrap();

    let result = response.result.unwrap();
    assert_eq!(result["content"][0]["text"], "ran build");
    assert!(result.get("isError").is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_required_argument_never_reaches_the_implementation() {
    let (dispatcher, calls) = build_dispatcher(None);

    let req = request(3, "tools/call", json!({ "name": "run", "arguments": {} }));
    let response = dispatcher.handle(&req).unwrap();

    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert!(error.message.contains("action"));
    let data = error.data.unwrap();
    assert_eq!(data["code"], "invalid_arguments");
    assert_eq!(data["missing"], json!(["action"]));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "implementation must not run");
}

#[test]
fn required_check_uses_the_context_resolved_schema() {
    let admin_ctx = json!({ "user": { "role": "admin" } });
    let (dispatcher, _) = build_dispatcher(Some(admin_ctx));

    // Satisfies the non-admin schema but not the admin one bound to this
    // dispatcher.
    let req = request(4, "tools/call", json!({ "name": "gated", "arguments": { "action": "x" } }));
    let response = dispatcher.handle(&req).unwrap();
    let data = response.error.unwrap().data.unwrap();
    assert_eq!(data["missing"], json!(["target"]));

    let req = request(
        5,
        "tools/call",
        json!({ "name": "gated", "arguments": { "action": "x", "target": "y" } }),
    );
    let response = dispatcher.handle(&req).unwrap();
    assert!(response.error.is_none());
}

#[test]
fn unknown_tool_is_not_found_not_an_invocation_failure() {
    let (dispatcher, _) = build_dispatcher(None);

    let err = dispatcher
        .call_tool("nope", &serde_json::Map::new(), None)
        .unwrap_err();
    assert!(matches!(err, DispatchError::ToolNotFound(_)));
    assert_eq!(err.json_rpc_code(), -32602);

    let req = request(6, "tools/call", json!({ "name": "nope", "arguments": {} }));
    let response = dispatcher.handle(&req).unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert_eq!(error.data.unwrap()["code"], "not_found");
}

#[test]
fn implementation_error_is_an_invocation_failure() {
    let (dispatcher, _) = build_dispatcher(None);

    let req = request(7, "tools/call", json!({ "name": "failing", "arguments": {} }));
    let response = dispatcher.handle(&req).unwrap();

    let error = response.error.unwrap();
    assert_eq!(error.code, -32603);
    assert!(error.message.contains("disk on fire"));
    assert_eq!(error.data.unwrap()["code"], "invocation_failed");
}

#[test]
fn non_object_arguments_are_invalid_params() {
    let (dispatcher, calls) = build_dispatcher(None);

    let req = request(8, "tools/call", json!({ "name": "run", "arguments": [1, 2] }));
    let response = dispatcher.handle(&req).unwrap();
    assert_eq!(response.error.unwrap().code, -32602);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn strict_mode_rejects_type_mismatches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let typed = CapabilityBuilder::tool("typed", move |_args, _ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(ToolResult::text("ok"))
    })
    .schema_json(json!({
        "properties": { "count": { "type": "integer" } },
        "required": ["count"]
    }))
    .build()
    .unwrap();

    let config = ServerConfig {
        strict_arguments: true,
        ..ServerConfig::default()
    };
    let dispatcher = Dispatcher::builder(config).tool(typed).build().unwrap();

    let req = request(9, "tools/call", json!({ "name": "typed", "arguments": { "count": "three" } }));
    let response = dispatcher.handle(&req).unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32602);
    assert_eq!(error.data.unwrap()["code"], "schema_validation");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let req = request(10, "tools/call", json!({ "name": "typed", "arguments": { "count": 3 } }));
    let response = dispatcher.handle(&req).unwrap();
    assert!(response.error.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Prompt invocation
// ---------------------------------------------------------------------------

#[test]
fn get_prompt_follows_the_same_two_phase_pattern() {
    let (dispatcher, _) = build_dispatcher(None);

    let req = request(11, "prompts/get", json!({ "name": "greet", "arguments": { "name": "Ada" } }));
    let response = dispatcher.handle(&req).unwrap();
    let result = response.result.unwrap();
    assert_eq!(result["description"], "greeting prompt");
    assert_eq!(result["messages"][0]["role"], "user");
    assert_eq!(result["messages"][0]["content"]["text"], "Say hello to Ada");

    let req = request(12, "prompts/get", json!({ "name": "greet", "arguments": {} }));
    let response = dispatcher.handle(&req).unwrap();
    let data = response.error.unwrap().data.unwrap();
    assert_eq!(data["missing"], json!(["name"]));

    let req = request(13, "prompts/get", json!({ "name": "missing", "arguments": {} }));
    let response = dispatcher.handle(&req).unwrap();
    assert_eq!(response.error.unwrap().data.unwrap()["code"], "not_found");
}

// ---------------------------------------------------------------------------
// Routing and envelopes
// ---------------------------------------------------------------------------

#[test]
fn initialize_returns_the_static_server_descriptor() {
    let (dispatcher, _) = build_dispatcher(None);

    let req = request(14, "initialize", json!({ "protocolVersion": "2024-11-05" }));
    let response = dispatcher.handle(&req).unwrap();
    let result = response.result.unwrap();

    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert!(result["capabilities"]["tools"].is_object());
    assert!(result["capabilities"]["prompts"].is_object());
    assert_eq!(result["serverInfo"]["name"], "mcp-capability-server");
}

#[test]
fn ping_and_resources_list_are_routed() {
    let (dispatcher, _) = build_dispatcher(None);

    let req = JsonRpcRequest::new(RpcId::Number(15), "ping", None);
    let response = dispatcher.handle(&req).unwrap();
    assert_eq!(response.result.unwrap(), json!({}));

    let req = JsonRpcRequest::new(RpcId::Number(16), "resources/list", None);
    let response = dispatcher.handle(&req).unwrap();
    assert_eq!(response.result.unwrap()["resources"], json!([]));
}

#[test]
fn unrecognized_method_yields_method_not_found() {
    let (dispatcher, _) = build_dispatcher(None);

    let req = JsonRpcRequest::new(RpcId::Str("abc".into()), "tools/destroy", None);
    let response = dispatcher.handle(&req).unwrap();
    let error = response.error.unwrap();
    assert_eq!(error.code, -32601);
    assert!(error.message.contains("tools/destroy"));
    assert_eq!(response.id, Some(RpcId::Str("abc".into())));
}

#[test]
fn notifications_never_receive_a_response() {
    let (dispatcher, calls) = build_dispatcher(None);

    let req = JsonRpcRequest::notification("notifications/initialized", None);
    assert!(dispatcher.handle(&req).is_none());

    // A notification-shaped tool call is processed but not answered.
    let req = JsonRpcRequest::notification(
        "tools/call",
        Some(json!({ "name": "run", "arguments": { "action": "fire" } })),
    );
    assert!(dispatcher.handle(&req).is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let req = JsonRpcRequest::notification("no/such/method", None);
    assert!(dispatcher.handle(&req).is_none());
}

#[test]
fn response_id_echoes_the_request_id() {
    let (dispatcher, _) = build_dispatcher(None);

    let req = request(42, "ping", json!({}));
    let response = dispatcher.handle(&req).unwrap();
    assert_eq!(response.id, Some(RpcId::Number(42)));
}

// ---------------------------------------------------------------------------
// Registry construction
// ---------------------------------------------------------------------------

#[test]
fn dispatcher_debug_output_names_its_registry() {
    let (dispatcher, _) = build_dispatcher(None);

    let rendered = format!("{dispatcher:?}");
    assert!(rendered.contains("Dispatcher"));
    assert!(rendered.contains("run"), "debug output should show registered tools");
}

#[test]
fn duplicate_tool_names_are_rejected_at_build() {
    let a = CapabilityBuilder::tool("same", |_a, _c| Ok(ToolResult::text("a"))).build().unwrap();
    let b = CapabilityBuilder::tool("same", |_a, _c| Ok(ToolResult::text("b"))).build().unwrap();

    let err = Dispatcher::builder(ServerConfig::default())
        .tool(a)
        .tool(b)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("same"));
}

#[test]
fn prompt_registered_as_tool_is_rejected_at_build() {
    let prompt = CapabilityBuilder::prompt("p", |_a, _c| Ok(PromptResult::new(vec![])))
        .build()
        .unwrap();

    let err = Dispatcher::builder(ServerConfig::default())
        .tool(prompt)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("registered as"));
}
