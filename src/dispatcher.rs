//! Request dispatcher: routes protocol methods to capability listings and
//! invocations, resolving context-dependent metadata per call.

use serde_json::{json, Map, Value};

use crate::capability::{CapabilityDefinition, CapabilityKind, Handler};
use crate::config::ServerConfig;
use crate::error::{ConfigError, DispatchError};
use crate::protocol::{
    GetPromptParams, JsonRpcError, JsonRpcRequest, JsonRpcResponse, PromptResult, ToolCallParams,
    ToolResult,
};

/// Owns the frozen capability registry and the context bound for this
/// dispatcher's lifetime.
///
/// Built through [`DispatcherBuilder`]; the registry supports no hot
/// registration or removal after `build()`. Listing order is registration
/// order. All operations run synchronously to completion.
pub struct Dispatcher {
    config: ServerConfig,
    tools: Vec<CapabilityDefinition>,
    prompts: Vec<CapabilityDefinition>,
    context: Option<Value>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("tools", &self.tools)
            .field("prompts", &self.prompts)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn builder(config: ServerConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            tools: Vec::new(),
            prompts: Vec::new(),
            context: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The context bound at construction, forwarded to every resolver and
    /// implementation reached through [`Dispatcher::handle`].
    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    /// Descriptors for every registered tool, in registration order.
    ///
    /// A resolver failure on any definition aborts the whole listing; there
    /// is no partial-list recovery.
    pub fn list_tools(&self, ctx: Option<&Value>) -> Result<Vec<Value>, ConfigError> {
        self.tools.iter().map(|def| def.to_descriptor(ctx)).collect()
    }

    /// Descriptors for every registered prompt, in registration order.
    pub fn list_prompts(&self, ctx: Option<&Value>) -> Result<Vec<Value>, ConfigError> {
        self.prompts.iter().map(|def| def.to_descriptor(ctx)).collect()
    }

    /// Invoke a tool by name: resolve its schema for the context, reject
    /// missing required arguments without touching the implementation, then
    /// call through the stored handler.
    pub fn call_tool(
        &self,
        name: &str,
        args: &Map<String, Value>,
        ctx: Option<&Value>,
    ) -> Result<ToolResult, DispatchError> {
        let def = Self::lookup(&self.tools, name)
            .ok_or_else(|| DispatchError::ToolNotFound(name.to_string()))?;
        self.check_arguments(def, args, ctx)?;

        let Handler::Tool(handler) = def.handler() else {
            return Err(DispatchError::ToolNotFound(name.to_string()));
        };
        handler(args, ctx).map_err(|e| DispatchError::Invocation(e.to_string()))
    }

    /// Invoke a prompt by name, following the same resolve-then-validate-
    /// then-invoke sequence as tools.
    pub fn get_prompt(
        &self,
        name: &str,
        args: &Map<String, Value>,
        ctx: Option<&Value>,
    ) -> Result<PromptResult, DispatchError> {
        let def = Self::lookup(&self.prompts, name)
            .ok_or_else(|| DispatchError::PromptNotFound(name.to_string()))?;
        self.check_arguments(def, args, ctx)?;

        let Handler::Prompt(handler) = def.handler() else {
            return Err(DispatchError::PromptNotFound(name.to_string()));
        };
        handler(args, ctx).map_err(|e| DispatchError::Invocation(e.to_string()))
    }

    fn lookup<'a>(
        registry: &'a [CapabilityDefinition],
        name: &str,
    ) -> Option<&'a CapabilityDefinition> {
        registry.iter().find(|def| def.name() == name)
    }

    fn check_arguments(
        &self,
        def: &CapabilityDefinition,
        args: &Map<String, Value>,
        ctx: Option<&Value>,
    ) -> Result<(), DispatchError> {
        let schema = def.resolve_schema(ctx)?;

        let missing = schema.missing_required(args);
        if !missing.is_empty() {
            return Err(DispatchError::InvalidArguments {
                missing: missing.into_iter().collect(),
            });
        }

        if self.config.strict_arguments {
            schema
                .validate_instance(&Value::Object(args.clone()))
                .map_err(DispatchError::SchemaValidation)?;
        }

        Ok(())
    }

    /// Dispatch a JSON-RPC request to the appropriate operation.
    ///
    /// Every request with an id gets exactly one envelope back, success or
    /// error; nothing escapes this boundary. Requests without an id are
    /// notifications: processed where meaningful, never answered.
    pub fn handle(&self, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!(method = %req.method, "dispatching request");

        let response = match req.method.as_str() {
            "notifications/initialized" => return None,

            "initialize" => JsonRpcResponse::success(req.id.clone(), self.initialize_result()),

            "ping" => JsonRpcResponse::success(req.id.clone(), json!({})),

            "tools/list" => self.handle_listing(req, CapabilityKind::Tool),

            "prompts/list" => self.handle_listing(req, CapabilityKind::Prompt),

            "resources/list" => {
                JsonRpcResponse::success(req.id.clone(), json!({ "resources": [] }))
            }

            "tools/call" => self.handle_tool_call(req),

            "prompts/get" => self.handle_get_prompt(req),

            other => {
                tracing::warn!(method = %other, "unrecognized method");
                JsonRpcResponse::error(req.id.clone(), JsonRpcError::method_not_found(other))
            }
        };

        if req.is_notification() {
            None
        } else {
            Some(response)
        }
    }

    /// Static identity/capability descriptor returned from `initialize`.
    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": self.config.protocol_version,
            "capabilities": {
                "tools": {},
                "prompts": {},
                "resources": {}
            },
            "serverInfo": {
                "name": self.config.server_name,
                "version": self.config.server_version
            }
        })
    }

    fn handle_listing(&self, req: &JsonRpcRequest, kind: CapabilityKind) -> JsonRpcResponse {
        let (key, listed) = match kind {
            CapabilityKind::Tool => ("tools", self.list_tools(self.context.as_ref())),
            CapabilityKind::Prompt => ("prompts", self.list_prompts(self.context.as_ref())),
        };
        match listed {
            Ok(descriptors) => {
                let mut result = Map::new();
                result.insert(key.to_string(), Value::Array(descriptors));
                JsonRpcResponse::success(req.id.clone(), Value::Object(result))
            }
            Err(e) => {
                tracing::warn!(error = %e, "listing aborted by resolver failure");
                JsonRpcResponse::error(req.id.clone(), JsonRpcError::internal_error(e.to_string()))
            }
        }
    }

    fn handle_tool_call(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let params: ToolCallParams = match Self::parse_params(req, "tools/call") {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::error(req.id.clone(), e),
        };
        let args = match Self::argument_map(params.arguments.as_ref()) {
            Ok(a) => a,
            Err(e) => return JsonRpcResponse::error(req.id.clone(), e),
        };

        match self.call_tool(&params.name, &args, self.context.as_ref()) {
            Ok(result) => {
                let value = serde_json::to_value(&result)
                    .expect("ToolResult must serialize to JSON Value");
                JsonRpcResponse::success(req.id.clone(), value)
            }
            Err(e) => {
                tracing::warn!(tool = %params.name, error = %e, "tool call failed");
                JsonRpcResponse::error(req.id.clone(), e.to_json_rpc())
            }
        }
    }

    fn handle_get_prompt(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let params: GetPromptParams = match Self::parse_params(req, "prompts/get") {
            Ok(p) => p,
            Err(e) => return JsonRpcResponse::error(req.id.clone(), e),
        };
        let args = match Self::argument_map(params.arguments.as_ref()) {
            Ok(a) => a,
            Err(e) => return JsonRpcResponse::error(req.id.clone(), e),
        };

        match self.get_prompt(&params.name, &args, self.context.as_ref()) {
            Ok(result) => {
                let value = serde_json::to_value(&result)
                    .expect("PromptResult must serialize to JSON Value");
                JsonRpcResponse::success(req.id.clone(), value)
            }
            Err(e) => {
                tracing::warn!(prompt = %params.name, error = %e, "prompt call failed");
                JsonRpcResponse::error(req.id.clone(), e.to_json_rpc())
            }
        }
    }

    fn parse_params<P: serde::de::DeserializeOwned>(
        req: &JsonRpcRequest,
        method: &str,
    ) -> Result<P, JsonRpcError> {
        match &req.params {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| JsonRpcError::invalid_params(format!("Invalid {method} params: {e}"))),
            None => Err(JsonRpcError::invalid_params(format!(
                "Missing params for {method}"
            ))),
        }
    }

    fn argument_map(arguments: Option<&Value>) -> Result<Map<String, Value>, JsonRpcError> {
        match arguments {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(JsonRpcError::invalid_params(format!(
                "arguments must be an object, got {}",
                crate::schema::json_type_name(other)
            ))),
        }
    }
}

/// Assembles a [`Dispatcher`]; the registry is frozen once `build()` runs.
pub struct DispatcherBuilder {
    config: ServerConfig,
    tools: Vec<CapabilityDefinition>,
    prompts: Vec<CapabilityDefinition>,
    context: Option<Value>,
}

impl DispatcherBuilder {
    /// Bind the context forwarded to resolvers and implementations for this
    /// dispatcher's lifetime. Accepted opaquely, never interpreted.
    pub fn context(mut self, ctx: Value) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Register a tool definition. Ordering here is listing order.
    pub fn tool(mut self, def: CapabilityDefinition) -> Self {
        self.tools.push(def);
        self
    }

    /// Register a prompt definition.
    pub fn prompt(mut self, def: CapabilityDefinition) -> Self {
        self.prompts.push(def);
        self
    }

    /// Validate and freeze the registry.
    ///
    /// Fails on a definition registered under the wrong kind, or on two
    /// definitions of the same kind sharing a name.
    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        Self::check_registry(&self.tools, CapabilityKind::Tool)?;
        Self::check_registry(&self.prompts, CapabilityKind::Prompt)?;

        Ok(Dispatcher {
            config: self.config,
            tools: self.tools,
            prompts: self.prompts,
            context: self.context,
        })
    }

    fn check_registry(
        registry: &[CapabilityDefinition],
        expected: CapabilityKind,
    ) -> Result<(), ConfigError> {
        let mut seen = std::collections::BTreeSet::new();
        for def in registry {
            if def.kind() != expected {
                return Err(ConfigError::KindMismatch {
                    name: def.name().to_string(),
                    kind: def.kind().as_str(),
                    registered_as: expected.as_str(),
                });
            }
            if !seen.insert(def.name().to_string()) {
                return Err(ConfigError::DuplicateName(def.name().to_string()));
            }
        }
        Ok(())
    }
}
