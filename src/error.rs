use crate::protocol::JsonRpcError;
use crate::schema::SchemaValidationError;

/// Definition-time or resolution-time misconfiguration.
///
/// These are programmer errors: they are never retried and they fail loudly
/// at the point where a definition is built or a resolver's output is
/// normalized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A schema literal or schema resolver produced something that is not a
    /// schema-shaped object (`properties`/`required` members, optionally
    /// wrapped in `{"type": "object", ...}`).
    #[error("expected a schema-shaped object with `properties`/`required`, got {found}")]
    InvalidSchemaShape { found: &'static str },

    /// Two capabilities of the same kind were registered under one name.
    #[error("duplicate capability name: {0}")]
    DuplicateName(String),

    /// A definition was registered under the wrong capability kind.
    #[error("capability `{name}` is a {kind} but was registered as a {registered_as}")]
    KindMismatch {
        name: String,
        kind: &'static str,
        registered_as: &'static str,
    },
}

/// Failure while listing or invoking a capability.
///
/// Expected, recoverable-by-caller conditions (`ToolNotFound`,
/// `PromptNotFound`, `InvalidArguments`) map to JSON-RPC `-32602`; server-side
/// failures map to `-32603`. `Dispatcher::handle` converts every variant into
/// a structured error envelope; none of them escape that boundary.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    #[error("unknown prompt: {0}")]
    PromptNotFound(String),

    /// Required schema keys absent from the supplied arguments. The
    /// implementation is never invoked when this is raised.
    #[error("missing required arguments: {}", .missing.join(", "))]
    InvalidArguments { missing: Vec<String> },

    /// Strict-mode JSON Schema validation of the argument object failed.
    #[error("arguments failed schema validation")]
    SchemaValidation(#[source] SchemaValidationError),

    /// The bound implementation itself failed.
    #[error("capability invocation failed: {0}")]
    Invocation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DispatchError {
    /// Map to the corresponding JSON-RPC 2.0 error code.
    ///
    /// Caller mistakes → -32602 (Invalid params)
    /// Server failures → -32603 (Internal error)
    pub fn json_rpc_code(&self) -> i32 {
        match self {
            Self::ToolNotFound(_) | Self::PromptNotFound(_) => -32602,
            Self::InvalidArguments { .. } | Self::SchemaValidation(_) => -32602,
            Self::Invocation(_) | Self::Config(_) => -32603,
        }
    }

    /// Stable machine-readable code carried in the error `data` member.
    pub fn data_code(&self) -> &'static str {
        match self {
            Self::ToolNotFound(_) | Self::PromptNotFound(_) => "not_found",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::SchemaValidation(_) => "schema_validation",
            Self::Invocation(_) => "invocation_failed",
            Self::Config(_) => "configuration_error",
        }
    }

    /// Convert into a JSON-RPC error object.
    ///
    /// The JSON-RPC `code` is derived from the variant, the `message` is the
    /// human-readable description, and `data` carries the structured error for
    /// clients that inspect it.
    pub fn to_json_rpc(&self) -> JsonRpcError {
        let mut data = serde_json::json!({ "code": self.data_code() });
        if let Self::InvalidArguments { missing } = self {
            data["missing"] = serde_json::json!(missing);
        }
        JsonRpcError {
            code: self.json_rpc_code(),
            message: self.to_string(),
            data: Some(data),
        }
    }
}
