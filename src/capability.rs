//! Capability definitions: tools and prompts with per-context metadata.
//!
//! A definition carries a fixed name, a stored implementation closure, and
//! four metadata fields (title, description, schema, annotations) that are
//! each either unset, a literal, or a resolver of the caller's context. A
//! definition is immutable once built; all per-call variability goes through
//! resolvers, which are re-run on every resolution.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ConfigError;
use crate::field::Field;
use crate::protocol::{PromptResult, ToolResult};
use crate::schema::InputSchema;

/// Boxed error returned by capability implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stored tool implementation: resolved arguments plus context in, result out.
pub type ToolHandler =
    Arc<dyn Fn(&Map<String, Value>, Option<&Value>) -> Result<ToolResult, BoxError> + Send + Sync>;

/// Stored prompt implementation.
pub type PromptHandler = Arc<
    dyn Fn(&Map<String, Value>, Option<&Value>) -> Result<PromptResult, BoxError> + Send + Sync,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Tool,
    Prompt,
}

impl CapabilityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
        }
    }
}

/// Implementation bound to a definition, tagged with its capability kind.
#[derive(Clone)]
pub enum Handler {
    Tool(ToolHandler),
    Prompt(PromptHandler),
}

impl Handler {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Tool(_) => CapabilityKind::Tool,
            Self::Prompt(_) => CapabilityKind::Prompt,
        }
    }
}

/// Behavioral hints advertised alongside a tool.
///
/// All members are optional; absent hints are omitted from the wire form, and
/// an explicit `false` is advertised as `false` — the two are not the same
/// statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// A named, invokable capability with context-dependent metadata.
///
/// Construct through [`CapabilityBuilder`]; frozen after `build()`. The name
/// is fixed at construction and never resolved dynamically — only title,
/// description, schema, and annotations support resolvers.
pub struct CapabilityDefinition {
    name: String,
    title: Field<Option<String>>,
    description: Field<Option<String>>,
    schema: Field<InputSchema>,
    annotations: Field<Option<ToolAnnotations>>,
    handler: Handler,
}

impl CapabilityDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CapabilityKind {
        self.handler.kind()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn title_field(&self) -> &Field<Option<String>> {
        &self.title
    }

    pub fn description_field(&self) -> &Field<Option<String>> {
        &self.description
    }

    pub fn schema_field(&self) -> &Field<InputSchema> {
        &self.schema
    }

    pub fn annotations_field(&self) -> &Field<Option<ToolAnnotations>> {
        &self.annotations
    }

    pub fn resolve_title(&self, ctx: Option<&Value>) -> Result<Option<String>, ConfigError> {
        Ok(self.title.resolve(ctx)?.flatten())
    }

    pub fn resolve_description(&self, ctx: Option<&Value>) -> Result<Option<String>, ConfigError> {
        Ok(self.description.resolve(ctx)?.flatten())
    }

    /// Resolve the input schema for a context. An unset schema resolves to the
    /// empty schema, which accepts any argument mapping.
    pub fn resolve_schema(&self, ctx: Option<&Value>) -> Result<InputSchema, ConfigError> {
        Ok(self.schema.resolve(ctx)?.unwrap_or_default())
    }

    pub fn resolve_annotations(
        &self,
        ctx: Option<&Value>,
    ) -> Result<Option<ToolAnnotations>, ConfigError> {
        Ok(self.annotations.resolve(ctx)?.flatten())
    }

    /// Serialize the externally advertised descriptor for a context.
    ///
    /// Tools: `{name, title?, description?, inputSchema, annotations?}`.
    /// Prompts: `{name, title?, description?, arguments}` with the argument
    /// list derived from the resolved schema. Optional members appear only
    /// when resolution produced a value for this context.
    pub fn to_descriptor(&self, ctx: Option<&Value>) -> Result<Value, ConfigError> {
        let mut desc = Map::new();
        desc.insert("name".into(), json!(self.name));

        if let Some(title) = self.resolve_title(ctx)? {
            desc.insert("title".into(), json!(title));
        }
        if let Some(description) = self.resolve_description(ctx)? {
            desc.insert("description".into(), json!(description));
        }

        let schema = self.resolve_schema(ctx)?;
        match self.kind() {
            CapabilityKind::Tool => {
                desc.insert("inputSchema".into(), schema.to_canonical());
                if let Some(annotations) = self.resolve_annotations(ctx)? {
                    let value = serde_json::to_value(&annotations)
                        .expect("ToolAnnotations must serialize to JSON Value");
                    desc.insert("annotations".into(), value);
                }
            }
            CapabilityKind::Prompt => {
                let arguments: Vec<Value> = schema
                    .properties()
                    .iter()
                    .map(|(name, fragment)| {
                        let mut entry = Map::new();
                        entry.insert("name".into(), json!(name));
                        if let Some(d) = fragment.get("description").and_then(Value::as_str) {
                            entry.insert("description".into(), json!(d));
                        }
                        entry.insert("required".into(), json!(schema.required().contains(name)));
                        Value::Object(entry)
                    })
                    .collect();
                desc.insert("arguments".into(), json!(arguments));
            }
        }

        Ok(Value::Object(desc))
    }

    /// Start a new definition from this one.
    ///
    /// Only the kind and the bound implementation carry over; every metadata
    /// field of the new builder starts unset. A derived definition must
    /// re-declare each literal or resolver it wants — there is no silent
    /// inheritance.
    pub fn extend(&self, name: impl Into<String>) -> CapabilityBuilder {
        CapabilityBuilder::with_handler(name.into(), self.handler.clone())
    }
}

impl std::fmt::Debug for CapabilityDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("title", &self.title)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .field("annotations", &self.annotations)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`CapabilityDefinition`].
///
/// Name and implementation are required up front; everything else is
/// optional. Setting a literal replaces any resolver on the same field and
/// vice versa. A literal schema given as a JSON value is normalized at
/// `build()`; a schema resolver's output is normalized on every resolution.
pub struct CapabilityBuilder {
    name: String,
    title: Field<Option<String>>,
    description: Field<Option<String>>,
    schema: Field<InputSchema>,
    schema_json: Option<Value>,
    annotations: Field<Option<ToolAnnotations>>,
    handler: Handler,
}

impl CapabilityBuilder {
    /// Start a tool definition.
    pub fn tool<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>, Option<&Value>) -> Result<ToolResult, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_handler(name.into(), Handler::Tool(Arc::new(handler)))
    }

    /// Start a prompt definition.
    pub fn prompt<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>, Option<&Value>) -> Result<PromptResult, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self::with_handler(name.into(), Handler::Prompt(Arc::new(handler)))
    }

    fn with_handler(name: String, handler: Handler) -> Self {
        Self {
            name,
            title: Field::Unset,
            description: Field::Unset,
            schema: Field::Unset,
            schema_json: None,
            annotations: Field::Unset,
            handler,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Field::Literal(Some(title.into()));
        self
    }

    /// Declare explicitly that this capability has no title (distinct from
    /// never setting one).
    pub fn clear_title(mut self) -> Self {
        self.title = Field::Literal(None);
        self
    }

    pub fn title_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Option<String> + Send + Sync + 'static,
    {
        self.title = Field::resolver(f);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Field::Literal(Some(description.into()));
        self
    }

    /// Declare explicitly that this capability has no description.
    pub fn clear_description(mut self) -> Self {
        self.description = Field::Literal(None);
        self
    }

    pub fn description_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Option<String> + Send + Sync + 'static,
    {
        self.description = Field::resolver(f);
        self
    }

    /// Set a literal schema directly.
    pub fn schema(mut self, schema: InputSchema) -> Self {
        self.schema = Field::Literal(schema);
        self.schema_json = None;
        self
    }

    /// Set a literal schema from a schema-shaped JSON value. Normalized at
    /// `build()`; a wrong-shaped value makes `build()` fail.
    pub fn schema_json(mut self, value: Value) -> Self {
        self.schema = Field::Unset;
        self.schema_json = Some(value);
        self
    }

    /// Install a schema resolver. The raw value it returns is normalized on
    /// every resolution; a non-schema-shaped value surfaces as a
    /// [`ConfigError`] at resolution time.
    pub fn schema_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        self.schema = Field::fallible_resolver(move |ctx| InputSchema::from_value(&f(ctx)));
        self.schema_json = None;
        self
    }

    pub fn annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = Field::Literal(Some(annotations));
        self
    }

    /// Declare explicitly that this capability has no annotations.
    pub fn clear_annotations(mut self) -> Self {
        self.annotations = Field::Literal(None);
        self
    }

    pub fn annotations_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Option<ToolAnnotations> + Send + Sync + 'static,
    {
        self.annotations = Field::resolver(f);
        self
    }

    /// Finalize the definition. Fails if a literal JSON schema was supplied
    /// and is not schema-shaped.
    pub fn build(self) -> Result<CapabilityDefinition, ConfigError> {
        let schema = match self.schema_json {
            Some(raw) => Field::Literal(InputSchema::from_value(&raw)?),
            None => self.schema,
        };

        Ok(CapabilityDefinition {
            name: self.name,
            title: self.title,
            description: self.description,
            schema,
            annotations: self.annotations,
            handler: self.handler,
        })
    }
}
