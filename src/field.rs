use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ConfigError;

/// Resolver function: context in, field value out.
///
/// The context is opaque caller data and may be absent; resolvers must
/// tolerate `None`.
pub type ResolverFn<T> = Arc<dyn Fn(Option<&Value>) -> Result<T, ConfigError> + Send + Sync>;

/// A capability metadata field: unset, a fixed literal, or a resolver invoked
/// per call with the caller's context.
///
/// The three-way distinction matters: a field holding an explicit
/// `Literal(None)` (declared "no description") is not the same as one that was
/// never set. Only one of literal-or-resolver is ever active — the enum makes
/// the other unrepresentable.
#[derive(Clone)]
pub enum Field<T> {
    Unset,
    Literal(T),
    Resolver(ResolverFn<T>),
}

impl<T: Clone> Field<T> {
    /// Install an infallible resolver.
    pub fn resolver<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> T + Send + Sync + 'static,
    {
        Field::Resolver(Arc::new(move |ctx| Ok(f(ctx))))
    }

    /// Install a resolver whose output requires normalization (schema fields).
    pub fn fallible_resolver<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> Result<T, ConfigError> + Send + Sync + 'static,
    {
        Field::Resolver(Arc::new(f))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Field::Unset)
    }

    pub fn is_resolver(&self) -> bool {
        matches!(self, Field::Resolver(_))
    }

    /// Resolve the field for a given context.
    ///
    /// `Unset` yields `Ok(None)`; a literal is cloned; a resolver is invoked
    /// with the context. Nothing is cached — each call re-runs the resolver,
    /// because the context may differ per call.
    pub fn resolve(&self, ctx: Option<&Value>) -> Result<Option<T>, ConfigError> {
        match self {
            Field::Unset => Ok(None),
            Field::Literal(value) => Ok(Some(value.clone())),
            Field::Resolver(f) => f(ctx).map(Some),
        }
    }

    /// Context-free best-effort view: the literal if one is set, otherwise the
    /// resolver's output for an absent context, otherwise nothing. A resolver
    /// failure degrades to `None` here rather than propagating; use
    /// [`Field::resolve`] when the error matters.
    pub fn get(&self) -> Option<T> {
        self.resolve(None).unwrap_or(None)
    }
}

impl<T: fmt::Debug> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Unset => f.write_str("Unset"),
            Field::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Field::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Unset
    }
}
