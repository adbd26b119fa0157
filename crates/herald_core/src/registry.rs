//! In-process registry of object resolvers for polymorphic references.
//!
//! Actors, targets and action objects are stored as `(kind, id)` pairs. The
//! registry maps each kind to a resolver that knows how to name the object and
//! where its admin detail page lives.

use crate::model::notification::ObjectRef;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Lookup capability for one object kind.
pub trait ObjectResolver: Send + Sync {
    /// Human-readable name for the object, if it still exists.
    fn display_name(&self, id: &str) -> Option<String>;

    /// Admin detail link for the object. `None` when the kind has no
    /// routable detail view.
    fn admin_url(&self, _id: &str) -> Option<String> {
        None
    }
}

/// Resolver registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateKind(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKind(kind) => write!(f, "object kind already registered: {kind}"),
        }
    }
}

impl Error for RegistryError {}

/// Kind-to-resolver map consulted when rendering notifications.
#[derive(Default, Clone)]
pub struct ObjectRegistry {
    resolvers: BTreeMap<String, Arc<dyn ObjectResolver>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the resolver for one object kind.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        resolver: Arc<dyn ObjectResolver>,
    ) -> Result<(), RegistryError> {
        let kind = kind.into();
        if self.resolvers.contains_key(kind.as_str()) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        self.resolvers.insert(kind, resolver);
        Ok(())
    }

    /// Returns sorted registered kinds.
    pub fn kinds(&self) -> Vec<String> {
        self.resolvers.keys().cloned().collect()
    }

    pub fn resolver(&self, kind: &str) -> Option<Arc<dyn ObjectResolver>> {
        self.resolvers.get(kind).cloned()
    }

    /// Display text for a reference: the resolver's name, else `kind#id`.
    pub fn display(&self, object: &ObjectRef) -> String {
        self.resolvers
            .get(object.kind.as_str())
            .and_then(|resolver| resolver.display_name(&object.id))
            .unwrap_or_else(|| object.to_string())
    }

    /// Admin anchor for a reference, or the raw id when no link resolves.
    pub fn object_link(&self, object: &ObjectRef) -> String {
        match self
            .resolvers
            .get(object.kind.as_str())
            .and_then(|resolver| resolver.admin_url(&object.id))
        {
            Some(url) => format!(
                "<a href='{}'>{}</a>",
                escape_html(&url),
                escape_html(&object.id)
            ),
            None => object.id.clone(),
        }
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}
