//! Error types.
//!
//! Each concern has its own enum. Render-time errors are never surfaced to the
//! caller of `render`; the renderer turns them into an inline diagnostic node
//! (see [`RenderError::kind`]).

use thiserror::Error;

use crate::dom::NodeId;

/// Errors returned by the state store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The path is empty or contains an empty / parent-escape segment.
    #[error("invalid state path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Nested notification passes exceeded the configured limit.
    #[error("notification depth limit ({limit}) exceeded while writing {path:?}")]
    NotifyDepthExceeded { path: String, limit: usize },
}

/// Error produced by a middleware. The write proceeds untransformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("middleware failed: {0}")]
pub struct MiddlewareError(pub String);

/// A deferred value settled with a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("deferred value rejected: {0}")]
pub struct Rejected(pub String);

impl Rejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Errors from the live node tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    /// The handle refers to a released or recycled node.
    #[error("stale node handle {0}")]
    StaleNode(NodeId),

    /// Appending `child` under `parent` would make a node its own ancestor.
    #[error("refusing to attach {child} under its own descendant {parent}")]
    Cycle { parent: NodeId, child: NodeId },

    /// Text nodes cannot have children.
    #[error("node {0} cannot contain children")]
    NotAContainer(NodeId),

    /// A mount selector matched nothing.
    #[error("no node matches selector {0:?}")]
    NoMatch(String),
}

/// Structural render failures, rendered as diagnostic nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("unknown component <{0}>")]
    UnknownComponent(String),

    #[error("component <{name}> renders itself (chain: {chain})")]
    RecursiveComponent { name: String, chain: String },

    #[error("component nesting deeper than {limit} at <{name}>")]
    DepthExceeded { name: String, limit: usize },

    #[error("component <{name}> panicked: {message}")]
    ComponentPanicked { name: String, message: String },

    #[error(transparent)]
    Rejected(#[from] Rejected),

    #[error(transparent)]
    Dom(#[from] DomError),
}

impl RenderError {
    /// Short machine-readable kind, written to the diagnostic node's
    /// `data-error` attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownComponent(_) => "unknown-component",
            Self::RecursiveComponent { .. } => "recursive-component",
            Self::DepthExceeded { .. } => "depth-exceeded",
            Self::ComponentPanicked { .. } => "component-panicked",
            Self::Rejected(_) => "rejected",
            Self::Dom(_) => "dom",
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse engine config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid engine config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: &'static str },
}

/// Errors surfaced by the engine's public entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Recover a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_error_kinds_are_stable() {
        assert_eq!(RenderError::UnknownComponent("X".into()).kind(), "unknown-component");
        assert_eq!(RenderError::from(Rejected::new("boom")).kind(), "rejected");
        assert_eq!(
            RenderError::from(Rejected::new("boom")).to_string(),
            "deferred value rejected: boom"
        );
    }

    #[test]
    fn panic_message_handles_both_payload_shapes() {
        let p: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(p.as_ref()), "static");
        let p: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(p.as_ref()), "owned");
    }
}
