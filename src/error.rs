//! Errors and diagnostics.
//!
//! [`RenderError`] is fatal for the render that raised it and is returned to
//! the caller. [`Diagnostic`] covers recoverable conditions: the engine logs
//! them with `tracing`, records them on the renderer and keeps going.

use thiserror::Error;

use crate::types::DescriptorId;

/// Fatal render failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// A plain attribute and a same-named category both exist, but the plain
    /// value is not a map and cannot be merged.
    #[error("attribute `{key}` is a {found} and cannot be merged with `{key}:*` entries")]
    InvalidAttributeType { key: String, found: &'static str },

    /// A descriptor produced nothing, or produced something that is not
    /// renderable.
    #[error("dynamic rendering failed: {0}")]
    DynamicRendering(String),

    /// A component's render function failed.
    #[error("component `{name}` failed to render")]
    Component {
        name: String,
        #[source]
        source: Box<RenderError>,
    },
}

impl RenderError {
    pub(crate) fn dynamic(message: impl Into<String>) -> Self {
        RenderError::DynamicRendering(message.into())
    }

    /// Innermost error, unwrapping component frames.
    pub fn root_cause(&self) -> &RenderError {
        match self {
            RenderError::Component { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result alias for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Recoverable condition reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A rendered descriptor's render dependencies changed. The rebuild was
    /// suppressed; the cached result stays.
    RebuildDetected { descriptor: DescriptorId, name: String },
    /// A mount target already held a mount; the previous one was torn down.
    LatchConflict { target: String },
    /// A mount target selector matched nothing; the mount is inert.
    TargetNotFound { target: String },
    /// A `this` capture target was a read-only reactive value.
    MissingSetter { name: String },
    /// A reactive update failed after the initial render. The DOM keeps its
    /// previous state.
    UpdateFailed { error: RenderError },
    /// A `for` list holds the same item more than once; occurrences are
    /// keyed by position among equals.
    DuplicateKey { key: String },
}

impl Diagnostic {
    /// Emit through `tracing` at the level the condition deserves.
    pub(crate) fn log(&self) {
        match self {
            Diagnostic::RebuildDetected { descriptor, name } => {
                tracing::warn!(%descriptor, name = %name, "rebuild suppressed: render dependencies of a rendered descriptor changed");
            }
            Diagnostic::LatchConflict { target } => {
                tracing::warn!(selector = %target, "mount target already latched; tearing down previous mount");
            }
            Diagnostic::TargetNotFound { target } => {
                tracing::warn!(selector = %target, "mount target not found");
            }
            Diagnostic::MissingSetter { name } => {
                tracing::warn!(name = %name, "`this` target has no setter");
            }
            Diagnostic::UpdateFailed { error } => {
                tracing::error!(%error, "reactive update failed; keeping previous DOM");
            }
            Diagnostic::DuplicateKey { key } => {
                tracing::debug!(key = %key, "duplicate list item key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_and_root_cause() {
        let inner = RenderError::InvalidAttributeType {
            key: "when".into(),
            found: "string",
        };
        assert_eq!(
            inner.to_string(),
            "attribute `when` is a string and cannot be merged with `when:*` entries"
        );

        let wrapped = RenderError::Component {
            name: "Card".into(),
            source: Box::new(RenderError::Component {
                name: "Inner".into(),
                source: Box::new(inner.clone()),
            }),
        };
        assert_eq!(wrapped.to_string(), "component `Card` failed to render");
        assert_eq!(wrapped.root_cause(), &inner);
    }
}
