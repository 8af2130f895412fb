//! Error types for staged playback.

use thiserror::Error;

/// Result type for stage operations.
pub type Result<T> = std::result::Result<T, StageError>;

/// Errors that can occur while composing or starting a playback.
///
/// Runtime playback itself never fails through this enum: per the error
/// design, misbehaving rules degrade to "contributes nothing" and are logged.
#[derive(Error, Debug)]
pub enum StageError {
    /// Referenced element is not registered on the stage.
    #[error("unknown element '{0}'")]
    UnknownElement(String),

    /// Effect name not present in the registry.
    #[error("unknown effect '{0}'")]
    UnknownEffect(String),

    /// Named property is not settable on the element.
    #[error("element '{element}' has no settable property '{property}'")]
    UnknownProperty { element: String, property: String },

    /// A composition needs at least one section.
    #[error("composition has no sections")]
    EmptyComposition,

    /// The sequencer was started while a playback is still in flight.
    #[error("sequencer is already running")]
    AlreadyRunning,

    /// Declarative spec failed validation.
    #[error("invalid spec: {0}")]
    InvalidSpec(String),
}
