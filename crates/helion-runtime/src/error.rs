//! Error type for object construction and property access.

use thiserror::Error;

/// Errors raised while constructing objects or reading their properties.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No constructor is registered for the requested plugin name.
    #[error("unknown plugin \"{0}\"")]
    UnknownPlugin(String),

    /// A required property was never specified.
    #[error("property \"{0}\" has not been specified")]
    MissingProperty(String),

    /// A property exists but holds a different type than requested.
    #[error("property \"{name}\": expected a {expected}, got a {actual}")]
    PropertyType {
        /// Property name.
        name: String,
        /// The type the caller asked for.
        expected: &'static str,
        /// The type actually stored.
        actual: &'static str,
    },

    /// A plugin constructor rejected its inputs.
    #[error("{0}")]
    Construction(String),
}

impl RuntimeError {
    /// Create a property type mismatch error.
    pub fn property_type(
        name: impl Into<String>,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::PropertyType {
            name: name.into(),
            expected,
            actual,
        }
    }

    /// Create a constructor failure with a free-form message.
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }
}
