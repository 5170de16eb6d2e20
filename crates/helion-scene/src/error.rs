//! Error type for scene loading.

use thiserror::Error;

/// Errors that can occur while loading a scene description.
///
/// Errors that escape to the user carry the provenance of the innermost
/// element they originated at, rendered with the canonical template
/// `Error while loading "<source>" (<position>): <message>.`; wrapping
/// happens at most once per source location (see [`LoadError::locate`]).
#[derive(Error, Debug)]
pub enum LoadError {
    /// I/O failure reading or writing a scene file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error pinned to a position inside a named source.
    #[error("Error while loading \"{src_id}\" ({position}): {message}.")]
    Located {
        /// Identifier of the source document (file path or `<string>`).
        src_id: String,
        /// Human-readable position, including the `at`/`near` preposition.
        position: String,
        /// The underlying message (may itself be a rendered `Located` chain).
        message: String,
    },

    /// An error that has not (yet) acquired a source location.
    #[error("{0}")]
    Message(String),
}

impl LoadError {
    /// Create a plain, not-yet-located error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Create an error located `at` a parse-time position.
    pub fn at(src_id: &str, location: String, error: impl ToString) -> Self {
        Self::Located {
            src_id: src_id.to_owned(),
            position: format!("at {location}"),
            message: strip_trailing_period(error.to_string()),
        }
    }

    /// Create an error located `near` an instantiation-time position.
    pub fn near(src_id: &str, location: String, error: impl ToString) -> Self {
        Self::Located {
            src_id: src_id.to_owned(),
            position: format!("near {location}"),
            message: strip_trailing_period(error.to_string()),
        }
    }

    /// True if this error already carries a source location.
    pub fn is_located(&self) -> bool {
        matches!(self, Self::Located { .. })
    }

    /// Attach a location unless the error already has one.
    ///
    /// This is what gives nested failures a single innermost location: the
    /// frame closest to the defect wraps, every outer frame passes through.
    pub fn locate(self, src_id: &str, location: String) -> Self {
        if self.is_located() {
            self
        } else {
            Self::at(src_id, location, self)
        }
    }
}

impl From<helion_runtime::RuntimeError> for LoadError {
    fn from(err: helion_runtime::RuntimeError) -> Self {
        Self::Message(err.to_string())
    }
}

fn strip_trailing_period(mut s: String) -> String {
    if s.ends_with('.') && !s.ends_with("..") {
        s.pop();
    }
    s
}
