/// Recoverable failures surfaced to the operator.
///
/// None of these end the session: the console prints the message and
/// returns to the menu with the record store untouched.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report generation failed: {reason}")]
    GenerationFailed { reason: String },

    #[error("unknown student id: {id}")]
    UnknownStudent { id: String },

    #[error("document render failed: {reason}")]
    RenderFailed { reason: String },

    #[error("{reason}")]
    MissingInput { reason: String },
}

impl ReportError {
    pub fn generation(reason: impl Into<String>) -> Self {
        Self::GenerationFailed {
            reason: reason.into(),
        }
    }

    pub fn unknown_student(id: impl Into<String>) -> Self {
        Self::UnknownStudent { id: id.into() }
    }

    pub fn render(reason: impl Into<String>) -> Self {
        Self::RenderFailed {
            reason: reason.into(),
        }
    }

    pub fn missing_input(reason: impl Into<String>) -> Self {
        Self::MissingInput {
            reason: reason.into(),
        }
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
