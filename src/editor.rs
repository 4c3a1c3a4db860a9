use crate::dispatcher::Outcome;
use crate::error::{Failure, SubmitError};
use crate::storage::CommandRecord;

/// The one error currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveError {
    /// i18n key of the user-facing message.
    pub key: &'static str,
    /// Raw detail, e.g. the backend's error text.
    pub detail: Option<String>,
    pub retryable: bool,
}

impl ActiveError {
    pub fn from_failure(failure: &Failure, retry_budget_left: bool) -> Self {
        Self {
            key: failure.kind.message_key(),
            detail: Some(failure.message.clone()),
            retryable: failure.retryable() && retry_budget_left,
        }
    }

    pub fn from_rejection(err: SubmitError) -> Self {
        Self {
            key: err.message_key(),
            detail: None,
            retryable: false,
        }
    }
}

/// Source text, editable result, and the command input.
#[derive(Debug, Clone, Default)]
pub struct EditorState {
    pub original_text: String,
    pub edited_text: String,
    pub command: String,
    seeded: bool,
    error: Option<ActiveError>,
}

impl EditorState {
    pub fn new(original_text: impl Into<String>) -> Self {
        let mut state = Self {
            original_text: original_text.into(),
            ..Self::default()
        };
        state.seed_result();
        state
    }

    pub fn set_original(&mut self, text: impl Into<String>) {
        self.original_text = text.into();
        self.seed_result();
    }

    /// Copy the source into the result pane once, while the result is still
    /// empty. Never fires again after that.
    fn seed_result(&mut self) {
        if !self.seeded && self.edited_text.is_empty() && !self.original_text.is_empty() {
            self.edited_text = self.original_text.clone();
            self.seeded = true;
        }
    }

    /// A manual edit of the result pane.
    pub fn edit_result(&mut self, text: impl Into<String>) {
        self.edited_text = text.into();
        self.seeded = true;
    }

    pub fn apply_outcome(&mut self, outcome: &Outcome, retry_budget_left: bool) {
        match outcome {
            Outcome::Transformed { result, .. } => {
                self.edited_text = result.clone();
                self.seeded = true;
                self.error = None;
            }
            Outcome::Failed(failure) => {
                self.error = Some(ActiveError::from_failure(failure, retry_budget_left));
            }
        }
    }

    pub fn reject(&mut self, err: SubmitError) {
        self.error = Some(ActiveError::from_rejection(err));
    }

    /// Restore the inputs of a past record so it can be run again.
    pub fn reuse(&mut self, record: &CommandRecord) {
        self.command = record.command.clone();
        self.original_text = record.original_text.clone();
        self.edited_text = record
            .result
            .clone()
            .unwrap_or_else(|| record.original_text.clone());
        self.seeded = true;
        self.error = None;
    }

    pub fn error(&self) -> Option<&ActiveError> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}
