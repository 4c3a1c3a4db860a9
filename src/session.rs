use crate::client::TransformBackend;
use crate::dispatcher::{Dispatcher, Outcome};
use crate::editor::EditorState;
use crate::error::SubmitError;
use crate::ledger::Ledger;

/// One editing session: the editor state, the history ledger and the
/// dispatcher, wired together explicitly.
pub struct Session<B> {
    pub editor: EditorState,
    pub ledger: Ledger,
    dispatcher: Dispatcher<B>,
}

impl<B: TransformBackend> Session<B> {
    pub fn new(editor: EditorState, ledger: Ledger, backend: B) -> Self {
        Self {
            editor,
            ledger,
            dispatcher: Dispatcher::new(backend),
        }
    }

    pub fn can_retry(&self) -> bool {
        self.dispatcher.can_retry()
    }

    pub fn retry_count(&self) -> u32 {
        self.dispatcher.retry_count()
    }

    /// Send the current command against the current source text.
    pub async fn submit(&mut self) -> Result<Outcome, SubmitError> {
        self.editor.dismiss_error();
        let command = self.editor.command.clone();
        let source = self.editor.original_text.clone();
        let result = self.dispatcher.submit(&command, &source, &mut self.ledger).await;
        self.reconcile(result)
    }

    pub async fn retry(&mut self) -> Result<Outcome, SubmitError> {
        let result = self.dispatcher.retry(&mut self.ledger).await;
        self.reconcile(result)
    }

    fn reconcile(&mut self, result: Result<Outcome, SubmitError>) -> Result<Outcome, SubmitError> {
        match &result {
            Ok(outcome) => self.editor.apply_outcome(outcome, self.dispatcher.can_retry()),
            Err(err) => self.editor.reject(*err),
        }
        result
    }

    /// Load a past record's command and source back into the editor.
    pub fn reuse(&mut self, id: &str) -> bool {
        match self.ledger.get(id) {
            Some(record) => {
                let record = record.clone();
                self.editor.reuse(&record);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransformResponse;
    use crate::dispatcher::tests::{text, StubBackend};
    use crate::error::{Failure, FailureKind, ValidationError};
    use crate::store_manager::HistoryStore;
    use pretty_assertions::assert_eq;

    fn session(responses: Vec<Result<TransformResponse, Failure>>, source: &str) -> Session<StubBackend> {
        Session::new(
            EditorState::new(source),
            Ledger::open(HistoryStore::in_memory()),
            StubBackend::with(responses),
        )
    }

    #[tokio::test]
    async fn formal_rewrite_updates_result_and_history() {
        let mut s = session(vec![text("Greetings, world.")], "hello world");
        s.editor.command = "Make it more formal".to_string();

        s.submit().await.unwrap();

        assert_eq!(s.editor.edited_text, "Greetings, world.");
        let newest = s.ledger.latest().unwrap();
        assert!(newest.success);
        assert_eq!(newest.result.as_deref(), Some("Greetings, world."));
    }

    #[tokio::test]
    async fn empty_result_leaves_text_untouched() {
        let mut s = session(vec![Ok(TransformResponse::default())], "hello world");
        s.editor.edit_result("my manual edit");
        s.editor.command = "summarize this".to_string();

        s.submit().await.unwrap();

        assert_eq!(s.editor.edited_text, "my manual edit");
        let newest = s.ledger.latest().unwrap();
        assert!(!newest.success);
        assert!(newest.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert_eq!(s.editor.error().unwrap().key, "error_empty_result");
    }

    #[tokio::test]
    async fn validation_error_is_shown_without_history() {
        let mut s = session(vec![], "hello world");
        s.editor.command = "   ".to_string();
        assert!(s.submit().await.is_err());
        assert!(s.ledger.is_empty());
        assert_eq!(s.editor.error().unwrap().key, "error_empty_command");
    }

    #[tokio::test]
    async fn fourth_retry_is_rejected_locally() {
        let failure = || Err(Failure::new(FailureKind::Timeout, "operation timed out"));
        let mut s = session(vec![failure(), failure(), failure(), failure()], "hello");
        s.editor.command = "rewrite this".to_string();

        s.submit().await.unwrap();
        for _ in 0..3 {
            s.retry().await.unwrap();
        }
        assert!(!s.editor.error().unwrap().retryable);
        assert_eq!(s.retry().await, Err(SubmitError::RetryExhausted));
        assert_eq!(s.editor.error().unwrap().key, "error_retry_exhausted");
        assert_eq!(s.ledger.len(), 4);
    }

    #[tokio::test]
    async fn rejected_submit_disarms_the_previous_retry() {
        let mut s = session(
            vec![Err(Failure::new(FailureKind::ServerError, "HTTP 500: x")), text("OLD RESULT")],
            "old text",
        );
        s.editor.command = "rewrite old".to_string();
        s.submit().await.unwrap();
        assert!(s.can_retry());

        s.editor.set_original("new text");
        s.editor.command = "ab".to_string();
        assert_eq!(
            s.submit().await,
            Err(SubmitError::Invalid(ValidationError::CommandTooShort))
        );
        assert!(!s.can_retry());
        assert_eq!(s.retry_count(), 0);

        assert_eq!(s.retry().await, Err(SubmitError::NothingToRetry));
        assert_eq!(s.editor.edited_text, "old text");
        assert_eq!(s.ledger.len(), 1);
    }

    #[tokio::test]
    async fn new_submit_clears_previous_error() {
        let mut s = session(
            vec![Err(Failure::new(FailureKind::ServerError, "HTTP 500: x")), text("fine")],
            "hello",
        );
        s.editor.command = "rewrite this".to_string();
        s.submit().await.unwrap();
        assert!(s.editor.error().is_some());
        s.submit().await.unwrap();
        assert!(s.editor.error().is_none());
    }

    #[tokio::test]
    async fn reuse_restores_a_past_attempt() {
        let mut s = session(vec![text("Short.")], "a long meeting transcript");
        s.editor.command = "summarize this".to_string();
        s.submit().await.unwrap();
        let id = s.ledger.latest().unwrap().id.clone();

        s.editor.command.clear();
        s.editor.set_original("something else");
        assert!(s.reuse(&id));
        assert_eq!(s.editor.command, "summarize this");
        assert_eq!(s.editor.original_text, "a long meeting transcript");
        assert!(!s.reuse("missing"));
    }
}
