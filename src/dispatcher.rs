use crate::client::{TransformBackend, TransformRequest};
use crate::error::{Failure, FailureKind, SubmitError, ValidationError};
use crate::ledger::Ledger;
use crate::router::{route_for, Route};
use crate::storage::{AgentInfo, CommandRecord};
use chrono::Utc;
use std::time::Instant;

pub const MIN_COMMAND_LEN: usize = 3;
pub const MAX_RETRIES: u32 = 3;

/// What a dispatched request produced. Consumed by the ledger append here and
/// by the editor update in [`crate::editor::EditorState::apply_outcome`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Transformed { result: String, agent_info: AgentInfo },
    Failed(Failure),
}

pub fn validate(command: &str, source_text: &str) -> Result<(), ValidationError> {
    let command = command.trim();
    if command.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }
    if source_text.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    if command.chars().count() < MIN_COMMAND_LEN {
        return Err(ValidationError::CommandTooShort);
    }
    Ok(())
}

struct LastRequest {
    command: String,
    text: String,
    retryable: bool,
}

/// Validates, routes and sends commands, recording every dispatched attempt.
/// Methods take `&mut self`, so one request is in flight at a time.
pub struct Dispatcher<B> {
    backend: B,
    retry_count: u32,
    last: Option<LastRequest>,
}

impl<B: TransformBackend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            retry_count: 0,
            last: None,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// True when the last dispatch failed with a retryable kind and the retry
    /// budget is not spent.
    pub fn can_retry(&self) -> bool {
        matches!(&self.last, Some(last) if last.retryable) && self.retry_count < MAX_RETRIES
    }

    pub async fn submit(
        &mut self,
        command: &str,
        source_text: &str,
        ledger: &mut Ledger,
    ) -> Result<Outcome, SubmitError> {
        // A rejected submit still supersedes whatever was armed for retry.
        self.retry_count = 0;
        self.last = None;
        validate(command, source_text)?;
        Ok(self.dispatch(command.trim(), source_text, ledger).await)
    }

    /// Re-send the last request. Rejected locally, without a request, once
    /// [`MAX_RETRIES`] retries have been spent.
    pub async fn retry(&mut self, ledger: &mut Ledger) -> Result<Outcome, SubmitError> {
        let (command, text) = match &self.last {
            None => return Err(SubmitError::NothingToRetry),
            Some(last) if !last.retryable => return Err(SubmitError::NotRetryable),
            Some(last) => (last.command.clone(), last.text.clone()),
        };
        if self.retry_count >= MAX_RETRIES {
            tracing::info!(command = %command, "retry limit reached");
            return Err(SubmitError::RetryExhausted);
        }
        self.retry_count += 1;
        tracing::info!(command = %command, attempt = self.retry_count, "retrying command");
        Ok(self.dispatch(&command, &text, ledger).await)
    }

    async fn dispatch(&mut self, command: &str, source_text: &str, ledger: &mut Ledger) -> Outcome {
        let route = route_for(command);
        let pending = CommandRecord::pending(command, source_text);
        let request = TransformRequest {
            text: source_text.to_string(),
            command: command.to_string(),
        };

        let started = Instant::now();
        let response = self.backend.transform(route, &request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let outcome = match response {
            Ok(resp) => match resp.result.filter(|r| !r.trim().is_empty()) {
                Some(result) => Outcome::Transformed {
                    result,
                    agent_info: resp
                        .agent_info
                        .unwrap_or_else(|| local_agent_info(route, elapsed_ms)),
                },
                None => Outcome::Failed(Failure::new(
                    FailureKind::EmptyResult,
                    "backend returned no result",
                )),
            },
            Err(failure) => Outcome::Failed(failure),
        };

        let record = match &outcome {
            Outcome::Transformed { result, agent_info } => {
                self.retry_count = 0;
                self.last = None;
                tracing::info!(%route, elapsed_ms, "command succeeded");
                pending.succeeded(result.clone(), agent_info.clone())
            }
            Outcome::Failed(failure) => {
                tracing::warn!(%route, kind = ?failure.kind, error = %failure.message, "command failed");
                self.last = Some(LastRequest {
                    command: command.to_string(),
                    text: source_text.to_string(),
                    retryable: failure.retryable(),
                });
                pending.failed(failure.message.clone())
            }
        };
        ledger.append(record);
        outcome
    }
}

// Older backends omit agent_info; describe the request from what we observed.
fn local_agent_info(route: Route, elapsed_ms: u64) -> AgentInfo {
    AgentInfo {
        model: route.engine().to_string(),
        processing_time_ms: elapsed_ms,
        tokens_used: None,
        confidence_score: None,
        timestamp: Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::TransformResponse;
    use crate::store_manager::HistoryStore;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every call.
    #[derive(Default)]
    pub(crate) struct StubBackend {
        responses: Mutex<VecDeque<Result<TransformResponse, Failure>>>,
        pub(crate) calls: Mutex<Vec<(Route, TransformRequest)>>,
    }

    impl StubBackend {
        pub(crate) fn with(responses: Vec<Result<TransformResponse, Failure>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TransformBackend for StubBackend {
        async fn transform(
            &self,
            route: Route,
            request: &TransformRequest,
        ) -> Result<TransformResponse, Failure> {
            self.calls.lock().unwrap().push((route, request.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Failure::new(FailureKind::Unknown, "no stubbed response")))
        }
    }

    pub(crate) fn text(result: &str) -> Result<TransformResponse, Failure> {
        Ok(TransformResponse {
            result: Some(result.to_string()),
            agent_info: None,
        })
    }

    fn server_error() -> Result<TransformResponse, Failure> {
        Err(Failure::new(FailureKind::ServerError, "HTTP 500: boom"))
    }

    fn ledger() -> Ledger {
        Ledger::open(HistoryStore::in_memory())
    }

    #[test]
    fn validation_order() {
        assert_eq!(validate("", "text"), Err(ValidationError::EmptyCommand));
        assert_eq!(validate("   ", ""), Err(ValidationError::EmptyCommand));
        assert_eq!(validate("summarize", "  \n"), Err(ValidationError::EmptyText));
        assert_eq!(validate(" ab ", "text"), Err(ValidationError::CommandTooShort));
        assert_eq!(validate("abc", "text"), Ok(()));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_backend_or_ledger() {
        let mut dispatcher = Dispatcher::new(StubBackend::default());
        let mut ledger = ledger();

        for (command, text) in [("", "hello"), ("summarize", ""), ("ab", "hello")] {
            let err = dispatcher.submit(command, text, &mut ledger).await.unwrap_err();
            assert!(matches!(err, SubmitError::Invalid(_)));
        }
        assert!(ledger.is_empty());
        assert_eq!(dispatcher.backend.call_count(), 0);
    }

    #[tokio::test]
    async fn success_is_recorded_with_synthesized_agent_info() {
        let mut dispatcher = Dispatcher::new(StubBackend::with(vec![text("Greetings, world.")]));
        let mut ledger = ledger();

        let outcome = dispatcher
            .submit("Make it more formal", "hello world", &mut ledger)
            .await
            .unwrap();
        let Outcome::Transformed { result, agent_info } = outcome else {
            panic!("expected success");
        };
        assert_eq!(result, "Greetings, world.");
        assert_eq!(agent_info.model, "style-transformer");

        let calls = dispatcher.backend.calls.lock().unwrap();
        assert_eq!(calls[0].0, Route::Transform);
        assert_eq!(calls[0].1.text, "hello world");
        drop(calls);

        let newest = ledger.latest().unwrap();
        assert!(newest.success);
        assert_eq!(newest.result.as_deref(), Some("Greetings, world."));
        assert_eq!(newest.original_text, "hello world");
        assert!(newest.error.is_none());
    }

    #[tokio::test]
    async fn backend_agent_info_is_kept() {
        let info = AgentInfo {
            model: "remote-model".to_string(),
            processing_time_ms: 999,
            tokens_used: Some(12),
            confidence_score: Some(0.9),
            timestamp: "2024-05-01T10:00:00Z".to_string(),
        };
        let mut dispatcher = Dispatcher::new(StubBackend::with(vec![Ok(TransformResponse {
            result: Some("short".to_string()),
            agent_info: Some(info.clone()),
        })]));
        let mut ledger = ledger();
        dispatcher.submit("summarize this", "long text", &mut ledger).await.unwrap();
        assert_eq!(ledger.latest().unwrap().agent_info.as_ref(), Some(&info));
    }

    #[tokio::test]
    async fn empty_result_is_a_recorded_failure() {
        let mut dispatcher = Dispatcher::new(StubBackend::with(vec![Ok(TransformResponse::default())]));
        let mut ledger = ledger();

        let outcome = dispatcher.submit("summarize this", "text", &mut ledger).await.unwrap();
        match outcome {
            Outcome::Failed(f) => {
                assert_eq!(f.kind, FailureKind::EmptyResult);
                assert!(f.retryable());
            }
            other => panic!("unexpected {other:?}"),
        }
        let newest = ledger.latest().unwrap();
        assert!(!newest.success);
        assert!(!newest.error.as_deref().unwrap_or("").is_empty());
    }

    #[tokio::test]
    async fn every_dispatch_appends_exactly_one_record() {
        let mut dispatcher = Dispatcher::new(StubBackend::with(vec![
            text("a"),
            server_error(),
            Err(Failure::new(FailureKind::BadRequest, "HTTP 400: bad")),
            text(""),
        ]));
        let mut ledger = ledger();
        for n in 1..=4 {
            dispatcher.submit("rewrite it", "text", &mut ledger).await.unwrap();
            assert_eq!(ledger.len(), n);
        }
    }

    #[tokio::test]
    async fn retries_are_capped() {
        let mut dispatcher = Dispatcher::new(StubBackend::with(vec![
            server_error(),
            server_error(),
            server_error(),
            server_error(),
        ]));
        let mut ledger = ledger();

        dispatcher.submit("rewrite it", "text", &mut ledger).await.unwrap();
        for attempt in 1..=3 {
            let outcome = dispatcher.retry(&mut ledger).await.unwrap();
            assert!(matches!(outcome, Outcome::Failed(_)));
            assert_eq!(dispatcher.retry_count(), attempt);
        }
        assert!(!dispatcher.can_retry());
        assert_eq!(dispatcher.retry(&mut ledger).await, Err(SubmitError::RetryExhausted));
        assert_eq!(dispatcher.backend.call_count(), 4);
        assert_eq!(ledger.len(), 4);
    }

    #[tokio::test]
    async fn successful_retry_resets_the_counter() {
        let mut dispatcher = Dispatcher::new(StubBackend::with(vec![server_error(), text("done")]));
        let mut ledger = ledger();

        dispatcher.submit("rewrite it", "text", &mut ledger).await.unwrap();
        let outcome = dispatcher.retry(&mut ledger).await.unwrap();
        assert!(matches!(outcome, Outcome::Transformed { .. }));
        assert_eq!(dispatcher.retry_count(), 0);
        assert_eq!(dispatcher.retry(&mut ledger).await, Err(SubmitError::NothingToRetry));
    }

    #[tokio::test]
    async fn bad_request_is_not_retryable() {
        let mut dispatcher = Dispatcher::new(StubBackend::with(vec![Err(Failure::new(
            FailureKind::BadRequest,
            "HTTP 400: bad",
        ))]));
        let mut ledger = ledger();
        dispatcher.submit("rewrite it", "text", &mut ledger).await.unwrap();
        assert_eq!(dispatcher.retry(&mut ledger).await, Err(SubmitError::NotRetryable));
        assert_eq!(dispatcher.backend.call_count(), 1);
    }
}
