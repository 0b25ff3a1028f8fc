//! Testing utilities.
//!
//! [`ScriptedModel`] stands in for the Claude client in deterministic tests:
//! it returns queued responses in order and records every request it saw, so
//! tests can assert on retry conversations without any API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::roles::NarrativeModel;

/// A model double that replays scripted responses.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<claude::Response>>,
    requests: Mutex<Vec<claude::Request>>,
    calls: AtomicUsize,
    fail: bool,
}

impl ScriptedModel {
    /// Create a model that returns the given responses in order. Once the
    /// script runs out it keeps answering with a plain narration.
    pub fn new(responses: Vec<claude::Response>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Create a model whose every call fails with a network error.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of completion calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, if any call was made.
    pub fn last_request(&self) -> Option<claude::Request> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<claude::Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Append another scripted response.
    pub fn queue(&self, response: claude::Response) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Build a text-only response.
    pub fn text_response(text: impl Into<String>) -> claude::Response {
        claude::Response {
            id: "scripted".to_string(),
            model: "scripted".to_string(),
            content: vec![claude::ContentBlock::Text { text: text.into() }],
            stop_reason: claude::StopReason::EndTurn,
            usage: claude::Usage {
                input_tokens: 0,
                output_tokens: 0,
            },
        }
    }

    /// Build a response carrying narrative text plus tool-use blocks.
    ///
    /// Pass an empty string to script a response with no narration.
    pub fn tool_response(
        text: impl Into<String>,
        calls: Vec<(&str, Value)>,
    ) -> claude::Response {
        let text = text.into();
        let mut content = Vec::new();
        if !text.is_empty() {
            content.push(claude::ContentBlock::Text { text });
        }
        for (index, (name, input)) in calls.into_iter().enumerate() {
            content.push(claude::ContentBlock::ToolUse {
                id: format!("tu_{index}"),
                name: name.to_string(),
                input,
            });
        }
        claude::Response {
            id: "scripted".to_string(),
            model: "scripted".to_string(),
            content,
            stop_reason: claude::StopReason::ToolUse,
            usage: claude::Usage {
                input_tokens: 0,
                output_tokens: 0,
            },
        }
    }
}

#[async_trait]
impl NarrativeModel for ScriptedModel {
    async fn complete(
        &self,
        request: claude::Request,
    ) -> Result<claude::Response, claude::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        if self.fail {
            return Err(claude::Error::Network("scripted failure".to_string()));
        }

        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Self::text_response("The scripted model has nothing more to say.")
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_model_replays_in_order() {
        let model = ScriptedModel::new(vec![
            ScriptedModel::text_response("first"),
            ScriptedModel::text_response("second"),
        ]);

        let request = claude::Request::new(vec![claude::Message::user("hi")]);
        assert_eq!(model.complete(request.clone()).await.unwrap().text(), "first");
        assert_eq!(model.complete(request.clone()).await.unwrap().text(), "second");
        // Script exhausted: default narration.
        assert!(model
            .complete(request)
            .await
            .unwrap()
            .text()
            .contains("nothing more"));
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_tool_response_shape() {
        let response = ScriptedModel::tool_response(
            "narration",
            vec![("move_player", json!({"destination": "Cave"}))],
        );
        assert_eq!(response.stop_reason, claude::StopReason::ToolUse);
        assert_eq!(response.tool_uses().len(), 1);

        let bare = ScriptedModel::tool_response("", vec![("advance_story", json!({}))]);
        assert!(bare.text().is_empty());
    }

    #[tokio::test]
    async fn test_failing_model() {
        let model = ScriptedModel::failing();
        let request = claude::Request::new(vec![claude::Message::user("hi")]);
        assert!(model.complete(request).await.is_err());
    }
}
