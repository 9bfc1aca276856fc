// src/assistant.rs
// Remote assistant protocol adapter. Hides the service's asynchronous job
// model (threads, runs, run polling) behind a blocking ask-and-answer call.

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use crate::config::AssistantConfig;
use crate::error::SurveyError;

/// Remote-side conversation handle. Owned by exactly one trial; never
/// reused. The service reclaims the remote state on its own schedule.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
}

/// The call contract the orchestration layers depend on. Constructed once
/// and passed down by reference so tests can substitute a scripted fake.
pub trait AssistantService {
    fn create_session(&self) -> Result<SessionHandle, SurveyError>;

    /// Appends `message_text` as a user turn, starts a processing job with
    /// `instructions_text`, blocks until the job is terminal, and returns
    /// the newest assistant-authored message body.
    fn ask(
        &self,
        session: &SessionHandle,
        assistant: &AssistantConfig,
        message_text: &str,
        instructions_text: &str,
    ) -> Result<String, SurveyError>;
}

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    role: String,
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<MessageText>,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

pub struct OpenAiAssistantClient {
    http: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    poll_max_attempts: u32,
}

impl OpenAiAssistantClient {
    pub fn new(
        api_key: &str,
        base_url: &str,
        poll_interval: Duration,
        poll_max_attempts: u32,
    ) -> Result<Self, SurveyError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SurveyError::Configuration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval,
            poll_max_attempts,
        })
    }

    fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::blocking::Response, String> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(body)
            .send()
            .map_err(|e| e.to_string())?;
        check_status(response)
    }

    fn get(&self, path: &str) -> Result<reqwest::blocking::Response, String> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .map_err(|e| e.to_string())?;
        check_status(response)
    }

    /// Polls the run at a fixed interval until it is terminal. The attempt
    /// budget converts a hung job into `JobTimeout` instead of spinning
    /// forever.
    fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<(), SurveyError> {
        for attempt in 0..self.poll_max_attempts {
            let run: RunObject = self
                .get(&format!("/threads/{thread_id}/runs/{run_id}"))
                .map_err(SurveyError::TransientRequest)?
                .json()
                .map_err(|e| SurveyError::TransientRequest(format!("invalid run object: {e}")))?;

            trace!(run = run_id, status = %run.status, attempt, "run polled");
            match run.status.as_str() {
                "completed" => return Ok(()),
                // The survey assistants define no tools, so a run that
                // stops for tool output is as dead as a failed one.
                "failed" | "cancelled" | "expired" | "incomplete" | "requires_action" => {
                    return Err(SurveyError::JobFailed(run.status));
                }
                _ => thread::sleep(self.poll_interval),
            }
        }
        Err(SurveyError::JobTimeout {
            attempts: self.poll_max_attempts,
            interval_secs: self.poll_interval.as_secs(),
        })
    }
}

impl AssistantService for OpenAiAssistantClient {
    fn create_session(&self) -> Result<SessionHandle, SurveyError> {
        let thread: ThreadObject = self
            .post("/threads", &json!({}))
            .map_err(SurveyError::SessionCreation)?
            .json()
            .map_err(|e| SurveyError::SessionCreation(format!("invalid thread object: {e}")))?;
        Ok(SessionHandle { id: thread.id })
    }

    fn ask(
        &self,
        session: &SessionHandle,
        assistant: &AssistantConfig,
        message_text: &str,
        instructions_text: &str,
    ) -> Result<String, SurveyError> {
        // 1. Append the user turn.
        self.post(
            &format!("/threads/{}/messages", session.id),
            &json!({ "role": "user", "content": message_text }),
        )
        .map_err(SurveyError::TransientRequest)?;

        // 2. Start the processing job.
        let run: RunObject = self
            .post(
                &format!("/threads/{}/runs", session.id),
                &json!({
                    "assistant_id": assistant.assistant_id,
                    "instructions": instructions_text,
                }),
            )
            .map_err(SurveyError::TransientRequest)?
            .json()
            .map_err(|e| SurveyError::TransientRequest(format!("invalid run object: {e}")))?;

        // 3. Block until the job is terminal.
        self.wait_for_run(&session.id, &run.id)?;

        // 4. The newest assistant message carries the answer. The service
        // lists messages newest-first.
        let messages: MessageList = self
            .get(&format!("/threads/{}/messages", session.id))
            .map_err(SurveyError::TransientRequest)?
            .json()
            .map_err(|e| SurveyError::TransientRequest(format!("invalid message list: {e}")))?;

        messages
            .data
            .iter()
            .find(|m| m.role == "assistant")
            .and_then(|m| {
                m.content
                    .iter()
                    .find(|c| c.kind == "text")
                    .and_then(|c| c.text.as_ref())
            })
            .map(|t| t.value.clone())
            .ok_or_else(|| {
                SurveyError::TransientRequest(
                    "job completed but no assistant text message was found".to_string(),
                )
            })
    }
}

fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, String> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().unwrap_or_default();
        Err(format!("HTTP {status}: {body}"))
    }
}
