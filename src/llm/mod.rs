use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::LlmSettings;

/// Defines the shape of a chat-style interaction with an LLM.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub attachments: Vec<ImageAttachment>,
    pub json_output: bool,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            attachments: Vec::new(),
            json_output: false,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<ImageAttachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Ask the provider to constrain its output to a JSON object.
    pub fn expect_json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Individual chat message, compatible with OpenAI compliant providers.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

/// Image reference forwarded as-is: either a `data:` URL or a remote URL.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub url: String,
}

impl ImageAttachment {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Captures basic token usage metrics associated with a call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub response_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub token_usage: TokenUsage,
    pub model: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request could not be sent: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status; `body` is the upstream payload (JSON when parseable).
    #[error("LLM endpoint returned status {status}")]
    Status { status: StatusCode, body: Value },

    #[error("unexpected LLM response payload: {0}")]
    Payload(String),
}

/// OpenRouter (chat-completions) client. Credentials are supplied per call.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: LlmSettings,
}

impl LlmClient {
    pub fn new(config: LlmSettings) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    pub async fn execute(&self, api_key: &str, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let payload = build_payload(&request);

        let mut req_builder = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&payload);

        if let Some(referer) = &self.config.referer {
            req_builder = req_builder.header("HTTP-Referer", referer);
        }

        if let Some(title) = &self.config.title {
            req_builder = req_builder.header("X-Title", title);
        }

        let response = req_builder.send().await?;
        let status = response.status();
        let response_text = response.text().await?;
        let body = serde_json::from_str::<Value>(&response_text)
            .unwrap_or_else(|_| Value::String(response_text.clone()));

        if !status.is_success() {
            return Err(LlmError::Status { status, body });
        }

        let (text, usage) = extract_text_and_usage(&body)
            .ok_or_else(|| LlmError::Payload(preview(&response_text)))?;

        let token_usage = fill_token_usage(usage, &request, &text);

        Ok(LlmResponse {
            text,
            token_usage,
            model: request.model,
        })
    }
}

fn build_payload(request: &LlmRequest) -> Value {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    for msg in &request.messages {
        if request.attachments.is_empty() {
            messages.push(json!({
                "role": msg.role.as_str(),
                "content": msg.text,
            }));
        } else {
            messages.push(json!({
                "role": msg.role.as_str(),
                "content": [
                    {
                        "type": "text",
                        "text": msg.text,
                    }
                ],
            }));
        }
    }

    // Images ride along with the last user message.
    if !request.attachments.is_empty() {
        let target = match messages
            .iter()
            .rposition(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
        {
            Some(idx) => idx,
            None => {
                messages.push(json!({ "role": "user", "content": [] }));
                messages.len() - 1
            }
        };

        if let Some(parts) = messages[target]
            .get_mut("content")
            .and_then(Value::as_array_mut)
        {
            for attachment in &request.attachments {
                parts.push(json!({
                    "type": "image_url",
                    "image_url": { "url": attachment.url },
                }));
            }
        }
    }

    let mut payload = json!({
        "model": request.model,
        "messages": messages,
    });
    if request.json_output {
        payload["response_format"] = json!({ "type": "json_object" });
    }
    payload
}

fn extract_text_and_usage(value: &Value) -> Option<(String, Option<TokenUsage>)> {
    let chat = serde_json::from_value::<ChatCompletionPayload>(value.clone()).ok()?;
    let text = chat
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)?;

    let usage = chat.usage.map(|usage| TokenUsage {
        prompt_tokens: usage.prompt_tokens.unwrap_or_default(),
        response_tokens: usage.completion_tokens.unwrap_or_default(),
        total_tokens: usage.total_tokens.unwrap_or_default(),
    });

    Some((text, usage))
}

/// Upstream counts win; zeros fall back to a whitespace estimate.
fn fill_token_usage(usage: Option<TokenUsage>, request: &LlmRequest, text: &str) -> TokenUsage {
    let mut token_usage = usage.unwrap_or_default();
    if token_usage.prompt_tokens == 0 {
        token_usage.prompt_tokens = approximate_token_count(
            &request
                .messages
                .iter()
                .map(|m| m.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }
    if token_usage.response_tokens == 0 {
        token_usage.response_tokens = approximate_token_count(text);
    }
    token_usage.total_tokens = token_usage
        .prompt_tokens
        .saturating_add(token_usage.response_tokens);
    token_usage
}

fn approximate_token_count(input: &str) -> usize {
    input.split_whitespace().count()
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(500) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPayload {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> LlmRequest {
        LlmRequest::new(
            "openai/gpt-4o-mini",
            vec![
                ChatMessage::new(MessageRole::System, "be strict"),
                ChatMessage::new(MessageRole::User, "check this"),
            ],
        )
    }

    #[test]
    fn payload_uses_plain_content_without_images() {
        let payload = build_payload(&request());
        assert_eq!(payload["model"], "openai/gpt-4o-mini");
        assert_eq!(payload["messages"][1]["content"], "check this");
        assert!(payload.get("response_format").is_none());
    }

    #[test]
    fn payload_attaches_images_to_last_user_message() {
        let payload = build_payload(
            &request()
                .with_attachments(vec![ImageAttachment::new("data:image/png;base64,AAAA")])
                .expect_json(),
        );

        let parts = payload["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "check this");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert_eq!(payload["response_format"]["type"], "json_object");
    }

    #[test]
    fn extracts_chat_completion_text_and_usage() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"ok\":true}" } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        });
        let (text, usage) = extract_text_and_usage(&body).unwrap();
        assert_eq!(text, "{\"ok\":true}");
        assert_eq!(usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn missing_choices_is_not_a_response() {
        assert!(extract_text_and_usage(&json!({ "choices": [] })).is_none());
        assert!(extract_text_and_usage(&json!("oops")).is_none());
    }

    #[test]
    fn upstream_usage_totals_saturate() {
        let usage = TokenUsage {
            prompt_tokens: usize::MAX,
            response_tokens: 7,
            total_tokens: 0,
        };
        let filled = fill_token_usage(Some(usage), &request(), "ignored");
        assert_eq!(filled.prompt_tokens, usize::MAX);
        assert_eq!(filled.total_tokens, usize::MAX);
    }

    #[test]
    fn missing_usage_is_estimated_from_words() {
        let filled = fill_token_usage(None, &request(), "three word reply");
        assert_eq!(filled.prompt_tokens, 4);
        assert_eq!(filled.response_tokens, 3);
        assert_eq!(filled.total_tokens, 7);
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = LlmClient::new(LlmSettings {
            base_url: "http://127.0.0.1:9999/api/v1/".into(),
            referer: None,
            title: None,
        });
        assert_eq!(
            client.endpoint(),
            "http://127.0.0.1:9999/api/v1/chat/completions"
        );
    }
}
