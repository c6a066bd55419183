//! Content analysis: prompt the detector model, parse its verdict, store the scan.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    history::{self, RiskLevel, ScanRecord},
    llm::{ChatMessage, ImageAttachment, LlmClient, LlmError, LlmRequest, MessageRole},
    settings::{self, Credential},
};

pub const MAX_STORED_CONTENT_CHARS: usize = 500;
const IMAGE_ONLY_PROMPT: &str = "Analyze this image.";
const IMAGE_ONLY_CONTENT: &str = "Image Only";

const DETECTOR_INSTRUCTIONS: &str = r#"You are an expert AI Misinformation Detection System. Analyze the provided content (text and/or image) for signs of AI generation and misinformation.
Respond ONLY with a valid JSON object in the following format:
{
  "isAIGenerated": boolean,
  "confidenceScore": number (0-100),
  "riskLevel": "low" | "medium" | "high",
  "indicators": ["indicator 1", "indicator 2"],
  "factCheckSuggestion": "suggestion string",
  "verdict": "Short verdict string"
}"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisInput {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl AnalysisInput {
    fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.trim().is_empty())
    }

    fn image(&self) -> Option<&str> {
        self.image
            .as_deref()
            .map(str::trim)
            .filter(|image| !image.is_empty())
    }

    fn model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|model| !model.is_empty())
    }
}

/// Structured judgment returned by the detector model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    #[serde(rename = "isAIGenerated")]
    pub is_ai_generated: bool,
    pub confidence_score: f64,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub indicators: Vec<String>,
    #[serde(default)]
    pub fact_check_suggestion: String,
    #[serde(default)]
    pub verdict: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub id: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

/// Run one analysis.
///
/// With `caller` set the caller's own key is used and the scan is stored under
/// their id; without it the first configured key in the store is borrowed and
/// the scan is stored anonymously.
pub async fn analyze(
    pool: &SqlitePool,
    llm: &LlmClient,
    default_model: &str,
    input: AnalysisInput,
    caller: Option<i64>,
) -> Result<AnalysisOutcome> {
    if input.text().is_none() && input.image().is_none() {
        return Err(AppError::Validation(
            "Either text or image is required".to_string(),
        ));
    }

    let credential = resolve_credential(pool, caller).await?;
    let model = input
        .model()
        .or(credential.model.as_deref().filter(|m| !m.trim().is_empty()))
        .unwrap_or(default_model)
        .to_string();

    let request = build_request(&model, input.text(), input.image());
    let response = llm
        .execute(&credential.api_key, request)
        .await
        .map_err(upstream_error)?;

    let verdict = parse_verdict(&response.text)?;
    info!(
        model = %response.model,
        tokens = response.token_usage.total_tokens,
        risk = %verdict.risk_level,
        "analysis completed"
    );

    let scan = ScanRecord {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        content: stored_content(input.text()),
        image_url: input.image().map(str::to_string),
        is_ai_generated: verdict.is_ai_generated,
        confidence_score: verdict.confidence_score,
        risk_level: verdict.risk_level,
        indicators: verdict.indicators.clone(),
        fact_check_suggestion: verdict.fact_check_suggestion.clone(),
        verdict: verdict.verdict.clone(),
    };
    history::insert_scan(pool, caller, &scan).await?;

    Ok(AnalysisOutcome {
        id: scan.id,
        timestamp: scan.timestamp,
        verdict,
    })
}

async fn resolve_credential(pool: &SqlitePool, caller: Option<i64>) -> Result<Credential> {
    let credential = match caller {
        Some(user_id) => settings::credential_for_user(pool, user_id).await?,
        None => {
            let pooled = settings::pooled_credential(pool).await?;
            if let Some(credential) = &pooled {
                info!(
                    lender = credential.user_id,
                    "funding anonymous analysis with a pooled credential"
                );
            }
            pooled
        }
    };

    credential.ok_or_else(|| match caller {
        Some(_) => AppError::ServiceUnavailable(
            "API Key is missing. Please configure it in Settings.".to_string(),
        ),
        None => AppError::ServiceUnavailable(
            "Service not configured. Admin must set API Key.".to_string(),
        ),
    })
}

fn build_request(model: &str, text: Option<&str>, image: Option<&str>) -> LlmRequest {
    let request = LlmRequest::new(
        model,
        vec![
            ChatMessage::new(MessageRole::System, DETECTOR_INSTRUCTIONS),
            ChatMessage::new(MessageRole::User, text.unwrap_or(IMAGE_ONLY_PROMPT)),
        ],
    )
    .expect_json();

    match image {
        Some(url) => request.with_attachments(vec![ImageAttachment::new(url)]),
        None => request,
    }
}

fn upstream_error(err: LlmError) -> AppError {
    match err {
        LlmError::Status { status, body } => {
            warn!(%status, "LLM endpoint rejected analysis request");
            AppError::Upstream(body)
        }
        LlmError::Transport(err) => AppError::Upstream(json!({ "message": err.to_string() })),
        LlmError::Payload(payload) => AppError::Parse(payload),
    }
}

fn stored_content(text: Option<&str>) -> String {
    match text {
        Some(text) => text.chars().take(MAX_STORED_CONTENT_CHARS).collect(),
        None => IMAGE_ONLY_CONTENT.to_string(),
    }
}

/// Parse the model's reply. Tolerates prose or code fences around the object.
pub fn parse_verdict(text: &str) -> Result<Verdict> {
    let object = extract_object_from_response(text)
        .ok_or_else(|| AppError::Parse(format!("model reply is not a JSON object: {text}")))?;

    let mut verdict: Verdict = serde_json::from_value(Value::Object(object))
        .map_err(|err| AppError::Parse(format!("verdict has unexpected shape: {err}")))?;
    verdict.confidence_score = verdict.confidence_score.clamp(0.0, 100.0);
    Ok(verdict)
}

fn extract_object_from_response(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Some(map);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
