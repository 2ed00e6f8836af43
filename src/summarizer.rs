use crate::types::{MonitorError, Result, Snippet};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const GROQ_MODEL: &str = "llama-3.3-70b-versatile";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Placeholder summary used when the model call fails for any reason.
pub const FALLBACK_SUMMARY: &str = "Unable to generate AI summary. Changes detected.";

/// Summary used when the model replied with valid JSON but no summary field.
const MISSING_SUMMARY: &str = "Changes detected but summary unavailable";

/// The diff is truncated to this many characters before inclusion in the
/// prompt, so summaries over very large diffs rest on partial evidence.
const MAX_DIFF_PROMPT_CHARS: usize = 3000;

const SYSTEM_PROMPT: &str =
    "You are a competitive intelligence analyst. Respond only with valid JSON.";

/// Connectivity probe deadline.
const PROBE_TIMEOUT_SECS: u64 = 5;

/// Which OpenAI-compatible backend to talk to, resolved once at startup
/// and passed down. Groq wins when both credentials are present.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl ProviderConfig {
    pub fn from_env() -> Option<Self> {
        Self::resolve(configured_key("GROQ_API_KEY"), configured_key("OPENAI_API_KEY"))
    }

    fn resolve(groq_key: Option<String>, openai_key: Option<String>) -> Option<Self> {
        if let Some(api_key) = groq_key {
            return Some(Self {
                api_key,
                base_url: GROQ_BASE_URL.to_string(),
                model: GROQ_MODEL.to_string(),
            });
        }
        openai_key.map(|api_key| Self {
            api_key,
            base_url: OPENAI_BASE_URL.to_string(),
            model: OPENAI_MODEL.to_string(),
        })
    }
}

/// Reads a credential, treating the `.env.example` placeholders
/// ("your-...-key-here") as unset.
fn configured_key(var: &str) -> Option<String> {
    let value = std::env::var(var).ok()?;
    if value.is_empty() || value.starts_with("your-") {
        None
    } else {
        Some(value)
    }
}

/// AI-produced description of a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub summary: String,
    pub snippets: Vec<Snippet>,
}

impl ChangeSummary {
    pub fn fallback() -> Self {
        Self {
            summary: FALLBACK_SUMMARY.to_string(),
            snippets: Vec::new(),
        }
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Describe what changed between two snapshots. Implementations are
    /// expected to degrade rather than fail, but callers must still treat
    /// an `Err` as best-effort enrichment and never let it block the
    /// factual diff from being persisted.
    async fn summarize(
        &self,
        old_text: &str,
        new_text: &str,
        diff_text: &str,
        url: &str,
    ) -> Result<ChangeSummary>;

    /// Lightweight connectivity check, independent of the main call path.
    async fn probe(&self) -> bool;
}

// --- OpenAI-compatible wire format ---

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Shape the model is instructed to reply with. Both fields tolerated
/// missing so a sloppy reply still yields a usable summary.
#[derive(Deserialize)]
struct RawSummary {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    snippets: Vec<Snippet>,
}

/// Summarizer backed by an OpenAI-compatible chat-completion endpoint.
/// Works unconfigured: with no provider every call degrades to the
/// fallback summary and the probe reports unreachable.
pub struct LlmSummarizer {
    client: Client,
    provider: Option<ProviderConfig>,
}

impl LlmSummarizer {
    pub fn new(provider: Option<ProviderConfig>) -> Self {
        Self {
            client: Client::new(),
            provider,
        }
    }

    async fn request_summary(&self, diff_text: &str, url: &str) -> Result<ChangeSummary> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            MonitorError::Summarization("no LLM provider configured".to_string())
        })?;

        let request = ChatRequest {
            model: provider.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(diff_text, url),
                },
            ],
            temperature: 0.7,
            max_tokens: 500,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", provider.base_url))
            .bearer_auth(&provider.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .unwrap_or("{}");

        parse_summary(content)
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        _old_text: &str,
        _new_text: &str,
        diff_text: &str,
        url: &str,
    ) -> Result<ChangeSummary> {
        match self.request_summary(diff_text, url).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                warn!("Summarization failed for {}: {}", url, e);
                Ok(ChangeSummary::fallback())
            }
        }
    }

    async fn probe(&self) -> bool {
        let provider = match &self.provider {
            Some(provider) => provider,
            None => return false,
        };

        let request = ChatRequest {
            model: provider.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: "test".to_string(),
            }],
            temperature: 0.7,
            max_tokens: 5,
        };

        let call = async {
            let response = self
                .client
                .post(format!("{}/chat/completions", provider.base_url))
                .bearer_auth(&provider.api_key)
                .json(&request)
                .send()
                .await?
                .error_for_status()?;
            response.json::<ChatResponse>().await
        };

        match tokio::time::timeout(Duration::from_secs(PROBE_TIMEOUT_SECS), call).await {
            Ok(Ok(body)) => !body.choices.is_empty(),
            Ok(Err(e)) => {
                debug!("LLM probe failed: {}", e);
                false
            }
            Err(_) => {
                debug!("LLM probe timed out after {}s", PROBE_TIMEOUT_SECS);
                false
            }
        }
    }
}

fn build_prompt(diff_text: &str, url: &str) -> String {
    format!(
        r#"You are analyzing changes to a competitor's webpage.

URL: {url}

The page has changed. Here's the diff (showing additions with + and removals with -):
{diff}

Based on these changes, provide:
1. A concise summary (2-3 sentences) of what changed
2. Extract 2-3 important snippets with their context

Format your response as JSON:
{{
  "summary": "Brief summary of changes",
  "snippets": [
    {{"text": "Important snippet", "citation": "Context about where this appears"}}
  ]
}}"#,
        url = url,
        diff = truncate_chars(diff_text, MAX_DIFF_PROMPT_CHARS),
    )
}

fn parse_summary(content: &str) -> Result<ChangeSummary> {
    let raw: RawSummary = serde_json::from_str(content)?;
    Ok(ChangeSummary {
        summary: raw.summary.unwrap_or_else(|| MISSING_SUMMARY.to_string()),
        snippets: raw.snippets,
    })
}

/// First `max` characters of `s`, respecting char boundaries.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Scriptable summarizer for tests: either replies with a canned summary
/// or fails every call.
pub struct MockSummarizer {
    response: Option<ChangeSummary>,
    reachable: bool,
}

impl MockSummarizer {
    pub fn succeeding(summary: &str, snippets: Vec<Snippet>) -> Self {
        Self {
            response: Some(ChangeSummary {
                summary: summary.to_string(),
                snippets,
            }),
            reachable: true,
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            reachable: false,
        }
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        _old_text: &str,
        _new_text: &str,
        _diff_text: &str,
        _url: &str,
    ) -> Result<ChangeSummary> {
        match &self.response {
            Some(summary) => Ok(summary.clone()),
            None => Err(MonitorError::Summarization(
                "mock summarizer configured to fail".to_string(),
            )),
        }
    }

    async fn probe(&self) -> bool {
        self.reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groq_credential_wins_over_openai() {
        let config = ProviderConfig::resolve(
            Some("gsk_abc".to_string()),
            Some("sk_def".to_string()),
        )
        .unwrap();
        assert_eq!(config.base_url, GROQ_BASE_URL);
        assert_eq!(config.model, GROQ_MODEL);
    }

    #[test]
    fn openai_credential_alone_selects_openai() {
        let config = ProviderConfig::resolve(None, Some("sk_def".to_string())).unwrap();
        assert_eq!(config.base_url, OPENAI_BASE_URL);
        assert_eq!(config.model, OPENAI_MODEL);
    }

    #[test]
    fn no_credential_resolves_to_none() {
        assert!(ProviderConfig::resolve(None, None).is_none());
    }

    #[test]
    fn parses_well_formed_model_reply() {
        let content = r#"{
            "summary": "Prices went up.",
            "snippets": [{"text": "$15/mo", "citation": "pricing table"}]
        }"#;

        let parsed = parse_summary(content).unwrap();
        assert_eq!(parsed.summary, "Prices went up.");
        assert_eq!(parsed.snippets.len(), 1);
        assert_eq!(parsed.snippets[0].text, "$15/mo");
    }

    #[test]
    fn missing_summary_field_gets_placeholder() {
        let parsed = parse_summary(r#"{"snippets": []}"#).unwrap();
        assert_eq!(parsed.summary, MISSING_SUMMARY);
        assert!(parsed.snippets.is_empty());
    }

    #[test]
    fn non_json_reply_is_an_error() {
        assert!(parse_summary("The page changed a lot.").is_err());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "ééééé";
        assert_eq!(truncate_chars(s, 3), "ééé");
        assert_eq!(truncate_chars(s, 10), s);
    }

    #[tokio::test]
    async fn unconfigured_summarizer_degrades_to_fallback() {
        let summarizer = LlmSummarizer::new(None);
        let result = summarizer
            .summarize("old", "new", "+ new\n- old\n", "https://example.com")
            .await
            .unwrap();
        assert_eq!(result.summary, FALLBACK_SUMMARY);
        assert!(result.snippets.is_empty());
        assert!(!summarizer.probe().await);
    }
}
