//! Content analyst: LLM-backed selector learning and general extraction
//!
//! The analyst is the pipeline's last resort. When structured metadata and
//! configured selectors both come up empty, the Planner may ask it to
//! propose CSS selectors for a source (learned once, then persisted) or to
//! pull the article fields straight out of the page.
//!
//! The trait keeps the pipeline testable; `HttpAnalyst` talks to an
//! OpenAI-compatible chat completions endpoint, `MockAnalyst` replays
//! scripted answers.

use crate::config::AnalystConfig;
use crate::extract::normalize::parse_date_utc;
use crate::extract::ExtractedFields;
use crate::{HoundError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// How much page HTML is forwarded to the analyst
const HTML_PROMPT_LIMIT: usize = 20_000;

/// Analyst answer for a whole-page extraction request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralExtraction {
    pub title: Option<String>,
    pub text: Option<String>,
    pub date: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
}

impl GeneralExtraction {
    /// Converts the analyst's raw answer into normalized fields
    pub fn into_fields(self) -> ExtractedFields {
        ExtractedFields {
            title: self.title.filter(|t| !t.trim().is_empty()),
            text: self.text.filter(|t| !t.trim().is_empty()),
            published: self.date.as_deref().and_then(parse_date_utc),
            authors: self
                .authors
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }
}

/// External content-understanding service
#[async_trait]
pub trait ContentAnalyst: Send + Sync {
    /// Proposes per-field CSS selectors for a source's article pages.
    ///
    /// `Ok(None)` means the analyst answered but could not produce usable
    /// selectors; errors mean the service itself failed.
    async fn propose_selectors(
        &self,
        url: &str,
        html: &str,
    ) -> Result<Option<HashMap<String, String>>>;

    /// Extracts article fields directly from a page
    async fn extract_general(&self, url: &str, html: &str) -> Result<Option<GeneralExtraction>>;
}

/// Analyst backed by an OpenAI-compatible chat completions endpoint
pub struct HttpAnalyst {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpAnalyst {
    /// Builds an analyst from config; `None` when no endpoint is configured
    pub fn from_config(config: &AnalystConfig) -> Option<Self> {
        let endpoint = config.endpoint.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            endpoint,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            api_key: config.api_key.clone(),
        })
    }

    /// Sends one chat request and returns the assistant message content
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0.0,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HoundError::Analyst(format!("request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(HoundError::Analyst(format!(
                "endpoint returned {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| HoundError::Analyst(format!("invalid response body: {}", e)))?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| HoundError::Analyst("response had no message content".to_string()))
    }
}

/// Strips markdown code fences the model may wrap JSON answers in
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

fn truncate_html(html: &str) -> &str {
    if html.len() <= HTML_PROMPT_LIMIT {
        return html;
    }
    let mut end = HTML_PROMPT_LIMIT;
    while !html.is_char_boundary(end) {
        end -= 1;
    }
    &html[..end]
}

#[async_trait]
impl ContentAnalyst for HttpAnalyst {
    async fn propose_selectors(
        &self,
        url: &str,
        html: &str,
    ) -> Result<Option<HashMap<String, String>>> {
        let system = "You analyze news article HTML and answer with JSON only.";
        let user = format!(
            "Propose CSS selectors that extract the article fields from pages \
             like this one ({url}). Answer with a JSON object whose keys are \
             \"title\", \"text\", \"date\", \"author\" and whose values are CSS \
             selectors. Omit keys you cannot determine. Answer {{}} if the page \
             is not an article.\n\nHTML:\n{html}",
            url = url,
            html = truncate_html(html),
        );

        let content = self.complete(system, &user).await?;
        match serde_json::from_str::<HashMap<String, String>>(strip_fences(&content)) {
            Ok(selectors) if selectors.is_empty() => Ok(None),
            Ok(selectors) => Ok(Some(selectors)),
            Err(e) => {
                tracing::warn!("Analyst selector answer was not valid JSON: {}", e);
                Ok(None)
            }
        }
    }

    async fn extract_general(&self, url: &str, html: &str) -> Result<Option<GeneralExtraction>> {
        let system = "You extract news article data from HTML and answer with JSON only.";
        let user = format!(
            "Extract the article from this page ({url}). Answer with a JSON \
             object with keys \"title\", \"text\", \"date\" (ISO 8601), and \
             \"authors\" (array of names). Use null for unknown fields. Answer \
             {{}} if the page is not an article.\n\nHTML:\n{html}",
            url = url,
            html = truncate_html(html),
        );

        let content = self.complete(system, &user).await?;
        match serde_json::from_str::<GeneralExtraction>(strip_fences(&content)) {
            Ok(extraction) => Ok(Some(extraction)),
            Err(e) => {
                tracing::warn!("Analyst extraction answer was not valid JSON: {}", e);
                Ok(None)
            }
        }
    }
}

/// Scripted analyst for tests
pub struct MockAnalyst {
    selectors_answer: Option<HashMap<String, String>>,
    general_answer: Option<GeneralExtraction>,
    fail: bool,
    calls: std::sync::Mutex<Vec<String>>,
}

impl MockAnalyst {
    pub fn new() -> Self {
        Self {
            selectors_answer: None,
            general_answer: None,
            fail: false,
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_selectors(mut self, selectors: HashMap<String, String>) -> Self {
        self.selectors_answer = Some(selectors);
        self
    }

    pub fn with_general(mut self, extraction: GeneralExtraction) -> Self {
        self.general_answer = Some(extraction);
        self
    }

    /// Makes every call return an error
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Method names of the calls received, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockAnalyst {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentAnalyst for MockAnalyst {
    async fn propose_selectors(
        &self,
        _url: &str,
        _html: &str,
    ) -> Result<Option<HashMap<String, String>>> {
        self.calls
            .lock()
            .unwrap()
            .push("propose_selectors".to_string());
        if self.fail {
            return Err(HoundError::Analyst("scripted failure".to_string()));
        }
        Ok(self.selectors_answer.clone())
    }

    async fn extract_general(&self, _url: &str, _html: &str) -> Result<Option<GeneralExtraction>> {
        self.calls.lock().unwrap().push("extract_general".to_string());
        if self.fail {
            return Err(HoundError::Analyst("scripted failure".to_string()));
        }
        Ok(self.general_answer.clone())
    }
}
