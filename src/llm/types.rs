use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// `choices[0].message.content`, if present and non-empty.
    pub fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()?
            .message?
            .content
            .filter(|c| !c.is_empty())
    }
}

/// Stage transitions emitted while a run is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtractionEvent {
    DocumentStarted { index: usize, total: usize, name: String },
    TextExtracted { name: String, chars: usize },
    IdentifyingCompany { name: String },
    CompanyIdentified { name: String, company: String, fiscal_year: String },
    ExtractingMetrics { name: String, company: String },
    DocumentCompleted { name: String, company: String },
    DocumentFailed { name: String, reason: String },
    Progress { done: usize, total: usize },
}
