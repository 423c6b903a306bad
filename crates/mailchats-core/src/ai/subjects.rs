//! AI subject line generation

use super::client::{Completion, DeepSeekClient};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{error, info};

const MAX_CONTENT_CHARS: usize = 4000;
const MAX_SUBJECT_CHARS: usize = 100;

const SUBJECT_EXPERT_PROMPT: &str =
    "You are an expert email marketing specialist who creates highly effective subject lines.";

/// Options for subject generation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOptions {
    #[serde(default)]
    pub email_content: String,
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_tone() -> String {
    "professional".to_string()
}

fn default_max_length() -> u32 {
    70
}

fn default_count() -> usize {
    5
}

impl SubjectOptions {
    pub fn new(email_content: impl Into<String>) -> Self {
        Self {
            email_content: email_content.into(),
            tone: default_tone(),
            industry: String::new(),
            target_audience: String::new(),
            max_length: default_max_length(),
            count: default_count(),
        }
    }
}

/// Result of subject generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectResponse {
    pub success: bool,
    pub subjects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn truncate_content(content: &str) -> String {
    match content.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

fn build_prompt(options: &SubjectOptions, content: &str) -> String {
    let mut prompt = format!(
        "Generate {} compelling email subject lines for the following email content. \n\
         Each subject line should be no more than {} characters.",
        options.count, options.max_length
    );

    if !options.tone.is_empty() {
        prompt.push_str(&format!("\nThe tone should be {}.", options.tone));
    }
    if !options.industry.is_empty() {
        prompt.push_str(&format!("\nThis is for the {} industry.", options.industry));
    }
    if !options.target_audience.is_empty() {
        prompt.push_str(&format!(
            "\nThe target audience is {}.",
            options.target_audience
        ));
    }

    prompt.push_str(
        "\n\nPlease respond with a JSON object containing an array of subject lines in the format:\n\
         {\n  \"subjects\": [\n    \"Subject line 1\",\n    \"Subject line 2\",\n    ...\n  ]\n}\n\n\
         Email content:\n",
    );
    prompt.push_str(content);
    prompt
}

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r#"^[•\-*#0-9.\s"']+"#).expect("static list marker pattern"))
}

/// Pull subject lines out of a free-text reply
fn extract_subject_lines(text: &str, count: usize) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| list_marker().replace(line, "").trim().to_string())
        .filter(|line| {
            !line.is_empty()
                && !line.to_lowercase().contains("subject line")
                && line.chars().count() <= MAX_SUBJECT_CHARS
        })
        .take(count)
        .collect()
}

/// A JSON reply is trusted as-is; free text is scraped line by line
fn parse_subjects(content: &str, count: usize) -> Vec<String> {
    let mut subjects = match serde_json::from_str::<serde_json::Value>(content) {
        Ok(reply) => reply
            .get("subjects")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        Err(_) => extract_subject_lines(content, count),
    };
    subjects.truncate(count);
    subjects
}

impl DeepSeekClient {
    /// Generate subject lines for an email body.
    ///
    /// Failures are reported in the response rather than as an error.
    pub async fn generate_subjects(&self, options: &SubjectOptions) -> SubjectResponse {
        let content = truncate_content(&options.email_content);
        let prompt = build_prompt(options, &content);

        let reply = self
            .complete(Completion {
                system: SUBJECT_EXPERT_PROMPT,
                prompt: &prompt,
                temperature: 0.7,
                max_tokens: Some(500),
            })
            .await;

        match reply {
            Ok(content) => {
                let subjects = parse_subjects(&content, options.count);
                info!(count = subjects.len(), "Generated subject lines");
                SubjectResponse {
                    success: true,
                    subjects,
                    error: None,
                }
            }
            Err(e) => {
                error!("Error generating subject lines: {}", e);
                SubjectResponse {
                    success: false,
                    subjects: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
