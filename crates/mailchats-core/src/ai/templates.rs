//! Smart template analysis and suggestions
//!
//! Both operations ask DeepSeek first and fall back to local heuristics
//! when the call or its JSON fails.

use super::client::{Completion, DeepSeekClient, TEMPLATE_EXPERT_PROMPT};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;

const MAX_LOCAL_SUGGESTIONS: usize = 5;

/// Template to analyze, with optional context
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateAnalysisRequest {
    #[serde(default)]
    pub html_content: String,
    pub purpose: Option<String>,
    pub industry: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Improvement,
    Warning,
    Suggestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// One improvement for the analyzed template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

/// A template similar to the analyzed one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub similarity_score: f64,
    pub html_content: String,
    #[serde(default)]
    pub matched_features: Vec<String>,
    #[serde(default)]
    pub ideal_for: Vec<String>,
    #[serde(default)]
    pub improvement_areas: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RecommendationPayload {
    #[serde(default)]
    recommendations: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
struct SuggestionPayload {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateCategory {
    Newsletter,
    Promotional,
    Transactional,
    Announcement,
    Welcome,
}

impl TemplateCategory {
    const ALL: [TemplateCategory; 5] = [
        TemplateCategory::Newsletter,
        TemplateCategory::Promotional,
        TemplateCategory::Transactional,
        TemplateCategory::Announcement,
        TemplateCategory::Welcome,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            TemplateCategory::Newsletter => "newsletter",
            TemplateCategory::Promotional => "promotional",
            TemplateCategory::Transactional => "transactional",
            TemplateCategory::Announcement => "announcement",
            TemplateCategory::Welcome => "welcome",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            TemplateCategory::Newsletter => &["newsletter", "update", "monthly", "weekly"],
            TemplateCategory::Promotional => &["sale", "discount", "offer", "limited time"],
            TemplateCategory::Transactional => &["order", "transaction", "receipt", "invoice"],
            TemplateCategory::Announcement => {
                &["announcement", "introducing", "new feature", "launching"]
            }
            TemplateCategory::Welcome => &[
                "welcome",
                "onboarding",
                "getting started",
                "thank you for joining",
            ],
        }
    }

    fn ideal_for(&self) -> [&'static str; 3] {
        match self {
            TemplateCategory::Newsletter => {
                ["Existing subscribers", "Regular customers", "Blog readers"]
            }
            TemplateCategory::Promotional => {
                ["Potential customers", "Past purchasers", "Deal seekers"]
            }
            TemplateCategory::Transactional => {
                ["Active customers", "Recent purchasers", "Account holders"]
            }
            TemplateCategory::Announcement => ["All customers", "Stakeholders", "Product users"],
            TemplateCategory::Welcome => ["New subscribers", "New customers", "Trial users"],
        }
    }
}

struct SampleTemplate {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: TemplateCategory,
    html: &'static str,
}

const SAMPLE_TEMPLATES: [SampleTemplate; 3] = [
    SampleTemplate {
        id: "newsletter-basic",
        name: "Basic Newsletter",
        description: "A simple newsletter template with a clean design",
        category: TemplateCategory::Newsletter,
        html: include_str!("../../templates/newsletter-basic.html"),
    },
    SampleTemplate {
        id: "promotional-sale",
        name: "Promotional Sale",
        description: "Template for promoting sales and special offers",
        category: TemplateCategory::Promotional,
        html: include_str!("../../templates/promotional-sale.html"),
    },
    SampleTemplate {
        id: "welcome-email",
        name: "Welcome Email",
        description: "A warm welcome email for new subscribers or customers",
        category: TemplateCategory::Welcome,
        html: include_str!("../../templates/welcome-email.html"),
    },
];

fn context_lines(request: &TemplateAnalysisRequest) -> String {
    let line = |label: &str, value: &Option<String>| match value.as_deref() {
        Some(v) if !v.is_empty() => format!("{}{}", label, v),
        _ => String::new(),
    };
    format!(
        "{}\n{}\n{}",
        line("The purpose of this email is: ", &request.purpose),
        line("Industry: ", &request.industry),
        line("Target audience: ", &request.audience),
    )
}

fn recommendations_prompt(request: &TemplateAnalysisRequest) -> String {
    format!(
        r#"
I need you to analyze this HTML email template and provide detailed recommendations for improvements.

{context}

Please provide a comprehensive analysis focusing on:
1. Design issues, accessibility problems, and mobile responsiveness
2. Email deliverability concerns (elements that might trigger spam filters)
3. Content improvements (clarity, call-to-action effectiveness)
4. Technical HTML issues
5. Personalization opportunities

For each recommendation, provide:
- A clear title describing the issue
- A detailed description explaining why it matters
- A priority level (high, medium, low)
- A suggested HTML snippet to fix the issue where applicable
- The sentiment (positive for enhancements, negative for issues, neutral for informational)

Please format your response as a JSON object with an array of recommendations:
{{
  "recommendations": [
    {{
      "id": "unique-id",
      "type": "improvement|warning|suggestion",
      "title": "Issue title",
      "description": "Detailed description",
      "priority": "high|medium|low",
      "htmlSnippet": "HTML code to fix issue (if applicable)",
      "sentiment": "positive|negative|neutral"
    }}
  ]
}}

Here is the HTML template to analyze:
```html
{html}
```
"#,
        context = context_lines(request),
        html = request.html_content,
    )
}

fn suggestions_prompt(request: &TemplateAnalysisRequest) -> String {
    format!(
        r#"
I need you to analyze this HTML email template and suggest similar but improved templates.

{context}

Please provide 3-5 template suggestions that would be better suited for this purpose,
considering best practices for email design, accessibility, and deliverability.

For each suggestion, include:
- A unique ID and meaningful name
- A short description
- The category it belongs to (newsletter, promotional, transactional, etc.)
- A similarity score from 0.0 to 1.0 showing how similar it is to the original
- A list of matched features from the original template
- Audience segments this template would be ideal for
- Areas for further improvement

Generate complete HTML content for each suggestion that demonstrates best practices.
The templates should be fully functional and ready to use.

Please format your response as a JSON object with an array of suggestions:
{{
  "suggestions": [
    {{
      "id": "unique-id",
      "name": "Template Name",
      "description": "Template description",
      "category": "newsletter|promotional|transactional|announcement|welcome",
      "similarityScore": 0.85,
      "htmlContent": "Complete HTML for the template",
      "matchedFeatures": ["feature1", "feature2"],
      "idealFor": ["audience1", "audience2"],
      "improvementAreas": ["area1", "area2"]
    }}
  ]
}}

Here is the HTML template to analyze:
```html
{html}
```
"#,
        context = context_lines(request),
        html = request.html_content,
    )
}

struct Patterns {
    img: Regex,
    img_src: Regex,
    viewport: Regex,
    variable: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        img: Regex::new(r"(?i)<img[^>]*>").expect("img pattern"),
        img_src: Regex::new(r#"(?i)src="[^"]+""#).expect("src pattern"),
        viewport: Regex::new(r"(?i)<meta[^>]+viewport[^>]+>").expect("viewport pattern"),
        variable: Regex::new(r"\{\w+\}").expect("variable pattern"),
    })
}

/// Heuristic checks used when the AI is unavailable
pub fn local_analysis(html: &str) -> Vec<Recommendation> {
    let p = patterns();
    let lower = html.to_lowercase();
    let mut recommendations = Vec::new();

    let missing_alt = p.img.find_iter(html).any(|tag| {
        let tag = tag.as_str();
        p.img_src.is_match(tag) && !tag.to_lowercase().contains("alt=")
    });
    if missing_alt {
        recommendations.push(Recommendation {
            id: "missing-alt-text".into(),
            kind: RecommendationKind::Warning,
            title: "Missing alt text on images".into(),
            description: "Some images in your email are missing alt text. This can affect accessibility and may cause issues with some email clients.".into(),
            priority: Priority::High,
            html_snippet: Some(r#"<img src="image.jpg" alt="Descriptive text about the image">"#.into()),
            sentiment: Some(Sentiment::Negative),
        });
    }

    if !p.viewport.is_match(html) && !html.contains("media query") {
        recommendations.push(Recommendation {
            id: "responsive-design".into(),
            kind: RecommendationKind::Improvement,
            title: "Enhance responsive design".into(),
            description: "Your email template might not display well on mobile devices. Adding responsive design elements will improve the user experience on all devices.".into(),
            priority: Priority::High,
            html_snippet: Some(r#"<meta name="viewport" content="width=device-width, initial-scale=1.0">"#.into()),
            sentiment: Some(Sentiment::Negative),
        });
    }

    // `{{x}}` contains a `{x}` match, so one pattern covers both forms
    if !p.variable.is_match(html) {
        recommendations.push(Recommendation {
            id: "personalization".into(),
            kind: RecommendationKind::Suggestion,
            title: "Add personalization with mail merge".into(),
            description: "Personalized emails typically have higher engagement rates. Consider adding variables like {{emailname}} or {{first_name}} to personalize your content.".into(),
            priority: Priority::Medium,
            html_snippet: Some("<h2>Hello {{emailname}},</h2>".into()),
            sentiment: Some(Sentiment::Neutral),
        });
    }

    let has_unsubscribe = ["unsubscribe", "opt out", "opt-out"]
        .iter()
        .any(|needle| lower.contains(needle));
    if !has_unsubscribe {
        recommendations.push(Recommendation {
            id: "missing-unsubscribe".into(),
            kind: RecommendationKind::Warning,
            title: "Missing unsubscribe link".into(),
            description: "Your email should include an unsubscribe link to comply with anti-spam regulations like CAN-SPAM and GDPR.".into(),
            priority: Priority::High,
            html_snippet: Some(r##"<p style="font-size: 12px; color: #999;">If you no longer wish to receive these emails, you can <a href="#" style="color: #666;">unsubscribe here</a>.</p>"##.into()),
            sentiment: Some(Sentiment::Negative),
        });
    }

    recommendations
}

/// Rank the built-in sample templates against `html`
pub fn local_suggestions(html: &str) -> Vec<Suggestion> {
    local_suggestions_with(html, &mut rand::thread_rng())
}

fn local_suggestions_with<R: Rng>(html: &str, rng: &mut R) -> Vec<Suggestion> {
    let lower = html.to_lowercase();
    let category_score = |category: TemplateCategory| -> f64 {
        if category.keywords().iter().any(|k| lower.contains(k)) {
            0.5
        } else {
            0.0
        }
    };
    let scores: Vec<(TemplateCategory, f64)> = TemplateCategory::ALL
        .iter()
        .map(|c| (*c, category_score(*c)))
        .collect();

    let mut suggestions: Vec<Suggestion> = SAMPLE_TEMPLATES
        .iter()
        .map(|sample| {
            let base = scores
                .iter()
                .find(|(c, _)| *c == sample.category)
                .map(|(_, s)| *s)
                .unwrap_or_default();
            let score = (base + rng.gen_range(0.0..0.3)).clamp(0.3, 0.95);

            Suggestion {
                id: sample.id.into(),
                name: sample.name.into(),
                description: sample.description.into(),
                category: sample.category.as_str().into(),
                similarity_score: score,
                html_content: sample.html.into(),
                matched_features: [
                    "Layout structure",
                    "Color scheme",
                    "Typography style",
                    "Content sections",
                ]
                .map(String::from)
                .to_vec(),
                ideal_for: sample.category.ideal_for().map(String::from).to_vec(),
                improvement_areas: [
                    "Mobile responsiveness",
                    "Personalization",
                    "Call-to-action clarity",
                ]
                .map(String::from)
                .to_vec(),
            }
        })
        .collect();

    suggestions.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    suggestions.truncate(MAX_LOCAL_SUGGESTIONS);
    suggestions
}

impl DeepSeekClient {
    /// Recommendations for a template, from DeepSeek or the local checks
    pub async fn analyze_template(&self, request: &TemplateAnalysisRequest) -> Vec<Recommendation> {
        let prompt = recommendations_prompt(request);
        let reply = self
            .complete(Completion {
                system: TEMPLATE_EXPERT_PROMPT,
                prompt: &prompt,
                temperature: 0.2,
                max_tokens: None,
            })
            .await
            .and_then(|content| Ok(serde_json::from_str::<RecommendationPayload>(&content)?));

        match reply {
            Ok(payload) => payload.recommendations,
            Err(e) => {
                warn!("DeepSeek recommendations failed, using local analysis: {}", e);
                local_analysis(&request.html_content)
            }
        }
    }

    /// Similar templates, from DeepSeek or the built-in samples
    pub async fn suggest_templates(&self, request: &TemplateAnalysisRequest) -> Vec<Suggestion> {
        let prompt = suggestions_prompt(request);
        let reply = self
            .complete(Completion {
                system: TEMPLATE_EXPERT_PROMPT,
                prompt: &prompt,
                temperature: 0.2,
                max_tokens: None,
            })
            .await
            .and_then(|content| Ok(serde_json::from_str::<SuggestionPayload>(&content)?));

        match reply {
            Ok(payload) => payload.suggestions,
            Err(e) => {
                warn!("DeepSeek suggestions failed, using local suggestions: {}", e);
                local_suggestions(&request.html_content)
            }
        }
    }
}
