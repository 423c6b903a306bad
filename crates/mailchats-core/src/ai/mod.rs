//! AI helpers backed by DeepSeek
//!
//! Subject line generation, template analysis and template suggestions.
//! Analysis and suggestions degrade to local heuristics when the API is
//! unreachable or returns something unusable.

mod client;
mod subjects;
mod templates;

pub use client::DeepSeekClient;
pub use subjects::{SubjectOptions, SubjectResponse};
pub use templates::{
    local_analysis, local_suggestions, Priority, Recommendation, RecommendationKind, Sentiment,
    Suggestion, TemplateAnalysisRequest,
};
