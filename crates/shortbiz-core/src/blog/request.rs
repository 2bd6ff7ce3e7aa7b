//! Inbound blog requests and their validated form.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::features::{FeatureSelection, estimate_cost};
use crate::error::{ServiceError, ServiceResult};

/// Default audience when the requester leaves it out.
pub const DEFAULT_AUDIENCE: &str = "General audience";
/// Default tone when the requester leaves it out.
pub const DEFAULT_TONE: &str = "Professional";
/// Default target length in words.
pub const DEFAULT_WORD_COUNT: u32 = 800;

/// A blog request as it arrives from a caller, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, JsonSchema)]
pub struct BlogRequest {
    /// What the post is about (3–200 characters).
    #[validate(length(min = 3, max = 200))]
    pub topic: String,
    /// Who the post is written for (up to 200 characters).
    #[serde(default = "default_audience")]
    #[validate(length(max = 200))]
    pub audience: String,
    /// Voice of the post (up to 50 characters).
    #[serde(default = "default_tone")]
    #[validate(length(max = 50))]
    pub tone: String,
    /// Primary SEO keyword (up to 80 characters).
    #[serde(default)]
    #[validate(length(max = 80))]
    pub seo_keyword: Option<String>,
    /// Target length in words (300–2500).
    #[serde(default = "default_word_count")]
    #[validate(range(min = 300, max = 2500))]
    pub word_count: u32,
    /// Optional content features.
    #[serde(default)]
    pub features: FeatureSelection,
}

fn default_audience() -> String {
    DEFAULT_AUDIENCE.to_string()
}

fn default_tone() -> String {
    DEFAULT_TONE.to_string()
}

const fn default_word_count() -> u32 {
    DEFAULT_WORD_COUNT
}

impl BlogRequest {
    /// A request for `topic` with every other field at its default.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            audience: default_audience(),
            tone: default_tone(),
            seo_keyword: None,
            word_count: DEFAULT_WORD_COUNT,
            features: FeatureSelection::default(),
        }
    }
}

/// A validated generation request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    topic: String,
    audience: String,
    tone: String,
    seo_keyword: Option<String>,
    word_count: u32,
    features: FeatureSelection,
}

impl TryFrom<BlogRequest> for GenerationRequest {
    type Error = ServiceError;

    fn try_from(req: BlogRequest) -> ServiceResult<Self> {
        req.validate()?;
        if req.topic.trim().is_empty() {
            return Err(ServiceError::Validation("topic: must not be blank".into()));
        }
        // An all-blank keyword means "no keyword".
        let seo_keyword = req.seo_keyword.filter(|k| !k.trim().is_empty());
        Ok(Self {
            topic: req.topic,
            audience: req.audience,
            tone: req.tone,
            seo_keyword,
            word_count: req.word_count,
            features: req.features,
        })
    }
}

impl GenerationRequest {
    /// The post topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The target audience.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The requested tone.
    pub fn tone(&self) -> &str {
        &self.tone
    }

    /// The SEO keyword, if any.
    pub fn seo_keyword(&self) -> Option<&str> {
        self.seo_keyword.as_deref()
    }

    /// Target length in words.
    pub const fn word_count(&self) -> u32 {
        self.word_count
    }

    /// Selected features.
    pub const fn features(&self) -> &FeatureSelection {
        &self.features
    }

    /// Token cost of this request.
    pub fn token_cost(&self) -> i64 {
        estimate_cost(self.word_count, &self.features)
    }
}
