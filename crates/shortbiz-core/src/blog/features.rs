//! Optional content features and their token prices.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tokens charged per requested word.
pub const TOKENS_PER_WORD: i64 = 3;

/// An optional content element a requester can switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Feature {
    /// Bullet lists where helpful.
    Bullets,
    /// At least one numbered list.
    Numbered,
    /// A closing Q&A section.
    Qa,
    /// A "Chart Data" JSON block.
    Chart,
    /// Suggested image prompts.
    Images,
    /// An SEO meta description.
    MetaDescription,
    /// A closing call-to-action.
    CallToAction,
}

impl Feature {
    /// Every feature, in table order.
    pub const ALL: [Self; 7] = [
        Self::Bullets,
        Self::Numbered,
        Self::Qa,
        Self::Chart,
        Self::Images,
        Self::MetaDescription,
        Self::CallToAction,
    ];

    /// Token cost added when this feature is selected.
    pub const fn cost(self) -> i64 {
        match self {
            Self::Bullets | Self::Numbered => 150,
            Self::Qa => 250,
            Self::Chart => 400,
            Self::Images => 800,
            Self::MetaDescription | Self::CallToAction => 120,
        }
    }

    /// Snake-case name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bullets => "bullets",
            Self::Numbered => "numbered",
            Self::Qa => "qa",
            Self::Chart => "chart",
            Self::Images => "images",
            Self::MetaDescription => "meta_description",
            Self::CallToAction => "call_to_action",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which optional features a generation request asks for.
///
/// All combinations are valid. Missing fields take the defaults below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FeatureSelection {
    /// Bullet lists (default on).
    pub bullets: bool,
    /// Numbered list (default off).
    pub numbered: bool,
    /// Q&A section (default on).
    pub qa: bool,
    /// Chart data block (default off).
    pub chart: bool,
    /// Image prompt suggestions (default off).
    pub images: bool,
    /// Meta description (default on).
    pub meta_description: bool,
    /// Call-to-action (default on).
    pub call_to_action: bool,
}

impl Default for FeatureSelection {
    fn default() -> Self {
        Self {
            bullets: true,
            numbered: false,
            qa: true,
            chart: false,
            images: false,
            meta_description: true,
            call_to_action: true,
        }
    }
}

impl FeatureSelection {
    /// A selection with every feature off.
    pub const fn none() -> Self {
        Self {
            bullets: false,
            numbered: false,
            qa: false,
            chart: false,
            images: false,
            meta_description: false,
            call_to_action: false,
        }
    }

    /// Whether `feature` is selected.
    pub const fn contains(&self, feature: Feature) -> bool {
        match feature {
            Feature::Bullets => self.bullets,
            Feature::Numbered => self.numbered,
            Feature::Qa => self.qa,
            Feature::Chart => self.chart,
            Feature::Images => self.images,
            Feature::MetaDescription => self.meta_description,
            Feature::CallToAction => self.call_to_action,
        }
    }

    /// Switch `feature` on or off.
    pub const fn set(&mut self, feature: Feature, on: bool) {
        match feature {
            Feature::Bullets => self.bullets = on,
            Feature::Numbered => self.numbered = on,
            Feature::Qa => self.qa = on,
            Feature::Chart => self.chart = on,
            Feature::Images => self.images = on,
            Feature::MetaDescription => self.meta_description = on,
            Feature::CallToAction => self.call_to_action = on,
        }
    }

    /// The selected features, in table order.
    pub fn enabled(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|f| self.contains(*f))
    }
}

/// Total token cost of a generation request.
///
/// `word_count * 3` plus the cost of every selected feature. The caller is
/// expected to have validated `word_count`.
pub fn estimate_cost(word_count: u32, features: &FeatureSelection) -> i64 {
    let base = i64::from(word_count) * TOKENS_PER_WORD;
    let add_ons: i64 = features.enabled().map(Feature::cost).sum();
    base + add_ons
}
