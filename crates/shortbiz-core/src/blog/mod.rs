//! AI blog generation.
//!
//! A request flows through cost estimation, a balance check, prompt
//! construction, the generation backend, output normalization, Markdown
//! rendering, and finally a single transaction that charges the owner and
//! stores the post.

mod extract;
mod features;
mod generator;
pub mod markdown;
mod prompt;
mod request;

pub use extract::extract_text;
pub use features::{Feature, FeatureSelection, TOKENS_PER_WORD, estimate_cost};
pub use generator::{
    BlogGenerator, CostEstimate, GenerationOutcome, GenerationSettings, estimate, get_blog,
    list_blogs,
};
pub use markdown::{extract_title, render_html};
pub use prompt::{build_prompt, feature_directive};
pub use request::{
    BlogRequest, DEFAULT_AUDIENCE, DEFAULT_TONE, DEFAULT_WORD_COUNT, GenerationRequest,
};
