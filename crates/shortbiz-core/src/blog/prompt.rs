//! Instruction text sent to the generation backend.

use super::features::Feature;
use super::request::GenerationRequest;

/// The directive line appended when `feature` is selected.
pub fn feature_directive(feature: Feature, brand: &str) -> String {
    match feature {
        Feature::MetaDescription => {
            "- Include an SEO meta description (155-160 chars).".to_string()
        }
        Feature::Bullets => "- Use bullet points where helpful.".to_string(),
        Feature::Numbered => "- Include at least one numbered list.".to_string(),
        Feature::Chart => "- Include a section titled 'Chart Data' that outputs JSON: \
                           {title, labels[], values[]}."
            .to_string(),
        Feature::Qa => "- Add a Q&A section with 5 questions and answers.".to_string(),
        Feature::CallToAction => format!("- End with a clear call-to-action for {brand}."),
        Feature::Images => {
            "- Suggest 2 image prompts (featured + inline). Do not generate images.".to_string()
        }
    }
}

/// Render `req` into a single markdown-writing instruction block.
///
/// Deterministic: identical requests and brand produce identical prompts.
pub fn build_prompt(req: &GenerationRequest, brand: &str) -> String {
    let mut lines: Vec<String> = vec![
        format!(
            "You are a professional SEO content writer for a business productivity SaaS called \"{brand}\"."
        ),
        String::new(),
        "Write an engaging blog post in clean Markdown.".to_string(),
        String::new(),
        format!("Topic: {}", req.topic()),
        format!("Target audience: {}", req.audience()),
        format!("Tone: {}", req.tone()),
    ];
    if let Some(keyword) = req.seo_keyword() {
        lines.push(format!("Primary SEO keyword: {keyword}"));
    }
    lines.push(format!(
        "Length: approximately {} words.",
        req.word_count()
    ));
    lines.push(String::new());
    lines.push("Requirements:".to_string());
    lines.push("- Use H1 for the title, then H2/H3 structure.".to_string());
    lines.push("- Hooky intro, practical value, and a short conclusion.".to_string());
    lines.extend(
        req.features()
            .enabled()
            .map(|feature| feature_directive(feature, brand)),
    );
    lines.push(String::new());
    lines.push("Output ONLY Markdown. Do not wrap the response in code fences.".to_string());

    lines.join("\n")
}
