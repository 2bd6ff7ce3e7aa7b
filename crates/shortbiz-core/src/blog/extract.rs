//! Reduce a backend response to the generated Markdown text.

use crate::error::{ServiceError, ServiceResult};
use crate::llm::RawResponse;

/// Part kinds that carry generated text.
const TEXT_KINDS: [&str; 2] = ["output_text", "text"];

/// Concatenate every text fragment of `resp`, in order.
///
/// Fragments are joined with a newline and the result is trimmed. When the
/// joined text is blank, the top-level `output_text` aggregate is used.
/// An empty result is [`ServiceError::EmptyGeneration`].
pub fn extract_text(resp: &RawResponse) -> ServiceResult<String> {
    let fragments: Vec<&str> = resp
        .output
        .iter()
        .flat_map(|item| item.content.iter())
        .filter(|part| TEXT_KINDS.contains(&part.kind.as_str()))
        .filter_map(|part| part.text.as_deref())
        .filter(|text| !text.is_empty())
        .collect();

    let joined = fragments.join("\n");
    let text = if joined.trim().is_empty() {
        resp.output_text.as_deref().unwrap_or_default().trim()
    } else {
        joined.trim()
    };
    if text.is_empty() {
        return Err(ServiceError::EmptyGeneration);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ContentPart, OutputItem};

    #[test]
    fn joins_fragments_across_items() {
        let resp = RawResponse {
            output: vec![
                OutputItem {
                    kind: "message".into(),
                    content: vec![ContentPart::text("# Title"), ContentPart::text("Intro.")],
                },
                OutputItem {
                    kind: "message".into(),
                    content: vec![ContentPart::text("## Next")],
                },
            ],
            output_text: None,
        };
        assert_eq!(extract_text(&resp).unwrap(), "# Title\nIntro.\n## Next");
    }

    #[test]
    fn accepts_plain_text_kind_and_skips_others() {
        let resp = RawResponse::from_parts(vec![
            ContentPart {
                kind: "refusal".into(),
                text: Some("no".into()),
            },
            ContentPart {
                kind: "text".into(),
                text: Some("body".into()),
            },
            ContentPart {
                kind: "output_text".into(),
                text: None,
            },
        ]);
        assert_eq!(extract_text(&resp).unwrap(), "body");
    }

    #[test]
    fn empty_fragments_do_not_add_blank_lines() {
        let resp = RawResponse::from_parts(vec![
            ContentPart::text("a"),
            ContentPart::text(""),
            ContentPart::text("b"),
        ]);
        assert_eq!(extract_text(&resp).unwrap(), "a\nb");
    }

    #[test]
    fn falls_back_to_output_text() {
        let resp = RawResponse {
            output: vec![],
            output_text: Some("  # Fallback\n\nbody \n".into()),
        };
        assert_eq!(extract_text(&resp).unwrap(), "# Fallback\n\nbody");
    }

    #[test]
    fn blank_parts_fall_back_to_output_text() {
        let resp = RawResponse {
            output_text: Some("# Real Post\nbody".into()),
            ..RawResponse::from_parts(vec![ContentPart::text("   \n ")])
        };
        assert_eq!(extract_text(&resp).unwrap(), "# Real Post\nbody");
    }

    #[test]
    fn whitespace_only_is_empty_generation() {
        let resp = RawResponse::from_parts(vec![ContentPart::text("   \n\t")]);
        assert!(matches!(extract_text(&resp), Err(ServiceError::EmptyGeneration)));
        assert!(matches!(
            extract_text(&RawResponse::default()),
            Err(ServiceError::EmptyGeneration)
        ));
    }
}
