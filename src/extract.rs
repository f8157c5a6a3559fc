//! Code extraction from free-text model responses.
//!
//! Models are asked to wrap their output in a fenced block tagged with the
//! output format (```` ```svg ````). The scanner below finds the first such
//! block in a single left-to-right pass. A response without one is returned
//! whole (trimmed) rather than treated as an error.

use crate::types::OutputFormat;

const FENCE: &str = "```";

/// Result of scanning a response for a fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extracted<'a> {
    /// The trimmed code, or the trimmed full response on fallback.
    pub code: &'a str,
    /// Whether a fenced block tagged with the format was found.
    pub fenced: bool,
}

/// Find the first ```` ```<format> ```` block in `content`.
///
/// The tag matches case-insensitively and must not run into further word
/// characters (```` ```svgz ```` is not an svg block). The block ends at
/// the next fence.
pub fn extract(content: &str, format: OutputFormat) -> Extracted<'_> {
    let tag = format.as_str();

    for (start, _) in content.match_indices(FENCE) {
        let after_fence = &content[start + FENCE.len()..];
        let Some(after_tag) = strip_tag(after_fence, tag) else {
            continue;
        };
        if let Some(end) = after_tag.find(FENCE) {
            return Extracted {
                code: after_tag[..end].trim(),
                fenced: true,
            };
        }
        // An unterminated block means every later fence is unterminated too.
        break;
    }

    Extracted {
        code: content.trim(),
        fenced: false,
    }
}

/// Convenience wrapper returning an owned string.
pub fn extract_code(content: &str, format: OutputFormat) -> String {
    extract(content, format).code.to_string()
}

fn strip_tag<'a>(s: &'a str, tag: &str) -> Option<&'a str> {
    let head = s.get(..tag.len())?;
    if !head.eq_ignore_ascii_case(tag) {
        return None;
    }
    let rest = &s[tag.len()..];
    match rest.chars().next() {
        Some(c) if c.is_alphanumeric() || c == '_' || c == '-' => None,
        _ => Some(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_block() {
        let body = "Here you go:\n```svg\n<svg>...</svg>\n```\nEnjoy!";
        assert_eq!(extract_code(body, OutputFormat::Svg), "<svg>...</svg>");
        assert!(extract(body, OutputFormat::Svg).fenced);
    }

    #[test]
    fn falls_back_to_trimmed_body() {
        let body = "  <svg><rect/></svg>\n\n";
        let out = extract(body, OutputFormat::Svg);
        assert_eq!(out.code, "<svg><rect/></svg>");
        assert!(!out.fenced);
    }

    #[test]
    fn tag_is_case_insensitive() {
        let body = "```HTML\n<html></html>\n```";
        assert_eq!(extract_code(body, OutputFormat::Html), "<html></html>");
    }

    #[test]
    fn ignores_blocks_of_other_formats() {
        let body = "```html\n<p>no</p>\n```\n```svg\n<svg/>\n```";
        assert_eq!(extract_code(body, OutputFormat::Svg), "<svg/>");
    }

    #[test]
    fn takes_first_matching_block() {
        let body = "```svg\n<svg id=\"a\"/>\n```\n```svg\n<svg id=\"b\"/>\n```";
        assert_eq!(extract_code(body, OutputFormat::Svg), "<svg id=\"a\"/>");
    }

    #[test]
    fn tag_must_end_at_word_boundary() {
        let body = "```svgz\nbinary\n```";
        let out = extract(body, OutputFormat::Svg);
        assert!(!out.fenced);
        assert_eq!(out.code, body);
    }

    #[test]
    fn content_may_start_on_the_tag_line() {
        let body = "```svg <svg/>```";
        assert_eq!(extract_code(body, OutputFormat::Svg), "<svg/>");
    }

    #[test]
    fn unterminated_block_falls_back() {
        let body = "```svg\n<svg>cut off";
        let out = extract(body, OutputFormat::Svg);
        assert!(!out.fenced);
        assert_eq!(out.code, body);
    }

    #[test]
    fn untagged_fence_is_not_a_match() {
        let body = "```\n<svg/>\n```";
        assert!(!extract(body, OutputFormat::Svg).fenced);
    }

    #[test]
    fn multibyte_text_around_fences() {
        let body = "图表如下：\n```svg\n<svg><text>销售额</text></svg>\n```\n完成";
        assert_eq!(
            extract_code(body, OutputFormat::Svg),
            "<svg><text>销售额</text></svg>"
        );
    }

    #[test]
    fn adversarial_input_is_linear() {
        let body = "```svg".repeat(10_000);
        // Every fence after the first is a candidate closer.
        assert!(extract(&body, OutputFormat::Svg).fenced);
        let body = "```".repeat(20_000);
        assert!(!extract(&body, OutputFormat::Svg).fenced);
    }
}
