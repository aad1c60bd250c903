use super::{Parser, ParsedDocument};
use crate::error::Result;
use pulldown_cmark::{Event, Parser as CmarkParser, Tag, TagEnd};

/// Markdown parser for mission pages and product notes
///
/// Headings, paragraphs, list items and table cells each end up on their own
/// line; code blocks and YAML frontmatter are dropped.
pub struct MarkdownParser;

fn strip_frontmatter(content: &str) -> &str {
    if let Some(rest) = content.strip_prefix("---\n") {
        if let Some(end) = rest.find("\n---\n") {
            return &rest[end + 5..];
        }
    }
    content
}

impl Parser for MarkdownParser {
    fn can_parse(&self, extension: &str) -> bool {
        matches!(extension, "md" | "markdown")
    }

    fn parse(&self, content: &str, _path: &str) -> Result<ParsedDocument> {
        let body = strip_frontmatter(content);
        let mut text = String::new();
        let mut title: Option<String> = None;
        let mut heading: Option<String> = None;
        let mut in_code_block = false;

        for event in CmarkParser::new(body) {
            match event {
                Event::Start(Tag::Heading { .. }) => heading = Some(String::new()),
                Event::End(TagEnd::Heading(_)) => {
                    if let Some(h) = heading.take() {
                        let h = h.trim().to_string();
                        if title.is_none() && !h.is_empty() {
                            title = Some(h.clone());
                        }
                        text.push_str(&h);
                        text.push('\n');
                    }
                }
                Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
                Event::End(TagEnd::CodeBlock) => in_code_block = false,
                Event::Text(t) | Event::Code(t) => {
                    if in_code_block {
                        continue;
                    }
                    match heading.as_mut() {
                        Some(h) => h.push_str(&t),
                        None => text.push_str(&t),
                    }
                }
                Event::SoftBreak => {
                    if !in_code_block {
                        text.push(' ');
                    }
                }
                Event::HardBreak
                | Event::End(TagEnd::Paragraph)
                | Event::End(TagEnd::Item)
                | Event::End(TagEnd::TableCell) => {
                    if !text.ends_with('\n') {
                        text.push('\n');
                    }
                }
                _ => {}
            }
        }

        Ok(ParsedDocument {
            text,
            title,
            doc_type: "markdown".to_string(),
        })
    }
}
