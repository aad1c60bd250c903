use super::{Parser, ParsedDocument};
use crate::error::Result;

/// Plain text parser, also the fallback when a structured parser fails
///
/// The first non-empty line is taken as the title.
pub struct PlainTextParser;

impl Parser for PlainTextParser {
    fn can_parse(&self, extension: &str) -> bool {
        extension == "txt"
    }

    fn parse(&self, content: &str, path: &str) -> Result<ParsedDocument> {
        let doc_type = if path.ends_with(".txt") {
            "plaintext"
        } else {
            "plaintext_fallback"
        };
        let title = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string);

        Ok(ParsedDocument {
            text: content.to_string(),
            title,
            doc_type: doc_type.to_string(),
        })
    }
}
