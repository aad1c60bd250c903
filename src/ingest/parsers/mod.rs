pub mod html;
pub mod markdown;
pub mod plaintext;

use crate::error::{AssistError, Result};

/// A page reduced to extractable text
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Plain text, one block (heading, paragraph, list item) per line.
    pub text: String,
    pub title: Option<String>,
    pub doc_type: String,
}

/// Trait for document parsers
pub trait Parser: Send + Sync {
    /// Check if this parser can handle the given file extension
    fn can_parse(&self, extension: &str) -> bool;

    /// Reduce document content to plain text
    fn parse(&self, content: &str, path: &str) -> Result<ParsedDocument>;
}

/// Parser registry that selects appropriate parser by extension
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Create a new parser registry with all built-in parsers
    pub fn new() -> Self {
        let mut registry = Self {
            parsers: Vec::new(),
        };

        registry.register(Box::new(markdown::MarkdownParser));
        registry.register(Box::new(html::HtmlParser::default()));
        registry.register(Box::new(plaintext::PlainTextParser));

        registry
    }

    /// Register a parser
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    /// Find a parser that can handle the given extension
    pub fn find_parser(&self, extension: &str) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(extension))
            .map(|p| p.as_ref())
    }

    /// Parse content using the appropriate parser for the extension
    ///
    /// If the primary parser fails, falls back to plain text so the page can
    /// still be extracted.
    pub fn parse(&self, content: &str, path: &str, extension: &str) -> Result<ParsedDocument> {
        let parser = self.find_parser(extension)
            .ok_or_else(|| AssistError::InvalidInput(
                format!("No parser found for extension: {}", extension)
            ))?;

        match parser.parse(content, path) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                log::warn!(
                    "Parser failed for {} ({}), falling back to plain text: {}",
                    path,
                    extension,
                    e
                );
                plaintext::PlainTextParser.parse(content, path)
            }
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_registry() {
        let registry = ParserRegistry::new();

        assert!(registry.find_parser("md").is_some());
        assert!(registry.find_parser("markdown").is_some());
        assert!(registry.find_parser("html").is_some());
        assert!(registry.find_parser("htm").is_some());
        assert!(registry.find_parser("txt").is_some());
        assert!(registry.find_parser("pdf").is_none());
    }

    #[test]
    fn test_unknown_extension_is_error() {
        let registry = ParserRegistry::new();
        assert!(registry.parse("%PDF-1.7", "brochure.pdf", "pdf").is_err());
    }

    #[test]
    fn test_dispatch_by_extension() {
        let registry = ParserRegistry::new();
        let doc = registry
            .parse("<p>INSAT-3D carries an Imager.</p>", "insat.html", "html")
            .unwrap();
        assert_eq!(doc.doc_type, "html");
        assert_eq!(doc.text.trim(), "INSAT-3D carries an Imager.");
    }
}
