use super::{Parser, ParsedDocument};
use crate::error::Result;
use regex::Regex;

/// HTML parser for crawled portal pages
///
/// Drops `<script>`, `<style>`, `<noscript>` and comments, turns block-level
/// tags into line breaks, strips the remaining markup and decodes the common
/// character entities.
pub struct HtmlParser {
    title: Regex,
    invisible: Regex,
    block: Regex,
    tag: Regex,
    spaces: Regex,
}

impl Default for HtmlParser {
    fn default() -> Self {
        let rx = |p: &str| Regex::new(p).expect("built-in HTML pattern must compile");
        Self {
            title: rx(r"(?is)<title[^>]*>(.*?)</title>"),
            invisible: rx(r"(?is)<!--.*?-->|<(script|style|noscript|head)\b[^>]*>.*?</(script|style|noscript|head)\s*>"),
            block: rx(r"(?i)</?(p|div|br|li|ul|ol|tr|td|th|table|h[1-6]|section|article|header|footer|nav)\b[^>]*>"),
            tag: rx(r"(?s)<[^>]+>"),
            spaces: rx(r"[ \t\r\f]+"),
        }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&deg;", "°")
        .replace("&amp;", "&")
}

impl Parser for HtmlParser {
    fn can_parse(&self, extension: &str) -> bool {
        matches!(extension, "html" | "htm")
    }

    fn parse(&self, content: &str, _path: &str) -> Result<ParsedDocument> {
        let title = self
            .title
            .captures(content)
            .map(|c| decode_entities(self.tag.replace_all(&c[1], "").trim()))
            .filter(|t| !t.is_empty());

        let visible = self.invisible.replace_all(content, " ");
        let blocks = self.block.replace_all(&visible, "\n");
        let stripped = self.tag.replace_all(&blocks, "");
        let decoded = decode_entities(&stripped);

        let lines: Vec<String> = decoded
            .lines()
            .map(|l| self.spaces.replace_all(l, " ").trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        let mut text = lines.join("\n");
        text.push('\n');

        Ok(ParsedDocument {
            text,
            title,
            doc_type: "html".to_string(),
        })
    }
}
