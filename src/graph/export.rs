//! Read-only graph exports for visualisation tools: JSON, two-section CSV and
//! GEXF 1.2.

use std::fmt::Write as _;
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use super::GraphData;
use crate::error::{AssistError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Gexf,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Gexf => "application/xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Gexf => "gexf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AssistError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "gexf" | "xml" => Ok(ExportFormat::Gexf),
            other => Err(AssistError::InvalidInput(format!(
                "unknown export format: {} (expected json, csv or gexf)",
                other
            ))),
        }
    }
}

pub fn export(graph: &GraphData, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(graph),
        ExportFormat::Csv => Ok(to_csv(graph)),
        ExportFormat::Gexf => to_gexf(graph),
    }
}

pub fn to_json(graph: &GraphData) -> Result<String> {
    Ok(serde_json::to_string_pretty(graph)?)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Nodes section, blank line, edges section.
pub fn to_csv(graph: &GraphData) -> String {
    let mut out = String::from("# nodes\nid,label,type,size,confidence,mentions\n");
    for node in &graph.nodes {
        let _ = writeln!(
            out,
            "{},{},{},{:.2},{:.3},{}",
            csv_field(&node.id),
            csv_field(&node.label),
            node.node_type,
            node.size,
            node.confidence,
            node.mention_count
        );
    }
    out.push_str("\n# edges\nid,source,target,relation,weight,confidence\n");
    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "{},{},{},{},{:.3},{:.3}",
            csv_field(&edge.id),
            csv_field(&edge.source),
            csv_field(&edge.target),
            csv_field(&edge.relation),
            edge.weight,
            edge.confidence
        );
    }
    out
}

fn xml_err<E: std::fmt::Display>(e: E) -> AssistError {
    AssistError::Export(format!("GEXF write failed: {}", e))
}

/// Minimal static GEXF 1.2 document with directed edges.
pub fn to_gexf(graph: &GraphData) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("gexf").with_attributes([
            ("xmlns", "http://gexf.net/1.2"),
            ("version", "1.2"),
        ])))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(
            BytesStart::new("graph").with_attributes([("defaultedgetype", "directed"), ("mode", "static")]),
        ))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("nodes")))
        .map_err(xml_err)?;
    for node in &graph.nodes {
        let node_type = node.node_type.as_str();
        let size = format!("{:.2}", node.size);
        writer
            .write_event(Event::Empty(BytesStart::new("node").with_attributes([
                ("id", node.id.as_str()),
                ("label", node.label.as_str()),
                ("type", node_type),
                ("size", size.as_str()),
            ])))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("nodes")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::Start(BytesStart::new("edges")))
        .map_err(xml_err)?;
    for edge in &graph.edges {
        let weight = format!("{:.3}", edge.weight);
        writer
            .write_event(Event::Empty(BytesStart::new("edge").with_attributes([
                ("id", edge.id.as_str()),
                ("source", edge.source.as_str()),
                ("target", edge.target.as_str()),
                ("label", edge.relation.as_str()),
                ("weight", weight.as_str()),
            ])))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("edges")))
        .map_err(xml_err)?;

    writer
        .write_event(Event::End(BytesEnd::new("graph")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("gexf")))
        .map_err(xml_err)?;

    String::from_utf8(writer.into_inner()).map_err(xml_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build;
    use crate::graph::tests::sample;
    use quick_xml::Reader;

    #[test]
    fn test_json_export_has_nodes_and_edges() {
        let (entities, rels) = sample();
        let json = export(&build(&entities, &rels), ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 4);
        assert_eq!(value["edges"][0]["relation"], "carries");
        assert_eq!(value["nodes"][0]["type"], "satellite");
    }

    #[test]
    fn test_csv_has_two_sections() {
        let (entities, rels) = sample();
        let csv = to_csv(&build(&entities, &rels));
        let nodes_at = csv.find("# nodes").unwrap();
        let edges_at = csv.find("# edges").unwrap();
        assert!(nodes_at < edges_at);
        // header + 4 nodes + blank + header + 3 edges + 2 section labels
        assert_eq!(csv.lines().count(), 12);
        assert!(csv.contains(",INSAT-3D,satellite,"));
    }

    #[test]
    fn test_csv_quotes_special_characters() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_gexf_is_well_formed() {
        let (entities, rels) = sample();
        let xml = to_gexf(&build(&entities, &rels)).unwrap();
        assert!(xml.starts_with("<?xml"));

        let mut reader = Reader::from_str(&xml);
        let (mut nodes, mut edges) = (0, 0);
        loop {
            match reader.read_event().unwrap() {
                Event::Empty(e) if e.name().as_ref() == b"node" => nodes += 1,
                Event::Empty(e) if e.name().as_ref() == b"edge" => edges += 1,
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!((nodes, edges), (4, 3));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("GEXF".parse::<ExportFormat>().unwrap(), ExportFormat::Gexf);
        assert!("png".parse::<ExportFormat>().is_err());
    }
}
