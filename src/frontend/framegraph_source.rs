//! Frame-Graph Source
//!
//! The frame-graph file is the simplest of the three grammars: an ordered
//! list of pass names, one per entry. Order in the file is execution order.

use crate::errors::{CinderError, Result};

use super::grammar::Grammar;

/// Parses a frame-graph source into its ordered pass-name list.
pub fn parse_frame_graph_source(
    grammar: &Grammar,
    file: &str,
    source: &str,
) -> Result<Vec<String>> {
    let tree = grammar
        .parse(source)
        .map_err(|failure| CinderError::invalid_source(file, source, failure.offset, failure.message))?;

    let names: Vec<String> = tree
        .children_named(grammar, "PassName")
        .map(|node| node.text(source).to_string())
        .collect();

    if names.is_empty() {
        return Err(CinderError::invalid_source(
            file,
            source,
            0,
            "frame graph lists no passes",
        ));
    }
    Ok(names)
}
