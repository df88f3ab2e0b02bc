//! Parsing Front-End
//!
//! Three PEG grammars drive everything that enters the frame-graph
//! compiler: the *preprocessor* grammar (textual `#include` directives),
//! the *pass* grammar (state, shaders, resources, root signature, vertex
//! attributes) and the *frame-graph* grammar (an ordered list of pass
//! names). The grammars are plain text files compiled at startup by
//! [`grammar::Grammar`]; parsing a source file yields a parse tree whose
//! visitation populates a typed context object.

pub mod framegraph_source;
pub mod grammar;
pub mod pass_source;
pub mod preprocessor;

pub use framegraph_source::parse_frame_graph_source;
pub use grammar::Grammar;
pub use pass_source::{PassParametersSource, parse_pass_source};
pub use preprocessor::Preprocessor;
