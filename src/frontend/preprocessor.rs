//! Include Preprocessor
//!
//! Runs before the pass grammar: scans a source for `#include <name.ext>`
//! directives and substitutes each with the referenced file's content.
//! Exactly one include depth is supported; included text that itself
//! contains an `#include` is rejected rather than silently ignored.

use crate::errors::{CinderError, Result};

use super::grammar::Grammar;

/// One recorded `#include` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Referenced file name (`common.pass`).
    pub filename: String,
    /// Byte position of the directive in the source.
    pub position: usize,
    /// Byte length of the directive text.
    pub length: usize,
}

/// Preprocessor over one compiled grammar instance.
pub struct Preprocessor<'g> {
    grammar: &'g Grammar,
}

impl<'g> Preprocessor<'g> {
    #[must_use]
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar }
    }

    /// Scans `source`, returning its directives in ascending position order.
    pub fn scan(&self, file: &str, source: &str) -> Result<Vec<IncludeDirective>> {
        let tree = self.grammar.parse(source).map_err(|failure| {
            CinderError::invalid_source(file, source, failure.offset, failure.message)
        })?;

        let mut directives = Vec::new();
        for include in tree.children_named(self.grammar, "Include") {
            let filename = include
                .child(self.grammar, "FileName")
                .map(|n| n.text(source).to_string())
                .ok_or_else(|| {
                    CinderError::invalid_source(
                        file,
                        source,
                        include.start,
                        "include directive without a file name",
                    )
                })?;
            directives.push(IncludeDirective {
                filename,
                position: include.start,
                length: include.end - include.start,
            });
        }
        Ok(directives)
    }

    /// Substitutes every directive with the content produced by `resolve`,
    /// working in descending position order so earlier offsets stay stable.
    ///
    /// `resolve` receives the included file name and returns its content.
    /// Included content containing further directives fails with
    /// [`CinderError::InvalidPassSource`]; nesting is outside the contract.
    pub fn substitute<F>(&self, file: &str, source: &str, mut resolve: F) -> Result<String>
    where
        F: FnMut(&str) -> Result<String>,
    {
        let mut directives = self.scan(file, source)?;
        directives.sort_by_key(|d| d.position);

        let mut output = source.to_string();
        for directive in directives.iter().rev() {
            let content = resolve(&directive.filename)?;
            if !self.scan(&directive.filename, &content)?.is_empty() {
                return Err(CinderError::invalid_source(
                    file,
                    source,
                    directive.position,
                    format!(
                        "'{}' contains a nested #include; only one include depth is supported",
                        directive.filename
                    ),
                ));
            }
            output.replace_range(
                directive.position..directive.position + directive.length,
                &content,
            );
        }
        Ok(output)
    }
}
