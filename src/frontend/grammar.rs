//! Runtime PEG Interpreter
//!
//! Compiles a textual PEG grammar into a rule table and matches inputs
//! against it, producing a parse tree of named rule applications. The
//! grammar dialect is the classic one:
//!
//! ```text
//! # comment
//! Rule      <- Sequence ('/' Sequence)*
//! Sequence  <- Prefix*
//! Prefix    <- ('&' / '!')? Suffix
//! Suffix    <- Primary ('*' / '+' / '?')?
//! Primary   <- RuleName / '(' Expression ')' / 'literal' / [class] / .
//! ```
//!
//! Literals use single quotes with `\n \t \r \\ \'` escapes; classes
//! support ranges (`[a-zA-Z_]`) and negation (`[^x]`). Whitespace is
//! never implicit: grammars spell out their own spacing rules.
//!
//! Rules whose name starts with `_` are *suppressed*: they match as usual
//! but contribute no parse-tree nodes. Everything else produces a
//! [`ParseNode`] spanning the matched bytes, with the nodes of nested rule
//! applications as children.

use rustc_hash::FxHashMap;

/// Compiled grammar: a resolved rule table plus the start rule (the first
/// rule in the file).
#[derive(Debug)]
pub struct Grammar {
    rules: Vec<Rule>,
    start: usize,
}

#[derive(Debug)]
struct Rule {
    name: String,
    expr: PegExpr,
    suppressed: bool,
}

#[derive(Debug, Clone)]
enum PegExpr {
    Rule(usize),
    Seq(Vec<PegExpr>),
    Choice(Vec<PegExpr>),
    ZeroOrMore(Box<PegExpr>),
    OneOrMore(Box<PegExpr>),
    Optional(Box<PegExpr>),
    And(Box<PegExpr>),
    Not(Box<PegExpr>),
    Literal(String),
    Class { ranges: Vec<(char, char)>, negated: bool },
    Any,
}

/// One node of the parse tree: which rule matched and where.
#[derive(Debug, Clone)]
pub struct ParseNode {
    /// Index of the matched rule; resolve with [`Grammar::rule_name`].
    pub rule: usize,
    /// Byte range of the match in the input.
    pub start: usize,
    pub end: usize,
    /// Nodes of nested (non-suppressed) rule applications, in match order.
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    /// Matched text slice.
    #[inline]
    #[must_use]
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.start..self.end]
    }

    /// First child matching `rule`, if any.
    #[must_use]
    pub fn child(&self, grammar: &Grammar, rule: &str) -> Option<&ParseNode> {
        self.children
            .iter()
            .find(|c| grammar.rule_name(c.rule) == rule)
    }

    /// All children matching `rule`, in order.
    pub fn children_named<'a>(
        &'a self,
        grammar: &'a Grammar,
        rule: &'a str,
    ) -> impl Iterator<Item = &'a ParseNode> {
        self.children
            .iter()
            .filter(move |c| grammar.rule_name(c.rule) == rule)
    }
}

/// Grammar-file compilation failure (byte offset into the grammar text).
#[derive(Debug)]
pub struct GrammarCompileError {
    pub offset: usize,
    pub message: String,
}

/// Input parse failure (byte offset of the furthest position reached).
#[derive(Debug)]
pub struct ParseFailure {
    pub offset: usize,
    pub message: String,
}

impl Grammar {
    /// Compiles a grammar from its textual form.
    pub fn compile(text: &str) -> Result<Self, GrammarCompileError> {
        let raw_rules = GrammarReader::new(text).read_rules()?;
        if raw_rules.is_empty() {
            return Err(GrammarCompileError {
                offset: 0,
                message: "grammar defines no rules".to_string(),
            });
        }

        let mut ids = FxHashMap::default();
        for (index, (name, _)) in raw_rules.iter().enumerate() {
            if ids.insert(name.clone(), index).is_some() {
                return Err(GrammarCompileError {
                    offset: 0,
                    message: format!("rule '{name}' is defined twice"),
                });
            }
        }

        let mut rules = Vec::with_capacity(raw_rules.len());
        for (name, raw) in raw_rules {
            let expr = resolve(raw, &ids).map_err(|unknown| GrammarCompileError {
                offset: 0,
                message: format!("rule '{name}' references unknown rule '{unknown}'"),
            })?;
            let suppressed = name.starts_with('_');
            rules.push(Rule {
                name,
                expr,
                suppressed,
            });
        }

        Ok(Self { rules, start: 0 })
    }

    /// Name of a rule by index.
    #[inline]
    #[must_use]
    pub fn rule_name(&self, rule: usize) -> &str {
        &self.rules[rule].name
    }

    /// Matches `input` against the start rule. The whole input must be
    /// consumed; otherwise the furthest position reached is reported.
    pub fn parse(&self, input: &str) -> Result<ParseNode, ParseFailure> {
        let mut matcher = Matcher {
            grammar: self,
            input,
            furthest: 0,
        };
        let mut children = Vec::new();
        let matched = matcher.match_expr(&PegExpr::Rule(self.start), 0, &mut children);
        match matched {
            Some(end) if end == input.len() => {
                // The start rule itself is the single root node (unless
                // suppressed, which would be a degenerate grammar).
                children.pop().ok_or_else(|| ParseFailure {
                    offset: 0,
                    message: "start rule is suppressed".to_string(),
                })
            }
            _ => {
                let offset = matcher.furthest;
                Err(ParseFailure {
                    offset,
                    message: format!(
                        "syntax error while matching rule '{}'",
                        self.rules[self.start].name
                    ),
                })
            }
        }
    }
}

fn resolve(raw: RawExpr, ids: &FxHashMap<String, usize>) -> Result<PegExpr, String> {
    Ok(match raw {
        RawExpr::Ref(name) => PegExpr::Rule(*ids.get(&name).ok_or(name)?),
        RawExpr::Seq(items) => PegExpr::Seq(
            items
                .into_iter()
                .map(|i| resolve(i, ids))
                .collect::<Result<_, _>>()?,
        ),
        RawExpr::Choice(items) => PegExpr::Choice(
            items
                .into_iter()
                .map(|i| resolve(i, ids))
                .collect::<Result<_, _>>()?,
        ),
        RawExpr::ZeroOrMore(inner) => PegExpr::ZeroOrMore(Box::new(resolve(*inner, ids)?)),
        RawExpr::OneOrMore(inner) => PegExpr::OneOrMore(Box::new(resolve(*inner, ids)?)),
        RawExpr::Optional(inner) => PegExpr::Optional(Box::new(resolve(*inner, ids)?)),
        RawExpr::And(inner) => PegExpr::And(Box::new(resolve(*inner, ids)?)),
        RawExpr::Not(inner) => PegExpr::Not(Box::new(resolve(*inner, ids)?)),
        RawExpr::Literal(text) => PegExpr::Literal(text),
        RawExpr::Class { ranges, negated } => PegExpr::Class { ranges, negated },
        RawExpr::Any => PegExpr::Any,
    })
}

// ============================================================================
// Matching
// ============================================================================

struct Matcher<'g, 'i> {
    grammar: &'g Grammar,
    input: &'i str,
    furthest: usize,
}

impl Matcher<'_, '_> {
    /// Attempts to match `expr` at byte `pos`. On success returns the end
    /// position and appends any produced nodes to `children`; on failure
    /// leaves `children` untouched.
    fn match_expr(
        &mut self,
        expr: &PegExpr,
        pos: usize,
        children: &mut Vec<ParseNode>,
    ) -> Option<usize> {
        match expr {
            PegExpr::Rule(id) => {
                let rule = &self.grammar.rules[*id];
                let mut kids = Vec::new();
                let end = self.match_expr(&rule.expr, pos, &mut kids)?;
                if !rule.suppressed {
                    children.push(ParseNode {
                        rule: *id,
                        start: pos,
                        end,
                        children: kids,
                    });
                }
                Some(end)
            }
            PegExpr::Seq(items) => {
                let checkpoint = children.len();
                let mut cursor = pos;
                for item in items {
                    match self.match_expr(item, cursor, children) {
                        Some(end) => cursor = end,
                        None => {
                            children.truncate(checkpoint);
                            return None;
                        }
                    }
                }
                Some(cursor)
            }
            PegExpr::Choice(items) => {
                for item in items {
                    let checkpoint = children.len();
                    if let Some(end) = self.match_expr(item, pos, children) {
                        return Some(end);
                    }
                    children.truncate(checkpoint);
                }
                None
            }
            PegExpr::ZeroOrMore(inner) => {
                let mut cursor = pos;
                loop {
                    let checkpoint = children.len();
                    match self.match_expr(inner, cursor, children) {
                        Some(end) if end > cursor => cursor = end,
                        Some(_) => break, // empty match, stop
                        None => {
                            children.truncate(checkpoint);
                            break;
                        }
                    }
                }
                Some(cursor)
            }
            PegExpr::OneOrMore(inner) => {
                let checkpoint = children.len();
                let first = self.match_expr(inner, pos, children);
                let Some(mut cursor) = first else {
                    children.truncate(checkpoint);
                    return None;
                };
                loop {
                    let iteration = children.len();
                    match self.match_expr(inner, cursor, children) {
                        Some(end) if end > cursor => cursor = end,
                        Some(_) => break,
                        None => {
                            children.truncate(iteration);
                            break;
                        }
                    }
                }
                Some(cursor)
            }
            PegExpr::Optional(inner) => {
                let checkpoint = children.len();
                match self.match_expr(inner, pos, children) {
                    Some(end) => Some(end),
                    None => {
                        children.truncate(checkpoint);
                        Some(pos)
                    }
                }
            }
            PegExpr::And(inner) => {
                let mut scratch = Vec::new();
                self.match_expr(inner, pos, &mut scratch).map(|_| pos)
            }
            PegExpr::Not(inner) => {
                let mut scratch = Vec::new();
                match self.match_expr(inner, pos, &mut scratch) {
                    Some(_) => None,
                    None => Some(pos),
                }
            }
            PegExpr::Literal(text) => {
                if self.input[pos..].starts_with(text.as_str()) {
                    Some(pos + text.len())
                } else {
                    self.furthest = self.furthest.max(pos);
                    None
                }
            }
            PegExpr::Class { ranges, negated } => {
                let ch = self.input[pos..].chars().next()?;
                let in_class = ranges.iter().any(|(lo, hi)| ch >= *lo && ch <= *hi);
                if in_class != *negated {
                    Some(pos + ch.len_utf8())
                } else {
                    self.furthest = self.furthest.max(pos);
                    None
                }
            }
            PegExpr::Any => {
                let ch = self.input[pos..].chars().next();
                match ch {
                    Some(c) => Some(pos + c.len_utf8()),
                    None => {
                        self.furthest = self.furthest.max(pos);
                        None
                    }
                }
            }
        }
    }
}

// ============================================================================
// Grammar Text Reader
// ============================================================================

#[derive(Debug, Clone)]
enum RawExpr {
    Ref(String),
    Seq(Vec<RawExpr>),
    Choice(Vec<RawExpr>),
    ZeroOrMore(Box<RawExpr>),
    OneOrMore(Box<RawExpr>),
    Optional(Box<RawExpr>),
    And(Box<RawExpr>),
    Not(Box<RawExpr>),
    Literal(String),
    Class { ranges: Vec<(char, char)>, negated: bool },
    Any,
}

struct GrammarReader<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> GrammarReader<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> GrammarCompileError {
        GrammarCompileError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn read_rules(mut self) -> Result<Vec<(String, RawExpr)>, GrammarCompileError> {
        let mut rules = Vec::new();
        loop {
            self.skip_trivia();
            if self.at_end() {
                break;
            }
            let name = self
                .read_identifier()
                .ok_or_else(|| self.error("expected rule name"))?;
            self.skip_trivia();
            if !self.eat_str("<-") {
                return Err(self.error(format!("expected '<-' after rule name '{name}'")));
            }
            let expr = self.read_expression()?;
            rules.push((name, expr));
        }
        Ok(rules)
    }

    fn read_expression(&mut self) -> Result<RawExpr, GrammarCompileError> {
        let mut alternatives = vec![self.read_sequence()?];
        loop {
            self.skip_trivia();
            if self.eat_str("/") {
                alternatives.push(self.read_sequence()?);
            } else {
                break;
            }
        }
        Ok(if alternatives.len() == 1 {
            alternatives.pop().unwrap()
        } else {
            RawExpr::Choice(alternatives)
        })
    }

    fn read_sequence(&mut self) -> Result<RawExpr, GrammarCompileError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            let Some(item) = self.read_prefix()? else {
                break;
            };
            items.push(item);
        }
        if items.is_empty() {
            return Err(self.error("empty sequence"));
        }
        Ok(if items.len() == 1 {
            items.pop().unwrap()
        } else {
            RawExpr::Seq(items)
        })
    }

    /// Reads one prefixed/suffixed primary; `Ok(None)` when the sequence ends
    /// (at `/`, `)`, end of input, or the start of the next rule).
    fn read_prefix(&mut self) -> Result<Option<RawExpr>, GrammarCompileError> {
        let and = self.eat_str("&");
        let not = !and && self.eat_str("!");
        if and || not {
            self.skip_trivia();
        }
        let Some(primary) = self.read_suffix()? else {
            if and || not {
                return Err(self.error("dangling predicate operator"));
            }
            return Ok(None);
        };
        Ok(Some(if and {
            RawExpr::And(Box::new(primary))
        } else if not {
            RawExpr::Not(Box::new(primary))
        } else {
            primary
        }))
    }

    fn read_suffix(&mut self) -> Result<Option<RawExpr>, GrammarCompileError> {
        let Some(primary) = self.read_primary()? else {
            return Ok(None);
        };
        Ok(Some(if self.eat_str("*") {
            RawExpr::ZeroOrMore(Box::new(primary))
        } else if self.eat_str("+") {
            RawExpr::OneOrMore(Box::new(primary))
        } else if self.eat_str("?") {
            RawExpr::Optional(Box::new(primary))
        } else {
            primary
        }))
    }

    fn read_primary(&mut self) -> Result<Option<RawExpr>, GrammarCompileError> {
        if self.at_end() {
            return Ok(None);
        }
        let rest = &self.text[self.pos..];
        let first = rest.chars().next().unwrap();

        match first {
            '/' | ')' => Ok(None),
            '(' => {
                self.pos += 1;
                let inner = self.read_expression()?;
                self.skip_trivia();
                if !self.eat_str(")") {
                    return Err(self.error("expected ')'"));
                }
                Ok(Some(inner))
            }
            '\'' => Ok(Some(self.read_literal()?)),
            '[' => Ok(Some(self.read_class()?)),
            '.' => {
                self.pos += 1;
                Ok(Some(RawExpr::Any))
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                // An identifier followed by '<-' starts the next rule.
                let saved = self.pos;
                let name = self.read_identifier().unwrap();
                let after = self.pos;
                self.skip_trivia();
                if self.text[self.pos..].starts_with("<-") {
                    self.pos = saved;
                    return Ok(None);
                }
                self.pos = after;
                Ok(Some(RawExpr::Ref(name)))
            }
            _ => Ok(None),
        }
    }

    fn read_literal(&mut self) -> Result<RawExpr, GrammarCompileError> {
        debug_assert!(self.text[self.pos..].starts_with('\''));
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(ch) = self.text[self.pos..].chars().next() else {
                return Err(self.error("unterminated literal"));
            };
            self.pos += ch.len_utf8();
            match ch {
                '\'' => break,
                '\\' => {
                    let Some(escaped) = self.text[self.pos..].chars().next() else {
                        return Err(self.error("unterminated escape"));
                    };
                    self.pos += escaped.len_utf8();
                    value.push(unescape(escaped));
                }
                other => value.push(other),
            }
        }
        if value.is_empty() {
            return Err(self.error("empty literal"));
        }
        Ok(RawExpr::Literal(value))
    }

    fn read_class(&mut self) -> Result<RawExpr, GrammarCompileError> {
        debug_assert!(self.text[self.pos..].starts_with('['));
        self.pos += 1;
        let negated = self.eat_str("^");
        let mut ranges = Vec::new();
        loop {
            let Some(ch) = self.text[self.pos..].chars().next() else {
                return Err(self.error("unterminated character class"));
            };
            if ch == ']' {
                self.pos += 1;
                break;
            }
            let lo = self.read_class_char()?;
            if self.text[self.pos..].starts_with('-') && !self.text[self.pos + 1..].starts_with(']')
            {
                self.pos += 1;
                let hi = self.read_class_char()?;
                ranges.push((lo, hi));
            } else {
                ranges.push((lo, lo));
            }
        }
        if ranges.is_empty() {
            return Err(self.error("empty character class"));
        }
        Ok(RawExpr::Class { ranges, negated })
    }

    fn read_class_char(&mut self) -> Result<char, GrammarCompileError> {
        let Some(ch) = self.text[self.pos..].chars().next() else {
            return Err(self.error("unterminated character class"));
        };
        self.pos += ch.len_utf8();
        if ch == '\\' {
            let Some(escaped) = self.text[self.pos..].chars().next() else {
                return Err(self.error("unterminated escape"));
            };
            self.pos += escaped.len_utf8();
            return Ok(unescape(escaped));
        }
        Ok(ch)
    }

    fn read_identifier(&mut self) -> Option<String> {
        let rest = &self.text[self.pos..];
        let mut len = 0;
        for ch in rest.chars() {
            let valid = if len == 0 {
                ch.is_ascii_alphabetic() || ch == '_'
            } else {
                ch.is_ascii_alphanumeric() || ch == '_'
            };
            if !valid {
                break;
            }
            len += ch.len_utf8();
        }
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(rest[..len].to_string())
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = &self.text[self.pos..];
            if let Some(ch) = rest.chars().next() {
                if ch.is_whitespace() {
                    self.pos += ch.len_utf8();
                    continue;
                }
                if ch == '#' {
                    let line_end = rest.find('\n').map_or(self.text.len(), |i| self.pos + i);
                    self.pos = line_end;
                    continue;
                }
            }
            break;
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.text[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }
}

fn unescape(ch: char) -> char {
    match ch {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBERS: &str = r"
# a list of comma-separated numbers
List   <- _ Number (_ ',' _ Number)* _ !.
Number <- [0-9]+ ('.' [0-9]+)?
_      <- [ \t\n]*
";

    #[test]
    fn compiles_and_parses() {
        let grammar = Grammar::compile(NUMBERS).unwrap();
        let tree = grammar.parse("1, 2.5,42").unwrap();
        assert_eq!(grammar.rule_name(tree.rule), "List");
        let numbers: Vec<&str> = tree
            .children_named(&grammar, "Number")
            .map(|n| n.text("1, 2.5,42"))
            .collect();
        assert_eq!(numbers, vec!["1", "2.5", "42"]);
    }

    #[test]
    fn suppressed_rules_leave_no_nodes() {
        let grammar = Grammar::compile(NUMBERS).unwrap();
        let tree = grammar.parse("7 , 8").unwrap();
        assert!(tree.children.iter().all(|c| grammar.rule_name(c.rule) == "Number"));
    }

    #[test]
    fn reports_furthest_failure() {
        let grammar = Grammar::compile(NUMBERS).unwrap();
        let failure = grammar.parse("1, x").unwrap_err();
        assert_eq!(failure.offset, 3);
    }

    #[test]
    fn unknown_rule_reference_fails_compile() {
        let err = Grammar::compile("A <- B").unwrap_err();
        assert!(err.message.contains("unknown rule 'B'"));
    }

    #[test]
    fn negated_class() {
        let grammar = Grammar::compile("Line <- [^\\n]+").unwrap();
        let tree = grammar.parse("hello world").unwrap();
        assert_eq!(tree.end, 11);
        assert!(grammar.parse("a\nb").is_err());
    }

    #[test]
    fn predicates_do_not_consume() {
        let grammar = Grammar::compile("A <- &'ab' 'a' 'b' !.").unwrap();
        assert!(grammar.parse("ab").is_ok());
        assert!(grammar.parse("ac").is_err());
    }
}
