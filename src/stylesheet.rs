//! Stylesheet tree on top of `cssparser`, plus a printer.
//!
//! The tree keeps just enough structure for the fallback transform: rules with
//! their declarations, block at-rules (`@media`, `@supports`, ...) holding nested
//! nodes, and comments. Every rule and declaration remembers where it started in
//! the input so warnings and synthesized nodes can point back at it.
//!
//! Printing is normalized rather than byte-preserving:
//!
//! ```
//! use svg_fallback::stylesheet::Stylesheet;
//!
//! let sheet = Stylesheet::parse(".a{color:red}").unwrap();
//! assert_eq!(sheet.to_string(), ".a {\n\tcolor: red;\n}");
//! ```

use crate::{Error, Result};
use cssparser::{
    AtRuleParser, BasicParseErrorKind, CowRcStr, DeclarationParser, ParseError, ParseErrorKind,
    Parser as CssParser, ParserInput, ParserState, QualifiedRuleParser, RuleBodyItemParser,
    RuleBodyParser, SourceLocation, SourcePosition, Token,
};
use std::fmt;

/// 1-based position of a node's first character in the parsed input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Source {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A `prop: value` pair inside a rule
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub prop: String,
    pub value: String,
    pub important: bool,
    pub source: Option<Source>,
}

impl Declaration {
    pub fn new(prop: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            prop: prop.into(),
            value: value.into(),
            important: false,
            source: None,
        }
    }
}

/// A style rule: selector list plus ordered declarations
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub selector: String,
    pub declarations: Vec<Declaration>,
    pub source: Option<Source>,
}

impl Rule {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            declarations: Vec::new(),
            source: None,
        }
    }

    pub fn append(&mut self, decl: Declaration) {
        self.declarations.push(decl);
    }

    /// The comma-separated selectors of this rule, trimmed.
    ///
    /// Commas nested in parentheses, brackets or strings (`:is(a, b)`,
    /// `[title="a,b"]`) do not split.
    pub fn selectors(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut escaped = false;
        let mut start = 0;
        for (i, c) in self.selector.char_indices() {
            if let Some(q) = quote {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
                continue;
            }
            match c {
                '"' | '\'' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    out.push(self.selector[start..i].trim());
                    start = i + 1;
                }
                _ => {}
            }
        }
        out.push(self.selector[start..].trim());
        out.retain(|s| !s.is_empty());
        out
    }
}

/// Body of a block at-rule
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Conditional group rules (`@media`, `@supports`, ...) nest ordinary nodes
    Nodes(Vec<Node>),
    /// Descriptor blocks (`@font-face`, `@page`, ...) hold declarations
    Declarations(Vec<Declaration>),
}

/// An at-rule such as `@import url(a.css);` or `@media print { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct AtRule {
    pub name: String,
    pub params: String,
    pub block: Option<Block>,
    pub source: Option<Source>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Rule(Rule),
    AtRule(AtRule),
    Comment(String),
}

/// A parsed stylesheet
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stylesheet {
    pub nodes: Vec<Node>,
}

// At-rules whose blocks contain rules rather than declarations.
const NESTING_AT_RULES: &[&str] = &[
    "media",
    "supports",
    "document",
    "-moz-document",
    "layer",
    "container",
    "scope",
    "starting-style",
];

type CssResult<'i, T> = std::result::Result<T, ParseError<'i, String>>;

impl Stylesheet {
    /// Parse `css` with the `cssparser` tokenizer. Selectors, at-rule
    /// preludes and declaration values are kept as raw source text.
    pub fn parse(css: &str) -> Result<Self> {
        let mut input = ParserInput::new(css);
        let mut parser = CssParser::new(&mut input);
        let nodes = parse_nodes(&mut parser).map_err(into_error)?;
        Ok(Self { nodes })
    }

    /// All style rules, depth-first in document order.
    pub fn rules(&self) -> Vec<&Rule> {
        fn collect<'a>(nodes: &'a [Node], out: &mut Vec<&'a Rule>) {
            for node in nodes {
                match node {
                    Node::Rule(rule) => out.push(rule),
                    Node::AtRule(AtRule { block: Some(Block::Nodes(children)), .. }) => {
                        collect(children, out)
                    }
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.nodes, &mut out);
        out
    }
}

impl std::str::FromStr for Stylesheet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Stylesheet::parse(s)
    }
}

fn source_of(location: SourceLocation) -> Source {
    // cssparser lines are 0-based, columns 1-based
    Source { line: location.line + 1, column: location.column }
}

fn custom<'i>(location: SourceLocation, message: impl Into<String>) -> ParseError<'i, String> {
    ParseError { kind: ParseErrorKind::Custom(message.into()), location }
}

fn into_error(err: ParseError<'_, String>) -> Error {
    let at = source_of(err.location);
    let message = match err.kind {
        ParseErrorKind::Custom(message) => message,
        ParseErrorKind::Basic(BasicParseErrorKind::EndOfInput) => "unexpected end of input".to_string(),
        ParseErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(token)) => {
            format!("unexpected {token:?}")
        }
        ParseErrorKind::Basic(BasicParseErrorKind::AtRuleInvalid(name)) => {
            format!("unexpected `@{}`", &*name)
        }
        ParseErrorKind::Basic(kind) => format!("{kind:?}"),
    };
    Error::Parse { line: at.line, column: at.column, message }
}

fn bad_token<'i>(token: &Token<'i>, location: SourceLocation) -> Option<ParseError<'i, String>> {
    match token {
        Token::BadUrl(_) => Some(custom(
            location,
            "malformed `url(...)`: quotes, parentheses and whitespace must be escaped or quoted",
        )),
        Token::BadString(_) => Some(custom(location, "unterminated string")),
        _ => None,
    }
}

/// A rule list: the top level or the body of `@media` and friends.
fn parse_nodes<'i>(input: &mut CssParser<'i, '_>) -> CssResult<'i, Vec<Node>> {
    let mut nodes = Vec::new();
    loop {
        let start = input.state();
        let Ok(token) = input.next_including_whitespace_and_comments().cloned() else {
            return Ok(nodes);
        };
        match token {
            Token::WhiteSpace(_) | Token::CDO | Token::CDC => {}
            Token::Comment(text) => {
                let raw = input.slice_from(start.position());
                if raw.len() < 4 || !raw.ends_with("*/") {
                    return Err(custom(start.source_location(), "unterminated comment"));
                }
                nodes.push(Node::Comment(text.to_string()));
            }
            Token::AtKeyword(name) => nodes.push(Node::AtRule(at_rule(input, &start, name.to_string())?)),
            Token::CloseCurlyBracket => return Err(custom(start.source_location(), "unexpected `}`")),
            _ => {
                input.reset(&start);
                nodes.push(Node::Rule(rule(input, &start)?));
            }
        }
    }
}

/// Parse the `{ ... }` block the parser was just positioned on, failing
/// when end of input closed it instead of a `}`.
fn nested_block<'i, T>(
    input: &mut CssParser<'i, '_>,
    open: SourceLocation,
    parse: impl for<'tt> FnOnce(&mut CssParser<'i, 'tt>) -> CssResult<'i, T>,
) -> CssResult<'i, T> {
    let (value, inner_end) = input.parse_nested_block(|nested| -> CssResult<'i, (T, SourcePosition)> {
        let value = parse(nested)?;
        Ok((value, nested.position()))
    })?;
    if input.position().byte_index() == inner_end.byte_index() {
        return Err(custom(open, "unclosed block"));
    }
    Ok(value)
}

fn at_rule<'i>(input: &mut CssParser<'i, '_>, start: &ParserState, name: String) -> CssResult<'i, AtRule> {
    let params_start = input.position();
    let open = loop {
        let location = input.current_source_location();
        match input.next_including_whitespace_and_comments().cloned() {
            Ok(Token::CurlyBracketBlock) => break Some(location),
            Ok(Token::Semicolon) | Err(_) => break None,
            Ok(Token::CloseCurlyBracket) => return Err(custom(location, "unexpected `}`")),
            Ok(token) => {
                if let Some(err) = bad_token(&token, location) {
                    return Err(err);
                }
            }
        }
    };
    let params = input
        .slice_from(params_start)
        .trim()
        .trim_end_matches(&[';', '{'][..])
        .trim()
        .to_string();

    let block = match open {
        None => None,
        Some(open) if NESTING_AT_RULES.contains(&name.to_ascii_lowercase().as_str()) => {
            Some(Block::Nodes(nested_block(input, open, |nested| parse_nodes(nested))?))
        }
        Some(open) => Some(Block::Declarations(nested_block(input, open, |nested| declarations(nested))?)),
    };
    Ok(AtRule { name, params, block, source: Some(source_of(start.source_location())) })
}

fn rule<'i>(input: &mut CssParser<'i, '_>, start: &ParserState) -> CssResult<'i, Rule> {
    let prelude = input.position();
    let open = loop {
        let location = input.current_source_location();
        match input.next_including_whitespace_and_comments().cloned() {
            Ok(Token::CurlyBracketBlock) => break location,
            Ok(Token::Semicolon) | Ok(Token::CloseCurlyBracket) | Err(_) => {
                let selector = input.slice_from(prelude).trim_end_matches(&[';', '}'][..]).trim();
                return Err(custom(
                    start.source_location(),
                    format!("expected `{{` after selector `{selector}`"),
                ));
            }
            Ok(token) => {
                if let Some(err) = bad_token(&token, location) {
                    return Err(err);
                }
            }
        }
    };
    let selector = input.slice_from(prelude).trim_end_matches('{').trim().to_string();
    let declarations = nested_block(input, open, |nested| declarations(nested))?;
    Ok(Rule { selector, declarations, source: Some(source_of(start.source_location())) })
}

fn declarations<'i>(input: &mut CssParser<'i, '_>) -> CssResult<'i, Vec<Declaration>> {
    let mut list = DeclarationList;
    let mut decls = Vec::new();
    for item in RuleBodyParser::new(input, &mut list) {
        decls.push(item.map_err(|(err, _)| err)?);
    }
    Ok(decls)
}

/// Splits a trailing `!important` off a raw value.
fn split_important(raw: &str) -> (String, bool) {
    let value = raw.trim();
    if let Some(idx) = value.rfind('!') {
        if value[idx + 1..].trim().eq_ignore_ascii_case("important") {
            return (value[..idx].trim_end().to_string(), true);
        }
    }
    (value.to_string(), false)
}

/// Declaration block items. Nested rules and at-rules are rejected.
struct DeclarationList;

impl<'i> DeclarationParser<'i> for DeclarationList {
    type Declaration = Declaration;
    type Error = String;

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut CssParser<'i, 't>,
        start: &ParserState,
    ) -> CssResult<'i, Declaration> {
        let value_start = input.position();
        loop {
            let location = input.current_source_location();
            let Ok(token) = input.next_including_whitespace_and_comments().cloned() else {
                break;
            };
            if let Some(err) = bad_token(&token, location) {
                return Err(err);
            }
        }
        let (value, important) = split_important(input.slice_from(value_start));
        Ok(Declaration {
            prop: name.to_string(),
            value,
            important,
            source: Some(source_of(start.source_location())),
        })
    }
}

impl<'i> AtRuleParser<'i> for DeclarationList {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = String;
}

impl<'i> QualifiedRuleParser<'i> for DeclarationList {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = String;
}

impl<'i> RuleBodyItemParser<'i, Declaration, String> for DeclarationList {
    fn parse_declarations(&self) -> bool {
        true
    }

    fn parse_qualified(&self) -> bool {
        false
    }
}

fn write_declarations(f: &mut fmt::Formatter<'_>, decls: &[Declaration], indent: usize) -> fmt::Result {
    for decl in decls {
        write!(f, "{}\t{}: {}", "\t".repeat(indent), decl.prop, decl.value)?;
        if decl.important {
            write!(f, " !important")?;
        }
        writeln!(f, ";")?;
    }
    Ok(())
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[Node], indent: usize) -> fmt::Result {
    let pad = "\t".repeat(indent);
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        match node {
            Node::Comment(text) => write!(f, "{}/*{}*/", pad, text)?,
            Node::Rule(rule) => {
                writeln!(f, "{}{} {{", pad, rule.selector)?;
                write_declarations(f, &rule.declarations, indent)?;
                write!(f, "{}}}", pad)?;
            }
            Node::AtRule(at) => {
                write!(f, "{}@{}", pad, at.name)?;
                if !at.params.is_empty() {
                    write!(f, " {}", at.params)?;
                }
                match &at.block {
                    None => write!(f, ";")?,
                    Some(Block::Declarations(decls)) => {
                        writeln!(f, " {{")?;
                        write_declarations(f, decls, indent)?;
                        write!(f, "{}}}", pad)?;
                    }
                    Some(Block::Nodes(children)) => {
                        writeln!(f, " {{")?;
                        write_nodes(f, children, indent + 1)?;
                        if !children.is_empty() {
                            writeln!(f)?;
                        }
                        write!(f, "{}}}", pad)?;
                    }
                }
            }
        }
    }
    Ok(())
}

impl fmt::Display for Stylesheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_nodes(f, &self.nodes, 0)
    }
}
