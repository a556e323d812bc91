//! Image reference extraction: decides whether a rule gets a raster fallback.
//!
//! A rule qualifies when it names an SVG background (a file path or an inline
//! `data:image/svg+xml` URL) and an explicit pixel `background-size`. Values that
//! don't match these grammars are ignored silently; only rules that are fully
//! understood produce a descriptor.

use crate::stylesheet::{Declaration, Rule, Source};
use base64::Engine as Base64Engine;
use cssparser::{ParseError, Parser, ParserInput, Token};
use regex::Regex;
use std::sync::OnceLock;

/// Where the SVG for a descriptor comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    /// Path as written in `url(...)`, relative to the configured base path
    File(String),
    /// Decoded SVG markup from a data URL
    Inline(String),
}

impl ImageSource {
    pub fn is_inline(&self) -> bool {
        matches!(self, ImageSource::Inline(_))
    }

    /// The path or markup, verbatim
    pub fn reference(&self) -> &str {
        match self {
            ImageSource::File(path) => path,
            ImageSource::Inline(markup) => markup,
        }
    }
}

/// Target raster size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// A rule's SVG background together with the size to rasterize it at
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub source: ImageSource,
    pub size: Size,
    /// Position of the declaration that supplied the image
    pub decl_source: Option<Source>,
}

fn file_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^([^'")]+\.svg)$"#).expect("valid regex"))
}

fn data_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^data:image/svg\+xml((?:;[\w.=-]+)*)[,;](.*)$").expect("valid regex")
    })
}

fn size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)px(?: (\d+)px)?$").expect("valid regex"))
}

/// The arguments of every `url(...)` in `value`, quoted or not, with CSS
/// escapes resolved. Malformed urls are skipped.
pub fn url_arguments(value: &str) -> Vec<String> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut urls = Vec::new();
    collect_urls(&mut parser, &mut urls);
    urls
}

fn collect_urls<'i>(parser: &mut Parser<'i, '_>, urls: &mut Vec<String>) {
    while let Ok(token) = parser.next().cloned() {
        match token {
            Token::UnquotedUrl(url) => urls.push(url.to_string()),
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                let arg = parser.parse_nested_block(|block| -> std::result::Result<String, ParseError<'i, ()>> {
                    Ok(block.expect_string()?.to_string())
                });
                if let Ok(arg) = arg {
                    urls.push(arg);
                }
            }
            // url() nested in image-set(), -webkit-image-set() and the like
            Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock => {
                let _ = parser.parse_nested_block(|block| -> std::result::Result<(), ParseError<'i, ()>> {
                    collect_urls(block, urls);
                    Ok(())
                });
            }
            _ => {}
        }
    }
}

/// Match a `background`/`background-image` value against the recognized
/// SVG forms. Inline payloads are decoded to markup. A data URL anywhere in
/// the value takes precedence over a file path.
pub fn parse_background_image(value: &str) -> Option<ImageSource> {
    let urls = url_arguments(value);
    if let Some(caps) = urls.iter().find_map(|url| data_url_regex().captures(url)) {
        let params = caps.get(1).map_or("", |m| m.as_str());
        let payload = caps.get(2)?.as_str();
        return decode_data_payload(params, payload).map(ImageSource::Inline);
    }
    urls.iter()
        .find_map(|url| file_url_regex().captures(url.trim()))
        .and_then(|caps| caps.get(1))
        .map(|m| ImageSource::File(m.as_str().to_string()))
}

fn decode_data_payload(params: &str, payload: &str) -> Option<String> {
    let is_base64 = params
        .split(';')
        .any(|p| p.eq_ignore_ascii_case("base64"));
    if is_base64 {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()?;
        return String::from_utf8(bytes).ok();
    }
    percent_encoding::percent_decode_str(payload)
        .decode_utf8()
        .ok()
        .map(|markup| markup.into_owned())
}

/// Match a `background-size` value: `Wpx` or `Wpx Hpx`. A single dimension
/// is used for both width and height.
pub fn parse_background_size(value: &str) -> Option<Size> {
    let caps = size_regex().captures(value.trim())?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = match caps.get(2) {
        Some(h) => h.as_str().parse().ok()?,
        None => width,
    };
    Some(Size { width, height })
}

/// Per-rule accumulator, created fresh for every rule.
///
/// Declarations are folded in order and each match overwrites the previous
/// one, so with conflicting declarations the last one in the rule wins.
#[derive(Debug, Default, Clone)]
pub struct RuleScan {
    image: Option<(ImageSource, Option<Source>)>,
    size: Option<Size>,
}

impl RuleScan {
    pub fn observe(mut self, decl: &Declaration) -> Self {
        match decl.prop.as_str() {
            "background" | "background-image" => {
                if let Some(source) = parse_background_image(&decl.value) {
                    self.image = Some((source, decl.source));
                }
            }
            "background-size" => {
                if let Some(size) = parse_background_size(&decl.value) {
                    self.size = Some(size);
                }
            }
            _ => {}
        }
        self
    }

    pub fn finish(self) -> Option<ImageDescriptor> {
        let (source, decl_source) = self.image?;
        let size = self.size?;
        Some(ImageDescriptor { source, size, decl_source })
    }
}

/// Extract a descriptor from `rule`, or `None` when the rule carries the
/// fallback marker or lacks either an SVG background or a pixel size.
pub fn extract(rule: &Rule, marker: &str) -> Option<ImageDescriptor> {
    if rule.selector.contains(marker) {
        return None;
    }
    rule.declarations
        .iter()
        .fold(RuleScan::default(), RuleScan::observe)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::Stylesheet;

    fn first_rule(css: &str) -> Rule {
        Stylesheet::parse(css).unwrap().rules()[0].clone()
    }

    #[test]
    fn file_reference_with_size() {
        let rule = first_rule(".icon { background: url(images/email.svg) no-repeat; background-size: 20px 20px; }");
        let d = extract(&rule, ".no-svg").unwrap();
        assert_eq!(d.source, ImageSource::File("images/email.svg".into()));
        assert_eq!(d.size, Size { width: 20, height: 20 });
        assert_eq!(d.decl_source, rule.declarations[0].source);
    }

    #[test]
    fn quoted_paths_are_unwrapped() {
        assert_eq!(parse_background_image("url('a/b.svg')"), Some(ImageSource::File("a/b.svg".into())));
        assert_eq!(parse_background_image("url(\"a/b.svg\") center"), Some(ImageSource::File("a/b.svg".into())));
    }

    #[test]
    fn non_svg_urls_do_not_match() {
        assert_eq!(parse_background_image("url(a.png)"), None);
        assert_eq!(parse_background_image("red"), None);
    }

    #[test]
    fn single_dimension_is_square() {
        assert_eq!(parse_background_size("20px"), Some(Size { width: 20, height: 20 }));
        assert_eq!(parse_background_size("16px 32px"), Some(Size { width: 16, height: 32 }));
    }

    #[test]
    fn unsupported_sizes_are_ignored() {
        for v in ["cover", "50%", "20px auto", "1.5px", "20em 20em", "20px  20px"] {
            assert_eq!(parse_background_size(v), None, "{v}");
        }
    }

    #[test]
    fn inline_percent_encoded_markup_is_decoded() {
        let v = "url(\"data:image/svg+xml;charset=utf8,%3Csvg xmlns='http://www.w3.org/2000/svg'%3E%3C/svg%3E\")";
        assert_eq!(
            parse_background_image(v),
            Some(ImageSource::Inline("<svg xmlns='http://www.w3.org/2000/svg'></svg>".into()))
        );
    }

    #[test]
    fn inline_base64_markup_is_decoded() {
        // "<svg/>"
        let v = "url(data:image/svg+xml;base64,PHN2Zy8+) no-repeat";
        assert_eq!(parse_background_image(v), Some(ImageSource::Inline("<svg/>".into())));
    }

    #[test]
    fn inline_with_semicolon_separator() {
        let v = "url('data:image/svg+xml;<svg></svg>')";
        assert_eq!(parse_background_image(v), Some(ImageSource::Inline("<svg></svg>".into())));
    }

    #[test]
    fn parentheses_inside_inline_markup_are_kept() {
        let expected = Some(ImageSource::Inline("<svg><g transform='rotate(45)'></g></svg>".into()));
        for v in [
            "url(data:image/svg+xml,%3Csvg%3E%3Cg%20transform=%27rotate\\(45\\)%27%3E%3C/g%3E%3C/svg%3E) no-repeat",
            "url(data:image/svg+xml,%3Csvg%3E%3Cg%20transform=%27rotate%2845%29%27%3E%3C/g%3E%3C/svg%3E)",
            "url(\"data:image/svg+xml,%3Csvg%3E%3Cg transform='rotate(45)'%3E%3C/g%3E%3C/svg%3E\") no-repeat",
        ] {
            assert_eq!(parse_background_image(v), expected, "{v}");
        }

        let rule = first_rule(
            ".a { background: url(\"data:image/svg+xml,<svg><g transform='translate(1 2)'></g></svg>\"); background-size: 20px; }",
        );
        assert_eq!(
            extract(&rule, ".no-svg").unwrap().source,
            ImageSource::Inline("<svg><g transform='translate(1 2)'></g></svg>".into())
        );
    }

    #[test]
    fn urls_nested_in_functions_are_found() {
        assert_eq!(
            parse_background_image("-webkit-image-set(url(a.svg) 1x), linear-gradient(red, blue)"),
            Some(ImageSource::File("a.svg".into()))
        );
    }

    #[test]
    fn last_declaration_wins() {
        let rule = first_rule(
            ".a { background: url(one.svg); background-size: 10px; background-image: url(two.svg); background-size: 30px 40px; }",
        );
        let d = extract(&rule, ".no-svg").unwrap();
        assert_eq!(d.source, ImageSource::File("two.svg".into()));
        assert_eq!(d.size, Size { width: 30, height: 40 });
        assert_eq!(d.decl_source, rule.declarations[2].source);
    }

    #[test]
    fn unmatched_later_declaration_keeps_earlier_match() {
        let rule = first_rule(".a { background-size: 10px; background-size: cover; background: url(a.svg); }");
        assert_eq!(extract(&rule, ".no-svg").unwrap().size, Size { width: 10, height: 10 });
    }

    #[test]
    fn requires_both_image_and_size() {
        assert!(extract(&first_rule(".a { background: url(a.svg); }"), ".no-svg").is_none());
        assert!(extract(&first_rule(".a { background-size: 20px; }"), ".no-svg").is_none());
    }

    #[test]
    fn property_names_match_exactly() {
        let rule = first_rule(".a { background-position: url(a.svg); -webkit-background-size: 20px; }");
        assert!(extract(&rule, ".no-svg").is_none());
    }

    #[test]
    fn marker_rules_are_skipped() {
        let rule = first_rule(".no-svg .a { background: url(a.svg); background-size: 20px; }");
        assert!(extract(&rule, ".no-svg").is_none());
    }
}
