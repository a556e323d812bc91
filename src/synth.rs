//! Fallback rule synthesis

use crate::extract::{ImageDescriptor, ImageSource, Size};
use crate::stylesheet::{Declaration, Rule};
use sha2::{Digest, Sha256};

fn size_suffix(size: Size) -> String {
    format!("-{}x{}.png", size.width, size.height)
}

/// Lowercase hex SHA-256 of inline markup. Identical markup always maps to
/// the same name.
pub fn content_hash(markup: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(markup.as_bytes());
    hex::encode(hasher.finalize())
}

/// Name of the raster written for `descriptor`.
///
/// `images/x.svg` at 20×20 becomes `images/x-20x20.png`; inline markup becomes
/// `<sha256>-20x20.png`.
pub fn derive_image_name(descriptor: &ImageDescriptor) -> String {
    let suffix = size_suffix(descriptor.size);
    match &descriptor.source {
        ImageSource::File(path) => {
            let stem = path.strip_suffix(".svg").unwrap_or(path);
            format!("{}{}", stem, suffix)
        }
        ImageSource::Inline(markup) => format!("{}{}", content_hash(markup), suffix),
    }
}

/// Prefix every selector of `rule` with `marker` and a descendant combinator.
pub fn fallback_selector(marker: &str, rule: &Rule) -> String {
    rule.selectors()
        .iter()
        .map(|s| format!("{} {}", marker, s))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the sibling rule pointing at the raster. Source positions are taken
/// from the original rule and from the declaration that named the SVG.
pub fn build_fallback_rule(marker: &str, rule: &Rule, descriptor: &ImageDescriptor, image_name: &str) -> Rule {
    let mut fallback = Rule::new(fallback_selector(marker, rule));
    fallback.source = rule.source;

    let mut decl = Declaration::new("background-image", format!("url({})", image_name));
    decl.source = descriptor.decl_source;
    fallback.append(decl);
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stylesheet::Source;

    fn file(path: &str, width: u32, height: u32) -> ImageDescriptor {
        ImageDescriptor {
            source: ImageSource::File(path.into()),
            size: Size { width, height },
            decl_source: Some(Source { line: 2, column: 2 }),
        }
    }

    #[test]
    fn file_names_swap_svg_for_sized_png() {
        assert_eq!(derive_image_name(&file("images/x.svg", 20, 20)), "images/x-20x20.png");
        assert_eq!(derive_image_name(&file("a.b/icon.svg", 16, 32)), "a.b/icon-16x32.png");
    }

    #[test]
    fn inline_names_are_content_addressed() {
        let a = ImageDescriptor {
            source: ImageSource::Inline("<svg/>".into()),
            size: Size { width: 20, height: 10 },
            decl_source: None,
        };
        let mut b = a.clone();
        b.decl_source = Some(Source { line: 9, column: 1 });
        let name = derive_image_name(&a);
        assert_eq!(name, derive_image_name(&b));
        assert_eq!(name, format!("{}-20x10.png", content_hash("<svg/>")));
        assert_eq!(content_hash("<svg/>").len(), 64);

        let mut c = a.clone();
        c.source = ImageSource::Inline("<svg></svg>".into());
        assert_ne!(name, derive_image_name(&c));
    }

    #[test]
    fn selector_list_is_prefixed_per_selector() {
        let rule = Rule::new(".icon, .icon-2");
        assert_eq!(fallback_selector(".no-svg", &rule), ".no-svg .icon, .no-svg .icon-2");
    }

    #[test]
    fn fallback_rule_copies_positions() {
        let mut rule = Rule::new(".icon");
        rule.source = Some(Source { line: 1, column: 1 });
        let d = file("images/email.svg", 20, 20);
        let name = derive_image_name(&d);
        let fallback = build_fallback_rule(".no-svg", &rule, &d, &name);
        assert_eq!(fallback.selector, ".no-svg .icon");
        assert_eq!(fallback.source, rule.source);
        assert_eq!(fallback.declarations.len(), 1);
        assert_eq!(fallback.declarations[0].prop, "background-image");
        assert_eq!(fallback.declarations[0].value, "url(images/email-20x20.png)");
        assert_eq!(fallback.declarations[0].source, d.decl_source);
    }
}
