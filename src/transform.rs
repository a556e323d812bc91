//! The stylesheet transform: rewrite rules, then convert their images.

use crate::extract::extract;
use crate::pipeline::ConversionPipeline;
use crate::renderer::Renderer;
use crate::stylesheet::{AtRule, Block, Node, Rule, Stylesheet};
use crate::synth::{build_fallback_rule, derive_image_name};
use crate::task::{ConversionTask, Diagnostics, TaskCollector, Warning};
use crate::{FallbackConfig, Result};

/// Rewritten CSS plus the warnings produced while converting images
#[derive(Debug, Clone)]
pub struct ProcessedCss {
    pub css: String,
    pub warnings: Vec<Warning>,
}

/// Adds raster fallbacks for SVG backgrounds and renders them with `R`
pub struct SvgFallback<R> {
    config: FallbackConfig,
    renderer: R,
}

impl<R: Renderer> SvgFallback<R> {
    pub fn new(config: FallbackConfig, renderer: R) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, renderer })
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Insert a fallback rule after every qualifying rule and return one task
    /// per qualifying rule, in document order. Rules nested in `@media` and
    /// similar blocks are visited where they appear. A rule already followed
    /// by its own fallback keeps its task but gets no second copy.
    pub fn rewrite(&self, sheet: &mut Stylesheet) -> Vec<ConversionTask> {
        let mut collector = TaskCollector::new();
        rewrite_nodes(&mut sheet.nodes, &self.config.fallback_selector, &mut collector);
        log::debug!("{} fallback rule(s) added", collector.len());
        collector.into_tasks()
    }

    /// Rewrite `sheet` and convert every referenced image.
    ///
    /// The rewrite is kept even when conversion fails.
    pub async fn process(&self, sheet: &mut Stylesheet, diagnostics: &mut Diagnostics) -> Result<()> {
        let tasks = self.rewrite(sheet);
        ConversionPipeline::new(&self.config, &self.renderer)
            .run(&tasks, diagnostics)
            .await
    }

    /// Parse, process and print `css`.
    pub async fn process_css(&self, css: &str) -> Result<ProcessedCss> {
        let mut sheet = Stylesheet::parse(css)?;
        let mut diagnostics = Diagnostics::new();
        self.process(&mut sheet, &mut diagnostics).await?;
        Ok(ProcessedCss { css: sheet.to_string(), warnings: diagnostics.into_warnings() })
    }
}

fn rewrite_nodes(nodes: &mut Vec<Node>, marker: &str, collector: &mut TaskCollector) {
    let mut i = 0;
    while i < nodes.len() {
        let fallback = match &mut nodes[i] {
            Node::Rule(rule) => {
                let rule: &Rule = rule;
                extract(rule, marker).map(|descriptor| {
                    let name = derive_image_name(&descriptor);
                    let fallback = build_fallback_rule(marker, rule, &descriptor, &name);
                    collector.push(rule, descriptor, name);
                    fallback
                })
            }
            Node::AtRule(AtRule { block: Some(Block::Nodes(children)), .. }) => {
                rewrite_nodes(children, marker, collector);
                None
            }
            _ => None,
        };
        if let Some(rule) = fallback {
            // Output of an earlier run already has the fallback in place
            let present = matches!(nodes.get(i + 1), Some(Node::Rule(next)) if same_rule(next, &rule));
            if !present {
                nodes.insert(i + 1, Node::Rule(rule));
            }
            // the fallback carries the marker and is not scanned again
            i += 1;
        }
        i += 1;
    }
}

fn same_rule(a: &Rule, b: &Rule) -> bool {
    a.selector == b.selector
        && a.declarations.len() == b.declarations.len()
        && a.declarations
            .iter()
            .zip(&b.declarations)
            .all(|(x, y)| x.prop == y.prop && x.value == y.value && x.important == y.important)
}
