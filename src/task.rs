//! Conversion tasks and the diagnostics sink they report into

use crate::extract::ImageDescriptor;
use crate::stylesheet::{Rule, Source};
use std::fmt;

/// One pending conversion, created for every rule that received a fallback
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionTask {
    pub descriptor: ImageDescriptor,
    /// Raster name, relative to the destination directory
    pub image_name: String,
    /// Selector of the originating rule, for warning attribution
    pub rule_selector: String,
    /// Position of the originating rule
    pub rule_source: Option<Source>,
}

/// Append-only list of tasks in the order their rules were visited.
///
/// Identical tasks from different rules are all kept; repeated work on the
/// same raster is avoided later by the staleness check.
#[derive(Debug, Default)]
pub struct TaskCollector {
    tasks: Vec<ConversionTask>,
}

impl TaskCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: &Rule, descriptor: ImageDescriptor, image_name: String) {
        self.tasks.push(ConversionTask {
            descriptor,
            image_name,
            rule_selector: rule.selector.clone(),
            rule_source: rule.source,
        });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn into_tasks(self) -> Vec<ConversionTask> {
        self.tasks
    }
}

/// A non-fatal problem attributed to a rule in the input
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub text: String,
    pub plugin: &'static str,
    pub selector: Option<String>,
    pub source: Option<Source>,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = self.source {
            write!(f, "{}: ", source)?;
        }
        write!(f, "{}", self.text)?;
        if let Some(selector) = &self.selector {
            write!(f, " (in `{}`)", selector)?;
        }
        Ok(())
    }
}

/// Collects warnings emitted during a build
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning against the rule that produced `task`
    pub fn warn(&mut self, task: &ConversionTask, text: impl Into<String>) {
        let warning = Warning {
            text: text.into(),
            plugin: crate::PLUGIN_NAME,
            selector: Some(task.rule_selector.clone()),
            source: task.rule_source,
        };
        log::debug!("warning: {}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ImageSource, Size};

    fn descriptor(path: &str) -> ImageDescriptor {
        ImageDescriptor {
            source: ImageSource::File(path.into()),
            size: Size { width: 20, height: 20 },
            decl_source: None,
        }
    }

    #[test]
    fn collector_keeps_order_and_duplicates() {
        let mut rule = Rule::new(".a");
        rule.source = Some(Source { line: 4, column: 1 });
        let mut c = TaskCollector::new();
        c.push(&rule, descriptor("a.svg"), "a-20x20.png".into());
        c.push(&Rule::new(".b"), descriptor("b.svg"), "b-20x20.png".into());
        c.push(&rule, descriptor("a.svg"), "a-20x20.png".into());
        assert_eq!(c.len(), 3);
        let tasks = c.into_tasks();
        assert_eq!(tasks[0].rule_selector, ".a");
        assert_eq!(tasks[0].rule_source, Some(Source { line: 4, column: 1 }));
        assert_eq!(tasks[1].image_name, "b-20x20.png");
        assert_eq!(tasks[0], tasks[2]);
    }

    #[test]
    fn warnings_are_attributed_to_the_rule() {
        let mut rule = Rule::new(".icon");
        rule.source = Some(Source { line: 3, column: 5 });
        let mut c = TaskCollector::new();
        c.push(&rule, descriptor("a.svg"), "a-20x20.png".into());
        let tasks = c.into_tasks();
        let task = &tasks[0];

        let mut d = Diagnostics::new();
        d.warn(task, "could not find `a.svg`");
        assert_eq!(d.warnings().len(), 1);
        let w = &d.warnings()[0];
        assert_eq!(w.source, Some(Source { line: 3, column: 5 }));
        assert_eq!(w.to_string(), "3:5: could not find `a.svg` (in `.icon`)");
    }
}
