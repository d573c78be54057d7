//! Template Renderer
//!
//! Renders parsed templates against a `TemplateContext`. Parse and partial
//! failures abort the whole render; helper failures are contained and leave
//! a short inline marker instead.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::cache::TemplateCache;
use super::context::{Resolved, TemplateContext};
use super::helpers::Helper;
use super::parser::{parse, Node, Template};
use super::value::TemplateValue;
use crate::config::{Config, DEFAULT_MAX_PARTIAL_DEPTH, DEFAULT_TEMPLATE_EXTENSIONS};
use crate::discovery::FileInfo;
use crate::error::{GuideError, Result};
use crate::path::{has_escaping_component, is_within};

const INLINE_LABEL: &str = "<inline>";

pub struct TemplateRenderer {
    docroot: PathBuf,
    template_extensions: Vec<String>,
    max_partial_depth: usize,
    cache: Option<Arc<TemplateCache>>,
}

impl TemplateRenderer {
    pub fn new(docroot: impl Into<PathBuf>) -> Self {
        Self {
            docroot: docroot.into(),
            template_extensions: DEFAULT_TEMPLATE_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_partial_depth: DEFAULT_MAX_PARTIAL_DEPTH,
            cache: None,
        }
    }

    pub fn from_config(docroot: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            template_extensions: config.templates.extensions.clone(),
            max_partial_depth: config.templates.max_partial_depth,
            ..Self::new(docroot)
        }
    }

    pub fn with_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Render template text that does not come from a file.
    pub fn render(&self, source: &str, context: &TemplateContext) -> Result<String> {
        let template = parse(source).map_err(|e| GuideError::template(INLINE_LABEL, e.to_string()))?;
        let job = RenderJob {
            renderer: self,
            context,
            label: INLINE_LABEL.to_string(),
            base_dir: self.docroot.clone(),
            depth: 0,
        };
        job.render_template(&template, &mut Vec::new())
    }

    /// Render a discovered template file. Its content must already be loaded.
    pub fn render_file(&self, file: &FileInfo, context: &TemplateContext) -> Result<String> {
        let label = format!("{}/{}", file.category, file.path);
        let source = file
            .content
            .as_deref()
            .ok_or_else(|| GuideError::template(&label, "content was not loaded"))?;

        let template = self.parse_file(&file.absolute_path, file.mtime, source, &label)?;
        let job = RenderJob {
            renderer: self,
            context,
            label,
            base_dir: file
                .absolute_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.docroot.clone()),
            depth: 0,
        };
        job.render_template(&template, &mut Vec::new())
    }

    fn parse_file(
        &self,
        path: &Path,
        mtime: DateTime<Utc>,
        source: &str,
        label: &str,
    ) -> Result<Arc<Template>> {
        let parse_source = || parse(source).map_err(|e| GuideError::template(label, e.to_string()));
        match &self.cache {
            Some(cache) => cache.get_or_parse(path, mtime, parse_source),
            None => parse_source().map(Arc::new),
        }
    }

    /// Locate a partial: next to the including template first, then at the
    /// docroot. Tries `name`, `name.<ext>` and `_name.<ext>`.
    fn find_partial(&self, name: &str, base_dir: &Path, label: &str) -> Result<PathBuf> {
        if has_escaping_component(Path::new(name)) {
            return Err(GuideError::template(
                label,
                format!("partial '{}' must be a relative path inside the docroot", name),
            ));
        }

        let (parent, file_name) = match name.rsplit_once('/') {
            Some((parent, file_name)) => (Some(parent), file_name),
            None => (None, name),
        };
        let mut candidates = vec![file_name.to_string()];
        for ext in &self.template_extensions {
            candidates.push(format!("{}.{}", file_name, ext));
        }
        for ext in &self.template_extensions {
            candidates.push(format!("_{}.{}", file_name, ext));
        }

        for dir in [base_dir, self.docroot.as_path()] {
            let dir = match parent {
                Some(parent) => dir.join(parent),
                None => dir.to_path_buf(),
            };
            for candidate in &candidates {
                let path = dir.join(candidate);
                if !path.is_file() {
                    continue;
                }
                let canonical = path.canonicalize()?;
                if !is_within(&self.docroot, &canonical) {
                    return Err(GuideError::template(
                        label,
                        format!("partial '{}' resolves outside the docroot", name),
                    ));
                }
                return Ok(canonical);
            }
        }

        Err(GuideError::template(
            label,
            format!("partial '{}' not found", name),
        ))
    }
}

/// Per-render state; the frame stack holds section values pushed while
/// descending (`{{#items}}...{{/items}}`).
struct RenderJob<'a> {
    renderer: &'a TemplateRenderer,
    context: &'a TemplateContext,
    label: String,
    base_dir: PathBuf,
    depth: usize,
}

enum Found {
    Value(TemplateValue),
    Helper(Helper),
}

impl RenderJob<'_> {
    fn render_template(&self, template: &Template, frames: &mut Vec<TemplateValue>) -> Result<String> {
        let mut out = String::new();
        self.render_nodes(&template.nodes, frames, &mut out)?;
        Ok(out)
    }

    fn render_nodes(
        &self,
        nodes: &[Node],
        frames: &mut Vec<TemplateValue>,
        out: &mut String,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Variable { name } => match self.lookup(name, frames) {
                    Some(Found::Value(value)) => out.push_str(&value.render_text()),
                    Some(Found::Helper(helper)) => out.push_str(&self.call_helper(helper, "", frames)),
                    None => {}
                },
                Node::Section {
                    name,
                    inverted: false,
                    children,
                    raw,
                } => match self.lookup(name, frames) {
                    Some(Found::Helper(helper)) => out.push_str(&self.call_helper(helper, raw, frames)),
                    Some(Found::Value(TemplateValue::List(items))) => {
                        for item in items {
                            frames.push(item);
                            let result = self.render_nodes(children, frames, out);
                            frames.pop();
                            result?;
                        }
                    }
                    Some(Found::Value(value)) if value.is_truthy() => {
                        frames.push(value);
                        let result = self.render_nodes(children, frames, out);
                        frames.pop();
                        result?;
                    }
                    _ => {}
                },
                Node::Section {
                    name,
                    inverted: true,
                    children,
                    ..
                } => {
                    let show = match self.lookup(name, frames) {
                        None => true,
                        Some(Found::Value(value)) => !value.is_truthy(),
                        Some(Found::Helper(_)) => false,
                    };
                    if show {
                        self.render_nodes(children, frames, out)?;
                    }
                }
                Node::Partial { name, indent } => {
                    let rendered = self.render_partial(name, frames)?;
                    out.push_str(&indent_lines(&rendered, indent));
                }
            }
        }
        Ok(())
    }

    /// Frames first (innermost section value), then the context chain.
    fn lookup(&self, name: &str, frames: &[TemplateValue]) -> Option<Found> {
        if name == "." {
            return frames.last().cloned().map(Found::Value);
        }

        let mut segments = name.split('.');
        let first = segments.next()?;

        let mut value = match frames.iter().rev().find_map(|frame| match frame {
            TemplateValue::Map(entries) => entries.get(first),
            _ => None,
        }) {
            Some(value) => value,
            None => match self.context.lookup(first)? {
                Resolved::Value(value) => value,
                Resolved::Helper(helper) => {
                    return segments.next().is_none().then_some(Found::Helper(helper));
                }
            },
        };
        for segment in segments {
            value = value.get(segment)?;
        }
        Some(Found::Value(value.clone()))
    }

    fn call_helper(&self, helper: Helper, raw: &str, frames: &[TemplateValue]) -> String {
        let render = |text: &str| -> Result<String> {
            let template = parse(text).map_err(|e| GuideError::template(&self.label, e.to_string()))?;
            self.render_template(&template, &mut frames.to_vec())
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            helper.call(raw, &render, self.context)
        }));

        match outcome {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(
                    helper = helper.name(),
                    file = %self.label,
                    argument = %raw,
                    error = %e,
                    "template helper failed"
                );
                format!("[{} error: {}]", helper.name(), e)
            }
            Err(_) => {
                warn!(
                    helper = helper.name(),
                    file = %self.label,
                    argument = %raw,
                    "template helper panicked"
                );
                format!("[{} error: helper panicked]", helper.name())
            }
        }
    }

    fn render_partial(&self, name: &str, frames: &[TemplateValue]) -> Result<String> {
        if self.depth >= self.renderer.max_partial_depth {
            return Err(GuideError::template(
                &self.label,
                format!(
                    "partial '{}' exceeds the maximum include depth of {}",
                    name, self.renderer.max_partial_depth
                ),
            ));
        }

        let path = self.renderer.find_partial(name, &self.base_dir, &self.label)?;
        let label = format!("{} (partial '{}')", self.label, name);
        let source = fs::read_to_string(&path).map_err(|source| GuideError::FileRead {
            path: path.clone(),
            source,
        })?;
        let mtime = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));
        let template = self.renderer.parse_file(&path, mtime, &source, &label)?;

        let job = RenderJob {
            renderer: self.renderer,
            context: self.context,
            label,
            base_dir: path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.renderer.docroot.clone()),
            depth: self.depth + 1,
        };
        job.render_template(&template, &mut frames.to_vec())
    }
}

fn indent_lines(text: &str, indent: &str) -> String {
    if indent.is_empty() {
        return text.to_string();
    }
    text.split_inclusive('\n')
        .map(|line| format!("{}{}", indent, line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::context::Scope;

    fn ctx() -> TemplateContext {
        let mut functions = Scope::new("functions");
        for helper in crate::template::helpers::HELPERS {
            functions.insert_helper(*helper);
        }
        TemplateContext::new()
            .with_scope(
                Scope::new("project")
                    .with("project", TemplateValue::map().with("name", "demo"))
                    .with("items", vec!["a", "b", "c"])
                    .with("people", vec![
                        TemplateValue::map().with("name", "Ann"),
                        TemplateValue::map().with("name", "Bo"),
                    ])
                    .with("flag", true)
                    .with("empty", Vec::<String>::new()),
            )
            .with_scope(functions)
    }

    fn render(source: &str) -> Result<String> {
        TemplateRenderer::new("/nonexistent").render(source, &ctx())
    }

    #[test]
    fn test_literal_round_trip() {
        let text = "# Title\n\nPlain {text} with } braces.\n";
        assert_eq!(render(text).unwrap(), text);
    }

    #[test]
    fn test_variable_substitution_is_not_escaped() {
        assert_eq!(render("{{project.name}} <b>&</b>").unwrap(), "demo <b>&</b>");
        let ctx = TemplateContext::new().with_scope(Scope::new("file").with("html", "<i>x</i>"));
        let out = TemplateRenderer::new("/").render("{{html}}", &ctx).unwrap();
        assert_eq!(out, "<i>x</i>");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        assert_eq!(render("[{{nope}}]").unwrap(), "[]");
    }

    #[test]
    fn test_truthy_section() {
        assert_eq!(render("{{#flag}}shown{{/flag}}").unwrap(), "shown");
        assert_eq!(render("{{#absent}}shown{{/absent}}").unwrap(), "");
    }

    #[test]
    fn test_inverted_section() {
        assert_eq!(render("{{^absent}}fallback{{/absent}}").unwrap(), "fallback");
        assert_eq!(render("{{^empty}}none{{/empty}}").unwrap(), "none");
        assert_eq!(render("{{^flag}}hidden{{/flag}}").unwrap(), "");
    }

    #[test]
    fn test_list_iteration() {
        assert_eq!(render("{{#items}}<{{.}}>{{/items}}").unwrap(), "<a><b><c>");
        assert_eq!(
            render("{{#people}}{{name}} of {{project.name}};{{/people}}").unwrap(),
            "Ann of demo;Bo of demo;"
        );
    }

    #[test]
    fn test_helper_receives_rendered_argument() {
        assert_eq!(
            render("{{#truncate}}6|{{project.name}} project{{/truncate}}").unwrap(),
            "dem..."
        );
    }

    #[test]
    fn test_helper_failure_is_contained() {
        let out = render("before {{#truncate}}oops{{/truncate}} after").unwrap();
        assert!(out.starts_with("before [truncate error: "));
        assert!(out.ends_with("] after"));
    }

    #[test]
    fn test_parse_failure_aborts() {
        let err = render("{{#flag}}never closed").unwrap_err();
        assert!(matches!(err, GuideError::Template { .. }));
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn test_partials() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/_footer.mustache"), "-- {{project.name}}\n").unwrap();
        fs::write(root.join("shared.md"), "shared\n").unwrap();

        let renderer = TemplateRenderer::new(&root);
        let mut file = crate::discovery::sample_file("page.md.mustache", "docs");
        file.absolute_path = root.join("docs/page.md.mustache");
        file.content = Some("body\n  {{>footer}}\n{{>shared.md}}".to_string());

        let out = renderer.render_file(&file, &ctx()).unwrap();
        assert_eq!(out, "body\n  -- demo\nshared\n");
    }

    #[test]
    fn test_partial_escape_and_missing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let renderer = TemplateRenderer::new(tmp.path().canonicalize().unwrap());

        let err = renderer.render("{{>../secret}}", &ctx()).unwrap_err();
        assert!(err.to_string().contains("inside the docroot"));

        let err = renderer.render("{{>/etc/passwd}}", &ctx()).unwrap_err();
        assert!(matches!(err, GuideError::Template { .. }));

        let err = renderer.render("{{>missing}}", &ctx()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_recursive_partial_is_bounded() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::write(root.join("loop.mustache"), "x{{>loop}}").unwrap();

        let err = TemplateRenderer::new(&root)
            .render("{{>loop}}", &ctx())
            .unwrap_err();
        assert!(err.to_string().contains("maximum include depth"));
    }

    #[test]
    fn test_cache_does_not_change_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        let mut file = crate::discovery::sample_file("a.md.mustache", "docs");
        file.absolute_path = root.join("a.md.mustache");
        file.content = Some("{{#items}}{{.}}{{/items}}".to_string());

        let plain = TemplateRenderer::new(&root).render_file(&file, &ctx()).unwrap();
        let cache = Arc::new(TemplateCache::new(8));
        let cached = TemplateRenderer::new(&root).with_cache(Arc::clone(&cache));
        assert_eq!(cached.render_file(&file, &ctx()).unwrap(), plain);
        assert_eq!(cached.render_file(&file, &ctx()).unwrap(), plain);
        assert_eq!(cache.stats().hits, 1);
    }
}
