//! Content pipeline
//!
//! `resolve_and_render` is the single entry point exposed to transports:
//! expression in, body plus content type (or a caller-facing error) out.
//! Every call takes one store snapshot and builds fresh contexts, so
//! concurrent calls share nothing except the optional template cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::category::{ContentStore, SnapshotSource, StoreSnapshot};
use crate::config::Config;
use crate::discovery::{FileDiscoverer, FileInfo, PatternMatcher};
use crate::error::{ErrorKind, ErrorResult, GuideError, Result};
use crate::formatter::{ContentFormatter, ContentType};
use crate::resolve::{read_contents, Resolver};
use crate::session::Session;
use crate::template::{CollectionInfo, ContextBuilder, TemplateCache, TemplateRenderer};

/// What a transport sends back for one request.
#[derive(Debug, Clone, Serialize)]
pub struct ContentResponse {
    pub body: String,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResult>,
    /// Files that made up the body, in order
    pub files: Vec<FileInfo>,
}

impl ContentResponse {
    fn failure(err: &GuideError) -> Self {
        Self {
            body: String::new(),
            content_type: ContentType::PlainText,
            error: Some(ErrorResult::from(err)),
            files: Vec::new(),
        }
    }

    fn no_matches(expression: &str) -> Self {
        Self {
            body: format!(
                "No files matched '{}'. {}",
                expression,
                ErrorKind::NoMatches.instruction()
            ),
            content_type: ContentType::PlainText,
            error: None,
            files: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub struct ContentPipeline {
    store: Arc<dyn SnapshotSource>,
    session: Arc<dyn Session>,
    config: Config,
    formatter: ContentFormatter,
    cache: Option<Arc<TemplateCache>>,
}

impl ContentPipeline {
    pub fn new(store: Arc<dyn SnapshotSource>, session: Arc<dyn Session>, config: Config) -> Self {
        let cache = match config.templates.cache_size {
            0 => None,
            size => Some(Arc::new(TemplateCache::new(size))),
        };
        Self {
            formatter: ContentFormatter::from_config(&config),
            store,
            session,
            config,
            cache,
        }
    }

    pub fn with_formatter(mut self, formatter: ContentFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn cache(&self) -> Option<&Arc<TemplateCache>> {
        self.cache.as_ref()
    }

    /// Resolve an expression to its de-duplicated file list without reading
    /// or rendering anything.
    pub fn resolve(&self, expression: &str, pattern_override: Option<&str>) -> Result<Vec<FileInfo>> {
        self.resolve_in(&self.store.snapshot(), expression, pattern_override)
    }

    /// Read, render and format files returned by [`resolve`](Self::resolve).
    pub fn render(&self, files: Vec<FileInfo>) -> Result<ContentResponse> {
        self.render_in(&self.store.snapshot(), files)
    }

    /// Like [`resolve_and_render`](Self::resolve_and_render) but returns
    /// failures as `Err`.
    pub fn try_resolve_and_render(
        &self,
        expression: &str,
        pattern_override: Option<&str>,
    ) -> Result<ContentResponse> {
        let snapshot = self.store.snapshot();
        let files = self.resolve_in(&snapshot, expression, pattern_override)?;
        if files.is_empty() {
            debug!(expression, "no files matched");
            return Ok(ContentResponse::no_matches(expression));
        }
        self.render_in(&snapshot, files)
    }

    /// Resolve, read, render and format. Failures come back as an
    /// `ErrorResult` on the response rather than as `Err`.
    pub fn resolve_and_render(
        &self,
        expression: &str,
        pattern_override: Option<&str>,
    ) -> ContentResponse {
        match self.try_resolve_and_render(expression, pattern_override) {
            Ok(response) => response,
            Err(err) => {
                debug!(expression, kind = %err.kind(), error = %err, "request failed");
                ContentResponse::failure(&err)
            }
        }
    }

    fn discoverer(&self, snapshot: &StoreSnapshot) -> FileDiscoverer {
        FileDiscoverer::new(snapshot.docroot_path(), PatternMatcher::from_config(&self.config))
    }

    fn resolve_in(
        &self,
        snapshot: &StoreSnapshot,
        expression: &str,
        pattern_override: Option<&str>,
    ) -> Result<Vec<FileInfo>> {
        let discoverer = self.discoverer(snapshot);
        Resolver::new(snapshot, &discoverer).resolve(expression, pattern_override)
    }

    /// A file that cannot be read fails a single-file response. In a
    /// multipart response only that part becomes an inline notice.
    fn render_in(&self, snapshot: &StoreSnapshot, mut files: Vec<FileInfo>) -> Result<ContentResponse> {
        let reads = read_contents(&mut files);
        if files.len() == 1 {
            if let Some(Err(err)) = reads.into_iter().next() {
                return Err(err);
            }
        } else {
            for (file, read) in files.iter_mut().zip(reads) {
                if let Err(err) = read {
                    warn!(
                        category = %file.category,
                        path = %file.path,
                        error = %err,
                        "failed to read matched file"
                    );
                    file.content = Some(format!(
                        "[io_error: could not read {}/{}]",
                        file.category, file.path
                    ));
                    file.template = false;
                }
            }
        }

        self.render_templates(snapshot, &mut files)?;

        let formatted = self.formatter.format(&files)?;
        Ok(ContentResponse {
            body: formatted.body,
            content_type: formatted.content_type,
            error: None,
            files,
        })
    }

    fn render_templates(&self, snapshot: &StoreSnapshot, files: &mut [FileInfo]) -> Result<()> {
        if !files.iter().any(|f| f.template) {
            return Ok(());
        }

        let discoverer = self.discoverer(snapshot);
        let resolver = Resolver::new(snapshot, &discoverer);

        let builder = ContextBuilder::new(self.session.as_ref(), snapshot);
        let mut renderer = TemplateRenderer::from_config(snapshot.docroot_path(), &self.config);
        if let Some(cache) = &self.cache {
            renderer = renderer.with_cache(Arc::clone(cache));
        }

        let mut collections: HashMap<String, CollectionInfo> = HashMap::new();
        for file in files.iter_mut().filter(|f| f.template) {
            let category = snapshot.get_category(&file.category);
            let collection = match &file.collection {
                Some(name) => Some(collection_info(snapshot, &resolver, &mut collections, name)?),
                None => None,
            };

            let context = builder.build(file, category.as_ref(), collection.as_ref())?;
            let rendered = renderer.render_file(file, &context)?;
            file.size = rendered.len() as u64;
            file.content = Some(rendered);
        }
        Ok(())
    }
}

fn collection_info(
    snapshot: &StoreSnapshot,
    resolver: &Resolver<'_>,
    seen: &mut HashMap<String, CollectionInfo>,
    name: &str,
) -> Result<CollectionInfo> {
    if let Some(info) = seen.get(name) {
        return Ok(info.clone());
    }
    let collection = snapshot.get_collection(name).ok_or_else(|| GuideError::NotFound {
        name: name.to_string(),
    })?;
    let info = CollectionInfo {
        name: collection.name.clone(),
        description: collection.description.clone(),
        categories: resolver.member_categories(&collection)?,
    };
    seen.insert(name.to_string(), info.clone());
    Ok(info)
}
