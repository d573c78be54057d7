//! Template Context Builder
//!
//! Assembles the scope chain for one file, outermost first:
//! `system`, `agent`, `project`, `collection` (only when the file was
//! reached through a collection), `category`, `file`, `functions`.

use std::fmt::Display;

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

use super::context::{Scope, TemplateContext};
use super::helpers::HELPERS;
use super::value::TemplateValue;
use crate::category::{Category, ContentStore};
use crate::discovery::FileInfo;
use crate::error::Result;
use crate::session::Session;

/// The collection a file was reached through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub description: Option<String>,
    /// Expanded member categories, in expansion order
    pub categories: Vec<String>,
}

pub struct ContextBuilder<'a> {
    session: &'a dyn Session,
    category_names: Vec<String>,
    collection_names: Vec<String>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(session: &'a dyn Session, store: &dyn ContentStore) -> Self {
        Self {
            session,
            category_names: store.list_category_names(),
            collection_names: store.list_collection_names(),
        }
    }

    /// Build a fresh context for `file`.
    ///
    /// Project variables are validated here, so a bad value fails before any
    /// rendering starts.
    pub fn build(
        &self,
        file: &FileInfo,
        category: Option<&Category>,
        collection: Option<&CollectionInfo>,
    ) -> Result<TemplateContext> {
        let mut context = TemplateContext::new()
            .with_scope(self.system_scope())
            .with_scope(self.agent_scope())
            .with_scope(self.project_scope()?);

        if let Some(collection) = collection {
            context = context.with_scope(collection_scope(collection));
        }
        if let Some(category) = category {
            context = context.with_scope(category_scope(category));
        }

        Ok(context.with_scope(file_scope(file)).with_scope(functions_scope()))
    }

    fn system_scope(&self) -> Scope {
        let now = self.session.now();
        let local = now.with_timezone(&Local);

        Scope::new("system")
            .with("timestamp", now.timestamp())
            .with("timestamp_ms", now.timestamp_millis())
            .with("timestamp_ns", now.timestamp_nanos_opt())
            .with("now", datetime_fields(&local))
            .with("now_utc", datetime_fields(&now))
    }

    fn agent_scope(&self) -> Scope {
        let agent = self.session.agent().unwrap_or_default();
        Scope::new("agent").with(
            "agent",
            TemplateValue::map()
                .with("name", agent.name)
                .with("version", agent.version)
                .with("prompt_prefix", agent.prompt_prefix),
        )
    }

    fn project_scope(&self) -> Result<Scope> {
        let mut scope = Scope::new("project");
        let project = self.session.project().unwrap_or_default();

        for (key, value) in project.vars {
            let converted = TemplateValue::from_toml(&format!("vars.{}", key), value)?;
            scope.insert(key, converted);
        }

        scope.insert(
            "project",
            TemplateValue::map()
                .with("name", project.name)
                .with("created_at", project.created_at.map(|t| t.to_rfc3339()))
                .with("updated_at", project.updated_at.map(|t| t.to_rfc3339()))
                .with("categories", self.category_names.clone())
                .with("collections", self.collection_names.clone()),
        );
        scope.insert("flags", TemplateValue::Map(self.session.flags()));
        Ok(scope)
    }
}

fn collection_scope(collection: &CollectionInfo) -> Scope {
    Scope::new("collection").with(
        "collection",
        TemplateValue::map()
            .with("name", collection.name.as_str())
            .with("description", collection.description.clone())
            .with("categories", collection.categories.clone()),
    )
}

/// Only the docroot-relative dir is exposed.
fn category_scope(category: &Category) -> Scope {
    Scope::new("category").with(
        "category",
        TemplateValue::map()
            .with("name", category.name.as_str())
            .with("dir", category.dir.as_str())
            .with("description", category.description.clone()),
    )
}

fn file_scope(file: &FileInfo) -> Scope {
    Scope::new("file").with(
        "file",
        TemplateValue::map()
            .with("path", file.path.as_str())
            .with("basename", file.basename.as_str())
            .with("size", file.size)
            .with("mtime", file.mtime.to_rfc3339())
            .with("ctime", file.ctime.map(|t| t.to_rfc3339())),
    )
}

fn functions_scope() -> Scope {
    let mut scope = Scope::new("functions");
    for helper in HELPERS {
        scope.insert_helper(*helper);
    }
    scope
}

fn datetime_fields<Tz>(dt: &DateTime<Tz>) -> TemplateValue
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    TemplateValue::map()
        .with("iso", dt.to_rfc3339())
        .with("date", dt.format("%Y-%m-%d").to_string())
        .with("time", dt.format("%H:%M:%S").to_string())
        .with("year", i64::from(dt.year()))
        .with("month", dt.month())
        .with("day", dt.day())
        .with("hour", dt.hour())
        .with("minute", dt.minute())
        .with("second", dt.second())
        .with("weekday", dt.format("%A").to_string())
        .with("timezone", dt.offset().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{Collection, StoreSnapshot};
    use crate::discovery::sample_file;
    use crate::error::GuideError;
    use crate::session::{AgentInfo, FixedClock, ProjectInfo, StaticSession};
    use chrono::{TimeZone, Utc};

    fn store() -> StoreSnapshot {
        StoreSnapshot::new("/srv/docs")
            .with_category(Category::new("guidelines", "guidelines").with_description("House rules"))
            .with_category(Category::new("policies", "policies"))
            .with_collection(Collection::new("team", ["guidelines", "policies"]))
    }

    fn session() -> StaticSession {
        let mut project = ProjectInfo::new("demo");
        project
            .vars
            .insert("team".to_string(), toml::Value::String("core".to_string()));
        StaticSession::new()
            .with_project(project)
            .with_flag("beta", true)
            .with_clock(FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 15).unwrap()))
    }

    #[test]
    fn test_scope_order_without_collection() {
        let session = session();
        let store = store();
        let builder = ContextBuilder::new(&session, &store);
        let category = Category::new("guidelines", "guidelines");

        let ctx = builder
            .build(&sample_file("intro.md", "guidelines"), Some(&category), None)
            .unwrap();
        assert_eq!(
            ctx.scope_names(),
            vec!["system", "agent", "project", "category", "file", "functions"]
        );
        assert!(ctx.value("collection").is_none());
    }

    #[test]
    fn test_collection_scope_when_reached_through_collection() {
        let session = session();
        let store = store();
        let builder = ContextBuilder::new(&session, &store);
        let info = CollectionInfo {
            name: "team".to_string(),
            description: None,
            categories: vec!["guidelines".to_string(), "policies".to_string()],
        };

        let ctx = builder
            .build(&sample_file("intro.md", "guidelines"), None, Some(&info))
            .unwrap();
        assert_eq!(ctx.value("collection.name").and_then(|v| v.as_str()), Some("team"));
        assert_eq!(
            ctx.value("collection.categories.1").and_then(|v| v.as_str()),
            Some("policies")
        );
        assert_eq!(ctx.value("collection.description"), Some(&TemplateValue::Null));
    }

    #[test]
    fn test_system_scope_uses_session_clock() {
        let session = session();
        let store = store();
        let ctx = ContextBuilder::new(&session, &store)
            .build(&sample_file("a.md", "guidelines"), None, None)
            .unwrap();

        assert_eq!(ctx.value("timestamp"), Some(&TemplateValue::from(1_714_559_415i64)));
        assert_eq!(
            ctx.value("timestamp_ms"),
            Some(&TemplateValue::from(1_714_559_415_000i64))
        );
        assert_eq!(
            ctx.value("now_utc.iso").and_then(|v| v.as_str()),
            Some("2024-05-01T10:30:15+00:00")
        );
        assert_eq!(ctx.value("now_utc.weekday").and_then(|v| v.as_str()), Some("Wednesday"));
        assert_eq!(ctx.value("now_utc.timezone").and_then(|v| v.as_str()), Some("UTC"));
        assert!(ctx.value("now.iso").is_some());
    }

    #[test]
    fn test_agent_scope_defaults_to_empty_strings() {
        let session = StaticSession::new();
        let store = store();
        let builder = ContextBuilder::new(&session, &store);
        let ctx = builder.build(&sample_file("a.md", "x"), None, None).unwrap();
        assert_eq!(ctx.value("agent.name").and_then(|v| v.as_str()), Some(""));

        let session = StaticSession::new().with_agent(AgentInfo {
            name: "helper".to_string(),
            version: "1.2".to_string(),
            prompt_prefix: "> ".to_string(),
        });
        let builder = ContextBuilder::new(&session, &store);
        let ctx = builder.build(&sample_file("a.md", "x"), None, None).unwrap();
        assert_eq!(ctx.value("agent.version").and_then(|v| v.as_str()), Some("1.2"));
    }

    #[test]
    fn test_project_scope() {
        let session = session();
        let store = store();
        let ctx = ContextBuilder::new(&session, &store)
            .build(&sample_file("a.md", "guidelines"), None, None)
            .unwrap();

        assert_eq!(ctx.value("team").and_then(|v| v.as_str()), Some("core"));
        assert_eq!(ctx.value("project.name").and_then(|v| v.as_str()), Some("demo"));
        assert_eq!(
            ctx.value("project.categories"),
            Some(&TemplateValue::from(vec!["guidelines", "policies"]))
        );
        assert_eq!(ctx.value("flags.beta"), Some(&TemplateValue::Bool(true)));
        assert_eq!(ctx.value("project.created_at"), Some(&TemplateValue::Null));
    }

    #[test]
    fn test_category_scope_hides_docroot() {
        let session = session();
        let store = store();
        let category = Category::new("guidelines", "guidelines").with_description("House rules");
        let ctx = ContextBuilder::new(&session, &store)
            .build(&sample_file("a.md", "guidelines"), Some(&category), None)
            .unwrap();

        assert_eq!(ctx.value("category.dir").and_then(|v| v.as_str()), Some("guidelines"));
        let rendered = ctx.value("category").map(|v| v.render_text()).unwrap_or_default();
        assert!(!rendered.contains("/srv/docs"));
    }

    #[test]
    fn test_file_scope() {
        let session = session();
        let store = store();
        let ctx = ContextBuilder::new(&session, &store)
            .build(&sample_file("security/keys.md", "guidelines"), None, None)
            .unwrap();

        assert_eq!(
            ctx.value("file.path").and_then(|v| v.as_str()),
            Some("security/keys.md")
        );
        assert_eq!(ctx.value("file.basename").and_then(|v| v.as_str()), Some("keys.md"));
        assert_eq!(ctx.value("file.ctime"), Some(&TemplateValue::Null));
    }

    #[test]
    fn test_helpers_cannot_be_shadowed_by_vars() {
        let mut project = ProjectInfo::new("demo");
        project
            .vars
            .insert("truncate".to_string(), toml::Value::Integer(3));
        let session = StaticSession::new().with_project(project);
        let store = store();
        let ctx = ContextBuilder::new(&session, &store)
            .build(&sample_file("a.md", "x"), None, None)
            .unwrap();
        assert!(ctx.value("truncate").is_none());
    }

    #[test]
    fn test_invalid_var_fails_at_build_time() {
        let mut project = ProjectInfo::new("demo");
        let when: toml::value::Datetime = "2024-01-01T00:00:00Z".parse().unwrap();
        project
            .vars
            .insert("released".to_string(), toml::Value::Datetime(when));
        let session = StaticSession::new().with_project(project);
        let store = store();

        let err = ContextBuilder::new(&session, &store)
            .build(&sample_file("a.md", "x"), None, None)
            .unwrap_err();
        match err {
            GuideError::InvalidContextValue { key, .. } => assert_eq!(key, "vars.released"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
