//! Session collaborator: active project, agent identity, feature flags and
//! the time source used for the `system` template scope.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::template::TemplateValue;

/// Project metadata (`[project]` in the project file)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Free-form template variables, validated when a context is built
    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub vars: toml::Table,
}

impl ProjectInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Identity of the agent on the other end of the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub prompt_prefix: String,
}

/// Time source
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait Session: Send + Sync {
    fn project(&self) -> Option<ProjectInfo>;
    fn agent(&self) -> Option<AgentInfo>;
    fn flags(&self) -> BTreeMap<String, TemplateValue>;
    fn now(&self) -> DateTime<Utc>;
}

/// Session built from values known up front.
#[derive(Clone)]
pub struct StaticSession {
    project: Option<ProjectInfo>,
    agent: Option<AgentInfo>,
    flags: BTreeMap<String, TemplateValue>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for StaticSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSession")
            .field("project", &self.project)
            .field("agent", &self.agent)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Default for StaticSession {
    fn default() -> Self {
        Self {
            project: None,
            agent: None,
            flags: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl StaticSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: ProjectInfo) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_agent(mut self, agent: AgentInfo) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

impl Session for StaticSession {
    fn project(&self) -> Option<ProjectInfo> {
        self.project.clone()
    }

    fn agent(&self) -> Option<AgentInfo> {
        self.agent.clone()
    }

    fn flags(&self) -> BTreeMap<String, TemplateValue> {
        self.flags.clone()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
