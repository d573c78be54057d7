pub mod category;
pub mod config;
pub mod discovery;
pub mod error;
pub mod formatter;
pub mod path;
pub mod pipeline;
pub mod resolve;
pub mod session;
pub mod template;

pub use category::{
    Category, Collection, ContentStore, ProjectFile, ProjectStore, SnapshotSource, StoreSnapshot,
    PROJECT_FILE,
};
pub use config::Config;
pub use discovery::{FileDiscoverer, FileInfo, PatternMatcher};
pub use error::{ErrorKind, ErrorResult, GuideError, Result};
pub use formatter::{BoundarySource, ContentFormatter, ContentType, FormattedContent, RandomBoundary};
pub use pipeline::{ContentPipeline, ContentResponse};
pub use resolve::{aggregate, Expression, Resolver, Term};
pub use session::{AgentInfo, Clock, FixedClock, ProjectInfo, Session, StaticSession, SystemClock};

// Templates
pub use template::{
    CollectionInfo, ContextBuilder, Helper, Scope, TemplateCache, TemplateContext,
    TemplateRenderer, TemplateValue,
};
