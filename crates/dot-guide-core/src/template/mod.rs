//! Logic-less template rendering.
//!
//! Files whose name ends in a template extension (`intro.md.mustache`) are
//! rendered against a layered [`TemplateContext`]; everything else passes
//! through untouched.

mod builder;
mod cache;
mod context;
mod helpers;
mod parser;
mod render;
mod value;

pub use builder::{CollectionInfo, ContextBuilder};
pub use cache::{CacheStats, TemplateCache};
pub use context::{Resolved, Scope, Slot, TemplateContext};
pub use helpers::{Helper, HelperError, HELPERS};
pub use parser::{parse, Node, ParseError, Template};
pub use render::TemplateRenderer;
pub use value::TemplateValue;
