//! Expression parsing, collection expansion and aggregation.

mod aggregate;
mod expression;
mod resolver;

pub use aggregate::{aggregate, read_contents};
pub use expression::{parse_pattern_override, Expression, Term};
pub use resolver::Resolver;
