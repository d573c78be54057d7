//! File discovery: glob matching and per-category file resolution.

mod discoverer;
mod file_info;
mod pattern;

pub use discoverer::FileDiscoverer;
pub use file_info::FileInfo;
pub use pattern::{has_glob_chars, is_extensionless, PatternMatcher};

#[cfg(test)]
pub(crate) use file_info::sample as sample_file;
