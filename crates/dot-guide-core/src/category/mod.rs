//! # Category Module
//!
//! Named content sources and the store that owns them.
//!
//! - `model`: `Category` / `Collection` definitions and name rules
//! - `store`: read interface plus the file-backed `ProjectStore`
//!
//! ```rust
//! use dot_guide_core::category::{Category, Collection, ContentStore, StoreSnapshot};
//!
//! let snapshot = StoreSnapshot::new("/srv/docs")
//!     .with_category(Category::new("guidelines", "guidelines").with_patterns(["*.md"]))
//!     .with_collection(Collection::new("team", ["guidelines"]));
//!
//! assert!(snapshot.get_category("guidelines").is_some());
//! assert_eq!(snapshot.list_collection_names(), vec!["team"]);
//! ```

mod model;
mod store;

pub use model::{validate_name, Category, Collection, MAX_NAME_LEN};
pub use store::{
    CategoryEntry, CollectionEntry, ContentStore, ProjectFile, ProjectStore, SnapshotSource,
    StoreSnapshot, PROJECT_FILE,
};
