//! Expression Resolver
//!
//! Resolution runs in two phases. Planning looks each term up in both
//! namespaces (collections first, then categories) and expands collections
//! depth-first with cycle detection, producing a list of discovery targets.
//! Only then is the filesystem touched, one target at a time.

use tracing::{debug, warn};

use super::aggregate::aggregate;
use super::expression::{parse_pattern_override, Expression, Term};
use crate::category::{Category, Collection, ContentStore};
use crate::discovery::{has_glob_chars, FileDiscoverer, FileInfo};
use crate::error::{GuideError, Result};

/// One category to discover, with the patterns that apply to it.
#[derive(Debug, Clone)]
struct Target {
    category: Category,
    patterns: Option<Vec<String>>,
    /// Top-level collection the category was reached through
    collection: Option<String>,
}

pub struct Resolver<'a> {
    store: &'a dyn ContentStore,
    discoverer: &'a FileDiscoverer,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn ContentStore, discoverer: &'a FileDiscoverer) -> Self {
        Self { store, discoverer }
    }

    /// Resolve an expression into a de-duplicated, ordered file list.
    ///
    /// Syntax, name and cycle errors are reported before any filesystem
    /// access.
    pub fn resolve(
        &self,
        expression: &str,
        pattern_override: Option<&str>,
    ) -> Result<Vec<FileInfo>> {
        let targets = self.plan(expression, pattern_override)?;

        let mut lists = Vec::with_capacity(targets.len());
        for target in targets {
            let mut files = self.discover(&target.category, target.patterns.as_deref())?;
            if let Some(collection) = &target.collection {
                for file in &mut files {
                    file.collection = Some(collection.clone());
                }
            }
            lists.push(files);
        }

        Ok(aggregate(lists))
    }

    /// Expanded member category names of a collection, in expansion order.
    pub fn member_categories(&self, collection: &Collection) -> Result<Vec<String>> {
        let mut reached = Vec::new();
        self.expand_collection(collection, None, &mut Vec::new(), &mut reached)?;

        let mut names: Vec<String> = Vec::new();
        for (category, _) in reached {
            if !names.contains(&category.name) {
                names.push(category.name);
            }
        }
        Ok(names)
    }

    fn plan(&self, expression: &str, pattern_override: Option<&str>) -> Result<Vec<Target>> {
        let expression = Expression::parse(expression)?;
        let call_override = match pattern_override {
            Some(raw) => parse_pattern_override(raw)?,
            None => None,
        };

        let mut lookups = Vec::with_capacity(expression.terms.len());
        for term in &expression.terms {
            let collection = self.store.get_collection(&term.name);
            let category = self.store.get_category(&term.name);
            if collection.is_none() && category.is_none() {
                return Err(GuideError::NotFound {
                    name: term.name.clone(),
                });
            }
            lookups.push((term, collection, category));
        }

        let mut targets = Vec::new();
        for (term, collection, category) in lookups {
            let patterns = term.patterns.as_deref().or(call_override.as_deref());

            if let Some(collection) = collection {
                let mut reached = Vec::new();
                self.expand_collection(&collection, patterns, &mut Vec::new(), &mut reached)?;
                targets.extend(reached.into_iter().map(|(category, patterns)| Target {
                    category,
                    patterns,
                    collection: Some(collection.name.clone()),
                }));
            }

            if let Some(category) = category {
                targets.push(Target {
                    category,
                    patterns: patterns.map(<[String]>::to_vec),
                    collection: None,
                });
            }
        }
        Ok(targets)
    }

    /// Depth-first expansion. `stack` holds the collections on the current
    /// path; meeting one of them again is a cycle.
    ///
    /// Override precedence: inherited (call site) > entry > collection-wide.
    fn expand_collection(
        &self,
        collection: &Collection,
        inherited: Option<&[String]>,
        stack: &mut Vec<String>,
        reached: &mut Vec<(Category, Option<Vec<String>>)>,
    ) -> Result<()> {
        if stack.contains(&collection.name) {
            let mut chain = stack.clone();
            chain.push(collection.name.clone());
            return Err(GuideError::CollectionCycle {
                chain: chain.join(" -> "),
            });
        }
        stack.push(collection.name.clone());

        for entry in &collection.categories {
            let member = Term::parse(entry)?;
            let patterns = inherited
                .or(member.patterns.as_deref())
                .or(collection.pattern_override());

            let nested = self.store.get_collection(&member.name);
            let category = self.store.get_category(&member.name);

            if nested.is_none() && category.is_none() {
                warn!(
                    collection = %collection.name,
                    member = %member.name,
                    "collection member is neither a category nor a collection"
                );
                continue;
            }
            if let Some(nested) = nested {
                self.expand_collection(&nested, patterns, stack, reached)?;
            }
            if let Some(category) = category {
                reached.push((category, patterns.map(<[String]>::to_vec)));
            }
        }

        stack.pop();
        Ok(())
    }

    fn discover(&self, category: &Category, patterns: Option<&[String]>) -> Result<Vec<FileInfo>> {
        if let Some([single]) = patterns {
            if !has_glob_chars(single) && self.discoverer.is_subdirectory(category, single) {
                debug!(category = %category.name, subdir = %single, "narrowing to subdirectory");
                return self.discoverer.discover_subdir(category, single);
            }
        }
        self.discoverer.discover(category, patterns)
    }
}
