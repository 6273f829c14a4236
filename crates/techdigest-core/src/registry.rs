//! The fixed, ordered set of categories for one run.

use std::collections::HashSet;

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::types::Category;

const CATCH_ALL_DESCRIPTION: &str = "Anything that does not clearly fit another category";

/// Whether keyword matching can see all of `keyword`.
///
/// Matching drops punctuation, so `c++` would shrink to `c` and match every
/// word starting with c. Inner punctuation (`node.js`, `machine-learning`)
/// only splits words and is fine.
fn is_matchable(keyword: &str) -> bool {
    let keyword = keyword.trim();
    match (keyword.chars().next(), keyword.chars().last()) {
        (Some(first), Some(last)) => first.is_alphanumeric() && last.is_alphanumeric(),
        _ => false,
    }
}

/// Validated, read-only category list plus the catch-all bucket.
///
/// Names are compared exactly (case-sensitive). The catch-all may also appear
/// in the configured list, where it only contributes its description; it is
/// always ordered last.
///
/// # Examples
///
/// ```
/// use techdigest_core::{Category, CategoryRegistry};
///
/// let registry = CategoryRegistry::load(
///     vec![Category::new("ML"), Category::new("Security")],
///     "Other",
/// )
/// .unwrap();
/// assert!(registry.contains("ML"));
/// assert!(registry.contains("Other"));
/// assert!(!registry.contains("ml"));
/// assert_eq!(registry.display_order(), vec!["ML", "Security", "Other"]);
/// ```
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
    catch_all: Category,
}

impl CategoryRegistry {
    /// Validate `categories` and build the registry.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Config`] if the list is empty, a name is blank,
    /// a name is duplicated, the catch-all name is blank, or a keyword would
    /// lose leading or trailing characters to punctuation stripping
    /// (`c++`, `.net`, `!!`).
    pub fn load(categories: Vec<Category>, catch_all: &str) -> crate::Result<Self> {
        let catch_all_name = catch_all.trim();
        if catch_all_name.is_empty() {
            return Err(DigestError::Config(
                "catch-all category name must not be empty".into(),
            ));
        }
        if categories.is_empty() {
            return Err(DigestError::Config(
                "no categories configured; add [[categories]] entries or run `techdigest init`"
                    .into(),
            ));
        }

        let mut seen = HashSet::new();
        for (idx, category) in categories.iter().enumerate() {
            if category.name.trim().is_empty() {
                return Err(DigestError::Config(format!(
                    "category #{} has an empty name",
                    idx + 1
                )));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(DigestError::Config(format!(
                    "duplicate category name: {}",
                    category.name
                )));
            }
            if let Some(keyword) = category.keywords.iter().find(|k| !is_matchable(k)) {
                return Err(DigestError::Config(format!(
                    "category {}: keyword {keyword:?} must start and end with a letter or digit",
                    category.name
                )));
            }
        }

        let (listed_catch_all, categories): (Vec<Category>, Vec<Category>) = categories
            .into_iter()
            .partition(|c| c.name == catch_all_name);

        let catch_all = listed_catch_all.into_iter().next().unwrap_or_else(|| {
            Category::new(catch_all_name).with_description(CATCH_ALL_DESCRIPTION)
        });

        Ok(Self {
            categories,
            catch_all,
        })
    }

    /// Build the registry from a loaded configuration.
    pub fn from_config(config: &DigestConfig) -> crate::Result<Self> {
        Self::load(config.categories.clone(), &config.classifier.catch_all)
    }

    /// Configured categories in display order, excluding the catch-all.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Name of the catch-all category.
    pub fn catch_all(&self) -> &str {
        &self.catch_all.name
    }

    /// The catch-all as a category, for prompts.
    pub fn catch_all_category(&self) -> &Category {
        &self.catch_all
    }

    /// Every category a result may carry: configured ones, then the catch-all.
    pub fn all(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().chain(std::iter::once(&self.catch_all))
    }

    /// Whether `name` is an exact match for a category or the catch-all.
    pub fn contains(&self, name: &str) -> bool {
        self.is_catch_all(name) || self.categories.iter().any(|c| c.name == name)
    }

    pub fn is_catch_all(&self, name: &str) -> bool {
        self.catch_all.name == name
    }

    /// Display index of `name`; the catch-all sorts after every category.
    pub fn position(&self, name: &str) -> Option<usize> {
        if self.is_catch_all(name) {
            return Some(self.categories.len());
        }
        self.categories.iter().position(|c| c.name == name)
    }

    /// Names in display order, catch-all last.
    pub fn display_order(&self) -> Vec<&str> {
        self.all().map(|c| c.name.as_str()).collect()
    }

    /// Number of configured categories, excluding the catch-all.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
