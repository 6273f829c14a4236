use serde::Serialize;
use techdigest_core::{Article, CategoryRegistry, ClassificationResult};
use tracing::warn;

/// One category section of the digest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub articles: Vec<Article>,
}

/// Classified articles bucketed by category, ready for a publisher.
///
/// Serializes as `[{"category": ..., "articles": [...]}, ...]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DigestGroups {
    groups: Vec<CategoryGroup>,
}

impl DigestGroups {
    pub fn groups(&self) -> &[CategoryGroup] {
        &self.groups
    }

    pub fn get(&self, category: &str) -> Option<&CategoryGroup> {
        self.groups.iter().find(|g| g.category == category)
    }

    /// Category names in output order.
    pub fn categories(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.category.as_str()).collect()
    }

    /// Total number of articles across all groups.
    pub fn article_count(&self) -> usize {
        self.groups.iter().map(|g| g.articles.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CategoryGroup> {
        self.groups.iter()
    }
}

impl<'a> IntoIterator for &'a DigestGroups {
    type Item = &'a CategoryGroup;
    type IntoIter = std::slice::Iter<'a, CategoryGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Bucket `results` by category.
///
/// Groups follow registry order with the catch-all last; articles keep their
/// input order and empty categories are left out. A result naming a category
/// the registry does not know goes to the catch-all.
///
/// # Examples
///
/// ```
/// use techdigest_core::{Article, AssignmentSource, Category, CategoryRegistry, ClassificationResult};
/// use techdigest_digest::group;
///
/// let registry = CategoryRegistry::load(
///     vec![Category::new("ML"), Category::new("Web")],
///     "Other",
/// )
/// .unwrap();
/// let a = Article::new("a", "https://x.dev/a", "x", "");
/// let b = Article::new("b", "https://x.dev/b", "x", "");
/// let results = vec![
///     ClassificationResult::new(&a, "Other", AssignmentSource::Keyword),
///     ClassificationResult::new(&b, "ML", AssignmentSource::Model),
/// ];
///
/// let groups = group(&results, &registry);
/// assert_eq!(groups.categories(), vec!["ML", "Other"]);
/// ```
pub fn group(results: &[ClassificationResult], registry: &CategoryRegistry) -> DigestGroups {
    let order = registry.display_order();
    let catch_all_idx = order.len() - 1;
    let mut buckets: Vec<Vec<Article>> = vec![Vec::new(); order.len()];

    for result in results {
        let idx = registry.position(&result.category).unwrap_or_else(|| {
            warn!(
                article = %result.article.title,
                category = %result.category,
                "unknown category in results, moving to catch-all"
            );
            catch_all_idx
        });
        buckets[idx].push(result.article.clone());
    }

    let groups = order
        .into_iter()
        .zip(buckets)
        .filter(|(_, articles)| !articles.is_empty())
        .map(|(category, articles)| CategoryGroup {
            category: category.to_string(),
            articles,
        })
        .collect();

    DigestGroups { groups }
}

#[cfg(test)]
mod tests {
    use super::*;
    use techdigest_core::{AssignmentSource, Category};

    fn registry() -> CategoryRegistry {
        CategoryRegistry::load(
            vec![
                Category::new("Security"),
                Category::new("ML"),
                Category::new("Web"),
            ],
            "Other",
        )
        .unwrap()
    }

    fn result(n: usize, category: &str) -> ClassificationResult {
        let article = Article::new(format!("Post {n}"), format!("https://x.dev/{n}"), "x", "");
        ClassificationResult::new(&article, category, AssignmentSource::Keyword)
    }

    fn titles(group: &CategoryGroup) -> Vec<&str> {
        group.articles.iter().map(|a| a.title.as_str()).collect()
    }

    #[test]
    fn follows_registry_order_with_catch_all_last() {
        let results = vec![
            result(1, "Other"),
            result(2, "Web"),
            result(3, "Security"),
            result(4, "Web"),
        ];
        let groups = group(&results, &registry());
        assert_eq!(groups.categories(), vec!["Security", "Web", "Other"]);
        assert_eq!(titles(groups.get("Web").unwrap()), vec!["Post 2", "Post 4"]);
        assert_eq!(groups.article_count(), 4);
    }

    #[test]
    fn empty_categories_are_omitted() {
        let groups = group(&[result(1, "ML")], &registry());
        assert_eq!(groups.categories(), vec!["ML"]);
        assert!(groups.get("Security").is_none());
    }

    #[test]
    fn no_results_give_no_groups() {
        let groups = group(&[], &registry());
        assert!(groups.is_empty());
        assert_eq!(groups.article_count(), 0);
    }

    #[test]
    fn unknown_category_goes_to_catch_all() {
        let results = vec![result(1, "Other"), result(2, "Databases")];
        let groups = group(&results, &registry());
        assert_eq!(groups.categories(), vec!["Other"]);
        assert_eq!(titles(&groups.groups()[0]), vec!["Post 1", "Post 2"]);
    }

    #[test]
    fn serializes_as_array_of_groups() {
        let groups = group(&[result(1, "ML")], &registry());
        let json = serde_json::to_value(&groups).unwrap();
        assert_eq!(json[0]["category"], "ML");
        assert_eq!(json[0]["articles"][0]["url"], "https://x.dev/1");
    }
}
