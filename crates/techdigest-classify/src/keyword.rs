//! Deterministic keyword classifier, used when the model is off or fails.

use techdigest_core::{Article, CategoryRegistry};

/// Lowercase `text`, turn punctuation into spaces, and collapse whitespace.
///
/// # Examples
///
/// ```
/// use techdigest_classify::keyword::normalize;
///
/// assert_eq!(normalize("GPT-4o:  Faster, Cheaper!"), "gpt 4o faster cheaper");
/// ```
pub fn normalize(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Occurrences of `keyword` in `text` that start on a word boundary.
///
/// Both arguments must already be normalized.
fn count_occurrences(text: &str, keyword: &str) -> usize {
    if keyword.is_empty() {
        return 0;
    }
    let bytes = text.as_bytes();
    text.match_indices(keyword)
        .filter(|(idx, _)| *idx == 0 || bytes[idx - 1] == b' ')
        .count()
}

/// Keyword score of every configured category for `article`, in registry order.
///
/// The catch-all is not scored.
///
/// # Examples
///
/// ```
/// use techdigest_classify::keyword::scores;
/// use techdigest_core::{Article, Category, CategoryRegistry};
///
/// let registry = CategoryRegistry::load(
///     vec![Category::new("ML").with_keywords(["transformer", "gpt"])],
///     "Other",
/// )
/// .unwrap();
/// let article = Article::new("GPT and transformers", "https://x.dev/1", "x", "A GPT deep dive");
/// assert_eq!(scores(&article, &registry), vec![("ML", 3)]);
/// ```
pub fn scores<'r>(article: &Article, registry: &'r CategoryRegistry) -> Vec<(&'r str, usize)> {
    let text = normalize(&article.classification_text());
    registry
        .categories()
        .iter()
        .map(|category| {
            let score = category
                .keywords
                .iter()
                .map(|kw| count_occurrences(&text, &normalize(kw)))
                .sum();
            (category.name.as_str(), score)
        })
        .collect()
}

/// Pick the category with the strictly highest keyword score.
///
/// Ties go to the category listed first; an all-zero score (including empty
/// text) yields the catch-all.
///
/// # Examples
///
/// ```
/// use techdigest_classify::keyword::classify;
/// use techdigest_core::{Article, Category, CategoryRegistry};
///
/// let registry = CategoryRegistry::load(
///     vec![Category::new("ML").with_keywords(["transformer", "gpt"])],
///     "Other",
/// )
/// .unwrap();
///
/// let hit = Article::new("A transformer from scratch", "https://x.dev/1", "x", "");
/// assert_eq!(classify(&hit, &registry), "ML");
///
/// let miss = Article::new("Kubernetes upgrades", "https://x.dev/2", "x", "");
/// assert_eq!(classify(&miss, &registry), "Other");
/// ```
pub fn classify<'r>(article: &Article, registry: &'r CategoryRegistry) -> &'r str {
    let mut best: Option<(&'r str, usize)> = None;
    for (name, score) in scores(article, registry) {
        if score == 0 {
            continue;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((name, score)),
        }
    }
    best.map(|(name, _)| name).unwrap_or_else(|| registry.catch_all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use techdigest_core::Category;

    fn registry() -> CategoryRegistry {
        CategoryRegistry::load(
            vec![
                Category::new("ML").with_keywords(["transformer", "gpt", "machine learning"]),
                Category::new("Security").with_keywords(["cve", "exploit", "ai"]),
                Category::new("Infra").with_keywords(["kubernetes", "gpt"]),
            ],
            "Other",
        )
        .unwrap()
    }

    fn article(title: &str, summary: &str) -> Article {
        Article::new(title, "https://example.com/post", "Example", summary)
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  Hello,   World!  "), "hello world");
        assert_eq!(normalize("state-of-the-art"), "state of the art");
        assert_eq!(normalize("...!?"), "");
    }

    #[test]
    fn counts_only_at_word_starts() {
        assert_eq!(count_occurrences("ai said the email", "ai"), 1);
        assert_eq!(count_occurrences("transformers and a transformer", "transformer"), 2);
        assert_eq!(count_occurrences("anything", ""), 0);
    }

    #[test]
    fn multi_word_keywords_match_phrases() {
        let a = article("Machine-learning at scale", "practical MACHINE LEARNING");
        assert_eq!(classify(&a, &registry()), "ML");
    }

    #[test]
    fn highest_score_wins() {
        let a = article("CVE-2025-1234 exploit", "an exploit chain for a GPT plugin");
        // Security: cve + exploit x2 = 3, ML: gpt = 1, Infra: gpt = 1
        assert_eq!(classify(&a, &registry()), "Security");
    }

    #[test]
    fn tie_goes_to_earlier_category() {
        // ML and Infra both score 1 via "gpt"
        let a = article("GPT notes", "");
        assert_eq!(classify(&a, &registry()), "ML");
    }

    #[test]
    fn tie_break_follows_registry_order_not_name() {
        let reversed = CategoryRegistry::load(
            vec![
                Category::new("Zeta").with_keywords(["rust"]),
                Category::new("Alpha").with_keywords(["rust"]),
            ],
            "Other",
        )
        .unwrap();
        let a = article("Rust in production", "");
        for _ in 0..5 {
            assert_eq!(classify(&a, &reversed), "Zeta");
        }
    }

    #[test]
    fn no_match_yields_catch_all() {
        let a = article("Quarterly hiring update", "We are growing the team");
        assert_eq!(classify(&a, &registry()), "Other");
    }

    #[test]
    fn empty_text_yields_catch_all() {
        assert_eq!(classify(&article("", ""), &registry()), "Other");
    }

    #[test]
    fn category_without_keywords_never_scores() {
        let reg = CategoryRegistry::load(
            vec![Category::new("Described only").with_description("anything")],
            "Misc",
        )
        .unwrap();
        assert_eq!(classify(&article("anything at all", ""), &reg), "Misc");
    }

    #[test]
    fn inner_punctuation_keywords_match_the_whole_phrase() {
        let reg = CategoryRegistry::load(
            vec![
                Category::new("Web").with_keywords(["node.js"]),
                Category::new("Cloud").with_keywords(["kubernetes"]),
            ],
            "Other",
        )
        .unwrap();

        let hit = article("Node.js streams in depth", "");
        assert_eq!(scores(&hit, &reg), vec![("Web", 1), ("Cloud", 0)]);

        let miss = article("Cloud cost control on Kubernetes", "nodes and JS bundles");
        assert_eq!(scores(&miss, &reg), vec![("Web", 0), ("Cloud", 1)]);
        assert_eq!(classify(&miss, &reg), "Cloud");
    }

    #[test]
    fn registries_with_edge_punctuated_keywords_never_reach_scoring() {
        let err = CategoryRegistry::load(
            vec![
                Category::new("Languages").with_keywords(["c++", ".net"]),
                Category::new("Cloud").with_keywords(["kubernetes"]),
            ],
            "Other",
        )
        .unwrap_err();
        assert!(err.to_string().contains("\"c++\""));
    }

    #[test]
    fn scores_are_reported_in_registry_order() {
        let a = article("Kubernetes and GPT", "");
        let reg = registry();
        let s = scores(&a, &reg);
        assert_eq!(s, vec![("ML", 1), ("Security", 0), ("Infra", 2)]);
    }
}
