use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DigestError;

/// One blog post as handed over by the feed fetcher.
///
/// # Examples
///
/// ```
/// use techdigest_core::Article;
///
/// let article = Article::new(
///     "Scaling transformer inference",
///     "https://example.com/posts/1",
///     "Example Engineering",
///     "How we serve large models",
/// );
/// assert_eq!(article.classification_text(), "Scaling transformer inference How we serve large models");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Post title.
    pub title: String,
    /// Canonical link; unique within a run.
    pub url: String,
    /// Name of the blog the post came from.
    pub source: String,
    /// Publication time, when the feed carried one.
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    /// Plain-text excerpt used as classification input.
    #[serde(default)]
    pub summary: String,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: source.into(),
            published: None,
            summary: summary.into(),
        }
    }

    /// Set the publication timestamp.
    pub fn published_at(mut self, published: DateTime<Utc>) -> Self {
        self.published = Some(published);
        self
    }

    /// Title and summary joined, the text both classifiers look at.
    pub fn classification_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }

    /// Parse the feed fetcher's JSON article list.
    ///
    /// The list is taken as-is: order is preserved and nothing is deduplicated.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Input`] if the JSON is not an array of articles
    /// or an article has an empty `url`.
    ///
    /// # Examples
    ///
    /// ```
    /// use techdigest_core::Article;
    ///
    /// let json = r#"[{"title":"A","url":"https://a.dev/1","source":"A Blog","summary":"x"}]"#;
    /// let articles = Article::list_from_json(json).unwrap();
    /// assert_eq!(articles.len(), 1);
    /// assert!(articles[0].published.is_none());
    /// ```
    pub fn list_from_json(json: &str) -> crate::Result<Vec<Article>> {
        let articles: Vec<Article> = serde_json::from_str(json)
            .map_err(|e| DigestError::Input(format!("expected a JSON array of articles: {e}")))?;

        if let Some((idx, article)) = articles
            .iter()
            .enumerate()
            .find(|(_, a)| a.url.trim().is_empty())
        {
            return Err(DigestError::Input(format!(
                "article #{} (\"{}\") has an empty url",
                idx + 1,
                article.title
            )));
        }

        Ok(articles)
    }
}

/// A named topical bucket from the category registry.
///
/// # Examples
///
/// ```
/// use techdigest_core::Category;
///
/// let cat = Category::new("Security").with_keywords(["cve", "exploit"]);
/// assert_eq!(cat.prompt_description(), "cve, exploit");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique, stable identifier shown in the digest.
    pub name: String,
    /// Natural-language description given to the model.
    #[serde(default)]
    pub description: String,
    /// Keywords used by the deterministic classifier.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            keywords: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Text describing this category in a model prompt.
    ///
    /// Falls back to the keyword list when no description is configured.
    pub fn prompt_description(&self) -> String {
        if self.description.trim().is_empty() {
            self.keywords.join(", ")
        } else {
            self.description.trim().to_string()
        }
    }
}

/// Which strategy produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    /// Accepted from the model provider's response.
    Model,
    /// Chosen by the keyword classifier (including its zero-score catch-all).
    Keyword,
    /// Defaulted to the catch-all after the model failed with fallback disabled.
    CatchAll,
}

impl fmt::Display for AssignmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentSource::Model => write!(f, "model"),
            AssignmentSource::Keyword => write!(f, "keyword"),
            AssignmentSource::CatchAll => write!(f, "catch-all"),
        }
    }
}

/// The category assigned to one article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub article: Article,
    pub category: String,
    pub source: AssignmentSource,
}

impl ClassificationResult {
    pub fn new(article: &Article, category: impl Into<String>, source: AssignmentSource) -> Self {
        Self {
            article: article.clone(),
            category: category.into(),
            source,
        }
    }
}

/// Who resolved how many articles in a run.
///
/// # Examples
///
/// ```
/// use techdigest_core::{Article, AssignmentSource, ClassificationResult, ClassificationStats};
///
/// let a = Article::new("t", "https://x.dev/1", "x", "");
/// let results = vec![
///     ClassificationResult::new(&a, "ML", AssignmentSource::Model),
///     ClassificationResult::new(&a, "Other", AssignmentSource::CatchAll),
/// ];
/// let stats = ClassificationStats::from_results(&results);
/// assert_eq!(stats.total, 2);
/// assert_eq!(stats.by_model, 1);
/// assert_eq!(stats.by_catch_all, 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationStats {
    pub total: usize,
    pub by_model: usize,
    pub by_keyword: usize,
    pub by_catch_all: usize,
}

impl ClassificationStats {
    pub fn from_results(results: &[ClassificationResult]) -> Self {
        results.iter().fold(Self::default(), |mut stats, r| {
            stats.total += 1;
            match r.source {
                AssignmentSource::Model => stats.by_model += 1,
                AssignmentSource::Keyword => stats.by_keyword += 1,
                AssignmentSource::CatchAll => stats.by_catch_all += 1,
            }
            stats
        })
    }
}

impl fmt::Display for ClassificationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} articles: {} by model, {} by keyword, {} defaulted to catch-all",
            self.total, self.by_model, self.by_keyword, self.by_catch_all
        )
    }
}

/// Output format for command results.
///
/// # Examples
///
/// ```
/// use techdigest_core::OutputFormat;
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain-text digest preview.
    #[default]
    Text,
    /// Machine-readable JSON for a digest publisher.
    Json,
    /// Markdown digest preview.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("html".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn output_format_default_is_text() {
        assert_eq!(OutputFormat::default(), OutputFormat::Text);
    }

    #[test]
    fn articles_parse_with_timestamps() {
        let json = r#"[
            {"title":"One","url":"https://a.dev/1","source":"A","published":"2025-01-06T09:30:00Z","summary":"first"},
            {"title":"Two","url":"https://a.dev/2","source":"A"}
        ]"#;
        let articles = Article::list_from_json(json).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(
            articles[0].published,
            Some(Utc.with_ymd_and_hms(2025, 1, 6, 9, 30, 0).unwrap())
        );
        assert_eq!(articles[1].summary, "");
    }

    #[test]
    fn articles_keep_duplicates_and_order() {
        let json = r#"[
            {"title":"B","url":"https://a.dev/b","source":"A"},
            {"title":"A","url":"https://a.dev/a","source":"A"}
        ]"#;
        let articles = Article::list_from_json(json).unwrap();
        assert_eq!(articles[0].title, "B");
        assert_eq!(articles[1].title, "A");
    }

    #[test]
    fn empty_url_is_rejected() {
        let json = r#"[{"title":"No link","url":"  ","source":"A"}]"#;
        let err = Article::list_from_json(json).unwrap_err();
        assert!(matches!(err, DigestError::Input(_)));
        assert!(err.to_string().contains("No link"));
    }

    #[test]
    fn non_array_input_is_rejected() {
        let err = Article::list_from_json(r#"{"title":"x"}"#).unwrap_err();
        assert!(matches!(err, DigestError::Input(_)));
    }

    #[test]
    fn category_description_falls_back_to_keywords() {
        let described = Category::new("ML").with_description("  Machine learning  ");
        assert_eq!(described.prompt_description(), "Machine learning");

        let bare = Category::new("ML").with_keywords(["gpt", "transformer"]);
        assert_eq!(bare.prompt_description(), "gpt, transformer");
    }

    #[test]
    fn assignment_source_serializes_snake_case() {
        let json = serde_json::to_string(&AssignmentSource::CatchAll).unwrap();
        assert_eq!(json, "\"catch_all\"");
        assert_eq!(AssignmentSource::Keyword.to_string(), "keyword");
    }

    #[test]
    fn stats_count_each_source() {
        let a = Article::new("t", "https://x.dev/1", "x", "");
        let results = vec![
            ClassificationResult::new(&a, "ML", AssignmentSource::Model),
            ClassificationResult::new(&a, "ML", AssignmentSource::Model),
            ClassificationResult::new(&a, "Web", AssignmentSource::Keyword),
        ];
        let stats = ClassificationStats::from_results(&results);
        assert_eq!(
            stats,
            ClassificationStats {
                total: 3,
                by_model: 2,
                by_keyword: 1,
                by_catch_all: 0,
            }
        );
        assert!(stats.to_string().starts_with("3 articles"));
    }
}
