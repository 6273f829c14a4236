//! Preview renderers for a grouped digest.
//!
//! These only show what a publisher would receive; sending the digest is not
//! handled here.

use chrono::{Datelike, Duration, NaiveDate};
use techdigest_core::{Article, DigestError};

use crate::group::DigestGroups;

const RULE_WIDTH: usize = 60;

/// Monday of the week containing `date`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use techdigest_digest::render::week_start;
///
/// let thursday = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();
/// assert_eq!(week_start(thursday), NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
/// ```
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn article_date(article: &Article) -> Option<String> {
    article
        .published
        .map(|p| p.format("%B %d, %Y").to_string())
}

/// Render a plain-text digest.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use techdigest_core::{Article, AssignmentSource, Category, CategoryRegistry, ClassificationResult};
/// use techdigest_digest::{group, render};
///
/// let registry = CategoryRegistry::load(vec![Category::new("ML")], "Other").unwrap();
/// let a = Article::new("Serving LLMs", "https://x.dev/1", "X Blog", "");
/// let groups = group(&[ClassificationResult::new(&a, "ML", AssignmentSource::Model)], &registry);
///
/// let text = render::to_text(&groups, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
/// assert!(text.contains("ML (1 articles)"));
/// assert!(text.contains("• Serving LLMs"));
/// ```
pub fn to_text(groups: &DigestGroups, week_of: NaiveDate) -> String {
    let mut out = format!(
        "Weekly Tech Blog Digest - Week of {}\n",
        week_of.format("%B %d, %Y")
    );
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push_str("\n\n");
    out.push_str(&format!("Total Articles: {}\n", groups.article_count()));

    if groups.is_empty() {
        out.push_str("\nNo articles this week.\n");
        return out;
    }

    for group in groups {
        out.push_str(&format!(
            "\n{} ({} articles)\n",
            group.category.to_uppercase(),
            group.articles.len()
        ));
        out.push_str(&"-".repeat(RULE_WIDTH));
        out.push_str("\n\n");

        for article in &group.articles {
            out.push_str(&format!("• {}\n", article.title));
            out.push_str(&format!("  Source: {}\n", article.source));
            if let Some(date) = article_date(article) {
                out.push_str(&format!("  Date: {date}\n"));
            }
            out.push_str(&format!("  Link: {}\n", article.url));
            if !article.summary.trim().is_empty() {
                out.push_str(&format!("  Summary: {}\n", article.summary.trim()));
            }
            out.push('\n');
        }
    }
    out
}

/// Render the digest as markdown.
pub fn to_markdown(groups: &DigestGroups, week_of: NaiveDate) -> String {
    let mut out = format!(
        "# Weekly Tech Blog Digest: week of {}\n\n",
        week_of.format("%B %d, %Y")
    );
    out.push_str(&format!("**Total articles:** {}\n\n", groups.article_count()));

    if groups.is_empty() {
        out.push_str("No articles this week.\n");
        return out;
    }

    for group in groups {
        out.push_str(&format!(
            "## {} ({})\n\n",
            group.category,
            group.articles.len()
        ));
        for article in &group.articles {
            out.push_str(&format!("- [{}]({})", article.title, article.url));
            out.push_str(&format!(" *{}*", article.source));
            if let Some(date) = article_date(article) {
                out.push_str(&format!(", {date}"));
            }
            out.push('\n');
            if !article.summary.trim().is_empty() {
                out.push_str(&format!("  > {}\n", article.summary.trim()));
            }
        }
        out.push('\n');
    }
    out
}

/// Serialize the groups for a digest publisher.
///
/// # Errors
///
/// Returns [`DigestError::Serialization`] if encoding fails.
pub fn to_json(groups: &DigestGroups) -> Result<String, DigestError> {
    Ok(serde_json::to_string_pretty(groups)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::group;
    use chrono::{TimeZone, Utc};
    use techdigest_core::{AssignmentSource, Category, CategoryRegistry, ClassificationResult};

    fn groups() -> DigestGroups {
        let registry = CategoryRegistry::load(
            vec![Category::new("Security"), Category::new("ML")],
            "Other",
        )
        .unwrap();
        let dated = Article::new(
            "Inside a CVE",
            "https://sec.dev/cve",
            "Sec Blog",
            "  A walk through the exploit.  ",
        )
        .published_at(Utc.with_ymd_and_hms(2025, 1, 7, 12, 0, 0).unwrap());
        let plain = Article::new("Team news", "https://x.dev/news", "X Blog", "");
        group(
            &[
                ClassificationResult::new(&plain, "Other", AssignmentSource::Keyword),
                ClassificationResult::new(&dated, "Security", AssignmentSource::Model),
            ],
            &registry,
        )
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    #[test]
    fn week_start_of_monday_is_itself() {
        assert_eq!(week_start(monday()), monday());
        let sunday = NaiveDate::from_ymd_opt(2025, 1, 12).unwrap();
        assert_eq!(week_start(sunday), monday());
    }

    #[test]
    fn text_lists_groups_in_order() {
        let text = to_text(&groups(), monday());
        assert!(text.starts_with("Weekly Tech Blog Digest - Week of January 06, 2025\n"));
        assert!(text.contains("Total Articles: 2"));

        let security = text.find("SECURITY (1 articles)").unwrap();
        let other = text.find("OTHER (1 articles)").unwrap();
        assert!(security < other);

        assert!(text.contains("  Date: January 07, 2025\n"));
        assert!(text.contains("  Link: https://sec.dev/cve\n"));
        assert!(text.contains("  Summary: A walk through the exploit.\n"));
    }

    #[test]
    fn text_skips_missing_date_and_summary() {
        let text = to_text(&groups(), monday());
        let news = &text[text.find("• Team news").unwrap()..];
        assert!(!news.contains("Date:"));
        assert!(!news.contains("Summary:"));
    }

    #[test]
    fn empty_digest_says_so() {
        let text = to_text(&DigestGroups::default(), monday());
        assert!(text.contains("Total Articles: 0"));
        assert!(text.contains("No articles this week."));
        assert!(to_markdown(&DigestGroups::default(), monday()).contains("No articles"));
    }

    #[test]
    fn markdown_links_articles() {
        let md = to_markdown(&groups(), monday());
        assert!(md.starts_with("# Weekly Tech Blog Digest"));
        assert!(md.contains("## Security (1)"));
        assert!(md.contains("- [Inside a CVE](https://sec.dev/cve) *Sec Blog*, January 07, 2025\n"));
        assert!(md.contains("  > A walk through the exploit.\n"));
        assert!(md.find("## Security").unwrap() < md.find("## Other").unwrap());
    }

    #[test]
    fn json_is_an_array_of_groups() {
        let json: serde_json::Value = serde_json::from_str(&to_json(&groups()).unwrap()).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["category"], "Security");
        assert_eq!(arr[1]["category"], "Other");
    }
}
