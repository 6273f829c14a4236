use std::collections::BTreeMap;

use techdigest_core::{Article, CategoryRegistry, DigestError};

const SYSTEM_PROMPT: &str = "\
You are a technical article categorization assistant. You sort engineering \
blog posts into a fixed list of categories for a weekly digest.

Rules:
- Assign every article to exactly ONE category from the list you are given
- Copy the category name exactly as written, including capitalization
- Never invent new categories
- If an article does not clearly fit any category, use the catch-all category
- Always respond with valid JSON and nothing else";

/// Build the system prompt for the categorization model.
///
/// # Examples
///
/// ```
/// use techdigest_classify::prompt::build_system_prompt;
///
/// let prompt = build_system_prompt();
/// assert!(prompt.contains("exactly ONE category"));
/// ```
pub fn build_system_prompt() -> String {
    SYSTEM_PROMPT.to_string()
}

/// Truncate `text` to at most `max_chars` characters, marking the cut with `...`.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

/// Build the user prompt for one batch.
///
/// Articles are numbered from 1 in batch order; that number is the id the
/// model must answer with.
///
/// # Examples
///
/// ```
/// use techdigest_classify::prompt::build_batch_prompt;
/// use techdigest_core::{Article, Category, CategoryRegistry};
///
/// let registry = CategoryRegistry::load(
///     vec![Category::new("ML").with_description("Machine learning and LLMs")],
///     "Other",
/// )
/// .unwrap();
/// let batch = vec![Article::new("Serving LLMs", "https://x.dev/1", "X Blog", "Notes")];
///
/// let prompt = build_batch_prompt(&batch, &registry, 200);
/// assert!(prompt.contains("1. ML: Machine learning and LLMs"));
/// assert!(prompt.contains("[1] Title: Serving LLMs"));
/// assert!(prompt.contains("\"Other\""));
/// ```
pub fn build_batch_prompt(
    batch: &[Article],
    registry: &CategoryRegistry,
    summary_chars: usize,
) -> String {
    let category_list = registry
        .all()
        .enumerate()
        .map(|(i, c)| {
            let description = c.prompt_description();
            if description.is_empty() {
                format!("{}. {}", i + 1, c.name)
            } else {
                format!("{}. {}: {}", i + 1, c.name, description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut articles_text = String::new();
    for (i, article) in batch.iter().enumerate() {
        articles_text.push_str(&format!("\n[{}] Title: {}\n", i + 1, article.title));
        articles_text.push_str(&format!("Source: {}\n", article.source));
        let summary = truncate_chars(&article.summary, summary_chars);
        if !summary.is_empty() {
            articles_text.push_str(&format!("Summary: {summary}\n"));
        }
    }

    let catch_all = registry.catch_all();
    format!(
        "Categorize the following technical blog articles into ONE of these categories:\n\n\
         {category_list}\n\n\
         Articles to categorize:\n\
         {articles_text}\n\
         Return ONLY a JSON object mapping every article number to its category name:\n\
         {{\"assignments\": {{\"1\": \"Category Name\", \"2\": \"Category Name\"}}}}\n\n\
         If an article doesn't clearly fit any category, use \"{catch_all}\".\n"
    )
}

/// Strip a surrounding markdown code fence from a model response.
///
/// # Examples
///
/// ```
/// use techdigest_classify::prompt::strip_code_fences;
///
/// assert_eq!(strip_code_fences("```json\n{\"1\": \"ML\"}\n```"), "{\"1\": \"ML\"}");
/// assert_eq!(strip_code_fences("  {}  "), "{}");
/// ```
pub fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string, e.g. ```json
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn parse_json(response: &str) -> Result<serde_json::Value, DigestError> {
    let cleaned = strip_code_fences(response);
    if let Ok(value) = serde_json::from_str(cleaned) {
        return Ok(value);
    }

    // Some models wrap the JSON in prose.
    let json_slice = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => cleaned,
    };
    serde_json::from_str(json_slice).map_err(|e| {
        let snippet: String = response.chars().take(200).collect();
        DigestError::Parse(format!("response is not valid JSON: {e}; response: {snippet}"))
    })
}

/// Read an id key such as `"3"` or `"[3]"` into a 1-based position.
fn parse_id(key: &str) -> Option<usize> {
    let key = key.trim();
    let key = key
        .strip_prefix('[')
        .and_then(|k| k.strip_suffix(']'))
        .unwrap_or(key);
    key.trim().parse().ok()
}

fn from_object(
    map: &serde_json::Map<String, serde_json::Value>,
    batch_len: usize,
) -> BTreeMap<usize, String> {
    map.iter()
        .filter_map(|(key, value)| {
            let id = parse_id(key)?;
            let name = value.as_str()?;
            (1..=batch_len).contains(&id).then(|| (id, name.to_string()))
        })
        .collect()
}

fn from_array(
    items: &[serde_json::Value],
    batch_len: usize,
) -> Result<BTreeMap<usize, String>, DigestError> {
    if items.len() != batch_len {
        return Err(DigestError::Parse(format!(
            "expected {batch_len} categories, got {}",
            items.len()
        )));
    }
    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_str().map(|name| (i + 1, name.to_string())))
        .collect())
}

/// Parse a model response into `id -> category name` for a batch of `batch_len`.
///
/// Accepted shapes are an object of ids to names, optionally under an
/// `"assignments"` key, or an array of names (bare, or under `"categories"` or
/// `"results"`) whose length equals the batch size. Ids outside the batch and
/// non-string values are skipped. Names are returned verbatim; checking them
/// against the registry is the caller's job.
///
/// # Errors
///
/// Returns [`DigestError::Parse`] for anything else.
///
/// # Examples
///
/// ```
/// use techdigest_classify::prompt::parse_assignments;
///
/// let parsed = parse_assignments(r#"{"assignments": {"1": "ML", "2": "Web"}}"#, 2).unwrap();
/// assert_eq!(parsed[&1], "ML");
/// assert_eq!(parsed[&2], "Web");
///
/// assert!(parse_assignments(r#"["ML"]"#, 2).is_err());
/// ```
pub fn parse_assignments(
    response: &str,
    batch_len: usize,
) -> Result<BTreeMap<usize, String>, DigestError> {
    let value = parse_json(response)?;

    match &value {
        serde_json::Value::Array(items) => from_array(items, batch_len),
        serde_json::Value::Object(map) => {
            if let Some(inner) = map.get("assignments") {
                return match inner {
                    serde_json::Value::Object(inner) => Ok(from_object(inner, batch_len)),
                    serde_json::Value::Array(items) => from_array(items, batch_len),
                    _ => Err(DigestError::Parse(
                        "\"assignments\" is neither an object nor an array".into(),
                    )),
                };
            }
            for key in ["categories", "results"] {
                if let Some(serde_json::Value::Array(items)) = map.get(key) {
                    return from_array(items, batch_len);
                }
            }
            if map.keys().any(|k| parse_id(k).is_some()) {
                return Ok(from_object(map, batch_len));
            }
            Err(DigestError::Parse(format!(
                "response object has no article ids: {value}"
            )))
        }
        other => Err(DigestError::Parse(format!(
            "expected a JSON object or array, got: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use techdigest_core::Category;

    fn registry() -> CategoryRegistry {
        CategoryRegistry::load(
            vec![
                Category::new("ML").with_description("Machine learning, LLMs"),
                Category::new("Security").with_keywords(["cve", "exploit"]),
                Category::new("Web"),
            ],
            "Other",
        )
        .unwrap()
    }

    #[test]
    fn prompt_lists_every_category_with_catch_all_last() {
        let prompt = build_batch_prompt(&[], &registry(), 200);
        assert!(prompt.contains("1. ML: Machine learning, LLMs"));
        assert!(prompt.contains("2. Security: cve, exploit"));
        assert!(prompt.contains("3. Web\n"));
        assert!(prompt.contains("4. Other: Anything that does not clearly fit"));
    }

    #[test]
    fn prompt_numbers_articles_from_one() {
        let batch = vec![
            Article::new("First", "https://a.dev/1", "A", "one"),
            Article::new("Second", "https://a.dev/2", "B", ""),
        ];
        let prompt = build_batch_prompt(&batch, &registry(), 200);
        assert!(prompt.contains("[1] Title: First\nSource: A\nSummary: one\n"));
        assert!(prompt.contains("[2] Title: Second\nSource: B\n"));
        assert!(!prompt.contains("[3]"));
    }

    #[test]
    fn summaries_are_truncated_on_char_boundaries() {
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
        assert_eq!(truncate_chars("日本語のテキスト", 3), "日本語...");
    }

    #[test]
    fn strips_fences_with_and_without_language() {
        assert_eq!(strip_code_fences("```\n{\"1\":\"ML\"}\n```"), "{\"1\":\"ML\"}");
        assert_eq!(strip_code_fences("```json {\"1\":\"ML\"}```"), "{\"1\":\"ML\"}");
        assert_eq!(strip_code_fences("no fences"), "no fences");
    }

    #[test]
    fn parses_plain_id_object() {
        let parsed = parse_assignments(r#"{"1": "ML", "2": "Security"}"#, 2).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[&2], "Security");
    }

    #[test]
    fn parses_fenced_response_with_prose() {
        let response = "Here you go:\n{\"assignments\": {\"1\": \"Web\"}}\nThanks!";
        let parsed = parse_assignments(response, 1).unwrap();
        assert_eq!(parsed[&1], "Web");
    }

    #[test]
    fn skips_out_of_range_ids_and_non_strings() {
        let parsed =
            parse_assignments(r#"{"1": "ML", "2": 7, "3": null, "9": "Web", "0": "Web"}"#, 3)
                .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[&1], "ML");
    }

    #[test]
    fn names_are_not_normalized() {
        let parsed = parse_assignments(r#"{"1": " ml "}"#, 1).unwrap();
        assert_eq!(parsed[&1], " ml ");
    }

    #[test]
    fn arrays_need_exact_length() {
        let parsed = parse_assignments(r#"["ML", "Web"]"#, 2).unwrap();
        assert_eq!(parsed[&1], "ML");
        assert_eq!(parsed[&2], "Web");

        let wrapped = parse_assignments(r#"{"categories": ["Security"]}"#, 1).unwrap();
        assert_eq!(wrapped[&1], "Security");

        let err = parse_assignments(r#"{"results": ["ML", "Web", "Other"]}"#, 2).unwrap_err();
        assert!(matches!(err, DigestError::Parse(_)));
    }

    #[test]
    fn rejects_unusable_shapes() {
        assert!(parse_assignments("I think the first one is ML", 1).is_err());
        assert!(parse_assignments(r#""ML""#, 1).is_err());
        assert!(parse_assignments(r#"{"category": "ML"}"#, 1).is_err());
        assert!(parse_assignments(r#"{"assignments": "ML"}"#, 1).is_err());
    }

    #[test]
    fn bracketed_ids_are_accepted() {
        let parsed = parse_assignments(r#"{"[1]": "ML"}"#, 1).unwrap();
        assert_eq!(parsed[&1], "ML");
    }
}
