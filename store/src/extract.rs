use regex::Regex;

/// Find the first `LABEL: <url>` in free text and return the URL.
///
/// The label is matched case-insensitively as a whole word and may be
/// followed by a colon, whitespace or markdown emphasis. The URL may be
/// wrapped in `[]`, `()` or `<>`. Parentheses are removed from the match and a
/// trailing `.`, `,` or `;` is dropped.
pub fn extract_labeled_url(text: &str, label: &str) -> Option<String> {
    let pattern = format!(
        r#"(?i)\b{}\s*\**\s*[:\s][\s*_]*[\[<(]?\s*(https?://[^\s"'<>\]]+)"#,
        regex::escape(label)
    );
    let re = Regex::new(&pattern).ok()?;
    let raw = re.captures(text)?.get(1)?.as_str();
    let url: String = raw.chars().filter(|c| !matches!(c, '(' | ')')).collect();
    let url = url.trim_end_matches(['.', ',', ';']);
    Some(url.to_string())
}
