// src/curate/text.rs
//! Text helpers shared by the pipeline stages: cleanup, case folding,
//! title tokenization and keyword pattern compilation.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Built-in stop words dropped before title similarity.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "are", "as", "at", "be", "been", "but",
    "by", "can", "could", "did", "do", "does", "for", "from", "has", "have", "he", "her", "his",
    "how", "if", "in", "into", "is", "it", "its", "may", "more", "new", "no", "not", "now", "of",
    "on", "or", "our", "out", "over", "says", "she", "so", "than", "that", "the", "their",
    "them", "there", "these", "they", "this", "to", "today", "up", "us", "was", "we", "were",
    "what", "when", "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_title_token() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    // keeps "2.0", "800-171", "cyber-ab" as single tokens
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+(?:[.\-][\p{L}\p{N}]+)*").unwrap())
}

/// Strip tags, decode entities, fold typographic quotes, collapse whitespace, cap length.
/// Escaped markup (`&lt;`, `&gt;`) survives as literal text.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    // 1) Strip HTML tags from the raw input
    let stripped = re_tags().replace_all(s, " ");

    // 2) HTML entity decode, once
    let mut out = html_escape::decode_html_entities(&stripped).to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    // 4) Collapse whitespace
    out = re_ws().replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }
    out
}

/// Case-folded title with punctuation removed, used for stable ids.
pub fn fold_title(s: &str) -> String {
    let stripped: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased title tokens.
pub fn title_tokens(s: &str) -> Vec<String> {
    let lower = s.to_lowercase();
    re_title_token()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Build the case-insensitive pattern for one keyword: word boundaries where the
/// keyword starts/ends with a word character, optional plural suffix.
pub fn keyword_pattern(keyword: &str) -> Option<String> {
    let kw = keyword.trim().to_lowercase();
    let first = kw.chars().next()?;
    let last = kw.chars().last()?;
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let mut p = String::new();
    if is_word(first) {
        p.push_str(r"\b");
    }
    p.push_str(&regex::escape(&kw));
    if is_word(last) {
        p.push_str(r"(?:s|es)?\b");
    }
    Some(p)
}

/// Compile a set of keywords into one alternation. `None` for an empty set.
pub fn keyword_set_regex(keywords: &[String]) -> anyhow::Result<Option<Regex>> {
    let parts: Vec<String> = keywords.iter().filter_map(|k| keyword_pattern(k)).collect();
    if parts.is_empty() {
        return Ok(None);
    }
    let re = Regex::new(&format!("(?i)(?:{})", parts.join("|")))?;
    Ok(Some(re))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_decodes_strips_and_collapses() {
        let s = "  <p>CMMC&nbsp;&nbsp;rule &ldquo;final&rdquo;</p>\n\t<b>now</b> ";
        assert_eq!(clean_text(s, 500), r#"CMMC rule "final" now"#);
    }

    #[test]
    fn escaped_angle_brackets_stay_as_text() {
        assert_eq!(
            clean_text("Score &lt; 88 means Level 2 &gt; self-assessment", 200),
            "Score < 88 means Level 2 > self-assessment"
        );
        assert_eq!(clean_text("<em>SPRS</em> &lt;b&gt;", 200), "SPRS <b>");
    }

    #[test]
    fn clean_text_caps_length() {
        let s = "abcdef ghijkl";
        assert_eq!(clean_text(s, 7), "abcdef");
    }

    #[test]
    fn fold_title_strips_punctuation() {
        assert_eq!(fold_title("CMMC 2.0: Final Rule!"), "cmmc 2 0 final rule");
    }

    #[test]
    fn title_tokens_keep_identifiers_together() {
        assert_eq!(
            title_tokens("NIST 800-171 and CMMC 2.0, Cyber-AB."),
            vec!["nist", "800-171", "and", "cmmc", "2.0", "cyber-ab"]
        );
    }

    #[test]
    fn keyword_pattern_respects_word_boundaries() {
        let re = keyword_set_regex(&["apt".to_string(), "defense contractor".to_string()])
            .unwrap()
            .unwrap();
        assert!(re.is_match("Chinese APT group"));
        assert!(!re.is_match("an aptitude test"));
        assert!(re.is_match("targets defense contractors"));
        assert!(keyword_set_regex(&[]).unwrap().is_none());
    }
}
