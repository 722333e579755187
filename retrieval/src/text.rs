//! Small text helpers shared by the strategy adapters, the in-memory index
//! and the lexical score model.

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "what", "where", "which", "who", "how", "why", "when", "does",
    "from", "that", "this", "are", "was", "were", "into", "about", "can", "could", "should",
    "would", "please", "show", "find", "tell", "there", "have", "has", "any", "all", "not",
    "在哪", "哪里", "什么", "怎么", "如何",
];

/// Lowercase and collapse runs of whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased content terms in first-seen order, without stop words or duplicates.
///
/// ASCII terms shorter than three characters are dropped; non-ASCII runs
/// (CJK in particular) are kept whole since they carry no spaces.
pub fn significant_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in content_tokens(text) {
        if !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

/// Every content term occurrence, lowercased, with the same filtering as
/// [`significant_terms`] but keeping repeats.
pub fn content_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|raw| !raw.is_empty())
        .map(str::to_lowercase)
        .filter(|term| !(term.is_ascii() && term.len() < 3))
        .filter(|term| !STOP_WORDS.contains(&term.as_str()))
}

/// First phrase wrapped in straight, curly or back quotes.
pub fn quoted_phrase(text: &str) -> Option<&str> {
    const PAIRS: &[(char, char)] = &[('"', '"'), ('`', '`'), ('\u{201c}', '\u{201d}')];
    for (open, close) in PAIRS {
        let Some(start) = text.find(*open) else {
            continue;
        };
        let rest = &text[start + open.len_utf8()..];
        if let Some(end) = rest.find(*close) {
            let phrase = rest[..end].trim();
            if !phrase.is_empty() {
                return Some(phrase);
            }
        }
    }
    None
}

/// Tokens that look like file names or paths (`README.md`, `src/lib.rs`, `docs\guide`).
///
/// Non-ASCII characters end a token, so `README.md在哪` yields `README.md`
/// the same way the router's file-name pattern reads it.
pub fn path_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for raw in text
        .split(|c: char| c.is_whitespace() || !c.is_ascii())
        .filter(|raw| !raw.is_empty())
    {
        let token = raw
            .trim_start_matches(|c: char| {
                !(c.is_alphanumeric() || matches!(c, '.' | '/' | '\\' | '_' | '-'))
            })
            .trim_end_matches(|c: char| {
                !(c.is_alphanumeric() || matches!(c, '/' | '\\' | '_' | '-'))
            });
        if token.is_empty() {
            continue;
        }
        if looks_like_path(token) && !tokens.iter().any(|t: &String| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

pub fn looks_like_path(token: &str) -> bool {
    if token.contains('/') || token.contains('\\') {
        return token.chars().any(char::is_alphanumeric);
    }
    match token.rsplit_once('.') {
        Some((stem, ext)) => {
            stem.chars().count() >= 2
                && (1..=6).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}
