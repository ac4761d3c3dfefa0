//! URL normalization and domain extraction.
//!
//! A normalized URL is the cache key: the parser lower-cases the host while
//! the path, query and fragment pass through. Malformed input fails closed --
//! the raw string is used as-is so normalization never blocks a caller.

use url::Url;

/// Normalize a URL for use as a cache key.
pub fn normalize(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Extract the lower-cased host for domain-level matching and stats.
///
/// Falls back to a best-effort scheme/path strip when the URL does not parse.
pub fn domain_of(raw: &str) -> String {
    if let Ok(parsed) = Url::parse(raw) {
        if let Some(host) = parsed.host_str() {
            return host.to_ascii_lowercase();
        }
    }
    let stripped = raw.split("://").nth(1).unwrap_or(raw);
    stripped
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Case-insensitive domain-substring match against a pattern list.
pub fn domain_matches(domain: &str, patterns: &[String]) -> bool {
    let domain = domain.to_ascii_lowercase();
    patterns
        .iter()
        .any(|p| !p.is_empty() && domain.contains(&p.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn host_casing_does_not_change_the_key() {
        assert_eq!(
            normalize("https://WWW.Example.COM/Path?Q=1#Frag"),
            normalize("https://www.example.com/Path?Q=1#Frag")
        );
    }

    #[test]
    fn path_and_query_casing_is_preserved() {
        let n = normalize("https://example.com/CaseSensitive?Key=Value");
        assert!(n.contains("/CaseSensitive"));
        assert!(n.contains("Key=Value"));
    }

    #[test]
    fn malformed_url_falls_back_to_raw() {
        assert_eq!(normalize("not a url at all"), "not a url at all");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(domain_of("https://News.Ycombinator.com/item?id=1"), "news.ycombinator.com");
        assert_eq!(domain_of("bogus://"), "");
        assert_eq!(domain_of("x.com/path"), "x.com");
    }

    #[test]
    fn domain_substring_match() {
        let list = vec!["github.com".to_string(), "Docs.RS".to_string()];
        assert!(domain_matches("gist.github.com", &list));
        assert!(domain_matches("docs.rs", &list));
        assert!(!domain_matches("example.com", &list));
        assert!(!domain_matches("example.com", &[String::new()]));
    }

    proptest! {
        #[test]
        fn normalize_is_idempotent(raw in "\\PC{0,60}") {
            let once = normalize(&raw);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
