//! Message selection and text cleaning applied before forwarding.

/// Trailing content starting at this marker is stripped from forwarded text.
pub const DEFAULT_FOOTER_MARKER: &str = "📹 YouTube";

/// Keyword / blacklist rules of a forwarding session.
///
/// Terms are stored lowercased; matching is a case-insensitive substring test.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageFilter {
    keywords: Vec<String>,
    blacklist: Vec<String>,
}

impl MessageFilter {
    pub fn new<K, B>(keywords: K, blacklist: B) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        Self {
            keywords: normalize_terms(keywords),
            blacklist: normalize_terms(blacklist),
        }
    }

    /// Empty keywords match everything; any blacklist hit overrides a keyword hit.
    pub fn should_forward(&self, text: Option<&str>) -> bool {
        let lower = text.map(str::to_lowercase);

        let mut forward = if self.keywords.is_empty() {
            true
        } else {
            lower
                .as_deref()
                .is_some_and(|t| self.keywords.iter().any(|k| t.contains(k.as_str())))
        };

        if let Some(t) = lower.as_deref() {
            if self.blacklist.iter().any(|b| t.contains(b.as_str())) {
                forward = false;
            }
        }

        forward
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn blacklist(&self) -> &[String] {
        &self.blacklist
    }
}

fn normalize_terms<I>(terms: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Truncate `text` at the first occurrence of `marker` and trim trailing whitespace.
///
/// Text without the marker is returned unchanged.
pub fn strip_footer(text: &str, marker: &str) -> String {
    if marker.is_empty() {
        return text.to_string();
    }
    match text.find(marker) {
        Some(idx) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// `"{body}\n\n**{signature}**"`.
pub fn with_signature(body: &str, signature: &str) -> String {
    format!("{body}\n\n**{signature}**")
}

/// Caption for re-sent media: cleaned text plus signature, or the signature alone.
pub fn media_caption(cleaned: Option<&str>, signature: &str) -> String {
    match cleaned {
        Some(body) if !body.is_empty() => with_signature(body, signature),
        _ => format!("**{signature}**"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TERMS: [&str; 0] = [];

    #[test]
    fn empty_rules_forward_everything() {
        let f = MessageFilter::new(NO_TERMS, NO_TERMS);
        assert!(f.should_forward(Some("anything")));
        assert!(f.should_forward(Some("")));
        assert!(f.should_forward(None));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let f = MessageFilter::new(["Bitcoin"], NO_TERMS);
        assert!(f.should_forward(Some("BITCOIN to the moon")));
        assert!(f.should_forward(Some("buy bitcoin")));
        assert!(!f.should_forward(Some("ethereum only")));
        assert!(!f.should_forward(None));
    }

    #[test]
    fn blacklist_overrides_keywords() {
        let f = MessageFilter::new(["deal"], ["Scam"]);
        assert!(f.should_forward(Some("great deal")));
        assert!(!f.should_forward(Some("great deal, not a SCAM")));

        let only_blacklist = MessageFilter::new(NO_TERMS, ["spam"]);
        assert!(!only_blacklist.should_forward(Some("pure spam")));
        assert!(only_blacklist.should_forward(None));
    }

    #[test]
    fn blank_terms_are_dropped() {
        let f = MessageFilter::new(["  ", ""], [" Spam "]);
        assert!(f.keywords().is_empty());
        assert_eq!(f.blacklist(), ["spam".to_string()]);
    }

    #[test]
    fn strips_footer_and_trailing_whitespace() {
        assert_eq!(strip_footer("A\n📹 YouTube\nB", DEFAULT_FOOTER_MARKER), "A");
        assert_eq!(
            strip_footer("Hello 📹 YouTube extra", DEFAULT_FOOTER_MARKER),
            "Hello"
        );
        assert_eq!(strip_footer("no footer  ", DEFAULT_FOOTER_MARKER), "no footer  ");
        assert_eq!(strip_footer("📹 YouTube only", DEFAULT_FOOTER_MARKER), "");
    }

    #[test]
    fn signature_formats() {
        assert_eq!(with_signature("Hello", "MyBot"), "Hello\n\n**MyBot**");
        assert_eq!(media_caption(Some("pic"), "Sig"), "pic\n\n**Sig**");
        assert_eq!(media_caption(Some(""), "Sig"), "**Sig**");
        assert_eq!(media_caption(None, "Sig"), "**Sig**");
    }
}
