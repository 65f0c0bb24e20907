//! Markdown subset → Telegram HTML.
//!
//! Forwarded text is composed with the same light markdown Telegram clients
//! accept (`**bold**`, `__italic__`, `~~strike~~`, `` `code` ``, fenced
//! blocks, `[text](url)`). Everything else is escaped and sent verbatim, so
//! source formatting like `_underscores_` or `# hashtags` survives intact.

use std::sync::OnceLock;

use regex::Regex;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn markdown_to_html(input: &str) -> String {
    let (text, code_blocks) = extract_code_blocks(input);
    let (text, inline_codes) = extract_inline_codes(&text);

    let mut text = escape_html(&text);

    // Line-oriented transforms (avoid cross-line emphasis bugs).
    text = text
        .split('\n')
        .map(|line| {
            let l = replace_delimited(line, "**", "<b>", "</b>");
            let l = replace_delimited(&l, "__", "<i>", "</i>");
            replace_delimited(&l, "~~", "<s>", "</s>")
        })
        .collect::<Vec<_>>()
        .join("\n");

    // Links: [text](url) -> <a href="url">text</a>
    text = link_re()
        .replace_all(&text, r#"<a href="$2">$1</a>"#)
        .to_string();

    for (i, code) in code_blocks.iter().enumerate() {
        text = text.replace(
            &format!("\0CODEBLOCK{i}\0"),
            &format!("<pre>{}</pre>", escape_html(code)),
        );
    }

    for (i, code) in inline_codes.iter().enumerate() {
        text = text.replace(
            &format!("\0INLINECODE{i}\0"),
            &format!("<code>{}</code>", escape_html(code)),
        );
    }

    text
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Conservative: no nested brackets, no whitespace in the url.
    RE.get_or_init(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").expect("valid regex"))
}

fn extract_code_blocks(input: &str) -> (String, Vec<String>) {
    let mut blocks = Vec::new();
    let mut out = String::new();

    let mut i = 0usize;
    while let Some(rel) = input[i..].find("```") {
        let start = i + rel;
        out.push_str(&input[i..start]);

        let mut p = start + 3;
        // Optional language identifier: [A-Za-z0-9_]+
        while p < input.len() {
            let b = input.as_bytes()[p];
            if b.is_ascii_alphanumeric() || b == b'_' {
                p += 1;
            } else {
                break;
            }
        }
        if p < input.len() && input.as_bytes()[p] == b'\n' {
            p += 1;
        }

        if let Some(end_rel) = input[p..].find("```") {
            let end = p + end_rel;
            let idx = blocks.len();
            blocks.push(input[p..end].to_string());
            out.push_str(&format!("\0CODEBLOCK{idx}\0"));
            i = end + 3;
            continue;
        }

        // Unclosed fence: append the rest and stop.
        out.push_str(&input[start..]);
        return (out, blocks);
    }

    out.push_str(&input[i..]);
    (out, blocks)
}

fn extract_inline_codes(input: &str) -> (String, Vec<String>) {
    let mut codes = Vec::new();
    let mut out = String::new();

    let mut i = 0usize;
    while let Some(rel) = input[i..].find('`') {
        let start = i + rel;
        out.push_str(&input[i..start]);

        let content_start = start + 1;
        if let Some(end_rel) = input[content_start..].find('`') {
            let end = content_start + end_rel;
            let idx = codes.len();
            codes.push(input[content_start..end].to_string());
            out.push_str(&format!("\0INLINECODE{idx}\0"));
            i = end + 1;
            continue;
        }

        out.push_str(&input[start..]);
        return (out, codes);
    }

    out.push_str(&input[i..]);
    (out, codes)
}

fn replace_delimited(text: &str, delim: &str, open: &str, close: &str) -> String {
    let mut out = String::new();
    let mut i = 0usize;
    while let Some(rel) = text[i..].find(delim) {
        let start = i + rel;
        out.push_str(&text[i..start]);
        let content_start = start + delim.len();
        match text[content_start..].find(delim) {
            Some(end_rel) if end_rel > 0 => {
                let end = content_start + end_rel;
                out.push_str(open);
                out.push_str(&text[content_start..end]);
                out.push_str(close);
                i = end + delim.len();
            }
            _ => {
                out.push_str(delim);
                i = content_start;
            }
        }
    }
    out.push_str(&text[i..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn renders_signature_bold() {
        assert_eq!(
            markdown_to_html("Hello <world>\n\n**MyBot**"),
            "Hello &lt;world&gt;\n\n<b>MyBot</b>"
        );
    }

    #[test]
    fn leaves_single_delimiters_and_unclosed_pairs_alone() {
        assert_eq!(markdown_to_html("snake_case and *star*"), "snake_case and *star*");
        assert_eq!(markdown_to_html("2 ** 3"), "2 ** 3");
        assert_eq!(markdown_to_html("****"), "****");
        assert_eq!(markdown_to_html("__it__ ~~gone~~"), "<i>it</i> <s>gone</s>");
    }

    #[test]
    fn code_is_not_formatted() {
        let html = markdown_to_html("run `**x**`\n```sh\necho '<b>'\n```");
        assert!(html.contains("<code>**x**</code>"));
        assert!(html.contains("<pre>echo '&lt;b&gt;'\n</pre>"));
    }

    #[test]
    fn converts_links() {
        let html = markdown_to_html("[x](https://example.com)");
        assert_eq!(html, r#"<a href="https://example.com">x</a>"#);
    }
}
