//! Query substitution into the cached placeholder document.

/// Marker replaced by the decoded query term.
pub const QUERY_MARKER: &str = "%q%";
/// Marker replaced by the query term as it appeared in the URL.
pub const ESCAPED_QUERY_MARKER: &str = "%q_escaped%";

/// Escape `& < > " ' /` for safe insertion into a document body.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '/' => out.push_str("&#x2F;"),
            c => out.push(c),
        }
    }
    out
}

/// Raw value of the first `q=` pair of a query string (without `?`).
pub fn extract_query(query: &str) -> Option<&str> {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("q="))
}

/// Form-decode a raw query value: `+` is a space, invalid UTF-8 is
/// replaced.
pub fn decode_query_value(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes()))
            .into_owned(),
    }
}

/// Substitute the query of `query_string` into `template`. Without a `q`
/// parameter the template is returned unchanged.
pub fn render_placeholder(template: &str, query_string: Option<&str>) -> String {
    let Some(raw) = query_string.and_then(extract_query) else {
        return template.to_string();
    };
    let term = escape_html(&decode_query_value(raw));
    let escaped = escape_html(raw);
    template
        .replace(QUERY_MARKER, &term)
        .replace(ESCAPED_QUERY_MARKER, &escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert(1)</script>"),
            "&lt;script&gt;alert(1)&lt;&#x2F;script&gt;"
        );
        assert_eq!(escape_html(r#"a&b"c'd"#), "a&amp;b&quot;c&#39;d");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_extract_first_q_pair() {
        assert_eq!(extract_query("q=foo&page=1"), Some("foo"));
        assert_eq!(extract_query("page=1&q=bar&q=baz"), Some("bar"));
        assert_eq!(extract_query("page=1"), None);
        assert_eq!(extract_query("xq=foo"), None);
    }

    #[test]
    fn test_decode_plus_and_percent() {
        assert_eq!(decode_query_value("foo+bar%21"), "foo bar!");
        assert_eq!(decode_query_value("%ff"), "\u{fffd}");
    }

    #[test]
    fn test_render_placeholder() {
        let template = "<title>%q% · search</title><a href=\"/search?q=%q_escaped%\">";
        let rendered = render_placeholder(template, Some("q=%3Cb%3E+x&perpkg=1"));
        assert_eq!(
            rendered,
            "<title>&lt;b&gt; x · search</title><a href=\"/search?q=%3Cb%3E+x\">"
        );
    }

    #[test]
    fn test_script_injection_is_inert() {
        let rendered = render_placeholder(
            "<h1>%q%</h1>",
            Some("q=%3Cscript%3Ealert(1)%3C%2Fscript%3E"),
        );
        assert_eq!(rendered, "<h1>&lt;script&gt;alert(1)&lt;&#x2F;script&gt;</h1>");
        assert!(!rendered.contains("<script>"));
    }

    #[test]
    fn test_without_query_template_unchanged() {
        assert_eq!(render_placeholder("%q%", None), "%q%");
        assert_eq!(render_placeholder("%q%", Some("page=2")), "%q%");
    }
}
