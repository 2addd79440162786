//! Outbound link extraction from post HTML.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Collect the unique absolute http(s) links of a post body, minus ignored domains.
///
/// Hrefs are returned as written (trimmed), in first-seen order. Malformed
/// markup never fails; whatever anchors the parser recovers are used.
pub fn extract_links(html: &str, ignored_domains: &[String]) -> Vec<String> {
    if html.trim().is_empty() {
        return Vec::new();
    }

    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let rules = normalize_rules(ignored_domains);
    let fragment = Html::parse_fragment(html);

    let mut seen = HashSet::new();
    fragment
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| absolute_host(href).map(|host| (href, host)))
        .filter(|(_, host)| !is_ignored(host, &rules))
        .filter(|(href, _)| seen.insert(href.to_string()))
        .map(|(href, _)| href.to_string())
        .collect()
}

/// Split the `ignored_domains` setting into one rule per non-empty line.
pub fn parse_ignored_domains(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lower-cased host of an absolute http(s) URL, or `None` for anything else.
fn absolute_host(href: &str) -> Option<String> {
    let lower = href.to_ascii_lowercase();
    // `http:foo` parses as a URL but has no authority part
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return None;
    }

    let url = Url::parse(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_ascii_lowercase())
}

fn normalize_rules(ignored_domains: &[String]) -> Vec<String> {
    ignored_domains
        .iter()
        .map(|rule| strip_www(&rule.trim().to_ascii_lowercase()).to_string())
        .filter(|rule| !rule.is_empty())
        .collect()
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Exact match or subdomain of any rule.
fn is_ignored(host: &str, rules: &[String]) -> bool {
    let host = strip_www(host);
    rules.iter().any(|rule| {
        let rule = rule.as_str();
        host == rule
            || (host.len() > rule.len()
                && host.ends_with(rule)
                && host.as_bytes()[host.len() - rule.len() - 1] == b'.')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ignored(rules: &[&str]) -> Vec<String> {
        rules.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn test_whitespace_input_returns_nothing() {
        assert!(extract_links("   \n\t", &[]).is_empty());
    }

    #[test]
    fn test_html_without_anchors_returns_nothing() {
        assert!(extract_links("<p>No links <b>here</b></p>", &[]).is_empty());
    }

    #[test]
    fn test_non_http_links_are_dropped() {
        let html = r##"
            <a href="mailto:me@example.com">mail</a>
            <a href="ftp://files.example.com/x">ftp</a>
            <a href="#frag">anchor</a>
            <a href="relative/path">rel</a>
            <a href="javascript:void(0)">js</a>
            <a href="http:no-authority">odd</a>
            <a href="">empty</a>
            <a href="  HTTPS://News.Example.org/a  ">ok</a>
        "##;
        assert_eq!(extract_links(html, &[]), vec!["HTTPS://News.Example.org/a"]);
    }

    #[test]
    fn test_ignored_domains_match_host_and_subdomains() {
        let html = r#"
            <a href="https://example.com/1">1</a>
            <a href="https://www.example.com/2">2</a>
            <a href="https://sub.example.com/3">3</a>
            <a href="https://notexample.com/4">4</a>
        "#;
        let links = extract_links(html, &ignored(&["example.com"]));
        assert_eq!(links, vec!["https://notexample.com/4"]);
    }

    #[test]
    fn test_rules_are_case_and_www_insensitive() {
        let html = r#"<a href="https://Sub.Example.com/x">x</a><a href="https://b.org">b</a>"#;
        let links = extract_links(html, &ignored(&["  WWW.EXAMPLE.COM ", ""]));
        assert_eq!(links, vec!["https://b.org"]);
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let html = r#"
            <a href="https://a.com/x">1</a>
            <a href="https://b.com/y">2</a>
            <a href="https://a.com/x">3</a>
        "#;
        assert_eq!(
            extract_links(html, &[]),
            vec!["https://a.com/x", "https://b.com/y"]
        );
    }

    #[test]
    fn test_malformed_markup_still_yields_anchors() {
        let html = r#"<div><p><a href="https://a.com">unclosed <a href='https://b.com'>x</div></span>"#;
        let links = extract_links(html, &[]);
        assert_eq!(links, vec!["https://a.com", "https://b.com"]);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let html = r#"<a href="https://c.com">c</a><a href="https://a.com">a</a>"#;
        assert_eq!(extract_links(html, &[]), extract_links(html, &[]));
    }

    #[test]
    fn test_parse_ignored_domains_drops_blank_lines() {
        assert_eq!(
            parse_ignored_domains("facebook.com\n\n  x.com  \n"),
            vec!["facebook.com", "x.com"]
        );
    }
}
