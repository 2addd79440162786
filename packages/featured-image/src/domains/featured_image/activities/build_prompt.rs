//! Prompt assembly.

/// Placeholder replaced with the selected links.
pub const URLS_PLACEHOLDER: &str = "{urls}";

/// Optionally shuffle, then cap the list. A `max_urls` of 0 keeps every URL.
pub fn select_urls(
    mut urls: Vec<String>,
    max_urls: usize,
    randomize: bool,
    rng: &mut fastrand::Rng,
) -> Vec<String> {
    if randomize && urls.len() > 1 {
        rng.shuffle(&mut urls);
    }
    if max_urls > 0 {
        urls.truncate(max_urls);
    }
    urls
}

/// Replace every `{urls}` in the template with the links joined by `", "`.
pub fn build_prompt(template: &str, urls: &[String]) -> String {
    template.replace(URLS_PLACEHOLDER, &urls.join(", "))
}
