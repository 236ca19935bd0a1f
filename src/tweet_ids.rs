use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use scraper::{Html, Selector};

static ANY_STATUS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status/(\d+)").unwrap());
static TWEET_ID_ATTR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-tweet-id]").unwrap());

fn captures(regex: &Regex, haystack: &str) -> Vec<String> {
    regex
        .captures_iter(haystack)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

fn data_attribute_ids(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&TWEET_ID_ATTR_SELECTOR)
        .filter_map(|el| el.value().attr("data-tweet-id"))
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        .map(String::from)
        .collect()
}

/// Mines tweet IDs out of a rendered timeline. The markup changes often, so
/// several patterns are tried, most specific first; the results are
/// concatenated, de-duplicated in first-seen order and cut to `limit`.
pub fn extract_tweet_ids(html: &str, username: &str, limit: usize) -> anyhow::Result<Vec<String>> {
    let user = regex::escape(username);
    let user_status = Regex::new(&format!(r"twitter\.com/{user}/status/(\d+)"))?;
    // Same as the above once compiled; covers pages that escape slashes.
    let escaped_user_status = Regex::new(&format!(r"twitter\.com\/{user}\/status\/(\d+)"))?;
    let x_user_status = Regex::new(&format!(r"x\.com/{user}/status/(\d+)"))?;

    let mut candidates = captures(&user_status, html);
    candidates.extend(captures(&escaped_user_status, html));
    candidates.extend(captures(&x_user_status, html));
    candidates.extend(data_attribute_ids(html));
    candidates.extend(captures(&ANY_STATUS_REGEX, html));

    let mut seen = HashSet::new();
    let tweet_ids = candidates
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .take(limit)
        .collect();
    Ok(tweet_ids)
}
