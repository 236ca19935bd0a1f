//! Scraping of x.com pages through the rendering service, and flattening of
//! the GraphQL payloads the web app fetches in the background.

use std::collections::BTreeMap;

use anyhow::{Context, anyhow, bail};
use log::info;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::scrapfly::{Scrape, ScrapeConfig, ScrapeResult};

/// Text the web app renders when it fails to boot.
const CRASH_MARKER: &str = "Something went wrong, but";

pub const TWEET_SELECTOR: &str = "[data-testid='tweet']";
const PROFILE_SELECTOR: &str = "[data-testid='primaryColumn']";

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Poll {
    #[serde(flatten)]
    pub choices: BTreeMap<String, String>,
    pub end: Option<String>,
    pub updated: Option<String>,
    pub ended: Option<bool>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: String,
    pub rest_id: String,
    pub verified: bool,
    #[serde(flatten)]
    pub legacy: Map<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ParsedTweet {
    pub created_at: Option<String>,
    pub attached_urls: Vec<String>,
    pub attached_urls2: Vec<String>,
    pub attached_media: Vec<String>,
    pub tagged_users: Vec<String>,
    pub tagged_hashtags: Vec<String>,
    pub favorite_count: Option<u64>,
    pub bookmark_count: Option<u64>,
    pub quote_count: Option<u64>,
    pub reply_count: Option<u64>,
    pub retweet_count: Option<u64>,
    pub text: Option<String>,
    pub is_quote: Option<bool>,
    pub is_retweet: Option<bool>,
    pub language: Option<String>,
    pub user_id: Option<String>,
    pub id: Option<String>,
    pub conversation_id: Option<String>,
    pub source: Option<String>,
    pub views: Option<String>,
    pub poll: Poll,
    pub user: Option<Profile>,
}

fn str_at(data: &Value, pointer: &str) -> Option<String> {
    data.pointer(pointer)
        .and_then(Value::as_str)
        .map(String::from)
}

/// Like `str_at`, but numbers are rendered too (view counts come as either).
fn scalar_at(data: &Value, pointer: &str) -> Option<String> {
    match data.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn u64_at(data: &Value, pointer: &str) -> Option<u64> {
    data.pointer(pointer).and_then(Value::as_u64)
}

fn bool_at(data: &Value, pointer: &str) -> Option<bool> {
    data.pointer(pointer).and_then(Value::as_bool)
}

/// `array[].field` projection; elements without the field are skipped.
fn pluck(data: &Value, array_pointer: &str, field: &str) -> Vec<String> {
    data.pointer(array_pointer)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(field).and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_poll(data: &Value) -> Poll {
    let mut poll = Poll::default();
    let Some(entries) = data
        .pointer("/card/legacy/binding_values")
        .and_then(Value::as_array)
    else {
        return poll;
    };

    for entry in entries {
        let Some(key) = entry.get("key").and_then(Value::as_str) else {
            continue;
        };
        let value = entry.get("value").unwrap_or(&Value::Null);
        let string_value = || str_at(value, "/string_value");
        if key.contains("choice") {
            if let Some(choice) = string_value() {
                poll.choices.insert(key.to_string(), choice);
            }
        } else if key.contains("end_datetime") {
            poll.end = string_value();
        } else if key.contains("last_updated_datetime") {
            poll.updated = string_value();
        } else if key.contains("counts_are_final") {
            poll.ended = bool_at(value, "/boolean_value");
        } else if key.contains("duration_minutes") {
            poll.duration = string_value();
        }
    }
    poll
}

/// Flattens a tweet result object into the fields worth keeping.
pub fn parse_tweet(data: &Value) -> ParsedTweet {
    let user = data
        .pointer("/core/user_results/result")
        .filter(|user| !user.is_null())
        .and_then(|user| parse_profile(user).ok());

    ParsedTweet {
        created_at: str_at(data, "/legacy/created_at"),
        attached_urls: pluck(data, "/legacy/entities/urls", "expanded_url"),
        attached_urls2: pluck(data, "/legacy/entities/url/urls", "expanded_url"),
        attached_media: pluck(data, "/legacy/entities/media", "media_url_https"),
        tagged_users: pluck(data, "/legacy/entities/user_mentions", "screen_name"),
        tagged_hashtags: pluck(data, "/legacy/entities/hashtags", "text"),
        favorite_count: u64_at(data, "/legacy/favorite_count"),
        bookmark_count: u64_at(data, "/legacy/bookmark_count"),
        quote_count: u64_at(data, "/legacy/quote_count"),
        reply_count: u64_at(data, "/legacy/reply_count"),
        retweet_count: u64_at(data, "/legacy/retweet_count"),
        text: str_at(data, "/legacy/full_text"),
        is_quote: bool_at(data, "/legacy/is_quote_status"),
        is_retweet: bool_at(data, "/legacy/retweeted"),
        language: str_at(data, "/legacy/lang"),
        user_id: str_at(data, "/legacy/user_id_str"),
        id: str_at(data, "/legacy/id_str"),
        conversation_id: str_at(data, "/legacy/conversation_id_str"),
        source: str_at(data, "/source"),
        views: scalar_at(data, "/views/count"),
        poll: parse_poll(data),
        user,
    }
}

/// Flattens a user result object: identifiers plus everything under `legacy`.
pub fn parse_profile(data: &Value) -> anyhow::Result<Profile> {
    let id = str_at(data, "/id").context("user result has no id")?;
    let rest_id = str_at(data, "/rest_id").context("user result has no rest_id")?;
    let legacy = data
        .get("legacy")
        .and_then(Value::as_object)
        .cloned()
        .context("user result has no legacy object")?;
    Ok(Profile {
        id,
        rest_id,
        verified: bool_at(data, "/is_blue_verified").unwrap_or(false),
        legacy,
    })
}

/// Tweets with limited visibility wrap the actual result one level deeper.
fn unwrap_visibility(result: &Value) -> &Value {
    match result.get("__typename").and_then(Value::as_str) {
        Some("TweetWithVisibilityResults") => result.get("tweet").unwrap_or(result),
        _ => result,
    }
}

pub struct TwitterScraper<S> {
    client: S,
    debug: bool,
    max_crash_retries: u32,
}

impl<S: Scrape> TwitterScraper<S> {
    pub fn new(client: S, debug: bool, max_crash_retries: u32) -> Self {
        Self {
            client,
            debug,
            max_crash_retries,
        }
    }

    #[cfg(test)]
    pub(crate) fn client(&self) -> &S {
        &self.client
    }

    /// Scrapes a web app page, scrolling to the end, and retries while the
    /// app shows its crash screen.
    pub async fn scrape_app(&self, config: ScrapeConfig) -> anyhow::Result<ScrapeResult> {
        let config = config.auto_scroll(true).lang(&["en-US"]).debug(self.debug);
        let mut retries = 0;
        loop {
            if retries == 0 {
                info!("scraping {}", config.url);
            } else {
                info!(
                    "retrying {}/{} {}",
                    retries, self.max_crash_retries, config.url
                );
            }
            let result = self
                .client
                .scrape(&config)
                .await?
                .error_for_upstream_status()?;
            if !result.content.contains(CRASH_MARKER) {
                return Ok(result);
            }
            if retries > self.max_crash_retries {
                bail!("Twitter web app crashed too many times");
            }
            retries += 1;
        }
    }

    /// Renders a user's timeline; the HTML is where tweet IDs get mined from.
    pub async fn scrape_timeline(&self, username: &str) -> anyhow::Result<ScrapeResult> {
        let url = format!("https://twitter.com/{username}");
        self.scrape_app(ScrapeConfig::twitter(url).wait_for_selector(TWEET_SELECTOR))
            .await
    }

    /// Scrapes a single tweet page, e.g. https://twitter.com/Scrapfly_dev/status/1667013143904567296
    pub async fn scrape_tweet(&self, url: &str) -> anyhow::Result<ParsedTweet> {
        let result = self
            .scrape_app(ScrapeConfig::twitter(url).wait_for_selector(TWEET_SELECTOR))
            .await?;

        let tweet_calls = result
            .xhr_calls
            .iter()
            .filter(|call| call.url.contains("TweetResultByRestId"));
        for call in tweet_calls {
            let Some(response) = &call.response else {
                continue;
            };
            let data: Value = serde_json::from_str(&response.body)
                .context("tweet background request returned invalid json")?;
            let tweet = data
                .pointer("/data/tweetResult/result")
                .ok_or_else(|| anyhow!("tweet response has no data.tweetResult.result"))?;
            return Ok(parse_tweet(unwrap_visibility(tweet)));
        }
        bail!("no TweetResultByRestId background request captured for {url}")
    }

    /// Scrapes a profile page, e.g. https://x.com/scrapfly_dev
    pub async fn scrape_profile(&self, url: &str) -> anyhow::Result<Profile> {
        let result = self
            .scrape_app(ScrapeConfig::twitter(url).wait_for_selector(PROFILE_SELECTOR))
            .await?;

        let user_calls = result
            .xhr_calls
            .iter()
            .filter(|call| call.url.contains("UserBy"));
        for call in user_calls {
            let Some(response) = &call.response else {
                continue;
            };
            let data: Value = serde_json::from_str(&response.body)
                .context("profile background request returned invalid json")?;
            let user = data
                .pointer("/data/user/result")
                .ok_or_else(|| anyhow!("profile response has no data.user.result"))?;
            return parse_profile(user);
        }
        bail!("Failed to scrape user profile - no matching user data background requests")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        scrape_error::ScrapflyError,
        scrapfly::fake::{FakeScraper, page, page_with_xhr},
    };

    fn tweet_result() -> Value {
        json!({
            "__typename": "Tweet",
            "source": "<a href=\"https://mobile.twitter.com\">Twitter Web App</a>",
            "views": {"count": "1234", "state": "EnabledWithCount"},
            "core": {"user_results": {"result": {
                "id": "VXNlcjox",
                "rest_id": "1976143068",
                "is_blue_verified": true,
                "legacy": {"screen_name": "EmmanuelMacron", "followers_count": 9000000}
            }}},
            "card": {"legacy": {"binding_values": [
                {"key": "choice1_label", "value": {"string_value": "Oui"}},
                {"key": "choice2_label", "value": {"string_value": "Non"}},
                {"key": "end_datetime_utc", "value": {"string_value": "2024-05-01T10:00:00Z"}},
                {"key": "last_updated_datetime_utc", "value": {"string_value": "2024-04-30T10:00:00Z"}},
                {"key": "counts_are_final", "value": {"boolean_value": true}},
                {"key": "duration_minutes", "value": {"string_value": "1440"}}
            ]}},
            "legacy": {
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "full_text": "Vive la République, vive la France !",
                "favorite_count": 10,
                "bookmark_count": 2,
                "quote_count": 3,
                "reply_count": 4,
                "retweet_count": 5,
                "is_quote_status": false,
                "retweeted": false,
                "lang": "fr",
                "user_id_str": "1976143068",
                "id_str": "1050118621198921728",
                "conversation_id_str": "1050118621198921728",
                "entities": {
                    "urls": [{"expanded_url": "https://elysee.fr"}, {"display_url": "no expansion"}],
                    "media": [{"media_url_https": "https://pbs.twimg.com/media/a.jpg"}],
                    "user_mentions": [{"screen_name": "Elysee"}],
                    "hashtags": [{"text": "France"}]
                }
            }
        })
    }

    #[test]
    fn parse_tweet_projects_legacy_fields() {
        let tweet = parse_tweet(&tweet_result());
        assert_eq!(tweet.id.as_deref(), Some("1050118621198921728"));
        assert_eq!(tweet.text.as_deref(), Some("Vive la République, vive la France !"));
        assert_eq!(tweet.attached_urls, vec!["https://elysee.fr"]);
        assert!(tweet.attached_urls2.is_empty());
        assert_eq!(tweet.attached_media, vec!["https://pbs.twimg.com/media/a.jpg"]);
        assert_eq!(tweet.tagged_users, vec!["Elysee"]);
        assert_eq!(tweet.tagged_hashtags, vec!["France"]);
        assert_eq!(tweet.favorite_count, Some(10));
        assert_eq!(tweet.retweet_count, Some(5));
        assert_eq!(tweet.is_quote, Some(false));
        assert_eq!(tweet.language.as_deref(), Some("fr"));
        assert_eq!(tweet.views.as_deref(), Some("1234"));
        assert!(tweet.source.unwrap().contains("Twitter Web App"));
    }

    #[test]
    fn parse_tweet_reads_poll_and_user() {
        let tweet = parse_tweet(&tweet_result());
        assert_eq!(tweet.poll.choices.len(), 2);
        assert_eq!(tweet.poll.choices["choice1_label"], "Oui");
        assert_eq!(tweet.poll.end.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(tweet.poll.updated.as_deref(), Some("2024-04-30T10:00:00Z"));
        assert_eq!(tweet.poll.ended, Some(true));
        assert_eq!(tweet.poll.duration.as_deref(), Some("1440"));

        let poll = serde_json::to_value(&tweet.poll).unwrap();
        assert_eq!(poll["choice2_label"], "Non");
        assert_eq!(poll["end"], "2024-05-01T10:00:00Z");
        assert!(poll.get("choices").is_none());

        let user = tweet.user.unwrap();
        assert_eq!(user.rest_id, "1976143068");
        assert!(user.verified);
        assert_eq!(user.legacy["screen_name"], "EmmanuelMacron");
    }

    #[test]
    fn parse_tweet_tolerates_missing_everything() {
        let tweet = parse_tweet(&json!({}));
        assert_eq!(tweet, ParsedTweet::default());
    }

    #[test]
    fn parse_profile_requires_identifiers() {
        assert!(parse_profile(&json!({"legacy": {}})).is_err());
        let profile = parse_profile(&json!({"id": "a", "rest_id": "1", "legacy": {"name": "X"}})).unwrap();
        assert!(!profile.verified);
        let flat = serde_json::to_value(&profile).unwrap();
        assert_eq!(flat["name"], "X");
        assert_eq!(flat["rest_id"], "1");
    }

    #[tokio::test]
    async fn scrape_app_retries_crashed_pages() {
        let fake = FakeScraper::new(vec![
            Ok(page("Something went wrong, but don't fret")),
            Ok(page("<div data-testid=\"tweet\"></div>")),
        ]);
        let scraper = TwitterScraper::new(fake, false, 2);
        let result = scraper
            .scrape_app(ScrapeConfig::twitter("https://twitter.com/x"))
            .await
            .unwrap();
        assert!(result.content.contains("data-testid"));

        let requests = scraper.client.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].auto_scroll);
        assert_eq!(requests[0].lang, vec!["en-US"]);
    }

    #[tokio::test]
    async fn scrape_timeline_rejects_upstream_error_page() {
        let mut blocked = page("<a href=\"/EmmanuelMacron/status/1050118621198921728\">");
        blocked.status_code = 429;
        let scraper = TwitterScraper::new(FakeScraper::new(vec![Ok(blocked)]), false, 2);
        let err = scraper.scrape_timeline("EmmanuelMacron").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScrapflyError>(),
            Some(ScrapflyError::Upstream { status: 429 })
        ));
        assert_eq!(scraper.client.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scrape_app_gives_up_after_retries() {
        let crashed = (0..10)
            .map(|_| Ok(page("Something went wrong, but don't fret")))
            .collect();
        let scraper = TwitterScraper::new(FakeScraper::new(crashed), false, 2);
        let err = scraper
            .scrape_app(ScrapeConfig::twitter("https://twitter.com/x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("crashed too many times"));
        assert_eq!(scraper.client.requests.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn scrape_tweet_reads_background_request() {
        let body = json!({"data": {"tweetResult": {"result": {
            "__typename": "TweetWithVisibilityResults",
            "tweet": tweet_result()
        }}}});
        let fake = FakeScraper::new(vec![Ok(page_with_xhr(
            "<html></html>",
            "https://x.com/i/api/graphql/q/TweetResultByRestId?variables=1",
            &body.to_string(),
        ))]);
        let scraper = TwitterScraper::new(fake, true, 2);
        let tweet = scraper
            .scrape_tweet("https://twitter.com/EmmanuelMacron/status/1050118621198921728")
            .await
            .unwrap();
        assert_eq!(tweet.id.as_deref(), Some("1050118621198921728"));

        let requests = scraper.client.requests.lock().unwrap();
        assert!(requests[0].debug);
        assert_eq!(requests[0].wait_for_selector.as_deref(), Some(TWEET_SELECTOR));
    }

    #[tokio::test]
    async fn scrape_tweet_without_background_request_fails() {
        let fake = FakeScraper::new(vec![Ok(page("<html></html>"))]);
        let scraper = TwitterScraper::new(fake, false, 2);
        assert!(scraper.scrape_tweet("https://twitter.com/a/status/1").await.is_err());
    }

    #[tokio::test]
    async fn scrape_profile_reads_user_by_request() {
        let body = json!({"data": {"user": {"result": {
            "id": "VXNlcjox", "rest_id": "1", "is_blue_verified": false,
            "legacy": {"screen_name": "scrapfly_dev"}
        }}}});
        let fake = FakeScraper::new(vec![Ok(page_with_xhr(
            "<html></html>",
            "https://x.com/i/api/graphql/q/UserByScreenName",
            &body.to_string(),
        ))]);
        let scraper = TwitterScraper::new(fake, false, 2);
        let profile = scraper.scrape_profile("https://x.com/scrapfly_dev").await.unwrap();
        assert_eq!(profile.legacy["screen_name"], "scrapfly_dev");
    }
}
