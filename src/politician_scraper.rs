use std::{fs, path::Path};

use anyhow::Context;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    scrapfly::Scrape, scraping_context::ScrapingContext, tweet_ids::extract_tweet_ids,
    twitter::ParsedTweet,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Politician {
    pub username: String,
    #[serde(alias = "affiliation")]
    pub political_affiliation: String,
}

impl Politician {
    pub fn new(username: &str, political_affiliation: &str) -> Self {
        Self {
            username: username.to_string(),
            political_affiliation: political_affiliation.to_string(),
        }
    }
}

/// Accounts scraped when no roster file is given.
pub fn default_roster() -> Vec<Politician> {
    vec![Politician::new("EmmanuelMacron", "center")]
}

/// Reads a `username,affiliation` CSV with a header row.
pub fn load_roster(path: &Path) -> anyhow::Result<Vec<Politician>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open roster {}", path.display()))?;
    let roster = reader
        .deserialize()
        .collect::<Result<Vec<Politician>, _>>()
        .with_context(|| format!("malformed roster {}", path.display()))?;
    Ok(roster)
}

const TWEET_CSV_HEADER: [&str; 5] = ["username", "political_affiliation", "text", "created_at", "id"];

/// One row of the scraped tweets CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TweetRecord {
    pub username: String,
    pub political_affiliation: String,
    pub text: String,
    pub created_at: String,
    pub id: String,
}

impl TweetRecord {
    pub fn new(politician: &Politician, tweet: ParsedTweet) -> Self {
        Self {
            username: politician.username.clone(),
            political_affiliation: politician.political_affiliation.clone(),
            text: tweet.text.unwrap_or_default(),
            created_at: tweet.created_at.unwrap_or_default(),
            id: tweet.id.unwrap_or_default(),
        }
    }
}

/// Scrapes up to `tweets_per_politician` tweets from one politician's timeline.
pub async fn scrape_politician_tweets<S: Scrape>(
    ctx: &ScrapingContext<S>,
    politician: &Politician,
) -> anyhow::Result<Vec<TweetRecord>> {
    let username = &politician.username;
    info!("Scraping timeline for {username}");
    let timeline = ctx.twitter.scrape_timeline(username).await?;

    let debug_file = ctx.scraping_config.timeline_debug_path(username);
    fs::write(&debug_file, &timeline.content)
        .with_context(|| format!("failed to save {}", debug_file.display()))?;
    info!(
        "Saved timeline HTML to {} for debugging",
        debug_file.display()
    );

    let tweet_ids = extract_tweet_ids(
        &timeline.content,
        username,
        ctx.scraping_config.tweets_per_politician,
    )?;
    info!("Found {} tweet IDs for {username}", tweet_ids.len());
    info!(
        "First few IDs: {:?}",
        &tweet_ids[..tweet_ids.len().min(5)]
    );
    if tweet_ids.is_empty() {
        error!("No tweet IDs found. Check the HTML structure.");
        return Ok(Vec::new());
    }

    let mut records = Vec::with_capacity(tweet_ids.len());
    for (i, tweet_id) in tweet_ids.iter().enumerate() {
        ctx.tweet_throttle.wait_until_ready().await;

        let tweet_url = format!("https://twitter.com/{username}/status/{tweet_id}");
        info!(
            "Scraping tweet {}/{}: {tweet_url}",
            i + 1,
            tweet_ids.len()
        );
        match ctx.twitter.scrape_tweet(&tweet_url).await {
            Ok(tweet) => {
                let record = TweetRecord::new(politician, tweet);
                let preview: String = record.text.chars().take(50).collect();
                info!("Successfully scraped tweet: {preview}...");
                records.push(record);
            }
            Err(e) => error!("Error scraping tweet {tweet_id}: {e:#}"),
        }
    }

    Ok(records)
}

/// Scrapes every politician in the roster, appending to the CSV as it goes.
/// Returns how many tweets were written.
pub async fn run<S: Scrape>(
    ctx: &ScrapingContext<S>,
    roster: &[Politician],
) -> anyhow::Result<usize> {
    let output_dir = &ctx.scraping_config.output_dir;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let csv_file = ctx.scraping_config.tweets_csv_path();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&csv_file)
        .with_context(|| format!("failed to create {}", csv_file.display()))?;
    // Header goes out even if nothing gets scraped.
    writer.write_record(TWEET_CSV_HEADER)?;
    writer.flush()?;

    let mut total = 0;
    for politician in roster {
        ctx.politician_throttle.wait_until_ready().await;
        info!(
            "Scraping tweets for {} ({})...",
            politician.username, politician.political_affiliation
        );

        match scrape_politician_tweets(ctx, politician).await {
            Ok(tweets) if !tweets.is_empty() => {
                for tweet in &tweets {
                    writer.serialize(tweet)?;
                }
                writer.flush()?;
                total += tweets.len();
                info!(
                    "Successfully scraped {} tweets for {}",
                    tweets.len(),
                    politician.username
                );
            }
            Ok(_) => warn!("No tweets found for {}", politician.username),
            Err(e) => error!("Error processing {}: {e:#}", politician.username),
        }
    }

    info!(
        "Completed scraping {total} tweets from {} politicians",
        roster.len()
    );
    info!("Results saved to {}", csv_file.display());
    Ok(total)
}
