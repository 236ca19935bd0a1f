use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};

const DEFAULT_SCRAPFLY_API_URL: &str = "https://api.scrapfly.io";

/// The env config env vars needed for scraping.
#[derive(Debug, Deserialize)]
pub struct ScrapingEnv {
    pub scrapfly_key: String,
    #[serde(default = "default_scrapfly_api_url")]
    pub scrapfly_api_url: String,
    #[serde(default = "default_scrape_debug")]
    pub scrape_debug: bool,
}

fn default_scrapfly_api_url() -> String {
    DEFAULT_SCRAPFLY_API_URL.to_string()
}

fn default_scrape_debug() -> bool {
    true
}

pub struct ScrapingConfig {
    pub scrapfly_key: String,
    pub scrapfly_api_url: String,
    pub debug: bool,
    pub output_dir: PathBuf,
    pub tweets_per_politician: usize,
    pub tweet_pause: Duration,
    pub politician_pause: Duration,
    pub max_crash_retries: u32,
}

impl ScrapingConfig {
    pub fn new() -> anyhow::Result<Self> {
        let scraping_env = ScrapingEnv::load_from_env()?;
        Ok(Self::from_env(scraping_env))
    }

    pub fn from_env(scraping_env: ScrapingEnv) -> Self {
        Self {
            scrapfly_key: scraping_env.scrapfly_key,
            scrapfly_api_url: scraping_env.scrapfly_api_url,
            debug: scraping_env.scrape_debug,
            output_dir: PathBuf::from("results"),
            tweets_per_politician: 30,
            tweet_pause: Duration::from_secs(1),
            politician_pause: Duration::from_secs(3),
            max_crash_retries: 2,
        }
    }

    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_tweets_per_politician(mut self, tweets: usize) -> Self {
        self.tweets_per_politician = tweets;
        self
    }

    pub fn timeline_debug_path(&self, username: &str) -> PathBuf {
        self.output_dir.join(format!("{username}_timeline.html"))
    }

    pub fn tweets_csv_path(&self) -> PathBuf {
        self.output_dir.join("politician_tweets.csv")
    }
}

// Extension trait.
pub trait LoadFromEnv: DeserializeOwned {
    fn load_from_env() -> anyhow::Result<Self> {
        // Don't throw an error if .env file doesn't exist.
        let _ = dotenv::dotenv();
        let config =
            envy::from_env::<Self>().context("failed to load env variables into config struct")?;
        Ok(config)
    }
}

impl<T: DeserializeOwned> LoadFromEnv for T {}
