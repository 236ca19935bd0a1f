use crate::{
    config::ScrapingConfig,
    ratelimit::Throttle,
    scrapfly::{Scrape, ScrapflyClient},
    twitter::TwitterScraper,
};

pub struct ScrapingContext<S> {
    pub scraping_config: ScrapingConfig,
    pub twitter: TwitterScraper<S>,
    pub tweet_throttle: Throttle,
    pub politician_throttle: Throttle,
}

impl ScrapingContext<ScrapflyClient> {
    pub fn new(scraping_config: ScrapingConfig) -> anyhow::Result<Self> {
        let client = ScrapflyClient::new(
            &scraping_config.scrapfly_api_url,
            &scraping_config.scrapfly_key,
        )?;
        Ok(Self::with_scraper(scraping_config, client))
    }
}

impl<S: Scrape> ScrapingContext<S> {
    pub fn with_scraper(scraping_config: ScrapingConfig, scraper: S) -> Self {
        let twitter = TwitterScraper::new(
            scraper,
            scraping_config.debug,
            scraping_config.max_crash_retries,
        );
        let tweet_throttle = Throttle::new(scraping_config.tweet_pause);
        let politician_throttle = Throttle::new(scraping_config.politician_pause);
        ScrapingContext {
            scraping_config,
            twitter,
            tweet_throttle,
            politician_throttle,
        }
    }
}
