pub mod annotation;
pub mod config;
pub mod dataset;
pub mod labeled_text;
pub mod naive_bayes;
pub mod politician_scraper;
pub mod ratelimit;
pub mod scrape_error;
pub mod scrapfly;
pub mod scraping_context;
pub mod speech;
pub mod train;
pub mod tweet_ids;
pub mod twitter;
pub mod vectorizer;

pub use config::ScrapingConfig;
pub use labeled_text::LabeledText;
pub use scrape_error::ScrapflyError;
pub use scraping_context::ScrapingContext;
