use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use log::{LevelFilter, info};
use partisan::{
    LabeledText, ScrapingConfig, ScrapingContext,
    annotation::load_speech_data,
    dataset::load_dataset,
    politician_scraper::{self, default_roster, load_roster},
    speech::extract_speakers,
    train::{TrainOptions, train_model},
};

#[derive(Parser)]
#[command(version, about = "Political affiliation corpus tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape politicians' recent tweets into a CSV file.
    Scrape {
        /// CSV with `username,affiliation` columns; defaults to the built-in roster.
        #[arg(long)]
        roster: Option<PathBuf>,
        #[arg(long, default_value = "results")]
        output: PathBuf,
        #[arg(long, default_value_t = 30)]
        tweets: usize,
    },
    /// Scrape one profile and print it as JSON.
    Profile { username: String },
    /// Extract the speeches that have a single speaker.
    Speakers {
        corpus: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Label speeches by speaker and clean them.
    Speeches {
        corpus: PathBuf,
        annotations: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load the Democrat vs Republican tweets dataset.
    Dataset { path: PathBuf },
    /// Train and evaluate a TF-IDF + Naive Bayes classifier.
    Train(TrainArgs),
}

#[derive(Args)]
struct TrainArgs {
    /// Tweets dataset (CSV file or the directory holding ExtractedTweets.csv).
    #[arg(long, conflicts_with_all = ["speeches", "annotations"], required_unless_present = "speeches")]
    dataset: Option<PathBuf>,
    /// Speech corpus JSON; needs --annotations.
    #[arg(long, requires = "annotations")]
    speeches: Option<PathBuf>,
    #[arg(long)]
    annotations: Option<PathBuf>,
    #[arg(long, default_value_t = 0.2)]
    test_size: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,
}

fn print_head(data: &[LabeledText], n: usize) {
    for sample in data.iter().take(n) {
        println!("{}\t{}", sample.label, sample.text);
    }
}

fn write_labeled_csv(path: &Path, data: &[LabeledText]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for sample in data {
        writer.serialize(sample)?;
    }
    writer.flush()?;
    Ok(())
}

async fn run_scrape(roster: Option<PathBuf>, output: PathBuf, tweets: usize) -> anyhow::Result<()> {
    let roster = match roster {
        Some(path) => load_roster(&path)?,
        None => default_roster(),
    };
    let config = ScrapingConfig::new()?
        .with_output_dir(output)
        .with_tweets_per_politician(tweets);
    let ctx = ScrapingContext::new(config)?;
    politician_scraper::run(&ctx, &roster).await?;
    Ok(())
}

async fn run_profile(username: &str) -> anyhow::Result<()> {
    let ctx = ScrapingContext::new(ScrapingConfig::new()?)?;
    let profile = ctx
        .twitter
        .scrape_profile(&format!("https://x.com/{username}"))
        .await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

fn load_training_data(args: &TrainArgs) -> anyhow::Result<Vec<LabeledText>> {
    match (&args.dataset, &args.speeches, &args.annotations) {
        (Some(dataset), _, _) => load_dataset(dataset),
        (None, Some(corpus), Some(annotations)) => load_speech_data(corpus, annotations),
        _ => anyhow::bail!("either --dataset or --speeches with --annotations is required"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    match Cli::parse().command {
        Command::Scrape {
            roster,
            output,
            tweets,
        } => run_scrape(roster, output, tweets).await?,
        Command::Profile { username } => run_profile(&username).await?,
        Command::Speakers { corpus, output } => {
            let records = extract_speakers(&corpus)?;
            println!("{} single-speaker speeches", records.len());
            if let Some(first) = records.first() {
                println!("{}", serde_json::to_string_pretty(first)?);
            }
            if let Some(output) = output {
                fs::write(&output, serde_json::to_string_pretty(&records)?)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                info!("wrote {}", output.display());
            }
        }
        Command::Speeches {
            corpus,
            annotations,
            output,
        } => {
            let data = load_speech_data(&corpus, &annotations)?;
            print_head(&data, 5);
            if let Some(output) = output {
                write_labeled_csv(&output, &data)?;
                info!("wrote {}", output.display());
            }
        }
        Command::Dataset { path } => {
            let data = load_dataset(&path)?;
            println!("{} tweets", data.len());
            print_head(&data, 5);
        }
        Command::Train(args) => {
            let data = load_training_data(&args)?;
            let options = TrainOptions {
                test_size: args.test_size,
                seed: args.seed,
                alpha: args.alpha,
            };
            let report = train_model(&data, options)?;
            print!("{report}");
        }
    }
    Ok(())
}
