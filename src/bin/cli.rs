//! boorufetch CLI
//!
//! Queries an upstream and prints fully resolved posts as JSON.

use std::path::PathBuf;

use boorufetch::{
    Booru,
    error::Result,
    models::{Config, Upstream},
    pipeline,
};
use clap::{Parser, Subcommand};

/// boorufetch - Danbooru/Gelbooru post fetcher
#[derive(Parser, Debug)]
#[command(name = "boorufetch", version, about = "Fetch posts from Danbooru and Gelbooru")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page of posts matching a tag query
    Query {
        /// Upstream to query (danbooru or gelbooru)
        #[arg(short, long, default_value = "danbooru")]
        upstream: Upstream,

        /// Zero-based page number
        #[arg(short, long, default_value_t = 0)]
        page: u32,

        /// Posts per page
        #[arg(short, long, default_value_t = 20)]
        limit: u32,

        /// Space-separated tags
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Fetch a single post by MD5 hash
    Lookup {
        /// Upstream to query (danbooru or gelbooru)
        #[arg(short, long, default_value = "danbooru")]
        upstream: Upstream,

        /// 32 hex characters
        md5: String,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();

    match cli.command {
        Command::Query {
            upstream,
            page,
            limit,
            tags,
        } => {
            let booru = Booru::new(&config)?;
            let posts = pipeline::run_query(&booru, upstream, &tags.join(" "), page, limit).await;
            booru.shutdown().await;

            println!("{}", serde_json::to_string_pretty(&posts?)?);
        }

        Command::Lookup { upstream, md5 } => {
            let booru = Booru::new(&config)?;
            let post = pipeline::run_lookup(&booru, upstream, &md5).await;
            booru.shutdown().await;

            match post? {
                Some(post) => println!("{}", serde_json::to_string_pretty(&post)?),
                None => log::warn!("No post with hash {} on {}", md5, upstream),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}
