mod cache;
mod config;
mod net;
mod words;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cache::{CacheResult, Page};
use net::StaticStatus;
use words::cached_client::CachedWordsClient;
use words::types::{SortField, SortOrder, WordEntry, WordQuery};

#[derive(Parser, Debug)]
#[command(name = "otji")]
#[command(about = "An offline-friendly client for the Otjiherero dictionary")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/otji/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Answer from local data only, without touching the network
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List, search, and sort words
  List {
    #[command(flatten)]
    listing: ListingArgs,
  },
  /// Drop the cached page and refetch it from the service
  Refresh {
    #[command(flatten)]
    listing: ListingArgs,
  },
  /// Like a word
  Like {
    /// Word document id
    id: String,
  },
  /// Take back a like
  Unlike {
    /// Word document id
    id: String,
  },
  /// Send a word suggestion or message to the maintainers
  Suggest {
    /// The message text
    message: String,

    /// Your name (optional)
    #[arg(short, long)]
    name: Option<String>,
  },
  /// Follow a word's like count until interrupted
  Watch {
    /// Word document id
    id: String,

    /// Poll interval in seconds
    #[arg(long, default_value_t = 30)]
    interval: u64,
  },
}

#[derive(clap::Args, Debug)]
struct ListingArgs {
  /// Page number, starting at 1
  #[arg(short, long, default_value_t = 1)]
  page: u64,

  /// Words per page (default from config)
  #[arg(long)]
  page_size: Option<u64>,

  /// Search term matched against headwords, pronunciations, and definitions
  #[arg(short, long)]
  search: Option<String>,

  /// Sort field
  #[arg(long, value_enum, default_value_t = SortField::Word)]
  sort: SortField,

  /// Sort direction
  #[arg(long, value_enum, default_value_t = SortOrder::Asc)]
  order: SortOrder,
}

impl ListingArgs {
  fn to_query(&self, default_page_size: u64) -> WordQuery {
    let limit = self.page_size.unwrap_or(default_page_size).max(1);
    let offset = self.page.saturating_sub(1) * limit;

    WordQuery::new(offset, limit)
      .with_search(self.search.clone())
      .with_sort(self.sort, self.order)
  }
}

/// Log to a daily-rotated file so command output stays clean.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()?.join("otji").join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;

  let file_appender = tracing_appender::rolling::daily(log_dir, "otji.log");
  let (writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("otji=info")))
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing();

  let config = config::Config::load(args.config.as_deref())?;

  let net: Arc<dyn net::NetworkStatus> = if args.offline {
    Arc::new(StaticStatus::offline())
  } else {
    Arc::new(StaticStatus::online())
  };

  let client = CachedWordsClient::new(&config, net)?;

  match args.command {
    Command::List { listing } => {
      let query = listing.to_query(config.page_size());
      let result = client.list_words(&query).await?;
      print_listing(&result, &query);
    }
    Command::Refresh { listing } => {
      let query = listing.to_query(config.page_size());
      let result = client.force_refresh(&query).await?;
      print_listing(&result, &query);
    }
    Command::Like { id } => {
      let entry = client.get_word(&id).await?;
      let updated = client.like(&entry).await?;
      println!("{} now has {} likes", updated.word, updated.likes);
    }
    Command::Unlike { id } => {
      let entry = client.get_word(&id).await?;
      let updated = client.unlike(&entry).await?;
      println!("{} now has {} likes", updated.word, updated.likes);
    }
    Command::Suggest { message, name } => {
      client.suggest(&message, name.as_deref()).await?;
      println!("Message sent. Thank you for reaching out!");
    }
    Command::Watch { id, interval } => {
      let entry = client.get_word(&id).await?;
      println!("Watching {} ({} likes), Ctrl-C to stop", entry.word, entry.likes);

      let mut subscription = client.watch_likes(&id, Duration::from_secs(interval.max(1)));
      while let Some(event) = subscription.recv().await {
        match event {
          words::watch::WordEvent::LikesChanged { likes, .. } => {
            println!("{} now has {} likes", entry.word, likes);
          }
        }
      }
    }
  }

  Ok(())
}

fn print_listing(result: &CacheResult<Page<WordEntry>>, query: &WordQuery) {
  if let Some(notice) = result.notice() {
    println!("[{notice}]");
    println!();
  }

  if result.data.entries.is_empty() {
    match query.normalized_search() {
      Some(term) => println!("No words found matching \"{term}\""),
      None => println!("No words found"),
    }
    return;
  }

  for entry in &result.data.entries {
    println!("{}  ({})  [{} likes]  #{}", entry.word, entry.pronunciation, entry.likes, entry.id);
    for definition in &entry.definitions {
      println!("    - {definition}");
    }
    println!();
  }

  let page = query.offset / query.limit + 1;
  let total_pages = result.data.total.div_ceil(query.limit).max(1);
  println!(
    "Page {page} of {total_pages} ({} words total)",
    result.data.total
  );
}
