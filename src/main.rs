use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use listdeck::config::Config;
use listdeck::model::EventPatch;
use listdeck::store::{Bucket, TimelineStore};
use listdeck::{CacheManager, CacheResult, CacheSource, Event, HttpTransport, Priority, RpcClient, TagColor};

/// Environment variable holding the log filter
const LOG_ENV: &str = "LISTDECK_LOG";

#[derive(Parser, Debug)]
#[command(name = "listdeck")]
#[command(about = "Browse and edit lists, events and tags on a listdeck backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/listdeck/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show every list
  Lists,
  NewList {
    title: String,
    #[arg(long)]
    icon: Option<String>,
  },
  RenameList {
    id: String,
    title: String,
  },
  DeleteList {
    id: String,
  },
  /// Show the events of a list
  Events {
    list_id: String,
    /// Number of pages to load
    #[arg(long, default_value_t = 1)]
    pages: usize,
  },
  AddEvent {
    list_id: String,
    title: String,
    #[arg(long, default_value = "medium")]
    priority: Priority,
    /// Deadline as a millisecond timestamp (default: now)
    #[arg(long)]
    ddl: Option<String>,
  },
  DeleteEvent {
    event_id: String,
    list_id: String,
  },
  /// Print an event's body
  Content {
    event_id: String,
  },
  WriteContent {
    event_id: String,
    content: String,
  },
  Tags,
  AddTag {
    name: String,
    #[arg(long, default_value = "primary")]
    color: TagColor,
  },
  DeleteTag {
    name: String,
  },
  /// Show the events carrying a tag
  TagEvents {
    name: String,
  },
  /// Show events grouped by deadline
  Timeline {
    /// Only show one bucket (today, tomorrow, this_week, next_week, overdue)
    #[arg(long)]
    bucket: Option<Bucket>,
  },
  /// Mark a timeline event as finished
  Finish {
    event_id: String,
    #[arg(long, default_value = "today")]
    bucket: Bucket,
  },
  Search {
    query: String,
  },
}

/// Log to a daily file under the data dir so stdout only carries output.
fn init_tracing() -> Option<WorkerGuard> {
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

  match dirs::data_dir() {
    Some(data_dir) => {
      let appender = tracing_appender::rolling::daily(data_dir.join("listdeck").join("logs"), "listdeck.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
      Some(guard)
    }
    None => {
      tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
      None
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_tracing();

  let config = Config::load(args.config.as_deref())?;
  info!(backend = %config.backend.url, "listdeck starting");

  let transport = HttpTransport::new(&config.backend.url, config.timeout())?;
  let manager = CacheManager::new(RpcClient::new(transport), &config.cache_settings());

  run(&manager, args.command).await
}

async fn run(manager: &CacheManager, command: Command) -> Result<()> {
  match command {
    Command::Lists => {
      let lists = manager.lists().fetch_lists().await;
      warn_offline(&lists, manager.lists().error());
      for list in manager.lists().sorted_lists() {
        println!("{}  {}", list.id, list.title);
      }
    }
    Command::NewList { title, icon } => {
      manager.lists().fetch_lists().await;
      let lists = manager.create_list(&title, icon.as_deref()).await?;
      if let Some(created) = lists.last() {
        println!("Created {}  {}", created.id, created.title);
      }
    }
    Command::RenameList { id, title } => {
      manager.lists().fetch_lists().await;
      manager.rename_list(&id, &title).await?;
      println!("Renamed {} to {}", id, title);
    }
    Command::DeleteList { id } => {
      manager.lists().fetch_lists().await;
      manager.delete_list(&id).await?;
      println!("Deleted {}", id);
    }
    Command::Events { list_id, pages } => {
      let mut events = manager.events().load(&list_id, false).await;
      for _ in 1..pages {
        if !manager.events().page_info(&list_id).has_more {
          break;
        }
        events = manager.events().load(&list_id, true).await;
      }
      warn_offline(&events, manager.events().error());
      print_events(&events.data);
      if manager.events().page_info(&list_id).has_more {
        println!("(more available, use --pages)");
      }
    }
    Command::AddEvent {
      list_id,
      title,
      priority,
      ddl,
    } => {
      let events = manager.add_event(&list_id, &title, priority, ddl.as_deref()).await?;
      print_events(&events);
    }
    Command::DeleteEvent { event_id, list_id } => {
      manager.delete_event(&event_id, &list_id).await?;
      println!("Deleted {}", event_id);
    }
    Command::Content { event_id } => {
      let content = manager.content().get(&event_id).await;
      warn_offline(&content, manager.content().error());
      println!("{}", content.data);
    }
    Command::WriteContent { event_id, content } => {
      manager.save_content(&event_id, &content).await?;
      println!("Saved {} bytes", content.len());
    }
    Command::Tags => {
      let tags = manager.tags().fetch_tags().await;
      warn_offline(&tags, manager.tags().error());
      for tag in &tags.data {
        println!("{}  {:?}", tag.name, tag.color);
      }
    }
    Command::AddTag { name, color } => {
      let tags = manager.add_tag(&name, color).await?;
      println!("{} tags", tags.len());
    }
    Command::DeleteTag { name } => {
      let tags = manager.delete_tag(&name).await?;
      println!("{} tags", tags.len());
    }
    Command::TagEvents { name } => {
      let events = manager.tags().tag_content(&name).await;
      warn_offline(&events, manager.tags().error());
      print_events(&events.data);
    }
    Command::Timeline { bucket } => {
      let timeline = manager.timeline();
      timeline.fetch_events().await;
      if let Some(error) = timeline.error() {
        eprintln!("warning: {}", error);
      }
      let buckets = match bucket {
        Some(bucket) => vec![bucket],
        None => timeline.visible_buckets(),
      };
      for bucket in buckets {
        println!("== {} ==", bucket.title());
        print_events(&TimelineStore::sort_by_priority(timeline.group_items(bucket)));
      }
    }
    Command::Finish { event_id, bucket } => {
      manager.timeline().fetch_events().await;
      let patch = EventPatch {
        finished: Some(true),
        ..EventPatch::new(event_id)
      };
      let event = manager.update_timeline_event(&patch, bucket).await?;
      println!("Finished {}", event.title);
    }
    Command::Search { query } => {
      let events = manager.events().search(&query).await;
      if let Some(error) = manager.events().error() {
        eprintln!("warning: {}", error);
      }
      print_events(&events);
    }
  }
  Ok(())
}

fn warn_offline<T>(result: &CacheResult<T>, error: Option<String>) {
  if result.source == CacheSource::Offline {
    eprintln!(
      "warning: backend unavailable, showing cached data ({})",
      error.unwrap_or_default()
    );
  }
}

fn print_events(events: &[Event]) {
  for event in events {
    let mark = if event.finished { "x" } else { " " };
    let due = event
      .deadline()
      .map(|ddl| ddl.format("%Y-%m-%d %H:%M").to_string())
      .unwrap_or_else(|| "-".to_string());
    println!("[{}] {}  {}  {}  {}", mark, event.id, event.priority, due, event.title);
  }
}
