//! `tjournal` - CLI for traveljournal
//!
//! This binary renders the journal's derived views and routes user intents
//! into live collection mutations.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use traveljournal::cli::render;
use traveljournal::cli::{
    Cli, Command, ConfigCommand, DeleteCommand, EditCommand, ExpenseCommand, ListCommand,
    OutputFormat, RouteCommand, SearchCommand, WatchCommand,
};
use traveljournal::derive::{favorite_filter, markers, sectioned, tally, text_filter};
use traveljournal::expense::is_iso_date;
use traveljournal::live::{Entry, Pending};
use traveljournal::maps::{
    directions_url, plan_route, Coordinates, DirectionsClient, RouteProvider,
};
use traveljournal::{
    init_logging, Config, Expense, LiveCollection, LoadState, NewExpense, Notice, Record,
    RemoteCollection, SqliteStore,
};

// Platform-specific imports using conditional compilation
#[cfg(target_os = "linux")]
use traveljournal_linux as platform;

#[cfg(target_os = "macos")]
use traveljournal_mac as platform;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());
    platform::init()?;

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let store = Arc::new(
        SqliteStore::open(config.database_path()).context("failed to open the journal store")?,
    );
    let watcher = config
        .poll_interval()
        .map(|interval| store.watch_external_changes(interval));

    let result = run(cli.command, &config, &store).await;

    if let Some(watcher) = watcher {
        watcher.abort();
    }
    result
}

async fn run(command: Command, config: &Config, store: &Arc<SqliteStore>) -> anyhow::Result<()> {
    match command {
        Command::Add(add) => {
            let view = Opened::<Record>::points(store, config).await?;
            let pending = view.live.create_record(add.to_new_record())?;
            let id = view.finish(pending).await?;
            println!("Saved \"{}\" as {id}", add.name.trim());
        }
        Command::List(list) => handle_list(store, config, &list).await?,
        Command::Search(search) => handle_search(store, config, &search).await?,
        Command::Favorite { id } => {
            let view = Opened::<Record>::points(store, config).await?;
            let was = view.live.get(&id).is_some_and(|r| r.favorite());
            let pending = view.live.toggle_favorite(&id)?;
            view.finish(pending).await?;
            if was {
                println!("Removed {id} from favorites");
            } else {
                println!("Added {id} to favorites");
            }
        }
        Command::Edit(edit) => handle_edit(store, config, &edit).await?,
        Command::Delete(delete) => handle_delete(store, config, &delete).await?,
        Command::Stats { json } => {
            let view = Opened::<Record>::points(store, config).await?;
            print!("{}", render::tally(&tally(&view.live.records()), json)?);
        }
        Command::Map { format } => {
            let view = Opened::<Record>::points(store, config).await?;
            print!("{}", render::markers(&markers(&view.live.records()), format)?);
        }
        Command::Route(route) => handle_route(store, config, &route).await?,
        Command::Watch(watch) => handle_watch(store, config, &watch).await?,
        Command::Expense(expense) => handle_expense(store, config, expense).await?,
        Command::Config(_) => {}
    }
    Ok(())
}

/// A loaded view plus its notice channel.
struct Opened<T: Entry> {
    live: LiveCollection<T>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

impl<T: Entry> std::fmt::Debug for Opened<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opened").field("live", &self.live).finish()
    }
}

impl<T: Entry> Opened<T> {
    async fn open(store: &Arc<SqliteStore>, path: &str, config: &Config) -> anyhow::Result<Self> {
        let remote: Arc<dyn RemoteCollection> = store.clone();
        let mut live = LiveCollection::open(remote, path, config.view.sort).await;
        let notices = live
            .take_notices()
            .context("notice channel already taken")?;

        let snapshot = live.ready().await;
        if let LoadState::Failed(message) = snapshot.state {
            bail!("could not load {path}: {message}");
        }
        Ok(Self { live, notices })
    }

    /// Wait for a mutation and turn a reported failure into an error.
    async fn finish<R>(mut self, pending: Pending<R>) -> anyhow::Result<R> {
        let outcome = pending.await.context("mutation task panicked")?;
        self.live.close();
        match outcome {
            Some(value) => Ok(value),
            None => match self.notices.try_recv() {
                Ok(notice) => bail!("{notice}"),
                Err(_) => bail!("operation failed"),
            },
        }
    }
}

impl Opened<Record> {
    async fn points(store: &Arc<SqliteStore>, config: &Config) -> anyhow::Result<Self> {
        Self::open(store, &config.store.collection, config).await
    }
}

async fn handle_list(
    store: &Arc<SqliteStore>,
    config: &Config,
    cmd: &ListCommand,
) -> anyhow::Result<()> {
    let view = Opened::<Record>::points(store, config).await?;
    let records = view.live.records();

    let sections = if cmd.favorites {
        sectioned("Favorites", favorite_filter(&records))
    } else {
        sectioned("Locations", records)
    };
    print!("{}", render::sections(&sections, cmd.format, render::EMPTY_LOCATIONS)?);
    Ok(())
}

async fn handle_search(
    store: &Arc<SqliteStore>,
    config: &Config,
    cmd: &SearchCommand,
) -> anyhow::Result<()> {
    let view = Opened::<Record>::points(store, config).await?;
    let found = text_filter(&view.live.records(), &cmd.query);

    if cmd.format != OutputFormat::Json {
        println!("Found {} location(s) for \"{}\"", found.len(), cmd.query);
    }
    let sections = sectioned("Results", found);
    print!("{}", render::sections(&sections, cmd.format, render::NO_MATCHES)?);
    Ok(())
}

async fn handle_edit(
    store: &Arc<SqliteStore>,
    config: &Config,
    cmd: &EditCommand,
) -> anyhow::Result<()> {
    let view = Opened::<Record>::points(store, config).await?;
    let patch = cmd.to_patch();
    if let Some(coordinates) = &patch.coordinates {
        if coordinates.parse::<Coordinates>().is_err() {
            warn!(
                coordinates,
                "Coordinates do not parse; the location will not appear on the map"
            );
        }
    }
    let pending = view.live.update_record(&cmd.id, patch)?;
    view.finish(pending).await?;
    println!("Updated {}", cmd.id);
    Ok(())
}

async fn handle_delete(
    store: &Arc<SqliteStore>,
    config: &Config,
    cmd: &DeleteCommand,
) -> anyhow::Result<()> {
    let view = Opened::<Record>::points(store, config).await?;
    let Some(record) = view.live.get(&cmd.id) else {
        bail!("location {} not found", cmd.id);
    };

    if !cmd.yes {
        println!("This will delete \"{}\" ({}).", record.name, record.id);
        println!("Use --yes to confirm.");
        return Ok(());
    }

    let pending = view.live.delete_record(&cmd.id)?;

    view.finish(pending).await?;
    println!("Deleted \"{}\"", record.name);
    Ok(())
}

async fn handle_route(
    store: &Arc<SqliteStore>,
    config: &Config,
    cmd: &RouteCommand,
) -> anyhow::Result<()> {
    let view = Opened::<Record>::points(store, config).await?;
    let Some(record) = view.live.get(&cmd.id) else {
        bail!("location {} not found", cmd.id);
    };
    let destination = record
        .position()
        .with_context(|| format!("\"{}\" has no usable coordinates", record.name))?;
    let url = directions_url(&config.maps.provider_host, &destination);

    let plan = match &cmd.from {
        Some(from) => {
            let origin: Coordinates = from.parse()?;
            let client = DirectionsClient::from_config(&config.maps, config.request_timeout())?;
            let provider = client.as_ref().map(|c| c as &dyn RouteProvider);
            Some(plan_route(provider, origin, destination).await)
        }
        None => None,
    };

    print!("{}", render::route(&url, plan.as_ref(), cmd.json)?);

    if cmd.open {
        platform::open_url(&url)?;
        info!(url, "Opened directions on {}", platform::platform_name());
    }
    Ok(())
}

async fn handle_watch(
    store: &Arc<SqliteStore>,
    config: &Config,
    cmd: &WatchCommand,
) -> anyhow::Result<()> {
    let remote: Arc<dyn RemoteCollection> = store.clone();
    let mut live: LiveCollection<Record> =
        LiveCollection::open(remote, &config.store.collection, config.view.sort).await;
    let mut notices = live
        .take_notices()
        .context("notice channel already taken")?;
    let mut changes = live.changes();
    let query = cmd.query.clone().unwrap_or_default();
    let title = if cmd.favorites { "Favorites" } else { "Locations" };

    println!("Watching {} (Ctrl-C to stop)", live.path());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(notice) = notices.recv() => eprintln!("{notice}"),
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                if snapshot.is_loading() {
                    continue;
                }
                let mut records = text_filter(&snapshot.records, &query);
                if cmd.favorites {
                    records = favorite_filter(&records);
                }
                debug!(revision = snapshot.revision, "Rendering snapshot");
                println!("--- revision {} ---", snapshot.revision);
                let sections = sectioned(title, records);
                print!(
                    "{}",
                    render::sections(&sections, OutputFormat::Plain, render::EMPTY_LOCATIONS)?
                );
            }
        }
    }

    live.close();
    Ok(())
}

async fn handle_expense(
    store: &Arc<SqliteStore>,
    config: &Config,
    cmd: ExpenseCommand,
) -> anyhow::Result<()> {
    let view =
        Opened::<Expense>::open(store, &config.store.expense_collection, config).await?;

    match cmd {
        ExpenseCommand::Add {
            description,
            amount,
            date,
        } => {
            let mut expense = NewExpense::new(description, amount);
            if let Some(date) = date {
                if !is_iso_date(&date) {
                    warn!(date, "Date is not in YYYY-MM-DD form");
                }
                expense = expense.on(date);
            }
            let pending = view.live.add_expense(expense)?;
            let id = view.finish(pending).await?;
            println!("Saved expense {id}");
        }
        ExpenseCommand::List { format } => {
            print!("{}", render::expenses(&view.live.records(), format)?);
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Store]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Collection:         {}", config.store.collection);
                println!("  Expense collection: {}", config.store.expense_collection);
                println!("  Poll interval (ms): {}", config.store.poll_interval_ms);
                println!();
                println!("[Maps]");
                println!("  Provider host:      {}", config.maps.provider_host);
                let api_key = if config.maps.api_key.is_some() {
                    "set"
                } else {
                    "not set"
                };
                println!("  Directions API key: {api_key}");
                println!("  Travel mode:        {}", config.maps.travel_mode);
                println!();
                println!("[View]");
                println!("  Sort:               {}", config.view.sort);
                println!();
                println!("Platform: {}", platform::platform_name());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
