use r_medialist::catalog::CatalogClient;
use r_medialist::config::Settings;
use r_medialist::coordinator::{Collaborators, Coordinator, CoordinatorHandle, CoordinatorOptions, DownloadOutcome, PlayOutcome};
use r_medialist::download::{FileSinkProvider, HttpByteSource};
use r_medialist::init_app_dirs;
use r_medialist::playback::SymphoniaBackend;
use r_medialist::store::ItemKey;
use r_medialist::ui::{format_list, Cli, ProgressBoard, ReplCommand, HELP_TEXT};
use std::error::Error;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_TARGET: &str = "r_medialist::main";

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Fetches the catalog and hands it to the coordinator.
async fn reload_catalog(client: &CatalogClient, handle: &CoordinatorHandle) -> Result<(), Box<dyn Error>> {
    let records = client.fetch().await?;
    info!(target: LOG_TARGET, "Fetched {} catalog records", records.len());
    handle.load_catalog(records).await?;
    Ok(())
}

fn key_for(handle: &CoordinatorHandle, command: &ReplCommand) -> Result<ItemKey, Box<dyn Error>> {
    let position = command.position().ok_or("command does not target an item")?;
    handle
        .key_at(position)
        .ok_or_else(|| format!("No item {}. Type 'list' to see the items", position + 1).into())
}

/// Runs one command. Returns `false` when the user asked to quit.
async fn execute(
    command: ReplCommand,
    handle: &CoordinatorHandle,
    client: &CatalogClient,
    board: &Mutex<ProgressBoard>,
) -> Result<bool, Box<dyn Error>> {
    match &command {
        ReplCommand::List => println!("{}", format_list(&handle.snapshot_all())),
        ReplCommand::Help => println!("{}", HELP_TEXT),
        ReplCommand::Reload => reload_catalog(client, handle).await?,
        ReplCommand::Quit => return Ok(false),
        ReplCommand::Play(_) => match handle.request_play(key_for(handle, &command)?).await? {
            PlayOutcome::Preparing => board.lock().await.println("Starting playback"),
            PlayOutcome::Stopped => board.lock().await.println("Stopped"),
        },
        ReplCommand::Stop(n) => {
            if !handle.request_stop(key_for(handle, &command)?).await? {
                board.lock().await.println(format!("Item {} is not playing", n));
            }
        }
        ReplCommand::Download(n) => match handle.request_download(key_for(handle, &command)?).await? {
            DownloadOutcome::Started => {}
            DownloadOutcome::AlreadyInProgress => board.lock().await.println(format!("Item {} is already downloading", n)),
            DownloadOutcome::AlreadyCompleted => board.lock().await.println(format!("Item {} is already downloaded", n)),
        },
        ReplCommand::Seek(_, percent) => {
            let target = handle.seek(key_for(handle, &command)?, *percent).await?;
            board.lock().await.println(format!("Seeked to {:.1}s", target.as_secs_f64()));
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    // Parse command-line arguments and initialize CLI
    let cli = Cli::new();
    let args = &cli.args;

    init_app_dirs()?;

    let config_path = args.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&config_path)?;
    if let Some(url) = &args.catalog_url {
        settings.catalog_url = url.clone();
    }
    if let Some(dir) = &args.download_dir {
        settings.download_dir = dir.clone();
    }
    settings.validate()?;
    info!(target: LOG_TARGET, "Using catalog {}", settings.catalog_url);

    let timeout = settings.http_timeout();
    let collaborators = Collaborators {
        backend: Arc::new(SymphoniaBackend::new(timeout)),
        byte_source: Arc::new(HttpByteSource::new(timeout)),
        sinks: Arc::new(FileSinkProvider::new(settings.download_dir.clone())),
    };
    let (coordinator, handle) = Coordinator::new(collaborators, CoordinatorOptions::from_settings(&settings));
    let coordinator_task = coordinator.spawn();

    let board = Arc::new(Mutex::new(ProgressBoard::new()));
    let mut events = handle.subscribe();
    let render_board = board.clone();
    let render_store = handle.store().clone();
    let renderer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => render_board.lock().await.apply(&event, &render_store),
                Err(RecvError::Lagged(skipped)) => warn!(target: LOG_TARGET, "Renderer skipped {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let client = CatalogClient::new(&settings.catalog_url, timeout);
    println!("Fetching catalog...");
    match reload_catalog(&client, &handle).await {
        Ok(()) => println!("{}", format_list(&handle.snapshot_all())),
        Err(e) => cli.display_error(&*e),
    }
    println!("{}", HELP_TEXT);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match ReplCommand::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                cli.display_error(&e);
                continue;
            }
        };
        match execute(command, &handle, &client, &board).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => cli.display_error(&*e),
        }
    }

    info!(target: LOG_TARGET, "Shutting down");
    handle.shutdown().await;
    coordinator_task.await?;
    renderer.abort();
    Ok(())
}
