//! `moodboard`: compose a board from image URLs and pasted files, flatten it to
//! a PNG, and optionally publish it.

mod config;
mod loader;
mod publish;
mod session;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use scene::consts::{DEFAULT_EXPORT_PX, MAX_EXPORT_SIDE_PX};
use scene::doc::SceneError;
use scene::engine::EngineCore;
use scene::notice::NoticeKind;
use tracing::{info, warn};

use crate::config::{ConfigError, ServiceConfig};
use crate::loader::{HttpFetcher, LoadError, LoadQueue};
use crate::publish::{HttpPublisher, PublishError};
use crate::session::{Session, SessionError};

/// Extra time allowed past the per-load timeout before giving up on a batch.
const SETTLE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("loader setup failed: {0}")]
    Load(#[from] LoadError),
    #[error("publisher setup failed: {0}")]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid canvas: {0}")]
    Scene(#[from] SceneError),
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to write viewport: {0}")]
    Viewport(#[from] image::ImageError),
}

#[derive(Parser, Debug)]
#[command(name = "moodboard", about = "Compose, export and publish moodboards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a board headlessly and write the flattened PNG.
    Compose(ComposeArgs),
}

#[derive(Args, Debug)]
struct ComposeArgs {
    #[arg(long, env = "MOODBOARD_TITLE", default_value = "")]
    title: String,

    #[arg(long = "image", help = "Image URL; repeat for several")]
    images: Vec<String>,

    #[arg(long = "paste", help = "Local image file placed as a pasted image; repeatable")]
    pasted: Vec<PathBuf>,

    #[arg(long, default_value = "800x600", help = "Working canvas size, WIDTHxHEIGHT")]
    canvas: CanvasSize,

    #[arg(long, default_value_t = DEFAULT_EXPORT_PX, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_EXPORT_SIDE_PX)))]
    export_size: u32,

    #[arg(long, help = "Background colour, #rgb or #rrggbb")]
    background: Option<String>,

    #[arg(long, default_value = "moodboard.png")]
    out: PathBuf,

    #[arg(long, help = "Also write the interactive viewport (canvas size, selection outline) here")]
    viewport: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Arrange objects in a grid before export")]
    grid: bool,

    #[arg(long, default_value_t = false)]
    publish: bool,

    #[arg(long, env = "MOODBOARD_PUBLISH_URL")]
    publish_url: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct CanvasSize {
    width: f64,
    height: f64,
}

impl FromStr for CanvasSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s.split_once(['x', 'X']).ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
        let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("{v:?}: {e}"));
        Ok(Self { width: parse(w)?, height: parse(h)? })
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compose(args) => run_compose(args).await,
    }
}

async fn run_compose(args: ComposeArgs) -> Result<(), CliError> {
    let mut config = ServiceConfig::from_env()?;
    if let Some(url) = args.publish_url {
        config.publish_url = url;
        config.validate()?;
    }

    let fetcher = Arc::new(HttpFetcher::new(&config)?);
    let loads = LoadQueue::new(fetcher, config.load_timeout(), config.load_queue_capacity);
    let engine = EngineCore::new(args.canvas.width, args.canvas.height)?;
    let mut session = Session::new(engine, loads);
    session.set_title(args.title);

    if let Some(color) = &args.background {
        session.try_run(|engine| engine.set_background(color))?;
    }

    for path in &args.pasted {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| CliError::Read { path: path.clone(), source })?;
        if let Err(e) = session.paste_image(&bytes) {
            warn!(path = %path.display(), error = %e, "skipping pasted file");
        }
    }
    for url in &args.images {
        session.request_image(url);
    }
    let added = session.settle(config.load_timeout() + SETTLE_GRACE).await;
    info!(added, requested = args.images.len(), pending = session.pending_loads(), "image loads settled");

    if args.grid {
        session.run(EngineCore::arrange_grid);
    }
    log_notices(&mut session);

    if let Some(path) = &args.viewport {
        if session.take_redraw() {
            session.engine().render_viewport().save(path)?;
            info!(path = %path.display(), "viewport written");
        }
    }

    let composite = session.export(args.export_size, args.export_size);
    log_notices(&mut session);
    tokio::fs::write(&args.out, &composite.png)
        .await
        .map_err(|source| CliError::Write { path: args.out.clone(), source })?;
    info!(
        path = %args.out.display(),
        bytes = composite.png.len(),
        placeholder = composite.fallback,
        "composite written"
    );

    if args.publish {
        let publisher = HttpPublisher::new(&config)?;
        info!(
            title = session.title(),
            products = session.product_links().len(),
            endpoint = %config.publish_url,
            "publishing"
        );
        let result = session.publish(&publisher, args.export_size, args.export_size).await;
        log_notices(&mut session);
        let receipt = result?;
        println!("{}", receipt.public_url);
    }
    if session.is_alive() {
        session.close();
    }
    Ok(())
}

fn log_notices(session: &mut Session) {
    for notice in session.take_notices() {
        match notice.kind {
            NoticeKind::Error => warn!(message = %notice.message, "notice"),
            NoticeKind::Success | NoticeKind::Info => info!(message = %notice.message, "notice"),
        }
    }
}
