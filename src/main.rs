//! Penguin Workshop - command line entry point

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use penguin_workshop::api::ApiClient;
use penguin_workshop::config::{Paths, ServerConfig};
use penguin_workshop::constants::*;
use penguin_workshop::icons::{self, Icon};
use penguin_workshop::migrate::migrate_creative_images;
use penguin_workshop::server::{self, AppState};
use penguin_workshop::types::ApiResponse;
use penguin_workshop::utils::encode_data_url;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "penguin-workshop", version, about)]
struct Cli {
    /// Directory holding input/, output/, data/ and creative_images/
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the local backend
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Desktop save target; remembered in server.json for later runs
        #[arg(long)]
        desktop_dir: Option<String>,
    },
    /// Query a running backend's status
    Status {
        /// API base URL
        #[arg(long)]
        api: Option<String>,
    },
    /// Upload an image file to a running backend
    Save {
        file: PathBuf,
        /// Store under input/ instead of output/
        #[arg(long, conflicts_with = "desktop")]
        input: bool,
        /// Store on the desktop instead of output/
        #[arg(long)]
        desktop: bool,
        #[arg(long)]
        filename: Option<String>,
        #[arg(long)]
        api: Option<String>,
    },
    /// Move inline base64 idea images into creative_images/
    MigrateImages,
    /// Print an icon as SVG, or rasterize it to PNG
    Icon {
        /// moon, sun, save, cpu, info or external-link
        name: String,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        png: Option<PathBuf>,
        #[arg(long, default_value_t = 64)]
        size: u32,
        #[arg(long, default_value = "#e4e4e7")]
        color: String,
    },
}

/// Initialize file + console logging. Returns a guard that must be held for the process lifetime.
fn init_logging(base_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let logs_dir = base_dir.join(LOGS_DIR);
    std::fs::create_dir_all(&logs_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "penguin-workshop.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,penguin_workshop=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true),
        )
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    guard
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn check<T>(response: &ApiResponse<T>) -> anyhow::Result<()> {
    if response.success {
        Ok(())
    } else {
        bail!(response.error.clone().unwrap_or_else(|| "request failed".into()))
    }
}

/// Load `server.json` and apply command line overrides. Host and port apply to
/// this run only; a new desktop directory is persisted.
fn server_config(
    base_dir: &Path,
    host: Option<String>,
    port: Option<u16>,
    desktop_dir: Option<String>,
) -> ServerConfig {
    let mut config = ServerConfig::load(base_dir);
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = desktop_dir {
        info!(desktop = %dir, "Desktop directory updated");
        let mut saved = ServerConfig::load(base_dir);
        saved.desktop_dir = Some(dir.clone());
        saved.save(base_dir);
        config.desktop_dir = Some(dir);
    }
    config
}

async fn run_server(base_dir: &Path, config: ServerConfig) -> anyhow::Result<()> {
    let paths = Paths::from_config(base_dir, &config);
    let state = AppState::new(paths.clone());
    state
        .store
        .init()
        .with_context(|| format!("initializing {}", base_dir.display()))?;

    let listener = server::bind(&config.addr())
        .await
        .with_context(|| format!("binding {}", config.addr()))?;
    info!(
        input = %paths.input.display(),
        output = %paths.output.display(),
        data = %paths.data.display(),
        "Penguin Workshop backend ready, press Ctrl+C to stop"
    );

    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    })
    .await?;

    info!("Backend stopped");
    Ok(())
}

async fn save_file(
    client: &ApiClient,
    file: &Path,
    input: bool,
    desktop: bool,
    filename: Option<String>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let format = image::guess_format(&bytes)
        .map_err(|e| anyhow!("{} is not a recognized image: {}", file.display(), e))?;
    let image_data = encode_data_url(format.to_mime_type(), &bytes);

    let filename = filename.or_else(|| {
        file.file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
    });
    let filename = filename.as_deref();

    let response = if desktop {
        client.save_desktop_image(&image_data, filename).await
    } else if input {
        client.save_input_image(&image_data, filename).await
    } else {
        client.save_output_image(&image_data, filename).await
    };
    print_json(&response)?;
    check(&response)
}

fn render_icon(
    name: &str,
    class: Option<&str>,
    png: Option<&Path>,
    size: u32,
    color: &str,
) -> anyhow::Result<()> {
    let icon = Icon::from_name(name).ok_or_else(|| {
        let names: Vec<_> = Icon::ALL.iter().map(|i| i.name()).collect();
        anyhow!("unknown icon '{}', expected one of: {}", name, names.join(", "))
    })?;

    let Some(out) = png else {
        println!("{}", icon.render(class));
        return Ok(());
    };

    let pixels = icons::rasterize(icon, size, color).map_err(|e| anyhow!(e))?;
    let img = image::RgbaImage::from_raw(size, size, pixels)
        .ok_or_else(|| anyhow!("rasterized buffer does not match {}x{}", size, size))?;
    img.save(out)
        .with_context(|| format!("writing {}", out.display()))?;
    info!(icon = icon.name(), path = %out.display(), size, "Icon written");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let base_dir = match cli.base_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolving current directory")?,
    };

    // Initialize logging - guard must live for entire process lifetime
    let _log_guard = init_logging(&base_dir);
    info!(version = APP_VERSION, "Penguin Workshop starting");

    let client_for = |api: Option<String>| api.map(ApiClient::new).unwrap_or_default();

    match cli.command {
        Command::Serve {
            host,
            port,
            desktop_dir,
        } => run_server(&base_dir, server_config(&base_dir, host, port, desktop_dir)).await,
        Command::Status { api } => {
            let response = client_for(api).get_server_status().await;
            print_json(&response)?;
            check(&response)
        }
        Command::Save {
            file,
            input,
            desktop,
            filename,
            api,
        } => save_file(&client_for(api), &file, input, desktop, filename).await,
        Command::MigrateImages => {
            let config = ServerConfig::load(&base_dir);
            let report = migrate_creative_images(Paths::from_config(&base_dir, &config))?;
            println!(
                "migrated: {}, skipped: {}, errors: {}",
                report.migrated, report.skipped, report.errors
            );
            Ok(())
        }
        Command::Icon {
            name,
            class,
            png,
            size,
            color,
        } => render_icon(&name, class.as_deref(), png.as_deref(), size, &color),
    }
}
