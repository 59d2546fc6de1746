//! Waterlily CLI - pay for Stable Diffusion jobs and collect the images
//!
//! # Main Commands
//!
//! ```bash
//! waterlily artists                               # List artist styles
//! waterlily connect                               # Connect the wallet
//! waterlily generate --artist 3 --prompt "a cat"  # Pay for a job and wait for images
//! waterlily images                                # Jobs of the connected account
//! waterlily download 42                           # Save the images of job 42
//! waterlily serve                                 # Start HTTP server (port 3000)
//! waterlily networks                              # Show known networks
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use waterlily::{
    render_artist_card, render_image_card, render_image_record, render_prompt, render_snackbar,
    render_status, server::AppState, wallet_button_label, AppConfig, ArtistCatalog,
    CompletionPolicy, ImageStore, JobOrchestrator, Network, RpcClient, StatusEvent, StatusStore,
    RpcError, SubmitControl, WalletConnector,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "waterlily")]
#[command(about = "Generate AI art in the style of consenting artists, paid on the FVM", long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Settings that take precedence over `WATERLILY_*` variables.
#[derive(Args)]
struct Overrides {
    /// Network: testnet or mainnet
    #[arg(long, global = true)]
    network: Option<Network>,

    /// Wallet JSON-RPC endpoint
    #[arg(long, global = true)]
    wallet_url: Option<String>,

    /// Node used for contract reads (defaults to the network's RPC)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Where downloaded images are written
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the artist styles
    Artists,

    /// Connect the wallet and show its accounts
    Connect,

    /// Pay for a job and wait for its images
    Generate {
        /// Artist id (see `waterlily artists`)
        #[arg(short, long)]
        artist: String,

        /// Text prompt
        #[arg(short, long)]
        prompt: String,

        /// Poll the contract for completion instead of watching the image host
        #[arg(long)]
        poll: bool,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "600")]
        timeout: u64,

        /// Return once the transaction is mined
        #[arg(long)]
        no_wait: bool,

        /// Download the images once they exist
        #[arg(short, long)]
        download: bool,
    },

    /// List the jobs of the connected account
    Images,

    /// Download the images of a job
    Download {
        /// Job id
        job_id: u64,

        /// Prompt used for file names (looked up on the contract if omitted)
        #[arg(short, long)]
        prompt: Option<String>,

        /// Artist id used for the folder name
        #[arg(short, long)]
        artist: Option<String>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Show the known networks
    Networks,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match load_config(&cli.overrides) {
        Ok(config) => match cli.command {
            Commands::Artists => cmd_artists(),
            Commands::Connect => cmd_connect(config).await,
            Commands::Generate {
                artist,
                prompt,
                poll,
                timeout,
                no_wait,
                download,
            } => {
                let options = GenerateOptions {
                    poll,
                    timeout: Duration::from_secs(timeout),
                    wait: !no_wait,
                    download,
                };
                cmd_generate(config, &artist, &prompt, options).await
            }
            Commands::Images => cmd_images(config).await,
            Commands::Download {
                job_id,
                prompt,
                artist,
            } => cmd_download(config, job_id, prompt, artist).await,
            Commands::Serve { port } => cmd_serve(config, port).await,
            Commands::Networks => cmd_networks(),
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(overrides: &Overrides) -> Result<AppConfig, waterlily::ConfigError> {
    let mut config = AppConfig::from_env()?;
    if let Some(network) = overrides.network {
        config.network = network;
    }
    if let Some(url) = &overrides.wallet_url {
        config.wallet_url = Some(url.clone());
    }
    if let Some(url) = &overrides.rpc_url {
        config.rpc_url = Some(url.clone());
    }
    if let Some(dir) = &overrides.download_dir {
        config.download_dir = dir.clone();
    }
    Ok(config)
}

/// Wallet for signing, the network's node for reads.
fn build_orchestrator(config: AppConfig) -> Result<JobOrchestrator<RpcClient>, RpcError> {
    let provider = config.wallet_url.as_deref().map(RpcClient::new).transpose()?;
    let reader = RpcClient::new(config.rpc_url())?;
    log::debug!("Contract reads via {}", reader.url());

    let wallet = Arc::new(WalletConnector::new(provider));
    let images = ImageStore::from_config(&config);
    Ok(JobOrchestrator::new(config, wallet, StatusStore::new(), images).with_reader(reader))
}

/// Connect the wallet, printing the wallet button state.
async fn connect(orch: &JobOrchestrator<RpcClient>) -> CliResult {
    eprintln!("🔌 {}...", wallet_button_label(&orch.wallet().state()));
    let state = orch.wallet().connect().await?;
    eprintln!("✅ {}: {}", wallet_button_label(&state), state.accounts.join(", "));
    Ok(())
}

/// Print status and snackbar changes as they happen.
fn follow_status(status: &StatusStore) -> tokio::task::JoinHandle<()> {
    let mut rx = status.subscribe();
    tokio::spawn(async move {
        let mut last_banner = String::new();
        loop {
            match rx.recv().await {
                Ok(StatusEvent::Status { state, .. }) => {
                    let banner = render_status(&state);
                    if !banner.is_empty() && banner != last_banner {
                        eprintln!("{}", banner);
                        last_banner = banner;
                    }
                }
                Ok(StatusEvent::Snackbar { snackbar, .. }) => {
                    if let Some(line) = render_snackbar(&snackbar) {
                        eprintln!("{}", line);
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn cmd_artists() -> CliResult {
    let catalog = ArtistCatalog::builtin();
    eprintln!("🎨 {} artists\n", catalog.len());
    for artist in catalog.all() {
        println!("{}", render_artist_card(artist));
    }
    Ok(())
}

async fn cmd_connect(config: AppConfig) -> CliResult {
    let orch = build_orchestrator(config)?;
    connect(&orch).await?;

    let expected = orch.config().endpoints();
    match orch.wallet().chain_id().await {
        Ok(chain_id) if chain_id == expected.chain_id => {
            eprintln!("   Network: {} ({})", expected.name, chain_id)
        }
        Ok(chain_id) => eprintln!(
            "⚠️  Wallet is on chain {}, expected {} ({})",
            chain_id, expected.name, expected.chain_id
        ),
        Err(e) => log::warn!("Could not read chain id: {}", e),
    }

    let images = orch.load_customer_images().await?;
    eprintln!("   {} previous jobs", images.len());
    Ok(())
}

struct GenerateOptions {
    poll: bool,
    timeout: Duration,
    wait: bool,
    download: bool,
}

async fn cmd_generate(config: AppConfig, artist_id: &str, prompt: &str, options: GenerateOptions) -> CliResult {
    let catalog = ArtistCatalog::builtin();
    let artist = catalog
        .find(artist_id)
        .cloned()
        .ok_or_else(|| format!("Unknown artist: {} (see `waterlily artists`)", artist_id))?;

    let poll_interval = config.poll_interval;
    let mut orch = build_orchestrator(config)?;
    if options.poll {
        orch = orch.with_completion(CompletionPolicy::Poll {
            interval: poll_interval,
            timeout: options.timeout,
        });
    }

    if orch.wallet().is_available() {
        connect(&orch).await?;
    }

    let control = SubmitControl::from_state(&orch.status().snapshot(), &orch.wallet().state());
    if control.disabled && orch.wallet().is_available() {
        return Err("Wallet is not connected".into());
    }

    orch.images().set_prompt(prompt);
    orch.images().set_artist(artist);
    eprintln!("{}", render_prompt(&orch.images().snapshot()));

    let printer = follow_status(orch.status());
    let submission = orch.run_stable_diffusion_job(prompt, artist_id).await;
    let submission = match submission {
        Ok(submission) => submission,
        Err(e) => {
            printer.abort();
            return Err(e.into());
        }
    };

    if options.wait && !options.poll && !orch.watch_images(options.timeout).await {
        orch.abandon()?;
    }
    // Let the printer drain the last events
    tokio::time::sleep(Duration::from_millis(50)).await;
    printer.abort();

    let Some(job_id) = submission.predicted_job_id else {
        return Ok(());
    };
    let urls = orch.images().available_images(job_id).await?;
    if urls.is_empty() {
        eprintln!("\n🖼️  No images yet for job {}", job_id);
        return Ok(());
    }

    eprintln!("\n🖼️  Job {}: {} images", job_id, urls.len());
    for (index, url) in urls.iter().enumerate() {
        let (folder, filename) = orch.images().download_names(index);
        println!("{}", render_image_card(index, url, &filename));
        if options.download {
            let path = orch.images().download_image(url, &folder, &filename).await?;
            eprintln!("   💾 {}", path.display());
        }
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

async fn cmd_images(config: AppConfig) -> CliResult {
    let orch = build_orchestrator(config)?;
    connect(&orch).await?;

    let images = orch.load_customer_images().await?;
    if images.is_empty() {
        eprintln!("📋 No jobs for this account yet.");
        return Ok(());
    }

    eprintln!("📋 {} jobs:\n", images.len());
    for record in &images {
        println!("{}", render_image_record(record));
    }
    Ok(())
}

async fn cmd_download(
    config: AppConfig,
    job_id: u64,
    prompt: Option<String>,
    artist_id: Option<String>,
) -> CliResult {
    let orch = build_orchestrator(config)?;

    let (prompt, artist_id) = match prompt {
        Some(prompt) => (prompt, artist_id),
        None => {
            // File names come from the job's prompt as stored on the contract
            let record = orch.image_record(job_id).await?;
            (record.prompt, artist_id.or(Some(record.artist)))
        }
    };

    orch.images().set_prompt(prompt);
    if let Some(artist) = artist_id.and_then(|id| ArtistCatalog::builtin().find(&id).cloned()) {
        orch.images().set_artist(artist);
    }

    let urls = orch.images().available_images(job_id).await?;
    if urls.is_empty() {
        return Err(format!("No images found for job {}", job_id).into());
    }

    eprintln!("📥 Downloading {} images of job {}", urls.len(), job_id);
    for (index, url) in urls.iter().enumerate() {
        let (folder, filename) = orch.images().download_names(index);
        let path = orch.images().download_image(url, &folder, &filename).await?;
        eprintln!("   💾 {}", path.display());
    }
    eprintln!("✅ Saved to {}", orch.images().download_dir().display());
    Ok(())
}

async fn cmd_serve(config: AppConfig, port: u16) -> CliResult {
    let orch = build_orchestrator(config)?;
    if orch.wallet().is_available() {
        // Pick up an existing grant; connecting is left to the user
        if let Err(e) = orch.wallet().restore().await {
            log::warn!("Wallet not reachable: {}", e);
        }
    } else {
        eprintln!("⚠️  No wallet configured (WATERLILY_WALLET_URL); jobs will fail");
    }

    let state = AppState::new(orch, ArtistCatalog::builtin());
    waterlily::server::start_server(port, state).await?;
    Ok(())
}

fn cmd_networks() -> CliResult {
    for network in [Network::Testnet, Network::Mainnet] {
        let endpoints = network.endpoints();
        println!("🌐 {} ({})", network, endpoints.name);
        println!("   Chain ID: {}", endpoints.chain_id);
        println!("   RPC:      {}", endpoints.rpc.join(", "));
        println!("   Explorer: {}", endpoints.block_explorer.join(", "));
        println!();
    }
    Ok(())
}
