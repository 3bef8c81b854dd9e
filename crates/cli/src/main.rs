//! Drive Command Line Interface
//!
//! Upload images, share galleries and view what others have shared, against
//! a running drive node.

mod keyfile;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use drive_registry::RegistryClient;
use drive_sdk::{
    resolve_to_gateway, GalleryAdapter, GalleryView, HttpRegistryClient, PinataPinner,
    UploadFile, DEFAULT_GATEWAY_URL,
};
use drive_types::{generate_signing_key, Address};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Parser)]
#[command(name = "drive-cli")]
#[command(about = "Drive image gallery command line interface", long_about = None)]
#[command(version)]
struct Cli {
    /// RPC endpoint URL
    #[arg(long, alias = "rpc", env = "DRIVE_RPC_URL", default_value = "http://127.0.0.1:8645")]
    rpc_url: String,

    /// Path to the signing keyfile
    #[arg(long, env = "DRIVE_KEY_FILE", default_value = "drive.key", value_name = "PATH")]
    key_file: PathBuf,

    /// Gateway used to turn ipfs:// references into links
    #[arg(long, env = "DRIVE_GATEWAY_URL", default_value = DEFAULT_GATEWAY_URL)]
    gateway: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signing key
    Keygen {
        /// Where to write the keyfile (defaults to --key-file)
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
        /// Overwrite an existing keyfile
        #[arg(long)]
        force: bool,
    },
    /// Print the address of the configured key
    Address,
    /// Pin an image and publish it to your gallery
    Upload(UploadCommand),
    /// Publish an already pinned content reference
    Publish {
        /// Content reference, e.g. ipfs://<cid>
        reference: String,
    },
    /// Allow another address to view your gallery
    Grant {
        /// Address to grant access to
        address: String,
    },
    /// Show a gallery (your own when no address is given)
    List {
        /// Gallery owner address
        address: Option<String>,
    },
    /// Show the addresses you have granted access to
    Grantees,
}

#[derive(Args)]
struct UploadCommand {
    /// Image file to upload
    file: PathBuf,
    /// MIME type (guessed from the extension when omitted)
    #[arg(long)]
    mime: Option<String>,
    #[arg(long, env = "DRIVE_PINATA_API_KEY", hide_env_values = true)]
    pinata_api_key: String,
    #[arg(long, env = "DRIVE_PINATA_SECRET_API_KEY", hide_env_values = true)]
    pinata_secret_api_key: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { ref out, force } => {
            handle_keygen(out.as_deref().unwrap_or(&cli.key_file), force)
        }
        Commands::Address => {
            let key = keyfile::read_key(&cli.key_file)?;
            println!("{}", Address::from(&key.verifying_key()));
            Ok(())
        }
        Commands::Upload(ref cmd) => handle_upload(&cli, cmd).await,
        Commands::Publish { ref reference } => handle_publish(&cli, reference).await,
        Commands::Grant { ref address } => handle_grant(&cli, address).await,
        Commands::List { ref address } => handle_list(&cli, address.as_deref()).await,
        Commands::Grantees => handle_grantees(&cli).await,
    }
}

fn connect(cli: &Cli) -> Result<HttpRegistryClient> {
    let key = keyfile::read_key(&cli.key_file)?;
    let client = HttpRegistryClient::new(&cli.rpc_url)
        .with_context(|| format!("invalid RPC URL {}", cli.rpc_url))?;
    debug!(
        rpc_url = %cli.rpc_url,
        caller = %Address::from(&key.verifying_key()),
        "connecting to registry"
    );
    Ok(client.with_signing_key(key))
}

fn handle_keygen(path: &Path, force: bool) -> Result<()> {
    let key = generate_signing_key();
    keyfile::write_key(path, &key, force)?;
    println!("Key written to {}", path.display());
    println!("Address: {}", Address::from(&key.verifying_key()));
    Ok(())
}

async fn handle_upload(cli: &Cli, cmd: &UploadCommand) -> Result<()> {
    let mime = match &cmd.mime {
        Some(mime) => mime.clone(),
        None => guess_mime(&cmd.file)
            .with_context(|| format!("cannot tell the image type of {}; pass --mime", cmd.file.display()))?
            .to_string(),
    };
    let bytes =
        fs::read(&cmd.file).with_context(|| format!("failed to read {}", cmd.file.display()))?;
    let name = cmd
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let pinner = PinataPinner::new(&cmd.pinata_api_key, &cmd.pinata_secret_api_key)?;
    let adapter = GalleryAdapter::new(Arc::new(connect(cli)?), Arc::new(pinner))
        .with_gateway(&cli.gateway);

    let outcome = adapter.upload(UploadFile::new(name, mime, bytes)).await?;
    println!("Published {} (entry #{})", outcome.content, outcome.receipt.index);
    println!("{}", resolve_to_gateway(&outcome.content, &cli.gateway));
    Ok(())
}

async fn handle_publish(cli: &Cli, reference: &str) -> Result<()> {
    let client = connect(cli)?;
    let receipt = client.publish(reference).await?;
    println!(
        "Published {reference} for {} (entry #{}, {} total)",
        receipt.owner, receipt.index, receipt.entries
    );
    Ok(())
}

async fn handle_grant(cli: &Cli, address: &str) -> Result<()> {
    let adapter = GalleryAdapter::read_only(Arc::new(connect(cli)?));
    let receipt = adapter.share(address).await?;
    if receipt.inserted {
        println!("Access granted to {}", receipt.grantee);
    } else {
        println!("{} already has access", receipt.grantee);
    }
    Ok(())
}

async fn handle_list(cli: &Cli, address: Option<&str>) -> Result<()> {
    let adapter = GalleryAdapter::read_only(Arc::new(connect(cli)?)).with_gateway(&cli.gateway);
    let view = adapter.view(address).await?;
    println!("{}", view.status_message());
    match view {
        GalleryView::Images { uris, .. } => {
            for uri in uris {
                println!("{uri}");
            }
            Ok(())
        }
        GalleryView::Empty { .. } => Ok(()),
        GalleryView::NoAccess { owner } => bail!("access to {owner} denied"),
        GalleryView::Retry { reason } => {
            warn!(%reason, "registry unavailable");
            bail!("registry unavailable, try again later")
        }
    }
}

async fn handle_grantees(cli: &Cli) -> Result<()> {
    let adapter = GalleryAdapter::read_only(Arc::new(connect(cli)?));
    let grantees = adapter.shared_with().await?;
    if grantees.is_empty() {
        println!("You have not shared your gallery with anyone yet.");
    }
    for grantee in grantees {
        println!("{grantee}");
    }
    Ok(())
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        _ => return None,
    };
    Some(mime)
}
