//! l2tp-ipsec - L2TP/IPsec VPN server provisioning
//!
//! Picks the host's public and private IPv4 addresses from its interfaces,
//! renders the ipsec, xl2tpd and pppd configuration, installs the packages
//! and restarts the daemons whose configuration changed.

mod attributes;
mod config;
mod error;
mod recipe;
mod render;
mod system;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use attributes::Attributes;
use config::Config;
use recipe::ApplyOptions;
use system::InterfaceInventory;

#[derive(Parser)]
#[command(name = "l2tp-ipsec")]
#[command(version, about = "Installs and configures an L2TP/IPsec VPN server")]
struct Cli {
    /// Config file (default: ~/.config/l2tp-ipsec/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read the interface inventory from a JSON file instead of `ip -j addr`.
    #[arg(long, global = true)]
    inventory: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the resolved public and private addresses.
    Resolve,
    /// Print every generated file to stdout.
    Render,
    /// Install packages, write files and restart changed services.
    Apply {
        /// Log actions without performing them.
        #[arg(long)]
        dry_run: bool,
        /// Write files under this directory instead of `/`; packages and
        /// services are left untouched.
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let inventory = load_inventory(cli.inventory).await?;
    if inventory.is_empty() {
        tracing::warn!("Interface inventory is empty");
    } else {
        tracing::debug!("Inventory has {} interface(s)", inventory.len());
    }
    let attrs = Attributes::resolve(&config, &inventory).context("Invalid interface setting")?;

    match cli.cmd {
        Cmd::Resolve => {
            println!("public_ip={}", attrs.public_ip.as_deref().unwrap_or(""));
            println!("private_ip={}", attrs.private_ip.as_deref().unwrap_or(""));
        }
        Cmd::Render => {
            for resource in recipe::files(&config, &attrs) {
                println!("==> {} <==", resource.file.path.display());
                print!("{}", resource.file.content);
            }
        }
        Cmd::Apply { dry_run, root } => {
            if !dry_run && root.is_none() && !is_root() {
                bail!("This command must be run as root (sudo), or with --dry-run");
            }
            if attrs.public_ip.is_none() {
                tracing::warn!(
                    "No global IPv4 address on public interface {}; rendering an empty listen address",
                    config.public_interface
                );
            }

            let options = ApplyOptions {
                dry_run,
                root: root.as_deref(),
            };
            recipe::apply(&config, &attrs, &options)
                .await
                .context("Converge failed")?;
        }
    }

    Ok(())
}

async fn load_inventory(path: Option<PathBuf>) -> Result<InterfaceInventory> {
    match path {
        Some(path) => system::load_inventory(&path)
            .with_context(|| format!("Failed to read inventory {}", path.display())),
        None => system::collect_inventory()
            .await
            .context("Failed to enumerate interfaces"),
    }
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}
