//! Offline translator - manage Argos language packages and translate with them
//!
//! Usage:
//!   offline-translator                               # Same as `serve`
//!   offline-translator serve                         # Start the HTTP server
//!   offline-translator languages                     # List installed languages
//!   offline-translator packages                      # Show the package checklist
//!   offline-translator sync "Englisch -> Deutsch"    # Install exactly these packages
//!   offline-translator translate Englisch Deutsch "Good morning"

use anyhow::{Context, Result};
use offline_translator::{
    catalog::{installed_language_names, ViewPreferences},
    config::Config,
    packages::{DirectoryPackageStore, HttpPackageIndex, PackageStore},
    reconcile::Reconciler,
    server::{self, AppState},
    translate::{CommandEngine, TranslationResolver},
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const USAGE: &str = "Usage: offline-translator [serve | languages | packages | sync <package>... | translate <from> <to> <text>]";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when the variables come from the environment)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("offline_translator=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None | Some("serve") => serve(&config).await,
        Some("languages") => languages(&config),
        Some("packages") => packages(&config).await,
        Some("sync") => sync(&config, &args[1..]).await,
        Some("translate") => match &args[1..] {
            [from, to, text @ ..] if !text.is_empty() => {
                translate(&config, from, to, &text.join(" ")).await
            }
            _ => anyhow::bail!("{}", USAGE),
        },
        Some(other) => anyhow::bail!("Unknown command '{}'. {}", other, USAGE),
    }
}

fn build_reconciler(
    config: &Config,
) -> Result<Reconciler<HttpPackageIndex, DirectoryPackageStore>> {
    let index = HttpPackageIndex::with_timeout(
        &config.package_index_url,
        config.downloads_dir(),
        Duration::from_secs(config.http_timeout_secs),
    )?;
    let store = DirectoryPackageStore::new(config.packages_dir());

    Ok(Reconciler::new(index, store, ViewPreferences::from(config))
        .with_management_enabled(config.enable_package_management))
}

async fn serve(config: &Config) -> Result<()> {
    let reconciler = build_reconciler(config)?;
    let engine = CommandEngine::new(&config.translate_command)?;

    if config.allow_remote && config.api_key.is_none() {
        warn!("Remote access is enabled without ARGOS_API_KEY; anyone can change packages");
    }
    if !config.enable_package_management {
        info!("Package management disabled, serving in read-only mode");
    }

    let state = Arc::new(AppState::new(reconciler, engine, config.api_key.clone()));
    server::serve(state, &config.bind_address()).await
}

fn languages(config: &Config) -> Result<()> {
    let store = DirectoryPackageStore::new(config.packages_dir());
    let installed = store.installed()?;

    if installed.is_empty() {
        println!("No language packages installed. Run `setup` or `offline-translator sync`.");
        return Ok(());
    }

    for name in installed_language_names(&installed) {
        println!("{}", name);
    }
    Ok(())
}

async fn packages(config: &Config) -> Result<()> {
    let mut reconciler = build_reconciler(config)?;
    let snapshot = reconciler.snapshot().await;

    for name in &snapshot.packages.choices {
        let mark = if snapshot.packages.selected.contains(name) {
            "x"
        } else {
            " "
        };
        println!("[{}] {}", mark, name);
    }
    Ok(())
}

async fn sync(config: &Config, names: &[String]) -> Result<()> {
    let desired: BTreeSet<String> = names.iter().cloned().collect();
    let mut reconciler = build_reconciler(config)?;

    let report = reconciler
        .reconcile(&desired, |progress| {
            println!(
                "[{:>3.0}%] {}",
                progress.fraction() * 100.0,
                progress.description
            );
        })
        .await;

    println!("{}", report.message);
    match report.error {
        Some(e) => Err(e).context("Package update did not complete"),
        None => Ok(()),
    }
}

async fn translate(config: &Config, from: &str, to: &str, text: &str) -> Result<()> {
    let store = DirectoryPackageStore::new(config.packages_dir());
    let engine = CommandEngine::new(&config.translate_command)?;
    let resolver = TranslationResolver::new(store, engine);

    let translated = resolver.translate(text, from, to).await?;
    println!("{}", translated);
    Ok(())
}
