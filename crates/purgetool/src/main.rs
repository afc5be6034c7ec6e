//! `purgetool` - clean mail from chosen senders out of an IMAP mailbox.
//!
//! Terminal front end over `purgetool-core`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod app;
mod message;
mod options;
mod paths;
mod prompt;

use std::fs::{self, File, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use purgetool_core::{CacheStore, GoogleAuthority, SenderCache, SessionContext, Settings};
use purgetool_oauth::Provider;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use app::App;
use options::{JunkFolderChange, Options};
use paths::Paths;

const CLIENT_ID_VAR: &str = "PURGETOOL_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "PURGETOOL_CLIENT_SECRET";

fn main() -> Result<()> {
    let options = Options::parse();

    let paths = Paths::resolve();
    init_logging(&options, &paths);
    info!("Starting purgetool");

    let mut settings = Settings::load(&paths.settings_file());
    if let Some(change) = options.junk_folder_change() {
        apply_junk_folder(&mut settings, &change, &paths)?;
    }

    let cache = CacheStore::new(paths.cache_dir.clone());
    if options.clear_cache {
        let removed = cache.clear_all().context("Could not clear the cache")?;
        println!("Cleared {removed} cache entries.");
    }

    let config_store = paths.service_config();
    if options.logout {
        config_store.remove().context("Could not remove the saved session")?;
        println!("Logged out.");
        return Ok(());
    }

    let authority = authority()?;
    let provider = authority.provider().clone();
    let ctx = SessionContext::live(authority, options.debug);
    App::new(
        options,
        settings,
        ctx,
        provider,
        config_store,
        SenderCache::new(cache),
    )
    .run()
}

fn init_logging(options: &Options, paths: &Paths) {
    let default = if options.debug {
        "purgetool=debug,purgetool_core=debug,purgetool_imap=debug,purgetool_oauth=debug"
    } else {
        "purgetool=info,purgetool_core=info"
    };

    let (file_layer, file_error) = match open_log(paths) {
        Ok(file) => (
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            None,
        ),
        Err(err) => (None, Some(err)),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if let Some(err) = file_error {
        warn!("Logging to stderr only, could not open {}: {err}", paths.log_file().display());
    }
}

fn open_log(paths: &Paths) -> std::io::Result<File> {
    fs::create_dir_all(&paths.data_dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(paths.log_file())
}

fn apply_junk_folder(settings: &mut Settings, change: &JunkFolderChange, paths: &Paths) -> Result<()> {
    settings.junk_folder = match change {
        JunkFolderChange::Set(folder) => Some(folder.clone()),
        JunkFolderChange::Clear => None,
    };
    settings.validate()?;
    settings
        .save(&paths.settings_file())
        .context("Could not save settings")?;
    match &settings.junk_folder {
        Some(folder) => println!("Removed mail will be moved to '{folder}'."),
        None => println!("Removed mail will be deleted permanently."),
    }
    Ok(())
}

fn authority() -> Result<GoogleAuthority> {
    let authority = GoogleAuthority::new(Provider::google()?);
    Ok(match std::env::var(CLIENT_ID_VAR) {
        Ok(client_id) => authority.with_client(client_id, std::env::var(CLIENT_SECRET_VAR).ok()),
        Err(_) => {
            debug!("{CLIENT_ID_VAR} is not set; refresh relies on saved client ids");
            authority
        }
    })
}
