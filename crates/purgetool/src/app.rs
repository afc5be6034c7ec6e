//! Presentation loop.
//!
//! The loop runs on the thread that created the [`Dispatcher`]. Each tick it
//! drains finished tasks and queued owner-thread calls, then handles at most one
//! [`Message`]. Everything that touches the network runs in a task; prompts and
//! config bookkeeping stay on this thread.

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use purgetool_core::{
    CleanserService, CredentialSession, DEFAULT_MAILBOX, Dispatcher, OAuthSession, SenderCache,
    ServiceConfig, ServiceConfigStore, Session, SessionContext, Settings, restore,
    sorted_for_display,
};
use purgetool_oauth::{Provider, RelayFlow};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::message::Message;
use crate::options::Options;
use crate::prompt;

const TICK: Duration = Duration::from_millis(50);
const DEFAULT_PORT: u16 = 993;

/// Environment variable naming the authorization relay.
pub const AUTH_URL_VAR: &str = "PURGETOOL_AUTH_URL";

/// Outcome reported back to the loop. Errors are already user-facing text.
type Outcome<T> = std::result::Result<T, String>;

/// The one live session. Only one task uses it at a time.
type SessionSlot = Arc<Mutex<Option<Session>>>;

fn lock(slot: &SessionSlot) -> MutexGuard<'_, Option<Session>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn emit(events: &Sender<Message>, message: Message) {
    if events.send(message).is_err() {
        debug!("Presentation loop has stopped; dropping message");
    }
}

/// Prints a status line from any thread.
fn status(dispatcher: &Dispatcher, text: impl Into<String>) {
    let text = text.into();
    dispatcher.on_owner(move || println!("{text}"));
}

/// Last question before mail is deleted rather than moved.
fn delete_warning(senders: usize) -> String {
    let noun = if senders == 1 { "sender" } else { "senders" };
    format!("Are you sure? All e-mails from {senders} {noun} will be deleted permanently! [y/N] ")
}

/// Application state.
pub struct App {
    options: Options,
    settings: Settings,
    dispatcher: Dispatcher,
    ctx: SessionContext,
    provider: Provider,
    config: ServiceConfig,
    config_store: ServiceConfigStore,
    senders: SenderCache,
    session: SessionSlot,
    events: Sender<Message>,
    inbox: Receiver<Message>,
    running: bool,
}

impl App {
    /// Creates the application. Must be called on the thread that will run it.
    pub fn new(
        options: Options,
        settings: Settings,
        ctx: SessionContext,
        provider: Provider,
        config_store: ServiceConfigStore,
        senders: SenderCache,
    ) -> Self {
        let (events, inbox) = mpsc::channel();
        Self {
            options,
            settings,
            dispatcher: Dispatcher::new(),
            ctx,
            provider,
            config: ServiceConfig::default(),
            config_store,
            senders,
            session: Arc::new(Mutex::new(None)),
            events,
            inbox,
            running: true,
        }
    }

    /// Runs until the session is closed and no task is in flight.
    pub fn run(mut self) -> Result<()> {
        match self.config_store.load() {
            Some(saved) => {
                match ServiceConfig::from_value(saved.clone()) {
                    Ok(config) => self.config = config,
                    Err(err) => warn!("Ignoring unreadable service config: {err}"),
                }
                self.start_restore(saved);
            }
            None => {
                println!("Not logged in.");
                self.sign_in()?;
            }
        }

        loop {
            let processed = self.dispatcher.drain();
            match self.inbox.recv_timeout(TICK) {
                Ok(message) => {
                    self.update(message)?;
                    continue;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if !self.running && processed == 0 && self.dispatcher.in_flight() == 0 {
                break;
            }
        }
        Ok(())
    }

    fn update(&mut self, message: Message) -> Result<()> {
        match message {
            Message::Restored(Ok(true)) => {
                self.remember_session(false);
                self.load_senders();
            }
            Message::Restored(Ok(false)) => {
                println!("Not logged in.");
                self.sign_in()?;
            }
            Message::Restored(Err(err)) => {
                println!("Failed to connect to IMAP server: {err}");
                self.running = false;
            }
            Message::SignedIn(Ok(())) => {
                self.remember_session(true);
                self.load_senders();
            }
            Message::SignedIn(Err(err)) => {
                println!("Sign-in failed: {err}");
                if prompt::yes_no("Try again? [Y/n] ", true)? {
                    self.sign_in()?;
                } else {
                    self.running = false;
                }
            }
            Message::SendersLoaded(Ok(senders)) => {
                let chosen = self.choose_senders(&senders)?;
                if chosen.is_empty() {
                    println!("Nothing to remove.");
                    self.finish();
                } else if self.settings.junk_folder.is_none()
                    && !prompt::yes_no(&delete_warning(chosen.len()), false)?
                {
                    println!("Nothing removed.");
                    self.finish();
                } else {
                    self.start_cleanse(chosen);
                }
            }
            Message::SendersLoaded(Err(err)) => {
                println!("{err}");
                self.finish();
            }
            Message::Cleansed(Ok(removed)) => {
                let action = if self.settings.junk_folder.is_some() {
                    "Moved"
                } else {
                    "Deleted"
                };
                println!("{action} {removed} messages.");
                self.finish();
            }
            Message::Cleansed(Err(err)) => {
                println!("Cleanup failed: {err}");
                self.finish();
            }
            Message::LoggedOut => self.running = false,
        }
        Ok(())
    }

    fn start_restore(&self, saved: Value) {
        let ctx = self.ctx.clone();
        let slot = Arc::clone(&self.session);
        let dispatcher = self.dispatcher.clone();
        let events = self.events.clone();

        self.dispatcher
            .task(move || -> Outcome<bool> {
                status(&dispatcher, "Connecting...");
                let session = restore(&saved, &ctx).map_err(|err| err.to_string())?;
                let found = session.is_some();
                *lock(&slot) = session;
                Ok(found)
            })
            .run()
            .then(move |restored| emit(&events, Message::Restored(restored)));
    }

    /// Stores the live session in the service config.
    ///
    /// A new session becomes the active account. A restored one only has its
    /// secrets refreshed.
    fn remember_session(&mut self, new: bool) {
        let guard = lock(&self.session);
        let Some(session) = guard.as_ref() else {
            return;
        };
        let recorded = if new {
            self.config.record_session(session).map(|_| true)
        } else {
            self.config.refresh_active(session)
        };
        match recorded {
            Ok(true) => {
                if let Err(err) = self.config_store.save(&self.config) {
                    warn!("Could not save service config: {err}");
                }
            }
            Ok(false) => {}
            Err(err) => warn!("Could not record session: {err}"),
        }
    }

    fn sign_in(&mut self) -> Result<()> {
        println!("How would you like to sign in?");
        println!("  1) Google account (opens your browser)");
        println!("  2) Another IMAP server, with a password");
        loop {
            let Some(choice) = prompt::required("Choice [1/2]: ")? else {
                self.running = false;
                return Ok(());
            };
            match choice.as_str() {
                "1" => return self.sign_in_google(),
                "2" => return self.sign_in_password(),
                other => println!("Invalid choice '{other}'."),
            }
        }
    }

    fn sign_in_google(&mut self) -> Result<()> {
        let Ok(relay) = std::env::var(AUTH_URL_VAR) else {
            println!("Google sign-in needs {AUTH_URL_VAR} set to the authorization relay address.");
            self.running = false;
            return Ok(());
        };
        let flow = RelayFlow::new(&relay, self.provider.default_scopes.clone())
            .context("Invalid authorization relay address")?;

        let ctx = self.ctx.clone();
        let slot = Arc::clone(&self.session);
        let dispatcher = self.dispatcher.clone();
        let events = self.events.clone();

        self.dispatcher
            .task(move || -> Outcome<()> {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|err| err.to_string())?;
                let authorization = runtime
                    .block_on(flow.start())
                    .map_err(|err| format!("Could not start sign-in: {err}"))?;

                let url = authorization.url.clone();
                dispatcher.on_owner(move || {
                    println!("Continue signing in with your browser:\n  {url}");
                    if let Err(err) = opener::open(&url) {
                        warn!("Could not open a browser: {err}");
                    }
                });
                status(&dispatcher, "Waiting for authorization...");

                let credentials = runtime
                    .block_on(flow.wait(&authorization))
                    .map_err(|err| format!("Authorization failed: {err}"))?;
                let session =
                    OAuthSession::authorize(credentials, &ctx).map_err(|err| err.to_string())?;
                info!(user = session.user(), "Signed in with Google");
                *lock(&slot) = Some(session.into());
                Ok(())
            })
            .run()
            .then(move |outcome| emit(&events, Message::SignedIn(outcome)));
        Ok(())
    }

    fn sign_in_password(&mut self) -> Result<()> {
        let Some(host) = prompt::required("IMAP server: ")? else {
            self.running = false;
            return Ok(());
        };
        let port = match prompt::ask(&format!("Port [{DEFAULT_PORT}]: "))? {
            Some(port) if !port.is_empty() => port.parse().unwrap_or_else(|_| {
                println!("Invalid port '{port}', using {DEFAULT_PORT}.");
                DEFAULT_PORT
            }),
            _ => DEFAULT_PORT,
        };
        let Some(user) = prompt::required("Username: ")? else {
            self.running = false;
            return Ok(());
        };
        let Some(password) = prompt::required("Password: ")? else {
            self.running = false;
            return Ok(());
        };

        let ctx = self.ctx.clone();
        let slot = Arc::clone(&self.session);
        let dispatcher = self.dispatcher.clone();
        let events = self.events.clone();

        self.dispatcher
            .task(move || -> Outcome<()> {
                status(&dispatcher, format!("Connecting to {host}..."));
                let session = CredentialSession::connect(user, password, host, port, &ctx)
                    .map_err(|err| err.to_string())?;
                *lock(&slot) = Some(session.into());
                Ok(())
            })
            .run()
            .then(move |outcome| emit(&events, Message::SignedIn(outcome)));
        Ok(())
    }

    /// Authenticates the live session and discovers its senders.
    fn load_senders(&self) {
        let slot = Arc::clone(&self.session);
        let dispatcher = self.dispatcher.clone();
        let cache = self.senders.clone();
        let use_cache = !self.options.no_cache;
        let events = self.events.clone();

        self.dispatcher
            .task(move || -> Outcome<Vec<String>> {
                let mut guard = lock(&slot);
                let session = guard.as_mut().ok_or_else(|| "Not signed in.".to_string())?;
                if !session.is_authenticated() {
                    status(&dispatcher, format!("Signing in as {}...", session.user()));
                    session.authenticate().map_err(|err| err.to_string())?;
                }

                status(&dispatcher, "Fetching unique senders...");
                let mut service = CleanserService::new(session);
                let senders = cache
                    .discover(&mut service, use_cache)
                    .map_err(|err| err.to_string())?;
                Ok(sorted_for_display(&senders))
            })
            .run()
            .then(move |loaded| emit(&events, Message::SendersLoaded(loaded)));
    }

    fn choose_senders(&self, senders: &[String]) -> Result<HashSet<String>> {
        if let Some(requested) = self.options.senders_to_remove() {
            return Ok(requested.into_iter().collect());
        }
        if senders.is_empty() {
            println!("No senders found.");
            return Ok(HashSet::new());
        }

        println!("Found {} senders.", senders.len());
        let mut chosen = HashSet::new();
        for sender in senders {
            if prompt::yes_no(&format!("Remove mail from {sender}? [y/N] "), false)? {
                chosen.insert(sender.clone());
            }
        }
        Ok(chosen)
    }

    fn start_cleanse(&self, chosen: HashSet<String>) {
        let slot = Arc::clone(&self.session);
        let dispatcher = self.dispatcher.clone();
        let junk_folder = self.settings.junk_folder.clone();
        let cache = self.senders.clone();
        let events = self.events.clone();

        self.dispatcher
            .task(move || -> Outcome<usize> {
                let mut guard = lock(&slot);
                let session = guard.as_mut().ok_or_else(|| "Not signed in.".to_string())?;
                let user = session.user().to_string();
                let mut service = CleanserService::new(session).with_junk_folder(junk_folder);

                status(&dispatcher, format!("Searching mail from {} senders...", chosen.len()));
                let ids = service
                    .find_matching(&chosen, DEFAULT_MAILBOX)
                    .map_err(|err| err.to_string())?;
                if !ids.is_empty() {
                    status(&dispatcher, format!("Removing {} messages...", ids.len()));
                    service
                        .cleanse(&ids, DEFAULT_MAILBOX)
                        .map_err(|err| err.to_string())?;
                }

                let purged: Vec<String> = chosen.into_iter().collect();
                if let Err(err) = cache.forget(&user, &purged) {
                    warn!("Could not update the sender cache: {err}");
                }
                Ok(ids.len())
            })
            .run()
            .then(move |cleansed| emit(&events, Message::Cleansed(cleansed)));
    }

    /// Logs out, then stops the loop.
    fn finish(&self) {
        let slot = Arc::clone(&self.session);
        let events = self.events.clone();

        self.dispatcher
            .task(move || {
                let taken = lock(&slot).take();
                if let Some(mut session) = taken
                    && session.is_authenticated()
                    && let Err(err) = session.logout()
                {
                    warn!("{err}");
                }
            })
            .run()
            .then_discard(move || emit(&events, Message::LoggedOut));
    }
}
