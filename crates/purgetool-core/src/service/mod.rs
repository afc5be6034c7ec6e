//! Mailbox cleanup operations.
//!
//! [`CleanserService`] discovers senders, finds messages from a chosen set of
//! senders and removes them, either by moving them to a junk folder or by
//! deleting them permanently.
//!
//! Message identifiers are sequence numbers scoped to the selected mailbox.
//! Expunging renumbers the mailbox, so identifiers must be searched again
//! before each cleanup.

mod address;
mod folder;
mod query;

use std::collections::HashSet;

use purgetool_imap::Protocol;
use tracing::{debug, info};

pub use address::{address_from_header, header_value, sorted_for_display};
pub use folder::Listing;
pub use query::{BATCH_SIZE, batched_queries, or_query, sequence_set};

use crate::session::Session;
use crate::{Error, Result};

/// Mailbox scanned by sender discovery and used as the default cleanup source.
pub const DEFAULT_MAILBOX: &str = "INBOX";

const FROM_HEADER_QUERY: &str = "(BODY.PEEK[HEADER.FIELDS (FROM)])";

/// Sender discovery and cleanup on top of an authenticated session.
pub struct CleanserService<'a> {
    session: &'a mut Session,
    junk_folder: Option<String>,
    batch_size: usize,
}

impl<'a> CleanserService<'a> {
    /// Creates a service that deletes permanently.
    pub fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            junk_folder: None,
            batch_size: BATCH_SIZE,
        }
    }

    /// Moves cleansed messages into `folder` instead of deleting them.
    #[must_use]
    pub fn with_junk_folder(mut self, folder: Option<String>) -> Self {
        self.junk_folder = folder;
        self
    }

    /// Overrides [`BATCH_SIZE`].
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Account address of the underlying session.
    #[must_use]
    pub fn user(&self) -> &str {
        self.session.user()
    }

    fn protocol(&mut self) -> Result<&mut dyn Protocol> {
        self.session.protocol()
    }

    /// Collects the distinct sender addresses of every message in the inbox.
    ///
    /// Only the `From` header is fetched.
    ///
    /// # Errors
    ///
    /// Returns a state error if the session is not authenticated, and a service
    /// error if selecting, searching or fetching fails.
    pub fn discover_senders(&mut self) -> Result<HashSet<String>> {
        let protocol = self.protocol()?;

        protocol
            .select(DEFAULT_MAILBOX)
            .map_err(|err| Error::Service(format!("Could not open {DEFAULT_MAILBOX}: {err}")))?;
        let ids = protocol
            .search("ALL")
            .map_err(|err| query_failed("Failed to fetch message list.", &err))?;
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let headers = protocol
            .fetch_headers(&sequence_set(&ids), FROM_HEADER_QUERY)
            .map_err(|err| query_failed("Failed to fetch headers.", &err))?;

        let senders: HashSet<String> = headers
            .iter()
            .filter_map(|raw| header_value(&String::from_utf8_lossy(raw), "From"))
            .map(|from| address_from_header(&from))
            .collect();
        info!(
            messages = ids.len(),
            senders = senders.len(),
            "Discovered senders"
        );
        Ok(senders)
    }

    /// Finds the messages in `source_folder` sent by any of `senders`.
    ///
    /// Senders are searched in batches; the results are unioned.
    ///
    /// # Errors
    ///
    /// Returns a service error carrying the server's message if any batch fails.
    pub fn find_matching(&mut self, senders: &HashSet<String>, source_folder: &str) -> Result<HashSet<u32>> {
        let mut ordered: Vec<&str> = senders.iter().map(String::as_str).collect();
        ordered.sort_unstable();
        let queries = batched_queries(&ordered, self.batch_size);

        let protocol = self.protocol()?;
        protocol
            .select(source_folder)
            .map_err(|err| Error::Service(format!("Could not open {source_folder}: {err}")))?;

        let mut ids = HashSet::new();
        for query in &queries {
            let batch = protocol.search(query).map_err(|err| {
                if err.is_status() {
                    Error::Service(format!("Search returned non-OK status: {err}"))
                } else {
                    Error::Service(format!("Search returned error: {err}"))
                }
            })?;
            ids.extend(batch);
        }

        debug!(
            senders = senders.len(),
            batches = queries.len(),
            matches = ids.len(),
            "Searched for messages"
        );
        Ok(ids)
    }

    /// Copies messages to `destination`, marks the originals deleted and expunges.
    ///
    /// The steps are checked in order; a copy that succeeded is not undone if a
    /// later step fails.
    ///
    /// # Errors
    ///
    /// Returns an operation error naming the step that failed.
    pub fn move_to(&mut self, ids: &HashSet<u32>, destination: &str, source_folder: &str) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let set = sequence_set(ids);
        let protocol = self.protocol()?;
        open_source(protocol, source_folder, "Move")?;

        protocol.copy(&set, destination).map_err(|err| {
            step_failed(
                "Move",
                &format!("could not copy messages to mailbox '{destination}'"),
                &err,
            )
        })?;
        mark_and_expunge(protocol, &set, "Move")?;
        info!(count = ids.len(), destination, "Moved messages");
        Ok(())
    }

    /// Marks messages deleted and expunges them.
    ///
    /// # Errors
    ///
    /// Returns an operation error naming the step that failed.
    pub fn delete(&mut self, ids: &HashSet<u32>, source_folder: &str) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let set = sequence_set(ids);
        let protocol = self.protocol()?;
        open_source(protocol, source_folder, "Delete")?;

        mark_and_expunge(protocol, &set, "Delete")?;
        info!(count = ids.len(), "Deleted messages");
        Ok(())
    }

    /// Returns true if a folder with exactly this name exists.
    ///
    /// # Errors
    ///
    /// Returns a service error if the folders cannot be listed.
    pub fn folder_exists(&mut self, name: &str) -> Result<bool> {
        let lines = self
            .protocol()?
            .list()
            .map_err(|err| Error::Service(format!("Could not list folders: {err}")))?;

        Ok(lines
            .iter()
            .filter_map(|line| Listing::parse(line))
            .any(|listing| listing.name == name))
    }

    /// Removes messages: moves them to the junk folder if one is configured,
    /// otherwise deletes them permanently.
    ///
    /// # Errors
    ///
    /// Returns an operation error if the junk folder does not exist or a step fails.
    pub fn cleanse(&mut self, ids: &HashSet<u32>, source_folder: &str) -> Result<()> {
        match self.junk_folder.clone() {
            Some(junk) => {
                if !self.folder_exists(&junk)? {
                    return Err(Error::Operation(format!(
                        "Junk folder '{junk}' does not exist"
                    )));
                }
                self.move_to(ids, &junk, source_folder)
            }
            None => self.delete(ids, source_folder),
        }
    }
}

fn query_failed(status_message: &str, err: &purgetool_imap::Error) -> Error {
    if err.is_status() {
        Error::Service(status_message.to_string())
    } else {
        Error::Service(format!("{status_message} {err}"))
    }
}

fn step_failed(action: &str, step: &str, err: &purgetool_imap::Error) -> Error {
    if err.is_status() {
        Error::Operation(format!("{action} failed: {step}"))
    } else {
        Error::Operation(format!("{action} failed: IMAP error. Message: {err}"))
    }
}

fn open_source(protocol: &mut dyn Protocol, source_folder: &str, action: &str) -> Result<()> {
    protocol
        .select(source_folder)
        .map_err(|err| step_failed(action, &format!("could not open mailbox '{source_folder}'"), &err))
}

fn mark_and_expunge(protocol: &mut dyn Protocol, set: &str, action: &str) -> Result<()> {
    protocol
        .store(set, r"+FLAGS (\Deleted)")
        .map_err(|err| step_failed(action, "could not mark messages as deleted", &err))?;
    protocol
        .expunge()
        .map_err(|err| step_failed("Expunge", "could not expunge deleted messages", &err))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::CredentialSession;
    use crate::testing::{FakeAuthority, FakeServer, Failure};

    fn session(server: &FakeServer) -> Session {
        let ctx = server.context(FakeAuthority::new("me@example.com"));
        let mut session: Session = CredentialSession::connect("me@example.com", "pw", "imap.example.com", 993, &ctx)
            .unwrap()
            .into();
        session.authenticate().unwrap();
        session
    }

    fn inbox() -> FakeServer {
        FakeServer::new()
            .with_messages([
                "Jane Doe <jane@example.com>",
                "deals@shop.example",
                "Shop <deals@shop.example>",
                "News <News@Example.com>",
            ])
            .with_folders(&["INBOX", "Junk", "[Gmail]/Spam"])
    }

    fn senders(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_discover_senders() {
        let server = inbox();
        let mut session = session(&server);
        let found = CleanserService::new(&mut session).discover_senders().unwrap();

        assert_eq!(
            found,
            senders(&["jane@example.com", "deals@shop.example", "News@Example.com"])
        );
        assert!(server.calls().contains(&format!("FETCH 1,2,3,4 {FROM_HEADER_QUERY}")));
    }

    #[test]
    fn test_discover_empty_mailbox_skips_fetch() {
        let server = FakeServer::new();
        let mut session = session(&server);
        let found = CleanserService::new(&mut session).discover_senders().unwrap();
        assert!(found.is_empty());
        assert!(!server.ops().contains(&"FETCH".to_string()));
    }

    #[test]
    fn test_discover_search_failure_is_service_error() {
        let server = inbox();
        server.fail("search", Failure::No);
        let mut session = session(&server);
        let err = CleanserService::new(&mut session).discover_senders().unwrap_err();
        assert!(matches!(err, Error::Service(ref msg) if msg == "Failed to fetch message list."));
    }

    #[test]
    fn test_discover_fetch_failure_is_service_error() {
        let server = inbox();
        server.fail("fetch", Failure::No);
        let mut session = session(&server);
        let err = CleanserService::new(&mut session).discover_senders().unwrap_err();
        assert!(matches!(err, Error::Service(ref msg) if msg == "Failed to fetch headers."));
    }

    #[test]
    fn test_operations_require_authentication() {
        let server = inbox();
        let ctx = server.context(FakeAuthority::new("me@example.com"));
        let mut session: Session = CredentialSession::connect("me@example.com", "pw", "imap.example.com", 993, &ctx)
            .unwrap()
            .into();

        let mut service = CleanserService::new(&mut session);
        assert!(matches!(service.discover_senders(), Err(Error::State(_))));
        assert!(matches!(service.folder_exists("Junk"), Err(Error::State(_))));
        assert!(matches!(
            service.delete(&HashSet::from([1]), DEFAULT_MAILBOX),
            Err(Error::State(_))
        ));
        assert!(server.calls().is_empty());
    }

    #[test]
    fn test_find_matching_batches() {
        let server = inbox();
        let mut session = session(&server);
        let mut service = CleanserService::new(&mut session).with_batch_size(1);

        let ids = service
            .find_matching(&senders(&["deals@shop.example", "News@Example.com"]), "INBOX")
            .unwrap();
        assert_eq!(ids, HashSet::from([2, 3, 4]));

        let searches: Vec<String> = server
            .calls()
            .into_iter()
            .filter(|call| call.starts_with("SEARCH"))
            .collect();
        assert_eq!(
            searches,
            vec![
                r#"SEARCH FROM "News@Example.com""#.to_string(),
                r#"SEARCH FROM "deals@shop.example""#.to_string(),
            ]
        );
    }

    #[test]
    fn test_find_matching_without_senders_issues_no_search() {
        let server = inbox();
        let mut session = session(&server);
        let ids = CleanserService::new(&mut session)
            .find_matching(&HashSet::new(), "INBOX")
            .unwrap();
        assert!(ids.is_empty());
        assert!(!server.ops().contains(&"SEARCH".to_string()));
    }

    #[test]
    fn test_find_matching_error_carries_message() {
        let server = inbox();
        server.fail("search", Failure::Lost);
        let mut session = session(&server);
        let err = CleanserService::new(&mut session)
            .find_matching(&senders(&["jane@example.com"]), "INBOX")
            .unwrap_err();
        assert!(matches!(err, Error::Service(ref msg) if msg.contains("Connection lost")));
    }

    #[test]
    fn test_move_runs_three_steps() {
        let server = inbox();
        let mut session = session(&server);
        CleanserService::new(&mut session)
            .move_to(&HashSet::from([3, 1]), "Junk", "INBOX")
            .unwrap();

        let calls = server.calls();
        assert_eq!(
            calls[calls.len() - 4..],
            [
                "SELECT INBOX".to_string(),
                "COPY 1,3 Junk".to_string(),
                r"STORE 1,3 +FLAGS (\Deleted)".to_string(),
                "EXPUNGE".to_string(),
            ]
        );
    }

    #[test]
    fn test_move_stops_when_mark_deleted_fails() {
        let server = inbox();
        server.fail("store", Failure::No);
        let mut session = session(&server);
        let err = CleanserService::new(&mut session)
            .move_to(&HashSet::from([1]), "Junk", "INBOX")
            .unwrap_err();

        assert!(matches!(err, Error::Operation(ref msg) if msg.contains("could not mark messages as deleted")));
        assert!(server.ops().contains(&"COPY".to_string()));
        assert!(!server.ops().contains(&"EXPUNGE".to_string()));
    }

    #[test]
    fn test_move_copy_failure_names_destination() {
        let server = inbox();
        server.fail("copy", Failure::No);
        let mut session = session(&server);
        let err = CleanserService::new(&mut session)
            .move_to(&HashSet::from([1]), "Junk", "INBOX")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Move failed: could not copy messages to mailbox 'Junk'"
        );
        assert!(!server.ops().contains(&"STORE".to_string()));
    }

    #[test]
    fn test_delete_expunge_failure() {
        let server = inbox();
        server.fail("expunge", Failure::No);
        let mut session = session(&server);
        let err = CleanserService::new(&mut session)
            .delete(&HashSet::from([2]), "INBOX")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expunge failed: could not expunge deleted messages"
        );
        assert!(!server.ops().contains(&"COPY".to_string()));
    }

    #[test]
    fn test_transport_error_is_operation_error_with_message() {
        let server = inbox();
        server.fail("copy", Failure::Lost);
        let mut session = session(&server);
        let err = CleanserService::new(&mut session)
            .move_to(&HashSet::from([1]), "Junk", "INBOX")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Move failed: IMAP error. Message: Connection lost"
        );
    }

    #[test]
    fn test_empty_ids_are_a_no_op() {
        let server = inbox();
        let mut session = session(&server);
        let before = server.calls().len();
        let mut service = CleanserService::new(&mut session);
        service.move_to(&HashSet::new(), "Junk", "INBOX").unwrap();
        service.delete(&HashSet::new(), "INBOX").unwrap();
        assert_eq!(server.calls().len(), before);
    }

    #[test]
    fn test_folder_exists() {
        let server = inbox();
        let mut session = session(&server);
        let mut service = CleanserService::new(&mut session);
        assert!(service.folder_exists("Junk").unwrap());
        assert!(service.folder_exists("[Gmail]/Spam").unwrap());
        assert!(!service.folder_exists("junk").unwrap());
        assert!(!service.folder_exists("Jun").unwrap());
    }

    #[test]
    fn test_cleanse_moves_to_junk_folder() {
        let server = inbox();
        let mut session = session(&server);
        CleanserService::new(&mut session)
            .with_junk_folder(Some("Junk".into()))
            .cleanse(&HashSet::from([1]), "INBOX")
            .unwrap();
        assert!(server.calls().contains(&"COPY 1 Junk".to_string()));
    }

    #[test]
    fn test_cleanse_missing_junk_folder() {
        let server = inbox();
        let mut session = session(&server);
        let err = CleanserService::new(&mut session)
            .with_junk_folder(Some("Trash".into()))
            .cleanse(&HashSet::from([1]), "INBOX")
            .unwrap_err();
        assert!(matches!(err, Error::Operation(ref msg) if msg.contains("'Trash'")));
        assert!(!server.ops().contains(&"STORE".to_string()));
    }

    #[test]
    fn test_cleanse_without_junk_folder_deletes() {
        let server = inbox();
        let mut session = session(&server);
        CleanserService::new(&mut session)
            .cleanse(&HashSet::from([2, 3]), "INBOX")
            .unwrap();
        let ops = server.ops();
        assert!(!ops.contains(&"COPY".to_string()));
        assert!(ops.contains(&"EXPUNGE".to_string()));
    }
}
