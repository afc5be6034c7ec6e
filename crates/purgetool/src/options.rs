//! Command-line options.

use clap::Parser;

/// What to change about the junk folder setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JunkFolderChange {
    Set(String),
    Clear,
}

/// Clean mail from chosen senders out of your inbox.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "purgetool", version)]
pub struct Options {
    /// Senders to remove, instead of asking about each one
    #[arg(long, value_name = "a,b,...", value_delimiter = ',')]
    pub remove: Option<Vec<String>>,

    /// Move removed mail to this folder from now on
    #[arg(long, value_name = "NAME", conflicts_with = "no_junk_folder")]
    pub junk_folder: Option<String>,

    /// Delete removed mail permanently from now on
    #[arg(long)]
    pub no_junk_folder: bool,

    /// Scan the mailbox even if senders are cached
    #[arg(long)]
    pub no_cache: bool,

    /// Clear cached data before starting
    #[arg(long)]
    pub clear_cache: bool,

    /// Forget the signed-in account and exit
    #[arg(long)]
    pub logout: bool,

    /// Verbose logging and IMAP protocol trace
    #[arg(long)]
    pub debug: bool,
}

impl Options {
    /// Senders given with `--remove`, trimmed, blanks dropped.
    pub fn senders_to_remove(&self) -> Option<Vec<String>> {
        self.remove.as_ref().map(|list| {
            list.iter()
                .map(|sender| sender.trim())
                .filter(|sender| !sender.is_empty())
                .map(ToString::to_string)
                .collect()
        })
    }

    pub fn junk_folder_change(&self) -> Option<JunkFolderChange> {
        if self.no_junk_folder {
            return Some(JunkFolderChange::Clear);
        }
        self.junk_folder.clone().map(JunkFolderChange::Set)
    }
}
