use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Everything that can go wrong while building or sending a message.
#[derive(Debug, Error)]
pub enum Error {
    /// A sender or recipient string isn't a single, well-formed mail address.
    #[error("invalid address '{input}': {reason}")]
    Address { input: String, reason: String },

    #[error("a message needs at least one recipient")]
    NoRecipients,

    /// The mail transfer agent couldn't be launched at all.
    #[error("cannot start mail transfer agent '{}'", .path.display())]
    ProcessStart {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing the message (or reading the agent's error stream) failed.
    #[error("i/o error while sending message")]
    Io(#[from] io::Error),

    #[error("cannot close input stream of mail transfer agent")]
    PipeClose(#[source] io::Error),

    /// The agent wrote diagnostics to its error stream. Its exit status is not consulted.
    #[error("mail transfer agent reported: {0}")]
    AgentReported(String),

    #[error("mail transfer agent failed: {0}")]
    AgentExit(ExitStatus),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn address(input: &str, reason: impl Into<String>) -> Self {
        Error::Address {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
