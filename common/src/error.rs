use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid square name: {0:?}")]
    Square(String),

    #[error("invalid side: {0:?} (expected \"white\" or \"black\")")]
    Side(String),
}

/// Failures while replaying the remote move list.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("move {index} ({mv:?}) is not valid UCI")]
    Malformed { index: usize, mv: String },

    #[error("move {index} ({mv:?}) is illegal in the replayed position")]
    Illegal { index: usize, mv: String },
}

/// Failures reported by the remote game service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote refused the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("remote request failed: {0}")]
    Transport(String),

    #[error("malformed remote response: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("no active game session")]
    NoSession,

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}
