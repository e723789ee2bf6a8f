use correlate_registry::ResultError;

/// 传输层错误
#[non_exhaustive]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("transport already started")]
    AlreadyStarted,
}

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    #[error("event already registered: name={name}")]
    AlreadyRegistered { name: String },

    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    #[error("result: {0}")]
    Result(#[from] ResultError),
}

pub type ChannelResult<T> = Result<T, ChannelError>;
