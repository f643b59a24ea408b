use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("serial port {port}: {source}")]
    Serial {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("unknown output protocol: {0}")]
    UnknownProtocol(String),

    #[error("output {0} is disconnected")]
    Disconnected(String),
}

pub type Result<T> = std::result::Result<T, Error>;
