use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("cannot encode frame payload: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("cannot decode frame payload: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("malformed frame: {0}")]
    Frame(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
