use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("AMQP error: {0}")]
    Amqp(Box<lapin::Error>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("registry error: {0}")]
    Registry(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<lapin::Error> for Error {
    fn from(err: lapin::Error) -> Self {
        Error::Amqp(Box::new(err))
    }
}
