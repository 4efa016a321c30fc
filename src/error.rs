use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("feed error: {0}")]
    Feed(String),

    #[error("push channel error: {0}")]
    Channel(String),

    #[error("map surface error: {0}")]
    Map(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for TrackError {
    fn from(err: reqwest::Error) -> Self {
        TrackError::Feed(err.to_string())
    }
}
