use thiserror::Error;

/// Failure talking to one of the backend services.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("could not decode {endpoint} response: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("could not package audio: {0}")]
    Audio(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("still processing the previous reading")]
    Busy,

    #[error("microphone unavailable: {0}")]
    Device(String),

    #[error("speech recognition failed to start: {0}")]
    Recognizer(String),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("audio output failed: {0}")]
    Output(String),
}
