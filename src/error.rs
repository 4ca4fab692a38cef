use oci_spec::{distribution::ErrorResponse, OciSpecError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    //
    // Invalid user input
    //
    #[error("Invalid name for repository: {0}")]
    InvalidName(String),
    #[error(transparent)]
    InvalidPort(#[from] std::num::ParseIntError),
    #[error("Invalid reference to image: {0}")]
    InvalidReference(String),
    #[error("Invalid digest: {0}")]
    InvalidDigest(String),
    #[error("Reference has no tag: {0}")]
    MissingTag(String),
    #[error("invalid url: {0}")]
    UnsupportedUrl(String),
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    //
    // Invalid tar source
    //
    #[error("file not valid: status code: {0}")]
    SourceStatus(u16),
    #[error("file not valid: {0}")]
    SourceNotReadable(#[source] std::io::Error),

    //
    // Invalid container image
    //
    #[error("No manifest.json in daemon archive")]
    MissingManifest,
    #[error("Missing blob in daemon archive: {0}")]
    MissingBlob(String),
    #[error(transparent)]
    InvalidJson(#[from] serde_json::error::Error),

    //
    // Error from OCI registry
    //
    #[error(transparent)]
    NetworkError(Box<ureq::Transport>),
    #[error(transparent)]
    RegistryError(#[from] ErrorResponse),
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(url::Url),
    #[error("Unsupported WWW-Authentication header: {0}")]
    UnSupportedAuthHeader(String),

    //
    // Error from local daemon
    //
    #[error("docker {0} failed: {1}")]
    DaemonCommand(&'static str, String),

    //
    // System error
    //
    #[error(transparent)]
    UnknownIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<OciSpecError> for Error {
    fn from(e: OciSpecError) -> Self {
        match e {
            OciSpecError::SerDe(e) => Error::InvalidJson(e),
            OciSpecError::Io(e) => Error::UnknownIo(e),
            OciSpecError::Builder(_) => unreachable!(),
            OciSpecError::Other(e) => panic!("Unknown error within oci_spec: {}", e),
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(_status, res) => match res.into_json::<ErrorResponse>() {
                Ok(err) => Error::RegistryError(err),
                Err(e) => Error::UnknownIo(e),
            },
            ureq::Error::Transport(e) => Error::NetworkError(e.into()),
        }
    }
}
