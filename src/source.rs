//! Resolve a tar URI into an image layer

use std::fs;
use url::Url;

use crate::{
    error::{Error, Result},
    image::Layer,
};

/// Resolve `uri` into a [Layer]
///
/// `file://` sources are read from the local filesystem; `http://` and
/// `https://` sources are fetched with a single GET, no retries. Any other
/// scheme is rejected.
pub fn layer(uri: &str) -> Result<Layer> {
    let parsed = Url::parse(uri)?;
    match parsed.scheme() {
        "file" => {
            let blob = fs::read(parsed.path()).map_err(Error::SourceNotReadable)?;
            Layer::from_bytes(blob)
        }
        "http" | "https" => {
            log::info!("GET {}", uri);
            let res = match ureq::get(uri).call() {
                Ok(res) => res,
                Err(ureq::Error::Status(code, _)) => return Err(Error::SourceStatus(code)),
                Err(ureq::Error::Transport(e)) => return Err(Error::NetworkError(e.into())),
            };
            if res.status() != 200 {
                return Err(Error::SourceStatus(res.status()));
            }
            Layer::from_reader(res.into_reader())
        }
        _ => Err(Error::UnsupportedUrl(uri.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_uri_is_rejected() {
        assert!(matches!(layer("a.tar"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn unreadable_file() {
        let err = layer("file:///nonexistent/oci-append/a.tar").unwrap_err();
        assert!(err.to_string().starts_with("file not valid: "));
    }
}
