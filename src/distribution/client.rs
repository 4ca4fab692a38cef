use oci_spec::image::{ImageManifest, MediaType};
use std::io::Read;
use url::Url;

use crate::{
    distribution::{AuthChallenge, StoredAuth},
    error::Result,
    Digest, ImageName, Name,
};

/// A client for `/v2/<name>/` API endpoint
pub struct Client {
    agent: ureq::Agent,
    /// URL to registry server
    url: Url,
    /// Name of repository
    name: Name,
    /// Authentication info loaded from the ambient keychain
    auth: StoredAuth,
    /// Cached token
    token: Option<String>,
}

impl Client {
    pub fn new(url: Url, name: Name) -> Result<Self> {
        let auth = StoredAuth::load_all()?;
        Ok(Client {
            agent: ureq::Agent::new(),
            url,
            name,
            auth,
            token: None,
        })
    }

    /// Client with no stored credentials
    ///
    /// Auth challenges are still answered, but anonymously.
    pub fn anonymous(url: Url, name: Name) -> Self {
        Client {
            agent: ureq::Agent::new(),
            url,
            name,
            auth: StoredAuth::default(),
            token: None,
        }
    }

    pub fn from_image_name(image: &ImageName) -> Result<Self> {
        Self::new(image.registry_url()?, image.name.clone())
    }

    fn call(&mut self, req: ureq::Request) -> Result<ureq::Response> {
        if self.token.is_none() {
            // Try the request without a token first
            let try_req = req.clone();
            let challenge = match try_req.call() {
                Ok(res) => return Ok(res),
                Err(e) => AuthChallenge::try_from(e)?,
            };
            self.token = Some(self.auth.challenge(&challenge)?);
        }
        let token = self.token.as_ref().expect("token is set above");
        Ok(req
            .set("Authorization", &format!("Bearer {}", token))
            .call()?)
    }

    fn get(&self, url: &Url) -> ureq::Request {
        log::info!("GET {}", url);
        self.agent.get(url.as_str())
    }

    fn put(&self, url: &Url) -> ureq::Request {
        log::info!("PUT {}", url);
        self.agent.put(url.as_str())
    }

    fn post(&self, url: &Url) -> ureq::Request {
        log::info!("POST {}", url);
        self.agent.post(url.as_str())
    }

    /// Get manifest for given repository
    ///
    /// ```text
    /// GET /v2/<name>/manifests/<reference>
    /// ```
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pulling-manifests) for detail.
    pub fn get_manifest(&mut self, reference: &str) -> Result<ImageManifest> {
        let url = self
            .url
            .join(&format!("/v2/{}/manifests/{}", self.name, reference))?;
        let res = self.call(self.get(&url).set(
            "Accept",
            &format!(
                "{}, {}",
                MediaType::ImageManifest.to_docker_v2s2().unwrap(),
                MediaType::ImageManifest,
            ),
        ))?;
        let manifest = ImageManifest::from_reader(res.into_reader())?;
        Ok(manifest)
    }

    /// Push manifest to registry
    ///
    /// ```text
    /// PUT /v2/<name>/manifests/<reference>
    /// ```
    ///
    /// Manifest must be pushed after blobs are updated.
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pushing-manifests) for detail.
    pub fn push_manifest(&self, reference: &str, manifest: &ImageManifest) -> Result<Url> {
        let mut buf = Vec::new();
        manifest.to_writer(&mut buf)?;
        let url = self
            .url
            .join(&format!("/v2/{}/manifests/{}", self.name, reference))?;
        let mut req = self
            .put(&url)
            .set("Content-Type", &MediaType::ImageManifest.to_string());
        if let Some(token) = self.token.as_ref() {
            // Authorization must be done while blobs push
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        let res = req.send_bytes(&buf)?;
        let loc = res
            .header("Location")
            .expect("Location header is lacked in OCI registry response");
        Ok(Url::parse(loc).or_else(|_| self.url.join(loc))?)
    }

    /// Get blob for given digest
    ///
    /// ```text
    /// GET /v2/<name>/blobs/<digest>
    /// ```
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pulling-blobs) for detail.
    pub fn get_blob(&mut self, digest: &Digest) -> Result<Vec<u8>> {
        let url = self
            .url
            .join(&format!("/v2/{}/blobs/{}", self.name.as_str(), digest))?;
        let res = self.call(self.get(&url))?;
        let mut bytes = Vec::new();
        res.into_reader().read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Push blob to registry
    ///
    /// ```text
    /// POST /v2/<name>/blobs/uploads/
    /// ```
    ///
    /// and following `PUT` to URL obtained by `POST`.
    ///
    /// See [corresponding OCI distribution spec document](https://github.com/opencontainers/distribution-spec/blob/main/spec.md#pushing-blobs) for detail.
    pub fn push_blob(&mut self, blob: &[u8]) -> Result<(Digest, Url)> {
        let url = self
            .url
            .join(&format!("/v2/{}/blobs/uploads/", self.name))?;
        let res = self.call(self.post(&url))?;
        let loc = res
            .header("Location")
            .expect("Location header is lacked in OCI registry response");
        let url = Url::parse(loc).or_else(|_| self.url.join(loc))?;

        let digest = Digest::from_buf_sha256(blob);
        let mut req = self
            .put(&url)
            .query("digest", &digest.to_string())
            .set("Content-Length", &blob.len().to_string())
            .set("Content-Type", "application/octet-stream");
        if let Some(token) = self.token.as_ref() {
            // Authorization must be done while the first POST
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        let res = req.send_bytes(blob)?;
        let loc = res
            .header("Location")
            .expect("Location header is lacked in OCI registry response");
        let url = Url::parse(loc).or_else(|_| self.url.join(loc))?;
        Ok((digest, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    //
    // Following tests need a registry server on localhost:5000.
    // These tests are ignored by default.
    //

    fn test_url() -> Url {
        Url::parse("http://localhost:5000").unwrap()
    }
    fn test_name() -> Name {
        Name::new("test_repo").unwrap()
    }

    #[test]
    #[ignore]
    fn push_blob() -> Result<()> {
        let mut client = Client::anonymous(test_url(), test_name());
        let (digest, url) = client.push_blob("test string".as_bytes())?;
        assert_eq!(digest, Digest::from_buf_sha256("test string".as_bytes()));
        dbg!(url);
        Ok(())
    }

    #[test]
    #[ignore]
    fn get_manifest() -> Result<()> {
        let mut client = Client::anonymous(test_url(), test_name());
        let manifest = client.get_manifest("latest")?;
        assert!(!manifest.layers().is_empty());
        Ok(())
    }
}
