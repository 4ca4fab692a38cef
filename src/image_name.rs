use std::fmt;

use crate::{
    digest::Digest,
    error::{Error, Result},
    name::Name,
    reference::Reference,
};

/// Hostname used when the reference does not carry a registry,
/// like `debian` or `acme/widget`.
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";

const DEFAULT_NAMESPACE: &str = "library";

const DEFAULT_TAG: &str = "latest";

/// Parsed reference to an image, `[registry/]repository[:tag][@digest]`
///
/// Parsing follows the `docker pull` conventions: the first segment is only
/// treated as a registry when it looks like a hostname, bare repositories go
/// to the `library` namespace of the default registry, and the tag defaults
/// to `latest` unless the reference pins a digest instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageName {
    pub domain: String,
    pub port: Option<u16>,
    pub name: Name,
    pub reference: Option<Reference>,
    pub digest: Option<Digest>,
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.familiar_repository())?;
        if let Some(reference) = &self.reference {
            write!(f, ":{}", reference)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl ImageName {
    pub fn parse(name: &str) -> Result<Self> {
        let (rest, digest) = match name.rsplit_once('@') {
            Some((rest, digest)) => (rest, Some(Digest::new(digest)?)),
            None => (name, None),
        };

        // The value after the last `:` is a tag unless it contains a `/`,
        // in which case the `:` belongs to a registry port.
        let (rest, tag) = match rest.rsplit_once(':') {
            Some((rest, tag)) if !tag.contains('/') => (rest, Some(tag)),
            _ => (rest, None),
        };

        // The first segment is a registry only when it can be a hostname.
        let (domain, name) = match rest.split_once('/') {
            Some((domain, name))
                if domain.contains('.') || domain.contains(':') || domain == "localhost" =>
            {
                (domain, name.to_string())
            }
            Some(_) => (DEFAULT_REGISTRY, rest.to_string()),
            None => (DEFAULT_REGISTRY, format!("{}/{}", DEFAULT_NAMESPACE, rest)),
        };

        let (domain, port) = if let Some((domain, port)) = domain.split_once(':') {
            (domain, Some(str::parse(port)?))
        } else {
            (domain, None)
        };

        let reference = match tag {
            Some(tag) => Some(Reference::new(tag)?),
            None if digest.is_none() => Some(Reference::new(DEFAULT_TAG)?),
            None => None,
        };

        Ok(ImageName {
            domain: domain.to_string(),
            port,
            name: Name::new(&name)?,
            reference,
            digest,
        })
    }

    /// Root URL of the registry API, `http` for localhost and loopback
    pub fn registry_url(&self) -> Result<url::Url> {
        let domain = if let Some(port) = self.port {
            format!("{}:{}", self.domain, port)
        } else {
            self.domain.clone()
        };
        let scheme = if self.domain.starts_with("localhost") || self.domain.starts_with("127.") {
            "http"
        } else {
            "https"
        };
        Ok(url::Url::parse(&format!("{}://{}", scheme, domain))?)
    }

    /// The tag half of the reference
    ///
    /// The daemon addresses images by tag only, so digest-pinned references
    /// are rejected here.
    pub fn tag(&self) -> Result<&Reference> {
        self.reference
            .as_ref()
            .ok_or_else(|| Error::MissingTag(self.to_string()))
    }

    /// Familiar `repository:tag` form used to address the daemon
    pub fn tagged(&self) -> Result<String> {
        Ok(format!("{}:{}", self.familiar_repository(), self.tag()?))
    }

    /// What goes into `/v2/<name>/manifests/<reference>`
    pub fn manifest_reference(&self) -> String {
        if let Some(digest) = &self.digest {
            digest.to_string()
        } else if let Some(reference) = &self.reference {
            reference.to_string()
        } else {
            DEFAULT_TAG.to_string()
        }
    }

    fn familiar_repository(&self) -> String {
        if self.domain == DEFAULT_REGISTRY && self.port.is_none() {
            let name = self.name.as_str();
            name.strip_prefix("library/").unwrap_or(name).to_string()
        } else if let Some(port) = self.port {
            format!("{}:{}/{}", self.domain, port, self.name)
        } else {
            format!("{}/{}", self.domain, self.name)
        }
    }
}
