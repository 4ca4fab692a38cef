use serde::{Deserialize, Serialize};
use std::{collections::HashMap, env, fs, io, path::*};
use url::Url;

use crate::error::{Error, Result};

/// Authentication info stored in filesystem
///
/// This is the ambient keychain: the docker client configuration, the podman
/// one, and the file named by `REGISTRY_AUTH_FILE`, later entries winning.
/// Credentials are only ever read, never written back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredAuth {
    auths: HashMap<String, Auth>,
}

impl StoredAuth {
    /// Load authentication info with docker and podman setting
    pub fn load_all() -> Result<Self> {
        let mut auth = StoredAuth::default();
        if let Some(path) = docker_auth_path() {
            if let Ok(new) = Self::from_path(&path) {
                auth.append(new);
            }
        }
        if let Some(path) = podman_auth_path() {
            if let Ok(new) = Self::from_path(&path) {
                auth.append(new);
            }
        }
        if let Some(path) = env::var_os("REGISTRY_AUTH_FILE") {
            let new = Self::from_path(Path::new(&path))?;
            auth.append(new);
        }
        Ok(auth)
    }

    pub fn insert(&mut self, domain: &str, octet: String) {
        self.auths.insert(domain.to_string(), Auth { auth: octet });
    }

    /// Get token based on WWW-Authentication header
    pub fn challenge(&self, challenge: &AuthChallenge) -> Result<String> {
        let token_url = Url::parse(&challenge.url)?;
        let domain = token_url
            .domain()
            .ok_or_else(|| Error::UnSupportedAuthHeader(challenge.url.clone()))?;

        let mut req = ureq::get(token_url.as_str()).set("Accept", "application/json");
        if let Some(auth) = self.auths.get(domain) {
            if !auth.auth.is_empty() {
                req = req.set("Authorization", &format!("Basic {}", auth.auth));
            }
        }
        req = req
            .query("scope", &challenge.scope)
            .query("service", &challenge.service);
        match req.call() {
            Ok(res) => {
                let token = res.into_json::<Token>()?;
                Ok(token.token)
            }
            Err(ureq::Error::Status(..)) => Err(Error::AuthorizationFailed(token_url)),
            Err(ureq::Error::Transport(e)) => Err(Error::NetworkError(e.into())),
        }
    }

    fn append(&mut self, other: Self) {
        for (key, value) in other.auths.into_iter() {
            self.auths.insert(key, value);
        }
    }

    fn from_path(path: &Path) -> Result<Self> {
        if path.is_file() {
            let f = fs::File::open(path)?;
            Ok(serde_json::from_reader(io::BufReader::new(f))?)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Auth {
    // Entries managed by a credential helper have no inline octet
    #[serde(default)]
    auth: String,
}

fn docker_auth_path() -> Option<PathBuf> {
    let dirs = directories::BaseDirs::new()?;
    Some(dirs.home_dir().join(".docker/config.json"))
}

fn podman_auth_path() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "containers")?;
    Some(dirs.runtime_dir()?.join("auth.json"))
}

/// WWW-Authentication challenge
///
/// ```
/// use oci_append::distribution::AuthChallenge;
///
/// let auth = AuthChallenge::from_header(
///   r#"Bearer realm="https://ghcr.io/token",service="ghcr.io",scope="repository:acme/widget:pull""#,
/// ).unwrap();
///
/// assert_eq!(auth, AuthChallenge {
///   url: "https://ghcr.io/token".to_string(),
///   service: "ghcr.io".to_string(),
///   scope: "repository:acme/widget:pull".to_string(),
/// });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub url: String,
    pub service: String,
    pub scope: String,
}

impl TryFrom<ureq::Error> for AuthChallenge {
    type Error = Error;
    fn try_from(e: ureq::Error) -> Result<Self> {
        match e {
            ureq::Error::Status(401, res) => {
                let header = res
                    .header("www-authenticate")
                    .ok_or_else(|| {
                        Error::UnSupportedAuthHeader("www-authenticate header is lacked".to_string())
                    })?
                    .to_string();
                Self::from_header(&header)
            }
            e => Err(e.into()),
        }
    }
}

impl AuthChallenge {
    pub fn from_header(header: &str) -> Result<Self> {
        let err = || Error::UnSupportedAuthHeader(header.to_string());
        let (ty, realm) = header.split_once(' ').ok_or_else(err)?;
        if ty != "Bearer" {
            return Err(err());
        }

        let mut url = None;
        let mut service = None;
        let mut scope = None;
        for param in realm.split(',') {
            let (key, value) = param.split_once('=').ok_or_else(err)?;
            let value = value.trim_matches('"').to_string();
            match key {
                "realm" => url = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => continue,
            }
        }
        Ok(Self {
            url: url.ok_or_else(err)?,
            service: service.ok_or_else(err)?,
            scope: scope.ok_or_else(err)?,
        })
    }
}

#[derive(Deserialize)]
struct Token {
    token: String,
}
