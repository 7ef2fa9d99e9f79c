//! Source-control integration registry.
//!
//! Maps a resource's host to the helpers needed to read from it: the
//! provider flavor, an optional access token, and the rewrite from a
//! browsable "blob" URL to its raw-content URL.

use crate::config::IntegrationConfig;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while building the registry from configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("integration host must not be empty")]
    EmptyHost,
    #[error("unknown integration kind '{kind}' for host {host}")]
    UnknownKind { host: String, kind: String },
    #[error("duplicate integration for host {0}")]
    DuplicateHost(String),
}

/// Provider flavor of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScmKind {
    GitHub,
    GitLab,
    Bitbucket,
    Generic,
}

impl ScmKind {
    fn parse(host: &str, kind: &str) -> Result<Self, IntegrationError> {
        match kind.to_lowercase().as_str() {
            "github" => Ok(ScmKind::GitHub),
            "gitlab" => Ok(ScmKind::GitLab),
            "bitbucket" => Ok(ScmKind::Bitbucket),
            "generic" => Ok(ScmKind::Generic),
            other => Err(IntegrationError::UnknownKind {
                host: host.to_string(),
                kind: other.to_string(),
            }),
        }
    }

    /// Best guess from the host name.
    fn infer(host: &str) -> Self {
        if host.contains("github") {
            ScmKind::GitHub
        } else if host.contains("gitlab") {
            ScmKind::GitLab
        } else if host.contains("bitbucket") {
            ScmKind::Bitbucket
        } else {
            ScmKind::Generic
        }
    }
}

impl fmt::Display for ScmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScmKind::GitHub => write!(f, "github"),
            ScmKind::GitLab => write!(f, "gitlab"),
            ScmKind::Bitbucket => write!(f, "bitbucket"),
            ScmKind::Generic => write!(f, "generic"),
        }
    }
}

/// Access helpers for one source-control host.
#[derive(Clone)]
pub struct ScmIntegration {
    host: String,
    kind: ScmKind,
    token: Option<String>,
}

impl fmt::Debug for ScmIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScmIntegration")
            .field("host", &self.host)
            .field("kind", &self.kind)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ScmIntegration {
    pub fn new(host: impl Into<String>, kind: ScmKind, token: Option<String>) -> Self {
        Self {
            host: host.into().to_lowercase(),
            kind,
            token,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn kind(&self) -> ScmKind {
        self.kind
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Header carrying the access token, in the provider's convention.
    pub fn auth_header(&self) -> Option<(&'static str, String)> {
        let token = self.token.as_ref()?;
        Some(match self.kind {
            ScmKind::GitHub => ("Authorization", format!("token {}", token)),
            ScmKind::GitLab => ("PRIVATE-TOKEN", token.clone()),
            ScmKind::Bitbucket | ScmKind::Generic => {
                ("Authorization", format!("Bearer {}", token))
            }
        })
    }

    /// Rewrite a browsable file URL into the URL serving its raw content.
    ///
    /// URLs that are already raw, or that don't follow the provider's
    /// layout, are returned unchanged.
    pub fn raw_url(&self, url: &Url) -> Url {
        let path = url.path();

        let rewritten = match self.kind {
            ScmKind::GitHub => {
                if self.host == "github.com" {
                    github_raw_content_url(url)
                } else {
                    replace_segment(url, path, "/blob/", "/raw/")
                }
            }
            ScmKind::GitLab => replace_segment(url, path, "/-/blob/", "/-/raw/"),
            ScmKind::Bitbucket => replace_segment(url, path, "/src/", "/raw/"),
            ScmKind::Generic => None,
        };

        rewritten.unwrap_or_else(|| url.clone())
    }
}

/// `github.com/<owner>/<repo>/blob/<ref>/<path>` → `raw.githubusercontent.com/<owner>/<repo>/<ref>/<path>`
fn github_raw_content_url(url: &Url) -> Option<Url> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    if segments.len() < 5 || segments[2] != "blob" {
        return None;
    }

    let raw = format!(
        "https://raw.githubusercontent.com/{}/{}/{}",
        segments[0],
        segments[1],
        segments[3..].join("/")
    );
    let mut raw = Url::parse(&raw).ok()?;
    raw.set_query(url.query());
    Some(raw)
}

fn replace_segment(url: &Url, path: &str, from: &str, to: &str) -> Option<Url> {
    if !path.contains(from) {
        return None;
    }

    let mut raw = url.clone();
    raw.set_path(&path.replacen(from, to, 1));
    Some(raw)
}

/// Lookup table from host to integration.
#[derive(Debug, Clone, Default)]
pub struct IntegrationRegistry {
    by_host: HashMap<String, ScmIntegration>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configured integrations.
    ///
    /// Tokens named by `token_env` are read from the environment now; a
    /// missing variable leaves the integration without credentials.
    pub fn from_config(configs: &[IntegrationConfig]) -> Result<Self, IntegrationError> {
        let mut registry = Self::new();

        for config in configs {
            let host = config.host.trim().to_lowercase();
            if host.is_empty() {
                return Err(IntegrationError::EmptyHost);
            }

            let kind = match config.kind {
                Some(ref kind) => ScmKind::parse(&host, kind)?,
                None => ScmKind::infer(&host),
            };

            let token = config.token.clone().or_else(|| {
                let var = config.token_env.as_ref()?;
                match std::env::var(var) {
                    Ok(value) if !value.is_empty() => Some(value),
                    _ => {
                        warn!("Token variable {} for {} is not set", var, host);
                        None
                    }
                }
            });

            debug!("Registering {} integration for {}", kind, host);
            registry.register(ScmIntegration::new(host, kind, token))?;
        }

        Ok(registry)
    }

    pub fn register(&mut self, integration: ScmIntegration) -> Result<(), IntegrationError> {
        let host = integration.host().to_string();
        if self.by_host.contains_key(&host) {
            return Err(IntegrationError::DuplicateHost(host));
        }

        self.by_host.insert(host, integration);
        Ok(())
    }

    pub fn for_host(&self, host: &str) -> Option<&ScmIntegration> {
        self.by_host.get(&host.to_lowercase())
    }

    /// Find the integration responsible for `url`, if any.
    pub fn for_url(&self, url: &Url) -> Option<&ScmIntegration> {
        url.host_str().and_then(|host| self.for_host(host))
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}
