//! Session configuration.
//!
//! A [`Session`] identifies the data container, base path, and credentials
//! sent with every request. It can be built directly, loaded from a JSON
//! file, or picked up from `TABLEWIRE_*` environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::client::proto;
use crate::error::{Error, Result};

/// Connection identity attached to every request.
///
/// Authentication is either `user` + `password` or a bearer `token`,
/// never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Web API endpoint of the backing store (may differ from the gRPC
    /// address the client dials).
    #[serde(default)]
    pub url: String,

    /// Data container name.
    #[serde(default)]
    pub container: String,

    /// Base path inside the container; table names are resolved under it.
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Bearer token, mutually exclusive with user/password.
    #[serde(default)]
    pub token: String,
}

impl Session {
    pub fn new(container: impl Into<String>) -> Self {
        Session {
            container: container.into(),
            ..Session::default()
        }
    }

    /// Build a session from `TABLEWIRE_URL`, `TABLEWIRE_CONTAINER`,
    /// `TABLEWIRE_PATH`, `TABLEWIRE_USER`, `TABLEWIRE_PASSWORD` and
    /// `TABLEWIRE_TOKEN`. Unset variables become empty fields.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).unwrap_or_default();

        let session = Session {
            url: var("TABLEWIRE_URL"),
            container: var("TABLEWIRE_CONTAINER"),
            path: var("TABLEWIRE_PATH"),
            user: var("TABLEWIRE_USER"),
            password: var("TABLEWIRE_PASSWORD"),
            token: var("TABLEWIRE_TOKEN"),
        };
        session.validate()?;
        Ok(session)
    }

    /// Load a session from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read '{}': {e}", path.display()))
        })?;
        let session: Session = serde_json::from_str(&data).map_err(|e| {
            Error::Config(format!("invalid session file '{}': {e}", path.display()))
        })?;
        session.validate()?;
        Ok(session)
    }

    /// Reject sessions that mix token auth with user/password auth.
    pub fn validate(&self) -> Result<()> {
        if !self.token.is_empty() && (!self.user.is_empty() || !self.password.is_empty()) {
            return Err(Error::Config(
                "both token and user/password are set; pick one authentication method"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn to_proto(&self) -> proto::Session {
        proto::Session {
            url: self.url.clone(),
            container: self.container.clone(),
            path: self.path.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            token: self.token.clone(),
        }
    }
}
