// ABOUTME: Host descriptor and callback command types.
// ABOUTME: Resolves defaults for user, port and private key location.

use super::deserialize::deserialize_delay;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_KEY_PATH: &str = ".ssh/id_rsa";

/// One entry of the host inventory.
///
/// Entries with children are navigation nodes; the session only ever
/// receives the descriptor the operator picked.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostDescriptor {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub user: String,

    /// Signed so that zero and negative values fall back to the default port.
    #[serde(default)]
    pub port: i64,

    #[serde(default, rename = "keypath")]
    pub key_path: Option<PathBuf>,

    #[serde(default)]
    pub passphrase: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default, rename = "before-cp-callback-shells")]
    pub before_transfer: Vec<CallbackCommand>,

    #[serde(default, rename = "after-cp-callback-shells")]
    pub after_transfer: Vec<CallbackCommand>,

    #[serde(default)]
    pub children: Vec<HostDescriptor>,
}

/// A shell command written into the remote shell after waiting `delay`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackCommand {
    pub cmd: String,

    #[serde(default, deserialize_with = "deserialize_delay")]
    pub delay: Duration,
}

impl CallbackCommand {
    pub fn new(cmd: impl Into<String>, delay: Duration) -> Self {
        Self {
            cmd: cmd.into(),
            delay,
        }
    }
}

impl HostDescriptor {
    /// Login user, `root` when none is configured.
    pub fn resolved_user(&self) -> &str {
        if self.user.is_empty() {
            DEFAULT_USER
        } else {
            &self.user
        }
    }

    /// SSH port, 22 when unset, non-positive or out of range.
    pub fn resolved_port(&self) -> u16 {
        u16::try_from(self.port)
            .ok()
            .filter(|port| *port > 0)
            .unwrap_or(DEFAULT_PORT)
    }

    /// Private key location, `~/.ssh/id_rsa` when none is configured.
    ///
    /// Returns None only when no key path is set and HOME is unknown.
    pub fn resolved_key_path(&self) -> Option<PathBuf> {
        match self.key_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => Some(path.clone()),
            None => super::home_dir().map(|home| home.join(DEFAULT_KEY_PATH)),
        }
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref().filter(|p| !p.is_empty())
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Text the host picker searches: name, user and host.
    pub fn search_text(&self) -> String {
        format!("{} {} {}", self.name, self.user, self.host)
    }
}

impl fmt::Display for HostDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_user_resolves_to_root() {
        let host = HostDescriptor::default();
        assert_eq!(host.resolved_user(), "root");
    }

    #[test]
    fn configured_user_is_kept() {
        let host = HostDescriptor {
            user: "deploy".to_string(),
            ..Default::default()
        };
        assert_eq!(host.resolved_user(), "deploy");
    }

    #[test]
    fn non_positive_port_resolves_to_22() {
        for port in [0, -1, -2222, 70000] {
            let host = HostDescriptor {
                port,
                ..Default::default()
            };
            assert_eq!(host.resolved_port(), 22, "port {port}");
        }
    }

    #[test]
    fn configured_port_is_kept() {
        let host = HostDescriptor {
            port: 2222,
            ..Default::default()
        };
        assert_eq!(host.resolved_port(), 2222);
    }

    #[test]
    fn explicit_key_path_wins() {
        let host = HostDescriptor {
            key_path: Some(PathBuf::from("/keys/deploy")),
            ..Default::default()
        };
        assert_eq!(host.resolved_key_path(), Some(PathBuf::from("/keys/deploy")));
    }

    #[test]
    fn empty_secrets_count_as_unset() {
        let host = HostDescriptor {
            password: Some(String::new()),
            passphrase: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(host.password(), None);
        assert_eq!(host.passphrase(), None);
    }

    #[test]
    fn search_text_joins_name_user_host() {
        let host = HostDescriptor {
            name: "web".to_string(),
            user: "ops".to_string(),
            host: "10.0.0.1".to_string(),
            ..Default::default()
        };
        assert_eq!(host.search_text(), "web ops 10.0.0.1");
    }
}
