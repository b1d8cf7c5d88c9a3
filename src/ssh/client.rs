// ABOUTME: Transport establishment using russh.
// ABOUTME: Dials the host, completes the handshake with a legacy-friendly cipher list and authenticates.

use super::auth::{AuthMethod, ChallengeResponder, authenticate};
use super::error::{Error, Result};
use crate::config::HostDescriptor;
use russh::client::{self, Config, Handle};
use russh::keys::ssh_key::{self, HashAlg};
use russh::{Disconnect, Preferred, cipher};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for dialing and completing the key exchange.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Ciphers offered after the library defaults so older servers stay reachable.
pub const FALLBACK_CIPHERS: &[cipher::Name] = &[
    cipher::AES_128_CTR,
    cipher::AES_192_CTR,
    cipher::AES_256_CTR,
    cipher::AES_256_GCM,
    cipher::CHACHA20_POLY1305,
    cipher::AES_128_CBC,
    cipher::AES_192_CBC,
    cipher::AES_256_CBC,
    cipher::TRIPLE_DES_CBC,
];

/// Library default ciphers followed by any fallback cipher not already listed.
pub fn cipher_preference() -> Vec<cipher::Name> {
    let mut ciphers: Vec<cipher::Name> = Preferred::default().cipher.to_vec();
    for name in FALLBACK_CIPHERS {
        if !ciphers.contains(name) {
            ciphers.push(*name);
        }
    }
    ciphers
}

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
}

impl ConnectionTarget {
    pub fn new(host: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
        }
    }

    pub fn from_descriptor(descriptor: &HostDescriptor) -> Self {
        Self::new(
            descriptor.host.clone(),
            descriptor.resolved_port(),
            descriptor.resolved_user(),
        )
    }

    /// `host:port` as dialed.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Host key handler that accepts every server key.
///
/// Host keys are not verified; the fingerprint is logged for the operator.
pub struct AcceptAnyHostKey {
    address: String,
}

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        tracing::debug!(
            address = %self.address,
            fingerprint = %server_public_key.fingerprint(HashAlg::Sha256),
            "accepting server host key without verification"
        );
        Ok(true)
    }
}

/// An authenticated SSH connection.
pub struct Connection {
    target: ConnectionTarget,
    handle: Arc<Handle<AcceptAnyHostKey>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.target)
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Connection {
    /// Dial, handshake within `HANDSHAKE_TIMEOUT`, then authenticate.
    ///
    /// No retries: any failure is returned to the caller.
    pub async fn establish(
        target: ConnectionTarget,
        methods: Vec<AuthMethod>,
        responder: &mut dyn ChallengeResponder,
    ) -> Result<Self> {
        let config = Config {
            preferred: Preferred {
                cipher: Cow::Owned(cipher_preference()),
                ..Preferred::default()
            },
            ..Default::default()
        };

        let address = target.address();
        let handler = AcceptAnyHostKey {
            address: address.clone(),
        };

        let connecting = client::connect(
            Arc::new(config),
            (target.host.as_str(), target.port),
            handler,
        );
        let mut handle = tokio::time::timeout(HANDSHAKE_TIMEOUT, connecting)
            .await
            .map_err(|_| Error::HandshakeTimeout {
                address: address.clone(),
                timeout: HANDSHAKE_TIMEOUT,
            })?
            .map_err(|e| Error::Connection(format!("{address}: {e}")))?;

        if !authenticate(&mut handle, &target.user, methods, responder).await? {
            return Err(Error::AuthenticationFailed {
                user: target.user.clone(),
                address,
            });
        }

        tracing::info!(
            "connect server ssh -p {} {}@{}",
            target.port,
            target.user,
            target.host
        );

        Ok(Self {
            target,
            handle: Arc::new(handle),
        })
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    pub fn handle(&self) -> &Arc<Handle<AcceptAnyHostKey>> {
        &self.handle
    }

    /// Close the transport.
    pub async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)
    }
}
