// ABOUTME: Authentication method resolution and negotiation.
// ABOUTME: Orders public key, password and keyboard-interactive methods for a host.

use super::error::{Error, Result};
use crate::config::HostDescriptor;
use russh::client::{Handle, Handler, KeyboardInteractiveAuthResponse, Prompt};
use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key, ssh_key};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

/// One way of proving identity to the server, tried in list order.
pub enum AuthMethod {
    PublicKey(Arc<ssh_key::PrivateKey>),
    Password(String),
    KeyboardInteractive,
}

impl AuthMethod {
    /// Method name as used on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::PublicKey(_) => "publickey",
            AuthMethod::Password(_) => "password",
            AuthMethod::KeyboardInteractive => "keyboard-interactive",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of trying to load the private key.
#[derive(Debug)]
pub enum KeyOutcome {
    Available(Arc<ssh_key::PrivateKey>),
    /// Carries `Error::KeyLoadFailed` describing why the key was skipped.
    Unavailable(Error),
}

/// Read and decode a private key, decrypting it when a passphrase is given.
pub fn load_private_key(path: &Path, passphrase: Option<&str>) -> KeyOutcome {
    let unavailable = |reason: String| {
        KeyOutcome::Unavailable(Error::KeyLoadFailed {
            path: path.to_path_buf(),
            reason,
        })
    };

    let pem = match std::fs::read_to_string(path) {
        Ok(pem) => pem,
        Err(e) => return unavailable(e.to_string()),
    };

    match decode_secret_key(&pem, passphrase) {
        Ok(key) => KeyOutcome::Available(Arc::new(key)),
        Err(e) => unavailable(e.to_string()),
    }
}

/// Build the ordered method list for `host`.
///
/// The key method is best-effort: when it cannot be loaded the reason is
/// logged and the method is left out. Keyboard-interactive is always last.
pub fn resolve_auth_methods(host: &HostDescriptor) -> Vec<AuthMethod> {
    let mut methods = Vec::with_capacity(3);

    match host.resolved_key_path() {
        Some(path) => match load_private_key(&path, host.passphrase()) {
            KeyOutcome::Available(key) => methods.push(AuthMethod::PublicKey(key)),
            KeyOutcome::Unavailable(reason) => {
                tracing::warn!("{reason}; skipping public key authentication");
            }
        },
        None => tracing::warn!("HOME is not set; skipping default private key"),
    }

    if let Some(password) = host.password() {
        methods.push(AuthMethod::Password(password.to_string()));
    }

    methods.push(AuthMethod::KeyboardInteractive);
    methods
}

/// A single keyboard-interactive question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub prompt: String,
    /// Whether the answer may be echoed while typed.
    pub echo: bool,
}

impl From<Prompt> for Challenge {
    fn from(prompt: Prompt) -> Self {
        Self {
            prompt: prompt.prompt,
            echo: prompt.echo,
        }
    }
}

/// Answers keyboard-interactive challenges.
pub trait ChallengeResponder: Send {
    /// Return one answer per challenge, in order.
    fn respond(&mut self, instructions: &str, challenges: &[Challenge]) -> io::Result<Vec<String>>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalResponder;

impl ChallengeResponder for TerminalResponder {
    fn respond(&mut self, _instructions: &str, challenges: &[Challenge]) -> io::Result<Vec<String>> {
        let mut answers = Vec::with_capacity(challenges.len());
        for challenge in challenges {
            let answer = if challenge.echo {
                let mut stdout = io::stdout();
                stdout.write_all(challenge.prompt.as_bytes())?;
                stdout.flush()?;
                read_answer(&mut io::stdin().lock())?
            } else {
                rpassword::prompt_password(&challenge.prompt)?
            };
            answers.push(answer);
        }
        Ok(answers)
    }
}

fn read_answer(input: &mut impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before an answer was given",
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Try each method in order until the server accepts one.
pub async fn authenticate<H: Handler>(
    handle: &mut Handle<H>,
    user: &str,
    methods: Vec<AuthMethod>,
    responder: &mut dyn ChallengeResponder,
) -> Result<bool> {
    for method in methods {
        tracing::debug!(method = method.name(), user, "trying authentication method");
        let accepted = match method {
            AuthMethod::PublicKey(key) => {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await?
                    .success()
            }
            AuthMethod::Password(password) => {
                handle.authenticate_password(user, password).await?.success()
            }
            AuthMethod::KeyboardInteractive => keyboard_interactive(handle, user, responder).await?,
        };

        if accepted {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn keyboard_interactive<H: Handler>(
    handle: &mut Handle<H>,
    user: &str,
    responder: &mut dyn ChallengeResponder,
) -> Result<bool> {
    let mut response = handle
        .authenticate_keyboard_interactive_start(user, None)
        .await?;

    loop {
        match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
            KeyboardInteractiveAuthResponse::InfoRequest {
                instructions,
                prompts,
                ..
            } => {
                let challenges: Vec<Challenge> = prompts.into_iter().map(Challenge::from).collect();
                let answers = responder
                    .respond(&instructions, &challenges)
                    .map_err(Error::Challenge)?;
                response = handle
                    .authenticate_keyboard_interactive_respond(answers)
                    .await?;
            }
            #[allow(unreachable_patterns)]
            _ => return Ok(false),
        }
    }
}
