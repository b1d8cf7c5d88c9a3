// ABOUTME: In-process SSH server for integration tests.
// ABOUTME: Scripted authentication and a read-only SFTP subsystem on a loopback port.

use super::fixture;
use russh::keys::{decode_secret_key, ssh_key};
use russh::server::{self, Auth, Msg, Session};
use russh::{Channel, ChannelId};
use russh_sftp::protocol::{
    Data, FileAttributes, Handle as SftpHandle, OpenFlags, Status, StatusCode, Version,
};
use scpe::config::HostDescriptor;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_USER: &str = "tester";

/// Keyboard-interactive round: prompts sent, answers required to pass.
#[derive(Debug, Clone, Default)]
pub struct KeyboardScript {
    pub prompts: Vec<(String, bool)>,
    pub expected: Vec<String>,
}

/// What the server accepts and which files it serves.
#[derive(Debug, Clone, Default)]
pub struct ServerBehavior {
    pub authorized_key: Option<ssh_key::PublicKey>,
    pub password: Option<String>,
    pub keyboard: Option<KeyboardScript>,
    pub files: HashMap<String, Vec<u8>>,
}

impl ServerBehavior {
    /// Accept the fixture key `tests/fixtures/id_ed25519`.
    pub fn accepting_fixture_key() -> Self {
        Self {
            authorized_key: Some(fixture_key().public_key().clone()),
            ..Default::default()
        }
    }

    pub fn serving(mut self, path: &str, contents: &[u8]) -> Self {
        self.files.insert(path.to_string(), contents.to_vec());
        self
    }
}

/// A running server; it lives until the test runtime shuts down.
pub struct TestServer {
    pub port: u16,
    keyboard_answers: Arc<Mutex<Vec<Vec<String>>>>,
}

impl TestServer {
    pub async fn start(behavior: ServerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback listener");
        let port = listener.local_addr().expect("listener address").port();

        let config = Arc::new(server::Config {
            auth_rejection_time: Duration::from_millis(10),
            auth_rejection_time_initial: Some(Duration::ZERO),
            keys: vec![fixture_key()],
            ..Default::default()
        });
        let behavior = Arc::new(behavior);
        let keyboard_answers = Arc::new(Mutex::new(Vec::new()));

        let answers = Arc::clone(&keyboard_answers);
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let handler = TestHandler {
                    behavior: Arc::clone(&behavior),
                    keyboard_answers: Arc::clone(&answers),
                    channels: HashMap::new(),
                };
                let config = Arc::clone(&config);
                tokio::spawn(async move {
                    match server::run_stream(config, socket, handler).await {
                        Ok(session) => {
                            let _ = session.await;
                        }
                        Err(e) => tracing::debug!(error = %e, "test server session failed"),
                    }
                });
            }
        });

        Self {
            port,
            keyboard_answers,
        }
    }

    /// Answers received in each keyboard-interactive round.
    pub fn keyboard_answers(&self) -> Vec<Vec<String>> {
        self.keyboard_answers.lock().unwrap().clone()
    }

    /// Descriptor pointing at this server with the given key file.
    pub fn host(&self, key_path: PathBuf) -> HostDescriptor {
        HostDescriptor {
            name: "loopback".to_string(),
            host: "127.0.0.1".to_string(),
            user: TEST_USER.to_string(),
            port: i64::from(self.port),
            key_path: Some(key_path),
            ..Default::default()
        }
    }
}

fn fixture_key() -> ssh_key::PrivateKey {
    let pem = std::fs::read_to_string(fixture("id_ed25519")).expect("read fixture key");
    decode_secret_key(&pem, None).expect("decode fixture key")
}

struct TestHandler {
    behavior: Arc<ServerBehavior>,
    keyboard_answers: Arc<Mutex<Vec<Vec<String>>>>,
    channels: HashMap<ChannelId, Channel<Msg>>,
}

impl server::Handler for TestHandler {
    type Error = russh::Error;

    async fn auth_publickey(
        &mut self,
        _user: &str,
        public_key: &ssh_key::PublicKey,
    ) -> Result<Auth, Self::Error> {
        match &self.behavior.authorized_key {
            Some(key) if key.key_data() == public_key.key_data() => Ok(Auth::Accept),
            _ => Ok(Auth::reject()),
        }
    }

    async fn auth_password(&mut self, _user: &str, password: &str) -> Result<Auth, Self::Error> {
        match &self.behavior.password {
            Some(expected) if expected == password => Ok(Auth::Accept),
            _ => Ok(Auth::reject()),
        }
    }

    async fn auth_keyboard_interactive<'a>(
        &'a mut self,
        _user: &str,
        _submethods: &str,
        response: Option<server::Response<'a>>,
    ) -> Result<Auth, Self::Error> {
        let Some(script) = &self.behavior.keyboard else {
            return Ok(Auth::reject());
        };

        let Some(response) = response else {
            let prompts: Vec<(Cow<'static, str>, bool)> = script
                .prompts
                .iter()
                .map(|(prompt, echo)| (Cow::Owned(prompt.clone()), *echo))
                .collect();
            return Ok(Auth::Partial {
                name: Cow::Borrowed("scpe-test"),
                instructions: Cow::Borrowed(""),
                prompts: Cow::Owned(prompts),
            });
        };

        let answers: Vec<String> = response
            .map(|answer| String::from_utf8_lossy(&answer).into_owned())
            .collect();
        let accepted = answers == script.expected;
        self.keyboard_answers.lock().unwrap().push(answers);

        if accepted {
            Ok(Auth::Accept)
        } else {
            Ok(Auth::reject())
        }
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        self.channels.insert(channel.id(), channel);
        Ok(true)
    }

    async fn subsystem_request(
        &mut self,
        channel_id: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        match (name, self.channels.remove(&channel_id)) {
            ("sftp", Some(channel)) => {
                session.channel_success(channel_id)?;
                let files = SftpFiles {
                    files: self.behavior.files.clone(),
                };
                russh_sftp::server::run(channel.into_stream(), files).await;
            }
            _ => session.channel_failure(channel_id)?,
        }
        Ok(())
    }
}

/// Read-only SFTP handler over an in-memory file map.
struct SftpFiles {
    files: HashMap<String, Vec<u8>>,
}

impl russh_sftp::server::Handler for SftpFiles {
    type Error = StatusCode;

    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    async fn init(
        &mut self,
        _version: u32,
        _extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        Ok(Version::new())
    }

    async fn open(
        &mut self,
        id: u32,
        filename: String,
        _pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<SftpHandle, Self::Error> {
        if self.files.contains_key(&filename) {
            Ok(SftpHandle {
                id,
                handle: filename,
            })
        } else {
            Err(StatusCode::NoSuchFile)
        }
    }

    async fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> Result<Data, Self::Error> {
        let contents = self.files.get(&handle).ok_or(StatusCode::Failure)?;
        let start = usize::try_from(offset).map_err(|_| StatusCode::Failure)?;
        if start >= contents.len() {
            return Err(StatusCode::Eof);
        }
        let end = contents.len().min(start + len as usize);
        Ok(Data {
            id,
            data: contents[start..end].to_vec(),
        })
    }

    async fn close(&mut self, id: u32, _handle: String) -> Result<Status, Self::Error> {
        Ok(Status {
            id,
            status_code: StatusCode::Ok,
            error_message: "Ok".to_string(),
            language_tag: "en-US".to_string(),
        })
    }
}
