//! Minimal SMTP submission client.
//!
//! A delivery walks a fixed table of states. Each state owns the command it
//! sends and the reply codes it accepts; any other reply ends the session.
//!
//! ```text
//! Greet → Ehlo → [StartTls → Ehlo] → AuthLogin → AuthUser → AuthPass
//!       → MailFrom → RcptTo → Data → BodyTerminate → Quit
//! ```

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use derive_more::Display;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use zeroize::Zeroizing;

use crate::settings::SmtpSecurity;

/// Any bidirectional byte stream an SMTP session can run over.
pub trait SmtpStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> SmtpStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedStream = Box<dyn SmtpStream>;

const MAX_REPLY_LINES: usize = 128;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    Connect,
    Greet,
    Ehlo,
    StartTls,
    AuthLogin,
    AuthUser,
    AuthPass,
    MailFrom,
    RcptTo,
    Data,
    BodyTerminate,
    Quit,
}

impl SmtpState {
    /// Reply codes that let the session advance out of this state.
    pub fn accepts(self, code: u16) -> bool {
        match self {
            SmtpState::Connect | SmtpState::Quit => true,
            SmtpState::Greet | SmtpState::StartTls => code == 220,
            SmtpState::Ehlo | SmtpState::MailFrom | SmtpState::BodyTerminate => code == 250,
            SmtpState::AuthLogin | SmtpState::AuthUser => code == 334,
            SmtpState::AuthPass => code == 235,
            SmtpState::RcptTo => code == 250 || code == 251,
            SmtpState::Data => code == 354,
        }
    }
}

/// Plaintext or implicit TLS: the whole conversation on one stream.
const DIRECT_PLAN: &[SmtpState] = &[
    SmtpState::Greet,
    SmtpState::Ehlo,
    SmtpState::AuthLogin,
    SmtpState::AuthUser,
    SmtpState::AuthPass,
    SmtpState::MailFrom,
    SmtpState::RcptTo,
    SmtpState::Data,
    SmtpState::BodyTerminate,
];

const STARTTLS_PLAN: &[SmtpState] = &[SmtpState::Greet, SmtpState::Ehlo, SmtpState::StartTls];

/// After STARTTLS the server has forgotten the first EHLO.
const UPGRADED_PLAN: &[SmtpState] = &[
    SmtpState::Ehlo,
    SmtpState::AuthLogin,
    SmtpState::AuthUser,
    SmtpState::AuthPass,
    SmtpState::MailFrom,
    SmtpState::RcptTo,
    SmtpState::Data,
    SmtpState::BodyTerminate,
];

#[derive(Debug, Display)]
pub enum SmtpError {
    #[display("could not connect to {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[display("timed out during {_0}")]
    Timeout(SmtpState),

    #[display("I/O error during {state}: {source}")]
    Io {
        state: SmtpState,
        source: std::io::Error,
    },

    #[display("connection closed by server during {_0}")]
    ConnectionClosed(SmtpState),

    #[display("malformed reply during {state}: {line:?}")]
    MalformedReply { state: SmtpState, line: String },

    #[display("unexpected reply during {state}: {reply}")]
    UnexpectedReply { state: SmtpState, reply: String },

    #[display("TLS error: {_0}")]
    Tls(String),
}

impl std::error::Error for SmtpError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn text(&self) -> String {
        self.lines.join(" | ")
    }
}

/// Wraps a connected stream in TLS, for STARTTLS and implicit TLS.
#[async_trait]
pub trait TlsUpgrade: Send + Sync {
    async fn upgrade(&self, stream: BoxedStream) -> Result<BoxedStream, SmtpError>;
}

/// Credentials for `AUTH LOGIN`. The password is wiped on drop.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One message to hand over: envelope plus the formatted message.
#[derive(Debug)]
pub struct Envelope<'a> {
    pub sender: &'a str,
    pub recipient: &'a str,
    /// Dot-stuffed headers and body, without the terminating `.` line.
    pub message: &'a str,
}

pub struct SmtpSession {
    reader: BufReader<BoxedStream>,
    timeout: Duration,
}

impl SmtpSession {
    pub fn new(stream: BoxedStream, timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(stream),
            timeout,
        }
    }

    pub fn into_stream(self) -> BoxedStream {
        self.reader.into_inner()
    }

    /// Reads one reply; continuation lines carry a `-` after the code.
    pub async fn read_reply(&mut self, state: SmtpState) -> Result<SmtpReply, SmtpError> {
        let mut lines = Vec::new();

        loop {
            let mut line = String::new();
            let read = timeout(self.timeout, self.reader.read_line(&mut line))
                .await
                .map_err(|_| SmtpError::Timeout(state))?
                .map_err(|source| SmtpError::Io { state, source })?;

            if read == 0 {
                return Err(SmtpError::ConnectionClosed(state));
            }

            let line = line.trim_end_matches(['\r', '\n']).to_string();
            let continues = line.as_bytes().get(3) == Some(&b'-');
            lines.push(line);

            if !continues {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(SmtpError::MalformedReply {
                    state,
                    line: "reply too long".to_string(),
                });
            }
        }

        let last = lines.last().map(String::as_str).unwrap_or_default();
        let code = last
            .get(..3)
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| SmtpError::MalformedReply {
                state,
                line: last.to_string(),
            })?;

        Ok(SmtpReply { code, lines })
    }

    async fn write_all(&mut self, state: SmtpState, data: &[u8]) -> Result<(), SmtpError> {
        let stream = self.reader.get_mut();
        timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| SmtpError::Timeout(state))?
        .map_err(|source| SmtpError::Io { state, source })
    }

    pub async fn send_line(&mut self, state: SmtpState, line: &str) -> Result<(), SmtpError> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.write_all(state, &data).await
    }

    /// Sends whatever `state` sends and checks the reply against it.
    async fn step(
        &mut self,
        state: SmtpState,
        helo_name: &str,
        credentials: &Credentials,
        envelope: &Envelope<'_>,
    ) -> Result<SmtpReply, SmtpError> {
        match state {
            SmtpState::Connect | SmtpState::Greet | SmtpState::Quit => {}
            SmtpState::Ehlo => self.send_line(state, &format!("EHLO {helo_name}")).await?,
            SmtpState::StartTls => self.send_line(state, "STARTTLS").await?,
            SmtpState::AuthLogin => self.send_line(state, "AUTH LOGIN").await?,
            SmtpState::AuthUser => {
                let user = STANDARD.encode(credentials.username.as_bytes());
                self.send_line(state, &user).await?
            }
            SmtpState::AuthPass => {
                let pass = Zeroizing::new(STANDARD.encode(credentials.password.as_bytes()));
                self.send_line(state, &pass).await?
            }
            SmtpState::MailFrom => {
                self.send_line(state, &format!("MAIL FROM:<{}>", envelope.sender))
                    .await?
            }
            SmtpState::RcptTo => {
                self.send_line(state, &format!("RCPT TO:<{}>", envelope.recipient))
                    .await?
            }
            SmtpState::Data => self.send_line(state, "DATA").await?,
            SmtpState::BodyTerminate => {
                let mut payload = Vec::with_capacity(envelope.message.len() + 5);
                payload.extend_from_slice(envelope.message.as_bytes());
                payload.extend_from_slice(b"\r\n.\r\n");
                self.write_all(state, &payload).await?
            }
        }

        let reply = self.read_reply(state).await?;
        if !state.accepts(reply.code) {
            return Err(SmtpError::UnexpectedReply {
                state,
                reply: reply.text(),
            });
        }

        tracing::trace!(%state, code = reply.code, "SMTP step accepted");
        Ok(reply)
    }

    /// Walks `plan` in order. A rejected reply still leaves the connection
    /// usable, so the server gets a `QUIT` before the error is returned.
    pub async fn run(
        &mut self,
        plan: &[SmtpState],
        helo_name: &str,
        credentials: &Credentials,
        envelope: &Envelope<'_>,
    ) -> Result<(), SmtpError> {
        for &state in plan {
            if let Err(e) = self.step(state, helo_name, credentials, envelope).await {
                if matches!(e, SmtpError::UnexpectedReply { .. }) {
                    self.quit().await;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Best-effort `QUIT`; the reply is read but not checked.
    pub async fn quit(&mut self) {
        if self.send_line(SmtpState::Quit, "QUIT").await.is_ok() {
            let _ = self.read_reply(SmtpState::Quit).await;
        }
        let _ = self.reader.get_mut().shutdown().await;
    }
}

pub struct SmtpClient {
    host: String,
    port: u16,
    security: SmtpSecurity,
    timeout: Duration,
    helo_name: String,
    credentials: Credentials,
    tls: Arc<dyn TlsUpgrade>,
}

impl SmtpClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        security: SmtpSecurity,
        timeout: Duration,
        helo_name: impl Into<String>,
        credentials: Credentials,
        tls: Arc<dyn TlsUpgrade>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            security,
            timeout,
            helo_name: helo_name.into(),
            credentials,
            tls,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn security(&self) -> SmtpSecurity {
        self.security
    }

    async fn connect(&self) -> Result<BoxedStream, SmtpError> {
        let stream = timeout(self.timeout, TcpStream::connect((self.host.as_str(), self.port)))
            .await
            .map_err(|_| SmtpError::Timeout(SmtpState::Connect))?
            .map_err(|source| SmtpError::Connect {
                address: self.address(),
                source,
            })?;
        let _ = stream.set_nodelay(true);

        let stream: BoxedStream = Box::new(stream);
        match self.security {
            SmtpSecurity::Ssl => self.tls.upgrade(stream).await,
            SmtpSecurity::Tls | SmtpSecurity::None => Ok(stream),
        }
    }

    /// Delivers one message over a fresh connection.
    pub async fn send(&self, envelope: &Envelope<'_>) -> Result<(), SmtpError> {
        let stream = self.connect().await?;
        self.converse(stream, envelope).await
    }

    /// Runs the conversation on an already connected stream.
    pub async fn converse(&self, stream: BoxedStream, envelope: &Envelope<'_>) -> Result<(), SmtpError> {
        let mut session = SmtpSession::new(stream, self.timeout);

        let plan = if self.security == SmtpSecurity::Tls {
            session
                .run(STARTTLS_PLAN, &self.helo_name, &self.credentials, envelope)
                .await?;
            let upgraded = self.tls.upgrade(session.into_stream()).await?;
            session = SmtpSession::new(upgraded, self.timeout);
            UPGRADED_PLAN
        } else {
            DIRECT_PLAN
        };

        session
            .run(plan, &self.helo_name, &self.credentials, envelope)
            .await?;
        session.quit().await;
        Ok(())
    }
}
