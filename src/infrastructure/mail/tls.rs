use std::sync::Arc;

use async_trait::async_trait;
use rustls::{pki_types::ServerName, ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use super::smtp::{BoxedStream, SmtpError, TlsUpgrade};

/// rustls client against the Mozilla root set, TLS 1.2 and 1.3 only.
pub struct RustlsUpgrade {
    connector: TlsConnector,
    server_name: ServerName<'static>,
}

impl RustlsUpgrade {
    pub fn new(host: &str) -> Result<Self, SmtpError> {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let config = ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| SmtpError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| SmtpError::Tls(format!("invalid server name {host:?}: {e}")))?;

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
        })
    }
}

#[async_trait]
impl TlsUpgrade for RustlsUpgrade {
    async fn upgrade(&self, stream: BoxedStream) -> Result<BoxedStream, SmtpError> {
        let tls = self
            .connector
            .connect(self.server_name.clone(), stream)
            .await
            .map_err(|e| SmtpError::Tls(e.to_string()))?;
        Ok(Box::new(tls))
    }
}
