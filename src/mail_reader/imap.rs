use async_imap::{Client, Session};
use futures::TryStreamExt;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

use crate::mail_reader::error::MailError;
use crate::mail_reader::settings::ImapSettings;
use log::{debug, info};

type TlsSession = Session<Compat<tokio_native_tls::TlsStream<TcpStream>>>;

/// The mailbox operations the reader needs from a server session.
#[allow(async_fn_in_trait)]
pub trait MailSession {
    /// Returns the UIDs matching an IMAP search expression, in server order.
    async fn search(&mut self, filter: &str) -> Result<Vec<u32>, MailError>;
    /// Returns the full RFC 822 bytes of one message.
    async fn fetch(&mut self, uid: u32) -> Result<Vec<u8>, MailError>;
    async fn close(&mut self) -> Result<(), MailError>;
}

pub struct ImapSession {
    session: TlsSession,
}

// Establish a TLS-encrypted connection to the IMAP server
async fn connect_to_server(
    server: &str,
    port: u16,
) -> Result<tokio_native_tls::TlsStream<TcpStream>, MailError> {
    let tcp_stream = TcpStream::connect((server, port))
        .await
        .map_err(|e| MailError::Connection(format!("cannot reach {}:{}: {}", server, port, e)))?;
    let connector = native_tls::TlsConnector::new()
        .map_err(|e| MailError::Connection(format!("cannot set up TLS: {}", e)))?;
    let tls_stream = tokio_native_tls::TlsConnector::from(connector)
        .connect(server, tcp_stream)
        .await
        .map_err(|e| MailError::Connection(format!("TLS handshake with {} failed: {}", server, e)))?;

    info!("-- connected to {}:{}", server, port);
    Ok(tls_stream)
}

impl ImapSession {
    /// Connects, logs in and selects the configured mailbox.
    pub async fn connect(settings: &ImapSettings, password: &str) -> Result<Self, MailError> {
        let tls_stream = connect_to_server(&settings.server, settings.port).await?;
        let client = Client::new(tls_stream.compat());

        let mut session = client
            .login(&settings.username, password)
            .await
            .map_err(|(e, _)| MailError::Connection(format!("login as {} failed: {}", settings.username, e)))?;
        info!("-- logged in as {}", settings.username);

        session
            .select(&settings.mailbox)
            .await
            .map_err(|e| MailError::Connection(format!("cannot select {}: {}", settings.mailbox, e)))?;
        info!("-- {} selected", settings.mailbox);

        Ok(ImapSession { session })
    }
}

impl MailSession for ImapSession {
    async fn search(&mut self, filter: &str) -> Result<Vec<u32>, MailError> {
        let mut uids: Vec<u32> = self.session.uid_search(filter).await?.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch(&mut self, uid: u32) -> Result<Vec<u8>, MailError> {
        debug!("-- fetching uid {}", uid);
        let messages_stream = self.session.uid_fetch(uid.to_string(), "RFC822").await?;
        let messages: Vec<_> = messages_stream.try_collect().await?;

        messages
            .iter()
            .find_map(|message| message.body().map(<[u8]>::to_vec))
            .ok_or(MailError::MissingBody { uid })
    }

    async fn close(&mut self) -> Result<(), MailError> {
        self.session.close().await?;
        // Be nice to the server and log out
        self.session.logout().await?;
        info!("-- logged out");
        Ok(())
    }
}
