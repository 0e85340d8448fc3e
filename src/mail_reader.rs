use anyhow::{Context, Result};
use log::{debug, info, log_enabled, Level};
use std::fs;
use std::io::Write;
use std::path::Path;

pub mod credentials;
pub mod error;
pub mod imap;
pub mod iterator;
pub mod message;
pub mod report;
pub mod settings;

use error::MailError;
use imap::{ImapSession, MailSession};
use iterator::MailIterator;
use message::{Message, ParseOptions};
use report::ReportWriter;

fn log_message(message: &Message) {
    if log_enabled!(Level::Debug) {
        match serde_json::to_string_pretty(message) {
            Ok(json) => debug!("{}", json),
            Err(e) => debug!("Error converting to JSON: {}", e),
        }
    }
}

/// Runs one digest pass over an open session: search and fetch, then write a
/// report block and the attachments of every message, close the session and
/// append the total. Returns the report's writer.
pub async fn digest_mailbox<S: MailSession, W: Write>(
    session: &mut S,
    search: &str,
    options: ParseOptions,
    attachment_dir: &Path,
    mut writer: ReportWriter<W>,
) -> Result<W, MailError> {
    let mut iterator = MailIterator::open(session, search, options).await?;
    if iterator.is_empty() {
        info!("No messages to process");
    } else {
        info!("Processing {} message(s)", iterator.len());
    }

    let mut attachments = 0;
    while iterator.has_next() {
        let message = iterator.current()?;
        log_message(&message);

        writer.write_message(&message)?;
        attachments += report::save_attachments(&message, attachment_dir)?;

        iterator.advance();
    }

    iterator.close(session).await?;
    info!(
        "Processed {} message(s), saved {} attachment(s)",
        writer.count(),
        attachments
    );
    Ok(writer.finish()?)
}

pub async fn main(mail_settings: settings::Settings) -> Result<()> {
    let password = credentials::resolve_password(&mail_settings.imap)?;

    let attachment_dir = &mail_settings.report.attachment_dir;
    fs::create_dir_all(attachment_dir)
        .with_context(|| format!("Cannot create {}", attachment_dir.display()))?;
    let report = ReportWriter::create(&mail_settings.report.log_file)
        .with_context(|| format!("Cannot create {}", mail_settings.report.log_file.display()))?;

    let mut session = ImapSession::connect(&mail_settings.imap, &password).await?;
    digest_mailbox(
        &mut session,
        &mail_settings.imap.search,
        mail_settings.parse.clone(),
        attachment_dir,
        report,
    )
    .await?;
    Ok(())
}
