use anyhow::{Context, Result};
use serde::Deserialize;

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use backtrace::Backtrace;
use log::error;

use crate::mail_reader::message::ParseOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub imap: ImapSettings,
    #[serde(flatten)]
    pub parse: ParseOptions,
    #[serde(default)]
    pub report: ReportSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImapSettings {
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// When absent the password comes from the encrypted credential store.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    #[serde(default = "default_search")]
    pub search: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSettings {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_attachment_dir")]
    pub attachment_dir: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            log_file: default_log_file(),
            attachment_dir: default_attachment_dir(),
        }
    }
}

fn default_port() -> u16 {
    993
}

fn default_mailbox() -> String {
    "INBOX".to_string()
}

fn default_search() -> String {
    "ALL".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("emails.log")
}

fn default_attachment_dir() -> PathBuf {
    PathBuf::from("attachments")
}

fn log_failure(err: &dyn Display) {
    error!("Error: {}", err);

    // Capture and print the backtrace
    let backtrace = Backtrace::new();
    error!("Backtrace:\n{:?}", backtrace);
}

pub fn parse_settings(yaml: &str) -> Result<Settings> {
    serde_yaml::from_str(yaml).map_err(|err| {
        log_failure(&err);
        err.into()
    })
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let yaml = fs::read_to_string(path)
        .map_err(|err| {
            log_failure(&err);
            err
        })
        .with_context(|| format!("Cannot find settings at {}", path.display()))?;

    parse_settings(&yaml).with_context(|| format!("Cannot deserialize settings from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_fields() {
        let settings = parse_settings(
            "imap:\n  server: imap.example.com\n  username: reader@example.com\n",
        )
        .unwrap();

        assert_eq!(settings.imap.port, 993);
        assert_eq!(settings.imap.mailbox, "INBOX");
        assert_eq!(settings.imap.search, "ALL");
        assert!(settings.imap.password.is_none());
        assert!(settings.parse.content_types.is_empty());
        assert_eq!(settings.report.log_file, PathBuf::from("emails.log"));
        assert_eq!(settings.report.attachment_dir, PathBuf::from("attachments"));
    }

    #[test]
    fn test_full_settings() {
        let settings = parse_settings(
            r#"
imap:
  server: imap.example.com
  port: 1993
  username: reader@example.com
  password: secret
  search: UNSEEN
content_types: [text/plain, text/html]
allowed_extensions: [pdf, docx]
report:
  log_file: out/mail.log
  attachment_dir: out/files
"#,
        )
        .unwrap();

        assert_eq!(settings.imap.port, 1993);
        assert_eq!(settings.imap.password.as_deref(), Some("secret"));
        assert_eq!(settings.imap.search, "UNSEEN");
        assert_eq!(settings.parse.content_types, ["text/plain", "text/html"]);
        assert_eq!(settings.parse.allowed_extensions, ["pdf", "docx"]);
        assert_eq!(settings.report.attachment_dir, PathBuf::from("out/files"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_settings(Path::new("does/not/exist.yaml")).is_err());
    }
}
