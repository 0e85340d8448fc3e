use thiserror::Error;

/// Failure to turn one raw message into a [`Message`](super::message::Message).
///
/// Parts are identified by their 0-based index in depth-first document order,
/// the top-level part being index 0.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("message has no {0} header")]
    MissingHeader(&'static str),
    #[error("cannot decode {name} header {value:?}: {source}")]
    Header {
        name: &'static str,
        value: String,
        #[source]
        source: mailparse::MailParseError,
    },
    #[error("unparseable Date header {0:?}")]
    Date(String),
    #[error("part {part} declares unknown charset {charset:?}")]
    UnknownCharset { part: usize, charset: String },
    #[error("part {part} is not valid {charset}")]
    Payload { part: usize, charset: String },
    #[error("malformed MIME structure: {0}")]
    Mime(#[from] mailparse::MailParseError),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("imap error: {0}")]
    Imap(#[from] async_imap::error::Error),
    #[error("server returned no body for uid {uid}")]
    MissingBody { uid: u32 },
    #[error("cannot parse message uid {uid}: {source}")]
    Parse {
        uid: u32,
        #[source]
        source: ParseError,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to write attachment with unsafe file name {0:?}")]
    UnsafeFilename(String),
    #[error("no message at position {position} (count {count})")]
    OutOfRange { position: usize, count: usize },
}
