use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use encoding_rs::Encoding;
use log::debug;
use mailparse::{parse_header, parse_mail, MailHeaderMap, ParsedMail};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mail_reader::error::ParseError;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub sender: String,
    pub subject: String,
    pub date: NaiveDateTime,
    pub plain_text: String,
    pub html_text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub size: usize,
    #[serde(skip)]
    content: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: String, content: Vec<u8>) -> Self {
        Attachment {
            filename,
            size: content.len(),
            content,
        }
    }

    pub fn save_as(&self, path: &Path) -> io::Result<()> {
        fs::write(path, &self.content)
    }
}

/// Which body parts and attachments survive parsing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseOptions {
    /// MIME types whose payload may become `plain_text` / `html_text`.
    #[serde(default)]
    pub content_types: Vec<String>,
    /// File extensions (without the dot) kept as attachments.
    #[serde(default)]
    pub allowed_extensions: Vec<String>,
}

impl ParseOptions {
    fn accepts_content_type(&self, mimetype: &str) -> bool {
        self.content_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(mimetype))
    }

    fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.iter().any(|allowed| allowed == extension)
    }
}

fn angle_address() -> &'static Regex {
    static ANGLE_ADDRESS: OnceLock<Regex> = OnceLock::new();
    ANGLE_ADDRESS.get_or_init(|| Regex::new(r"<([^<>]*)>").expect("angle address pattern is valid"))
}

// `"Name" <addr>` yields `addr`; anything without brackets is taken whole
fn extract_address(from: &str) -> String {
    match angle_address().captures(from) {
        Some(captures) => captures[1].trim().to_string(),
        None => from.trim().to_string(),
    }
}

// Decodes RFC 2047 encoded-words found in a bare value, such as a filename
// parameter, by re-parsing it as a header line.
fn decode_words(name: &'static str, value: &str) -> Result<String, ParseError> {
    let line = format!("X-Decode: {}\r\n", value);
    let (header, _) = parse_header(line.as_bytes()).map_err(|source| ParseError::Header {
        name,
        value: value.to_string(),
        source,
    })?;
    Ok(header.get_value())
}

// Keeps the wall-clock components as written. The weekday, zone and any
// trailing comment are ignored.
fn parse_date(value: &str) -> Result<NaiveDateTime, ParseError> {
    let invalid = || ParseError::Date(value.to_string());

    let without_comment = value.split('(').next().unwrap_or(value);
    let without_weekday = match without_comment.split_once(',') {
        Some((_, rest)) => rest,
        None => without_comment,
    };

    let tokens: Vec<&str> = without_weekday.split_whitespace().collect();
    let [day, month, year, time, ..] = tokens.as_slice() else {
        return Err(invalid());
    };

    // Two-digit years follow the obsolete RFC 2822 rule
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let year = match year {
        0..=49 => year + 2000,
        50..=99 => year + 1900,
        _ => year,
    };

    let text = format!("{:0>2} {} {} {}", day, month, year, time);
    ["%d %b %Y %H:%M:%S", "%d %b %Y %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&text, format).ok())
        .ok_or_else(invalid)
}

fn collect_parts<'a, 'b>(part: &'b ParsedMail<'a>, parts: &mut Vec<&'b ParsedMail<'a>>) {
    parts.push(part);
    for subpart in &part.subparts {
        collect_parts(subpart, parts);
    }
}

fn decode_text(part: &ParsedMail, index: usize) -> Result<String, ParseError> {
    let raw = part.get_body_raw()?;
    let charset = part.ctype.charset.as_str();
    let encoding = Encoding::for_label_no_replacement(charset.as_bytes()).ok_or_else(|| {
        ParseError::UnknownCharset {
            part: index,
            charset: charset.to_string(),
        }
    })?;

    encoding
        .decode_without_bom_handling_and_without_replacement(&raw)
        .map(Cow::into_owned)
        .ok_or_else(|| ParseError::Payload {
            part: index,
            charset: encoding.name().to_string(),
        })
}

fn attachment_filename(part: &ParsedMail) -> Result<String, ParseError> {
    let disposition = part.get_content_disposition();
    match disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
    {
        Some(filename) => decode_words("Content-Disposition", filename),
        None => Ok(String::new()),
    }
}

fn extract_attachment(
    part: &ParsedMail,
    index: usize,
    options: &ParseOptions,
) -> Result<Option<Attachment>, ParseError> {
    if part.ctype.mimetype.starts_with("multipart/")
        || part.headers.get_first_header("Content-Disposition").is_none()
    {
        return Ok(None);
    }

    let filename = attachment_filename(part)?;
    let extension = filename.rsplit('.').next().unwrap_or_default();
    if filename.is_empty() || !options.allows_extension(extension) {
        debug!("Dropping part {} with file name {:?}", index, filename);
        return Ok(None);
    }

    let content = part.get_body_raw()?;
    Ok(Some(Attachment::new(filename, content)))
}

/// Parses one raw RFC 822 message.
///
/// Every part is visited depth-first, the top-level part included. A part
/// whose type is accepted by `options` replaces `plain_text` or `html_text`,
/// so the last matching part wins. Any non-multipart part carrying a
/// `Content-Disposition` header and an allowed file extension becomes an
/// attachment.
pub fn parse_message(raw: &[u8], options: &ParseOptions) -> Result<Message, ParseError> {
    let parsed_mail = parse_mail(raw)?;

    let from = parsed_mail
        .headers
        .get_first_value("From")
        .ok_or(ParseError::MissingHeader("From"))?;
    let subject = parsed_mail.headers.get_first_value("Subject").unwrap_or_default();
    let date = parsed_mail
        .headers
        .get_first_value("Date")
        .ok_or(ParseError::MissingHeader("Date"))?;

    let mut parts = Vec::new();
    collect_parts(&parsed_mail, &mut parts);

    let mut plain_text = String::new();
    let mut html_text = String::new();
    let mut attachments = Vec::new();

    for (index, part) in parts.into_iter().enumerate() {
        let mimetype = part.ctype.mimetype.as_str();
        if options.accepts_content_type(mimetype) {
            match mimetype {
                "text/plain" => plain_text = decode_text(part, index)?,
                "text/html" => html_text = decode_text(part, index)?,
                _ => {}
            }
        }

        if let Some(attachment) = extract_attachment(part, index, options)? {
            attachments.push(attachment);
        }
    }

    Ok(Message {
        sender: extract_address(&from),
        subject,
        date: parse_date(&date)?,
        plain_text,
        html_text,
        attachments,
    })
}
