use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::mail_reader::error::MailError;
use crate::mail_reader::message::Message;

const MESSAGE_RULE: &str = "###################################";
const TOTAL_RULE: &str = "***************************";

/// Writes the plain-text digest, one numbered block per message.
pub struct ReportWriter<W: Write> {
    out: W,
    counter: usize,
}

impl ReportWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(ReportWriter::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        ReportWriter { out, counter: 0 }
    }

    pub fn count(&self) -> usize {
        self.counter
    }

    pub fn write_message(&mut self, message: &Message) -> io::Result<()> {
        self.counter += 1;
        writeln!(self.out, "{}", MESSAGE_RULE)?;
        writeln!(self.out, "Message: {}", self.counter)?;
        writeln!(self.out, "{}", MESSAGE_RULE)?;
        writeln!(self.out, "{}", message.sender)?;
        writeln!(self.out, "{}", message.subject)?;
        writeln!(self.out, "{}", message.date.format("%d.%m.%Y %H:%M:%S"))?;
        writeln!(self.out, "{}", message.plain_text)
    }

    /// Appends the total line and hands back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        writeln!(self.out, "{}", TOTAL_RULE)?;
        writeln!(self.out, "Total: {}", self.counter)?;
        writeln!(self.out, "{}\n", TOTAL_RULE)?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Whether an attachment name can be used as a single file inside the
/// attachment directory.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        // Blocks `.`, `..` and hidden files
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains(|c: char| c.is_control())
}

pub fn attachment_path(dir: &Path, filename: &str) -> Result<PathBuf, MailError> {
    if is_safe_filename(filename) {
        Ok(dir.join(filename))
    } else {
        Err(MailError::UnsafeFilename(filename.to_string()))
    }
}

/// Writes every attachment of `message` into `dir` and returns how many were
/// written. Unsafe file names are skipped with a warning.
pub fn save_attachments(message: &Message, dir: &Path) -> Result<usize, MailError> {
    let mut saved = 0;
    for attachment in &message.attachments {
        let path = match attachment_path(dir, &attachment.filename) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        attachment.save_as(&path)?;
        info!("Saved {} ({} bytes)", path.display(), attachment.size);
        saved += 1;
    }
    Ok(saved)
}
