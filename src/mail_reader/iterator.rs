use log::info;

use crate::mail_reader::error::MailError;
use crate::mail_reader::imap::MailSession;
use crate::mail_reader::message::{parse_message, Message, ParseOptions};

struct RawMessage {
    uid: u32,
    body: Vec<u8>,
}

/// Forward-only cursor over the messages fetched by one search.
///
/// Raw bytes are fetched once in [`MailIterator::open`]; every call to
/// [`MailIterator::current`] parses them again.
pub struct MailIterator {
    raw_items: Vec<RawMessage>,
    position: usize,
    options: ParseOptions,
}

impl MailIterator {
    pub async fn open<S: MailSession>(
        session: &mut S,
        filter: &str,
        options: ParseOptions,
    ) -> Result<Self, MailError> {
        let uids = session.search(filter).await?;
        info!("-- {} message(s) match {}", uids.len(), filter);

        let mut raw_items = Vec::with_capacity(uids.len());
        for uid in uids {
            let body = session.fetch(uid).await?;
            raw_items.push(RawMessage { uid, body });
        }

        Ok(MailIterator {
            raw_items,
            position: 0,
            options,
        })
    }

    pub fn len(&self) -> usize {
        self.raw_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_items.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.position < self.raw_items.len()
    }

    pub fn current(&self) -> Result<Message, MailError> {
        let item = self.raw_items.get(self.position).ok_or(MailError::OutOfRange {
            position: self.position,
            count: self.raw_items.len(),
        })?;
        parse_message(&item.body, &self.options).map_err(|source| MailError::Parse {
            uid: item.uid,
            source,
        })
    }

    /// Moves to the next message. Stops at the end instead of running past it.
    pub fn advance(&mut self) {
        if self.has_next() {
            self.position += 1;
        }
    }

    pub async fn close<S: MailSession>(self, session: &mut S) -> Result<(), MailError> {
        session.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{sample_message, FakeSession};

    fn plain_options() -> ParseOptions {
        ParseOptions {
            content_types: vec!["text/plain".to_string()],
            allowed_extensions: vec![],
        }
    }

    #[tokio::test]
    async fn test_empty_search_has_no_next() {
        let mut session = FakeSession::new(vec![]);
        let iterator = MailIterator::open(&mut session, "ALL", plain_options()).await.unwrap();
        assert_eq!(iterator.len(), 0);
        assert!(!iterator.has_next());
        assert!(matches!(
            iterator.current(),
            Err(MailError::OutOfRange { position: 0, count: 0 })
        ));
    }

    #[tokio::test]
    async fn test_open_fetches_every_match_in_order() {
        let mut session = FakeSession::new(vec![
            (7, sample_message("first@example.com", "one", "")),
            (3, sample_message("second@example.com", "two", "")),
        ]);
        let mut iterator = MailIterator::open(&mut session, "UNSEEN", plain_options()).await.unwrap();

        assert_eq!(session.searches, vec!["UNSEEN".to_string()]);
        assert_eq!(session.fetched, vec![7, 3]);

        assert_eq!(iterator.current().unwrap().sender, "first@example.com");
        iterator.advance();
        assert_eq!(iterator.current().unwrap().sender, "second@example.com");
    }

    #[tokio::test]
    async fn test_current_reparses_without_moving() {
        let mut session = FakeSession::new(vec![(1, sample_message("a@example.com", "hello", ""))]);
        let iterator = MailIterator::open(&mut session, "ALL", plain_options()).await.unwrap();

        let first = iterator.current().unwrap();
        let second = iterator.current().unwrap();
        assert_eq!(first.subject, second.subject);
        assert_eq!(first.plain_text, second.plain_text);
        assert!(iterator.has_next());
    }

    #[tokio::test]
    async fn test_advance_count_times_exhausts_and_saturates() {
        let mut session = FakeSession::new(vec![
            (1, sample_message("a@example.com", "a", "")),
            (2, sample_message("b@example.com", "b", "")),
            (3, sample_message("c@example.com", "c", "")),
        ]);
        let mut iterator = MailIterator::open(&mut session, "ALL", plain_options()).await.unwrap();

        for _ in 0..3 {
            assert!(iterator.has_next());
            iterator.advance();
        }
        assert!(!iterator.has_next());

        iterator.advance();
        assert!(matches!(
            iterator.current(),
            Err(MailError::OutOfRange { position: 3, count: 3 })
        ));
    }

    #[tokio::test]
    async fn test_parse_failure_names_the_uid() {
        let mut session = FakeSession::new(vec![(42, b"Subject: nothing else\r\n\r\nbody\r\n".to_vec())]);
        let iterator = MailIterator::open(&mut session, "ALL", plain_options()).await.unwrap();
        assert!(matches!(iterator.current(), Err(MailError::Parse { uid: 42, .. })));
    }

    #[tokio::test]
    async fn test_close_delegates_to_session() {
        let mut session = FakeSession::new(vec![]);
        let iterator = MailIterator::open(&mut session, "ALL", plain_options()).await.unwrap();
        iterator.close(&mut session).await.unwrap();
        assert!(session.closed);
    }
}
