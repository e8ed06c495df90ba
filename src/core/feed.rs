//! Shared transaction feed
//!
//! A mutex-guarded cursor over the transaction section of the input. Workers
//! call [`TransactionFeed::next_line`] and each line is handed to exactly one
//! of them, in file order.
//!
//! Lines are read as raw bytes. A line that is not UTF-8 is still handed out
//! and fails in [`FeedLine::text`], so the worker drops it and moves on.

use crate::types::BankError;
use std::io::BufRead;
use std::sync::{Mutex, PoisonError};
use tracing::error;

/// One transaction line with its 1-based position in the input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLine {
    pub number: usize,
    pub bytes: Vec<u8>,
}

impl FeedLine {
    /// The line as text, line terminator included
    ///
    /// # Errors
    ///
    /// [`BankError::InvalidEncoding`] if the line is not valid UTF-8.
    pub fn text(&self) -> Result<&str, BankError> {
        std::str::from_utf8(&self.bytes).map_err(|e| BankError::invalid_encoding(&e))
    }
}

#[derive(Debug)]
struct Cursor<R> {
    reader: R,
    line_num: usize,
    exhausted: bool,
}

/// Line source shared by every worker
#[derive(Debug)]
pub struct TransactionFeed<R> {
    cursor: Mutex<Cursor<R>>,
}

impl<R: BufRead> TransactionFeed<R> {
    /// Wrap a reader positioned at the first transaction line
    ///
    /// `lines_before` is the number of lines already consumed (the account
    /// header) so that reported line numbers match the input file.
    pub fn new(reader: R, lines_before: usize) -> Self {
        Self {
            cursor: Mutex::new(Cursor {
                reader,
                line_num: lines_before,
                exhausted: false,
            }),
        }
    }

    /// Take the next line, or `None` once the input is exhausted
    ///
    /// An I/O error ends the feed for every worker; it is logged once.
    pub fn next_line(&self) -> Option<FeedLine> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        if cursor.exhausted {
            return None;
        }

        let mut bytes = Vec::new();
        match cursor.reader.read_until(b'\n', &mut bytes) {
            Ok(0) => {
                cursor.exhausted = true;
                None
            }
            Ok(_) => {
                cursor.line_num += 1;
                Some(FeedLine {
                    number: cursor.line_num,
                    bytes,
                })
            }
            Err(e) => {
                error!(
                    "Input read failed after line {}, treating as end of input: {}",
                    cursor.line_num, e
                );
                cursor.exhausted = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::{self, Cursor as IoCursor, Read};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lines_in_order_with_numbers() {
        let feed = TransactionFeed::new(IoCursor::new("D a1 p1 5\n\nC a1"), 5);

        assert_eq!(
            feed.next_line(),
            Some(FeedLine {
                number: 6,
                bytes: b"D a1 p1 5\n".to_vec()
            })
        );
        assert_eq!(feed.next_line().map(|l| l.number), Some(7));
        let last = feed.next_line().unwrap();
        assert_eq!(last.text(), Ok("C a1"));
        assert_eq!(feed.next_line(), None);
        assert_eq!(feed.next_line(), None);
    }

    #[test]
    fn test_each_line_handed_out_once() {
        let input: String = (0..1000).map(|i| format!("C a{}\n", i)).collect();
        let feed = Arc::new(TransactionFeed::new(IoCursor::new(input), 0));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let feed = Arc::clone(&feed);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(line) = feed.next_line() {
                        seen.push(line.number);
                    }
                    seen
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in threads {
            let seen = handle.join().unwrap();
            // Every worker sees its own lines in increasing file order.
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            for number in seen {
                assert!(all.insert(number));
            }
        }
        assert_eq!(all.len(), 1000);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    #[test]
    fn test_undecodable_line_does_not_end_feed() {
        let input: &[u8] = b"D a1 p1 1\nD a1 p1 \xff\xfe\nD a1 p1 10\n";
        let feed = TransactionFeed::new(IoCursor::new(input), 0);

        let first = feed.next_line().unwrap();
        assert_eq!(first.text(), Ok("D a1 p1 1\n"));

        let bad = feed.next_line().unwrap();
        assert_eq!(bad.number, 2);
        assert_eq!(bad.text(), Err(BankError::InvalidEncoding { offset: 8 }));

        let next = feed.next_line().unwrap();
        assert_eq!(next.number, 3);
        assert_eq!(next.text(), Ok("D a1 p1 10\n"));
        assert_eq!(feed.next_line(), None);
    }

    #[test]
    fn test_io_error_ends_feed() {
        let feed = TransactionFeed::new(io::BufReader::new(FailingReader), 0);
        assert_eq!(feed.next_line(), None);
        assert_eq!(feed.next_line(), None);
    }
}
