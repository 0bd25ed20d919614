//! `multipart/form-data` body parsing
//!
//! [`Parts`] walks a fully buffered body and lazily yields one [`Part`] per
//! boundary-delimited section:
//!
//! ```text
//! preamble (ignored)
//! --boundary\r\n
//! Content-Disposition: form-data; name="file"; filename="a.txt"\r\n
//! \r\n
//! <payload>\r\n
//! --boundary--\r\n
//! epilogue (ignored)
//! ```
//!
//! Framing problems are reported as [`MultipartError`] instead of being
//! skipped. Payloads are zero-copy slices of the original body.

mod headers;

pub use headers::{parse_boundary, PartHeaders};

use hyper::body::Bytes;
use thiserror::Error;

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Multipart parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultipartError {
    #[error("content type is not multipart/form-data")]
    NotFormData,

    #[error("content type has no boundary parameter")]
    MissingBoundary,

    #[error("body contains no boundary delimiter")]
    MissingDelimiter,

    #[error("part {0} is not followed by a boundary delimiter")]
    UnterminatedPart(usize),

    #[error("part {0} has no blank line between headers and body")]
    MissingHeaderTerminator(usize),
}

/// One section of a multipart body
#[derive(Debug, Clone)]
pub struct Part {
    pub headers: PartHeaders,
    pub body: Bytes,
}

impl Part {
    /// Whether this part is a file upload for the given form field
    pub fn is_file_field(&self, field: &str) -> bool {
        self.headers.name() == Some(field) && self.headers.filename().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the first delimiter
    Preamble,
    /// Positioned right after a delimiter
    Delimiter,
    /// Close delimiter seen or an error was returned
    Done,
}

/// Lazy iterator over the parts of a buffered multipart body
#[derive(Debug)]
pub struct Parts {
    body: Bytes,
    delimiter: Vec<u8>,
    pos: usize,
    index: usize,
    state: State,
}

impl Parts {
    pub fn new(body: Bytes, boundary: &str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 2);
        delimiter.extend_from_slice(b"--");
        delimiter.extend_from_slice(boundary.as_bytes());

        Self {
            body,
            delimiter,
            pos: 0,
            index: 0,
            state: State::Preamble,
        }
    }

    fn fail(&mut self, err: MultipartError) -> Option<Result<Part, MultipartError>> {
        self.state = State::Done;
        Some(Err(err))
    }

    fn next_part(&mut self) -> Option<Result<Part, MultipartError>> {
        let rest = &self.body[self.pos..];

        if rest.starts_with(b"--") {
            self.state = State::Done;
            return None;
        }

        let start = self.pos + usize::from(rest.starts_with(CRLF)) * CRLF.len();

        let Some(offset) = find(&self.body[start..], &self.delimiter) else {
            return self.fail(MultipartError::UnterminatedPart(self.index));
        };
        let delimiter_at = start + offset;
        self.pos = delimiter_at + self.delimiter.len();

        let mut section = self.body.slice(start..delimiter_at);
        if section.ends_with(CRLF) {
            section.truncate(section.len() - CRLF.len());
        }

        let (header_block, payload) = if section.starts_with(CRLF) {
            // No headers at all
            (Bytes::new(), section.slice(CRLF.len()..))
        } else if let Some(sep) = find(&section, HEADER_END) {
            (section.slice(..sep), section.slice(sep + HEADER_END.len()..))
        } else {
            return self.fail(MultipartError::MissingHeaderTerminator(self.index));
        };

        self.index += 1;
        Some(Ok(Part {
            headers: PartHeaders::parse(&header_block),
            body: payload,
        }))
    }
}

impl Iterator for Parts {
    type Item = Result<Part, MultipartError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Done => None,
            State::Preamble => match find(&self.body, &self.delimiter) {
                Some(at) => {
                    self.pos = at + self.delimiter.len();
                    self.state = State::Delimiter;
                    self.next_part()
                }
                None => self.fail(MultipartError::MissingDelimiter),
            },
            State::Delimiter => self.next_part(),
        }
    }
}

impl std::iter::FusedIterator for Parts {}

/// Position of the first occurrence of `needle` in `haystack`
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
