//! Request body framing and the streaming content reader.
//!
//! A request body is never materialized unless a handler asks for it. The
//! connection loop builds a [`BodyState`] from the request head and hands the
//! handler a [`BodyStream`] that pulls the body off the connection in
//! fixed-size chunks, decoding `Transfer-Encoding: chunked` on the way.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::parser::{Error as ParserError, HttpRequest, HttpVersion};
use crate::server::error::Error;

/// Longest chunk-size or trailer line accepted in a chunked body.
const MAX_CHUNK_LINE: u64 = 4096;

/// Most trailer fields skipped after the last chunk.
const MAX_TRAILERS: usize = 64;

/// How many body bytes a caller is willing to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLimit {
    /// Fail with [`Error::PayloadTooLarge`] once more than this many bytes would be read.
    Bounded(u64),
    /// Read until the body ends, however long it is.
    Unbounded,
}

/// The body framing announced by a request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    /// No body at all.
    Empty,
    /// Exactly this many bytes (`Content-Length`).
    Fixed(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// An HTTP/1.0 body that ends when the client closes its side.
    UntilClose,
}

impl BodyLength {
    /// Work out the framing of a request's body.
    ///
    /// Chunked coding wins over `Content-Length`. A request without either
    /// has no body, except for an HTTP/1.0 `POST`/`PUT`/`PATCH`, whose body
    /// runs to the end of the connection.
    pub fn of(request: &HttpRequest) -> Result<Self, ParserError> {
        if request.is_chunked() {
            return Ok(BodyLength::Chunked);
        }
        Ok(match request.content_length()? {
            Some(0) => BodyLength::Empty,
            Some(length) => BodyLength::Fixed(length),
            None if request.version == HttpVersion::Http10 && request.method.expects_body() => {
                BodyLength::UntilClose
            }
            None => BodyLength::Empty,
        })
    }

    /// The body size, when the head declares it.
    pub fn declared(&self) -> Option<u64> {
        match self {
            BodyLength::Empty => Some(0),
            BodyLength::Fixed(length) => Some(*length),
            BodyLength::Chunked | BodyLength::UntilClose => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Remaining(u64),
    ChunkHeader,
    ChunkData(u64),
    UntilClose,
    Done,
}

/// Read progress of one request body.
///
/// Owned by the connection loop so it can tell, after the handler returns,
/// whether the body was consumed completely and the connection can carry
/// another request.
#[derive(Debug)]
pub struct BodyState {
    framing: Framing,
    declared: Option<u64>,
    received: u64,
}

impl BodyState {
    pub fn new(length: BodyLength) -> Self {
        let framing = match length {
            BodyLength::Empty | BodyLength::Fixed(0) => Framing::Done,
            BodyLength::Fixed(length) => Framing::Remaining(length),
            BodyLength::Chunked => Framing::ChunkHeader,
            BodyLength::UntilClose => Framing::UntilClose,
        };
        Self {
            framing,
            declared: length.declared(),
            received: 0,
        }
    }

    /// Whether the end of the body has been reached.
    pub fn is_complete(&self) -> bool {
        self.framing == Framing::Done
    }

    /// Body bytes read so far.
    pub fn received(&self) -> u64 {
        self.received
    }
}

/// Why a content read returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The end of the body was reached.
    Complete,
    /// The chunk consumer or the progress callback asked to stop.
    Stopped,
}

/// What a content read delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSummary {
    /// Bytes handed to the consumer.
    pub bytes: u64,
    /// Number of consumer calls.
    pub chunks: usize,
    pub outcome: ReadOutcome,
}

/// A request body positioned at its first unread byte.
pub struct BodyStream<'a> {
    reader: &'a mut (dyn AsyncBufRead + Unpin + Send),
    state: &'a mut BodyState,
    chunk_size: usize,
}

impl<'a> BodyStream<'a> {
    /// Wrap a connection reader. `chunk_size` is the most bytes handed to a
    /// consumer per call.
    pub fn new(reader: &'a mut (dyn AsyncBufRead + Unpin + Send), state: &'a mut BodyState, chunk_size: usize) -> Self {
        Self {
            reader,
            state,
            chunk_size: chunk_size.max(1),
        }
    }

    /// The declared body size, if the head carried one.
    pub fn declared_length(&self) -> Option<u64> {
        self.state.declared
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Feed the body to `consumer` chunk by chunk.
    ///
    /// See [`BodyStream::read_content_with_progress`].
    pub async fn read_content<C>(&mut self, limit: ReadLimit, consumer: C) -> Result<ReadSummary, Error>
    where
        C: FnMut(&[u8]) -> bool,
    {
        self.read_content_with_progress(limit, |_, _| true, consumer).await
    }

    /// Feed the body to `consumer` chunk by chunk.
    ///
    /// Every chunk is `chunk_size` bytes except the last one, so a body of
    /// `n` bytes arrives in `ceil(n / chunk_size)` calls. The buffer passed to
    /// `consumer` is reused between calls. Reading stops early, without
    /// error, when `consumer` or `progress` returns `false`; `progress`
    /// receives the body bytes read so far and the declared total.
    ///
    /// `limit` caps the whole body, including bytes delivered by earlier
    /// reads on the same stream. A declared `Content-Length` above a bounded
    /// `limit` fails before any byte is read. Bodies of unknown length fail
    /// once they run past the limit, after the first `limit` bytes have been
    /// delivered.
    pub async fn read_content_with_progress<P, C>(
        &mut self,
        limit: ReadLimit,
        mut progress: P,
        mut consumer: C,
    ) -> Result<ReadSummary, Error>
    where
        P: FnMut(u64, Option<u64>) -> bool,
        C: FnMut(&[u8]) -> bool,
    {
        if let (ReadLimit::Bounded(max), Some(declared)) = (limit, self.state.declared) {
            if declared > max {
                return Err(Error::PayloadTooLarge { limit: max });
            }
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut summary = ReadSummary {
            bytes: 0,
            chunks: 0,
            outcome: ReadOutcome::Complete,
        };

        loop {
            let want = match limit {
                ReadLimit::Unbounded => buf.len(),
                ReadLimit::Bounded(max) => {
                    let left = max.saturating_sub(self.state.received);
                    if left == 0 {
                        // Anything past the limit means the body is too big.
                        if self.fill(&mut buf[..1]).await? == 0 {
                            break;
                        }
                        return Err(Error::PayloadTooLarge { limit: max });
                    }
                    left.min(buf.len() as u64) as usize
                }
            };

            let n = self.fill(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            summary.bytes += n as u64;
            summary.chunks += 1;

            if !consumer(&buf[..n]) || !progress(self.state.received, self.state.declared) {
                summary.outcome = ReadOutcome::Stopped;
                break;
            }
        }

        Ok(summary)
    }

    /// Read the remaining body into memory.
    pub async fn read_to_end(&mut self, limit: ReadLimit) -> Result<Vec<u8>, Error> {
        let mut body = Vec::new();
        self.read_content(limit, |chunk| {
            body.extend_from_slice(chunk);
            true
        })
        .await?;
        Ok(body)
    }

    /// Read until `buf` is full or the body ends.
    async fn fill(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_some(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// One read from the connection, honouring the body framing.
    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        loop {
            match self.state.framing {
                Framing::Done => return Ok(0),
                Framing::Remaining(left) => {
                    let n = self.read_framed(buf, left).await?;
                    self.state.framing = if n as u64 == left {
                        Framing::Done
                    } else {
                        Framing::Remaining(left - n as u64)
                    };
                    return Ok(n);
                }
                Framing::UntilClose => {
                    let n = self.reader.read(buf).await?;
                    if n == 0 {
                        self.state.framing = Framing::Done;
                    }
                    self.state.received += n as u64;
                    return Ok(n);
                }
                Framing::ChunkHeader => {
                    let size = self.read_chunk_size().await?;
                    if size == 0 {
                        self.skip_trailers().await?;
                        self.state.framing = Framing::Done;
                    } else {
                        self.state.framing = Framing::ChunkData(size);
                    }
                }
                Framing::ChunkData(left) => {
                    let n = self.read_framed(buf, left).await?;
                    if n as u64 == left {
                        if !self.read_line().await?.is_empty() {
                            return Err(Error::MalformedChunk("missing CRLF after chunk data"));
                        }
                        self.state.framing = Framing::ChunkHeader;
                    } else {
                        self.state.framing = Framing::ChunkData(left - n as u64);
                    }
                    return Ok(n);
                }
            }
        }
    }

    /// Read at most `left` bytes; the connection must not end first.
    async fn read_framed(&mut self, buf: &mut [u8], left: u64) -> Result<usize, Error> {
        let want = left.min(buf.len() as u64) as usize;
        let n = self.reader.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(Error::UnexpectedEof {
                received: self.state.received,
            });
        }
        self.state.received += n as u64;
        Ok(n)
    }

    async fn read_chunk_size(&mut self) -> Result<u64, Error> {
        let line = self.read_line().await?;
        // Chunk extensions after ';' are ignored.
        let size = line.split(';').next().unwrap_or_default().trim();
        u64::from_str_radix(size, 16).map_err(|_| Error::MalformedChunk("invalid chunk size"))
    }

    async fn skip_trailers(&mut self) -> Result<(), Error> {
        for _ in 0..MAX_TRAILERS {
            if self.read_line().await?.is_empty() {
                return Ok(());
            }
        }
        Err(Error::MalformedChunk("too many trailer fields"))
    }

    /// One line of chunk framing, without its line terminator.
    async fn read_line(&mut self) -> Result<String, Error> {
        let mut line = Vec::new();
        let n = (&mut *self.reader)
            .take(MAX_CHUNK_LINE)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            return Err(Error::UnexpectedEof {
                received: self.state.received,
            });
        }
        if line.last() != Some(&b'\n') {
            return Err(Error::MalformedChunk("chunk framing line too long"));
        }
        let line = String::from_utf8(line).map_err(|_| Error::MalformedChunk("chunk framing is not UTF-8"))?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn stream_over<'a>(
        reader: &'a mut (dyn AsyncBufRead + Unpin + Send),
        state: &'a mut BodyState,
        chunk_size: usize,
    ) -> BodyStream<'a> {
        BodyStream::new(reader, state, chunk_size)
    }

    #[tokio::test]
    async fn test_fixed_length_chunks_reassemble_body() {
        let body: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader = BufReader::new(&body[..]);
        let mut state = BodyState::new(BodyLength::Fixed(body.len() as u64));
        let mut stream = stream_over(&mut reader, &mut state, 4096);

        let mut seen = Vec::new();
        let mut sizes = Vec::new();
        let summary = stream
            .read_content(ReadLimit::Unbounded, |chunk| {
                seen.extend_from_slice(chunk);
                sizes.push(chunk.len());
                true
            })
            .await
            .unwrap();

        assert_eq!(seen, body);
        assert_eq!(sizes, vec![4096, 4096, 1808]);
        assert_eq!(summary.bytes, 10_000);
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.outcome, ReadOutcome::Complete);
        assert!(state.is_complete());
    }

    #[tokio::test]
    async fn test_fixed_length_leaves_following_bytes_unread() {
        let input = b"helloGET /next";
        let mut reader = BufReader::new(&input[..]);
        let mut state = BodyState::new(BodyLength::Fixed(5));
        let body = stream_over(&mut reader, &mut state, 4096)
            .read_to_end(ReadLimit::Bounded(64))
            .await
            .unwrap();
        assert_eq!(body, b"hello");

        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "GET /next");
    }

    #[tokio::test]
    async fn test_consumer_stop_delivers_nothing_more() {
        let body = vec![7u8; 100];
        let mut reader = BufReader::new(&body[..]);
        let mut state = BodyState::new(BodyLength::Fixed(100));
        let mut stream = stream_over(&mut reader, &mut state, 10);

        let mut delivered = 0;
        let summary = stream
            .read_content(ReadLimit::Unbounded, |chunk| {
                delivered += chunk.len();
                delivered < 30
            })
            .await
            .unwrap();

        assert_eq!(delivered, 30);
        assert_eq!(summary.bytes, 30);
        assert_eq!(summary.outcome, ReadOutcome::Stopped);
        assert!(!state.is_complete());
        assert_eq!(state.received(), 30);
    }

    #[tokio::test]
    async fn test_progress_reports_totals_and_can_stop() {
        let body = vec![1u8; 50];
        let mut reader = BufReader::new(&body[..]);
        let mut state = BodyState::new(BodyLength::Fixed(50));
        let mut stream = stream_over(&mut reader, &mut state, 20);

        let mut reports = Vec::new();
        let summary = stream
            .read_content_with_progress(
                ReadLimit::Unbounded,
                |read, total| {
                    reports.push((read, total));
                    read < 40
                },
                |_| true,
            )
            .await
            .unwrap();

        assert_eq!(reports, vec![(20, Some(50)), (40, Some(50))]);
        assert_eq!(summary.outcome, ReadOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_reads_nothing() {
        let body = vec![0u8; 100];
        let mut reader = BufReader::new(&body[..]);
        let mut state = BodyState::new(BodyLength::Fixed(100));
        let mut calls = 0;
        let result = stream_over(&mut reader, &mut state, 16)
            .read_content(ReadLimit::Bounded(99), |_| {
                calls += 1;
                true
            })
            .await;

        assert!(matches!(result, Err(Error::PayloadTooLarge { limit: 99 })));
        assert_eq!(calls, 0);
        assert_eq!(state.received(), 0);
    }

    #[tokio::test]
    async fn test_truncated_fixed_body_is_an_error() {
        let body = b"short";
        let mut reader = BufReader::new(&body[..]);
        let mut state = BodyState::new(BodyLength::Fixed(10));
        let result = stream_over(&mut reader, &mut state, 4096)
            .read_to_end(ReadLimit::Unbounded)
            .await;
        assert!(matches!(result, Err(Error::UnexpectedEof { received: 5 })));
    }

    #[tokio::test]
    async fn test_chunked_body_is_decoded_across_chunks() {
        let wire = b"4;ext=1\r\nWiki\r\n5\r\npedia\r\nE\r\n in\r\n\r\nchunks.\r\n0\r\nX-Trailer: yes\r\n\r\nNEXT";
        let mut reader = BufReader::new(&wire[..]);
        let mut state = BodyState::new(BodyLength::Chunked);
        let mut stream = stream_over(&mut reader, &mut state, 8);

        let mut seen = Vec::new();
        let summary = stream
            .read_content(ReadLimit::Unbounded, |chunk| {
                seen.extend_from_slice(chunk);
                true
            })
            .await
            .unwrap();

        assert_eq!(seen, b"Wikipedia in\r\n\r\nchunks.");
        assert_eq!(summary.bytes, 23);
        assert_eq!(summary.chunks, 3);
        assert!(state.is_complete());

        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "NEXT");
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit() {
        let wire = b"a\r\n0123456789\r\n0\r\n\r\n";
        let mut reader = BufReader::new(&wire[..]);
        let mut state = BodyState::new(BodyLength::Chunked);
        let mut delivered = Vec::new();
        let result = stream_over(&mut reader, &mut state, 4)
            .read_content(ReadLimit::Bounded(8), |chunk| {
                delivered.extend_from_slice(chunk);
                true
            })
            .await;

        assert!(matches!(result, Err(Error::PayloadTooLarge { limit: 8 })));
        assert_eq!(delivered, b"01234567");
    }

    #[tokio::test]
    async fn test_limit_spans_repeated_reads() {
        let wire = b"f\r\n0123456789abcde\r\n0\r\n\r\n";
        let mut reader = BufReader::new(&wire[..]);
        let mut state = BodyState::new(BodyLength::Chunked);
        let mut stream = stream_over(&mut reader, &mut state, 4);

        let first = stream.read_content(ReadLimit::Bounded(10), |_| false).await.unwrap();
        assert_eq!(first.bytes, 4);
        assert_eq!(first.outcome, ReadOutcome::Stopped);

        let mut delivered = Vec::new();
        let second = stream
            .read_content(ReadLimit::Bounded(10), |chunk| {
                delivered.extend_from_slice(chunk);
                true
            })
            .await;
        assert!(matches!(second, Err(Error::PayloadTooLarge { limit: 10 })));
        assert_eq!(delivered, b"456789");
    }

    #[tokio::test]
    async fn test_chunked_body_exactly_at_limit() {
        let wire = b"8\r\n01234567\r\n0\r\n\r\n";
        let mut reader = BufReader::new(&wire[..]);
        let mut state = BodyState::new(BodyLength::Chunked);
        let body = stream_over(&mut reader, &mut state, 4)
            .read_to_end(ReadLimit::Bounded(8))
            .await
            .unwrap();
        assert_eq!(body, b"01234567");
        assert!(state.is_complete());
    }

    #[tokio::test]
    async fn test_malformed_chunk_framing() {
        let cases: [&[u8]; 3] = [
            b"zz\r\nabc\r\n0\r\n\r\n",
            b"3\r\nabcX\r\n0\r\n\r\n",
            b"3\r\nab",
        ];
        for wire in cases {
            let mut reader = BufReader::new(wire);
            let mut state = BodyState::new(BodyLength::Chunked);
            let result = stream_over(&mut reader, &mut state, 16)
                .read_to_end(ReadLimit::Unbounded)
                .await;
            assert!(
                matches!(result, Err(Error::MalformedChunk(_)) | Err(Error::UnexpectedEof { .. })),
                "unexpected result for {:?}: {result:?}",
                String::from_utf8_lossy(wire)
            );
        }
    }

    #[tokio::test]
    async fn test_until_close_reads_to_eof() {
        let body = b"legacy body";
        let mut reader = BufReader::new(&body[..]);
        let mut state = BodyState::new(BodyLength::UntilClose);
        let read = stream_over(&mut reader, &mut state, 4)
            .read_to_end(ReadLimit::Unbounded)
            .await
            .unwrap();
        assert_eq!(read, body);
        assert!(state.is_complete());
    }

    #[tokio::test]
    async fn test_empty_body_is_complete_from_the_start() {
        let mut reader = BufReader::new(&b"GET / HTTP/1.1"[..]);
        let mut state = BodyState::new(BodyLength::Empty);
        assert!(state.is_complete());
        let mut calls = 0;
        let summary = stream_over(&mut reader, &mut state, 4)
            .read_content(ReadLimit::Bounded(0), |_| {
                calls += 1;
                true
            })
            .await
            .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(summary.bytes, 0);
        assert_eq!(summary.outcome, ReadOutcome::Complete);
    }
}
