//! Output framing for prompt-driven child programs
//!
//! The child's output has no message boundaries, so the pump frames it
//! heuristically: a chunk ends at every newline, and at the prompt marker
//! even when the prompt is not followed by a newline. Scanning happens one
//! byte at a time because a prompt like `"> "` is usually printed without a
//! line terminator and a line-buffered reader would never return it.
//!
//! # Known limitation
//!
//! A marker that appears as literal text inside regular output (for example
//! a line containing `"a > b"` split exactly after `"> "`) is
//! indistinguishable from the readiness prompt and ends the chunk there.
//! Resolving this needs a framing guarantee from the child itself.

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Splits a byte stream into newline- and prompt-terminated chunks
#[derive(Debug, Clone)]
pub struct ChunkFramer {
    buffer: Vec<u8>,
    marker: Vec<u8>,
}

impl ChunkFramer {
    /// Create a framer for the given prompt marker
    pub fn new(marker: impl Into<Vec<u8>>) -> Self {
        Self {
            buffer: Vec::new(),
            marker: marker.into(),
        }
    }

    /// Append one byte, returning a chunk if it completes one
    ///
    /// A newline is checked first; the marker test only applies when the
    /// byte is not a newline.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        self.buffer.push(byte);

        let complete = byte == b'\n'
            || (!self.marker.is_empty() && self.buffer.ends_with(&self.marker));

        complete.then(|| std::mem::take(&mut self.buffer))
    }

    /// Take whatever is buffered, if anything
    ///
    /// Used at end-of-stream so a trailing partial line is not lost.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        (!self.buffer.is_empty()).then(|| std::mem::take(&mut self.buffer))
    }

    /// Bytes received since the last emitted chunk
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

/// What a pump saw before its stream ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSummary {
    /// Bytes read from the stream
    pub bytes_read: u64,

    /// Chunks pushed onto the queue
    pub chunks_emitted: u64,
}

/// Background task moving child output into the pending-output queue
///
/// Knows nothing about commands: it frames and forwards for the whole
/// lifetime of the stream, whether or not a command is outstanding.
pub struct OutputPump<R> {
    reader: R,
    framer: ChunkFramer,
    sink: UnboundedSender<String>,
}

impl<R> OutputPump<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Create a pump reading `reader` and framing on `marker`
    pub fn new(reader: R, marker: &str, sink: UnboundedSender<String>) -> Self {
        Self {
            reader,
            framer: ChunkFramer::new(marker.as_bytes()),
            sink,
        }
    }

    /// Run the pump on the tokio runtime
    pub fn spawn(self) -> JoinHandle<PumpSummary> {
        tokio::spawn(self.run())
    }

    /// Read until end-of-stream
    ///
    /// Ends silently on end-of-stream or a read error; the absence of further
    /// output is observed by the session through liveness checks and
    /// timeouts. Also ends once nobody holds the queue's receiving side.
    pub async fn run(mut self) -> PumpSummary {
        // Buffered reads return as soon as any bytes are available, so the
        // per-byte scan below does not delay a prompt without a newline.
        let mut reader = BufReader::new(&mut self.reader);
        let mut summary = PumpSummary::default();

        loop {
            let byte = match reader.read_u8().await {
                Ok(byte) => byte,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    debug!("output stream read failed: {}", e);
                    break;
                }
            };
            summary.bytes_read += 1;

            if let Some(chunk) = self.framer.push(byte) {
                if !Self::emit(&self.sink, chunk, &mut summary) {
                    debug!("output queue closed, stopping pump");
                    return summary;
                }
            }
        }

        if let Some(rest) = self.framer.finish() {
            Self::emit(&self.sink, rest, &mut summary);
        }

        debug!(
            bytes = summary.bytes_read,
            chunks = summary.chunks_emitted,
            "output stream ended"
        );
        summary
    }

    fn emit(sink: &UnboundedSender<String>, chunk: Vec<u8>, summary: &mut PumpSummary) -> bool {
        let text = String::from_utf8_lossy(&chunk).into_owned();
        trace!(chunk = ?text, "framed output chunk");

        if sink.send(text).is_err() {
            return false;
        }
        summary.chunks_emitted += 1;
        true
    }
}
