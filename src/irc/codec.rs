use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed};
use tracing::warn;

/// RFC 1459 caps a line at 512 bytes including CRLF; servers with tags allow more.
const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// CRLF line codec that tolerates non-UTF-8 bytes from legacy clients.
pub struct IrcLineCodec {
    max_length: usize,
    discarding: bool,
}

impl IrcLineCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            discarding: false,
        }
    }
}

impl Default for IrcLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for IrcLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(newline) = src.iter().position(|byte| *byte == b'\n') else {
                if src.len() > self.max_length {
                    warn!("dropping oversized irc line ({} bytes)", src.len());
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let frame = src.split_to(newline + 1);
            if self.discarding {
                self.discarding = false;
                continue;
            }

            let mut line = &frame[..newline];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.is_empty() {
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }
}

impl Encoder<String> for IrcLineCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line: String = item.chars().filter(|c| *c != '\r' && *c != '\n').collect();
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

pub type IrcConnection<S> = Framed<S, IrcLineCodec>;

pub fn new_irc_connection<S: AsyncRead + AsyncWrite>(stream: S) -> IrcConnection<S> {
    Framed::new(stream, IrcLineCodec::new())
}
