//! Newline-terminated line codec.
//!
//! Decoding never fails on content: bytes that are not UTF-8 are replaced
//! lossily, and a line longer than the limit is dropped up to its newline.
//! Only socket errors end a stream.

use bytes::BytesMut;
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

pub struct LineCodec {
    /// Index of the next byte to check for a newline.
    next_index: usize,
    max_len: usize,
    /// Inside an over-long line; skip until its newline.
    discarding: bool,
}

impl LineCodec {
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    if !self.discarding {
                        warn!(limit = self.max_len, "Line too long, discarding");
                    }
                    src.clear();
                    self.discarding = true;
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if std::mem::take(&mut self.discarding) || line.len() > self.max_len {
                continue;
            }

            let line = line.strip_suffix(b"\n").unwrap_or(&line[..]);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}
