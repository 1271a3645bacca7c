//! Shoutcast/Icecast in-band metadata.
//!
//! A server asked for `Icy-MetaData: 1` answers with an `icy-metaint` header
//! and then interleaves a metadata block after every `metaint` bytes of audio.
//! The block starts with a length byte (in units of 16 bytes) followed by
//! text like `StreamTitle='Artist - Title';StreamUrl='';`, padded with NULs.

use std::io::{self, Read};

const STREAM_TITLE: &str = "StreamTitle='";

/// Strips the metadata blocks out of an ICY stream, leaving clean audio, and
/// calls `on_title` whenever the stream title changes.
pub struct IcyReader<R> {
    inner: R,
    metaint: usize,
    until_meta: usize,
    last_title: Option<String>,
    on_title: Box<dyn FnMut(String) + Send>,
}

impl<R: Read> IcyReader<R> {
    pub fn new(inner: R, metaint: usize, on_title: impl FnMut(String) + Send + 'static) -> Self {
        Self {
            inner,
            metaint,
            until_meta: metaint,
            last_title: None,
            on_title: Box::new(on_title),
        }
    }

    fn read_metadata(&mut self) -> io::Result<()> {
        let mut len = [0u8; 1];
        self.inner.read_exact(&mut len)?;
        let len = len[0] as usize * 16;
        if len == 0 {
            return Ok(());
        }
        let mut block = vec![0u8; len];
        self.inner.read_exact(&mut block)?;
        if let Some(title) = parse_stream_title(&block) {
            if self.last_title.as_deref() != Some(title.as_str()) {
                log::debug!("stream title: {:?}", title);
                self.last_title = Some(title.clone());
                (self.on_title)(title);
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for IcyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.until_meta == 0 {
            self.read_metadata()?;
            self.until_meta = self.metaint;
        }
        let len = buf.len().min(self.until_meta);
        let n = self.inner.read(&mut buf[..len])?;
        self.until_meta -= n;
        Ok(n)
    }
}

/// Extract the `StreamTitle` value of a metadata block.  Titles may contain
/// quotes, so the value ends at the first `';`, or at the end of the block.
pub fn parse_stream_title(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let text = text.trim_end_matches('\0');
    let start = text.find(STREAM_TITLE)? + STREAM_TITLE.len();
    let rest = &text[start..];
    let value = match rest.find("';") {
        Some(end) => &rest[..end],
        None => rest.strip_suffix('\'').unwrap_or(rest),
    };
    Some(value.to_owned())
}

#[cfg(test)]
mod tests {
    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };

    use super::*;

    fn block(text: &str) -> Vec<u8> {
        let mut data = text.as_bytes().to_vec();
        data.resize(text.len().div_ceil(16) * 16, 0);
        let mut out = vec![(data.len() / 16) as u8];
        out.extend(data);
        out
    }

    #[test]
    fn strips_metadata_and_reports_titles() {
        let mut stream = Vec::new();
        stream.extend(b"abcd");
        stream.extend(block("StreamTitle='Artist - Song';StreamUrl='';"));
        stream.extend(b"efgh");
        stream.push(0);
        stream.extend(b"ijkl");
        stream.extend(block("StreamTitle='Artist - Song';"));
        stream.extend(b"mn");

        let titles = Arc::new(Mutex::new(Vec::new()));
        let mut reader = IcyReader::new(Cursor::new(stream), 4, {
            let titles = Arc::clone(&titles);
            move |title| titles.lock().unwrap().push(title)
        });
        let mut audio = Vec::new();
        reader.read_to_end(&mut audio).unwrap();

        assert_eq!(audio, b"abcdefghijklmn");
        assert_eq!(*titles.lock().unwrap(), vec!["Artist - Song".to_string()]);
    }

    #[test]
    fn stream_title_parsing() {
        assert_eq!(
            parse_stream_title(b"StreamTitle='It's Me - Hello';StreamUrl='x';\0\0").as_deref(),
            Some("It's Me - Hello")
        );
        assert_eq!(
            parse_stream_title(b"StreamTitle='';").as_deref(),
            Some("")
        );
        assert_eq!(
            parse_stream_title(b"StreamTitle='Unterminated'\0").as_deref(),
            Some("Unterminated")
        );
        assert_eq!(parse_stream_title(b"StreamUrl='x';"), None);
    }

    #[test]
    fn truncated_metadata_is_an_eof() {
        let mut stream = b"ab".to_vec();
        stream.push(2);
        stream.extend(b"StreamTitle");
        let mut reader = IcyReader::new(Cursor::new(stream), 2, |_| {});
        let mut audio = Vec::new();
        let err = reader.read_to_end(&mut audio).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
