use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// How a message arrived on the wire. Responses go back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// One JSON document per line (MCP stdio transport).
    Line,
    /// `Content-Length` headers, blank line, then the JSON body.
    ContentLength,
}

/// One inbound message. `payload` is `Err` when the bytes were not valid JSON;
/// the caller answers with a parse error and keeps reading.
#[derive(Debug)]
pub struct Frame {
    pub framing: Framing,
    pub payload: Result<Value, serde_json::Error>,
}

/// Largest `Content-Length` body accepted before the stream is abandoned.
pub const MAX_FRAMED_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Read the next message. `Ok(None)` on clean EOF.
///
/// Lines are read as raw bytes, so input that is not UTF-8 surfaces as an
/// unparseable payload rather than a read error.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Frame>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = Vec::new();
        let bytes_read = reader.read_until(b'\n', &mut line).await?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(first_header) = content_length_header(trimmed) {
            let length = read_headers(reader, first_header).await?;
            let mut payload = vec![0_u8; length];
            reader.read_exact(&mut payload).await?;
            return Ok(Some(Frame {
                framing: Framing::ContentLength,
                payload: serde_json::from_slice(&payload),
            }));
        }

        return Ok(Some(Frame {
            framing: Framing::Line,
            payload: serde_json::from_slice(trimmed),
        }));
    }
}

fn content_length_header(line: &[u8]) -> Option<&str> {
    let line = std::str::from_utf8(line).ok()?;
    let (name, value) = line.split_once(':')?;
    name.trim()
        .eq_ignore_ascii_case("content-length")
        .then(|| value.trim())
}

async fn read_headers<R>(reader: &mut R, raw_len: &str) -> Result<usize, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let content_length = raw_len.parse::<usize>().map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Invalid Content-Length header",
        )
    })?;
    if content_length > MAX_FRAMED_BODY_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Content-Length {content_length} exceeds the {MAX_FRAMED_BODY_BYTES} byte limit"
            ),
        ));
    }

    // Skip any further headers (Content-Type etc.) up to the blank separator.
    loop {
        let mut line = Vec::new();
        let bytes_read = reader.read_until(b'\n', &mut line).await?;
        if bytes_read == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }
        if line.trim_ascii().is_empty() {
            return Ok(content_length);
        }
    }
}

pub async fn write_message<W>(
    writer: &mut W,
    framing: Framing,
    value: &Value,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}
