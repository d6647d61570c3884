use http::{HeaderMap, StatusCode};
use std::io;

/// Response-writing capability handed to handlers.
///
/// Mirrors the classic "write header, then write body" contract: the first
/// status committed is the one sent, and writing a body without a prior
/// status implies `200 OK`.
pub trait ResponseSink {
    /// Response headers; only meaningful before the status is committed.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Commit the response status.
    fn set_status(&mut self, status: StatusCode);

    /// Append body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Write the whole buffer, failing if the sink stops accepting bytes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole response body",
                    ));
                }
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

/// In-memory response assembled by the host before it goes on the wire.
///
/// Behaves like the protocol layer: the first status wins, later attempts
/// are ignored, and a body write with no status commits `200 OK`.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    body_limit: Option<usize>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the body size; writes past the cap are truncated, then rejected.
    pub fn with_body_limit(limit: usize) -> Self {
        Self {
            body_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Status that goes on the wire (`200 OK` when nothing was committed).
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    /// Whether a status was committed explicitly or by a body write.
    pub fn is_committed(&self) -> bool {
        self.status.is_some()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status(), self.headers, self.body)
    }
}

impl ResponseSink for BufferedResponse {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn set_status(&mut self, status: StatusCode) {
        match self.status {
            None => self.status = Some(status),
            Some(current) => {
                tracing::warn!(
                    current = current.as_u16(),
                    ignored = status.as_u16(),
                    "superfluous set_status call"
                );
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        let accepted = match self.body_limit {
            Some(limit) => {
                let room = limit.saturating_sub(self.body.len());
                if room == 0 && !buf.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::StorageFull,
                        format!("response body limit of {limit} bytes exceeded"),
                    ));
                }
                buf.len().min(room)
            }
            None => buf.len(),
        };
        self.body.extend_from_slice(&buf[..accepted]);
        Ok(accepted)
    }
}
