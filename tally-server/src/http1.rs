use http::header::{CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use tally_core::TallyError;

// ── Pre-built responses ───────────────────────────────────────

pub const RESP_400: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\ncontent-type: application/json\r\ncontent-length: 42\r\nconnection: close\r\n\r\n{\"error\":\"malformed request\",\"status\":400}";

/// Largest request head we buffer before giving up.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Largest request body we accept.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

const MAX_HEADERS: usize = 64;

/// Parsed request line and headers.
#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Offset of the first body byte in the parsed buffer.
    pub body_offset: usize,
    pub content_length: usize,
    pub keep_alive: bool,
}

/// Parse a request head. `Ok(None)` means more bytes are needed.
pub fn parse_head(buf: &[u8]) -> Result<Option<RequestHead>, TallyError> {
    let mut headers_raw = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers_raw);

    let body_offset = match req.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => {
            if buf.len() >= MAX_HEAD_SIZE {
                return Err(TallyError::BadRequest("request head too large".into()));
            }
            return Ok(None);
        }
        Err(e) => return Err(TallyError::BadRequest(e.to_string())),
    };

    let method = req
        .method
        .ok_or_else(|| TallyError::BadRequest("missing method".into()))
        .and_then(|m| {
            Method::from_bytes(m.as_bytes())
                .map_err(|e| TallyError::BadRequest(format!("invalid method: {e}")))
        })?;
    let uri: Uri = req
        .path
        .ok_or_else(|| TallyError::BadRequest("missing request target".into()))?
        .parse()
        .map_err(|e| TallyError::BadRequest(format!("invalid request target: {e}")))?;

    let mut headers = HeaderMap::with_capacity(req.headers.len());
    for h in req.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|e| TallyError::BadRequest(format!("invalid header name: {e}")))?;
        let value = HeaderValue::from_bytes(h.value)
            .map_err(|e| TallyError::BadRequest(format!("invalid header value: {e}")))?;
        headers.append(name, value);
    }

    if headers.contains_key(TRANSFER_ENCODING) {
        return Err(TallyError::BadRequest(
            "transfer-encoding request bodies are not supported".into(),
        ));
    }

    let content_length = match headers.get(CONTENT_LENGTH) {
        Some(v) => v
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .ok_or_else(|| TallyError::BadRequest("invalid content-length".into()))?,
        None => 0,
    };
    if content_length > MAX_BODY_SIZE {
        return Err(TallyError::BadRequest("request body too large".into()));
    }

    let connection = headers.get(CONNECTION).and_then(|v| v.to_str().ok());
    let keep_alive = match req.version {
        // HTTP/1.1: persistent unless told otherwise.
        Some(1) => !connection.is_some_and(|v| v.eq_ignore_ascii_case("close")),
        _ => connection.is_some_and(|v| v.eq_ignore_ascii_case("keep-alive")),
    };

    Ok(Some(RequestHead {
        method,
        uri,
        headers,
        body_offset,
        content_length,
        keep_alive,
    }))
}

/// Encode a response into `buf`. Framing headers set by handlers are
/// replaced by the ones computed here.
///
/// `content-length` always describes `body`; with `include_body` false
/// (HEAD) the body bytes themselves are left off.
pub fn encode_response(
    buf: &mut Vec<u8>,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
    keep_alive: bool,
    include_body: bool,
) {
    buf.clear();
    buf.extend_from_slice(b"HTTP/1.1 ");
    let mut itoa_buf = itoa::Buffer::new();
    buf.extend_from_slice(itoa_buf.format(status.as_u16()).as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(status.canonical_reason().unwrap_or("Unknown").as_bytes());
    buf.extend_from_slice(b"\r\ncontent-length: ");
    buf.extend_from_slice(itoa_buf.format(body.len()).as_bytes());
    if keep_alive {
        buf.extend_from_slice(b"\r\nconnection: keep-alive\r\n");
    } else {
        buf.extend_from_slice(b"\r\nconnection: close\r\n");
    }
    for (name, value) in headers {
        if name == CONTENT_LENGTH || name == CONNECTION || name == TRANSFER_ENCODING {
            continue;
        }
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
    if include_body {
        buf.extend_from_slice(body);
    }
}
