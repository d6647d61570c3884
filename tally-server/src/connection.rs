use crate::http1::{RESP_400, encode_response, parse_head};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, StatusCode};
use monoio::io::{AsyncReadRent, AsyncWriteRentExt};
use monoio::net::TcpStream;
use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tally_core::{BufferedResponse, Handler, Pipeline, Request, ResponseSink, TallyError};

/// Handle a single client connection (HTTP/1.1 with keepalive).
///
/// Buffers are allocated once and reused across keepalive requests.
/// Bytes read past the end of one request stay in `pending` and start
/// the next one, so pipelined clients are served in order.
pub async fn handle_connection(
    mut client: TcpStream,
    peer_addr: SocketAddr,
    pipeline: Arc<Pipeline>,
) -> anyhow::Result<()> {
    let remote_addr = peer_addr.to_string();

    let mut read_buf = vec![0u8; 8192];
    let mut pending: Vec<u8> = Vec::with_capacity(8192);
    let mut resp_buf = Vec::with_capacity(4096);

    loop {
        // ── Read until a full head is buffered ──
        let head = loop {
            if !pending.is_empty() {
                match parse_head(&pending) {
                    Ok(Some(head)) => break head,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(peer = %remote_addr, error = %e, "Malformed request");
                        let (res, _) = client.write_all(RESP_400.to_vec()).await;
                        res?;
                        return Ok(());
                    }
                }
            }

            let (res, returned_buf) = client.read(read_buf).await;
            read_buf = returned_buf;
            match res {
                Ok(0) => return Ok(()),
                Ok(n) => pending.extend_from_slice(&read_buf[..n]),
                Err(e) => return Err(e.into()),
            }
        };

        // ── Read the rest of the body ──
        let total = head.body_offset + head.content_length;
        while pending.len() < total {
            let (res, returned_buf) = client.read(read_buf).await;
            read_buf = returned_buf;
            match res {
                Ok(0) => return Ok(()),
                Ok(n) => pending.extend_from_slice(&read_buf[..n]),
                Err(e) => return Err(e.into()),
            }
        }

        let body = Bytes::copy_from_slice(&pending[head.body_offset..total]);
        pending.drain(..total);

        let keep_alive = head.keep_alive;
        let is_head = head.method == Method::HEAD;
        let req = Request::new(head.method, head.uri, remote_addr.as_str())
            .with_headers(head.headers)
            .with_body(body);

        // ── Run the pipeline (synchronous, no await) ──
        let resp = dispatch(&pipeline, &req);
        let (status, headers, body) = resp.into_parts();

        encode_response(&mut resp_buf, status, &headers, &body, keep_alive, !is_head);
        let (res, returned_resp) = client.write_all(resp_buf).await;
        resp_buf = returned_resp;
        res?;

        if !keep_alive {
            return Ok(());
        }
    }
}

/// Run `req` through the pipeline into a fresh buffered response.
///
/// A panicking handler yields a 500 instead of taking the worker down.
pub fn dispatch(pipeline: &Pipeline, req: &Request) -> BufferedResponse {
    let mut resp = BufferedResponse::new();
    let outcome = catch_unwind(AssertUnwindSafe(|| pipeline.serve(&mut resp, req)));
    if outcome.is_ok() {
        return resp;
    }

    tracing::error!(method = %req.method, path = %req.path(), "Handler panicked");
    let err = TallyError::Internal("handler panicked".into());
    let mut resp = BufferedResponse::new();
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp.set_status(StatusCode::INTERNAL_SERVER_ERROR);
    if let Err(e) = resp.write_all(&err.to_json_body()) {
        tracing::debug!(error = %e, "Error body not fully written");
    }
    resp
}
