use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

/// Incoming request descriptor handed to middleware and handlers.
///
/// Built by the host once per request; read-only for everything
/// downstream.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target as received: origin-form (path plus optional query)
    /// or absolute-form.
    pub uri: Uri,
    /// Peer address in `ip:port` form.
    pub remote_addr: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri, remote_addr: impl Into<String>) -> Self {
        Self {
            method,
            uri,
            remote_addr: remote_addr.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Path component only, without the query.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Full request target, query included. Absolute-form targets keep
    /// their scheme and authority.
    pub fn target(&self) -> String {
        if self.uri.scheme().is_some() {
            return self.uri.to_string();
        }
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| self.uri.to_string())
    }
}
