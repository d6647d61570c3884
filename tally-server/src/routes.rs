use http::header::{ALLOW, CONTENT_TYPE};
use http::{HeaderValue, Method, StatusCode};
use matchit::{Params, Router as MatchitRouter};
use std::collections::HashMap;
use tally_core::{Handler, Request, ResponseSink, TallyError};
use tracing::debug;

/// Route endpoint. Gets the path parameters captured by the match.
pub type Endpoint = fn(&mut dyn ResponseSink, &Request, &Params<'_, '_>);

/// Method-aware route table over radix trees.
///
/// One tree per method for lookups, plus a method-less tree that only
/// answers "does this path exist at all" so misses can be told apart
/// into 404 and 405. HEAD falls back to the GET tree.
pub struct Routes {
    method_routers: HashMap<Method, MatchitRouter<Endpoint>>,
    paths: MatchitRouter<Vec<Method>>,
    /// Path patterns registered so far, in registration order.
    patterns: Vec<String>,
    count: usize,
}

impl Default for Routes {
    fn default() -> Self {
        Self::new()
    }
}

impl Routes {
    pub fn new() -> Self {
        Self {
            method_routers: HashMap::new(),
            paths: MatchitRouter::new(),
            patterns: Vec::new(),
            count: 0,
        }
    }

    /// The routes served by the `tally` binary.
    pub fn standard() -> Result<Self, TallyError> {
        let mut routes = Self::new();
        routes.add(Method::GET, "/health", health)?;
        routes.add(Method::POST, "/echo", echo)?;
        routes.add(Method::GET, "/status/{code}", status)?;
        routes.add(Method::GET, "/silent", silent)?;
        Ok(routes)
    }

    /// Register `endpoint` for `method` on `path`.
    pub fn add(&mut self, method: Method, path: &str, endpoint: Endpoint) -> Result<(), TallyError> {
        self.method_routers
            .entry(method.clone())
            .or_insert_with(MatchitRouter::new)
            .insert(path, endpoint)
            .map_err(|e| TallyError::Config(format!("route {method} {path}: {e}")))?;

        if self.patterns.iter().any(|p| p == path) {
            if let Ok(found) = self.paths.at_mut(path) {
                found.value.push(method.clone());
            }
        } else {
            self.paths
                .insert(path, vec![method.clone()])
                .map_err(|e| TallyError::Config(format!("route {method} {path}: {e}")))?;
            self.patterns.push(path.to_string());
        }

        self.count += 1;
        debug!(method = %method, path = %path, "Route added");
        Ok(())
    }

    /// Methods accepted for whatever pattern `path` matches, HEAD included
    /// wherever GET is.
    pub fn allowed(&self, path: &str) -> Vec<Method> {
        let mut methods = self
            .paths
            .at(path)
            .map(|m| m.value.clone())
            .unwrap_or_default();
        if methods.contains(&Method::GET) && !methods.contains(&Method::HEAD) {
            methods.push(Method::HEAD);
        }
        methods
    }

    fn lookup<'r, 'p>(
        &'r self,
        method: &Method,
        path: &'p str,
    ) -> Option<matchit::Match<'r, 'p, &'r Endpoint>> {
        self.method_routers
            .get(method)
            .and_then(|router| router.at(path).ok())
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Handler for Routes {
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request) {
        let matched = self.lookup(&req.method, req.path()).or_else(|| {
            if req.method == Method::HEAD {
                self.lookup(&Method::GET, req.path())
            } else {
                None
            }
        });
        if let Some(matched) = matched {
            (matched.value)(w, req, &matched.params);
            return;
        }

        let allowed = self.allowed(req.path());
        if allowed.is_empty() {
            write_error(w, StatusCode::NOT_FOUND, "not found");
            return;
        }

        let list = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&list) {
            w.headers_mut().insert(ALLOW, value);
        }
        write_error(w, StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
    }
}

/// JSON error reply, same shape as the connection-level error bodies.
pub fn write_error(w: &mut dyn ResponseSink, status: StatusCode, message: &str) {
    let body = format!(
        r#"{{"error":"{}","status":{}}}"#,
        message.replace('"', "'"),
        status.as_u16()
    );
    w.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.set_status(status);
    if let Err(e) = w.write_all(body.as_bytes()) {
        debug!(error = %e, "Error body not fully written");
    }
}

// ── Endpoints ────────────────────────────────────────────────

fn health(w: &mut dyn ResponseSink, _req: &Request, _params: &Params<'_, '_>) {
    w.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    if let Err(e) = w.write_all(b"ok") {
        debug!(error = %e, "Health body not fully written");
    }
}

fn echo(w: &mut dyn ResponseSink, req: &Request, _params: &Params<'_, '_>) {
    if let Some(ct) = req.headers.get(CONTENT_TYPE) {
        w.headers_mut().insert(CONTENT_TYPE, ct.clone());
    }
    if req.body.is_empty() {
        return;
    }
    if let Err(e) = w.write_all(&req.body) {
        debug!(error = %e, "Echo body not fully written");
    }
}

/// Commits the requested status with an empty body.
fn status(w: &mut dyn ResponseSink, _req: &Request, params: &Params<'_, '_>) {
    let code = params
        .get("code")
        .and_then(|c| c.parse::<u16>().ok())
        .and_then(|c| StatusCode::from_u16(c).ok());
    match code {
        Some(code) => w.set_status(code),
        None => write_error(w, StatusCode::BAD_REQUEST, "invalid status code"),
    }
}

fn silent(_w: &mut dyn ResponseSink, _req: &Request, _params: &Params<'_, '_>) {}
