use crate::observer::ResponseObserver;
use crate::sink::{LogSink, TracingSink};
use crate::template::{FieldSource, Template, TemplateError, Value};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tally_core::handler::{Handler, Middleware};
use tally_core::request::Request;
use tally_core::response::ResponseSink;

/// Address, method, target, milliseconds, bytes, status.
pub const DEFAULT_FORMAT: &str =
    "{{.RemoteAddr}} {{.HTTPMethod}} {{.URLPath}} {{.TimeSpend}} {{.WriteSize}} {{.Status}}";

/// One request's worth of access-log data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub remote_addr: String,
    pub http_method: String,
    pub url_path: String,
    /// Whole milliseconds spent in the downstream chain.
    pub time_spend_ms: u64,
    pub write_size: usize,
    /// `0` when the handler neither set a status nor wrote a body.
    pub status: u16,
}

impl AccessRecord {
    /// Template variables an access record provides.
    pub const FIELDS: [&'static str; 6] = [
        "RemoteAddr",
        "HTTPMethod",
        "URLPath",
        "TimeSpend",
        "WriteSize",
        "Status",
    ];
}

impl FieldSource for AccessRecord {
    fn field(&self, name: &str) -> Option<Value<'_>> {
        let value = match name {
            "RemoteAddr" => Value::Str(&self.remote_addr),
            "HTTPMethod" => Value::Str(&self.http_method),
            "URLPath" => Value::Str(&self.url_path),
            "TimeSpend" => Value::Uint(self.time_spend_ms),
            "WriteSize" => Value::Uint(self.write_size as u64),
            "Status" => Value::Uint(u64::from(self.status)),
            _ => return None,
        };
        Some(value)
    }
}

/// Access-log middleware: times the downstream chain, observes the
/// response, and emits exactly one line per request.
///
/// The format is compiled once at construction and shared read-only, so a
/// single recorder serves every worker. A format that fails to compile is
/// not fatal: each request then logs a diagnostic followed by an empty
/// access line.
pub struct AccessRecorder {
    template: Result<Template, TemplateError>,
    sink: Arc<dyn LogSink>,
}

impl AccessRecorder {
    /// Recorder logging through `tracing`. `None` selects [`DEFAULT_FORMAT`].
    pub fn new(format: Option<&str>) -> Self {
        Self::with_sink(format, Arc::new(TracingSink))
    }

    pub fn with_sink(format: Option<&str>, sink: Arc<dyn LogSink>) -> Self {
        let source = format.unwrap_or(DEFAULT_FORMAT);
        let template = Template::parse(source);
        if let Err(e) = &template {
            tracing::warn!(error = %e, format = %source, "Access log format does not parse");
        }
        Self { template, sink }
    }

    /// Strict constructor: rejects a format that does not parse or that
    /// names a field an [`AccessRecord`] does not have.
    pub fn try_new(format: Option<&str>) -> Result<Self, TemplateError> {
        let template = Template::parse(format.unwrap_or(DEFAULT_FORMAT))?;
        if let Some(name) = template
            .fields()
            .find(|name| !AccessRecord::FIELDS.iter().any(|known| known == name))
        {
            return Err(TemplateError::UnknownField {
                name: name.to_string(),
            });
        }
        Ok(Self {
            template: Ok(template),
            sink: Arc::new(TracingSink),
        })
    }

    /// The compiled template, or why it failed to compile.
    pub fn template(&self) -> Result<&Template, &TemplateError> {
        self.template.as_ref()
    }

    /// Render one record. On failure the partial line is returned with the
    /// error.
    pub fn render(&self, record: &AccessRecord) -> Result<String, (String, TemplateError)> {
        let mut line = String::new();
        match &self.template {
            Ok(template) => match template.render(record, &mut line) {
                Ok(()) => Ok(line),
                Err(e) => Err((line, e)),
            },
            Err(e) => Err((line, e.clone())),
        }
    }

    /// Run `next` behind an observer and log the outcome.
    ///
    /// The line is emitted even if `next` panics; the panic is resumed
    /// afterwards so the host still sees it.
    pub fn record(&self, w: &mut dyn ResponseSink, req: &Request, next: &dyn Handler) {
        let start = Instant::now();
        let mut observer = ResponseObserver::new(w);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| next.serve(&mut observer, req)));

        let elapsed = start.elapsed();
        let record = AccessRecord {
            remote_addr: req.remote_addr.clone(),
            http_method: req.method.to_string(),
            url_path: req.target(),
            time_spend_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            write_size: observer.size(),
            status: observer.status_code(),
        };
        self.emit(&record);

        if let Err(payload) = outcome {
            panic::resume_unwind(payload);
        }
    }

    fn emit(&self, record: &AccessRecord) {
        let line = match self.render(record) {
            Ok(line) => line,
            Err((partial, e)) => {
                self.sink.diagnostic(&e.to_string());
                partial
            }
        };
        self.sink.access(&line);
    }
}

impl Middleware for AccessRecorder {
    fn name(&self) -> &str {
        "access-log"
    }

    fn handle(&self, w: &mut dyn ResponseSink, req: &Request, next: &dyn Handler) {
        self.record(w, req, next);
    }
}
