//! Integration tests: Pipeline → AccessRecorder → ResponseObserver → sink
//!
//! These run the recorder the way a host does, as the outermost middleware
//! of a pipeline, and check the logged line against what the client would
//! actually receive.

use http::{Method, StatusCode, Uri};
use std::sync::Arc;
use std::thread;
use tally_core::handler::{Handler, Middleware, Pipeline};
use tally_core::request::Request;
use tally_core::response::{BufferedResponse, ResponseSink};
use tally_observability::{AccessRecorder, LogLine, MemorySink};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_req(method: Method, target: &'static str) -> Request {
    Request::new(method, Uri::from_static(target), "127.0.0.1:54321")
}

fn pipeline_with(
    format: Option<&str>,
    endpoint: Arc<dyn Handler>,
) -> (Pipeline, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let recorder = AccessRecorder::with_sink(format, sink.clone());
    (Pipeline::new(endpoint).with(Arc::new(recorder)), sink)
}

/// Inner middleware that overrides the status after the endpoint wrote.
struct LateStatus;

impl Middleware for LateStatus {
    fn name(&self) -> &str {
        "late-status"
    }

    fn handle(&self, w: &mut dyn ResponseSink, req: &Request, next: &dyn Handler) {
        next.serve(w, req);
        w.set_status(StatusCode::SERVICE_UNAVAILABLE);
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn default_format_line_for_health_check() {
    let (pipeline, sink) = pipeline_with(
        None,
        Arc::new(|w: &mut dyn ResponseSink, _req: &Request| {
            w.write_all(&[b'x'; 128]).unwrap();
        }),
    );
    let mut resp = BufferedResponse::new();
    pipeline.serve(&mut resp, &make_req(Method::GET, "/health"));

    let lines = sink.access_lines();
    assert_eq!(lines.len(), 1);
    let fields: Vec<&str> = lines[0].split(' ').collect();
    assert_eq!(fields.len(), 6, "line was {:?}", lines[0]);
    assert_eq!(fields[0], "127.0.0.1:54321");
    assert_eq!(fields[1], "GET");
    assert_eq!(fields[2], "/health");
    assert!(fields[3].parse::<u64>().is_ok());
    assert_eq!(fields[4], "128");
    assert_eq!(fields[5], "200");
}

#[test]
fn logged_status_matches_wire_status() {
    let cases: Vec<(&str, Arc<dyn Handler>, u16)> = vec![
        (
            "implicit",
            Arc::new(|w: &mut dyn ResponseSink, _req: &Request| {
                w.write_all(b"ok").unwrap();
            }) as Arc<dyn Handler>,
            200,
        ),
        (
            "explicit",
            Arc::new(|w: &mut dyn ResponseSink, _req: &Request| {
                w.set_status(StatusCode::NOT_FOUND);
            }) as Arc<dyn Handler>,
            404,
        ),
        (
            "double-set",
            Arc::new(|w: &mut dyn ResponseSink, _req: &Request| {
                w.set_status(StatusCode::OK);
                w.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                w.write_all(b"body").unwrap();
            }) as Arc<dyn Handler>,
            200,
        ),
    ];

    for (label, endpoint, expected) in cases {
        let (pipeline, sink) = pipeline_with(Some("{{.Status}}"), endpoint);
        let mut resp = BufferedResponse::new();
        pipeline.serve(&mut resp, &make_req(Method::GET, "/"));
        assert_eq!(sink.access_lines(), vec![expected.to_string()], "{label}");
        assert_eq!(resp.status().as_u16(), expected, "{label}");
    }
}

#[test]
fn late_status_from_inner_middleware_does_not_change_the_log() {
    let sink = Arc::new(MemorySink::new());
    let recorder = AccessRecorder::with_sink(Some("{{.Status}} {{.WriteSize}}"), sink.clone());
    let pipeline = Pipeline::new(Arc::new(|w: &mut dyn ResponseSink, _req: &Request| {
        w.write_all(b"hello").unwrap();
    }))
    .with(Arc::new(recorder))
    .with(Arc::new(LateStatus));

    let mut resp = BufferedResponse::new();
    pipeline.serve(&mut resp, &make_req(Method::GET, "/"));

    assert_eq!(sink.access_lines(), vec!["200 5"]);
    assert_eq!(resp.status(), StatusCode::OK);
}

#[test]
fn silent_endpoint_logs_unset_status_even_though_wire_defaults_to_ok() {
    let (pipeline, sink) = pipeline_with(
        Some("{{.Status}} {{.WriteSize}}"),
        Arc::new(|_w: &mut dyn ResponseSink, _req: &Request| {}),
    );
    let mut resp = BufferedResponse::new();
    pipeline.serve(&mut resp, &make_req(Method::HEAD, "/silent"));

    assert_eq!(sink.access_lines(), vec!["0 0"]);
    assert!(!resp.is_committed());
    assert_eq!(resp.status(), StatusCode::OK);
}

#[test]
fn size_is_what_the_client_gets_when_the_sink_caps_the_body() {
    let (pipeline, sink) = pipeline_with(
        Some("{{.WriteSize}}"),
        Arc::new(|w: &mut dyn ResponseSink, _req: &Request| {
            let _ = w.write(b"0123456789");
            let err = w.write(b"more").unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::StorageFull);
        }),
    );
    let mut resp = BufferedResponse::with_body_limit(6);
    pipeline.serve(&mut resp, &make_req(Method::GET, "/big"));

    assert_eq!(sink.access_lines(), vec!["6"]);
    assert_eq!(resp.body(), b"012345");
}

#[test]
fn malformed_format_never_fails_the_request() {
    let (pipeline, sink) = pipeline_with(
        Some("{{.RemoteAddr} {{.Status}}"),
        Arc::new(|w: &mut dyn ResponseSink, _req: &Request| {
            w.write_all(b"still served").unwrap();
        }),
    );
    let mut resp = BufferedResponse::new();
    pipeline.serve(&mut resp, &make_req(Method::GET, "/"));

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.body(), b"still served");
    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(matches!(&lines[0], LogLine::Diagnostic(msg) if msg.starts_with("template: access:1:")));
    assert_eq!(lines[1], LogLine::Access(String::new()));
}

#[test]
fn one_recorder_serves_concurrent_requests() {
    let sink = Arc::new(MemorySink::new());
    let recorder = AccessRecorder::with_sink(Some("{{.URLPath}} {{.WriteSize}}"), sink.clone());
    let pipeline = Arc::new(
        Pipeline::new(Arc::new(|w: &mut dyn ResponseSink, req: &Request| {
            w.write_all(req.path().as_bytes()).unwrap();
        }))
        .with(Arc::new(recorder)),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                let uri: Uri = format!("/worker/{i}").parse().unwrap();
                let req = Request::new(Method::GET, uri, "10.0.0.1:1000");
                let mut resp = BufferedResponse::new();
                pipeline.serve(&mut resp, &req);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let mut lines = sink.access_lines();
    lines.sort();
    assert_eq!(lines.len(), 8);
    for (i, line) in lines.iter().enumerate() {
        let path = format!("/worker/{i}");
        assert_eq!(*line, format!("{path} {}", path.len()));
    }
}
