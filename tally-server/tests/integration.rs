//! Host-side dispatch without sockets: Routes behind the access recorder,
//! driven through `connection::dispatch` the way each connection does.

use http::{Method, StatusCode, Uri};
use std::sync::Arc;
use tally_core::{Pipeline, Request, ResponseSink};
use tally_observability::{AccessRecorder, LogLine, MemorySink};
use tally_server::connection::dispatch;
use tally_server::routes::Routes;

fn standard(format: Option<&str>) -> (Pipeline, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let recorder = AccessRecorder::with_sink(format, sink.clone());
    let pipeline = Pipeline::new(Arc::new(Routes::standard().unwrap())).with(Arc::new(recorder));
    (pipeline, sink)
}

fn get(target: &'static str) -> Request {
    Request::new(Method::GET, Uri::from_static(target), "192.0.2.7:40000")
}

fn exploding(w: &mut dyn ResponseSink, _req: &Request) {
    w.set_status(StatusCode::ACCEPTED);
    panic!("handler blew up");
}

#[test]
fn default_format_through_standard_routes() {
    let (pipeline, sink) = standard(None);
    let resp = dispatch(&pipeline, &get("/health"));
    assert_eq!(resp.status(), StatusCode::OK);

    let line = &sink.access_lines()[0];
    let fields: Vec<&str> = line.split(' ').collect();
    assert_eq!(fields[..3], ["192.0.2.7:40000", "GET", "/health"]);
    assert!(fields[3].parse::<u64>().is_ok());
    assert_eq!(fields[4..], ["2", "200"]);
}

#[test]
fn not_found_and_method_not_allowed_are_logged_with_their_bodies() {
    let (pipeline, sink) = standard(Some("{{.Status}} {{.WriteSize}}"));

    let missing = dispatch(&pipeline, &get("/missing"));
    let wrong = dispatch(
        &pipeline,
        &Request::new(Method::GET, Uri::from_static("/echo"), "192.0.2.7:40000"),
    );

    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(wrong.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        sink.access_lines(),
        vec![
            format!("404 {}", missing.body().len()),
            format!("405 {}", wrong.body().len()),
        ]
    );
}

#[test]
fn panicking_handler_becomes_500_and_is_still_logged() {
    let sink = Arc::new(MemorySink::new());
    let recorder = AccessRecorder::with_sink(Some("{{.URLPath}} {{.Status}}"), sink.clone());
    let pipeline = Pipeline::new(Arc::new(exploding)).with(Arc::new(recorder));

    let resp = dispatch(&pipeline, &get("/boom"));

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["status"], 500);
    // The log reports what the handler committed before it died.
    assert_eq!(sink.access_lines(), vec!["/boom 202"]);
}

#[test]
fn unknown_field_still_serves_and_logs_partial_line() {
    let (pipeline, sink) = standard(Some("{{.HTTPMethod}} {{.Referer}}"));
    let resp = dispatch(&pipeline, &get("/health"));

    assert_eq!(resp.body(), b"ok");
    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(matches!(&lines[0], LogLine::Diagnostic(msg) if msg.contains("Referer")));
    assert_eq!(lines[1], LogLine::Access("GET ".into()));
}

#[test]
fn absolute_form_target_is_logged_in_full() {
    let (pipeline, sink) = standard(Some("{{.URLPath}} {{.Status}}"));
    let req = Request::new(
        Method::GET,
        Uri::from_static("http://example.com/health?check=1"),
        "192.0.2.7:40000",
    );
    let resp = dispatch(&pipeline, &req);

    assert_eq!(resp.body(), b"ok");
    assert_eq!(
        sink.access_lines(),
        vec!["http://example.com/health?check=1 200"]
    );
}

#[test]
fn head_request_runs_the_get_route() {
    let (pipeline, sink) = standard(Some("{{.Status}} {{.WriteSize}}"));
    let req = Request::new(Method::HEAD, Uri::from_static("/health"), "192.0.2.7:40000");
    let resp = dispatch(&pipeline, &req);

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(sink.access_lines(), vec!["200 2"]);
}
