use anyhow::{Context, Result};
use colored::*;
use flate2::read::{GzDecoder, ZlibDecoder};
use reqwest::{header, Client};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::template::RequestTemplate;

/// Deadline for one request, connect through last body byte.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static BROTLI_WARNED: AtomicBool = AtomicBool::new(false);

/// What came back for one (token, candidate) pair. Transport failures are folded in
/// with `error` set and the failure description as the body.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub token: String,
    pub candidate: String,
    pub status: Option<u16>,
    pub body: String,
    pub error: bool,
}

impl ProbeOutcome {
    pub fn response(token: &str, candidate: &str, status: u16, body: String) -> Self {
        Self {
            token: token.to_string(),
            candidate: candidate.to_string(),
            status: Some(status),
            body,
            error: false,
        }
    }

    pub fn transport_error(token: &str, candidate: &str, description: String) -> Self {
        Self {
            token: token.to_string(),
            candidate: candidate.to_string(),
            status: None,
            body: description,
            error: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    template: RequestTemplate,
    verbose: bool,
}

impl Dispatcher {
    pub fn new(template: RequestTemplate, verbose: bool) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            template,
            verbose,
        })
    }

    /// Send one POST. Never fails: transport and body errors become error outcomes.
    pub async fn probe(&self, token: &str, candidate: &str) -> ProbeOutcome {
        let rendered = self.template.render(token, candidate);
        let request = self
            .client
            .post(self.template.url.clone())
            .headers(rendered.headers)
            .body(rendered.body.clone());

        let outcome = match request.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let encoding = resp
                    .headers()
                    .get(header::CONTENT_ENCODING)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                match resp.bytes().await {
                    Ok(raw) => ProbeOutcome::response(token, candidate, status, decode_body(&encoding, &raw)),
                    Err(e) => ProbeOutcome::transport_error(token, candidate, describe_error(&e)),
                }
            }
            Err(e) => ProbeOutcome::transport_error(token, candidate, describe_error(&e)),
        };

        if self.verbose {
            print_debug(&outcome, &rendered.body);
        }
        outcome
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else if e.is_body() || e.is_decode() {
        format!("body read failed: {}", e)
    } else {
        e.to_string()
    }
}

/// Decode a response body per its Content-Encoding. Anything that cannot be
/// decompressed falls back to lossy UTF-8 of the raw bytes.
pub fn decode_body(encoding: &str, raw: &[u8]) -> String {
    let decompressed = match encoding.trim() {
        "gzip" | "x-gzip" => inflate(GzDecoder::new(raw)),
        "deflate" => inflate(ZlibDecoder::new(raw)),
        "br" => {
            if !BROTLI_WARNED.swap(true, Ordering::Relaxed) {
                println!(
                    "\n{}",
                    "[!] Brotli responses are not supported; decoding raw bytes instead".yellow()
                );
            }
            None
        }
        _ => None,
    };
    match decompressed {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => String::from_utf8_lossy(raw).into_owned(),
    }
}

fn inflate<R: Read>(mut decoder: R) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok().map(|_| out)
}

fn print_debug(outcome: &ProbeOutcome, sent_body: &str) {
    let preview: String = outcome.body.chars().take(500).collect();
    println!("\n{} candidate: {}", "[DEBUG]".dimmed(), outcome.candidate);
    match outcome.status {
        Some(status) => println!("{} status: {}", "[DEBUG]".dimmed(), status),
        None => println!("{} error: {}", "[DEBUG]".dimmed(), outcome.body),
    }
    println!("{} token: {}", "[DEBUG]".dimmed(), outcome.token);
    println!("{} sent: {}", "[DEBUG]".dimmed(), sent_body);
    if !outcome.error {
        println!("{} body: {}", "[DEBUG]".dimmed(), preview);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Router};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    async fn echo(headers: HeaderMap, body: String) -> String {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        format!("{}|{}", auth, body)
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/check", addr)
    }

    #[test]
    fn decodes_gzip() {
        assert_eq!(decode_body("gzip", &gzip("hello")), "hello");
    }

    #[test]
    fn corrupt_gzip_falls_back_to_raw() {
        assert_eq!(decode_body("gzip", b"plain"), "plain");
    }

    #[test]
    fn brotli_falls_back_to_raw() {
        assert_eq!(decode_body("br", b"{\"ok\":1}"), "{\"ok\":1}");
        assert_eq!(decode_body("", b"abc"), "abc");
    }

    #[tokio::test]
    async fn probe_substitutes_token_and_candidate() {
        let url = serve(Router::new().route("/check", post(echo))).await;
        let template = RequestTemplate::new(
            &url,
            vec![
                ("Authorization".into(), "pload1".into()),
                ("Content-Length".into(), "999".into()),
            ],
            r#"{"mobile":"pload2"}"#,
        )
        .unwrap();
        let dispatcher = Dispatcher::new(template, false).unwrap();

        let outcome = dispatcher.probe("T1", "555").await;
        assert!(!outcome.error);
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.body, r#"T1|{"mobile":"555"}"#);
    }

    #[tokio::test]
    async fn gzip_responses_are_decoded() {
        let app = Router::new().route(
            "/check",
            post(|| async { ([("content-encoding", "gzip")], gzip("TOO_MANY_REQUEST")) }),
        );
        let url = serve(app).await;
        let dispatcher = Dispatcher::new(RequestTemplate::new(&url, vec![], "x").unwrap(), false).unwrap();

        let outcome = dispatcher.probe("t", "c").await;
        assert_eq!(outcome.body, "TOO_MANY_REQUEST");
    }

    #[tokio::test]
    async fn transport_failure_is_an_error_outcome() {
        // bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/check", addr);
        let dispatcher = Dispatcher::new(RequestTemplate::new(&url, vec![], "x").unwrap(), false).unwrap();
        let outcome = dispatcher.probe("t", "c").await;
        assert!(outcome.error);
        assert_eq!(outcome.status, None);
        assert!(!outcome.body.is_empty());
    }
}
