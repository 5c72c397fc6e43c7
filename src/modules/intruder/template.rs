use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

/// Placeholder replaced by the rotating token in header values.
pub const TOKEN_PLACEHOLDER: &str = "pload1";
/// Placeholder replaced by the candidate in the body template.
pub const CANDIDATE_PLACEHOLDER: &str = "pload2";

const TRANSPORT_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("missing blank line between headers and body")]
    MissingBody,
    #[error("request line '{0}' is not 'METHOD PATH PROTOCOL'")]
    BadRequestLine(String),
    #[error("invalid url '{0}'")]
    BadUrl(String),
}

/// Header map plus body template, fixed once the run starts.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestTemplate {
    pub url: reqwest::Url,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A request ready to go on the wire for one (token, candidate) pair.
#[derive(Debug)]
pub struct RenderedRequest {
    pub headers: HeaderMap,
    pub body: String,
}

impl RequestTemplate {
    pub fn new(url: &str, headers: Vec<(String, String)>, body: &str) -> Result<Self, TemplateError> {
        let url = reqwest::Url::parse(url).map_err(|_| TemplateError::BadUrl(url.to_string()))?;
        Ok(Self {
            url,
            headers,
            body: body.to_string(),
        })
    }

    /// Parse a raw HTTP request block: request line, headers, blank line, body.
    /// The URL is always rebuilt as `https://{Host}{path}`.
    pub fn parse_raw(raw: &str) -> Result<Self, TemplateError> {
        let normalized = raw.replace("\r\n", "\n");
        let (head, body) = normalized
            .trim_start()
            .split_once("\n\n")
            .ok_or(TemplateError::MissingBody)?;

        let mut lines = head.trim().lines();
        let request_line = lines.next().unwrap_or("").trim();
        let parts: Vec<&str> = request_line.splitn(3, ' ').collect();
        if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(TemplateError::BadRequestLine(request_line.to_string()));
        }
        let path = parts[1];

        let mut headers = Vec::new();
        let mut host = "localhost".to_string();
        for line in lines {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                let value = value.trim();
                if key.eq_ignore_ascii_case("host") && host == "localhost" {
                    host = value.to_string();
                }
                headers.push((key.to_string(), value.to_string()));
            }
        }

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        let url = format!("https://{}{}", host, path);
        let url = reqwest::Url::parse(&url).map_err(|_| TemplateError::BadUrl(url))?;

        Ok(Self {
            url,
            headers,
            body: body.trim().to_string(),
        })
    }

    /// Header names the client cannot send; `render` skips them.
    pub fn invalid_header_names(&self) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| HeaderName::from_bytes(key.as_bytes()).is_err())
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Substitute the token into every header value carrying the placeholder and the
    /// candidate into the body. A JSON object body is re-serialized compactly and the
    /// stale Content-Length is always dropped so the client recomputes it.
    pub fn render(&self, token: &str, candidate: &str) -> RenderedRequest {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.headers {
            let value = if value.contains(TOKEN_PLACEHOLDER) {
                value.replace(TOKEN_PLACEHOLDER, token)
            } else {
                value.clone()
            };
            if let (Ok(name), Ok(val)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(&value)) {
                headers.append(name, val);
            }
        }
        // The client derives these from the url and the body.
        for name in TRANSPORT_HEADERS {
            headers.remove(*name);
        }

        let substituted = self.body.replace(CANDIDATE_PLACEHOLDER, candidate);
        let body = match serde_json::from_str::<serde_json::Value>(&substituted) {
            Ok(value @ serde_json::Value::Object(_)) => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                serde_json::to_string(&value).unwrap_or(substituted)
            }
            _ => substituted,
        };

        RenderedRequest { headers, body }
    }
}
