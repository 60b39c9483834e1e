use super::{ApiResponse, Transport, TransportError};
use crate::redact::redact_secrets;
use crate::session::{ApiRequest, Method, SessionContext};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CLIENT_USER_AGENT: &str = concat!("camsports-core/", env!("CARGO_PKG_VERSION"));

fn build_headers(context: &SessionContext) -> HeaderMap {
  let mut headers = HeaderMap::new();
  headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
  headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
  if let Some(value) = context.authorization() {
    if let Ok(mut value) = HeaderValue::from_str(&value) {
      value.set_sensitive(true);
      headers.insert(AUTHORIZATION, value);
    }
  }
  headers
}

fn map_method(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Delete => reqwest::Method::DELETE,
  }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
  if e.is_timeout() {
    return TransportError::Timeout;
  }
  let msg = redact_secrets(&e.to_string()).into_owned();
  if e.is_builder() {
    TransportError::InvalidRequest(msg)
  } else {
    TransportError::Network(msg)
  }
}

fn join_url(base_url: &str, path: &str) -> String {
  let base = base_url.trim_end_matches('/');
  if path.starts_with('/') {
    format!("{base}{path}")
  } else {
    format!("{base}/{path}")
  }
}

/// reqwest-backed transport bound to one backend base URL.
pub struct HttpTransport {
  http: reqwest::Client,
  base_url: String,
}

impl HttpTransport {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
    let base_url = base_url.trim();
    if base_url.is_empty() {
      return Err(TransportError::InvalidRequest("base URL is empty".to_string()));
    }
    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(map_reqwest_error)?;
    Ok(Self {
      http,
      base_url: base_url.to_string(),
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }
}

impl Transport for HttpTransport {
  async fn execute(
    &self,
    context: &SessionContext,
    request: &ApiRequest,
  ) -> Result<ApiResponse, TransportError> {
    let url = join_url(&self.base_url, request.path());
    let mut builder = self
      .http
      .request(map_method(request.method()), url)
      .headers(build_headers(context));
    if let Some(body) = request.body() {
      builder = builder.json(body);
    }

    let res = builder.send().await.map_err(map_reqwest_error)?;
    let status = res.status().as_u16();
    let body = res.text().await.map_err(map_reqwest_error)?;
    tracing::debug!(
      method = ?request.method(),
      path = %request.path(),
      attempt = request.attempt(),
      status,
      "api request completed"
    );
    Ok(ApiResponse { status, body })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn join_url_handles_slashes() {
    assert_eq!(
      join_url("http://127.0.0.1:5000/", "/auth/refresh"),
      "http://127.0.0.1:5000/auth/refresh"
    );
    assert_eq!(
      join_url("http://127.0.0.1:5000", "message_board/t1"),
      "http://127.0.0.1:5000/message_board/t1"
    );
  }

  #[test]
  fn build_headers_attaches_bearer_only_when_present() {
    let headers = build_headers(&SessionContext::anonymous());
    assert!(headers.get(AUTHORIZATION).is_none());

    let headers = build_headers(&SessionContext::bearer("a1"));
    assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer a1");
  }

  #[test]
  fn new_rejects_empty_base_url() {
    assert!(matches!(
      HttpTransport::new("  ", DEFAULT_REQUEST_TIMEOUT),
      Err(TransportError::InvalidRequest(_))
    ));
  }
}
