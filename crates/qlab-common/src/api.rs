use std::marker::PhantomData;

use bytes::Bytes;
use http::{
    HeaderValue, Request, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::AuthorizationToken;
use crate::error::{AuthError, ClientError, DecodeError, EncodeError, HttpError, Result, TransportError, ValidationError};
use crate::http_client::HttpClient;

const JSON: &str = "application/json";

/// HTTP method of an API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    /// Read-only query, no request body
    Get,
    /// JSON body, creates or triggers something
    Post,
    /// JSON body, replaces a resource
    Put,
}

impl ApiMethod {
    /// Whether requests with this method carry a JSON body.
    pub const fn has_body(self) -> bool {
        !matches!(self, ApiMethod::Get)
    }
}

impl From<ApiMethod> for http::Method {
    fn from(method: ApiMethod) -> Self {
        match method {
            ApiMethod::Get => http::Method::GET,
            ApiMethod::Post => http::Method::POST,
            ApiMethod::Put => http::Method::PUT,
        }
    }
}

/// A typed JSON endpoint.
///
/// The implementing type is the request body; `Output` is the schema the
/// response body is validated against.
pub trait ApiRequest: Serialize {
    /// Path below the base URL, e.g. `/api/token/`.
    const PATH: &'static str;
    /// HTTP method.
    const METHOD: ApiMethod;
    /// Response body schema.
    type Output: DeserializeOwned;

    /// Encode the request body.
    fn encode_body(&self) -> core::result::Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Per-request options.
#[derive(Debug, Default, Clone)]
pub struct CallOptions {
    /// Optional Authorization to apply.
    pub auth: Option<AuthorizationToken>,
}

/// Extension for stateless API calls on any `HttpClient`.
///
/// Example
/// ```no_run
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use qlab_common::api::ApiExt;
///
/// let http = reqwest::Client::new();
/// let base = url::Url::parse("http://localhost:8000")?;
/// // let resp = http.api(base).send(&request).await?;
/// # Ok(())
/// # }
/// ```
pub trait ApiExt: HttpClient {
    /// Start building an API call for the given base URL.
    fn api(&self, base: Url) -> ApiCall<'_, Self>
    where
        Self: Sized,
    {
        ApiCall {
            client: self,
            base,
            opts: CallOptions::default(),
        }
    }
}

impl<T: HttpClient> ApiExt for T {}

/// Stateless API call builder.
pub struct ApiCall<'a, C: HttpClient> {
    pub(crate) client: &'a C,
    pub(crate) base: Url,
    pub(crate) opts: CallOptions,
}

impl<'a, C: HttpClient> ApiCall<'a, C> {
    /// Apply Authorization to this call.
    pub fn auth(mut self, token: AuthorizationToken) -> Self {
        self.opts.auth = Some(token);
        self
    }

    /// Send the given typed request and return a response wrapper.
    ///
    /// Non-2xx statuses come back as errors: 401 as [`AuthError::Unauthorized`],
    /// 400 as [`ValidationError`], anything else as [`HttpError`].
    #[tracing::instrument(level = "trace", skip(self, request), fields(path = R::PATH))]
    pub async fn send<R>(self, request: &R) -> Result<Response<R>>
    where
        R: ApiRequest,
    {
        let http_request = build_http_request(&self.base, request, &self.opts)?;

        let http_response = self
            .client
            .send_http(http_request)
            .await
            .map_err(TransportError::from_client_error)?;

        process_response(http_response)
    }
}

/// Map an HTTP response onto a typed response or the matching error.
#[inline]
pub fn process_response<R>(http_response: http::Response<Vec<u8>>) -> Result<Response<R>>
where
    R: ApiRequest,
{
    let status = http_response.status();
    let buffer = Bytes::from(http_response.into_body());

    if status.is_success() {
        return Ok(Response::new(buffer, status));
    }

    let error = HttpError {
        status,
        body: (!buffer.is_empty()).then_some(buffer),
    };
    Err(match status {
        StatusCode::UNAUTHORIZED => AuthError::Unauthorized(error).into(),
        StatusCode::BAD_REQUEST => ValidationError::from(error).into(),
        _ => error.into(),
    })
}

/// Build an HTTP request for an API call given base URL and options
pub fn build_http_request<R>(
    base: &Url,
    req: &R,
    opts: &CallOptions,
) -> core::result::Result<Request<Vec<u8>>, TransportError>
where
    R: ApiRequest,
{
    let mut url = base.clone();
    let mut path = url.path().trim_end_matches('/').to_owned();
    path.push_str(R::PATH);
    url.set_path(&path);

    let mut builder = Request::builder()
        .method(http::Method::from(R::METHOD))
        .uri(url.as_str())
        .header(ACCEPT, JSON);

    if R::METHOD.has_body() {
        builder = builder.header(CONTENT_TYPE, JSON);
    }

    if let Some(token) = &opts.auth {
        let hv = HeaderValue::from_str(&token.header_value()).map_err(|e| {
            TransportError::InvalidRequest(format!("Invalid authorization token: {}", e))
        })?;
        builder = builder.header(AUTHORIZATION, hv);
    }

    let body = if R::METHOD.has_body() {
        req.encode_body()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?
    } else {
        vec![]
    };

    builder
        .body(body)
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

/// Successful API response that owns its body buffer.
#[derive(Debug)]
pub struct Response<R>
where
    R: ApiRequest,
{
    _marker: PhantomData<fn() -> R>,
    buffer: Bytes,
    status: StatusCode,
}

impl<R> Response<R>
where
    R: ApiRequest,
{
    /// Create a new response from a buffer and status code
    pub fn new(buffer: Bytes, status: StatusCode) -> Self {
        Self {
            buffer,
            status,
            _marker: PhantomData,
        }
    }

    /// Get the HTTP status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the raw buffer
    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    /// Parse the body against the endpoint's output schema.
    pub fn parse(&self) -> core::result::Result<R::Output, DecodeError> {
        Ok(serde_json::from_slice(&self.buffer)?)
    }

    /// Parse the body, converting failures into [`ClientError`].
    pub fn into_output(self) -> Result<R::Output> {
        self.parse().map_err(ClientError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use smol_str::SmolStr;

    #[derive(Serialize, Debug)]
    struct Echo {
        value: u32,
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct EchoOutput {
        value: u32,
    }

    impl ApiRequest for Echo {
        const PATH: &'static str = "/api/echo/";
        const METHOD: ApiMethod = ApiMethod::Post;
        type Output = EchoOutput;
    }

    #[derive(Serialize, Debug)]
    struct Ping;

    impl ApiRequest for Ping {
        const PATH: &'static str = "/api/ping/";
        const METHOD: ApiMethod = ApiMethod::Get;
        type Output = serde_json::Value;
    }

    fn response(status: StatusCode, body: &str) -> http::Response<Vec<u8>> {
        http::Response::builder()
            .status(status)
            .body(body.as_bytes().to_vec())
            .unwrap()
    }

    #[test]
    fn builds_post_with_json_body_and_bearer() {
        let base = Url::parse("http://localhost:8000").unwrap();
        let opts = CallOptions {
            auth: Some(AuthorizationToken::Bearer(SmolStr::new("A1"))),
        };
        let req = build_http_request(&base, &Echo { value: 7 }, &opts).unwrap();
        assert_eq!(req.method(), http::Method::POST);
        assert_eq!(req.uri().to_string(), "http://localhost:8000/api/echo/");
        assert_eq!(req.headers().get(CONTENT_TYPE).unwrap(), JSON);
        assert_eq!(req.headers().get(AUTHORIZATION).unwrap(), "Bearer A1");
        assert_eq!(req.body().as_slice(), br#"{"value":7}"#);
    }

    #[test]
    fn get_has_no_body_and_keeps_base_prefix() {
        let base = Url::parse("https://example.com/backend/").unwrap();
        let req = build_http_request(&base, &Ping, &CallOptions::default()).unwrap();
        assert_eq!(req.method(), http::Method::GET);
        assert_eq!(req.uri().path(), "/backend/api/ping/");
        assert!(req.body().is_empty());
        assert!(req.headers().get(CONTENT_TYPE).is_none());
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn status_codes_map_to_errors() {
        let ok = process_response::<Echo>(response(StatusCode::OK, r#"{"value":3}"#)).unwrap();
        assert_eq!(ok.parse().unwrap(), EchoOutput { value: 3 });

        let unauthorized =
            process_response::<Echo>(response(StatusCode::UNAUTHORIZED, "{}")).unwrap_err();
        assert!(unauthorized.is_unauthorized());

        let invalid = process_response::<Echo>(response(
            StatusCode::BAD_REQUEST,
            r#"{"value":["too small"]}"#,
        ))
        .unwrap_err();
        match invalid {
            ClientError::Validation(v) => assert_eq!(v.field("value"), ["too small".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }

        let server = process_response::<Echo>(response(StatusCode::INTERNAL_SERVER_ERROR, ""))
            .unwrap_err();
        match server {
            ClientError::Http(e) => {
                assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(e.body.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    /// Transport whose every send fails with an I/O error.
    struct Broken;

    impl HttpClient for Broken {
        type Error = std::io::Error;

        async fn send_http(
            &self,
            _request: http::Request<Vec<u8>>,
        ) -> core::result::Result<http::Response<Vec<u8>>, Self::Error> {
            Err(std::io::Error::other("socket closed"))
        }
    }

    #[tokio::test]
    async fn foreign_transport_errors_are_other() {
        let base = Url::parse("http://localhost:8000").unwrap();
        let err = Broken.api(base).send(&Ping).await.unwrap_err();
        match err {
            ClientError::Transport(TransportError::Other(e)) => {
                assert_eq!(e.to_string(), "socket closed")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(feature = "reqwest-client")]
    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        // nothing listens on port 1
        let base = Url::parse("http://127.0.0.1:1").unwrap();
        let err = reqwest::Client::new()
            .api(base)
            .send(&Ping)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ClientError::Transport(TransportError::Connect(_))),
            "unexpected error: {err:?}"
        );
    }
}
