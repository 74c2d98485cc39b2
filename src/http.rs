use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq)]
pub struct ReqParam {
    pub key: String,
    pub value: String,
}

impl ReqParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        ReqParam {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug)]
pub struct ReqBody {
    pub value: Option<Value>,
}

impl ReqBody {
    pub fn empty() -> Self {
        ReqBody { value: None }
    }

    pub fn new(value: Value) -> Self {
        Self { value: Some(value) }
    }
}

#[derive(Debug)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: String,
    pub query_params: Vec<ReqParam>,
}

impl Endpoint {
    pub fn new(method: HttpMethod, path: String, query_params: Vec<ReqParam>) -> Endpoint {
        Endpoint {
            method,
            path,
            query_params,
        }
    }

    pub fn to_url(&self) -> Result<Url, HttpError> {
        let mut url = Url::parse(&self.path)
            .map_err(|err| HttpError::Io(format!("invalid url {}: {}", self.path, err)))?;
        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for param in &self.query_params {
                pairs.append_pair(&param.key, &param.value);
            }
        }
        Ok(url)
    }
}

#[derive(Debug)]
pub struct HttpRequest {
    pub endpoint: Endpoint,
    pub req_body: ReqBody,
}

impl HttpRequest {
    pub fn new(endpoint: Endpoint, req_body: ReqBody) -> HttpRequest {
        HttpRequest { endpoint, req_body }
    }

    pub fn get(path: String, query_params: Vec<ReqParam>) -> HttpRequest {
        Self::new(Endpoint::new(HttpMethod::GET, path, query_params), ReqBody::empty())
    }

    pub fn with_body(method: HttpMethod, path: String, query_params: Vec<ReqParam>, body: Value) -> HttpRequest {
        Self::new(Endpoint::new(method, path, query_params), ReqBody::new(body))
    }
}

pub struct HttpResult<T> {
    pub body: T,
    pub status_code: u16,
}

impl<T> HttpResult<T> {
    pub fn new(body: T, status_code: u16) -> Self {
        Self { body, status_code }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HttpError {
    Status(u16, String),
    Timeout(String),
    Io(String),
}

impl HttpError {
    pub fn get_message(&self) -> String {
        match self {
            HttpError::Status(_, body) => body.to_string(),
            HttpError::Timeout(msg) => msg.to_string(),
            HttpError::Io(msg) => msg.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpMethod {
    POST,
    GET,
    PATCH,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::POST => Method::POST,
            HttpMethod::GET => Method::GET,
            HttpMethod::PATCH => Method::PATCH,
        }
    }
}

/// Authenticated JSON client. Every request carries the same authorization
/// header and is bounded by the configured timeout.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    authorization: String,
}

impl ApiClient {
    pub fn new(authorization: String, timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| HttpError::Io(err.to_string()))?;
        Ok(Self {
            client,
            authorization,
        })
    }

    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResult<Value>, HttpError> {
        let req = self.build_reqwest(request)?;
        let response = req.send().await.map_err(|error| {
            info!("http request failed: {}", error);
            if error.is_timeout() {
                HttpError::Timeout(error.to_string())
            } else {
                HttpError::Io(error.to_string())
            }
        })?;
        let status_code = response.status();
        debug!("http request executed, status_code: {}", status_code);
        let text = response
            .text()
            .await
            .map_err(|err| HttpError::Io(err.to_string()))?;
        if !status_code.is_success() {
            info!("http request failed with {}: {}", status_code, text);
            return Err(HttpError::Status(status_code.as_u16(), text));
        }
        let parsed = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|err| HttpError::Io(format!("response is not json: {}", err)))?
        };
        Ok(HttpResult::new(parsed, status_code.as_u16()))
    }

    fn build_reqwest(&self, request: HttpRequest) -> Result<RequestBuilder, HttpError> {
        let endpoint = request.endpoint;
        let url = endpoint.to_url()?;
        debug!("{:?} {}", endpoint.method, url);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&self.authorization)
                .map_err(|err| HttpError::Io(format!("invalid authorization header: {}", err)))?,
        );
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            HeaderName::from_static("accept"),
            HeaderValue::from_static("application/json"),
        );

        let mut req = self
            .client
            .request(endpoint.method.into(), url)
            .headers(headers);
        if let Some(body) = &request.req_body.value {
            req = req.json(body);
        }
        Ok(req)
    }
}
