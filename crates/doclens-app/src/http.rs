//! `reqwest`-backed implementation of the backend transport port.

use std::time::Duration;

use async_trait::async_trait;
use doclens_core::{
    ApiRequest, ApiResponse, BackendTransport, HttpMethod, MultipartForm, RequestBody,
    TransportError,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};
use url::Url;

use crate::redact_sensitive;

/// HTTPS transport rooted at the configured backend URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    /// Creates a transport for `base`, optionally bounding every request.
    ///
    /// # Errors
    /// Returns the client build error (TLS backend initialization).
    pub fn new(base: Url, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(concat!("doclens/", env!("DOCLENS_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base,
        })
    }

    /// Resolves an endpoint path below the base URL, keeping any base path
    /// prefix.
    pub fn endpoint_url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{prefix}/{}", path.trim_start_matches('/')));
        url
    }

    fn build(&self, request: ApiRequest) -> Result<RequestBuilder, TransportError> {
        let url = self.endpoint_url(&request.path);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(multipart_form(form)?),
        };
        Ok(builder)
    }
}

fn multipart_form(form: MultipartForm) -> Result<Form, TransportError> {
    let MultipartForm { file, fields } = form;
    let part = Part::bytes(file.bytes)
        .file_name(file.name)
        .mime_str(&file.mime_type)
        .map_err(|error| TransportError::Unreachable(error.to_string()))?;

    let mut multipart = Form::new().part("file", part);
    for (name, value) in fields {
        multipart = multipart.text(name, value);
    }
    Ok(multipart)
}

fn map_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Unreachable(error.to_string())
    }
}

#[async_trait]
impl BackendTransport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let path = request.path.clone();
        let response = self.build(request)?.send().await.map_err(|error| {
            let detail = redact_sensitive(&error.to_string());
            warn!(%path, error = %detail, "backend request failed");
            map_error(error)
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_error)?;
        debug!(%path, status, bytes = body.len(), "backend responded");

        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}
