use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::model::error::ApiError;

pub mod middleware;
pub mod request;
pub mod session;
pub mod transport;

pub use middleware::{
    BearerToken, EnvelopeUnwrap, RequestStage, ResponseStage, SessionGuard, StatusCheck,
};
pub use request::{ApiRequest, FormPart, RawResponse, RequestBody};
pub use session::{Session, SessionEvent};
pub use transport::{ReqwestTransport, Transport};

/// the one client every api call goes through. Build it once at startup and share it
pub struct ApiClient {
    base_url: String,
    transport: Box<dyn Transport>,
    session: Arc<Session>,
    request_stages: Vec<Box<dyn RequestStage>>,
    response_stages: Vec<Box<dyn ResponseStage>>,
}

impl ApiClient {
    /// a client with the standard pipeline: bearer token in, then session guard, status check and
    /// envelope unwrapping on the way out
    pub fn new<T>(base_url: &str, transport: T, session: Arc<Session>) -> Self
    where
        T: Transport + 'static,
    {
        Self::bare(base_url, transport, session.clone())
            .with_request_stage(BearerToken::new(session.clone()))
            .with_response_stage(SessionGuard::new(session))
            .with_response_stage(StatusCheck)
            .with_response_stage(EnvelopeUnwrap)
    }

    /// a client with no middleware at all
    pub fn bare<T>(base_url: &str, transport: T, session: Arc<Session>) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport: Box::new(transport),
            session,
            request_stages: Vec::new(),
            response_stages: Vec::new(),
        }
    }

    pub fn with_request_stage<S: RequestStage + 'static>(mut self, stage: S) -> Self {
        self.request_stages.push(Box::new(stage));
        self
    }

    pub fn with_response_stage<S: ResponseStage + 'static>(mut self, stage: S) -> Self {
        self.response_stages.push(Box::new(stage));
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// runs the request through every stage and the transport, returning the final response
    pub async fn execute(&self, mut request: ApiRequest) -> Result<RawResponse, ApiError> {
        for stage in &self.request_stages {
            stage.on_request(&mut request)?;
        }
        let method = request.method.clone();
        let path = request.path.clone();
        log::debug!("{method} {path}");
        let mut response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("{method} {path} failed before a response came back: {e}");
                return Err(e);
            }
        };
        for stage in &self.response_stages {
            response = stage.on_response(response)?;
        }
        Ok(response)
    }

    /// [`ApiClient::execute`] and then deserialize the body. An empty body reads as `null`
    pub async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        if response.body.is_empty() {
            return Ok(serde_json::from_value(serde_json::Value::Null)?);
        }
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// an absolute url for direct navigation (downloads), with the query values url-encoded
    pub fn url_for(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = format!("{}{path}", self.base_url);
        for (i, (key, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }
}
