use std::sync::Arc;

use crate::http::request::{ApiRequest, RawResponse};
use crate::http::session::Session;
use crate::model::api::Envelope;
use crate::model::error::ApiError;

/// runs on every request before it's sent, in the order the stages were added
pub trait RequestStage: Send + Sync {
    fn on_request(&self, request: &mut ApiRequest) -> Result<(), ApiError>;
}

/// runs on every response in the order the stages were added. Each stage gets the previous
/// stage's output and may rewrite it or turn it into an error
pub trait ResponseStage: Send + Sync {
    fn on_response(&self, response: RawResponse) -> Result<RawResponse, ApiError>;
}

/// adds `Authorization: Bearer <token>` when the session has a token
pub struct BearerToken {
    session: Arc<Session>,
}

impl BearerToken {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

impl RequestStage for BearerToken {
    fn on_request(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        if let Some(authorization) = self.session.authorization() {
            request.set_header("Authorization", authorization);
        }
        Ok(())
    }
}

/// 401 drops the token and asks for a login, 403 flags the account as banned
pub struct SessionGuard {
    session: Arc<Session>,
}

impl SessionGuard {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

impl ResponseStage for SessionGuard {
    fn on_response(&self, response: RawResponse) -> Result<RawResponse, ApiError> {
        match response.status {
            401 => {
                self.session.invalidate();
                Err(ApiError::Unauthorized)
            }
            403 => {
                self.session.ban();
                Err(ApiError::Forbidden)
            }
            _ => Ok(response),
        }
    }
}

/// any other non-2xx status becomes [`ApiError::Status`], using the body's `msg` if it has one
pub struct StatusCheck;

impl ResponseStage for StatusCheck {
    fn on_response(&self, response: RawResponse) -> Result<RawResponse, ApiError> {
        if response.is_success() {
            return Ok(response);
        }
        let message = serde_json::from_slice::<serde_json::Value>(&response.body)
            .ok()
            .and_then(|body| body.get("msg").and_then(|m| m.as_str()).map(str::to_string))
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| {
                let text = response.text();
                if text.trim().is_empty() {
                    "unknown error".to_string()
                } else {
                    text
                }
            });
        Err(ApiError::Status {
            status: response.status,
            message,
        })
    }
}

/// checks the `{code, msg, data}` envelope and replaces the body with just `data`
pub struct EnvelopeUnwrap;

impl ResponseStage for EnvelopeUnwrap {
    fn on_response(&self, response: RawResponse) -> Result<RawResponse, ApiError> {
        let envelope: Envelope<serde_json::Value> = serde_json::from_slice(&response.body)?;
        if !envelope.is_success() {
            let message = if envelope.msg.is_empty() {
                "Error".to_string()
            } else {
                envelope.msg
            };
            return Err(ApiError::Application(message));
        }
        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        Ok(RawResponse {
            status: response.status,
            body: serde_json::to_vec(&data)?,
        })
    }
}

#[cfg(test)]
mod middleware_tests {
    use std::sync::Arc;

    use crate::http::middleware::{
        BearerToken, EnvelopeUnwrap, RequestStage, ResponseStage, SessionGuard, StatusCheck,
    };
    use crate::http::request::{ApiRequest, RawResponse};
    use crate::http::session::Session;
    use crate::model::error::ApiError;

    #[test]
    fn bearer_token_only_when_logged_in() {
        let mut request = ApiRequest::get("/files/list");
        BearerToken::new(Arc::new(Session::anonymous()))
            .on_request(&mut request)
            .unwrap();
        assert_eq!(None, request.header("authorization"));
        BearerToken::new(Arc::new(Session::new(Some("t".to_string()))))
            .on_request(&mut request)
            .unwrap();
        assert_eq!(Some("Bearer t"), request.header("Authorization"));
    }

    #[test]
    fn session_guard_401_logs_out() {
        let session = Arc::new(Session::new(Some("t".to_string())));
        let res = SessionGuard::new(session.clone()).on_response(RawResponse::new(401, "{}"));
        assert_eq!(Err(ApiError::Unauthorized), res);
        assert!(!session.is_logged_in());
        assert!(!session.is_banned());
    }

    #[test]
    fn session_guard_403_bans() {
        let session = Arc::new(Session::new(Some("t".to_string())));
        let res = SessionGuard::new(session.clone()).on_response(RawResponse::new(403, ""));
        assert_eq!(Err(ApiError::Forbidden), res);
        assert!(session.is_banned());
        assert!(session.is_logged_in());
    }

    #[test]
    fn status_check_prefers_body_message() {
        let res = StatusCheck.on_response(RawResponse::new(500, r#"{"code":0,"msg":"disk full"}"#));
        assert_eq!(
            Err(ApiError::Status {
                status: 500,
                message: "disk full".to_string()
            }),
            res
        );
        let res = StatusCheck.on_response(RawResponse::new(502, "bad gateway"));
        assert_eq!(
            Err(ApiError::Status {
                status: 502,
                message: "bad gateway".to_string()
            }),
            res
        );
        let res = StatusCheck.on_response(RawResponse::new(504, ""));
        assert_eq!(
            Err(ApiError::Status {
                status: 504,
                message: "unknown error".to_string()
            }),
            res
        );
    }

    #[test]
    fn envelope_unwrap_returns_data() {
        let res = EnvelopeUnwrap
            .on_response(RawResponse::new(200, r#"{"code":1,"msg":"ok","data":{"id":3}}"#))
            .unwrap();
        assert_eq!(r#"{"id":3}"#, res.text());
    }

    #[test]
    fn envelope_unwrap_failure_code_uses_msg() {
        let res = EnvelopeUnwrap.on_response(RawResponse::new(
            200,
            r#"{"code":0,"msg":"folder exists","data":null}"#,
        ));
        assert_eq!(Err(ApiError::Application("folder exists".to_string())), res);
        let res = EnvelopeUnwrap.on_response(RawResponse::new(200, r#"{"code":0}"#));
        assert_eq!(Err(ApiError::Application("Error".to_string())), res);
    }

    #[test]
    fn envelope_unwrap_rejects_garbage() {
        let res = EnvelopeUnwrap.on_response(RawResponse::new(200, "<html>"));
        assert!(matches!(res, Err(ApiError::Decode(_))));
    }
}
