use async_trait::async_trait;

use crate::model::error::ApiError;

/// where user-facing messages go. The coordinators never print anything themselves
pub trait Feedback: Send + Sync {
    fn success(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// tells the user that `action` failed. 401 and 403 are left out: the session announces those
/// and the ui sends the user to log in
pub fn report_api_error(feedback: &dyn Feedback, action: &str, error: &ApiError) {
    if error.is_auth() {
        log::debug!("Not reporting {action:?}, session is handling {error}");
        return;
    }
    feedback.error(&format!("{action}: {error}"));
}

/// asks the user a yes/no question before something destructive happens
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// hands a url off to whatever opens it (a browser tab, a download manager, stdout...)
pub trait Opener: Send + Sync {
    fn open(&self, url: &str);
}

/// sends every message to the log
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn success(&self, message: &str) {
        log::info!("{message}");
    }

    fn warning(&self, message: &str) {
        log::warn!("{message}");
    }

    fn error(&self, message: &str) {
        log::error!("{message}");
    }
}

/// says yes to everything, for non-interactive use
pub struct AlwaysConfirm;

#[async_trait]
impl Confirm for AlwaysConfirm {
    async fn confirm(&self, _: &str) -> bool {
        true
    }
}
