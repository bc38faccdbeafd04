use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::util::{Observers, SubscriptionId};

const BEARER_PREFIX: &str = "Bearer ";

/// what the session tells the outside world. A front-end reacts to these the way the browser
/// app redirected: back to login, or to an error page for banned accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    TokenChanged,
    /// the server rejected our token, it has been cleared
    LoginRequired,
    /// the server refused us outright
    Banned,
}

/// the bearer token and ban flag for the current user. Shared by everything that makes requests
pub struct Session {
    token: Mutex<Option<String>>,
    banned: AtomicBool,
    observers: Observers<SessionEvent>,
}

impl Session {
    /// `token` may or may not carry a `Bearer ` prefix
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token.filter(|t| !t.trim().is_empty())),
            banned: AtomicBool::new(false),
            observers: Observers::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::new(None)
    }

    fn lock_token(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|e| {
            log::warn!("The session token mutex was poisoned! Recovering...");
            self.token.clear_poison();
            e.into_inner()
        })
    }

    pub fn token(&self) -> Option<String> {
        self.lock_token().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock_token().is_some()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        *self.lock_token() = Some(token).filter(|t| !t.trim().is_empty());
        self.observers.notify(&SessionEvent::TokenChanged);
    }

    /// value for the `Authorization` header, always `Bearer <token>`
    pub fn authorization(&self) -> Option<String> {
        self.lock_token()
            .as_deref()
            .map(|token| format!("{BEARER_PREFIX}{}", strip_bearer(token)))
    }

    /// the token as it goes into `?token=` on download links: no `Bearer ` prefix, empty when
    /// logged out
    pub fn query_token(&self) -> String {
        self.lock_token()
            .as_deref()
            .map(strip_bearer)
            .unwrap_or_default()
            .to_string()
    }

    /// forgets the token after the server rejected it
    pub fn invalidate(&self) {
        let had_token = self.lock_token().take().is_some();
        if had_token {
            log::info!("Session token rejected by the server, clearing it");
        }
        self.observers.notify(&SessionEvent::LoginRequired);
    }

    pub fn ban(&self) {
        if !self.banned.swap(true, Ordering::SeqCst) {
            log::warn!("Server refused access, marking this account as banned");
        }
        self.observers.notify(&SessionEvent::Banned);
    }

    pub fn is_banned(&self) -> bool {
        self.banned.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

fn strip_bearer(token: &str) -> &str {
    token.strip_prefix(BEARER_PREFIX).unwrap_or(token)
}
