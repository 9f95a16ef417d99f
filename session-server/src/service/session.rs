//! Liveness cookie management
//!
//! The cookie carries no session data, its presence only tells that the client started a session.
//! Requests carrying it are marked with [`Liveness`] before reaching the handlers.

use actix_web::body::MessageBody;
use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::HttpMessage;

use crate::config::{self, Environment};
use crate::service::Error;

/// Value of the liveness cookie
const LIVE_VALUE: &str = "active";

/// Marker attached to requests carrying the liveness cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness;

/// How the liveness cookie is issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    name: String,
    path: String,
    secure: bool,
}

impl CookieSettings {
    pub fn new(config: &config::Cookie, environment: Environment) -> Self {
        Self {
            name: config.name.clone(),
            path: config.path.clone(),
            secure: config.is_secure(environment),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie marking a started session.
    ///
    /// `Max-Age` is set to the session length in milliseconds taken as a number of seconds, so the
    /// cookie outlives the session. The store decides about the expiry.
    pub fn issue(&self, remaining_ms: i64) -> Cookie<'static> {
        Cookie::build(self.name.clone(), LIVE_VALUE)
            .path(self.path.clone())
            .max_age(Duration::seconds(remaining_ms))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .finish()
    }

    /// Cookie removing the liveness flag from the client
    pub fn removal(&self) -> Cookie<'static> {
        Cookie::build(self.name.clone(), "")
            .path(self.path.clone())
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish()
    }

    /// Checks if the cookie is set to its live value
    fn is_live(&self, cookie: Option<Cookie<'_>>) -> bool {
        cookie.is_some_and(|cookie| cookie.value() == LIVE_VALUE)
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self::new(&config::Cookie::default(), Environment::default())
    }
}

pub async fn middleware<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<B>, actix_web::Error>
where
    B: MessageBody + 'static,
{
    let settings: Data<CookieSettings> = req
        .app_data()
        .cloned()
        .ok_or_else(|| Error::unexpected("Missing cookie settings"))?;

    if settings.is_live(req.cookie(settings.name())) {
        req.extensions_mut().insert(Liveness);
    }

    next.call(req).await
}
