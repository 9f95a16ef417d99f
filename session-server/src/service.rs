//! HTTP endpoints of the session timer

use actix_web::error::JsonPayloadError;
use actix_web::web::{self, Data, Json, ServiceConfig};
use actix_web::{HttpMessage, HttpRequest, HttpResponse, delete, get, middleware, post};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};


mod error;
mod session;

pub use error::Error;
pub use session::CookieSettings;

use crate::model::Model;
use crate::model::session::SessionStatus;
use session::Liveness;

/// Stands in for the requested length when the body doesn't carry one
static NO_MINUTES: Value = Value::Null;

/// Picks the requested session length out of a start request body.
///
/// Only a `null` body is an error; any other body without a `minutes` field requests nothing,
/// which the store rejects as invalid input.
fn requested_minutes(body: &Value) -> Result<&Value, Error> {
    match body {
        Value::Null => Err(Error::unexpected("Cannot read minutes from a null request body")),
        Value::Object(fields) => Ok(fields.get("minutes").unwrap_or(&NO_MINUTES)),
        _ => Ok(&NO_MINUTES),
    }
}

/// Response to starting or ending a session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionChanged {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_time: Option<i64>,
}

/// Response to session status query
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct SessionState {
    active: bool,
    remaining_time: Option<i64>,
}

impl SessionState {
    fn inactive() -> Self {
        SessionStatus::Inactive.into()
    }
}

impl From<SessionStatus> for SessionState {
    fn from(status: SessionStatus) -> Self {
        Self {
            active: status.is_active(),
            remaining_time: status.remaining_ms(),
        }
    }
}

/// Starts a session timer, replacing the running one
#[post("/api/session")]
async fn start_session(
    model: Data<Model>,
    cookie: Data<CookieSettings>,
    body: Json<Value>,
) -> Result<HttpResponse, Error> {
    let minutes = requested_minutes(&body)?;
    info!(%minutes, "Session start requested");

    let started = model.sessions().create(minutes).inspect_err(|err| {
        warn!(%minutes, %err, "Rejected session start");
    })?;

    info!(
        end_time = %started.end_time,
        remaining_ms = started.remaining_ms,
        "Session timer started"
    );

    Ok(HttpResponse::Ok()
        .cookie(cookie.issue(started.remaining_ms))
        .json(SessionChanged {
            success: true,
            message: "Session timer started",
            remaining_time: Some(started.remaining_ms),
        }))
}

/// Reports the session state
///
/// Without the liveness cookie the session is inactive, whatever the store holds.
#[get("/api/session")]
async fn session_status(req: HttpRequest, model: Data<Model>) -> Json<SessionState> {
    if !req.extensions().contains::<Liveness>() {
        debug!("No liveness cookie, session inactive");
        return Json(SessionState::inactive());
    }

    let status = model.sessions().read();
    debug!(?status, "Session status read");
    Json(status.into())
}

/// Ends the session
#[delete("/api/session")]
async fn end_session(model: Data<Model>, cookie: Data<CookieSettings>) -> HttpResponse {
    let removed = model.sessions().clear();
    info!(had_session = removed.is_some(), "Session ended");

    HttpResponse::Ok()
        .cookie(cookie.removal())
        .json(SessionChanged {
            success: true,
            message: "Session ended",
            remaining_time: None,
        })
}

/// Maps unreadable request bodies to an unexpected error
fn json_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    warn!(path = %req.path(), %err, "Malformed request body");
    Error::unexpected(err).into()
}

/// Returns configuration function for the ActixWeb services
pub fn configure(
    cookie: CookieSettings,
    model: Model,
) -> impl Fn(&mut web::ServiceConfig) + Clone {
    move |cfg: &mut ServiceConfig| {
        let session_aware = {
            web::scope("")
                .wrap(middleware::from_fn(session::middleware))
                .service(start_session)
                .service(session_status)
                .service(end_session)
        };

        cfg.app_data(Data::new(model.clone()))
            .app_data(Data::new(cookie.clone()))
            .app_data(
                web::JsonConfig::default()
                    .content_type_required(false)
                    .content_type(|_| true)
                    .error_handler(json_error),
            )
            .service(session_aware);
    }
}
