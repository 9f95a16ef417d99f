//! API errors

use std::fmt::Display;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::model::session;

/// Message used when a failure carries no description of its own
const FALLBACK_MESSAGE: &str = "Unexpected server error";

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidInput(#[from] session::Error),
    #[error("{0}")]
    Unexpected(String),
}

impl Error {
    /// Wraps any failure as an unexpected error
    pub fn unexpected(err: impl Display) -> Self {
        let message = err.to_string();
        if message.is_empty() {
            Self::Unexpected(FALLBACK_MESSAGE.to_owned())
        } else {
            Self::Unexpected(message)
        }
    }
}

/// Body of every error response
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}
