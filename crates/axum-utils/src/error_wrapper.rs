// Copyright 2024, 2025 New Vector Ltd.
// Copyright 2023, 2024 The Matrix.org Foundation C.I.C.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;

/// A simple wrapper around an error that implements [`IntoResponse`].
///
/// The error is logged and the client gets an opaque `server_error`.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ErrorWrapper<T>(#[from] pub T);

#[derive(Serialize)]
struct ServerError {
    error: &'static str,
    error_description: &'static str,
}

impl<T> IntoResponse for ErrorWrapper<T>
where
    T: std::error::Error + 'static,
{
    fn into_response(self) -> Response {
        tracing::error!(
            error = &self.0 as &dyn std::error::Error,
            "Failed to handle request"
        );

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ServerError {
                error: "server_error",
                error_description: "Internal server error",
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("storage exploded")]
    struct Boom;

    #[test]
    fn test_error_is_not_leaked() {
        let response = ErrorWrapper(Boom).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
