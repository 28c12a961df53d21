//! Turning worker replies and gateway errors into client responses.
//!
//! # Responsibilities
//! - Success: 200, upstream body, `x-proxy-worker` naming the worker
//! - Failure: the reply's `errorCode` as status, error text as body
//! - Local errors (no workers, timeout, dead worker) via their status code

use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::protocol::ReplyMessage;

pub const X_PROXY_WORKER: HeaderName = HeaderName::from_static("x-proxy-worker");

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

pub fn reply_response(reply: ReplyMessage, worker_id: u64) -> Response {
    let status = reply.status();
    match reply {
        ReplyMessage::Success { data } => (
            status,
            [(CONTENT_TYPE, TEXT_PLAIN), (X_PROXY_WORKER, HeaderValue::from(worker_id))],
            data,
        )
            .into_response(),
        ReplyMessage::Failure { error, .. } => (status, [(CONTENT_TYPE, TEXT_PLAIN)], error).into_response(),
    }
}

pub fn error_response(err: &GatewayError) -> Response {
    (err.status_code(), [(CONTENT_TYPE, TEXT_PLAIN)], err.to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn success_names_the_worker() {
        let response = reply_response(ReplyMessage::success("hello"), 7);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&X_PROXY_WORKER], "7");
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=utf-8");
    }

    #[test]
    fn failure_uses_error_code() {
        let reply = ReplyMessage::failure(StatusCode::NOT_FOUND, "Rule not found for /x");
        let response = reply_response(reply, 1);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(&X_PROXY_WORKER).is_none());
    }

    #[test]
    fn local_errors_map_to_status() {
        assert_eq!(
            error_response(&GatewayError::NoWorkersAvailable).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_response(&GatewayError::GatewayTimeout).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            error_response(&GatewayError::WorkerUnavailable(3)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
