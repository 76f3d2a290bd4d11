//! Error types for the platform API client.

use roomwatch_controller::ServiceError;

/// Errors that can occur while calling the platform API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request failed before a body was read.
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The body was not the JSON we expected.
    #[error("invalid response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The envelope carried a non-zero status code.
    #[error("{endpoint} returned code {code}: {message}")]
    Status {
        endpoint: &'static str,
        code: i64,
        message: String,
    },

    /// A successful envelope without a `data` field.
    #[error("{endpoint} returned no data")]
    MissingData { endpoint: &'static str },
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Client(_) | ApiError::Request { .. } => {
                ServiceError::Network(err.to_string())
            }
            ApiError::Status { code, message, .. } => ServiceError::Api { code, message },
            ApiError::Decode { .. } | ApiError::MissingData { .. } => {
                ServiceError::Decode(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_api_error() {
        let err = ApiError::Status {
            endpoint: "getDanmuInfo",
            code: -352,
            message: "风控校验失败".into(),
        };
        assert_eq!(
            ServiceError::from(err),
            ServiceError::Api {
                code: -352,
                message: "风控校验失败".into(),
            }
        );
    }

    #[test]
    fn test_missing_data_maps_to_decode() {
        let err = ServiceError::from(ApiError::MissingData {
            endpoint: "Room/get_info",
        });
        assert_eq!(
            err,
            ServiceError::Decode("Room/get_info returned no data".into())
        );
    }

    #[test]
    fn test_decode_error_keeps_endpoint() {
        let source = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = ServiceError::from(ApiError::Decode {
            endpoint: "area/getRoomList",
            source,
        });
        assert!(matches!(&err, ServiceError::Decode(msg) if msg.contains("area/getRoomList")));
    }
}
