use bytes::Bytes;
use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
    HeaderValue, StatusCode,
};

pub type Response = http::Response<Option<Bytes>>;

pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

/// 1xx, 204 and 304 responses never carry a body, not even a length.
pub fn allows_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response {
        let mut response = http::Response::new(None);
        *response.status_mut() = self;
        if allows_body(self) {
            response.headers_mut().insert(CONTENT_LENGTH, 0.into());
        }

        response
    }
}

pub struct Json<T>(pub T);
impl<T> IntoResponse for Json<T>
where
    T: serde::Serialize,
{
    fn into_response(self) -> Response {
        let json = match serde_json::to_vec(&self.0) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(%err, "failed to serialize response body");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        let mut response = http::Response::new(Some(Bytes::from(json)));
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static(mime::APPLICATION_JSON.as_ref()),
        );

        response
    }
}

/// Permanent redirect with an empty body.
pub struct Redirect(pub HeaderValue);
impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
        response.headers_mut().insert(LOCATION, self.0);

        response
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        text(Bytes::from(self))
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        text(Bytes::from(self))
    }
}

fn text(body: Bytes) -> Response {
    let mut response = http::Response::new(Some(body));

    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(mime::TEXT_PLAIN_UTF_8.as_ref()),
    );

    response
}

impl<B: IntoResponse> IntoResponse for (StatusCode, B) {
    fn into_response(self) -> Response {
        let mut response = self.1.into_response();
        *response.status_mut() = self.0;

        response
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(err) => err.into_response(),
        }
    }
}
