use super::error_response::ErrorResponse;
use axum::{
    response::{IntoResponse, Response as AxumResponse},
    Json as AxumJson,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

pub type JsonMap = Map<String, Json>;
pub type ResponseResult = Result<AxumResponse, ErrorResponse>;

/// The `{msg, data}` envelope every handler answers with. Errors use it too, with `data`
/// left null.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response<T: Serialize> {
    pub msg: String,
    pub data: T,
}

impl<T: Serialize> Response<T> {
    pub fn new(message: &str, data: T) -> Self {
        Self {
            msg: message.to_string(),
            data,
        }
    }
    pub fn from(data: T) -> Self {
        Self::new("ok", data)
    }
}

impl Response<Json> {
    pub fn from_msg(msg: &str) -> Self {
        Self::new(msg, Json::Null)
    }
}

impl<T: Serialize> IntoResponse for Response<T> {
    fn into_response(self) -> AxumResponse {
        AxumJson::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shape() {
        let body = serde_json::to_value(Response::from(vec![1, 2])).unwrap();
        assert_eq!(body, json!({"msg": "ok", "data": [1, 2]}));
        let body = serde_json::to_value(Response::from_msg("post deleted")).unwrap();
        assert_eq!(body, json!({"msg": "post deleted", "data": null}));
    }
}
