use crate::error::CatalogError;
use crate::server::api::{self, ApiError};

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            self.body
        )
    }

    fn json(body: String) -> Self {
        HttpResponse {
            status_code: 200,
            status_text: "OK",
            content_type: "application/json",
            body,
        }
    }
}

pub fn route_request(method: &str, path: &str, body: &str) -> HttpResponse {
    let path = path.split('?').next().unwrap_or(path);
    let result = match (method, path) {
        ("GET", "/api/health") => api::health_payload().map_err(ApiError::Parse),
        ("POST", "/api/simulate") => api::simulate_payload(body),
        ("POST", "/api/build/encode") => api::encode_payload(body),
        ("POST", "/api/build/decode") => api::decode_payload(body),
        _ => return error_response(404, "Not Found", "Route not found"),
    };
    match result {
        Ok(payload) => HttpResponse::json(payload),
        Err(err) => api_error_response(&err),
    }
}

fn api_error_response(err: &ApiError) -> HttpResponse {
    match err {
        ApiError::Parse(parse) => {
            error_response(400, "Bad Request", &format!("Invalid request body: {parse}"))
        }
        ApiError::Validation(_) | ApiError::Build(_) => {
            error_response(400, "Bad Request", &err.to_string())
        }
        ApiError::Catalog(
            CatalogError::UnknownReference { .. } | CatalogError::TeamSize(_),
        ) => error_response(422, "Unprocessable Entity", &err.to_string()),
        ApiError::Catalog(_) => error_response(500, "Internal Server Error", &err.to_string()),
    }
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}
