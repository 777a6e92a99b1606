use crate::analysis::AnalysisError;
use crate::server::api::{self, AnalyzeError};

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
             Connection: close\r\n\r\n{}",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

pub fn route_request(method: &str, path: &str, body: &str) -> HttpResponse {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        ("GET", "/api/health") => match api::health_payload() {
            Ok(payload) => json_ok(payload),
            Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
        },
        ("POST", "/api/analyze") => match api::analyze_payload(body) {
            Ok(payload) => json_ok(payload),
            Err(err @ (AnalyzeError::Parse(_) | AnalyzeError::Validation(_))) => {
                error_response(400, "Bad Request", &err.to_string())
            }
            Err(AnalyzeError::Analysis(err @ AnalysisError::UnknownEntity { .. })) => {
                error_response(400, "Bad Request", &err.to_string())
            }
            Err(AnalyzeError::Analysis(err)) => {
                error_response(422, "Unprocessable Entity", &err.to_string())
            }
            Err(err @ AnalyzeError::Serialize(_)) => {
                error_response(500, "Internal Server Error", &err.to_string())
            }
        },
        (_, "/api/health") | (_, "/api/analyze") => {
            error_response(405, "Method Not Allowed", "method not allowed")
        }
        _ => error_response(404, "Not Found", "route not found"),
    }
}

fn json_ok(body: String) -> HttpResponse {
    HttpResponse {
        status_code: 200,
        status_text: "OK",
        content_type: "application/json",
        body,
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
