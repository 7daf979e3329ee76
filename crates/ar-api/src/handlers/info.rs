use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub run_id: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

const ENDPOINTS: [(&str, &str, &str); 7] = [
    ("GET", "/", "service information"),
    ("POST", "/recommend", "rank assessments for a free-text query"),
    ("POST", "/upload", "replace the catalog with a JSON array"),
    ("GET", "/catalog", "list indexed assessments"),
    ("GET", "/livez", "liveness probe"),
    ("GET", "/readyz", "readiness probe"),
    ("GET", "/health", "alias of /readyz"),
];

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        run_id: ar_common::run_id::get(),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}
