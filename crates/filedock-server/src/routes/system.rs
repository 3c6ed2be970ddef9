use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;

/// Build and start-up facts reported by `GET /`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub project_name: &'static str,
    pub project_version: &'static str,
    pub project_description: &'static str,
    pub project_start_time: DateTime<Utc>,
}

impl SystemInfo {
    pub fn capture() -> Self {
        Self {
            project_name: env!("CARGO_PKG_NAME"),
            project_version: env!("CARGO_PKG_VERSION"),
            project_description: env!("CARGO_PKG_DESCRIPTION"),
            project_start_time: Utc::now(),
        }
    }
}

pub(super) async fn system_info(State(state): State<AppState>) -> Json<SystemInfo> {
    Json(state.system_info.clone())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::test_helpers::test_app;

    async fn fetch(uri: &str) -> Value {
        let app = test_app();
        let resp = app
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn reports_start_time_as_json() {
        let v = fetch("/").await;
        assert_eq!(v["projectName"], "filedock-server");
        let started = v["projectStartTime"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(started).is_ok());
    }

    #[tokio::test]
    async fn system_info_alias_matches_root() {
        let v = fetch("/system-info").await;
        assert_eq!(v["projectName"], "filedock-server");
        assert_eq!(v["projectVersion"], env!("CARGO_PKG_VERSION"));
    }
}
