//! HTTP surface tests: admin auth, project refresh/save, public listing,
//! credential admin and metrics. The router runs in-process over the memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use folio::config::Config;
use folio::store::Stores;
use folio::{api, AppState};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_KEY: &str = "test-admin-key-0123456789";

async fn app(github: &MockServer) -> (Router, Arc<AppState>) {
    let cfg = Config {
        admin_key: Some(ADMIN_KEY.into()),
        github_api_base: github.uri(),
        github_tokens: vec!["ghp_a".into()],
        github_timeout_secs: 1,
        ..Config::default()
    };
    let state = AppState::new(cfg, Stores::memory()).unwrap();
    state.seed_credentials().await.unwrap();
    let state = Arc::new(state);
    (api::app_router(state.clone()), state)
}

fn admin(req: axum::http::request::Builder) -> axum::http::request::Builder {
    req.header("x-admin-key", ADMIN_KEY)
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn refresh_request(github_user: &str) -> Request<Body> {
    admin(Request::builder().method("POST").uri("/admin/projects/refresh"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("github_user={}", urlencoding::encode(github_user))))
        .unwrap()
}

async fn mount_user_repos(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/octocat/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "alpha", "description": "a", "html_url": "https://github.com/octocat/alpha", "owner": { "avatar_url": "img" } },
            { "name": "beta", "description": "b", "html_url": "https://github.com/octocat/beta", "owner": { "avatar_url": "img" } }
        ])))
        .mount(server)
        .await;
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn test_admin_routes_require_key() {
        let github = MockServer::start().await;
        let (app, _) = app(&github).await;

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/admin/projects").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(resp).await["error"]["code"], "unauthorized");

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/projects")
                    .header("x-admin-key", "wrong-key-wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/admin/projects")
                    .header(header::AUTHORIZATION, format!("Bearer {}", ADMIN_KEY))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_disabled_without_configured_key() {
        let state = AppState::new(Config::default(), Stores::memory()).unwrap();
        let app = api::app_router(Arc::new(state));

        let resp = app
            .oneshot(admin(Request::builder().uri("/admin/projects")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_public_routes_are_open_and_hardened() {
        let github = MockServer::start().await;
        let (app, _) = app(&github).await;

        let resp = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    }
}

mod projects {
    use super::*;

    #[tokio::test]
    async fn test_refresh_then_publish_flow() {
        let github = MockServer::start().await;
        mount_user_repos(&github).await;
        let (app, _) = app(&github).await;

        let resp = app.clone().oneshot(refresh_request("octocat")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["synced"], serde_json::json!(["alpha", "beta"]));
        let projects = body["projects"].as_array().unwrap();
        assert_eq!(projects.len(), 2);
        assert!(projects.iter().all(|p| p["enabled"] == false));

        // Nothing is public until the admin saves.
        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/projects").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(resp).await, serde_json::json!([]));

        let alpha_id = projects.iter().find(|p| p["repo_name"] == "alpha").unwrap()["id"].clone();
        let save = serde_json::json!([
            { "id": alpha_id, "enabled": true, "custom_url": "https://alpha.dev" }
        ]);
        let resp = app
            .clone()
            .oneshot(
                admin(Request::builder().method("POST").uri("/admin/projects/save"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(save.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::builder().uri("/projects").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let public = json_body(resp).await;
        let public = public.as_array().unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0]["repo_name"], "alpha");
        assert_eq!(public[0]["custom_url"], "https://alpha.dev");
    }

    #[tokio::test]
    async fn test_blank_identifier_only_lists() {
        let github = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&github)
            .await;
        let (app, _) = app(&github).await;

        let resp = app.oneshot(refresh_request("   ")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["synced"], serde_json::json!([]));
        assert_eq!(body["projects"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_bad_identifier_is_client_error() {
        let github = MockServer::start().await;
        let (app, _) = app(&github).await;

        let resp = app.oneshot(refresh_request("a/b/c")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["code"], "invalid_identifier");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let github = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&github)
            .await;
        let (app, state) = app(&github).await;

        let resp = app.oneshot(refresh_request("octocat/Hello-World")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(state.stores.projects.list_projects().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_unknown_project_is_not_found() {
        let github = MockServer::start().await;
        let (app, _) = app(&github).await;

        let resp = app
            .oneshot(
                admin(Request::builder().method("POST").uri("/admin/projects/save"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"[{"id": 999, "enabled": true}]"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

mod credentials {
    use super::*;

    #[tokio::test]
    async fn test_credential_admin_never_returns_secrets() {
        let github = MockServer::start().await;
        let (app, _) = app(&github).await;

        let add = |token: &str| {
            admin(Request::builder().method("POST").uri("/admin/credentials"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::json!({ "token": token }).to_string()))
                .unwrap()
        };

        let resp = app.clone().oneshot(add("ghp_new")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = app.clone().oneshot(add("ghp_new")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["inserted"], false);

        let resp = app
            .clone()
            .oneshot(admin(Request::builder().uri("/admin/credentials")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!text.contains("ghp_a"));
        assert!(!text.contains("ghp_new"));
        let list: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 2);
        assert_eq!(list[0]["fingerprint"].as_str().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_enable_and_remove() {
        let github = MockServer::start().await;
        let (app, state) = app(&github).await;
        let id = state.stores.credentials.list().await.unwrap()[0].id;
        state.stores.credentials.disable(id).await.unwrap();

        let resp = app
            .clone()
            .oneshot(
                admin(Request::builder().method("POST").uri(format!("/admin/credentials/{}/enable", id)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let cred = &state.stores.credentials.list().await.unwrap()[0];
        assert!(cred.enabled);
        assert_eq!(cred.fail_count, 1);

        let delete = |id: i64| {
            admin(Request::builder().method("DELETE").uri(format!("/admin/credentials/{}", id)))
                .body(Body::empty())
                .unwrap()
        };
        let resp = app.clone().oneshot(delete(id)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app.oneshot(delete(id)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(state.stores.credentials.list().await.unwrap().is_empty());
    }
}

mod metrics {
    use super::*;

    #[tokio::test]
    async fn test_metrics_reflect_sync_runs() {
        let github = MockServer::start().await;
        mount_user_repos(&github).await;
        let (app, _) = app(&github).await;

        let resp = app.clone().oneshot(refresh_request("octocat")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("folio_projects_upserted_total 2"));
        assert!(text.contains("folio_github_attempts_total{outcome=\"success\"} 1"));
    }
}
