use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value as JsonValue;
use tower::ServiceExt;

const BOUNDARY: &str = "bundle-test-boundary";

fn multipart_body(filename: &str, content: &[u8]) -> Body {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
}

fn upload(uri: &str, auth: &str, filename: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", auth)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(multipart_body(filename, content))
        .unwrap()
}

fn token(role: &str) -> String {
    let claims = compliance_backend::middleware::auth::Claims {
        sub: uuid::Uuid::new_v4().to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        role: Some(role.into()),
    };
    let secret = &compliance_backend::config::get_config().jwt_secret;
    let signed = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("sign token");
    format!("Bearer {}", signed)
}

async fn app() -> Router {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("UPLOADS_DIR", env::temp_dir().join("compliance-api-test"));
    let _ = compliance_backend::config::init_config();
    let config = compliance_backend::config::get_config();

    let pool = compliance_backend::database::pool::create_pool(config)
        .await
        .expect("pool");
    compliance_backend::database::pool::run_migrations(&pool)
        .await
        .expect("migrations");

    let state = compliance_backend::AppState::new(pool, config);
    compliance_backend::routes::router(state, config.max_upload_bytes())
}

async fn json_body(resp: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(resp.into_body(), 16 * 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn bundle_routes_end_to_end() {
    let app = app().await;
    let admin = token("admin");

    let req = Request::builder()
        .uri("/api/export/database")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/export/database")
        .header("authorization", token("user"))
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let csv = "Category,Type,Commitment,Due Date\n\
               contractual,Deliverable,Quarterly review,2024-09-30\n\
               contractual,Deliverable,Broken date,2024-99-99\n";
    let resp = app
        .clone()
        .oneshot(upload(
            "/api/compliance-items/import-csv",
            &admin,
            "items.csv",
            csv.as_bytes(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let summary = json_body(resp).await;
    assert_eq!(summary["imported"]["complianceItems"], 1);
    assert_eq!(summary["errors"]["complianceItems"], 1);

    let req = Request::builder()
        .uri("/api/export/unified")
        .header("authorization", admin.clone())
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/zip");
    let archive = to_bytes(resp.into_body(), 64 * 1024 * 1024).await.unwrap();

    let resp = app
        .clone()
        .oneshot(upload("/api/import/unified", &admin, "bundle.zip", &archive))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let summary = json_body(resp).await;
    assert_eq!(summary["total"], 0);
    assert!(summary["skipped"]["complianceItems"].as_u64().unwrap() >= 1);

    let resp = app
        .clone()
        .oneshot(upload(
            "/api/import/unified",
            &admin,
            "bundle.zip",
            &archive[..archive.len() / 3],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Corrupt archive"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn values_postgres_refuses_are_counted_not_fatal() {
    let app = app().await;
    let admin = token("admin");
    let org_id = uuid::Uuid::new_v4();
    let now = chrono::Utc::now();

    let manifest = serde_json::json!({
        "formatVersion": 1,
        "exportedAt": now,
        "scope": "database",
        "organizations": [{
            "id": org_id,
            "name": "Range Check Ltd",
            "code": format!("RC-{}", org_id.simple()),
            "type": "customer",
            "isActive": true,
            "createdAt": now,
        }],
        "billableEvents": [{
            "id": uuid::Uuid::new_v4(),
            "organizationId": org_id,
            "description": "Rate beyond NUMERIC(14,4)",
            "rate": "123456789012345",
            "units": "1",
            "total": "123456789012345",
            "billingDate": "2024-04-30",
            "isPaid": false,
            "createdAt": now,
        }],
        "auditLogs": [{
            "id": uuid::Uuid::new_v4(),
            "action": "EXPORT",
            "entityType": "database_bundle",
            "entityId": uuid::Uuid::new_v4(),
            "ipAddress": "unknown",
            "createdAt": now,
        }],
        "files": [],
    });

    let resp = app
        .clone()
        .oneshot(upload(
            "/api/import/database",
            &admin,
            "bundle.json",
            &serde_json::to_vec(&manifest).unwrap(),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let summary = json_body(resp).await;
    assert_eq!(summary["imported"]["organizations"], 1);
    assert_eq!(summary["errors"]["billableEvents"], 1);
    assert_eq!(summary["errors"]["auditLogs"], 1);
    assert_eq!(summary["total"], 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a disposable Postgres"]
async fn health_reports_database_status() {
    let app = app().await;

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "ok");
}
