//! End-to-end tests of the assembled application.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use cms::core::settings::UserSettings;
use cms::core::{Database, Settings};
use cms::images::models::{self as image_models, Image};
use cms::pages::models::{self as page_models, Page};
use cms::pages::ContentRegistry;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

fn settings(media_root: &TempDir) -> Settings {
    Settings {
        media_root: media_root.path().to_path_buf(),
        users: vec![UserSettings {
            username: "root".to_string(),
            token: "root-token".to_string(),
            is_active: true,
            is_staff: true,
            is_superuser: true,
            permissions: Vec::new(),
        }],
        ..Settings::default()
    }
}

async fn app() -> (Router, Database, TempDir) {
    let media = tempfile::tempdir().unwrap();
    let db = Database::memory().unwrap();
    let app = cms::build_app_with(&settings(&media), db.clone(), ContentRegistry::new())
        .await
        .unwrap();
    (app, db, media)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", "Bearer root-token")
        .body(Body::empty())
        .unwrap()
}

async fn json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_admin_index_lists_every_app() {
    let (app, _db, _media) = app().await;
    let resp = app.oneshot(admin_get("/admin/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    let labels: Vec<&str> = body["apps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|app| app["app_label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["images", "pages"]);
    assert_eq!(body["apps"][0]["models"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_admin_requires_token() {
    let (app, _db, _media) = app().await;
    let resp = app.oneshot(get("/admin/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_page_permalink_redirects() {
    let (app, db, _media) = app().await;
    let about = db
        .run(|conn| {
            let home = page_models::insert(conn, &Page::new("Home", "home").with_order(1))?;
            page_models::insert(conn, &Page::new("About", "about").with_parent(home).with_order(1))
        })
        .await
        .unwrap();

    let resp = app.oneshot(get(&format!("/r/1/{about}/"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()["location"], "/about/");
}

#[tokio::test]
async fn test_image_permalink_points_at_media() {
    let (app, db, _media) = app().await;
    let id = db
        .run(|conn| {
            image_models::insert_image(
                conn,
                &Image {
                    id: 0,
                    title: "Logo".to_string(),
                    image: "uploads/images/logo.png".to_string(),
                    width: 4,
                    height: 4,
                    size: 64,
                    category_id: None,
                },
            )
        })
        .await
        .unwrap();

    let resp = app.oneshot(get(&format!("/r/2/{id}/"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()["location"], "/media/uploads/images/logo.png");
}

#[tokio::test]
async fn test_unknown_permalinks() {
    let (app, _db, _media) = app().await;
    for uri in ["/r/9/1/", "/r/1/999/", "/r/x/1/"] {
        let resp = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn test_media_files_are_served() {
    let (app, _db, media) = app().await;
    let dir = media.path().join("uploads/images");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("note.txt"), "hello").unwrap();

    let resp = app.oneshot(get("/media/uploads/images/note.txt")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"hello");
}

#[tokio::test]
async fn test_relative_media_url_is_rejected() {
    let media = tempfile::tempdir().unwrap();
    let settings = Settings {
        media_url: "media/".to_string(),
        ..settings(&media)
    };
    let result = cms::build_app_with(&settings, Database::memory().unwrap(), ContentRegistry::new()).await;
    assert!(matches!(result, Err(cms::core::CmsError::ConfigurationError(_))));
}
