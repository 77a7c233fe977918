//! Defines every HTTP route of the catalog.
//!
//! ## Structure
//! - **Pages**
//!   - `GET  /`                   redirect to the upload form
//!   - `GET  /login`, `POST /login`, `POST /logout`   admin session
//!   - `GET  /upload_form`        upload form with cascading category menus (admin)
//!   - `POST /upload`             multipart upload, renders the confirmation page (admin)
//!   - `GET  /watch/{group_id}`   playback page (JSON for the mobile app)
//! - **API**
//!   - `POST /api/admin/login`                    admin bearer token
//!   - `GET  /api/videos`                         newest-first listing
//!   - `GET  /api/videos/search`                  title/category search
//!   - `GET  /api/videos/category/{category}`     videos in a category
//!   - `GET  /api/videos/{group_id}`              playback payload as JSON
//!   - `POST|DELETE /api/videos/{group_id}/thumbnail`   replace or remove a thumbnail (admin)
//!   - `GET  /api/categories`, `GET /api/languages`
//!   - `GET  /objects/{*key}`                     presigned object download
//! - **Probes**: `GET /healthz`, `GET /readyz`
//!
//! The wildcard `*key` allows nested keys like `videos/{id}/qr.png`.

use crate::{
    handlers::{
        auth_handlers::{api_login, login, login_page, logout},
        catalog_handlers::{
            categories, delete_thumbnail, languages, list_videos, search_videos,
            upload_thumbnail, videos_in_category,
        },
        health_handlers::{healthz, readyz},
        object_handlers::get_object,
        upload_handlers::{upload, upload_form},
        watch_handlers::{watch_json, watch_page},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Redirect,
    routing::{get, post},
};

/// Build the router. Uploads and thumbnail replacements may be up to
/// `max_upload_bytes` long; every other route keeps axum's default body limit.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/", get(|| async { Redirect::to("/upload_form") }))
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
        .route("/upload_form", get(upload_form))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/watch/{group_id}", get(watch_page))
        .route("/api/admin/login", post(api_login))
        .route("/api/languages", get(languages))
        .route("/api/categories", get(categories))
        .route("/api/videos", get(list_videos))
        .route("/api/videos/search", get(search_videos))
        .route("/api/videos/category/{category}", get(videos_in_category))
        .route("/api/videos/{group_id}", get(watch_json))
        .route(
            "/api/videos/{group_id}/thumbnail",
            post(upload_thumbnail)
                .delete(delete_thumbnail)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/objects/{*key}", get(get_object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD, TEST_BASE_URL, admin_state, count_rows,
        default_state,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use bytes::Bytes;
    use tower::ServiceExt;

    const BOUNDARY: &str = "catalog-test-boundary";

    async fn send(app: Router, req: Request<Body>) -> Response {
        app.oneshot(req).await.unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// A file part: field name, file name, declared content type and bytes.
    type FilePart<'a> = (&'a str, &'a str, &'a str, &'a [u8]);

    /// Build a multipart body from text fields and file parts.
    fn multipart_body(fields: &[(&str, &str)], files: &[FilePart<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        for (name, file_name, content_type, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_post(uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
    }

    fn upload_req(body: Vec<u8>) -> Request<Body> {
        multipart_post("/upload").body(Body::from(body)).unwrap()
    }

    const FIELDS: [(&str, &str); 5] = [
        ("group_name", "기초 용접 안전교육"),
        ("main_category", "안전"),
        ("sub_category", "용접"),
        ("sub_sub_category", "기초"),
        ("level", "초급"),
    ];

    #[tokio::test]
    async fn healthz_is_ok() {
        let (state, _dir) = default_state().await;
        let resp = send(routes(1024).with_state(state), get_req("/healthz")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn readyz_checks_catalog_and_disk() {
        let (state, _dir) = default_state().await;
        let resp = send(routes(1024).with_state(state), get_req("/readyz")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_redirects_to_upload_form() {
        let (state, _dir) = default_state().await;
        let resp = send(routes(1024).with_state(state), get_req("/")).await;
        assert!(resp.status().is_redirection());
        assert_eq!(resp.headers()[header::LOCATION], "/upload_form");
    }

    #[tokio::test]
    async fn upload_form_lists_main_categories() {
        let (state, _dir) = default_state().await;
        let resp = send(routes(1024).with_state(state), get_req("/upload_form")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains(r#"<option value="기계">기계</option>"#));
        assert!(html.contains("크레인"));
    }

    #[tokio::test]
    async fn unknown_watch_id_is_404() {
        let (state, _dir) = default_state().await;
        let app = routes(1024).with_state(state);
        let resp = send(app.clone(), get_req("/watch/nope")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = send(app, get_req("/api/videos/nope")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_without_file_is_400_and_stores_nothing() {
        let (state, _dir) = default_state().await;
        let app = routes(1 << 20).with_state(state.clone());
        let resp = send(app, upload_req(multipart_body(&FIELDS, &[]))).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(resp).await.contains("video file is required"));
        assert_eq!(count_rows(&state, "objects").await, 0);
        assert_eq!(count_rows(&state, "video_groups").await, 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (state, _dir) = default_state().await;
        let app = routes(64).with_state(state.clone());
        let body = multipart_body(&FIELDS, &[("file", "big.mp4", "video/mp4", &[7u8; 4096][..])]);
        let resp = send(app, upload_req(body)).await;

        assert!(resp.status().is_client_error());
        assert_eq!(count_rows(&state, "video_groups").await, 0);
    }

    #[tokio::test]
    async fn upload_then_watch_and_download() {
        let (state, _dir) = default_state().await;
        let app = routes(1 << 20).with_state(state.clone());

        let mut fields = FIELDS.to_vec();
        fields.push(("tag", "용접"));
        let video: FilePart<'_> = ("file", "lesson.mp4", "video/mp4", &b"video-bytes"[..]);
        let body = multipart_body(&fields, &[video]);
        let resp = send(app.clone(), upload_req(body)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("1:35"));

        let group_id: String = sqlx::query_scalar("SELECT group_id FROM video_groups")
            .fetch_one(&*state.catalog.db)
            .await
            .unwrap();
        assert!(html.contains(&group_id));

        let resp = send(
            app.clone(),
            Request::builder()
                .uri(format!("/watch/{group_id}?lang=en"))
                .header(header::USER_AGENT, "Dart/3.3 (dart:io)")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let view: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(view["title"], "en:기초 용접 안전교육");
        assert_eq!(view["current_language"], "en");
        assert_eq!(view["tag"], "용접");

        let resp = send(app.clone(), get_req(&format!("/watch/{group_id}"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("<video"));

        let video_url = view["video_url"].as_str().unwrap();
        let path = video_url.strip_prefix(TEST_BASE_URL).unwrap();
        let resp = send(app, get_req(path)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "11");
        assert!(resp.headers().contains_key(header::ETAG));
        assert_eq!(body_text(resp).await, "video-bytes");
    }

    #[tokio::test]
    async fn object_links_require_a_valid_signature() {
        let (state, _dir) = default_state().await;
        state
            .objects
            .put_bytes("videos/g1/qr.png", "image/png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        let app = routes(1024).with_state(state.clone());

        let resp = send(app.clone(), get_req("/objects/videos/g1/qr.png")).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let signed = state.signer.presign("videos/g1/qr.png").url;
        let path = signed.strip_prefix(TEST_BASE_URL).unwrap();
        let tampered = path.replace("qr.png", "video.mp4");
        let resp = send(app.clone(), get_req(&tampered)).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = send(app.clone(), get_req(path)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");

        let missing = state.signer.presign("videos/g2/qr.png").url;
        let resp = send(app, get_req(missing.strip_prefix(TEST_BASE_URL).unwrap())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    const LESSON: [&str; 3] = ["안전", "용접", "기초"];

    async fn only_group_id(state: &AppState) -> String {
        sqlx::query_scalar(
            "SELECT group_id FROM video_groups ORDER BY created_at DESC LIMIT 1",
        )
            .fetch_one(&*state.catalog.db)
            .await
            .unwrap()
    }

    /// Upload a lesson filed under `category` and return its group id.
    async fn upload_lesson(
        app: &Router,
        state: &AppState,
        title: &str,
        category: [&str; 3],
        cookie: Option<&str>,
    ) -> String {
        let fields = [
            ("group_name", title),
            ("main_category", category[0]),
            ("sub_category", category[1]),
            ("sub_sub_category", category[2]),
            ("level", "초급"),
        ];
        let body = multipart_body(&fields, &[("file", "lesson.mp4", "video/mp4", &b"v"[..])]);
        let mut req = multipart_post("/upload");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let resp = send(app.clone(), req.body(Body::from(body)).unwrap()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        only_group_id(state).await
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        serde_json::from_str(&body_text(resp).await).unwrap()
    }

    #[tokio::test]
    async fn objects_are_served_with_the_type_of_their_extension() {
        let (state, _dir) = default_state().await;
        let app = routes(1 << 20).with_state(state.clone());

        let script = &b"<script>alert(document.cookie)</script>"[..];
        let body = multipart_body(
            &FIELDS,
            &[
                ("file", "x.mp4", "text/html", script),
                ("thumbnail", "x.png", "text/html; charset=utf-8", script),
            ],
        );
        let resp = send(app.clone(), upload_req(body)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let group_id = only_group_id(&state).await;
        let resp = send(app.clone(), get_req(&format!("/api/videos/{group_id}"))).await;
        let view = json_body(resp).await;

        for (field, expected) in [("video_url", "video/mp4"), ("thumbnail_url", "image/png")] {
            let url = view[field].as_str().unwrap();
            let resp = send(app.clone(), get_req(url.strip_prefix(TEST_BASE_URL).unwrap())).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(resp.headers()[header::CONTENT_TYPE], expected);
            assert_eq!(resp.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        }
    }

    #[tokio::test]
    async fn catalog_outage_during_upload_is_reported_as_upload_failed() {
        let (state, _dir) = default_state().await;
        sqlx::query(
            "CREATE TRIGGER reject_groups BEFORE INSERT ON video_groups
             BEGIN SELECT RAISE(ABORT, 'catalog offline'); END",
        )
        .execute(&*state.catalog.db)
        .await
        .unwrap();
        let app = routes(1 << 20).with_state(state.clone());

        let body = multipart_body(&FIELDS, &[("file", "lesson.mp4", "video/mp4", &b"v"[..])]);
        let resp = send(app, upload_req(body)).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = json_body(resp).await;
        assert_eq!(err["error"], "upload failed");
        assert_eq!(count_rows(&state, "video_groups").await, 0);
    }

    #[tokio::test]
    async fn watch_failures_are_not_reported_as_upload_failures() {
        let (state, _dir) = default_state().await;
        sqlx::query("DROP TABLE video_groups")
            .execute(&*state.catalog.db)
            .await
            .unwrap();
        let app = routes(1024).with_state(state);

        let resp = send(app, get_req("/api/videos/abc")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = json_body(resp).await;
        assert_eq!(err["error"], "internal error");
    }

    fn login_req(email: &str, password: &str) -> Request<Body> {
        let form = format!(
            "email={}&password={}",
            email.replace('@', "%40"),
            password.replace(' ', "+")
        );
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap()
    }

    #[tokio::test]
    async fn admin_pages_require_a_session() {
        let (state, _dir) = admin_state().await;
        let app = routes(1 << 20).with_state(state.clone());

        let resp = send(app.clone(), get_req("/upload_form")).await;
        assert!(resp.status().is_redirection());
        assert_eq!(resp.headers()[header::LOCATION], "/login");

        let body = multipart_body(&FIELDS, &[("file", "lesson.mp4", "video/mp4", &b"v"[..])]);
        let resp = send(app.clone(), upload_req(body)).await;
        assert_eq!(resp.headers()[header::LOCATION], "/login");
        assert_eq!(count_rows(&state, "objects").await, 0);

        let resp = send(app.clone(), get_req("/login")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains(r#"name="password""#));

        let resp = send(app.clone(), login_req(TEST_ADMIN_EMAIL, "wrong")).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
        assert!(body_text(resp).await.contains("올바르지 않습니다"));

        let resp = send(app.clone(), login_req(TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD)).await;
        assert!(resp.status().is_redirection());
        assert_eq!(resp.headers()[header::LOCATION], "/upload_form");
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.contains("HttpOnly"));
        let cookie = set_cookie.split(';').next().unwrap().to_string();
        assert!(cookie.starts_with("vc_admin="));

        let resp = send(
            app.clone(),
            Request::builder()
                .uri("/upload_form")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains(r#"action="/logout""#));

        upload_lesson(&app, &state, "용접 기초", LESSON, Some(&cookie)).await;
        assert_eq!(count_rows(&state, "video_groups").await, 1);

        let resp = send(
            app,
            Request::builder()
                .method("POST")
                .uri("/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let cleared = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cleared.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn viewers_need_no_session() {
        let (state, _dir) = admin_state().await;
        let app = routes(1 << 20).with_state(state.clone());
        let resp = send(app.clone(), login_req(TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD)).await;
        let set_cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_string();
        let group_id = upload_lesson(&app, &state, "용접 기초", LESSON, Some(&cookie)).await;

        for uri in [format!("/watch/{group_id}"), "/api/videos".to_string()] {
            let resp = send(app.clone(), get_req(&uri)).await;
            assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn thumbnail_api_requires_an_admin_token() {
        let (state, _dir) = admin_state().await;
        let app = routes(1 << 20).with_state(state.clone());

        let resp = send(
            app.clone(),
            Request::builder()
                .method("POST")
                .uri("/api/admin/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "email": TEST_ADMIN_EMAIL,
                        "password": TEST_ADMIN_PASSWORD,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let token = json_body(resp).await["token"].as_str().unwrap().to_string();
        let bearer = format!("Bearer {token}");

        let cookie = format!("vc_admin={token}");
        let group_id = upload_lesson(&app, &state, "용접 기초", LESSON, Some(&cookie)).await;
        let uri = format!("/api/videos/{group_id}/thumbnail");
        let thumb = || multipart_body(&[], &[("thumbnail", "cover.png", "image/png", &b"png"[..])]);

        let unsigned = multipart_post(&uri).body(Body::from(thumb())).unwrap();
        let resp = send(app.clone(), unsigned).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let resp = send(
            app.clone(),
            Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = send(
            app.clone(),
            multipart_post(&uri)
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::from(thumb()))
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let updated = json_body(resp).await;
        assert!(updated["thumbnail_url"].as_str().unwrap().contains("thumbnail.png"));

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap()
        };
        assert_eq!(send(app.clone(), delete()).await.status(), StatusCode::OK);
        assert_eq!(send(app, delete()).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn browse_api_lists_searches_and_filters() {
        let (state, _dir) = default_state().await;
        let app = routes(1 << 20).with_state(state.clone());
        let crane =
            upload_lesson(&app, &state, "크레인 점검", ["기계", "공작기계", "크레인"], None).await;
        upload_lesson(&app, &state, "드릴 사용법", ["공구", "수공구", "드릴"], None).await;

        let all = json_body(send(app.clone(), get_req("/api/videos?lang=en")).await).await;
        assert_eq!(all["total"], 2);
        assert_eq!(all["language"], "en");
        assert_eq!(all["language_name"], "English");

        // 기계
        let machines = json_body(
            send(app.clone(), get_req("/api/videos?category=%EA%B8%B0%EA%B3%84&limit=10")).await,
        )
        .await;
        assert_eq!(machines["total"], 1);
        assert_eq!(machines["videos"][0]["group_id"], crane.as_str());

        // 크레인
        let found = json_body(
            send(app.clone(), get_req("/api/videos/search?q=%ED%81%AC%EB%A0%88%EC%9D%B8")).await,
        )
        .await;
        assert_eq!(found["total"], 1);
        assert_eq!(found["query"], "크레인");
        assert_eq!(found["videos"][0]["title"], "크레인 점검");

        let blank = json_body(send(app.clone(), get_req("/api/videos/search?q=")).await).await;
        assert_eq!(blank["total"], 0);

        // 공구
        let tools = json_body(
            send(app.clone(), get_req("/api/videos/category/%EA%B3%B5%EA%B5%AC?lang=ja")).await,
        )
        .await;
        assert_eq!(tools["total"], 1);
        assert_eq!(tools["category"], "공구");
        assert_eq!(tools["videos"][0]["main_category"], "ja:공구");

        let cats = json_body(send(app.clone(), get_req("/api/categories?lang=vi")).await).await;
        assert_eq!(cats["language"], "vi");
        assert!(!cats["categories"]["mains"].as_array().unwrap().is_empty());
        assert_eq!(cats["supported_languages"].as_array().unwrap().len(), 7);

        let langs = json_body(send(app, get_req("/api/languages")).await).await;
        assert_eq!(langs["total"], 7);
        assert_eq!(langs["languages"]["zh-cn"], "中文");
    }
}
