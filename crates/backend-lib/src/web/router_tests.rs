use super::create_router;
use crate::config::Settings;
use crate::{test_state, AppState};
use authdb_common::AccountView;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const PEER: &str = "192.0.2.10:51000";

fn app() -> Router {
    create_router(Arc::new(test_state()))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    post_form_from(PEER, &[], uri, body, cookie)
}

/// Form post arriving from `peer`, with extra request headers
fn post_form_from(
    peer: &str,
    headers: &[(&str, &str)],
    uri: &str,
    body: &str,
    cookie: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let mut request = builder.body(Body::from(body.to_string())).unwrap();
    let peer: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

async fn signup(app: &Router, login: &str, email: &str) -> Response {
    send(
        app,
        post_form(
            "/signup",
            &format!("login={login}&email={email}&password=hunter2&confirm_password=hunter2"),
            None,
        ),
    )
    .await
}

/// Log in and return the `token=...` pair for the Cookie header
async fn login_cookie(app: &Router, login: &str, password: &str) -> String {
    let response = send(
        app,
        post_form("/login", &format!("login={login}&password={password}"), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cookie = set_cookies(&response).remove(0);
    cookie.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_health_is_public() {
    let response = send(&app(), get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("\"ok\""));
}

#[tokio::test]
async fn test_protected_pages_redirect_without_session() {
    let app = app();
    for uri in ["/", "/users", "/update", "/delete", "/logout"] {
        let response = send(&app, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/login");
    }
}

#[tokio::test]
async fn test_signup_then_login() {
    let app = app();
    let response = send(&app, get("/signup", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = signup(&app, "bobby", "bob%40x.com").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = send(
        &app,
        post_form("/login", "login=bobby&password=hunter2&remember_me=on", None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = set_cookies(&response).remove(0);
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains(&format!("Max-Age={}", 15 * 24 * 3600)));

    let pair = cookie.split(';').next().unwrap();
    let response = send(&app, get("/", Some(pair))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Hello, bobby"));
}

#[tokio::test]
async fn test_signup_errors_render_form() {
    let app = app();
    signup(&app, "bobby", "bob%40x.com").await;

    let response = signup(&app, "bobby", "bob%40x.com").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("User already exists"));

    let response = send(
        &app,
        post_form(
            "/signup",
            "login=alice&email=a%40x.com&password=pass1&confirm_password=pass2",
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("Password mismatch"));

    let response = send(&app, post_form("/signup", "login=alice", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response)
        .await
        .contains("Not all fields are filled in"));
}

#[tokio::test]
async fn test_login_failures() {
    let app = app();
    signup(&app, "bobby", "bob%40x.com").await;

    let response = send(&app, post_form("/login", "login=bobby&password=nope1", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());
    assert!(body_string(response).await.contains("Incorrect password"));

    let response = send(&app, post_form("/login", "login=ghost&password=nope1", None)).await;
    assert!(body_string(response).await.contains("User not found"));

    let response = send(&app, post_form("/login", "login=&password=", None)).await;
    assert!(body_string(response)
        .await
        .contains("You must provide a login and password"));
}

#[tokio::test]
async fn test_login_throttle_locks_out_client() {
    let app = app();
    signup(&app, "bobby", "bob%40x.com").await;

    for _ in 0..5 {
        let response = send(&app, post_form("/login", "login=bobby&password=nope1", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // even the right password is refused while locked out
    let response = send(&app, post_form("/login", "login=bobby&password=hunter2", None)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(body_string(response).await.contains("Too many login attempts"));
}

#[tokio::test]
async fn test_forged_forwarding_headers_do_not_move_throttle_key() {
    let app = app();
    signup(&app, "bobby", "bob%40x.com").await;

    // a fresh x-real-ip on every guess still counts against the peer
    for i in 0..5 {
        let spoofed = format!("198.51.100.{i}");
        let request = post_form_from(
            PEER,
            &[("x-real-ip", spoofed.as_str())],
            "/login",
            "login=bobby&password=nope1",
            None,
        );
        assert_eq!(send(&app, request).await.status(), StatusCode::BAD_REQUEST);
    }
    let request = post_form_from(
        PEER,
        &[("x-real-ip", "198.51.100.99")],
        "/login",
        "login=bobby&password=nope1",
        None,
    );
    assert_eq!(
        send(&app, request).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    // claiming the locked-out address does not lock out another peer
    let request = post_form_from(
        "192.0.2.77:40000",
        &[("x-forwarded-for", "192.0.2.10")],
        "/login",
        "login=bobby&password=hunter2",
        None,
    );
    assert_eq!(send(&app, request).await.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_trusted_proxy_headers_key_the_throttle() {
    let base = test_state();
    let settings = Settings {
        trust_proxy_headers: true,
        ..(*base.settings).clone()
    };
    let state = AppState::new(
        Arc::clone(&base.accounts),
        settings,
        Arc::new(crate::events::TracingEventSink),
    )
    .unwrap();
    let app = create_router(Arc::new(state));
    signup(&app, "bobby", "bob%40x.com").await;

    for _ in 0..5 {
        let request = post_form_from(
            PEER,
            &[("x-forwarded-for", "203.0.113.5")],
            "/login",
            "login=bobby&password=nope1",
            None,
        );
        assert_eq!(send(&app, request).await.status(), StatusCode::BAD_REQUEST);
    }

    // same proxy, different end client
    let request = post_form_from(
        PEER,
        &[("x-forwarded-for", "203.0.113.6")],
        "/login",
        "login=bobby&password=hunter2",
        None,
    );
    assert_eq!(send(&app, request).await.status(), StatusCode::SEE_OTHER);

    let request = post_form_from(
        PEER,
        &[("x-forwarded-for", "203.0.113.5")],
        "/login",
        "login=bobby&password=hunter2",
        None,
    );
    assert_eq!(
        send(&app, request).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_users_lists_public_view() {
    let app = app();
    signup(&app, "bobby", "bob%40x.com").await;
    signup(&app, "alice", "alice%40x.com").await;
    let cookie = login_cookie(&app, "bobby", "hunter2").await;

    let response = send(&app, get("/users", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(!body.contains("password"));
    let users: Vec<AccountView> = serde_json::from_str(&body).unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.role == "user"));
}

#[tokio::test]
async fn test_update_changes_own_account() {
    let app = app();
    signup(&app, "bobby", "bob%40x.com").await;
    signup(&app, "alice", "alice%40x.com").await;
    let cookie = login_cookie(&app, "bobby", "hunter2").await;

    let response = send(&app, post_form("/update", "new_login=robert", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let response = send(&app, get("/", Some(&cookie))).await;
    assert!(body_string(response).await.contains("Hello, robert"));

    let response = send(
        &app,
        post_form("/update", "new_login=roberto&new_email=r%40x.com", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response)
        .await
        .contains("No valid update data provided"));

    let response = send(
        &app,
        post_form("/update", "new_email=alice%40x.com", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&app, post_form("/update", "new_login=robert", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        post_form("/update", "new_password=fresh42", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    login_cookie(&app, "robert", "fresh42").await;
    login_cookie(&app, "alice", "hunter2").await;
}

#[tokio::test]
async fn test_delete_revokes_old_token() {
    let app = app();
    signup(&app, "bobby", "bob%40x.com").await;
    let cookie = login_cookie(&app, "bobby", "hunter2").await;

    let response = send(&app, get("/delete", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, post_form("/delete", "", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    assert!(set_cookies(&response)
        .iter()
        .any(|c| c.starts_with("token=;") && c.contains("Max-Age=0")));

    let response = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = send(&app, post_form("/login", "login=bobby&password=hunter2", None)).await;
    assert!(body_string(response).await.contains("User not found"));
}

#[tokio::test]
async fn test_logout_expires_every_cookie() {
    let app = app();
    signup(&app, "bobby", "bob%40x.com").await;
    let cookie = login_cookie(&app, "bobby", "hunter2").await;
    let sent = format!("{cookie}; theme=dark");

    let response = send(&app, get("/logout", Some(&sent))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
    let cleared = set_cookies(&response);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().any(|c| c.starts_with("token=;")));
    assert!(cleared.iter().any(|c| c.starts_with("theme=;")));

    let response = send(&app, get("/", Some(&cookie))).await;
    assert_eq!(location(&response), "/login");
}
