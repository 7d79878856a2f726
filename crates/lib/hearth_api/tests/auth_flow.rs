//! Integration tests: build the router over an in-memory store and drive the
//! auth and admin endpoints end to end.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use hearth_api::{AppState, config::ApiConfig};
use hearth_core::rate_limit::InMemoryRateLimiter;
use hearth_core::store::{DocumentStore, MemoryStore};
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    next_ip: AtomicU32,
}

struct TestResponse {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    json: Value,
}

impl TestResponse {
    /// `auth_token=...` pair from `Set-Cookie`, ready for a `Cookie` header.
    fn session_cookie(&self) -> String {
        let set_cookie = self.headers[header::SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

impl TestApp {
    fn new() -> Self {
        let config = ApiConfig::from_lookup(|key| match key {
            "SESSION_SECRET" => Some("integration-secret".into()),
            "BCRYPT_COST" => Some("4".into()),
            "PUBLIC_URL" => Some("https://hearth.test".into()),
            _ => None,
        })
        .expect("config");
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            store.clone(),
            config,
            Arc::new(InMemoryRateLimiter::new()),
        )
        .expect("state");
        Self {
            app: hearth_api::router(state),
            store,
            next_ip: AtomicU32::new(1),
        }
    }

    /// Unique client address so rate limits do not leak between steps.
    fn fresh_ip(&self) -> String {
        let n = self.next_ip.fetch_add(1, Ordering::Relaxed);
        format!("10.0.{}.{}", n / 256, n % 256)
    }

    async fn send_from(
        &self,
        ip: &str,
        method: &str,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", ip);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = self.app.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        TestResponse {
            status,
            headers,
            json,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let ip = self.fresh_ip();
        self.send_from(&ip, method, uri, body, cookie).await
    }

    async fn register(&self, name: &str, email: &str, invite: Option<&str>) -> TestResponse {
        let mut body = json!({ "name": name, "email": email, "password": "password123" });
        if let Some(code) = invite {
            body["inviteCode"] = json!(code);
        }
        self.send("POST", "/api/auth/register", Some(body), None)
            .await
    }

    /// Alice as the bootstrap admin, returning her session cookie and profile.
    async fn alice(&self) -> (String, Value) {
        let resp = self.register("Alice", "alice@test.com", None).await;
        assert_eq!(resp.status, StatusCode::CREATED);
        (resp.session_cookie(), resp.json["user"].clone())
    }

    /// Bob invited into Alice's family, returning his session cookie and profile.
    async fn bob(&self, alice_cookie: &str) -> (String, Value) {
        let invite = self
            .send("POST", "/api/auth/invite", None, Some(alice_cookie))
            .await;
        assert_eq!(invite.status, StatusCode::CREATED);
        let code = invite.json["code"].as_str().unwrap().to_string();

        let resp = self.register("Bob", "bob@test.com", Some(&code)).await;
        assert_eq!(resp.status, StatusCode::CREATED);
        (resp.session_cookie(), resp.json["user"].clone())
    }

    async fn set_role(&self, user_id: &str, role: &str) {
        let mut fields = serde_json::Map::new();
        fields.insert("role".into(), json!(role));
        assert!(self.store.update("users", user_id, fields).await.unwrap());
    }
}

#[tokio::test]
async fn first_user_becomes_admin_and_later_users_need_invite() {
    let app = TestApp::new();

    let resp = app.register("Alice", "alice@test.com", None).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json["user"]["role"], "admin");
    assert_eq!(resp.json["user"]["email"], "alice@test.com");
    assert!(resp.json["user"].get("passwordHash").is_none());

    let set_cookie = resp.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("auth_token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains("Max-Age=86400"));

    let resp = app.register("Mallory", "mallory@test.com", None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert!(
        resp.json["message"]
            .as_str()
            .unwrap()
            .contains("invite code")
    );
}

#[tokio::test]
async fn invited_user_joins_inviters_family() {
    let app = TestApp::new();
    let (alice_cookie, alice) = app.alice().await;
    let (_, bob) = app.bob(&alice_cookie).await;

    assert_eq!(bob["role"], "member");
    assert_eq!(bob["familyId"], alice["familyId"]);
}

#[tokio::test]
async fn invite_check_reports_unused_codes() {
    let app = TestApp::new();
    let (alice_cookie, _) = app.alice().await;

    let invite = app
        .send("POST", "/api/auth/invite", None, Some(&alice_cookie))
        .await;
    let code = invite.json["code"].as_str().unwrap().to_string();

    let check = app
        .send("GET", &format!("/api/auth/invite/{code}"), None, None)
        .await;
    assert_eq!(check.status, StatusCode::OK);
    assert_eq!(check.json["valid"], true);

    let resp = app.register("Bob", "bob@test.com", Some(&code)).await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let check = app
        .send("GET", &format!("/api/auth/invite/{code}"), None, None)
        .await;
    assert_eq!(check.json["valid"], false);

    // A spent code cannot be reused.
    let resp = app.register("Carol", "carol@test.com", Some(&code)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn login_sets_cookie_and_me_returns_profile() {
    let app = TestApp::new();
    app.alice().await;

    let resp = app
        .send(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "alice@test.com", "password": "password123" })),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["user"]["name"], "Alice");
    let set_cookie = resp.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=604800"));

    let me = app
        .send("GET", "/api/auth/me", None, Some(&resp.session_cookie()))
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json["user"]["email"], "alice@test.com");
    assert_eq!(me.json["user"]["role"], "admin");
}

#[tokio::test]
async fn protected_routes_require_valid_cookie() {
    let app = TestApp::new();

    let resp = app.send("GET", "/api/auth/me", None, None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json["error"], "unauthorized");

    let resp = app
        .send("GET", "/api/auth/me", None, Some("auth_token=not.a.token"))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.send("POST", "/api/auth/invite", None, None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app.send("GET", "/api/admin/families", None, None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_cookie() {
    let app = TestApp::new();
    let resp = app.send("POST", "/api/auth/logout", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["success"], true);
    let set_cookie = resp.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("auth_token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new();
    app.alice().await;
    let resp = app
        .send(
            "POST",
            "/api/auth/login",
            Some(json!({ "email": "alice@test.com", "password": "nope-nope" })),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = TestApp::new();
    let resp = app
        .send(
            "POST",
            "/api/auth/register",
            Some(json!({ "name": "Alice" })),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["error"], "validation_error");
}

#[tokio::test]
async fn sixth_login_from_one_ip_is_rate_limited() {
    let app = TestApp::new();
    let body = json!({ "email": "nobody@test.com", "password": "password123" });

    for _ in 0..5 {
        let resp = app
            .send_from("198.51.100.1", "POST", "/api/auth/login", Some(body.clone()), None)
            .await;
        assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    }

    let resp = app
        .send_from("198.51.100.1", "POST", "/api/auth/login", Some(body.clone()), None)
        .await;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp.headers[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1 && retry_after <= 900);

    // Other clients are unaffected.
    let resp = app
        .send_from("198.51.100.2", "POST", "/api/auth/login", Some(body), None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_role_is_read_from_store() {
    let app = TestApp::new();
    let (alice_cookie, alice) = app.alice().await;
    let (bob_cookie, bob) = app.bob(&alice_cookie).await;
    let bob_id = bob["id"].as_str().unwrap();

    let resp = app
        .send("GET", "/api/admin/families", None, Some(&bob_cookie))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // Promotion takes effect without a new token.
    app.set_role(bob_id, "admin").await;
    let resp = app
        .send("GET", "/api/admin/families", None, Some(&bob_cookie))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let families = resp.json["families"].as_array().unwrap();
    assert_eq!(families.len(), 1);
    assert_eq!(families[0]["id"], alice["familyId"]);
    assert_eq!(families[0]["memberCount"], 2);

    // So does demotion, even though Alice's token still says admin.
    app.set_role(alice["id"].as_str().unwrap(), "member").await;
    let resp = app
        .send("GET", "/api/admin/families", None, Some(&alice_cookie))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleted_user_token_is_rejected_by_admin_guard() {
    let app = TestApp::new();
    let (alice_cookie, alice) = app.alice().await;
    assert!(
        app.store
            .delete("users", alice["id"].as_str().unwrap())
            .await
            .unwrap()
    );

    let resp = app
        .send("GET", "/api/admin/families", None, Some(&alice_cookie))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = app
        .send("GET", "/api/auth/me", None, Some(&alice_cookie))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_invites_into_any_family() {
    let app = TestApp::new();
    let (alice_cookie, _) = app.alice().await;

    let resp = app
        .send(
            "POST",
            "/api/admin/families",
            Some(json!({ "name": "The Smiths" })),
            Some(&alice_cookie),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let family_id = resp.json["family"]["id"].as_str().unwrap().to_string();
    assert_eq!(resp.json["family"]["name"], "The Smiths");

    let resp = app
        .send(
            "POST",
            "/api/admin/invite",
            Some(json!({ "familyId": family_id })),
            Some(&alice_cookie),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let code = resp.json["code"].as_str().unwrap().to_string();
    assert_eq!(
        resp.json["inviteUrl"],
        format!("https://hearth.test/register?invite={code}")
    );

    let resp = app.register("Sam", "sam@test.com", Some(&code)).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json["user"]["familyId"], family_id.as_str());
    assert_eq!(resp.json["user"]["role"], "member");
}

#[tokio::test]
async fn admin_invite_requires_known_family() {
    let app = TestApp::new();
    let (alice_cookie, _) = app.alice().await;

    let resp = app
        .send("POST", "/api/admin/invite", Some(json!({})), Some(&alice_cookie))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = app
        .send(
            "POST",
            "/api/admin/invite",
            Some(json!({ "familyId": "no-such-family" })),
            Some(&alice_cookie),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn made_up_invite_does_not_reveal_registered_emails() {
    let app = TestApp::new();
    app.alice().await;

    let known = app
        .register("Eve", "alice@test.com", Some("BOGUS123"))
        .await;
    let unknown = app
        .register("Eve", "eve@test.com", Some("BOGUS123"))
        .await;
    assert_eq!(known.status, StatusCode::FORBIDDEN);
    assert_eq!(unknown.status, StatusCode::FORBIDDEN);
    assert_eq!(known.json, unknown.json);
}
