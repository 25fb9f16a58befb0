//! Integration tests for the dues backend.

use std::sync::{Arc, Mutex};

use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use tempfile::TempDir;

use crate::db::{init_database, Repository};
use crate::notify::{Notifier, NotifyError};
use crate::{create_router, AppState};

/// Notifier that records every message so tests can read reset tokens.
#[derive(Default)]
struct CapturingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
}

impl Notifier for CapturingNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

impl CapturingNotifier {
    /// The token embedded in the most recent message sent to `to`.
    fn last_token_for(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(recipient, _, _)| recipient == to)
            .and_then(|(_, _, body)| body.rsplit(": ").next().map(|s| s.to_string()))
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    notifier: Arc<CapturingNotifier>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let notifier = Arc::new(CapturingNotifier::default());

        let state = AppState {
            repo,
            notifier: notifier.clone(),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        TestFixture {
            client: Client::new(),
            base_url,
            notifier,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Register an initial admin account.
    async fn register(&self, first: &str, phone: &str, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "firstName": first,
                "lastName": "Tester",
                "phone": phone,
                "email": email,
                "password": "password123"
            }))
            .send()
            .await
            .unwrap()
    }

    /// Log in and return the response body data.
    async fn login(&self, email: &str, password: &str) -> Value {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "login should succeed for {}", email);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    /// Register, log in, and run group setup; returns the session token.
    async fn create_group_admin(
        &self,
        first: &str,
        phone: &str,
        email: &str,
        group_code: &str,
        admin_code: &str,
    ) -> String {
        let resp = self.register(first, phone, email).await;
        assert_eq!(resp.status(), 200);
        let data = self.login(email, "password123").await;
        let token = data["token"].as_str().unwrap().to_string();

        let resp = self
            .client
            .post(self.url("/api/setup"))
            .bearer_auth(&token)
            .json(&json!({
                "groupCode": group_code,
                "confirmGroupCode": group_code,
                "adminCode": admin_code,
                "confirmAdminCode": admin_code
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "setup should succeed");

        token
    }

    /// Add a member through the admin API and return its data.
    async fn add_member(
        &self,
        token: &str,
        first: &str,
        phone: &str,
        email: &str,
        amount: &str,
    ) -> Value {
        let resp = self
            .client
            .post(self.url("/api/group/members"))
            .bearer_auth(token)
            .json(&json!({
                "firstName": first,
                "lastName": "Member",
                "phone": phone,
                "email": email,
                "amount": amount
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "add member should succeed for {}", first);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }
}

fn dec(v: &Value) -> Decimal {
    Decimal::from_str(v.as_str().expect("amount should be a string")).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/group"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = fixture
        .client
        .get(fixture.url("/api/group/members"))
        .bearer_auth("bogus-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_register_validation() {
    let fixture = TestFixture::new().await;

    // Missing fields
    let resp = fixture.register("", "5550000001", "a@example.com").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MISSING_FIELDS");

    // Bad phone
    let resp = fixture.register("Ann", "12345", "ann@example.com").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_PHONE");

    // Bad email
    let resp = fixture.register("Ann", "5550000001", "not-an-email").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_EMAIL");

    // Short password
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/register"))
        .json(&json!({
            "firstName": "Ann",
            "lastName": "Tester",
            "phone": "5550000001",
            "email": "ann@example.com",
            "password": "short"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let fixture = TestFixture::new().await;

    let resp = fixture.register("Ann", "5550000001", "ann@example.com").await;
    assert_eq!(resp.status(), 200);

    // Same email, different case
    let resp = fixture.register("Bea", "5550000002", "Ann@Example.com").await;
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "EMAIL_IN_USE");
}

#[tokio::test]
async fn test_initial_setup_flow() {
    let fixture = TestFixture::new().await;

    let resp = fixture.register("Ann", "5550000001", "ann@example.com").await;
    assert_eq!(resp.status(), 200);

    // Before setup the account has no group
    let data = fixture.login("ann@example.com", "password123").await;
    assert!(data["role"].is_null());
    assert!(data["groupCode"].is_null());
    let token = data["token"].as_str().unwrap().to_string();

    // Group code "1234", admin code "5678", confirmed twice
    let resp = fixture
        .client
        .post(fixture.url("/api/setup"))
        .bearer_auth(&token)
        .json(&json!({
            "groupCode": "1234",
            "confirmGroupCode": "1234",
            "adminCode": "5678",
            "confirmAdminCode": "5678"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["groupCode"], "1234");
    assert_eq!(body["data"]["memberCount"], 1);

    // The caller is now the group's admin
    let data = fixture.login("ann@example.com", "password123").await;
    assert_eq!(data["role"], "Admin");
    assert_eq!(data["groupCode"], "1234");

    // The admin code maps to the group: a second admin can join through it
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/signup/admin"))
        .json(&json!({
            "adminCode": "5678",
            "firstName": "Bea",
            "lastName": "Tester",
            "phone": "5550000002",
            "email": "bea@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "Admin");

    // Setup confirmation email went out
    assert!(fixture
        .notifier
        .sent
        .lock()
        .unwrap()
        .iter()
        .any(|(to, subject, _)| to == "ann@example.com" && subject == "Group setup complete"));
}

#[tokio::test]
async fn test_setup_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture.register("Ann", "5550000001", "ann@example.com").await;
    assert_eq!(resp.status(), 200);
    let data = fixture.login("ann@example.com", "password123").await;
    let token = data["token"].as_str().unwrap().to_string();

    let cases = [
        // (group, confirmGroup, admin, confirmAdmin, expected code)
        ("", "", "5678", "5678", "MISSING_FIELDS"),
        ("123", "123", "5678", "5678", "INVALID_CODE"),
        ("12345678", "12345678", "5678", "5678", "INVALID_CODE"),
        ("1234", "1234", "56a8", "56a8", "INVALID_CODE"),
        ("1234", "4321", "5678", "5678", "CODE_MISMATCH"),
        ("1234", "1234", "5678", "8765", "CODE_MISMATCH"),
        ("1234", "1234", "1234", "1234", "VALIDATION_ERROR"),
    ];

    for (group, confirm_group, admin, confirm_admin, expected) in cases {
        let resp = fixture
            .client
            .post(fixture.url("/api/setup"))
            .bearer_auth(&token)
            .json(&json!({
                "groupCode": group,
                "confirmGroupCode": confirm_group,
                "adminCode": admin,
                "confirmAdminCode": confirm_admin
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "case {:?}", (group, admin));
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], expected, "case {:?}", (group, admin));
    }
}

#[tokio::test]
async fn test_setup_duplicate_codes() {
    let fixture = TestFixture::new().await;

    fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    // Second admin wants codes that collide with the first group
    let resp = fixture
        .register("Bea", "5550000002", "bea@example.com")
        .await;
    assert_eq!(resp.status(), 200);
    let data = fixture.login("bea@example.com", "password123").await;
    let token = data["token"].as_str().unwrap().to_string();

    // Admin code already registered
    let resp = fixture
        .client
        .post(fixture.url("/api/setup"))
        .bearer_auth(&token)
        .json(&json!({
            "groupCode": "9999",
            "confirmGroupCode": "9999",
            "adminCode": "5678",
            "confirmAdminCode": "5678"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "DUPLICATE_ADMIN_CODE");

    // Group code already mapped to another admin
    let resp = fixture
        .client
        .post(fixture.url("/api/setup"))
        .bearer_auth(&token)
        .json(&json!({
            "groupCode": "1234",
            "confirmGroupCode": "1234",
            "adminCode": "4444",
            "confirmAdminCode": "4444"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "DUPLICATE_GROUP_CODE");
}

#[tokio::test]
async fn test_member_signup_invalid_group_code() {
    let fixture = TestFixture::new().await;

    // No group "1234" exists anywhere
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/signup/member"))
        .json(&json!({
            "groupCode": "1234",
            "firstName": "Sam",
            "lastName": "Tester",
            "phone": "5550000003",
            "email": "sam@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_GROUP_CODE");

    // No account was persisted for the failed signup
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": "sam@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_member_signup_and_self_views() {
    let fixture = TestFixture::new().await;

    let admin_token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/signup/member"))
        .json(&json!({
            "groupCode": "1234",
            "firstName": "Sam",
            "lastName": "Tester",
            "phone": "5550000003",
            "email": "sam@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "User");

    let data = fixture.login("sam@example.com", "password123").await;
    assert_eq!(data["role"], "User");
    assert_eq!(data["groupCode"], "1234");
    let user_token = data["token"].as_str().unwrap().to_string();

    // Own balance starts at zero
    let resp = fixture
        .client
        .get(fixture.url("/api/group/me/balance"))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["firstName"], "Sam");
    assert_eq!(dec(&body["data"]["amount"]), Decimal::ZERO);

    // Members list is visible to users
    let resp = fixture
        .client
        .get(fixture.url("/api/group/members"))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Admin operations are not
    let resp = fixture
        .client
        .post(fixture.url("/api/group/members"))
        .bearer_auth(&user_token)
        .json(&json!({
            "firstName": "Eve",
            "lastName": "Member",
            "phone": "5550000004",
            "email": "eve@example.com",
            "amount": "0"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let resp = fixture
        .client
        .get(fixture.url("/api/group/ledger"))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Member count reflects both joiners
    let resp = fixture
        .client
        .get(fixture.url("/api/group"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["memberCount"], 2);
}

#[tokio::test]
async fn test_group_unresolved_before_setup() {
    let fixture = TestFixture::new().await;

    let resp = fixture.register("Ann", "5550000001", "ann@example.com").await;
    assert_eq!(resp.status(), 200);
    let data = fixture.login("ann@example.com", "password123").await;
    let token = data["token"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .get(fixture.url("/api/group/members"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "GROUP_UNRESOLVED");
}

#[tokio::test]
async fn test_member_crud() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    // Create
    let member = fixture
        .add_member(&token, "Sam", "5551234567", "sam@example.com", "50.00")
        .await;
    let member_id = member["id"].as_str().unwrap().to_string();
    assert_eq!(member["firstName"], "Sam");
    assert_eq!(member["role"], "User");
    assert_eq!(dec(&member["amount"]), Decimal::from_str("50.00").unwrap());

    // Get
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/group/members/{}", member_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["firstName"], "Sam");
    // Phone was stored digits-only, email lowercased
    assert_eq!(body["data"]["phone"], "5551234567");
    assert_eq!(body["data"]["email"], "sam@example.com");

    // Update
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/group/members/{}", member_id)))
        .bearer_auth(&token)
        .json(&json!({
            "firstName": "Samuel",
            "lastName": "Member",
            "phone": "(555) 123-4567",
            "email": "Sam@Example.com",
            "amount": "62.50"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["firstName"], "Samuel");
    assert_eq!(body["data"]["phone"], "5551234567");
    assert_eq!(dec(&body["data"]["amount"]), Decimal::from_str("62.50").unwrap());

    // List (admin + Samuel)
    let resp = fixture
        .client
        .get(fixture.url("/api/group/members"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // Member count tracks the add
    let resp = fixture
        .client
        .get(fixture.url("/api/group"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["memberCount"], 2);

    // Delete
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/group/members/{}", member_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Verify deleted, count back down
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/group/members/{}", member_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MEMBER_NOT_FOUND");

    let resp = fixture
        .client
        .get(fixture.url("/api/group"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["memberCount"], 1);
}

#[tokio::test]
async fn test_member_field_validation() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let cases = [
        (json!({ "firstName": "", "lastName": "M", "phone": "5551234567", "email": "x@y.com", "amount": "0" }), "MISSING_FIELDS"),
        (json!({ "firstName": "Sam", "lastName": "M", "phone": "123", "email": "x@y.com", "amount": "0" }), "INVALID_PHONE"),
        (json!({ "firstName": "Sam", "lastName": "M", "phone": "5551234567", "email": "bad-email", "amount": "0" }), "INVALID_EMAIL"),
        (json!({ "firstName": "Sam", "lastName": "M", "phone": "5551234567", "email": "x@y.com", "amount": "ten" }), "INVALID_AMOUNT"),
    ];

    for (payload, expected) in cases {
        let resp = fixture
            .client
            .post(fixture.url("/api/group/members"))
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "case {}", expected);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], expected);
    }
}

#[tokio::test]
async fn test_member_uniqueness() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    fixture
        .add_member(&token, "Sam", "5551234567", "sam@example.com", "0")
        .await;

    // Same first name, different case and padding
    let resp = fixture
        .client
        .post(fixture.url("/api/group/members"))
        .bearer_auth(&token)
        .json(&json!({
            "firstName": "  sAm ",
            "lastName": "Other",
            "phone": "5559999999",
            "email": "other@example.com",
            "amount": "0"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "DUPLICATE_NAME");

    // Same phone, different formatting
    let resp = fixture
        .client
        .post(fixture.url("/api/group/members"))
        .bearer_auth(&token)
        .json(&json!({
            "firstName": "Tom",
            "lastName": "Other",
            "phone": "(555) 123-4567",
            "email": "tom@example.com",
            "amount": "0"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "DUPLICATE_PHONE");

    // Same email, different case
    let resp = fixture
        .client
        .post(fixture.url("/api/group/members"))
        .bearer_auth(&token)
        .json(&json!({
            "firstName": "Tom",
            "lastName": "Other",
            "phone": "5559999999",
            "email": "SAM@example.com",
            "amount": "0"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "DUPLICATE_EMAIL");
}

#[tokio::test]
async fn test_update_member_duplicate_recheck() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    fixture
        .add_member(&token, "Sam", "5551234567", "sam@example.com", "0")
        .await;
    let tom = fixture
        .add_member(&token, "Tom", "5559999999", "tom@example.com", "0")
        .await;
    let tom_id = tom["id"].as_str().unwrap();

    // Moving Tom onto Sam's phone collides
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/group/members/{}", tom_id)))
        .bearer_auth(&token)
        .json(&json!({
            "firstName": "Tom",
            "lastName": "Member",
            "phone": "5551234567",
            "email": "tom@example.com",
            "amount": "0"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "DUPLICATE_PHONE");

    // Keeping his own phone/email is fine
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/group/members/{}", tom_id)))
        .bearer_auth(&token)
        .json(&json!({
            "firstName": "Tommy",
            "lastName": "Member",
            "phone": "5559999999",
            "email": "tom@example.com",
            "amount": "5"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["firstName"], "Tommy");
}

#[tokio::test]
async fn test_find_member_by_phone() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    fixture
        .add_member(&token, "Sam", "5551234567", "sam@example.com", "0")
        .await;

    // Formatted input matches the digits-only stored value
    let resp = fixture
        .client
        .get(fixture.url("/api/group/members/by-phone/555-123-4567"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["firstName"], "Sam");

    let resp = fixture
        .client
        .get(fixture.url("/api/group/members/by-phone/5550000000"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MEMBER_NOT_FOUND");
}

#[tokio::test]
async fn test_balance_update_credit_and_debit() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let sam = fixture
        .add_member(&token, "Sam", "5551234567", "sam@example.com", "50.00")
        .await;
    let sam_id = sam["id"].as_str().unwrap().to_string();

    // Credit 25.00 for dues: 50.00 -> 75.00
    let resp = fixture
        .client
        .post(fixture.url("/api/group/ledger"))
        .bearer_auth(&token)
        .json(&json!({
            "memberId": sam_id,
            "amount": "25.00",
            "action": "credit",
            "reason": "dues"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["memberName"], "Sam");
    assert_eq!(body["data"]["entryType"], "credit");
    assert_eq!(body["data"]["event"], "dues");
    assert_eq!(dec(&body["data"]["amount"]), Decimal::from_str("25.00").unwrap());
    assert_eq!(dec(&body["data"]["newBalance"]), Decimal::from_str("75.00").unwrap());

    // The member record carries the same balance
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/group/members/{}", sam_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(dec(&body["data"]["amount"]), Decimal::from_str("75.00").unwrap());

    tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

    // Debit 30.00: 75.00 -> 45.00
    let resp = fixture
        .client
        .post(fixture.url("/api/group/ledger"))
        .bearer_auth(&token)
        .json(&json!({
            "memberId": sam_id,
            "amount": "30.00",
            "action": "debit",
            "reason": "court fees"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["entryType"], "debit");
    assert_eq!(dec(&body["data"]["amount"]), Decimal::from_str("-30.00").unwrap());
    assert_eq!(dec(&body["data"]["newBalance"]), Decimal::from_str("45.00").unwrap());

    // History is most-recent-first and complete
    let resp = fixture
        .client
        .get(fixture.url("/api/group/ledger"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["entryType"], "debit");
    assert_eq!(entries[1]["entryType"], "credit");
}

#[tokio::test]
async fn test_balance_update_member_not_found() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let resp = fixture
        .client
        .post(fixture.url("/api/group/ledger"))
        .bearer_auth(&token)
        .json(&json!({
            "memberId": "nonexistent-id",
            "amount": "25.00",
            "action": "credit",
            "reason": "dues"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MEMBER_NOT_FOUND");

    let resp = fixture
        .client
        .post(fixture.url("/api/group/ledger"))
        .bearer_auth(&token)
        .json(&json!({
            "memberId": "nonexistent-id",
            "amount": "abc",
            "action": "credit",
            "reason": "dues"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_AMOUNT");
}

#[tokio::test]
async fn test_member_ledger_self_view() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    // A self-service member with a login
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/signup/member"))
        .json(&json!({
            "groupCode": "1234",
            "firstName": "Sam",
            "lastName": "Tester",
            "phone": "5550000003",
            "email": "sam@example.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let sam_id = body["data"]["id"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .post(fixture.url("/api/group/ledger"))
        .bearer_auth(&token)
        .json(&json!({
            "memberId": sam_id,
            "amount": "12.50",
            "action": "credit",
            "reason": "season dues"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let data = fixture.login("sam@example.com", "password123").await;
    let user_token = data["token"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .get(fixture.url("/api/group/me/balance"))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(dec(&body["data"]["amount"]), Decimal::from_str("12.50").unwrap());

    let resp = fixture
        .client
        .get(fixture.url("/api/group/me/ledger"))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["event"], "season dues");
    assert_eq!(entries[0]["memberName"], "Sam");
}

#[tokio::test]
async fn test_record_activity_even_split() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let mut ids = Vec::new();
    for (name, phone, email) in [
        ("Ana", "5550000011", "ana@example.com"),
        ("Ben", "5550000012", "ben@example.com"),
        ("Cal", "5550000013", "cal@example.com"),
        ("Dee", "5550000014", "dee@example.com"),
    ] {
        let member = fixture.add_member(&token, name, phone, email, "0").await;
        ids.push(member["id"].as_str().unwrap().to_string());
    }

    let resp = fixture
        .client
        .post(fixture.url("/api/group/activities"))
        .bearer_auth(&token)
        .json(&json!({
            "activityName": "Friday Volleyball",
            "activityDate": "2026-08-07",
            "totalExpense": "40.00",
            "attendeeIds": ids
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["activityName"], "Friday Volleyball");
    assert_eq!(dec(&body["data"]["expensePerHead"]), Decimal::from_str("10.00").unwrap());
    assert_eq!(
        body["data"]["membersChecked"],
        json!(["Ana", "Ben", "Cal", "Dee"])
    );

    // Recording the activity did not move any balances
    let resp = fixture
        .client
        .get(fixture.url("/api/group/members"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    for member in body["data"].as_array().unwrap() {
        assert_eq!(dec(&member["amount"]), Decimal::ZERO);
    }
}

#[tokio::test]
async fn test_record_activity_rounded_split() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let mut ids = Vec::new();
    for (name, phone, email) in [
        ("Ana", "5550000011", "ana@example.com"),
        ("Ben", "5550000012", "ben@example.com"),
        ("Cal", "5550000013", "cal@example.com"),
    ] {
        let member = fixture.add_member(&token, name, phone, email, "0").await;
        ids.push(member["id"].as_str().unwrap().to_string());
    }

    let resp = fixture
        .client
        .post(fixture.url("/api/group/activities"))
        .bearer_auth(&token)
        .json(&json!({
            "activityName": "Pizza Night",
            "activityDate": "2026-08-08",
            "totalExpense": "40.00",
            "attendeeIds": ids
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();

    let per_head = dec(&body["data"]["expensePerHead"]);
    assert_eq!(per_head, Decimal::from_str("13.33").unwrap());

    // 3 * 13.33 stays within one rounding unit of 40.00
    let total = Decimal::from_str("40.00").unwrap();
    let drift = (per_head * Decimal::from(3) - total).abs();
    assert!(drift <= Decimal::from_str("0.03").unwrap());
}

#[tokio::test]
async fn test_record_activity_validation() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let sam = fixture
        .add_member(&token, "Sam", "5551234567", "sam@example.com", "0")
        .await;
    let sam_id = sam["id"].as_str().unwrap().to_string();

    // Empty name
    let resp = fixture
        .client
        .post(fixture.url("/api/group/activities"))
        .bearer_auth(&token)
        .json(&json!({
            "activityName": "",
            "activityDate": "2026-08-07",
            "totalExpense": "40.00",
            "attendeeIds": [sam_id]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INCOMPLETE_ACTIVITY");

    // No attendees
    let resp = fixture
        .client
        .post(fixture.url("/api/group/activities"))
        .bearer_auth(&token)
        .json(&json!({
            "activityName": "Volleyball",
            "activityDate": "2026-08-07",
            "totalExpense": "40.00",
            "attendeeIds": []
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INCOMPLETE_ACTIVITY");

    // Non-numeric expense
    let resp = fixture
        .client
        .post(fixture.url("/api/group/activities"))
        .bearer_auth(&token)
        .json(&json!({
            "activityName": "Volleyball",
            "activityDate": "2026-08-07",
            "totalExpense": "forty",
            "attendeeIds": [sam_id]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_AMOUNT");

    // Unknown attendee
    let resp = fixture
        .client
        .post(fixture.url("/api/group/activities"))
        .bearer_auth(&token)
        .json(&json!({
            "activityName": "Volleyball",
            "activityDate": "2026-08-07",
            "totalExpense": "40.00",
            "attendeeIds": ["missing-member"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "MEMBER_NOT_FOUND");
}

#[tokio::test]
async fn test_remove_activity_scoped_to_group() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let sam = fixture
        .add_member(&token, "Sam", "5551234567", "sam@example.com", "0")
        .await;
    let sam_id = sam["id"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .post(fixture.url("/api/group/activities"))
        .bearer_auth(&token)
        .json(&json!({
            "activityName": "Volleyball",
            "activityDate": "2026-08-07",
            "totalExpense": "40.00",
            "attendeeIds": [sam_id]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // An admin of a different group cannot see or remove it
    let other_token = fixture
        .create_group_admin("Bea", "5550000002", "bea@example.com", "2222", "3333")
        .await;

    let resp = fixture
        .client
        .delete(fixture.url("/api/group/activities/Volleyball"))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // The owning group's admin can
    let resp = fixture
        .client
        .delete(fixture.url("/api/group/activities/Volleyball"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["activityName"], "Volleyball");

    // Gone now
    let resp = fixture
        .client
        .delete(fixture.url("/api/group/activities/Volleyball"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let fixture = TestFixture::new().await;

    let resp = fixture.register("Ann", "5550000001", "ann@example.com").await;
    assert_eq!(resp.status(), 200);
    let data = fixture.login("ann@example.com", "password123").await;
    let old_token = data["token"].as_str().unwrap().to_string();

    // Request a reset; the token goes out through the notifier
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/password-reset"))
        .json(&json!({ "email": "ann@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let reset_token = fixture
        .notifier
        .last_token_for("ann@example.com")
        .expect("reset email should have been sent");

    // Unknown emails get the same response and no email
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/password-reset"))
        .json(&json!({ "email": "nobody@example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(fixture.notifier.last_token_for("nobody@example.com").is_none());

    // A wrong token changes nothing
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/password-reset/confirm"))
        .json(&json!({
            "email": "ann@example.com",
            "token": "wrong-token",
            "newPassword": "newpassword456"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    fixture.login("ann@example.com", "password123").await;

    // The issued token rotates the password
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/password-reset/confirm"))
        .json(&json!({
            "email": "ann@example.com",
            "token": reset_token,
            "newPassword": "newpassword456"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Old password rejected, new one works
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/login"))
        .json(&json!({ "email": "ann@example.com", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    fixture.login("ann@example.com", "newpassword456").await;

    // Open sessions were revoked
    let resp = fixture
        .client
        .get(fixture.url("/api/group"))
        .bearer_auth(&old_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // The reset token is single-use
    let resp = fixture
        .client
        .post(fixture.url("/api/auth/password-reset/confirm"))
        .json(&json!({
            "email": "ann@example.com",
            "token": reset_token,
            "newPassword": "thirdpassword789"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let fixture = TestFixture::new().await;

    let token = fixture
        .create_group_admin("Ann", "5550000001", "ann@example.com", "1234", "5678")
        .await;

    let resp = fixture
        .client
        .get(fixture.url("/api/group"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .post(fixture.url("/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(fixture.url("/api/group"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
