//! Integration tests for the outlet task backend.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::auth::hash_password;
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::models::{NewUser, Role};
use crate::{create_router, AppState};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin-password";
const STAFF_PASSWORD: &str = "staff-password";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    repo: Arc<Repository>,
    admin_token: String,
    _temp_dir: TempDir,
}

/// A staff account with its profile and session token.
struct StaffLogin {
    staff_id: String,
    token: String,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");

        // Create config
        let mut config = Config::from_lookup(|_| None).expect("Failed to build config");
        config.db_path = db_path;
        config.bind_addr = "127.0.0.1:0".parse().unwrap();
        config.log_level = "warn".to_string();
        config.jwt_secret = "test-secret".to_string();
        config.sweep_interval = None;

        let state = AppState::new(Repository::new(pool), config);
        let repo = Arc::clone(&state.repo);

        repo.create_user(&NewUser {
            email: ADMIN_EMAIL.to_string(),
            name: "Admin".to_string(),
            role: Role::Admin,
            outlet_id: None,
            password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
        })
        .await
        .expect("Failed to create admin");

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

        let mut fixture = TestFixture {
            client: Client::new(),
            base_url,
            repo,
            admin_token: String::new(),
            _temp_dir: temp_dir,
        };
        fixture.admin_token = fixture.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        fixture
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .send(
                reqwest::Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await.unwrap();
        let status = resp.status();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, Some(token), None).await
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, Some(token), Some(body))
            .await
    }

    async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::PUT, path, Some(token), Some(body))
            .await
    }

    async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.send(reqwest::Method::DELETE, path, Some(token), None)
            .await
    }

    /// Create a staff account, give it a profile and log it in.
    async fn staff(&self, email: &str, employee_id: &str) -> StaffLogin {
        let user = self
            .repo
            .create_user(&NewUser {
                email: email.to_string(),
                name: format!("Staff {}", employee_id),
                role: Role::Staff,
                outlet_id: None,
                password_hash: hash_password(STAFF_PASSWORD).unwrap(),
            })
            .await
            .unwrap();

        let (status, body) = self
            .post(
                "/api/staff",
                &self.admin_token,
                json!({
                    "userId": user.id,
                    "employeeId": employee_id,
                    "hireDate": "2023-01-15"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create staff failed: {}", body);

        StaffLogin {
            staff_id: body["data"]["id"].as_str().unwrap().to_string(),
            token: self.login(email, STAFF_PASSWORD).await,
        }
    }

    async fn task(&self, title: &str, high_priority: bool) -> String {
        let (status, body) = self
            .post(
                "/api/tasks",
                &self.admin_token,
                json!({
                    "title": title,
                    "estimatedMinutes": 30,
                    "isHighPriority": high_priority
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create task failed: {}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn assign(&self, task_id: &str, staff_id: &str, assigned: NaiveDate, due: NaiveDate) -> Value {
        let (status, body) = self
            .post(
                "/api/assignments",
                &self.admin_token,
                json!({
                    "taskId": task_id,
                    "staffId": staff_id,
                    "assignedDate": day(assigned),
                    "dueDate": day(due)
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create assignment failed: {}", body);
        body["data"].clone()
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
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
async fn test_requests_without_valid_token_are_rejected() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .send(reqwest::Method::GET, "/api/tasks", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = fixture.get("/api/tasks", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_returns_role_menu() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": ADMIN_EMAIL, "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid email or password");

    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ADMIN@example.com", "password": ADMIN_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["redirectTo"], "/dashboard");
    assert_eq!(body["data"]["user"]["role"], "admin");
    assert!(body["data"]["user"].get("passwordHash").is_none());
    let labels: Vec<&str> = body["data"]["menu"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["label"].as_str())
        .collect();
    assert!(labels.contains(&"Staff Management"));

    let staff = fixture.staff("sam@example.com", "E-001").await;
    let (status, body) = fixture.get("/api/auth/me", &staff.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["role"], "staff");
    assert_eq!(body["data"]["staffId"], staff.staff_id.as_str());
    assert!(body["data"]["menu"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["label"] != "Staff Management"));
}

#[tokio::test]
async fn test_unknown_email_gets_the_same_rejection() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": ADMIN_PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_task_crud_and_version_conflict() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();

    let task_id = fixture.task("Mop floor", false).await;

    let (status, body) = fixture.get(&format!("/api/tasks/{}", task_id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Mop floor");
    let version = body["data"]["version"].as_i64().unwrap();

    let (status, body) = fixture
        .put(
            &format!("/api/tasks/{}", task_id),
            &admin,
            json!({ "title": "Mop all floors", "expectedVersion": version }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Mop all floors");

    // Stale version
    let (status, body) = fixture
        .put(
            &format!("/api/tasks/{}", task_id),
            &admin,
            json!({ "title": "Too late", "expectedVersion": version }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "VERSION_MISMATCH");
    assert!(body["error"]["details"]["currentVersion"].is_number());

    let (status, _) = fixture.delete(&format!("/api/tasks/{}", task_id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = fixture.get(&format!("/api/tasks/{}", task_id), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_task_validation() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post(
            "/api/tasks",
            &fixture.admin_token,
            json!({ "title": "", "estimatedMinutes": 10 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = fixture
        .post(
            "/api/tasks",
            &fixture.admin_token,
            json!({ "title": "Restock", "estimatedMinutes": 10, "isRecurring": true }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_staff_cannot_use_admin_operations() {
    let fixture = TestFixture::new().await;
    let staff = fixture.staff("sam@example.com", "E-001").await;

    let (status, body) = fixture
        .post(
            "/api/tasks",
            &staff.token,
            json!({ "title": "Sneaky", "estimatedMinutes": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = fixture.get("/api/staff", &staff.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = fixture.get("/api/reports/leaderboard", &staff.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = fixture
        .post("/api/assignments/sweep-overdue", &staff.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_overdue_sweep_flags_past_due_assignments_once() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();
    let staff = fixture.staff("sam@example.com", "E-001").await;
    let task_id = fixture.task("Clean fryer", true).await;

    let late = fixture
        .assign(&task_id, &staff.staff_id, today() - Duration::days(3), today() - Duration::days(1))
        .await;
    let on_time = fixture
        .assign(&task_id, &staff.staff_id, today() - Duration::days(1), today())
        .await;

    // Derived before any sweep
    assert_eq!(late["status"], "pending");
    assert_eq!(late["displayStatus"], "overdue");
    assert_eq!(on_time["displayStatus"], "pending");

    let (status, body) = fixture
        .post("/api/assignments/sweep-overdue", &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["flagged"], 1);
    assert_eq!(body["data"]["assignmentIds"][0], late["id"]);
    let revision_after_first = body["revisionId"].as_i64().unwrap();

    let (_, body) = fixture
        .get(&format!("/api/assignments/{}", late["id"].as_str().unwrap()), &admin)
        .await;
    assert_eq!(body["data"]["status"], "overdue");
    assert_eq!(body["data"]["taskTitle"], "Clean fryer");

    let (_, body) = fixture
        .get(&format!("/api/assignments/{}", on_time["id"].as_str().unwrap()), &admin)
        .await;
    assert_eq!(body["data"]["status"], "pending");

    // Second run has nothing to do and writes nothing
    let (status, body) = fixture
        .post("/api/assignments/sweep-overdue", &admin, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["flagged"], 0);
    assert_eq!(body["revisionId"].as_i64().unwrap(), revision_after_first);
}

#[tokio::test]
async fn test_assignment_requires_target_and_ordered_dates() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();
    let task_id = fixture.task("Count stock", false).await;

    let (status, _) = fixture
        .post(
            "/api/assignments",
            &admin,
            json!({ "taskId": task_id, "dueDate": day(today()) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let staff = fixture.staff("sam@example.com", "E-001").await;
    let (status, body) = fixture
        .post(
            "/api/assignments",
            &admin,
            json!({
                "taskId": task_id,
                "staffId": staff.staff_id,
                "assignedDate": day(today()),
                "dueDate": day(today() - Duration::days(2))
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = fixture
        .post(
            "/api/assignments",
            &admin,
            json!({ "taskId": "missing", "staffId": staff.staff_id, "dueDate": day(today()) }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_staff_complete_their_own_assignment() {
    let fixture = TestFixture::new().await;
    let sam = fixture.staff("sam@example.com", "E-001").await;
    let kim = fixture.staff("kim@example.com", "E-002").await;
    let task_id = fixture.task("Wipe tables", false).await;
    let assignment = fixture
        .assign(&task_id, &sam.staff_id, today(), today() + Duration::days(1))
        .await;
    let path = format!(
        "/api/assignments/{}/complete",
        assignment["id"].as_str().unwrap()
    );

    // Someone else's task
    let (status, _) = fixture
        .post(&path, &kim.token, json!({ "proofUrl": "https://img/1.jpg" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Proof is mandatory
    let (status, body) = fixture
        .post(&path, &sam.token, json!({ "proofUrl": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = fixture
        .post(
            &path,
            &sam.token,
            json!({ "proofUrl": "https://img/1.jpg", "notes": "All clean" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["displayStatus"], "completed");
    assert_eq!(body["data"]["completionProof"], "https://img/1.jpg");
    assert_eq!(body["data"]["completionNotes"], "All clean");
    assert!(body["data"]["completedAt"].is_string());

    // Staff only see their own work
    let (_, body) = fixture.get("/api/assignments", &kim.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    let (_, body) = fixture.get("/api/assignments", &sam.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reschedule_request_and_approval() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();
    let sam = fixture.staff("sam@example.com", "E-001").await;
    let task_id = fixture.task("Deep clean", false).await;
    let assignment = fixture
        .assign(&task_id, &sam.staff_id, today(), today())
        .await;
    let id = assignment["id"].as_str().unwrap().to_string();
    let new_due = today() + Duration::days(3);

    let (status, _) = fixture
        .post(
            &format!("/api/assignments/{}/reschedule", id),
            &sam.token,
            json!({ "requestedDueDate": day(new_due), "reason": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = fixture
        .post(
            &format!("/api/assignments/{}/reschedule", id),
            &sam.token,
            json!({ "requestedDueDate": day(today() - Duration::days(5)), "reason": "Sick" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = fixture
        .post(
            &format!("/api/assignments/{}/reschedule", id),
            &sam.token,
            json!({ "requestedDueDate": day(new_due), "reason": "Equipment broken" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "reschedule_requested");
    assert_eq!(body["data"]["displayStatus"], "pending");
    assert_eq!(body["data"]["rescheduleReason"], "Equipment broken");

    // Only admins decide
    let (status, _) = fixture
        .post(
            &format!("/api/assignments/{}/reschedule/approve", id),
            &sam.token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = fixture
        .post(
            &format!("/api/assignments/{}/reschedule/approve", id),
            &admin,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["data"]["dueDate"]
        .as_str()
        .unwrap()
        .starts_with(&day(new_due)));
    assert!(body["data"].get("requestedDueDate").is_none());
}

#[tokio::test]
async fn test_moving_overdue_assignment_forward_clears_overdue() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();
    let sam = fixture.staff("sam@example.com", "E-001").await;
    let task_id = fixture.task("Descale machine", false).await;
    let late = fixture
        .assign(&task_id, &sam.staff_id, today() - Duration::days(3), today() - Duration::days(1))
        .await;
    let path = format!("/api/assignments/{}", late["id"].as_str().unwrap());

    let (_, body) = fixture
        .post("/api/assignments/sweep-overdue", &admin, json!({}))
        .await;
    assert_eq!(body["data"]["flagged"], 1);

    let (status, body) = fixture
        .put(&path, &admin, json!({ "dueDate": day(today() + Duration::days(2)) }))
        .await;
    assert_eq!(status, StatusCode::OK, "update failed: {}", body);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["displayStatus"], "pending");

    let (_, body) = fixture
        .post("/api/assignments/sweep-overdue", &admin, json!({}))
        .await;
    assert_eq!(body["data"]["flagged"], 0);

    // Back into the past shows as overdue again
    let (status, body) = fixture
        .put(&path, &admin, json!({ "dueDate": day(today() - Duration::days(1)) }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["displayStatus"], "overdue");
}

#[tokio::test]
async fn test_assignment_update_version_conflict() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();
    let sam = fixture.staff("sam@example.com", "E-001").await;
    let task_id = fixture.task("Sweep", false).await;
    let assignment = fixture
        .assign(&task_id, &sam.staff_id, today(), today())
        .await;
    let path = format!("/api/assignments/{}", assignment["id"].as_str().unwrap());
    let version = assignment["version"].as_i64().unwrap();

    let (status, body) = fixture
        .put(
            &path,
            &admin,
            json!({ "minutesDeducted": 15, "expectedVersion": version }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["minutesDeducted"], 15);

    let (status, body) = fixture
        .put(
            &path,
            &admin,
            json!({ "minutesDeducted": 20, "expectedVersion": version }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "VERSION_MISMATCH");

    let (status, _) = fixture
        .put(&path, &admin, json!({ "minutesDeducted": -1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invitation_acceptance() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();

    let (status, body) = fixture
        .post(
            "/api/invitations",
            &admin,
            json!({ "email": "new@example.com", "role": "staff" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    // Outlet invitations need an outlet
    let (status, _) = fixture
        .post(
            "/api/invitations",
            &admin,
            json!({ "email": "branch@example.com", "role": "outlet" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let accept = |token: String| {
        json!({
            "email": "new@example.com",
            "token": token,
            "name": "New Hire",
            "password": "new-hire-password"
        })
    };

    let (status, _) = fixture
        .send(
            reqwest::Method::POST,
            "/api/auth/accept-invitation",
            None,
            Some(accept("wrong-token".to_string())),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/auth/accept-invitation",
            None,
            Some(accept(token.clone())),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "accept failed: {}", body);
    assert_eq!(body["data"]["user"]["role"], "staff");
    assert_eq!(body["data"]["user"]["name"], "New Hire");
    assert!(body["data"]["token"].is_string());

    // Single use
    let (status, _) = fixture
        .send(
            reqwest::Method::POST,
            "/api/auth/accept-invitation",
            None,
            Some(accept(token)),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    fixture.login("new@example.com", "new-hire-password").await;
}

#[tokio::test]
async fn test_monthly_schedule_lifecycle() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();
    let sam = fixture.staff("sam@example.com", "E-001").await;
    let kim = fixture.staff("kim@example.com", "E-002").await;

    let (status, body) = fixture
        .post("/api/outlets", &admin, json!({ "name": "Downtown" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let outlet_id = body["data"]["id"].as_str().unwrap().to_string();

    let now = today();
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap();
    let second = NaiveDate::from_ymd_opt(now.year(), now.month(), 2).unwrap();

    let request = json!({
        "staffId": sam.staff_id,
        "month": now.month(),
        "year": now.year(),
        "days": [
            { "date": day(first), "outletId": outlet_id, "timeIn": "09:00", "timeOut": "17:00" },
            { "date": day(second), "isDayOff": true }
        ]
    });
    let (status, body) = fixture.post("/api/schedules", &admin, request.clone()).await;
    assert_eq!(status, StatusCode::OK, "create schedule failed: {}", body);
    let schedule_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["days"].as_array().unwrap().len(), 2);

    // One roster per staff member and month
    let (status, body) = fixture.post("/api/schedules", &admin, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // Shift must start before it ends
    let (status, _) = fixture
        .put(
            &format!("/api/schedules/{}/days", schedule_id),
            &admin,
            json!({ "days": [{ "date": day(second), "timeIn": "18:00", "timeOut": "10:00" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = fixture
        .put(
            &format!("/api/schedules/{}/days", schedule_id),
            &admin,
            json!({ "days": [{ "date": day(second), "outletId": outlet_id, "timeIn": "10:00", "timeOut": "18:00" }] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let days = body["data"]["days"].as_array().unwrap();
    assert_eq!(days.len(), 2);
    assert!(days.iter().all(|d| d["isDayOff"] == false));

    // Staff read their own roster only
    let list_path = format!("/api/schedules?month={}&year={}", now.month(), now.year());
    let (_, body) = fixture.get(&list_path, &sam.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (_, body) = fixture.get(&list_path, &kim.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
    let (status, _) = fixture
        .get(&format!("/api/schedules/{}", schedule_id), &kim.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_dashboard_and_leaderboard() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();
    let sam = fixture.staff("sam@example.com", "E-001").await;
    let kim = fixture.staff("kim@example.com", "E-002").await;
    let urgent = fixture.task("Fix freezer", true).await;
    let routine = fixture.task("Sweep", false).await;

    fixture
        .assign(&urgent, &sam.staff_id, today() - Duration::days(2), today() - Duration::days(1))
        .await;
    let done = fixture
        .assign(&routine, &sam.staff_id, today(), today())
        .await;
    fixture
        .assign(&routine, &kim.staff_id, today(), today())
        .await;

    let (status, _) = fixture
        .post(
            &format!("/api/assignments/{}/complete", done["id"].as_str().unwrap()),
            &sam.token,
            json!({ "proofUrl": "https://img/done.jpg" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = fixture.get("/api/dashboard", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["newlyOverdue"], 1);
    assert_eq!(data["counts"]["total"], 3);
    assert_eq!(data["counts"]["overdue"], 1);
    assert_eq!(data["counts"]["completed"], 1);
    assert_eq!(data["counts"]["pending"], 1);
    assert_eq!(data["highPriorityOpen"], 1);
    assert_eq!(data["dueToday"].as_array().unwrap().len(), 1);

    // Staff dashboards are scoped to their own work
    let (_, body) = fixture.get("/api/dashboard", &kim.token).await;
    assert_eq!(body["data"]["counts"]["total"], 1);
    assert_eq!(body["data"]["counts"]["pending"], 1);

    let (status, body) = fixture.get("/api/reports/leaderboard", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let sam_entry = entries
        .iter()
        .find(|e| e["staffId"] == sam.staff_id.as_str())
        .unwrap();
    assert_eq!(sam_entry["assigned"], 2);
    assert_eq!(sam_entry["completed"], 1);
    assert_eq!(sam_entry["overdue"], 1);
}

#[tokio::test]
async fn test_revision_increments_on_writes() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();

    let (status, body) = fixture.get("/api/revision", &admin).await;
    assert_eq!(status, StatusCode::OK);
    let initial = body["data"]["revisionId"].as_i64().unwrap();

    let (_, body) = fixture
        .post("/api/positions", &admin, json!({ "name": "Barista" }))
        .await;
    let position_id = body["data"]["id"].as_str().unwrap().to_string();
    assert!(body["revisionId"].as_i64().unwrap() > initial);

    let (_, body) = fixture
        .delete(&format!("/api/positions/{}", position_id), &admin)
        .await;
    assert!(body["revisionId"].as_i64().unwrap() > initial + 1);

    // Reads leave it alone
    let (_, before) = fixture.get("/api/revision", &admin).await;
    fixture.get("/api/tasks", &admin).await;
    let (_, after) = fixture.get("/api/revision", &admin).await;
    assert_eq!(before["data"]["revisionId"], after["data"]["revisionId"]);
}

#[tokio::test]
async fn test_not_found_errors() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();

    for path in [
        "/api/tasks/nope",
        "/api/assignments/nope",
        "/api/outlets/nope",
        "/api/staff/nope",
        "/api/schedules/nope",
    ] {
        let (status, body) = fixture.get(path, &admin).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    let (status, _) = fixture
        .post(
            "/api/assignments/nope/complete",
            &admin,
            json!({ "proofUrl": "https://img/x.jpg" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_stream_delivers_only_addressed_notifications() {
    let fixture = TestFixture::new().await;
    let sam = fixture.staff("sam@example.com", "E-001").await;
    let kim = fixture.staff("kim@example.com", "E-002").await;
    let task_id = fixture.task("Restock napkins", false).await;

    let mut stream = fixture
        .client
        .get(fixture.url("/api/events"))
        .bearer_auth(&sam.token)
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), StatusCode::OK);

    fixture
        .assign(&task_id, &sam.staff_id, today(), today() + Duration::days(1))
        .await;
    fixture
        .assign(&task_id, &kim.staff_id, today(), today() + Duration::days(1))
        .await;

    // Each assignment sends its notification before its refresh hint.
    let mut received = String::new();
    let event_names = |text: &str| -> Vec<String> {
        text.lines()
            .filter_map(|line| line.strip_prefix("event:"))
            .map(|name| name.trim().to_string())
            .collect()
    };
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(5);
    while event_names(&received).iter().filter(|n| *n == "refresh").count() < 2 {
        let chunk = tokio::time::timeout_at(deadline, stream.chunk())
            .await
            .expect("event stream stalled")
            .unwrap()
            .expect("event stream closed");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }

    let names = event_names(&received);
    assert_eq!(names.iter().filter(|n| *n == "notification").count(), 1);
    assert_eq!(names.iter().filter(|n| *n == "refresh").count(), 2);
    assert!(received.contains(&sam.staff_id));
    assert!(!received.contains(&kim.staff_id));
}

#[tokio::test]
async fn test_outlet_account_sees_and_completes_only_its_assignments() {
    let fixture = TestFixture::new().await;
    let admin = fixture.admin_token.clone();
    let task_id = fixture.task("Clean windows", false).await;

    let mut outlet_ids = Vec::new();
    for name in ["Downtown", "Uptown"] {
        let (status, body) = fixture
            .post("/api/outlets", &admin, json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::OK);
        outlet_ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, body) = fixture
        .post(
            "/api/invitations",
            &admin,
            json!({ "email": "downtown@example.com", "role": "outlet", "outletId": outlet_ids[0] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "invite failed: {}", body);
    let (status, body) = fixture
        .send(
            reqwest::Method::POST,
            "/api/auth/accept-invitation",
            None,
            Some(json!({
                "email": "downtown@example.com",
                "token": body["data"]["token"],
                "name": "Downtown Outlet",
                "password": "outlet-password"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "accept failed: {}", body);
    assert_eq!(body["data"]["user"]["role"], "outlet");
    let outlet_token = body["data"]["token"].as_str().unwrap().to_string();

    let mut assignment_ids = Vec::new();
    for outlet_id in &outlet_ids {
        let (status, body) = fixture
            .post(
                "/api/assignments",
                &admin,
                json!({
                    "taskId": task_id,
                    "outletId": outlet_id,
                    "dueDate": day(today() + Duration::days(1))
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create assignment failed: {}", body);
        assignment_ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }

    let (status, body) = fixture.get("/api/assignments", &outlet_token).await;
    assert_eq!(status, StatusCode::OK);
    let visible = body["data"].as_array().unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0]["id"], assignment_ids[0].as_str());

    let (status, body) = fixture
        .post(
            &format!("/api/assignments/{}/complete", assignment_ids[0]),
            &outlet_token,
            json!({ "proofUrl": "https://img/windows.jpg" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "complete failed: {}", body);
    assert_eq!(body["data"]["status"], "completed");

    let (status, _) = fixture
        .post(
            &format!("/api/assignments/{}/complete", assignment_ids[1]),
            &outlet_token,
            json!({ "proofUrl": "https://img/windows.jpg" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
