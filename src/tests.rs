//! Integration tests for the leadflow backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::authz::PermissionResolver;
use crate::cache::TtlCache;
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::engine::LeadEngine;
use crate::notify::{NoopSink, Notifier};
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    pool: SqlitePool,
    _temp_dir: TempDir,
}

struct OfficeHours {
    start_hour: u32,
    start_minute: u32,
    grace_minutes: i64,
}

impl TestFixture {
    async fn new() -> Self {
        // Office start at midnight with zero grace: every real check-in
        // during a test run classifies as LATE, deterministically.
        Self::with_office(OfficeHours {
            start_hour: 0,
            start_minute: 0,
            grace_minutes: 0,
        })
        .await
    }

    async fn with_office(office: OfficeHours) -> Self {
        let psk = "test-api-key".to_string();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool.clone()));
        let cache = Arc::new(TtlCache::new(256));
        let authz = PermissionResolver::new(
            repo.clone(),
            cache.clone(),
            std::time::Duration::from_secs(300),
        );
        let notifier = Arc::new(Notifier::new(repo.clone(), Arc::new(NoopSink)));
        let engine = Arc::new(LeadEngine::new(
            repo.clone(),
            cache.clone(),
            authz.clone(),
            notifier.clone(),
        ));

        let config = Config {
            api_psk: Some(psk.clone()),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            reassign_threshold_hours: 8,
            reassign_interval: std::time::Duration::from_secs(0),
            cache_capacity: 256,
            cache_sweep_interval: std::time::Duration::from_secs(60),
            authz_ttl: std::time::Duration::from_secs(300),
            office_utc_offset_minutes: 0,
            office_start_hour: office.start_hour,
            office_start_minute: office.start_minute,
            grace_minutes: office.grace_minutes,
        };

        let state = AppState {
            repo,
            cache,
            authz,
            engine,
            config,
        };
        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-api-key", psk.parse().unwrap());
        let client = Client::builder().default_headers(headers).build().unwrap();

        TestFixture {
            client,
            base_url,
            pool,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> Value {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert!(
            resp.status().is_success(),
            "POST {} failed: {}",
            path,
            resp.status()
        );
        resp.json().await.unwrap()
    }

    async fn post_as(&self, principal: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .header("x-employee-id", principal)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get_json(&self, path: &str) -> Value {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        assert!(resp.status().is_success(), "GET {} failed", path);
        resp.json().await.unwrap()
    }

    /// Seed a manager with UPDATE permission on leads.
    async fn seed_manager(&self) -> String {
        let role = self
            .post(
                "/api/roles",
                json!({ "companyId": "T1", "name": "Manager", "kind": "MANAGER" }),
            )
            .await;
        let role_id = role["data"]["id"].as_str().unwrap().to_string();

        let perm = self
            .post(
                "/api/permissions",
                json!({ "companyId": "T1", "resource": "lead", "action": "UPDATE" }),
            )
            .await;
        let perm_id = perm["data"]["id"].as_str().unwrap().to_string();

        self.post(
            &format!("/api/roles/{}/permissions", role_id),
            json!({ "permissionId": perm_id }),
        )
        .await;

        // Own department, so the manager never lands in assignment pools
        self.seed_employee("Boss", Some("mgmt"), Some(&role_id)).await
    }

    async fn seed_employee(
        &self,
        name: &str,
        department: Option<&str>,
        role_id: Option<&str>,
    ) -> String {
        let body = self
            .post(
                "/api/employees",
                json!({
                    "companyId": "T1",
                    "name": name,
                    "departmentId": department,
                    "roleId": role_id,
                }),
            )
            .await;
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn seed_lead(&self, name: &str) -> String {
        let body = self
            .post("/api/leads", json!({ "companyId": "T1", "name": name }))
            .await;
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn backdate_assignment(&self, lead_id: &str, hours: i64) {
        let at = Utc::now() - Duration::hours(hours);
        sqlx::query("UPDATE leads SET assigned_at = ? WHERE id = ?")
            .bind(at)
            .bind(lead_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }
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
async fn test_auth_rejects_bad_psk() {
    let fixture = TestFixture::new().await;

    let bare = Client::new();
    let resp = bare
        .get(fixture.url("/api/leads?companyId=T1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = bare
        .get(fixture.url("/api/leads?companyId=T1"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Bearer form of the correct key is accepted
    let resp = bare
        .get(fixture.url("/api/leads?companyId=T1"))
        .header("authorization", "Bearer test-api-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_authz_check_matrix() {
    let fixture = TestFixture::new().await;
    let boss = fixture.seed_manager().await;
    let plain = fixture.seed_employee("Plain", Some("sales"), None).await;

    let resp = fixture
        .post_as(
            &boss,
            "/api/authz/check",
            json!({ "resource": "lead", "action": "UPDATE" }),
        )
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["allowed"], json!(true));

    // No role resolves to denied, not to an error
    let resp = fixture
        .post_as(
            &plain,
            "/api/authz/check",
            json!({ "resource": "lead", "action": "UPDATE" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["allowed"], json!(false));

    let resp = fixture
        .post_as(
            &boss,
            "/api/authz/check-batch",
            json!({ "checks": [
                { "resource": "lead", "action": "UPDATE" },
                { "resource": "lead", "action": "DELETE" }
            ] }),
        )
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"][0]["allowed"], json!(true));
    assert_eq!(body["data"][1]["allowed"], json!(false));

    // Missing principal header is a transport error
    let resp = fixture
        .client
        .post(fixture.url("/api/authz/check"))
        .json(&json!({ "resource": "lead", "action": "UPDATE" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_manual_assignment_flow() {
    let fixture = TestFixture::new().await;
    let boss = fixture.seed_manager().await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;
    let plain = fixture.seed_employee("Plain", Some("sales"), None).await;
    let lead = fixture.seed_lead("Acme").await;

    // Unauthorized principal gets 403 with no side effects
    let resp = fixture
        .post_as(
            &plain,
            &format!("/api/leads/{}/assign", lead),
            json!({ "employeeId": e1 }),
        )
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .post_as(
            &boss,
            &format!("/api/leads/{}/assign", lead),
            json!({ "employeeId": e1, "note": "warm intro" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["assignedToId"], json!(e1));
    assert!(body["data"]["assignedAt"].is_string());

    let history = fixture
        .get_json(&format!("/api/leads/{}/history", lead))
        .await;
    assert_eq!(history["data"].as_array().unwrap().len(), 1);
    assert_eq!(history["data"][0]["action"], json!("ASSIGNED"));
    assert_eq!(history["data"][0]["performedBy"], json!(boss));
    assert_eq!(history["data"][0]["note"], json!("warm intro"));

    let seen = fixture
        .get_json(&format!(
            "/api/notifications?companyId=T1&employeeId={}",
            e1
        ))
        .await;
    assert_eq!(seen["data"].as_array().unwrap().len(), 1);

    // Assigning a missing employee is 404
    let resp = fixture
        .post_as(
            &boss,
            &format!("/api/leads/{}/assign", lead),
            json!({ "employeeId": "ghost" }),
        )
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_bulk_assign_skips_missing_leads() {
    let fixture = TestFixture::new().await;
    let boss = fixture.seed_manager().await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;
    let l1 = fixture.seed_lead("One").await;
    let l2 = fixture.seed_lead("Two").await;

    let resp = fixture
        .post_as(
            &boss,
            "/api/leads/bulk-assign",
            json!({ "leadIds": [l1, "missing", l2], "employeeId": e1 }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["assignedCount"], json!(2));
    assert_eq!(body["data"]["employeeName"], json!("E1"));

    // One batch notification for the whole operation
    let seen = fixture
        .get_json(&format!(
            "/api/notifications?companyId=T1&employeeId={}",
            e1
        ))
        .await;
    assert_eq!(seen["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_contacted_is_idempotent_and_gated() {
    let fixture = TestFixture::new().await;
    let boss = fixture.seed_manager().await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;
    let outsider = fixture.seed_employee("Other", Some("sales"), None).await;
    let lead = fixture.seed_lead("Acme").await;

    fixture
        .post_as(
            &boss,
            &format!("/api/leads/{}/assign", lead),
            json!({ "employeeId": e1 }),
        )
        .await;

    let resp = fixture
        .post_as(&outsider, &format!("/api/leads/{}/contacted", lead), json!({}))
        .await;
    assert_eq!(resp.status(), 403);

    let resp = fixture
        .post_as(&e1, &format!("/api/leads/{}/contacted", lead), json!({}))
        .await;
    assert_eq!(resp.status(), 200);
    let first: Value = resp.json().await.unwrap();
    assert_eq!(first["data"]["status"], json!("CONTACTED"));

    let resp = fixture
        .post_as(&e1, &format!("/api/leads/{}/contacted", lead), json!({}))
        .await;
    let second: Value = resp.json().await.unwrap();
    assert_eq!(first["data"]["contactedAt"], second["data"]["contactedAt"]);
}

#[tokio::test]
async fn test_sweep_endpoint_reassigns_stale_lead() {
    let fixture = TestFixture::new().await;
    let boss = fixture.seed_manager().await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;
    let e2 = fixture.seed_employee("E2", Some("sales"), None).await;
    let lead = fixture.seed_lead("Stale").await;
    let ballast = fixture.seed_lead("Ballast").await;

    for l in [&lead, &ballast] {
        fixture
            .post_as(
                &boss,
                &format!("/api/leads/{}/assign", l),
                json!({ "employeeId": e1 }),
            )
            .await;
    }
    fixture.backdate_assignment(&lead, 9).await;

    // Non-elevated principal may not trigger the sweep
    let resp = fixture.post_as(&e1, "/api/leads/sweep", json!({})).await;
    assert_eq!(resp.status(), 403);

    let resp = fixture.post_as(&boss, "/api/leads/sweep", json!({})).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["reassignedCount"], json!(1));
    assert_eq!(body["data"]["results"][0]["outcome"], json!("reassigned"));
    assert_eq!(body["data"]["results"][0]["newAssigneeId"], json!(e2));

    // The refreshed assignment keeps the lead out of an immediate re-run
    let resp = fixture.post_as(&boss, "/api/leads/sweep", json!({})).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["reassignedCount"], json!(0));

    let history = fixture
        .get_json(&format!("/api/leads/{}/history", lead))
        .await;
    let autos: Vec<&Value> = history["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|h| h["action"] == json!("AUTO_REASSIGNED"))
        .collect();
    assert_eq!(autos.len(), 1);
    assert!(autos[0]["performedBy"].is_null());
}

#[tokio::test]
async fn test_check_in_late_and_double_check_in() {
    // Fixture office starts at midnight with no grace, so "now" is LATE
    let fixture = TestFixture::new().await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;

    let resp = fixture
        .post_as(
            &e1,
            "/api/attendance/check-in",
            json!({ "employeeId": e1, "companyId": "T1" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], json!("LATE"));
    // No geofences configured: verification is fail-open
    assert_eq!(body["data"]["isVerified"], json!(true));

    let resp = fixture
        .post_as(
            &e1,
            "/api/attendance/check-in",
            json!({ "employeeId": e1, "companyId": "T1" }),
        )
        .await;
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_check_in_within_grace_is_present() {
    // Threshold 23:59 plus a one-hour grace is always in the future
    let fixture = TestFixture::with_office(OfficeHours {
        start_hour: 23,
        start_minute: 59,
        grace_minutes: 60,
    })
    .await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;

    let resp = fixture
        .post_as(
            &e1,
            "/api/attendance/check-in",
            json!({ "employeeId": e1, "companyId": "T1" }),
        )
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], json!("PRESENT"));
}

#[tokio::test]
async fn test_check_out_flow() {
    let fixture = TestFixture::new().await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;

    // Check-out before check-in is 404
    let resp = fixture
        .post_as(
            &e1,
            "/api/attendance/check-out",
            json!({ "employeeId": e1, "companyId": "T1" }),
        )
        .await;
    assert_eq!(resp.status(), 404);

    fixture
        .post_as(
            &e1,
            "/api/attendance/check-in",
            json!({ "employeeId": e1, "companyId": "T1" }),
        )
        .await;

    let resp = fixture
        .post_as(
            &e1,
            "/api/attendance/check-out",
            json!({ "employeeId": e1, "companyId": "T1", "notes": "left early" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["checkOutAt"].is_string());
    assert!(body["data"]["totalHours"].is_number());
    assert_eq!(body["data"]["notes"], json!("left early"));

    let resp = fixture
        .post_as(
            &e1,
            "/api/attendance/check-out",
            json!({ "employeeId": e1, "companyId": "T1" }),
        )
        .await;
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn test_check_in_geofence_verification() {
    let fixture = TestFixture::new().await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;
    let e2 = fixture.seed_employee("E2", Some("sales"), None).await;

    fixture
        .post(
            "/api/geofences",
            json!({
                "companyId": "T1",
                "name": "HQ",
                "latitude": 52.52,
                "longitude": 13.405,
                "radiusMeters": 200.0
            }),
        )
        .await;

    // Inside the fence
    let resp = fixture
        .post_as(
            &e1,
            "/api/attendance/check-in",
            json!({ "employeeId": e1, "companyId": "T1", "lat": 52.5201, "lng": 13.4051 }),
        )
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["isVerified"], json!(true));

    // Far outside: recorded anyway, flagged unverified
    let resp = fixture
        .post_as(
            &e2,
            "/api/attendance/check-in",
            json!({ "employeeId": e2, "companyId": "T1", "lat": 48.8566, "lng": 2.3522 }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["isVerified"], json!(false));
}

#[tokio::test]
async fn test_metadata_patch_preserves_unknown_keys() {
    let fixture = TestFixture::new().await;
    let boss = fixture.seed_manager().await;
    let lead_resp = fixture
        .post(
            "/api/leads",
            json!({
                "companyId": "T1",
                "name": "Acme",
                "metadata": { "notesStatus": "pending", "customField": "keep-me" }
            }),
        )
        .await;
    let lead = lead_resp["data"]["id"].as_str().unwrap().to_string();

    let resp = fixture
        .client
        .patch(fixture.url(&format!("/api/leads/{}/metadata", lead)))
        .header("x-employee-id", &boss)
        .json(&json!({ "followUpDate": "2026-09-01" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["metadata"]["notesStatus"], json!("pending"));
    assert_eq!(body["data"]["metadata"]["followUpDate"], json!("2026-09-01"));
    assert_eq!(body["data"]["metadata"]["customField"], json!("keep-me"));
}

#[tokio::test]
async fn test_role_mutation_takes_effect_without_waiting_for_ttl() {
    let fixture = TestFixture::new().await;
    let role = fixture
        .post(
            "/api/roles",
            json!({ "companyId": "T1", "name": "Sales", "kind": "EMPLOYEE" }),
        )
        .await;
    let role_id = role["data"]["id"].as_str().unwrap().to_string();
    let emp = fixture
        .seed_employee("E1", Some("sales"), Some(&role_id))
        .await;

    // Denied, and the denial is now cached
    let resp = fixture
        .post_as(
            &emp,
            "/api/authz/check",
            json!({ "resource": "lead", "action": "UPDATE" }),
        )
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["allowed"], json!(false));

    let perm = fixture
        .post(
            "/api/permissions",
            json!({ "companyId": "T1", "resource": "lead", "action": "UPDATE" }),
        )
        .await;
    let perm_id = perm["data"]["id"].as_str().unwrap().to_string();
    fixture
        .post(
            &format!("/api/roles/{}/permissions", role_id),
            json!({ "permissionId": perm_id }),
        )
        .await;

    // The grant evicted the cached denial
    let resp = fixture
        .post_as(
            &emp,
            "/api/authz/check",
            json!({ "resource": "lead", "action": "UPDATE" }),
        )
        .await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["allowed"], json!(true));
}

#[tokio::test]
async fn test_notification_mark_read() {
    let fixture = TestFixture::new().await;
    let boss = fixture.seed_manager().await;
    let e1 = fixture.seed_employee("E1", Some("sales"), None).await;
    let lead = fixture.seed_lead("Acme").await;

    fixture
        .post_as(
            &boss,
            &format!("/api/leads/{}/assign", lead),
            json!({ "employeeId": e1 }),
        )
        .await;

    let seen = fixture
        .get_json(&format!(
            "/api/notifications?companyId=T1&employeeId={}",
            e1
        ))
        .await;
    let id = seen["data"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(seen["data"][0]["isRead"], json!(false));

    fixture
        .post(&format!("/api/notifications/{}/read", id), json!({}))
        .await;

    let seen = fixture
        .get_json(&format!(
            "/api/notifications?companyId=T1&employeeId={}",
            e1
        ))
        .await;
    assert_eq!(seen["data"][0]["isRead"], json!(true));
}
