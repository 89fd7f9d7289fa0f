mod common;

use chrono::Duration;
use common::{id_of, test_epoch, TestApp};
use serde_json::{json, Value};

async fn grant_admin(app: &TestApp, days: i64) -> Value {
    let (from, until) = app.window(days);
    app.post_ok(
        "/privileged-access",
        &json!({
            "user_id": app.user_id,
            "scope_type": "database",
            "scope_id": "prod-postgres",
            "access_level": "admin",
            "justification": "Database maintenance window",
            "valid_from": from,
            "valid_until": until
        }),
        201,
    )
    .await
}

#[tokio::test]
async fn unaudited_grant_needs_audit() {
    let app = TestApp::spawn().await;

    let access = grant_admin(&app, 180).await;
    assert_eq!(access["status"], "needs_audit");
    assert_eq!(access["access_level"], "admin");
    assert!(access["last_audit_date"].is_null());
}

#[tokio::test]
async fn audit_clears_needs_audit_and_appends_notes() {
    let app = TestApp::spawn().await;
    let access = grant_admin(&app, 365).await;
    let path = format!("/privileged-access/{}/audit", id_of(&access));

    let audited = app
        .post_ok(&path, &json!({ "notes": "Access still required" }), 200)
        .await;
    assert_eq!(audited["status"], "active");
    assert_eq!(audited["audit_notes"], "[2025-01-01] Access still required");

    app.clock.advance(Duration::days(91));
    let overdue = app
        .get_json(&format!("/privileged-access/{}", id_of(&access)))
        .await;
    assert_eq!(overdue["status"], "needs_audit");

    let again = app
        .post_ok(&path, &json!({ "notes": "Reviewed with owner" }), 200)
        .await;
    assert_eq!(again["status"], "active");
    assert_eq!(
        again["audit_notes"],
        "[2025-01-01] Access still required\n[2025-04-02] Reviewed with owner"
    );
}

#[tokio::test]
async fn empty_audit_notes_fail_validation() {
    let app = TestApp::spawn().await;
    let access = grant_admin(&app, 365).await;

    let response = app
        .post(
            &format!("/privileged-access/{}/audit", id_of(&access)),
            &json!({ "notes": "" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn blank_audit_notes_fail_validation() {
    let app = TestApp::spawn().await;
    let access = grant_admin(&app, 365).await;

    let response = app
        .post(
            &format!("/privileged-access/{}/audit", id_of(&access)),
            &json!({ "notes": "   " }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let unchanged = app
        .get_json(&format!("/privileged-access/{}", id_of(&access)))
        .await;
    assert_eq!(unchanged["status"], "needs_audit");
    assert!(unchanged["last_audit_date"].is_null());
}

#[tokio::test]
async fn stats_count_unaudited_grants_whatever_their_expiry() {
    let app = TestApp::spawn().await;
    grant_admin(&app, 20).await;

    let stats = app.get_json("/privileged-access/stats").await;
    assert_eq!(stats["expiring_soon"], 1);
    assert_eq!(stats["needs_audit"], 1);

    app.clock.advance(Duration::days(21));
    let stats = app.get_json("/privileged-access/stats").await;
    assert_eq!(stats["expired"], 1);
    assert_eq!(stats["needs_audit"], 1);
}

#[tokio::test]
async fn expiring_soon_takes_precedence_over_audit() {
    let app = TestApp::spawn().await;

    let access = grant_admin(&app, 20).await;
    assert_eq!(access["status"], "expiring_soon");
}

#[tokio::test]
async fn renew_and_revoke() {
    let app = TestApp::spawn().await;
    let access = grant_admin(&app, 20).await;
    let id = id_of(&access);

    let renewed = app
        .post_ok(
            &format!("/privileged-access/{}/renew", id),
            &json!({ "valid_until": test_epoch() + Duration::days(200) }),
            200,
        )
        .await;
    assert_eq!(renewed["days_until_expiry"], 200);

    let revoked = app
        .post_ok(&format!("/privileged-access/{}/revoke", id), &json!({}), 200)
        .await;
    assert_eq!(revoked["status"], "revoked");

    let renew_revoked = app
        .post(
            &format!("/privileged-access/{}/renew", id),
            &json!({ "valid_until": test_epoch() + Duration::days(300) }),
        )
        .await;
    assert_eq!(renew_revoked.status().as_u16(), 409);

    let audit_revoked = app
        .post(
            &format!("/privileged-access/{}/audit", id),
            &json!({ "notes": "Too late" }),
        )
        .await;
    assert_eq!(audit_revoked.status().as_u16(), 409);
}

#[tokio::test]
async fn approve_then_update() {
    let app = TestApp::spawn().await;
    let access = grant_admin(&app, 120).await;
    let id = id_of(&access);

    let approved = app
        .post_ok(&format!("/privileged-access/{}/approve", id), &json!({}), 200)
        .await;
    assert_eq!(approved["approved"], true);

    let response = app
        .put(
            &format!("/privileged-access/{}", id),
            &json!({ "access_level": "super_admin", "scope_id": "  prod-replica  " }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["access_level"], "super_admin");
    assert_eq!(updated["scope_id"], "prod-replica");
    assert_eq!(updated["approved"], true);
}

#[tokio::test]
async fn list_filters_and_stats() {
    let app = TestApp::spawn().await;
    grant_admin(&app, 120).await;
    let (from, until) = app.window(120);
    app.post_ok(
        "/privileged-access",
        &json!({
            "user_id": uuid::Uuid::new_v4(),
            "scope_type": "network",
            "scope_id": "core-switches",
            "access_level": "read",
            "justification": "Read-only topology review",
            "valid_from": from,
            "valid_until": until
        }),
        201,
    )
    .await;

    let network = app.get_json("/privileged-access?scope_type=network").await;
    assert_eq!(network["total"], 1);
    assert_eq!(network["data"][0]["scope_id"], "core-switches");

    let mine = app
        .get_json(&format!("/privileged-access?user_id={}", app.user_id))
        .await;
    assert_eq!(mine["total"], 1);

    let stats = app.get_json("/privileged-access/stats").await;
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["active"], 2);
    assert_eq!(stats["needs_audit"], 2);
    assert_eq!(stats["pending_approval"], 2);
    assert_eq!(stats["by_scope_type"]["database"], 1);
    assert_eq!(stats["by_access_level"]["read"], 1);
}

#[tokio::test]
async fn delete_then_missing() {
    let app = TestApp::spawn().await;
    let access = grant_admin(&app, 120).await;
    let path = format!("/privileged-access/{}", id_of(&access));

    assert_eq!(app.delete(&path).await.status().as_u16(), 204);
    assert_eq!(app.get(&path).await.status().as_u16(), 404);
    assert_eq!(app.delete(&path).await.status().as_u16(), 404);
}
