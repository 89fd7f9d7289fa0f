mod common;

use common::{id_of, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn child_inherits_level_and_path() {
    let app = TestApp::spawn().await;

    let acme = app.create_organization("Acme", "company", None).await;
    assert_eq!(acme["level"], 1);
    assert_eq!(acme["path"], "Acme");

    let security = app
        .create_organization("Security", "department", Some(&id_of(&acme)))
        .await;
    assert_eq!(security["level"], 2);
    assert_eq!(security["path"], "Acme > Security");
    assert_eq!(security["parent_id"], acme["id"]);

    let soc = app
        .create_organization("SOC", "unit", Some(&id_of(&security)))
        .await;
    assert_eq!(soc["level"], 3);
    assert_eq!(soc["path"], "Acme > Security > SOC");
}

#[tokio::test]
async fn rename_rewrites_descendant_paths() {
    let app = TestApp::spawn().await;

    let acme = app.create_organization("Acme", "company", None).await;
    let security = app
        .create_organization("Security", "department", Some(&id_of(&acme)))
        .await;
    let soc = app
        .create_organization("SOC", "unit", Some(&id_of(&security)))
        .await;

    let response = app
        .put(
            &format!("/organizations/{}", id_of(&acme)),
            &json!({ "name": "Globex" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let renamed: Value = response.json().await.unwrap();
    assert_eq!(renamed["path"], "Globex");

    let security = app
        .get_json(&format!("/organizations/{}", id_of(&security)))
        .await;
    assert_eq!(security["path"], "Globex > Security");

    let soc = app.get_json(&format!("/organizations/{}", id_of(&soc))).await;
    assert_eq!(soc["path"], "Globex > Security > SOC");
    assert_eq!(soc["level"], 3);
}

#[tokio::test]
async fn reparent_moves_subtree() {
    let app = TestApp::spawn().await;

    let acme = app.create_organization("Acme", "company", None).await;
    let globex = app.create_organization("Globex", "company", None).await;
    let it = app
        .create_organization("IT", "department", Some(&id_of(&acme)))
        .await;
    let ops = app.create_organization("Ops", "unit", Some(&id_of(&it))).await;

    let response = app
        .put(
            &format!("/organizations/{}", id_of(&it)),
            &json!({ "parent_id": id_of(&globex) }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let ops = app.get_json(&format!("/organizations/{}", id_of(&ops))).await;
    assert_eq!(ops["path"], "Globex > IT > Ops");
}

#[tokio::test]
async fn cycle_is_rejected() {
    let app = TestApp::spawn().await;

    let acme = app.create_organization("Acme", "company", None).await;
    let it = app
        .create_organization("IT", "department", Some(&id_of(&acme)))
        .await;

    let response = app
        .put(
            &format!("/organizations/{}", id_of(&acme)),
            &json!({ "parent_id": id_of(&it) }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("cycle"));

    let self_parent = app
        .put(
            &format!("/organizations/{}", id_of(&acme)),
            &json!({ "parent_id": id_of(&acme) }),
        )
        .await;
    assert_eq!(self_parent.status().as_u16(), 400);
}

#[tokio::test]
async fn depth_limit_is_enforced() {
    let app = TestApp::spawn().await;

    let acme = app.create_organization("Acme", "company", None).await;
    let it = app
        .create_organization("IT", "department", Some(&id_of(&acme)))
        .await;
    let ops = app.create_organization("Ops", "unit", Some(&id_of(&it))).await;

    let response = app
        .post(
            "/organizations",
            &json!({ "name": "Night shift", "org_type": "unit", "parent_id": id_of(&ops) }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("depth"));
}

#[tokio::test]
async fn type_rules_are_enforced() {
    let app = TestApp::spawn().await;

    let orphan = app
        .post("/organizations", &json!({ "name": "Finance", "org_type": "department" }))
        .await;
    assert_eq!(orphan.status().as_u16(), 400);

    let acme = app.create_organization("Acme", "company", None).await;
    let nested_company = app
        .post(
            "/organizations",
            &json!({ "name": "Subsidiary", "org_type": "company", "parent_id": id_of(&acme) }),
        )
        .await;
    assert_eq!(nested_company.status().as_u16(), 400);

    let unknown_parent = app
        .post(
            "/organizations",
            &json!({ "name": "Finance", "org_type": "department", "parent_id": uuid::Uuid::new_v4() }),
        )
        .await;
    assert_eq!(unknown_parent.status().as_u16(), 400);
}

#[tokio::test]
async fn delete_is_blocked_by_children_and_assets() {
    let app = TestApp::spawn().await;

    let acme = app.create_organization("Acme", "company", None).await;
    let it = app
        .create_organization("IT", "department", Some(&id_of(&acme)))
        .await;

    let blocked = app.delete(&format!("/organizations/{}", id_of(&acme))).await;
    assert_eq!(blocked.status().as_u16(), 409);

    let asset = app
        .create_asset("Payroll DB", &id_of(&it), ["high", "medium", "low"])
        .await;
    let blocked = app.delete(&format!("/organizations/{}", id_of(&it))).await;
    assert_eq!(blocked.status().as_u16(), 409);

    let removed = app.delete(&format!("/assets/{}", id_of(&asset))).await;
    assert_eq!(removed.status().as_u16(), 204);
    let removed = app.delete(&format!("/organizations/{}", id_of(&it))).await;
    assert_eq!(removed.status().as_u16(), 204);
    let removed = app.delete(&format!("/organizations/{}", id_of(&acme))).await;
    assert_eq!(removed.status().as_u16(), 204);

    let missing = app.get(&format!("/organizations/{}", id_of(&acme))).await;
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn tree_nests_children_under_roots() {
    let app = TestApp::spawn().await;

    let acme = app.create_organization("Acme", "company", None).await;
    app.create_organization("IT", "department", Some(&id_of(&acme)))
        .await;
    app.create_organization("HR", "department", Some(&id_of(&acme)))
        .await;
    app.create_organization("Globex", "company", None).await;

    let tree = app.get_json("/organizations/tree").await;
    let roots = tree.as_array().unwrap();
    assert_eq!(roots.len(), 2);

    let acme_node = roots.iter().find(|n| n["name"] == "Acme").unwrap();
    assert_eq!(acme_node["children"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn listing_filters_and_paginates() {
    let app = TestApp::spawn().await;

    let acme = app.create_organization("Acme", "company", None).await;
    for name in ["Finance", "Legal", "Security"] {
        app.create_organization(name, "department", Some(&id_of(&acme)))
            .await;
    }

    let departments = app
        .get_json("/organizations?org_type=department&limit=2")
        .await;
    assert_eq!(departments["total"], 3);
    assert_eq!(departments["total_pages"], 2);
    assert_eq!(departments["data"].as_array().unwrap().len(), 2);

    let search = app.get_json("/organizations?search=secur").await;
    assert_eq!(search["total"], 1);
    assert_eq!(search["data"][0]["path"], "Acme > Security");
}

#[tokio::test]
async fn tenants_are_isolated() {
    let app = TestApp::spawn().await;
    let acme = app.create_organization("Acme", "company", None).await;

    let response = app
        .client
        .get(app.url(&format!("/organizations/{}", id_of(&acme))))
        .header(common::TENANT_HEADER, uuid::Uuid::new_v4().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn blank_names_fail_validation() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/organizations", &json!({ "name": "   ", "org_type": "company" }))
        .await;
    assert_eq!(response.status().as_u16(), 422);

    let company = app.create_organization("Acme", "company", None).await;
    let rename = app
        .put(&format!("/organizations/{}", id_of(&company)), &json!({ "name": "\t \n" }))
        .await;
    assert_eq!(rename.status().as_u16(), 422);

    let unchanged = app.get_json(&format!("/organizations/{}", id_of(&company))).await;
    assert_eq!(unchanged["path"], "Acme");
}
