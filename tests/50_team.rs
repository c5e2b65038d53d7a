mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use bento_api::auth::{generate_opaque_token, hash_opaque_token};
use bento_api::database::models::Invitation;
use bento_api::database::Store;
use bento_api::services::MemoryMailer;
use bento_api::types::{InvitationStatus, Role};
use common::TestApp;

#[tokio::test]
async fn invite_mails_the_recipient() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;

    let res = app.invite(&owner, &org, "Bob@Example.com", "admin").await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["email"], "bob@example.com");
    assert_eq!(res.body["data"]["status"], "pending");
    assert!(res.body["data"].get("token_hash").is_none());

    let mail = app.mailer.last_to("bob@example.com").await.unwrap();
    assert_eq!(mail.from, app.config.mail.from_email);
    assert!(mail.body.contains("/invitations/accept?token="));

    let res = app
        .get(&format!("/api/team/invitations?organization_id={}", org), Some(&owner))
        .await?;
    assert_eq!(res.body["data"].as_array().unwrap().len(), 1);

    let res = app.get("/api/onboarding/progress", Some(&owner)).await?;
    assert!(res.body["data"]["completed_steps"]
        .as_array()
        .unwrap()
        .contains(&json!("invite_team")));
    Ok(())
}

#[tokio::test]
async fn invite_rejects_duplicates_and_owner_role() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;

    app.invite(&owner, &org, "bob@example.com", "member").await?;
    let again = app.invite(&owner, &org, "bob@example.com", "member").await?;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let owner_role = app.invite(&owner, &org, "carol@example.com", "owner").await?;
    assert_eq!(owner_role.status, StatusCode::BAD_REQUEST);

    let bad_role = app.invite(&owner, &org, "carol@example.com", "emperor").await?;
    assert_eq!(bad_role.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn team_listing_is_members_only() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let outsider = app.register("eve@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;

    let res = app
        .get(&format!("/api/team/members?organization_id={}", org), Some(&owner))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"][0]["email"], "ada@example.com");
    assert_eq!(res.body["data"][0]["role"], "owner");

    let res = app
        .get(&format!("/api/team/members?organization_id={}", org), Some(&outsider))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.get("/api/team/members", Some(&owner)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.invite(&outsider, &org, "x@example.com", "member").await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn delete_invitation_enforces_permissions() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;

    // A plain member joins through an invitation
    app.invite(&owner, &org, "bob@example.com", "member").await?;
    let bob = app.register("bob@example.com").await?;
    let bob_token = app.invitation_token("bob@example.com").await?;
    let res = app
        .post("/api/invitations/accept", Some(&bob), json!({ "token": bob_token }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.invite(&owner, &org, "carol@example.com", "member").await?;
    let invitation_id = res.body["data"]["id"].as_str().unwrap().to_string();
    let path = format!("/api/team/invitations/{}", invitation_id);

    let res = app.delete(&path, None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.delete(&path, Some(&bob)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["error"], "Unauthorized to delete this invitation");

    let outsider = app.register("eve@example.com").await?;
    let res = app.delete(&path, Some(&outsider)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["error"], "Unauthorized to delete this invitation");

    let res = app.delete(&path, Some(&owner)).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.delete(&path, Some(&owner)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .delete(&format!("/api/team/invitations/{}", Uuid::new_v4()), Some(&owner))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn admins_can_delete_invitations_they_did_not_send() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;

    app.invite(&owner, &org, "admin@example.com", "admin").await?;
    let admin = app.register("admin@example.com").await?;
    let token = app.invitation_token("admin@example.com").await?;
    app.post("/api/invitations/accept", Some(&admin), json!({ "token": token }))
        .await?;

    let res = app.invite(&owner, &org, "carol@example.com", "member").await?;
    let id = res.body["data"]["id"].as_str().unwrap().to_string();

    let res = app
        .delete(&format!("/api/team/invitations/{}", id), Some(&admin))
        .await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn accept_joins_the_organization() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;
    app.invite(&owner, &org, "bob@example.com", "member").await?;
    let token = app.invitation_token("bob@example.com").await?;

    let eve = app.register("eve@example.com").await?;
    let res = app
        .post("/api/invitations/accept", Some(&eve), json!({ "token": token }))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let bob = app.register("bob@example.com").await?;
    let res = app.get("/api/user/invitations", Some(&bob)).await?;
    assert_eq!(res.body["data"][0]["organization_name"], "Acme");

    let res = app
        .post("/api/invitations/accept", Some(&bob), json!({ "token": token }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["role"], "member");

    let res = app.get("/api/user/organizations", Some(&bob)).await?;
    assert_eq!(res.body["data"][0]["id"], org.as_str());

    let res = app
        .post("/api/invitations/accept", Some(&bob), json!({ "token": token }))
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app
        .post("/api/invitations/accept", Some(&bob), json!({ "token": "unknown" }))
        .await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn expired_invitations_are_gone() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;
    let bob = app.register("bob@example.com").await?;

    let whoami = app.get("/api/auth/whoami", Some(&owner)).await?;
    let owner_id: Uuid = whoami.body["data"]["user"]["id"].as_str().unwrap().parse()?;

    let token = generate_opaque_token();
    let created_at = Utc::now() - Duration::days(10);
    app.store
        .insert_invitation(&Invitation {
            id: Uuid::new_v4(),
            organization_id: org.parse()?,
            inviter_id: owner_id,
            email: "bob@example.com".to_string(),
            role: Role::Member,
            status: InvitationStatus::Pending,
            token_hash: hash_opaque_token(&token),
            created_at,
            expires_at: created_at + Duration::days(7),
            responded_at: None,
        })
        .await?;

    let res = app
        .post("/api/invitations/accept", Some(&bob), json!({ "token": token }))
        .await?;
    assert_eq!(res.status, StatusCode::GONE);
    assert_eq!(res.body["code"], "GONE");

    // Expired invitations are neither listed nor in the way of a new one
    let res = app
        .get(&format!("/api/team/invitations?organization_id={}", org), Some(&owner))
        .await?;
    assert_eq!(res.body["data"], json!([]));

    let res = app.invite(&owner, &org, "bob@example.com", "member").await?;
    assert_eq!(res.status, StatusCode::CREATED);
    let fresh = app.invitation_token("bob@example.com").await?;
    let res = app
        .post("/api/invitations/accept", Some(&bob), json!({ "token": fresh }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn undeliverable_invitations_are_rolled_back() -> Result<()> {
    let app = TestApp::with_mailer(MemoryMailer::failing());
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;

    let res = app.invite(&owner, &org, "bob@example.com", "member").await?;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["error"], "An error occurred while processing your request");

    let res = app
        .get(&format!("/api/team/invitations?organization_id={}", org), Some(&owner))
        .await?;
    assert_eq!(res.body["data"], json!([]));
    assert!(app.store.pending_invitations_for_email("bob@example.com").await?.is_empty());

    // A retry is not mistaken for a duplicate
    let retry = app.invite(&owner, &org, "bob@example.com", "member").await?;
    assert_eq!(retry.status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

#[tokio::test]
async fn decline_clears_the_pending_invitation() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;
    app.invite(&owner, &org, "bob@example.com", "member").await?;
    let token = app.invitation_token("bob@example.com").await?;
    let bob = app.register("bob@example.com").await?;

    let res = app
        .post("/api/invitations/decline", Some(&bob), json!({ "token": token }))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["status"], "declined");

    let res = app
        .get(&format!("/api/team/invitations?organization_id={}", org), Some(&owner))
        .await?;
    assert_eq!(res.body["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn dashboard_summarises_the_account() -> Result<()> {
    let app = TestApp::new();
    let owner = app.register("ada@example.com").await?;
    let org = app.create_organization(&owner, "Acme").await?;
    app.invite(&owner, &org, "bob@example.com", "member").await?;
    let bob = app.register("bob@example.com").await?;

    let res = app.get("/api/dashboard", Some(&owner)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["organizations"][0]["member_count"], 1);
    assert_eq!(res.body["data"]["onboarding"]["percent_complete"], 66);

    let res = app.get("/api/dashboard", Some(&bob)).await?;
    assert_eq!(res.body["data"]["pending_invitations"], 1);
    assert_eq!(res.body["data"]["organizations"], json!([]));
    Ok(())
}
