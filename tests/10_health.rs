mod common;

use anyhow::Result;
use axum::http::StatusCode;

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let app = common::TestApp::new();
    let res = app.get("/", None).await?;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["data"]["name"], "Bento API");
    Ok(())
}

#[tokio::test]
async fn health_reports_the_store() -> Result<()> {
    let app = common::TestApp::new();
    let res = app.get("/health", None).await?;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["status"], "ok");
    assert_eq!(res.body["data"]["database"], "memory");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_get_a_json_404() -> Result<()> {
    let app = common::TestApp::new();
    let res = app.get("/nope", None).await?;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["success"], false);
    assert_eq!(res.body["code"], "NOT_FOUND");
    Ok(())
}
