use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use equisync::clock::FixedClock;
use equisync::table::{
    BitableClient, Column, ColumnNames, FieldKind, RecordFields, RemoteTable, TableError, TableRow,
    TableSync,
};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP: &str = "bascnApp";
const TABLE: &str = "tblBalances";

fn table_path(suffix: &str) -> String {
    format!("/bitable/v1/apps/{APP}/tables/{TABLE}/{suffix}")
}

async fn mount_token(server: &MockServer, token: &str, expect: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/v3/tenant_access_token/internal"))
        .and(body_json(json!({"app_id": "cli_app", "app_secret": "app-secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": token,
            "expire": 7200
        })))
        .expect(expect)
        .mount(server)
        .await;
}

async fn mount_fields(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(table_path("fields")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "has_more": false,
                "items": [
                    {"field_name": "Client", "field_id": "fld1", "type": 1},
                    {"field_name": "Value", "field_id": "fld2", "type": 2},
                    {"field_name": "Updated At", "field_id": "fld3", "type": 5}
                ]
            }
        })))
        .mount(server)
        .await;
}

fn client(server: &MockServer, clock: Arc<FixedClock>) -> BitableClient {
    BitableClient::new(
        "cli_app",
        SecretString::new("app-secret".to_string().into_boxed_str()),
        APP,
    )
    .with_base_url(server.uri())
    .with_clock(clock)
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()))
}

#[tokio::test]
async fn fields_are_read_with_bearer_token() -> Result<()> {
    let server = MockServer::start().await;
    mount_token(&server, "t-1", 1).await;
    mount_fields(&server).await;

    let bitable = client(&server, clock());
    let fields = bitable.list_fields(TABLE).await?;

    assert_eq!(fields.len(), 3);
    assert_eq!(fields[1].remote_id, "fld2");
    assert_eq!(fields[1].kind, FieldKind::Number);
    assert_eq!(fields[2].kind, FieldKind::DateTime);

    let requests = server.received_requests().await.unwrap_or_default();
    let fields_request = requests
        .iter()
        .find(|r| r.url.path().ends_with("/fields"))
        .expect("fields request");
    assert_eq!(
        fields_request.headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer t-1")
    );
    Ok(())
}

#[tokio::test]
async fn token_is_reused_until_five_minutes_before_expiry() -> Result<()> {
    let server = MockServer::start().await;
    mount_token(&server, "t-1", 2).await;
    mount_fields(&server).await;

    let clock = clock();
    let bitable = client(&server, clock.clone());

    bitable.list_fields(TABLE).await?;
    clock.advance(Duration::seconds(7200 - 301));
    bitable.list_fields(TABLE).await?;
    clock.advance(Duration::seconds(2));
    bitable.list_fields(TABLE).await?;

    // `expect(2)` on the token mock is verified when the server drops.
    Ok(())
}

#[tokio::test]
async fn token_failure_is_an_auth_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 10014,
            "msg": "app secret invalid"
        })))
        .mount(&server)
        .await;

    let bitable = client(&server, clock());
    let err = bitable.list_fields(TABLE).await.unwrap_err();

    assert!(matches!(err, TableError::Auth(_)));
    assert!(err.to_string().contains("app secret invalid"));
    Ok(())
}

#[tokio::test]
async fn batch_create_sends_fields_keyed_by_field_id() -> Result<()> {
    let server = MockServer::start().await;
    mount_token(&server, "t-1", 1).await;
    mount_fields(&server).await;
    Mock::given(method("POST"))
        .and(path(table_path("records/batch_create")))
        .and(header("authorization", "Bearer t-1"))
        .and(body_json(json!({
            "records": [
                {"fields": {"fld1": "Customer_A", "fld2": 1000.0, "fld3": 1_704_164_645_000_i64}}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "success",
            "data": {"records": [{"record_id": "rec1", "fields": {}}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bitable = client(&server, clock());
    let row = TableRow::new()
        .with(Column::Client, "Customer_A")
        .with(Column::Value, "1000")
        .with(Column::UpdatedAt, "2024-01-02 03:04:05");

    let report = TableSync::new(&bitable, ColumnNames::default())
        .sync(TABLE, &[row], false)
        .await?;

    assert_eq!(report.written, 1);
    Ok(())
}

#[tokio::test]
async fn clearing_pages_through_records_then_deletes() -> Result<()> {
    let server = MockServer::start().await;
    mount_token(&server, "t-1", 1).await;
    Mock::given(method("GET"))
        .and(path(table_path("records")))
        .and(query_param("page_size", "500"))
        .and(query_param("page_token", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"has_more": false, "items": [{"record_id": "rec3"}]}
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(table_path("records")))
        .and(query_param("page_size", "500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {
                "has_more": true,
                "page_token": "next",
                "items": [{"record_id": "rec1"}, {"record_id": "rec2"}]
            }
        })))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(table_path("records/batch_delete")))
        .and(body_json(json!({"records": ["rec1", "rec2", "rec3"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": {"records": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bitable = client(&server, clock());
    let first = bitable.list_records(TABLE, None, 500).await?;
    assert!(first.has_more);
    assert_eq!(first.page_token.as_deref(), Some("next"));

    let second = bitable.list_records(TABLE, Some("next"), 500).await?;
    let mut ids = first.record_ids;
    ids.extend(second.record_ids);
    bitable.batch_delete(TABLE, &ids).await?;
    Ok(())
}

#[tokio::test]
async fn non_zero_code_is_an_api_error() -> Result<()> {
    let server = MockServer::start().await;
    mount_token(&server, "t-1", 1).await;
    Mock::given(method("POST"))
        .and(path(table_path("records/batch_create")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254045,
            "msg": "FieldNameNotFound"
        })))
        .mount(&server)
        .await;

    let bitable = client(&server, clock());
    let err = bitable
        .batch_create(TABLE, &[RecordFields::new()])
        .await
        .unwrap_err();

    assert!(matches!(err, TableError::Api { code: 1254045, .. }));
    Ok(())
}

#[tokio::test]
async fn token_without_expire_is_kept_for_two_hours() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_fields(&server).await;

    let clock = clock();
    let bitable = client(&server, clock.clone());

    bitable.list_fields(TABLE).await?;
    clock.advance(Duration::seconds(60));
    bitable.list_fields(TABLE).await?;
    clock.advance(Duration::seconds(3600));
    bitable.list_fields(TABLE).await?;
    Ok(())
}
