mod util;

use assert_cmd::Command;
use log_query_console::config::ConsoleConfig;
use log_query_console::model::types::{IndexDefinition, PaneId, QueryParams};
use log_query_console::orchestrator::CancelToken;
use log_query_console::transport::{ApiResult, HttpLogService, LogService, TransportError};
use util::CannedServer;

fn service_for(server: &CannedServer) -> HttpLogService {
    let config = ConsoleConfig {
        base_url: server.base_url.clone(),
        ..ConsoleConfig::default()
    };
    HttpLogService::new(&config).unwrap()
}

#[tokio::test]
async fn database_list_filters_by_instance() {
    let server = CannedServer::start(
        200,
        r#"{"code":0,"msg":"","data":[{"id":3,"name":"ops","iid":2,"instanceName":"ch-east"}]}"#,
    )
    .await;

    let reply = service_for(&server).get_database_list(Some(2)).await.unwrap();

    let databases = reply.ok().expect("success envelope");
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].name, "ops");
    assert_eq!(databases[0].instance_name, "ch-east");
    let seen = server.requests();
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].target, "/api/v1/databases?iid=2");
}

#[tokio::test]
async fn table_list_reports_service_failure() {
    let server =
        CannedServer::start(200, r#"{"code":1001,"msg":"database not found"}"#).await;

    let reply = service_for(&server).get_table_list(9).await.unwrap();

    assert_eq!(
        reply,
        ApiResult::Failure {
            code: 1001,
            message: "database not found".into()
        }
    );
    assert_eq!(server.requests()[0].target, "/api/v1/databases/9/tables");
}

#[tokio::test]
async fn set_indexes_patches_wrapped_definitions() {
    let server = CannedServer::start(200, r#"{"code":0,"msg":""}"#).await;
    let indexes = vec![IndexDefinition {
        field: "status".into(),
        alias: "http status".into(),
        typ: 1,
        root_name: String::new(),
    }];

    let reply = service_for(&server).set_indexes(4, &indexes).await.unwrap();

    assert!(reply.is_success());
    let seen = server.requests();
    assert_eq!(seen[0].method, "PATCH");
    assert_eq!(seen[0].target, "/api/v1/tables/4/indexes");
    let body: serde_json::Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body["data"][0]["field"], "status");
    assert_eq!(body["data"][0]["rootName"], "");
    assert_eq!(body["data"][0]["typ"], 1);
}

#[tokio::test]
async fn get_indexes_decodes_definitions() {
    let server = CannedServer::start(
        200,
        r#"{"code":0,"msg":"","data":[{"field":"level","typ":0},{"field":"host","alias":"node","typ":0}]}"#,
    )
    .await;

    let indexes = service_for(&server).get_indexes(4).await.unwrap().ok().unwrap();

    assert_eq!(indexes.len(), 2);
    assert_eq!(indexes[1].alias, "node");
    assert_eq!(indexes[0].alias, "");
}

#[tokio::test]
async fn non_success_status_is_a_transport_error() {
    let server = CannedServer::start(502, r#"{"code":0,"msg":""}"#).await;

    let err = service_for(&server).get_indexes(1).await.unwrap_err();

    assert!(matches!(err, TransportError::Status(502)));
}

#[tokio::test]
async fn logs_request_carries_wire_params() {
    let server = CannedServer::start(
        200,
        r#"{"code":0,"msg":"","data":{"logs":[{"_raw_log_":"hi"}],"query":"","keys":[]}}"#,
    )
    .await;
    let params = QueryParams {
        st: 100,
        et: 200,
        query: "level='error'".into(),
        page: 2,
        page_size: 20,
    };

    let page = service_for(&server)
        .get_logs(&PaneId::from(4), &params, CancelToken::never())
        .await
        .unwrap()
        .ok()
        .unwrap();

    assert_eq!(page.logs[0]["_raw_log_"], "hi");
    let target = &server.requests()[0].target;
    assert!(target.starts_with("/api/v1/tables/4/logs?"), "{target}");
    assert!(target.contains("pageSize=20"), "{target}");
    assert!(target.contains("st=100") && target.contains("et=200"), "{target}");
}

#[tokio::test(flavor = "multi_thread")]
async fn tables_command_lists_libraries() {
    let server = CannedServer::start(
        200,
        r#"{"code":0,"msg":"","data":[{"id":7,"tableName":"nginx_access","desc":"edge"}]}"#,
    )
    .await;
    let base_url = server.base_url.clone();

    let stdout = tokio::task::spawn_blocking(move || {
        Command::new(assert_cmd::cargo::cargo_bin!("logq"))
            .env("RUST_LOG", "off")
            .args(["tables", "--database", "3", "--base-url", &base_url])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    })
    .await
    .unwrap();

    assert_eq!(String::from_utf8(stdout).unwrap(), "7\tnginx_access\tedge\n");
    assert_eq!(server.requests()[0].target, "/api/v1/databases/3/tables");
}
