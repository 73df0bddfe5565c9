#![cfg(feature = "test-utils")]

mod common;

use config::shared::WriteMode;
use dataplane::error::ErrorKind;
use dataplane::types::Part;
use std::sync::Arc;
use telemetry::tracing::init_test_tracing;

use common::{Harness, row_part, schema_part, streamed_users, transfer_request};

fn users(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(id, name)| (id.to_string(), name.to_string()))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_before_schema_are_buffered_and_flushed() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    sink.transfer_parts(vec![row_part(1, "2", "bob"), row_part(0, "1", "alice")])
        .await
        .unwrap();
    assert_eq!(sink.buffered_rows().await, 2);
    assert!(harness.store().inserted_rows().await.is_empty());

    sink.transfer_parts(vec![schema_part()]).await.unwrap();

    assert_eq!(sink.buffered_rows().await, 0);
    assert!(sink.schema().await.is_some());
    let inserted = harness.store().inserted_rows().await;
    let ordinals: Vec<u64> = inserted.iter().map(|(_, row)| row.ordinal()).collect();
    assert_eq!(ordinals, vec![1, 0]);
    assert_eq!(inserted[0].0.to_string(), "dst-project.analytics.users_copy");
    assert_eq!(
        streamed_users(harness.store()).await,
        users(&[("1", "alice"), ("2", "bob")])
    );
    sink.finish().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn delivery_order_does_not_change_the_written_rows() {
    init_test_tracing();

    let orders: Vec<Vec<Part>> = vec![
        vec![schema_part(), row_part(0, "1", "alice"), row_part(1, "2", "bob")],
        vec![row_part(1, "2", "bob"), row_part(0, "1", "alice"), schema_part()],
        vec![row_part(0, "1", "alice"), schema_part(), row_part(1, "2", "bob")],
    ];

    for parts in orders {
        let harness = Harness::new(WriteMode::StreamingAppend);
        let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

        for part in parts {
            sink.transfer_parts(vec![part]).await.unwrap();
        }

        assert_eq!(
            streamed_users(harness.store()).await,
            users(&[("1", "alice"), ("2", "bob")])
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_batches_write_every_row_once() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    let mut handles = Vec::new();
    for ordinal in 0..20u64 {
        let row_sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let id = ordinal.to_string();
            row_sink.transfer_parts(vec![row_part(ordinal, &id, "user")])
                .await
        }));
        if ordinal == 10 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.transfer_parts(vec![schema_part()]).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut ordinals: Vec<u64> = harness
        .store()
        .inserted_rows()
        .await
        .into_iter()
        .map(|(_, row)| row.ordinal())
        .collect();
    ordinals.sort();
    assert_eq!(ordinals, (0..20).collect::<Vec<_>>());
    assert_eq!(sink.rows_written(), 20);
    assert_eq!(harness.connector.connects(), 1);
    assert_eq!(harness.store().table_probes().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn second_schema_part_is_fatal() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    let err = sink
        .transfer_parts(vec![schema_part(), schema_part()])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateSchema);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_column_is_a_data_integrity_error() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();
    let stray = Part::row(0, r#"{"__row__":"0","id":"1","email":"a@b.c"}"#);

    let err = sink
        .transfer_parts(vec![schema_part(), stray, row_part(1, "2", "bob")])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidRow);
    assert!(harness.store().inserted_rows().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_schema_part_is_rejected() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    let err = sink
        .transfer_parts(vec![Part::schema(r#"{"id":"RECORD"}"#)])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SchemaDecodeError);
    assert!(sink.schema().await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn schema_naming_the_row_ordinal_is_rejected() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    let err = sink
        .transfer_parts(vec![Part::schema(
            r#"{"id":"INTEGER","__row__":"INTEGER"}"#,
        )])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationError);
    assert!(sink.schema().await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn streaming_row_rejections_are_warnings() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    harness
        .store()
        .reject_rows_with("name", "bob", "no such field")
        .await;
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    sink.transfer_parts(vec![
        schema_part(),
        row_part(0, "1", "alice"),
        row_part(1, "2", "bob"),
        row_part(2, "3", "carol"),
    ])
    .await
    .unwrap();

    assert_eq!(
        streamed_users(harness.store()).await,
        users(&[("1", "alice"), ("3", "carol")])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn streaming_request_failure_is_fatal() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    harness.store().fail_insert_requests("connection reset").await;
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    let err = sink
        .transfer_parts(vec![schema_part(), row_part(0, "1", "alice")])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WriteExecutionFailure);
    assert_eq!(err.detail(), Some("connection reset"));
}

#[tokio::test(flavor = "multi_thread")]
async fn dml_inserts_duplicates_twice() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::AccumulatedDml);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();
    assert_eq!(sink.write_mode(), WriteMode::AccumulatedDml);

    sink.transfer_parts(vec![
        schema_part(),
        row_part(0, "1", "alice"),
        row_part(0, "1", "alice"),
    ])
    .await
    .unwrap();

    let statement =
        "INSERT INTO `dst-project.analytics.users_copy` (`id`, `name`) VALUES (1, \"alice\")";
    assert_eq!(
        harness.store().dml_statements().await,
        vec![statement, statement]
    );
    assert!(harness.store().inserted_rows().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn dml_failure_aborts_with_store_detail() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::AccumulatedDml);
    harness
        .store()
        .fail_jobs_containing("\"bob\"", "Quota exceeded: too many DML statements")
        .await;
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    let err = sink
        .transfer_parts(vec![
            schema_part(),
            row_part(0, "1", "alice"),
            row_part(1, "2", "bob"),
            row_part(2, "3", "carol"),
        ])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WriteExecutionFailure);
    assert!(
        err.detail()
            .unwrap()
            .contains("Quota exceeded: too many DML statements")
    );
    assert_eq!(harness.store().dml_statements().await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_dml_submission_is_a_write_failure() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::AccumulatedDml);
    harness
        .store()
        .refuse_submissions_containing("INSERT", "Not found: Table proj:ds.users")
        .await;
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    let err = sink
        .transfer_parts(vec![schema_part(), row_part(0, "1", "alice")])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WriteExecutionFailure);
    assert!(err.detail().unwrap().contains("Not found: Table proj:ds.users"));
}

#[tokio::test(flavor = "multi_thread")]
async fn buffered_rows_without_schema_fail_on_finish() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    sink.transfer_parts(vec![row_part(0, "1", "alice")])
        .await
        .unwrap();
    let err = sink.finish().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MissingSchema);
    assert!(err.detail().unwrap().contains("1 buffered rows"));
}

#[tokio::test(flavor = "multi_thread")]
async fn table_probe_failure_is_advisory() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    harness.store().fail_table_probe("permission denied").await;
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    sink.transfer_parts(vec![schema_part(), row_part(0, "1", "alice")])
        .await
        .unwrap();
    sink.transfer_parts(vec![row_part(1, "2", "bob")])
        .await
        .unwrap();

    assert_eq!(harness.store().table_probes().await, 1);
    assert_eq!(harness.store().inserted_rows().await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn sink_connects_with_destination_project() {
    init_test_tracing();

    let harness = Harness::new(WriteMode::StreamingAppend);
    let sink = harness.sinks.create_sink(&transfer_request("")).unwrap();

    let sink_a = Arc::clone(&sink);
    let sink_b = Arc::clone(&sink);
    let (a, b) = tokio::join!(
        sink_a.transfer_parts(vec![]),
        sink_b.transfer_parts(vec![])
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(harness.connector.connects(), 1);
    assert_eq!(
        harness.connector.credentials().await[0].0,
        "dst-project".to_string()
    );
}
