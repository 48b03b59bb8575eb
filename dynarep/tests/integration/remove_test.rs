use std::path::PathBuf;

use dynarep::deployer::GlobalTableDeployer;
use dynarep::error::ErrorKind;
use dynarep::test_utils::fixtures::{
    SOURCE_REGION, STACK_NAME, create_stack_config, deployer_config, table_schema,
};
use dynarep::test_utils::memory_provider::MemoryProvider;
use dynarep::types::TableAction;
use dynarep_config::shared::ReplicationVersion;
use dynarep_telemetry::tracing::init_test_tracing;

const TABLE: &str = "orders-dev";

async fn provider_with_source_table() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider
        .add_stack(SOURCE_REGION, STACK_NAME, "UPDATE_COMPLETE", &[TABLE])
        .await;
    provider.add_table(SOURCE_REGION, table_schema(TABLE)).await;
    provider
}

#[tokio::test(start_paused = true)]
async fn table_replicas_are_removed() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider.add_replica(SOURCE_REGION, TABLE, "us-west-2").await;
    provider.add_replica(SOURCE_REGION, TABLE, "eu-west-1").await;

    let config = deployer_config(ReplicationVersion::V2019, &["us-west-2", "eu-west-1"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .remove()
        .await
        .unwrap();

    let report = summary.table(TABLE).unwrap();
    assert_eq!(report.action, TableAction::Removed);
    assert_eq!(report.regions, vec!["us-west-2", "eu-west-1"]);

    let source = provider.table(SOURCE_REGION, TABLE).await.unwrap();
    assert!(source.replicas.is_empty());
    assert!(provider.table("us-west-2", TABLE).await.is_none());
    assert!(provider.table("eu-west-1", TABLE).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn regions_without_replicas_are_skipped() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider.add_replica(SOURCE_REGION, TABLE, "us-west-2").await;

    let config = deployer_config(ReplicationVersion::V2019, &["us-west-2", "eu-west-1"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .remove()
        .await
        .unwrap();

    assert_eq!(summary.table(TABLE).unwrap().regions, vec!["us-west-2"]);
    assert_eq!(provider.calls_to("update_table_replicas").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_source_table_is_skipped() {
    init_test_tracing();

    let provider = MemoryProvider::new();
    provider
        .add_stack(SOURCE_REGION, STACK_NAME, "UPDATE_COMPLETE", &[TABLE])
        .await;

    let config = deployer_config(ReplicationVersion::V2019, &["us-west-2"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .remove()
        .await
        .unwrap();

    assert_eq!(summary.table(TABLE).unwrap().action, TableAction::Unchanged);
    assert!(provider.calls_to("update_table_replicas").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn global_table_is_unlinked_and_replica_tables_deleted() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    for region in ["us-west-2", "eu-west-1"] {
        provider.add_table(region, table_schema(TABLE)).await;
    }
    provider
        .add_global_table(TABLE, &[SOURCE_REGION, "us-west-2", "eu-west-1"])
        .await;

    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2", "eu-west-1"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .remove()
        .await
        .unwrap();

    let report = summary.table(TABLE).unwrap();
    assert_eq!(report.action, TableAction::Removed);
    assert_eq!(report.regions, vec!["us-west-2", "eu-west-1"]);

    assert_eq!(provider.global_table(TABLE).await.unwrap(), vec!["us-east-1"]);
    assert!(provider.table("us-west-2", TABLE).await.is_none());
    assert!(provider.table("eu-west-1", TABLE).await.is_none());
    assert!(provider.table(SOURCE_REGION, TABLE).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn missing_global_table_and_replicas_count_as_removed() {
    init_test_tracing();

    let provider = provider_with_source_table().await;

    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2", "eu-west-1"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .remove()
        .await
        .unwrap();

    assert_eq!(summary.table(TABLE).unwrap().action, TableAction::Unchanged);
    assert!(provider.calls_to("update_global_table").await.is_empty());
    assert_eq!(provider.calls_to("delete_table").await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn regional_stacks_are_deleted_with_their_tables() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    for region in ["us-west-2", "eu-west-1"] {
        provider
            .add_stack(region, STACK_NAME, "CREATE_COMPLETE", &[TABLE])
            .await;
    }
    provider
        .add_global_table(TABLE, &[SOURCE_REGION, "us-west-2", "eu-west-1"])
        .await;

    let config = create_stack_config(&["us-west-2", "eu-west-1"], PathBuf::from("unused.json"));
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .remove()
        .await
        .unwrap();

    assert_eq!(summary.stack_regions, vec!["us-west-2", "eu-west-1"]);
    assert!(provider.stack("us-west-2", STACK_NAME).await.is_none());
    assert!(provider.stack("eu-west-1", STACK_NAME).await.is_none());
    assert!(provider.stack(SOURCE_REGION, STACK_NAME).await.is_some());
    assert!(provider.calls_to("delete_table").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_stack_deletion_is_reported() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    for region in ["us-west-2", "eu-west-1"] {
        provider
            .add_stack(region, STACK_NAME, "CREATE_COMPLETE", &[TABLE])
            .await;
    }
    provider
        .script_stack("eu-west-1", &["DELETE_IN_PROGRESS", "DELETE_FAILED"])
        .await;

    let config = create_stack_config(&["us-west-2", "eu-west-1"], PathBuf::from("unused.json"));
    let err = GlobalTableDeployer::new(config, provider.clone())
        .remove()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StackDeploymentFailed);
    assert!(err.errors().is_none());
    assert!(provider.stack("us-west-2", STACK_NAME).await.is_none());
    assert_eq!(
        provider.stack("eu-west-1", STACK_NAME).await.as_deref(),
        Some("DELETE_FAILED")
    );
}
