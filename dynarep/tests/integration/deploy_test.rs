use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use dynarep::deployer::GlobalTableDeployer;
use dynarep::dynarep_error;
use dynarep::error::ErrorKind;
use dynarep::schema::{ScalingPolicy, ScalingSettings, ScalingTarget, TABLE_STATUS_ACTIVE};
use dynarep::test_utils::fixtures::{
    SOURCE_REGION, STACK_NAME, create_stack_config, deployer_config, provisioned_table_schema,
    table_arn, table_schema,
};
use dynarep::test_utils::memory_provider::MemoryProvider;
use dynarep::provider::TableProvider;
use dynarep::types::{ReplicaChange, TableAction};
use dynarep_config::shared::ReplicationVersion;
use dynarep_telemetry::tracing::init_test_tracing;
use tempfile::NamedTempFile;
use tokio::time::sleep;

const TABLE: &str = "orders-dev";

async fn provider_with_source_table() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider
        .add_stack(SOURCE_REGION, STACK_NAME, "UPDATE_COMPLETE", &[TABLE])
        .await;
    provider.add_table(SOURCE_REGION, table_schema(TABLE)).await;
    provider
}

const ORDERS_TEMPLATE: &str = r#"{"Resources": {"OrdersTable": {"Type": "AWS::DynamoDB::Table"}}}"#;

/// The template is deleted when the returned file is dropped.
fn write_template(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("dynarep-template-")
        .suffix(".json")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn tags() -> BTreeMap<String, String> {
    BTreeMap::from([("team".to_string(), "payments".to_string())])
}

#[tokio::test(start_paused = true)]
async fn global_table_is_created_on_first_deploy() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    let mut config = deployer_config(ReplicationVersion::V2017, &["us-west-2", "eu-west-1"]);
    config.global_tables.tags = tags();

    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    let report = summary.table(TABLE).unwrap();
    assert_eq!(report.action, TableAction::Created);
    assert_eq!(report.regions, vec!["us-west-2", "eu-west-1"]);

    for region in ["us-west-2", "eu-west-1"] {
        let replica = provider.table(region, TABLE).await.unwrap();
        assert!(replica.schema.stream_enabled);
        assert_eq!(provider.tags(&table_arn(region, TABLE)).await, Some(tags()));
    }

    assert_eq!(
        provider.global_table(TABLE).await.unwrap(),
        vec!["us-east-1", "us-west-2", "eu-west-1"]
    );
    assert!(summary.stack_regions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_regions_are_added_to_existing_global_table() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider.add_table("us-west-2", table_schema(TABLE)).await;
    provider
        .add_global_table(TABLE, &[SOURCE_REGION, "us-west-2"])
        .await;

    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2", "eu-west-1"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    let report = summary.table(TABLE).unwrap();
    assert_eq!(report.action, TableAction::Updated);
    assert_eq!(report.regions, vec!["eu-west-1"]);

    let created = provider.calls_to("create_table").await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].region, "eu-west-1");
    assert_eq!(
        provider.global_table(TABLE).await.unwrap(),
        vec!["us-east-1", "us-west-2", "eu-west-1"]
    );
}

#[tokio::test(start_paused = true)]
async fn fully_replicated_table_is_left_untouched() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider
        .add_global_table(TABLE, &[SOURCE_REGION, "us-west-2"])
        .await;

    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    assert_eq!(summary.table(TABLE).unwrap().action, TableAction::Unchanged);
    assert!(provider.calls_to("create_table").await.is_empty());
    assert!(provider.calls_to("update_global_table").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn provisioned_replicas_receive_scaling_settings() {
    init_test_tracing();

    let provider = MemoryProvider::new();
    provider
        .add_stack(SOURCE_REGION, STACK_NAME, "CREATE_COMPLETE", &[TABLE])
        .await;
    provider
        .add_table(SOURCE_REGION, provisioned_table_schema(TABLE))
        .await;

    let settings = ScalingSettings {
        targets: vec![ScalingTarget {
            resource_id: "table/orders-dev".to_string(),
            dimension: "dynamodb:table:ReadCapacityUnits".to_string(),
            min_capacity: 5,
            max_capacity: 50,
        }],
        policies: vec![ScalingPolicy {
            name: "orders-dev-read".to_string(),
            resource_id: "table/orders-dev".to_string(),
            dimension: "dynamodb:table:ReadCapacityUnits".to_string(),
            target_value: 70.0,
            predefined_metric: Some("DynamoDBReadCapacityUtilization".to_string()),
            scale_in_cooldown: Some(60),
            scale_out_cooldown: Some(60),
            disable_scale_in: None,
        }],
    };
    provider
        .set_scaling(SOURCE_REGION, TABLE, settings.clone())
        .await;

    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2"]);
    GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    assert_eq!(provider.applied_scaling("us-west-2").await, vec![settings]);
    assert!(
        provider
            .table("us-west-2", TABLE)
            .await
            .unwrap()
            .schema
            .billing_mode
            .is_provisioned()
    );
}

#[tokio::test(start_paused = true)]
async fn on_demand_replicas_skip_scaling() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2"]);
    GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    assert!(provider.calls_to("describe_scaling").await.is_empty());
    assert!(provider.applied_scaling("us-west-2").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn table_replicas_are_added_one_region_at_a_time() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    let mut config = deployer_config(ReplicationVersion::V2019, &["us-west-2", "eu-west-1"]);
    config.global_tables.tags = tags();

    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    let report = summary.table(TABLE).unwrap();
    assert_eq!(report.action, TableAction::Created);
    assert_eq!(report.regions, vec!["us-west-2", "eu-west-1"]);

    let source = provider.table(SOURCE_REGION, TABLE).await.unwrap();
    let replica_regions: Vec<&str> = source
        .replicas
        .iter()
        .map(|replica| replica.region.as_str())
        .collect();
    assert_eq!(replica_regions, vec!["us-west-2", "eu-west-1"]);
    assert!(
        source
            .replicas
            .iter()
            .all(|replica| replica.status == TABLE_STATUS_ACTIVE)
    );

    assert_eq!(
        provider.tags(&table_arn("eu-west-1", TABLE)).await,
        Some(tags())
    );
    assert!(provider.calls_to("create_global_table").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn source_region_is_never_added_as_its_own_replica() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    let config = deployer_config(
        ReplicationVersion::V2019,
        &[SOURCE_REGION, "us-west-2", "us-west-2"],
    );

    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    assert_eq!(summary.table(TABLE).unwrap().regions, vec!["us-west-2"]);
    assert_eq!(provider.calls_to("update_table_replicas").await.len(), 1);

    let err = provider
        .update_table_replicas(
            SOURCE_REGION,
            TABLE,
            ReplicaChange::Add(SOURCE_REGION.to_string()),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}

#[tokio::test(start_paused = true)]
async fn existing_table_replicas_are_kept() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider.add_replica(SOURCE_REGION, TABLE, "us-west-2").await;

    let config = deployer_config(ReplicationVersion::V2019, &["us-west-2", "eu-west-1"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    let report = summary.table(TABLE).unwrap();
    assert_eq!(report.action, TableAction::Updated);
    assert_eq!(report.regions, vec!["eu-west-1"]);
    assert_eq!(provider.calls_to("update_table_replicas").await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn allow_list_restricts_replicated_tables() {
    init_test_tracing();

    let provider = MemoryProvider::new();
    provider
        .add_stack(
            SOURCE_REGION,
            STACK_NAME,
            "UPDATE_COMPLETE",
            &[TABLE, "audit-dev"],
        )
        .await;
    provider.add_table(SOURCE_REGION, table_schema(TABLE)).await;
    provider
        .add_table(SOURCE_REGION, table_schema("audit-dev"))
        .await;

    let mut config = deployer_config(ReplicationVersion::V2019, &["us-west-2"]);
    config.global_tables.tables = vec![TABLE.to_string(), "missing-dev".to_string()];

    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    assert_eq!(summary.tables.len(), 1);
    assert!(summary.table("audit-dev").is_none());
    assert!(provider.table("us-west-2", "audit-dev").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn source_region_in_replica_regions_is_ignored() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    let config = deployer_config(ReplicationVersion::V2017, &[SOURCE_REGION, "us-west-2"]);

    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    assert_eq!(summary.table(TABLE).unwrap().regions, vec!["us-west-2"]);
    assert_eq!(
        provider.global_table(TABLE).await.unwrap(),
        vec!["us-east-1", "us-west-2"]
    );
}

#[tokio::test(start_paused = true)]
async fn stack_without_tables_deploys_nothing() {
    init_test_tracing();

    let provider = MemoryProvider::new();
    provider
        .add_stack(SOURCE_REGION, STACK_NAME, "CREATE_COMPLETE", &[])
        .await;

    let config = deployer_config(ReplicationVersion::V2019, &["us-west-2"]);
    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    assert!(summary.tables.is_empty());
    assert_eq!(provider.calls().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn regional_stacks_are_deployed_before_linking() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider
        .add_stack("eu-west-1", STACK_NAME, "CREATE_COMPLETE", &[TABLE])
        .await;
    // The eu-west-1 stack already matches the template.
    provider.script_stack("eu-west-1", &[]).await;

    let template = write_template(ORDERS_TEMPLATE);
    let config = create_stack_config(&["us-west-2", "eu-west-1"], template.path().to_path_buf());

    let summary = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap();

    assert_eq!(summary.stack_regions, vec!["us-west-2", "eu-west-1"]);
    assert_eq!(
        provider.stack("us-west-2", STACK_NAME).await.as_deref(),
        Some("CREATE_COMPLETE")
    );
    assert_eq!(provider.calls_to("update_stack").await.len(), 1);
    assert!(provider.calls_to("create_table").await.is_empty());
    assert_eq!(
        provider.global_table(TABLE).await.unwrap(),
        vec!["us-east-1", "us-west-2", "eu-west-1"]
    );
}

#[tokio::test(start_paused = true)]
async fn regional_stack_failures_are_reported_together() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider
        .script_stack(
            "us-west-2",
            &["CREATE_IN_PROGRESS", "ROLLBACK_IN_PROGRESS", "ROLLBACK_COMPLETE"],
        )
        .await;
    provider
        .fail_next(
            "create_stack",
            "eu-west-1",
            dynarep_error!(ErrorKind::PermissionDenied, "AWS request denied"),
        )
        .await;

    let template = write_template(ORDERS_TEMPLATE);
    let config = create_stack_config(&["us-west-2", "eu-west-1"], template.path().to_path_buf());

    let err = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap_err();

    assert_eq!(err.errors().map(|errors| errors.len()), Some(2));
    assert_eq!(
        err.kinds(),
        vec![ErrorKind::StackDeploymentFailed, ErrorKind::PermissionDenied]
    );
    assert!(provider.global_table(TABLE).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn invalid_template_fails_before_any_stack_operation() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    let template = write_template("Resources: {}");

    let config = create_stack_config(&["us-west-2"], template.path().to_path_buf());
    let err = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TemplateError);
    assert!(provider.calls_to("create_stack").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn topology_lookup_failures_abort_the_run() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider
        .fail_next(
            "describe_global_table",
            SOURCE_REGION,
            dynarep_error!(ErrorKind::ProviderThrottled, "AWS request throttled"),
        )
        .await;

    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2"]);
    let err = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderThrottled);
    assert!(provider.calls_to("create_table").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn table_that_never_settles_times_out() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider.set_settle_after(1_000).await;

    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2"]);
    let err = GlobalTableDeployer::new(config, provider.clone())
        .deploy()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(provider.global_table(TABLE).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_waits_in_progress() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    provider.set_settle_after(u32::MAX).await;

    let mut config = deployer_config(ReplicationVersion::V2017, &["us-west-2"]);
    config.polling.max_attempts = None;

    let deployer = GlobalTableDeployer::new(config, provider.clone());
    let shutdown_tx = deployer.shutdown_tx();
    let trigger = tokio::spawn(async move {
        sleep(Duration::from_secs(10)).await;
        shutdown_tx.shutdown().unwrap();
    });

    let err = deployer.deploy().await.unwrap_err();
    trigger.await.unwrap();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn shutdown_requested_between_waits_is_honoured() {
    init_test_tracing();

    let provider = provider_with_source_table().await;
    let config = deployer_config(ReplicationVersion::V2017, &["us-west-2"]);

    let deployer = GlobalTableDeployer::new(config, provider.clone());
    deployer.shutdown_tx().shutdown().unwrap();

    let err = deployer.deploy().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(provider.calls_to("create_table").await.is_empty());
}
