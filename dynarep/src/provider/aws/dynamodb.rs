use aws_sdk_dynamodb::types as sdk;
use tracing::debug;

use super::error::{build_error, provider_error};
use super::{AwsProvider, present, scaling};
use crate::error::{DynarepResult, ErrorKind};
use crate::provider::TableProvider;
use crate::resolver::TopologyLookupError;
use crate::schema::{
    AttributeDefinition, BillingMode, KeyAttribute, KeyType, REPLICA_STREAM_VIEW_TYPE,
    ReplicaDescription, ScalingSettings, SecondaryIndex, TableDescription, TableSchema,
    Throughput,
};
use crate::types::{ReplicaChange, ReplicationTopology, Tags};

impl TableProvider for AwsProvider {
    async fn describe_table(
        &self,
        region: &str,
        table_name: &str,
    ) -> DynarepResult<TableDescription> {
        let output = self
            .dynamodb(region)
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|err| provider_error("DescribeTable", table_name, err))?;

        let Some(table) = output.table() else {
            bail!(
                ErrorKind::TableNotFound,
                "DynamoDB table not found",
                format!("{table_name} in {region}")
            );
        };

        table_description(table_name, table)
    }

    async fn create_table(&self, region: &str, schema: &TableSchema) -> DynarepResult<String> {
        let mut request = self
            .dynamodb(region)
            .create_table()
            .table_name(&schema.name);

        for key in &schema.key_schema {
            request = request.key_schema(key_schema_element(key)?);
        }

        for attribute in &schema.attribute_definitions {
            request = request.attribute_definitions(
                sdk::AttributeDefinition::builder()
                    .attribute_name(&attribute.name)
                    .attribute_type(sdk::ScalarAttributeType::from(
                        attribute.attribute_type.as_str(),
                    ))
                    .build()
                    .map_err(|err| build_error("CreateTable", err))?,
            );
        }

        request = match schema.billing_mode {
            BillingMode::PayPerRequest => request.billing_mode(sdk::BillingMode::PayPerRequest),
            BillingMode::Provisioned(throughput) => request
                .billing_mode(sdk::BillingMode::Provisioned)
                .provisioned_throughput(provisioned_throughput(throughput)?),
        };

        for index in &schema.global_secondary_indexes {
            let mut builder = sdk::GlobalSecondaryIndex::builder()
                .index_name(&index.name)
                .projection(
                    sdk::Projection::builder()
                        .projection_type(sdk::ProjectionType::from(index.projection_type.as_str()))
                        .set_non_key_attributes(
                            (!index.non_key_attributes.is_empty())
                                .then(|| index.non_key_attributes.clone()),
                        )
                        .build(),
                );

            for key in &index.key_schema {
                builder = builder.key_schema(key_schema_element(key)?);
            }

            if let Some(throughput) = index.throughput {
                builder = builder.provisioned_throughput(provisioned_throughput(throughput)?);
            }

            request = request.global_secondary_indexes(
                builder
                    .build()
                    .map_err(|err| build_error("CreateTable", err))?,
            );
        }

        if schema.stream_enabled {
            request = request.stream_specification(replica_stream_specification()?);
        }

        let output = request
            .send()
            .await
            .map_err(|err| provider_error("CreateTable", &schema.name, err))?;

        let arn = output
            .table_description()
            .and_then(|table| table.table_arn())
            .map(str::to_string);

        match arn {
            Some(arn) => Ok(arn),
            None => bail!(
                ErrorKind::InvalidState,
                "Created table has no ARN",
                format!("{} in {region}", schema.name)
            ),
        }
    }

    async fn delete_table(&self, region: &str, table_name: &str) -> DynarepResult<()> {
        self.dynamodb(region)
            .delete_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|err| provider_error("DeleteTable", table_name, err))?;

        Ok(())
    }

    async fn describe_global_table(
        &self,
        region: &str,
        global_table_name: &str,
    ) -> Result<ReplicationTopology, TopologyLookupError> {
        let output = self
            .dynamodb(region)
            .describe_global_table()
            .global_table_name(global_table_name)
            .send()
            .await
            .map_err(|err| provider_error("DescribeGlobalTable", global_table_name, err))?;

        let Some(global_table) = output.global_table_description() else {
            return Err(TopologyLookupError::NotFound);
        };

        Ok(global_table
            .replication_group()
            .iter()
            .filter_map(|replica| replica.region_name())
            .map(str::to_string)
            .collect())
    }

    async fn table_replicas(
        &self,
        region: &str,
        table_name: &str,
    ) -> Result<ReplicationTopology, TopologyLookupError> {
        let description = self.describe_table(region, table_name).await?;

        // A table without replicas is not a global table yet.
        if description.replicas.is_empty() {
            return Ok(ReplicationTopology::empty());
        }

        let mut regions = vec![region.to_string()];
        for replica in description.replicas {
            if !regions.contains(&replica.region) {
                regions.push(replica.region);
            }
        }

        Ok(ReplicationTopology::new(regions))
    }

    async fn create_global_table(
        &self,
        region: &str,
        global_table_name: &str,
        regions: &[String],
    ) -> DynarepResult<()> {
        let mut request = self
            .dynamodb(region)
            .create_global_table()
            .global_table_name(global_table_name);

        for replica_region in regions {
            request =
                request.replication_group(sdk::Replica::builder().region_name(replica_region).build());
        }

        request
            .send()
            .await
            .map_err(|err| provider_error("CreateGlobalTable", global_table_name, err))?;

        debug!(global_table_name, ?regions, "created global table");

        Ok(())
    }

    async fn update_global_table(
        &self,
        region: &str,
        global_table_name: &str,
        change: ReplicaChange,
    ) -> DynarepResult<()> {
        let update = match &change {
            ReplicaChange::Add(replica_region) => sdk::ReplicaUpdate::builder()
                .create(
                    sdk::CreateReplicaAction::builder()
                        .region_name(replica_region)
                        .build()
                        .map_err(|err| build_error("UpdateGlobalTable", err))?,
                )
                .build(),
            ReplicaChange::Remove(replica_region) => sdk::ReplicaUpdate::builder()
                .delete(
                    sdk::DeleteReplicaAction::builder()
                        .region_name(replica_region)
                        .build()
                        .map_err(|err| build_error("UpdateGlobalTable", err))?,
                )
                .build(),
        };

        self.dynamodb(region)
            .update_global_table()
            .global_table_name(global_table_name)
            .replica_updates(update)
            .send()
            .await
            .map_err(|err| provider_error("UpdateGlobalTable", global_table_name, err))?;

        debug!(global_table_name, %change, "updated global table");

        Ok(())
    }

    async fn update_table_replicas(
        &self,
        region: &str,
        table_name: &str,
        change: ReplicaChange,
    ) -> DynarepResult<()> {
        let update = match &change {
            ReplicaChange::Add(replica_region) => sdk::ReplicationGroupUpdate::builder()
                .create(
                    sdk::CreateReplicationGroupMemberAction::builder()
                        .region_name(replica_region)
                        .build()
                        .map_err(|err| build_error("UpdateTable", err))?,
                )
                .build(),
            ReplicaChange::Remove(replica_region) => sdk::ReplicationGroupUpdate::builder()
                .delete(
                    sdk::DeleteReplicationGroupMemberAction::builder()
                        .region_name(replica_region)
                        .build()
                        .map_err(|err| build_error("UpdateTable", err))?,
                )
                .build(),
        };

        self.dynamodb(region)
            .update_table()
            .table_name(table_name)
            .replica_updates(update)
            .send()
            .await
            .map_err(|err| provider_error("UpdateTable", table_name, err))?;

        debug!(table_name, %change, "updated table replicas");

        Ok(())
    }

    async fn tag_resource(&self, region: &str, resource_arn: &str, tags: &Tags) -> DynarepResult<()> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut request = self
            .dynamodb(region)
            .tag_resource()
            .resource_arn(resource_arn);

        for (key, value) in tags {
            request = request.tags(
                sdk::Tag::builder()
                    .key(key)
                    .value(value)
                    .build()
                    .map_err(|err| build_error("TagResource", err))?,
            );
        }

        request
            .send()
            .await
            .map_err(|err| provider_error("TagResource", resource_arn, err))?;

        Ok(())
    }

    async fn describe_scaling(
        &self,
        region: &str,
        table_name: &str,
    ) -> DynarepResult<ScalingSettings> {
        scaling::describe(&self.autoscaling(region), table_name).await
    }

    async fn apply_scaling(&self, region: &str, settings: &ScalingSettings) -> DynarepResult<()> {
        scaling::apply(&self.autoscaling(region), settings).await
    }
}

fn key_schema_element(key: &KeyAttribute) -> DynarepResult<sdk::KeySchemaElement> {
    sdk::KeySchemaElement::builder()
        .attribute_name(&key.name)
        .key_type(sdk::KeyType::from(key.key_type.as_str()))
        .build()
        .map_err(|err| build_error("CreateTable", err))
}

/// Replicas must stream both images so DynamoDB can reconcile writes between regions.
fn replica_stream_specification() -> DynarepResult<sdk::StreamSpecification> {
    sdk::StreamSpecification::builder()
        .stream_enabled(true)
        .stream_view_type(sdk::StreamViewType::from(REPLICA_STREAM_VIEW_TYPE))
        .build()
        .map_err(|err| build_error("CreateTable", err))
}

fn provisioned_throughput(throughput: Throughput) -> DynarepResult<sdk::ProvisionedThroughput> {
    sdk::ProvisionedThroughput::builder()
        .read_capacity_units(throughput.read_capacity_units)
        .write_capacity_units(throughput.write_capacity_units)
        .build()
        .map_err(|err| build_error("CreateTable", err))
}

fn key_attributes(elements: &[sdk::KeySchemaElement]) -> DynarepResult<Vec<KeyAttribute>> {
    elements
        .iter()
        .map(|element| {
            let key_type = match element.key_type() {
                sdk::KeyType::Hash => KeyType::Hash,
                sdk::KeyType::Range => KeyType::Range,
                other => bail!(
                    ErrorKind::InvalidState,
                    "Unsupported key type",
                    other.as_str()
                ),
            };

            Ok(KeyAttribute {
                name: element.attribute_name().to_string(),
                key_type,
            })
        })
        .collect()
}

fn throughput(description: Option<&sdk::ProvisionedThroughputDescription>) -> Throughput {
    Throughput {
        read_capacity_units: description
            .and_then(|d| d.read_capacity_units())
            .unwrap_or_default(),
        write_capacity_units: description
            .and_then(|d| d.write_capacity_units())
            .unwrap_or_default(),
    }
}

/// Converts a `DescribeTable` response into a [`TableDescription`].
fn table_description(
    table_name: &str,
    table: &sdk::TableDescription,
) -> DynarepResult<TableDescription> {
    let pay_per_request = table
        .billing_mode_summary()
        .and_then(|summary| summary.billing_mode())
        .is_some_and(|mode| *mode == sdk::BillingMode::PayPerRequest);

    let billing_mode = if pay_per_request {
        BillingMode::PayPerRequest
    } else {
        BillingMode::Provisioned(throughput(table.provisioned_throughput()))
    };

    let mut global_secondary_indexes = Vec::with_capacity(table.global_secondary_indexes().len());
    for index in table.global_secondary_indexes() {
        let projection = index.projection();
        global_secondary_indexes.push(SecondaryIndex {
            name: index.index_name().unwrap_or_default().to_string(),
            key_schema: key_attributes(index.key_schema())?,
            projection_type: projection
                .and_then(|p| p.projection_type())
                .map(|p| p.as_str().to_string())
                .unwrap_or_else(|| "ALL".to_string()),
            non_key_attributes: projection
                .map(|p| p.non_key_attributes().to_vec())
                .unwrap_or_default(),
            throughput: billing_mode
                .is_provisioned()
                .then(|| throughput(index.provisioned_throughput())),
        });
    }

    let schema = TableSchema {
        name: table.table_name().unwrap_or(table_name).to_string(),
        key_schema: key_attributes(table.key_schema())?,
        attribute_definitions: table
            .attribute_definitions()
            .iter()
            .map(|definition| AttributeDefinition {
                name: definition.attribute_name().to_string(),
                attribute_type: definition.attribute_type().as_str().to_string(),
            })
            .collect(),
        billing_mode,
        global_secondary_indexes,
        stream_enabled: table
            .stream_specification()
            .and_then(|spec| present::<bool, _>(spec.stream_enabled()))
            .unwrap_or(false),
    };

    Ok(TableDescription {
        schema,
        arn: table.table_arn().unwrap_or_default().to_string(),
        status: table
            .table_status()
            .map(|status| status.as_str().to_string())
            .unwrap_or_default(),
        replicas: table
            .replicas()
            .iter()
            .filter_map(|replica| {
                Some(ReplicaDescription {
                    region: replica.region_name()?.to_string(),
                    status: replica
                        .replica_status()
                        .map(|status| status.as_str().to_string())
                        .unwrap_or_default(),
                })
            })
            .collect(),
    })
}
