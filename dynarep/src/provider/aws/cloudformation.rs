use aws_sdk_cloudformation::types as sdk;
use tracing::{debug, info};

use super::error::{is_no_updates, provider_error};
use super::{AwsProvider, present};
use crate::error::DynarepResult;
use crate::provider::StackProvider;
use crate::types::StackUpdate;

/// CloudFormation resource type of DynamoDB tables.
const TABLE_RESOURCE_TYPE: &str = "AWS::DynamoDB::Table";

/// Capabilities granted to service stacks, which usually create IAM roles.
const STACK_CAPABILITIES: [sdk::Capability; 2] =
    [sdk::Capability::CapabilityIam, sdk::Capability::CapabilityNamedIam];

impl StackProvider for AwsProvider {
    async fn list_stack_tables(&self, region: &str, stack_name: &str) -> DynarepResult<Vec<String>> {
        let client = self.cloudformation(region);
        let mut tables = Vec::new();

        let mut next_token = None;
        loop {
            let output = client
                .list_stack_resources()
                .stack_name(stack_name)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|err| provider_error("ListStackResources", stack_name, err))?;

            for summary in output.stack_resource_summaries() {
                if present::<&str, _>(summary.resource_type()) != Some(TABLE_RESOURCE_TYPE) {
                    continue;
                }

                if let Some(physical_id) = summary.physical_resource_id() {
                    tables.push(physical_id.to_string());
                }
            }

            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }

        debug!(stack_name, region, ?tables, "listed stack tables");

        Ok(tables)
    }

    async fn stack_status(&self, region: &str, stack_name: &str) -> DynarepResult<Option<String>> {
        let result = self
            .cloudformation(region)
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                let err = provider_error("DescribeStacks", stack_name, err);
                if err.is_not_found() {
                    return Ok(None);
                }

                return Err(err);
            }
        };

        Ok(output
            .stacks()
            .first()
            .and_then(|stack| present::<&sdk::StackStatus, _>(stack.stack_status()))
            .map(|status| status.as_str().to_string()))
    }

    async fn create_stack(
        &self,
        region: &str,
        stack_name: &str,
        template_body: &str,
    ) -> DynarepResult<()> {
        self.cloudformation(region)
            .create_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .set_capabilities(Some(STACK_CAPABILITIES.to_vec()))
            .send()
            .await
            .map_err(|err| provider_error("CreateStack", stack_name, err))?;

        info!(stack_name, region, "stack creation started");

        Ok(())
    }

    async fn update_stack(
        &self,
        region: &str,
        stack_name: &str,
        template_body: &str,
    ) -> DynarepResult<StackUpdate> {
        let result = self
            .cloudformation(region)
            .update_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .set_capabilities(Some(STACK_CAPABILITIES.to_vec()))
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(stack_name, region, "stack update started");
                Ok(StackUpdate::Started)
            }
            Err(err) if is_no_updates(&err) => {
                info!(stack_name, region, "stack is up to date");
                Ok(StackUpdate::NoChanges)
            }
            Err(err) => Err(provider_error("UpdateStack", stack_name, err)),
        }
    }

    async fn delete_stack(&self, region: &str, stack_name: &str) -> DynarepResult<()> {
        self.cloudformation(region)
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|err| provider_error("DeleteStack", stack_name, err))?;

        info!(stack_name, region, "stack deletion started");

        Ok(())
    }
}
