//! Application Auto Scaling settings of DynamoDB tables and their global secondary indexes.

use aws_sdk_applicationautoscaling::Client;
use aws_sdk_applicationautoscaling::types as sdk;

use super::error::{build_error, provider_error};
use super::present;
use crate::error::DynarepResult;
use crate::schema::{ScalingPolicy, ScalingSettings, ScalingTarget, table_resource_id};

/// Returns `true` for the table itself and for its indexes.
fn belongs_to_table(resource_id: &str, table_name: &str) -> bool {
    let table_id = table_resource_id(table_name);
    resource_id == table_id
        || resource_id
            .strip_prefix(&table_id)
            .is_some_and(|rest| rest.starts_with("/index/"))
}

pub(super) async fn describe(client: &Client, table_name: &str) -> DynarepResult<ScalingSettings> {
    let mut settings = ScalingSettings::default();

    let mut next_token = None;
    loop {
        let output = client
            .describe_scalable_targets()
            .service_namespace(sdk::ServiceNamespace::Dynamodb)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|err| provider_error("DescribeScalableTargets", table_name, err))?;

        for target in output.scalable_targets() {
            if let Some(target) = scaling_target(target)
                && belongs_to_table(&target.resource_id, table_name)
            {
                settings.targets.push(target);
            }
        }

        next_token = output.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    let mut next_token = None;
    loop {
        let output = client
            .describe_scaling_policies()
            .service_namespace(sdk::ServiceNamespace::Dynamodb)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|err| provider_error("DescribeScalingPolicies", table_name, err))?;

        for policy in output.scaling_policies() {
            if let Some(policy) = scaling_policy(policy)
                && belongs_to_table(&policy.resource_id, table_name)
            {
                settings.policies.push(policy);
            }
        }

        next_token = output.next_token().map(str::to_string);
        if next_token.is_none() {
            break;
        }
    }

    Ok(settings)
}

pub(super) async fn apply(client: &Client, settings: &ScalingSettings) -> DynarepResult<()> {
    // Policies can only be attached to registered targets.
    for target in &settings.targets {
        client
            .register_scalable_target()
            .service_namespace(sdk::ServiceNamespace::Dynamodb)
            .resource_id(&target.resource_id)
            .scalable_dimension(sdk::ScalableDimension::from(target.dimension.as_str()))
            .min_capacity(target.min_capacity)
            .max_capacity(target.max_capacity)
            .send()
            .await
            .map_err(|err| provider_error("RegisterScalableTarget", &target.resource_id, err))?;
    }

    for policy in &settings.policies {
        let mut configuration = sdk::TargetTrackingScalingPolicyConfiguration::builder()
            .target_value(policy.target_value)
            .set_scale_in_cooldown(policy.scale_in_cooldown)
            .set_scale_out_cooldown(policy.scale_out_cooldown)
            .set_disable_scale_in(policy.disable_scale_in);

        if let Some(metric) = &policy.predefined_metric {
            configuration = configuration.predefined_metric_specification(
                sdk::PredefinedMetricSpecification::builder()
                    .predefined_metric_type(sdk::MetricType::from(metric.as_str()))
                    .build()
                    .map_err(|err| build_error("PutScalingPolicy", err))?,
            );
        }

        client
            .put_scaling_policy()
            .policy_name(&policy.name)
            .service_namespace(sdk::ServiceNamespace::Dynamodb)
            .resource_id(&policy.resource_id)
            .scalable_dimension(sdk::ScalableDimension::from(policy.dimension.as_str()))
            .policy_type(sdk::PolicyType::TargetTrackingScaling)
            .target_tracking_scaling_policy_configuration(
                configuration
                    .build()
                    .map_err(|err| build_error("PutScalingPolicy", err))?,
            )
            .send()
            .await
            .map_err(|err| provider_error("PutScalingPolicy", &policy.resource_id, err))?;
    }

    Ok(())
}

fn scaling_target(target: &sdk::ScalableTarget) -> Option<ScalingTarget> {
    Some(ScalingTarget {
        resource_id: present::<&str, _>(target.resource_id())?.to_string(),
        dimension: present::<&sdk::ScalableDimension, _>(target.scalable_dimension())?
            .as_str()
            .to_string(),
        min_capacity: present::<i32, _>(target.min_capacity())?,
        max_capacity: present::<i32, _>(target.max_capacity())?,
    })
}

/// Only target tracking policies are copied. Step scaling policies are skipped.
fn scaling_policy(policy: &sdk::ScalingPolicy) -> Option<ScalingPolicy> {
    let configuration = policy.target_tracking_scaling_policy_configuration()?;

    Some(ScalingPolicy {
        name: present::<&str, _>(policy.policy_name())?.to_string(),
        resource_id: present::<&str, _>(policy.resource_id())?.to_string(),
        dimension: present::<&sdk::ScalableDimension, _>(policy.scalable_dimension())?
            .as_str()
            .to_string(),
        target_value: present::<f64, _>(configuration.target_value())?,
        predefined_metric: configuration
            .predefined_metric_specification()
            .and_then(|spec| present::<&sdk::MetricType, _>(spec.predefined_metric_type()))
            .map(|metric| metric.as_str().to_string()),
        scale_in_cooldown: configuration.scale_in_cooldown(),
        scale_out_cooldown: configuration.scale_out_cooldown(),
        disable_scale_in: configuration.disable_scale_in(),
    })
}
