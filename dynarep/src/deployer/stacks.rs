use dynarep_config::shared::GlobalTablesConfig;
use futures::future::join_all;
use tracing::info;

use super::{GlobalTableDeployer, collect_errors};
use crate::error::{DynarepResult, ErrorKind};
use crate::poll::PollState;
use crate::poll::stack::StackStatusPoller;
use crate::provider::{StackProvider, TableProvider};
use crate::types::StackUpdate;

const STACK_DELETE_COMPLETE: &str = "DELETE_COMPLETE";
const STACK_DELETE_FAILED: &str = "DELETE_FAILED";

/// Reads the compiled service template deployed into the replica regions.
///
/// The template must be a JSON CloudFormation template with a `Resources` section.
pub async fn read_template(config: &GlobalTablesConfig) -> DynarepResult<String> {
    let Some(path) = config.template_path.as_deref() else {
        bail!(
            ErrorKind::ConfigError,
            "No template configured for regional stacks"
        );
    };

    let template_body = tokio::fs::read_to_string(path).await.map_err(|err| {
        dynarep_error!(
            ErrorKind::TemplateError,
            "Template could not be read",
            path.display(),
            source: err
        )
    })?;

    validate_template(&template_body)?;

    Ok(template_body)
}

fn validate_template(template_body: &str) -> DynarepResult<()> {
    let template: serde_json::Value = serde_json::from_str(template_body).map_err(|err| {
        dynarep_error!(
            ErrorKind::TemplateError,
            "Template is not valid JSON",
            err,
            source: err
        )
    })?;

    if !template
        .get("Resources")
        .is_some_and(serde_json::Value::is_object)
    {
        bail!(
            ErrorKind::TemplateError,
            "Template has no Resources section"
        );
    }

    Ok(())
}

impl<P> GlobalTableDeployer<P>
where
    P: TableProvider + StackProvider + Clone + Send + Sync + 'static,
{
    /// Deploys the service stack into every region concurrently.
    ///
    /// Every region runs to completion. Failures are reported together once all regions are done.
    pub(super) async fn deploy_stacks(
        &self,
        stack_name: &str,
        template_body: &str,
        regions: &[String],
    ) -> DynarepResult<()> {
        let results = join_all(
            regions
                .iter()
                .map(|region| self.deploy_stack(region, stack_name, template_body)),
        )
        .await;

        collect_errors(results)
    }

    async fn deploy_stack(
        &self,
        region: &str,
        stack_name: &str,
        template_body: &str,
    ) -> DynarepResult<()> {
        let exists = self
            .provider
            .stack_status(region, stack_name)
            .await?
            .is_some();

        if exists {
            let update = self
                .provider
                .update_stack(region, stack_name, template_body)
                .await?;

            if update == StackUpdate::NoChanges {
                return Ok(());
            }
        } else {
            self.provider
                .create_stack(region, stack_name, template_body)
                .await?;
        }

        let target = format!("{stack_name} in {region}");
        let succeeded = StackStatusPoller::new(self.poller())
            .poll(&target, || self.current_stack_status(region, stack_name))
            .await?;

        if !succeeded {
            bail!(
                ErrorKind::StackDeploymentFailed,
                "Stack deployment rolled back",
                target
            );
        }

        info!(stack_name, region, "stack deployed");

        Ok(())
    }

    async fn current_stack_status(&self, region: &str, stack_name: &str) -> DynarepResult<String> {
        match self.provider.stack_status(region, stack_name).await? {
            Some(status) => Ok(status),
            None => bail!(
                ErrorKind::StackNotFound,
                "Stack disappeared while waiting for it",
                format!("{stack_name} in {region}")
            ),
        }
    }

    /// Deletes the service stack from every region concurrently and waits until it is gone.
    pub(super) async fn remove_stacks(&self, stack_name: &str, regions: &[String]) -> DynarepResult<()> {
        let results = join_all(
            regions
                .iter()
                .map(|region| self.remove_stack(region, stack_name)),
        )
        .await;

        collect_errors(results)
    }

    async fn remove_stack(&self, region: &str, stack_name: &str) -> DynarepResult<()> {
        if self
            .provider
            .stack_status(region, stack_name)
            .await?
            .is_none()
        {
            info!(stack_name, region, "stack already deleted");
            return Ok(());
        }

        self.provider.delete_stack(region, stack_name).await?;

        let target = format!("{stack_name} in {region}");
        self.poller()
            .poll_until(&target, || self.stack_deletion_state(region, stack_name))
            .await?;

        info!(stack_name, region, "stack deleted");

        Ok(())
    }

    async fn stack_deletion_state(
        &self,
        region: &str,
        stack_name: &str,
    ) -> DynarepResult<PollState<()>> {
        let state = match self.provider.stack_status(region, stack_name).await? {
            None => PollState::Done {
                status: STACK_DELETE_COMPLETE.to_string(),
                value: (),
            },
            Some(status) if status == STACK_DELETE_COMPLETE => PollState::Done { status, value: () },
            Some(status) if status == STACK_DELETE_FAILED => bail!(
                ErrorKind::StackDeploymentFailed,
                "Stack deletion failed",
                format!("{stack_name} in {region}")
            ),
            Some(status) => PollState::Pending { status },
        };

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_requires_resources() {
        assert!(validate_template(r#"{"Resources": {"Orders": {}}}"#).is_ok());

        let err = validate_template(r#"{"Outputs": {}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateError);

        let err = validate_template("Resources:\n  Orders: {}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateError);
    }

    #[tokio::test]
    async fn test_missing_template_path_is_config_error() {
        let config = GlobalTablesConfig {
            version: Default::default(),
            regions: vec!["us-west-2".to_string()],
            create_stack: true,
            template_path: None,
            tags: Default::default(),
            tables: Vec::new(),
        };

        let err = read_template(&config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
