use std::error::Error;
use std::fmt::Debug;

use aws_sdk_dynamodb::error::{BuildError, SdkError};
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

use crate::error::{DynarepError, ErrorKind};

/// Message CloudFormation returns for an update that would change nothing.
const NO_UPDATES_MESSAGE: &str = "No updates are to be performed";

/// Converts an SDK failure of `operation` on `target` into a [`DynarepError`].
pub(super) fn provider_error<E, R>(
    operation: &'static str,
    target: &str,
    err: SdkError<E, R>,
) -> DynarepError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let (kind, detail) = match &err {
        SdkError::ServiceError(service_err) => {
            let code = service_err.err().code();
            let message = service_err.err().message();
            (
                classify(code, message),
                format!(
                    "{operation} {target}: {}: {}",
                    code.unwrap_or("UnknownError"),
                    message.unwrap_or("no message")
                ),
            )
        }
        SdkError::TimeoutError(_) => (
            ErrorKind::Timeout,
            format!("{operation} {target}: request timed out"),
        ),
        other => (
            ErrorKind::ProviderRequestFailed,
            format!("{operation} {target}: {}", DisplayErrorContext(other)),
        ),
    };

    dynarep_error!(kind, description(kind), detail = detail, source: err)
}

/// Converts a failure to assemble a request into a [`DynarepError`].
pub(super) fn build_error(operation: &'static str, err: BuildError) -> DynarepError {
    dynarep_error!(
        ErrorKind::InvalidRequest,
        "Provider request could not be built",
        format!("{operation}: {err}"),
        source: err
    )
}

/// Returns `true` when `err` is CloudFormation refusing an update that changes nothing.
pub(super) fn is_no_updates<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ServiceError(service_err) => service_err
            .err()
            .message()
            .is_some_and(|message| message.contains(NO_UPDATES_MESSAGE)),
        _ => false,
    }
}

/// Maps a service error code, and the message where the code is ambiguous, to an [`ErrorKind`].
pub(super) fn classify(code: Option<&str>, message: Option<&str>) -> ErrorKind {
    let Some(code) = code else {
        return ErrorKind::ProviderRequestFailed;
    };

    match code {
        "ResourceNotFoundException" | "TableNotFoundException" => ErrorKind::TableNotFound,
        "GlobalTableNotFoundException" => ErrorKind::GlobalTableNotFound,
        // CloudFormation reports missing stacks as validation errors.
        "ValidationError" if message.is_some_and(|m| m.contains("does not exist")) => {
            ErrorKind::StackNotFound
        }
        "ThrottlingException"
        | "Throttling"
        | "RequestLimitExceeded"
        | "ProvisionedThroughputExceededException"
        | "TooManyRequestsException" => ErrorKind::ProviderThrottled,
        "AccessDeniedException"
        | "AccessDenied"
        | "UnrecognizedClientException"
        | "InvalidClientTokenId"
        | "ExpiredTokenException"
        | "InsufficientCapabilitiesException" => ErrorKind::PermissionDenied,
        "ValidationException"
        | "ValidationError"
        | "InvalidParameterValue"
        | "ResourceInUseException"
        | "ReplicaAlreadyExistsException"
        | "ReplicaNotFoundException"
        | "GlobalTableAlreadyExistsException"
        | "AlreadyExistsException"
        | "LimitExceededException"
        | "ObjectNotFoundException" => ErrorKind::InvalidRequest,
        _ => ErrorKind::ProviderRequestFailed,
    }
}

fn description(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::TableNotFound => "DynamoDB table not found",
        ErrorKind::GlobalTableNotFound => "DynamoDB global table not found",
        ErrorKind::StackNotFound => "CloudFormation stack not found",
        ErrorKind::ProviderThrottled => "AWS request throttled",
        ErrorKind::PermissionDenied => "AWS request denied",
        ErrorKind::InvalidRequest => "AWS request rejected",
        ErrorKind::Timeout => "AWS request timed out",
        _ => "AWS request failed",
    }
}
