use crate::lifecycle::{CreateOutcome, DeleteOutcome, PodManager};
use crate::ProxyError;
use podproxy_common::{ProxyCommand, ProxyResponse};

/// Run one command and turn its outcome into the reply for the caller.
///
/// Backend errors never cross this boundary raw: each becomes an
/// [`ProxyResponse::Error`] tagged with its [`ProxyError::kind`].
pub async fn dispatch(manager: &PodManager, command: &ProxyCommand) -> ProxyResponse {
    match command {
        ProxyCommand::Create(request) => match manager.create_if_absent(request).await {
            Ok(CreateOutcome::Created) => ProxyResponse::success(),
            Ok(CreateOutcome::AlreadyExists) => {
                ProxyResponse::success_with(format!("pod {} already exists", request.name()))
            }
            Err(e) => error_response(e),
        },
        ProxyCommand::Delete(name) => match manager.delete(name).await {
            DeleteOutcome::Deleted => ProxyResponse::success(),
            DeleteOutcome::NotFound => {
                ProxyResponse::success_with(format!("pod {} not found", name))
            }
            DeleteOutcome::Failed(message) => {
                ProxyResponse::success_with(format!("delete of pod {} failed: {}", name, message))
            }
        },
        ProxyCommand::DeleteAll => match manager.delete_all().await {
            Ok(summary) => ProxyResponse::success_with(summary.to_string()),
            Err(e) => error_response(e),
        },
        ProxyCommand::ResolveContainerId(name) => match manager
            .resolve_main_container_id(name, manager.readiness_policy())
            .await
        {
            Ok(id) => ProxyResponse::Value {
                value: id.into_inner(),
            },
            Err(e) => error_response(e),
        },
    }
}

fn error_response(e: ProxyError) -> ProxyResponse {
    ProxyResponse::error(e.kind(), e.to_string())
}
