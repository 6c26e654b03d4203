use crate::k8s::backend::PodBackend;
use crate::k8s::types::{to_k8s_pod, PodStatus};
use crate::pod::PodSpec;
use crate::{ProxyError, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client};
use tracing::{debug, info};

/// [`PodBackend`] over the Kubernetes API server
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    pub async fn try_default() -> Result<Self> {
        debug!("Initializing Kubernetes client");

        let client = Client::try_default().await.map_err(|e| {
            ProxyError::Backend(format!("Failed to create K8s client: {}", e))
        })?;

        info!("Successfully connected to Kubernetes cluster");

        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl PodBackend for KubeBackend {
    async fn create_pod(&self, spec: &PodSpec) -> Result<()> {
        let pod = to_k8s_pod(spec);

        self.pods(spec.namespace())
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| map_api_error(e, "create", spec.name(), spec.namespace()))?;

        Ok(())
    }

    async fn read_pod_status(&self, namespace: &str, name: &str) -> Result<PodStatus> {
        let pod = self
            .pods(namespace)
            .get_status(name)
            .await
            .map_err(|e| map_api_error(e, "read", name, namespace))?;

        Ok(PodStatus::from_k8s_pod(&pod))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodStatus>> {
        let pod_list = self
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| ProxyError::Backend(format!("Failed to list pods: {}", e)))?;

        Ok(pod_list.items.iter().map(PodStatus::from_k8s_pod).collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_api_error(e, "delete", name, namespace))?;

        Ok(())
    }
}

fn map_api_error(e: kube::Error, verb: &str, name: &str, namespace: &str) -> ProxyError {
    match &e {
        kube::Error::Api(response) if response.code == 404 => ProxyError::PodNotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        kube::Error::Api(response) if response.code == 409 => ProxyError::AlreadyExists {
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        _ => ProxyError::Backend(format!(
            "Failed to {} pod {}/{}: {}",
            verb, namespace, name, e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "test".to_string(),
            reason: "test".to_string(),
            code,
        })
    }

    #[test]
    fn test_maps_not_found_and_conflict() {
        assert!(matches!(
            map_api_error(api_error(404), "read", "w", "default"),
            ProxyError::PodNotFound { .. }
        ));
        assert!(matches!(
            map_api_error(api_error(409), "create", "w", "default"),
            ProxyError::AlreadyExists { .. }
        ));

        let err = map_api_error(api_error(500), "delete", "w", "default");
        assert!(matches!(err, ProxyError::Backend(_)));
        assert!(err.to_string().contains("default/w"));
    }
}
