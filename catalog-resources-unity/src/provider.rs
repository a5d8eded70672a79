use anyhow::{bail, Context, Result};
use catalog_resource::{framework::ResourceProvider, schema::v0};
use serde_json::Value;

use crate::{
    api::CatalogApi,
    external_location::{
        output_properties, ExternalLocationInProperties, ExternalLocationInfo,
        ExternalLocationState, RESOURCE_TYPE,
    },
    plan::UpdateCall,
    transaction,
};

pub struct ExternalLocationProvider<C> {
    api: C,
}

impl<C: CatalogApi> ExternalLocationProvider<C> {
    pub fn new(api: C) -> Self {
        Self { api }
    }

    async fn read_location(&self, name: &str) -> Result<ExternalLocationInfo> {
        self.api
            .read_external_location(name)
            .await
            .with_context(|| format!("Could not read external location {}", name))
    }

    /// The identifier of a resource that exists already.
    fn extant_name(resource: &v0::ExtantResource) -> Result<String> {
        let from_inputs = resource.input_properties.0.get("name");
        let from_outputs = resource
            .output_properties
            .as_ref()
            .and_then(|o| o.0.get("name"));
        match from_inputs.or(from_outputs).and_then(Value::as_str) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => bail!("The {} resource has no recorded name", resource.type_),
        }
    }
}

#[async_trait::async_trait]
impl<C: CatalogApi> ResourceProvider for ExternalLocationProvider<C> {
    async fn create(
        &self,
        request: v0::CreateResourceRequest,
    ) -> Result<v0::CreateResourceResponse> {
        match request.type_.as_str() {
            RESOURCE_TYPE => {}
            t => bail!(
                "ExternalLocationProvider::create: unknown resource type: {}",
                t
            ),
        }
        let inputs = ExternalLocationInProperties::parse(&request.input_properties.0)?;
        let name = inputs.state.name.as_str();

        self.api
            .create_external_location(&inputs.to_create_request())
            .await
            .with_context(|| format!("Could not create external location {}", name))?;

        // The create endpoint ignores the owner
        if let Some(owner) = &inputs.state.owner {
            tracing::info!(location = name, owner = owner.as_str(), "setting owner");
            let mut set_owner = UpdateCall::Attributes {
                attributes: inputs.state.attributes.clone(),
                force: false,
            }
            .to_request();
            set_owner.owner = Some(owner.clone());
            self.api
                .update_external_location(name, &set_owner)
                .await
                .with_context(|| format!("Could not set owner of external location {}", name))?;
        }

        let info = self.read_location(name).await?;
        Ok(v0::CreateResourceResponse {
            output_properties: v0::OutputProperties(output_properties(&info)?),
        })
    }

    async fn update(
        &self,
        request: v0::UpdateResourceRequest,
    ) -> Result<v0::UpdateResourceResponse> {
        match request.resource.type_.as_str() {
            RESOURCE_TYPE => {}
            t => bail!(
                "ExternalLocationProvider::update: unknown resource type: {}",
                t
            ),
        }
        let desired = ExternalLocationInProperties::parse(&request.input_properties.0)?;
        let name = Self::extant_name(&request.resource)?;
        if desired.state.name != name {
            bail!(
                "Renaming external location {} to {} is not supported",
                name,
                desired.state.name
            );
        }

        let observed = {
            let mut observed = ExternalLocationState::from(self.read_location(&name).await?);
            observed.name = name.clone();
            observed
        };

        transaction::update(&self.api, &desired.state, &observed, desired.force_update).await?;

        let info = self.read_location(&name).await?;
        Ok(v0::UpdateResourceResponse {
            output_properties: v0::OutputProperties(output_properties(&info)?),
        })
    }

    async fn read(&self, request: v0::ReadResourceRequest) -> Result<v0::ReadResourceResponse> {
        match request.resource.type_.as_str() {
            RESOURCE_TYPE => {}
            t => bail!(
                "ExternalLocationProvider::read: unknown resource type: {}",
                t
            ),
        }
        let name = Self::extant_name(&request.resource)?;
        let info = self.read_location(&name).await?;
        Ok(v0::ReadResourceResponse {
            output_properties: v0::OutputProperties(output_properties(&info)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::{json, Map};

    use super::*;
    use crate::api::{ApiError, RemoteError};
    use crate::external_location::{CreateExternalLocation, UpdateExternalLocation};

    /// A catalog holding a single location, applying patches like the server.
    struct InMemoryCatalog {
        location: Mutex<Option<ExternalLocationInfo>>,
        /// Reject patches that touch anything but the owner.
        reject_attributes: Option<RemoteError>,
        patches: Mutex<Vec<UpdateExternalLocation>>,
    }

    impl InMemoryCatalog {
        fn new(location: Option<ExternalLocationInfo>) -> Self {
            InMemoryCatalog {
                location: Mutex::new(location),
                reject_attributes: None,
                patches: Mutex::new(Vec::new()),
            }
        }

        fn location(&self) -> ExternalLocationInfo {
            self.location.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl CatalogApi for InMemoryCatalog {
        async fn create_external_location(
            &self,
            request: &CreateExternalLocation,
        ) -> Result<ExternalLocationInfo, ApiError> {
            let info = ExternalLocationInfo {
                name: Some(request.name.clone()),
                url: Some(request.url.clone()),
                credential_name: Some(request.credential_name.clone()),
                comment: request.comment.clone(),
                owner: Some("creator".to_string()),
                read_only: request.read_only,
                metastore_id: Some("fgh".to_string()),
                ..Default::default()
            };
            *self.location.lock().unwrap() = Some(info.clone());
            Ok(info)
        }

        async fn read_external_location(
            &self,
            name: &str,
        ) -> Result<ExternalLocationInfo, ApiError> {
            match self.location.lock().unwrap().clone() {
                Some(info) if info.name.as_deref() == Some(name) => Ok(info),
                _ => Err(RemoteError {
                    error_code: "EXTERNAL_LOCATION_DOES_NOT_EXIST".to_string(),
                    message: format!("External Location '{}' does not exist.", name),
                    status: 404,
                }
                .into()),
            }
        }

        async fn update_external_location(
            &self,
            _name: &str,
            request: &UpdateExternalLocation,
        ) -> Result<ExternalLocationInfo, ApiError> {
            self.patches.lock().unwrap().push(request.clone());
            if request.url.is_some() {
                if let Some(e) = &self.reject_attributes {
                    return Err(e.clone().into());
                }
            }
            let mut guard = self.location.lock().unwrap();
            let info = guard.as_mut().ok_or_else(|| RemoteError {
                error_code: "EXTERNAL_LOCATION_DOES_NOT_EXIST".to_string(),
                message: "External Location does not exist.".to_string(),
                status: 404,
            })?;
            if let Some(owner) = &request.owner {
                info.owner = Some(owner.clone());
            }
            if let Some(url) = &request.url {
                info.url = Some(url.clone());
            }
            if let Some(credential_name) = &request.credential_name {
                info.credential_name = Some(credential_name.clone());
            }
            if let Some(comment) = &request.comment {
                info.comment = Some(comment.clone());
            }
            if let Some(read_only) = request.read_only {
                info.read_only = Some(read_only);
            }
            if let Some(access_point) = &request.access_point {
                info.access_point = Some(access_point.clone());
            }
            if let Some(encryption_details) = &request.encryption_details {
                info.encryption_details = Some(encryption_details.clone());
            }
            if let Some(fallback) = request.fallback {
                info.fallback = Some(fallback);
            }
            Ok(info.clone())
        }
    }

    fn existing() -> ExternalLocationInfo {
        ExternalLocationInfo {
            name: Some("abc".to_string()),
            url: Some("s3://foo/bar".to_string()),
            credential_name: Some("abc".to_string()),
            comment: Some("def".to_string()),
            owner: Some("administrators".to_string()),
            metastore_id: Some("fgh".to_string()),
            ..Default::default()
        }
    }

    fn properties(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(o) => o,
            _ => panic!("not an object"),
        }
    }

    fn extant(inputs: Value) -> v0::ExtantResource {
        v0::ExtantResource {
            type_: v0::ResourceType(RESOURCE_TYPE.to_string()),
            input_properties: v0::InputProperties(properties(inputs)),
            output_properties: None,
        }
    }

    fn update_request(inputs: Value) -> v0::UpdateResourceRequest {
        v0::UpdateResourceRequest {
            resource: extant(json!({
                "name": "abc",
                "url": "s3://foo/bar",
                "credential_name": "abc",
                "comment": "def",
                "owner": "administrators",
            })),
            input_properties: v0::InputProperties(properties(inputs)),
        }
    }

    #[tokio::test]
    async fn create_with_owner_sets_owner_afterwards() {
        let provider = ExternalLocationProvider::new(InMemoryCatalog::new(None));
        let response = provider
            .create(v0::CreateResourceRequest {
                type_: v0::ResourceType(RESOURCE_TYPE.to_string()),
                input_properties: v0::InputProperties(properties(json!({
                    "name": "abc",
                    "url": "s3://foo/bar",
                    "credential_name": "bcd",
                    "owner": "administrators",
                    "comment": "def",
                }))),
            })
            .await
            .unwrap();
        assert_eq!(
            provider.api.patches.lock().unwrap().clone(),
            vec![UpdateExternalLocation {
                url: Some("s3://foo/bar".to_string()),
                credential_name: Some("bcd".to_string()),
                comment: Some("def".to_string()),
                owner: Some("administrators".to_string()),
                ..Default::default()
            }]
        );
        assert_eq!(
            response.output_properties.0.get("owner"),
            Some(&json!("administrators"))
        );
        assert_eq!(
            response.output_properties.0.get("metastore_id"),
            Some(&json!("fgh"))
        );
    }

    #[tokio::test]
    async fn create_without_owner_does_not_patch() {
        let provider = ExternalLocationProvider::new(InMemoryCatalog::new(None));
        provider
            .create(v0::CreateResourceRequest {
                type_: v0::ResourceType(RESOURCE_TYPE.to_string()),
                input_properties: v0::InputProperties(properties(json!({
                    "name": "abc",
                    "url": "s3://foo/bar",
                    "credential_name": "bcd",
                    "read_only": true,
                }))),
            })
            .await
            .unwrap();
        assert!(provider.api.patches.lock().unwrap().is_empty());
        assert_eq!(provider.api.location().read_only, Some(true));
    }

    #[tokio::test]
    async fn update_owner_and_attributes() {
        let provider = ExternalLocationProvider::new(InMemoryCatalog::new(Some(existing())));
        let response = provider
            .update(update_request(json!({
                "name": "abc",
                "url": "s3://foo/bar",
                "credential_name": "xyz",
                "owner": "updatedOwner",
            })))
            .await
            .unwrap();
        assert_eq!(provider.api.patches.lock().unwrap().len(), 2);
        assert_eq!(
            response.output_properties.0.get("owner"),
            Some(&json!("updatedOwner"))
        );
        assert_eq!(
            response.output_properties.0.get("credential_name"),
            Some(&json!("xyz"))
        );
    }

    #[tokio::test]
    async fn update_failure_restores_owner() {
        let mut catalog = InMemoryCatalog::new(Some(existing()));
        catalog.reject_attributes = Some(RemoteError {
            error_code: "SERVER_ERROR".to_string(),
            message: "Something unexpected happened".to_string(),
            status: 500,
        });
        let provider = ExternalLocationProvider::new(catalog);
        let err = provider
            .update(update_request(json!({
                "name": "abc",
                "url": "s3://foo/bar",
                "credential_name": "xyz",
                "owner": "updatedOwner",
            })))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Something unexpected happened"));
        assert_eq!(
            provider.api.location().owner.as_deref(),
            Some("administrators")
        );
        assert_eq!(
            provider.api.location().credential_name.as_deref(),
            Some("abc")
        );
    }

    #[tokio::test]
    async fn update_without_changes_only_reads() {
        let provider = ExternalLocationProvider::new(InMemoryCatalog::new(Some(existing())));
        provider
            .update(update_request(json!({
                "name": "abc",
                "url": "s3://foo/bar",
                "credential_name": "abc",
            })))
            .await
            .unwrap();
        assert!(provider.api.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_update_settles() {
        let provider = ExternalLocationProvider::new(InMemoryCatalog::new(Some(existing())));
        let inputs = json!({
            "name": "abc",
            "url": "s3://foo/bar",
            "credential_name": "xyz",
            "owner": "updatedOwner",
            "comment": "changed",
            "read_only": true,
            "access_point": "some_access_point",
            "encryption_details": {
                "sse_encryption_details": {
                    "algorithm": "AWS_SSE_KMS",
                    "aws_kms_key_arn": "some_key_arn",
                }
            },
            "skip_validation": true,
            "fallback": false,
        });
        provider.update(update_request(inputs.clone())).await.unwrap();
        assert_eq!(provider.api.patches.lock().unwrap().len(), 2);

        provider.update(update_request(inputs)).await.unwrap();
        assert_eq!(provider.api.patches.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_rejects_rename() {
        let provider = ExternalLocationProvider::new(InMemoryCatalog::new(Some(existing())));
        let err = provider
            .update(update_request(json!({
                "name": "other",
                "url": "s3://foo/bar",
                "credential_name": "abc",
            })))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Renaming external location abc to other is not supported"
        );
    }

    #[tokio::test]
    async fn read_missing_location() {
        let provider = ExternalLocationProvider::new(InMemoryCatalog::new(None));
        let err = provider
            .read(v0::ReadResourceRequest {
                resource: extant(json!({ "name": "abc" })),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Could not read external location abc");
        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert!(api_error.is_not_found());
    }

    #[tokio::test]
    async fn unknown_resource_type() {
        let provider = ExternalLocationProvider::new(InMemoryCatalog::new(None));
        let err = provider
            .create(v0::CreateResourceRequest {
                type_: v0::ResourceType("storage_credential".to_string()),
                input_properties: v0::InputProperties::default(),
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "ExternalLocationProvider::create: unknown resource type: storage_credential"
        );
    }
}
