//! External location types: the wire format of the catalog API, and the
//! typed resource state the planner compares.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RESOURCE_TYPE: &str = "external_location";

/// An external location as returned by the catalog API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalLocationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metastore_id: Option<String>,
}

/// Body of `POST /api/2.1/unity-catalog/external-locations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateExternalLocation {
    pub name: String,
    pub url: String,
    pub credential_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_validation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

/// Body of `PATCH /api/2.1/unity-catalog/external-locations/{name}`.
///
/// Absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateExternalLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_validation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub force: bool,
}

/// Everything except the owner. The API replaces these as one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationAttributes {
    pub url: String,
    pub credential_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_validation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

impl LocationAttributes {
    /// Whether applying `self` as the desired bundle would change `observed`.
    ///
    /// Optional attributes that `self` leaves unset are not managed and never
    /// count as a change. `skip_validation` is a request flag the server does
    /// not report back, so it rides along but is never compared.
    pub fn differs_from(&self, observed: &LocationAttributes) -> bool {
        fn managed<T: PartialEq>(desired: &Option<T>, observed: &Option<T>) -> bool {
            desired.is_some() && desired != observed
        }
        self.url != observed.url
            || self.credential_name != observed.credential_name
            || managed(&self.comment, &observed.comment)
            || managed(&self.read_only, &observed.read_only)
            || managed(&self.access_point, &observed.access_point)
            || managed(&self.encryption_details, &observed.encryption_details)
            || managed(&self.fallback, &observed.fallback)
    }
}

/// The state of one external location, either observed or desired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalLocationState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(flatten)]
    pub attributes: LocationAttributes,
}

impl From<ExternalLocationInfo> for ExternalLocationState {
    fn from(info: ExternalLocationInfo) -> Self {
        ExternalLocationState {
            name: info.name.unwrap_or_default(),
            owner: info.owner,
            attributes: LocationAttributes {
                url: info.url.unwrap_or_default(),
                credential_name: info.credential_name.unwrap_or_default(),
                comment: info.comment,
                read_only: info.read_only,
                access_point: info.access_point,
                encryption_details: info.encryption_details,
                // Not reported back by the server.
                skip_validation: None,
                fallback: info.fallback,
            },
        }
    }
}

/// The input properties of an `external_location` resource.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExternalLocationInProperties {
    #[serde(flatten)]
    pub state: ExternalLocationState,
    #[serde(default)]
    pub force_update: bool,
}

impl ExternalLocationInProperties {
    pub fn parse(input_properties: &Map<String, Value>) -> Result<Self> {
        let parsed: Self = serde_json::from_value(Value::Object(input_properties.clone()))
            .with_context(|| {
                format!(
                    "Could not deserialize input properties for {} resource",
                    RESOURCE_TYPE
                )
            })?;
        if parsed.state.name.is_empty() {
            bail!("{} resource requires a non-empty name", RESOURCE_TYPE);
        }
        Ok(parsed)
    }

    pub fn to_create_request(&self) -> CreateExternalLocation {
        let a = &self.state.attributes;
        CreateExternalLocation {
            name: self.state.name.clone(),
            url: a.url.clone(),
            credential_name: a.credential_name.clone(),
            comment: a.comment.clone(),
            read_only: a.read_only,
            access_point: a.access_point.clone(),
            encryption_details: a.encryption_details.clone(),
            skip_validation: a.skip_validation,
            fallback: a.fallback,
        }
    }
}

/// Render what the server reported as output properties.
pub fn output_properties(info: &ExternalLocationInfo) -> Result<Map<String, Value>> {
    match serde_json::to_value(info)? {
        Value::Object(o) => Ok(o),
        _ => bail!("Expected object as output"),
    }
}
