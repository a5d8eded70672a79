//! Splitting an update into remote calls.
//!
//! The catalog API can not change the owner of a location together with its
//! other attributes, so an update becomes up to two partial updates. The owner
//! call always goes first: it determines what the caller may do afterwards.

use crate::external_location::{ExternalLocationState, LocationAttributes, UpdateExternalLocation};

/// One partial update of an external location.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateCall {
    /// Change the owner, and nothing else.
    Owner { owner: String },
    /// Replace all non-owner attributes.
    Attributes {
        attributes: LocationAttributes,
        force: bool,
    },
}

impl UpdateCall {
    pub fn is_owner(&self) -> bool {
        matches!(self, UpdateCall::Owner { .. })
    }

    /// The request body for this call.
    pub fn to_request(&self) -> UpdateExternalLocation {
        match self {
            UpdateCall::Owner { owner } => UpdateExternalLocation {
                owner: Some(owner.clone()),
                ..Default::default()
            },
            UpdateCall::Attributes { attributes, force } => UpdateExternalLocation {
                url: Some(attributes.url.clone()),
                credential_name: Some(attributes.credential_name.clone()),
                comment: attributes.comment.clone(),
                owner: None,
                read_only: attributes.read_only,
                access_point: attributes.access_point.clone(),
                encryption_details: attributes.encryption_details.clone(),
                skip_validation: attributes.skip_validation,
                fallback: attributes.fallback,
                force: *force,
            },
        }
    }
}

/// Compute the calls that bring `observed` to `desired`, in execution order.
///
/// `force` only affects the attribute call; it never causes a call by itself.
pub fn plan(
    observed: &ExternalLocationState,
    desired: &ExternalLocationState,
    force: bool,
) -> Vec<UpdateCall> {
    let mut calls = Vec::with_capacity(2);

    if let Some(owner) = &desired.owner {
        if observed.owner.as_ref() != Some(owner) {
            calls.push(UpdateCall::Owner {
                owner: owner.clone(),
            });
        }
    }

    if desired.attributes.differs_from(&observed.attributes) {
        calls.push(UpdateCall::Attributes {
            attributes: desired.attributes.clone(),
            force,
        });
    }

    calls
}
