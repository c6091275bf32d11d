//! Caller identity attached to every remote call.

use std::collections::{BTreeMap, BTreeSet};

use crate::errors::{FileEngineError, Result};
use crate::protocol::messages::CallMeta;

/// Tenant used when none is given.
pub const DEFAULT_TENANT: &str = "default";

/// Immutable bundle of username, roles, claims and tenant.
///
/// There are no setters: a different identity needs a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityContext {
    username: String,
    roles: BTreeSet<String>,
    claims: BTreeSet<String>,
    tenant: String,
}

impl IdentityContext {
    /// Build an identity. An empty `tenant` selects [`DEFAULT_TENANT`].
    ///
    /// Fails with [`FileEngineError::InvalidIdentity`] when the username is
    /// empty or whitespace. A non-blank username is kept exactly as given.
    pub fn new<R, C>(username: &str, roles: R, claims: C, tenant: &str) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        if username.trim().is_empty() {
            return Err(FileEngineError::InvalidIdentity(
                "username must not be empty".to_string(),
            ));
        }

        let tenant = tenant.trim();
        Ok(Self {
            username: username.to_string(),
            roles: roles.into_iter().map(Into::into).collect(),
            claims: claims.into_iter().map(Into::into).collect(),
            tenant: if tenant.is_empty() {
                DEFAULT_TENANT.to_string()
            } else {
                tenant.to_string()
            },
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn claims(&self) -> impl Iterator<Item = &str> {
        self.claims.iter().map(String::as_str)
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Render as call metadata. Each claim maps to itself.
    pub fn to_meta(&self) -> CallMeta {
        CallMeta {
            user: self.username.clone(),
            roles: self.roles.iter().cloned().collect(),
            claims: self
                .claims
                .iter()
                .map(|c| (c.clone(), c.clone()))
                .collect::<BTreeMap<_, _>>(),
            tenant: self.tenant.clone(),
        }
    }
}
