//! Claims-based identity built from what the CAS server asserted.

use serde::{Deserialize, Serialize};

use crate::error::{CasError, Result};

pub mod claim_types {
    pub const NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";
    pub const NAME_IDENTIFIER: &str =
        "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    /// Authentication type that issued the claim, unset for server attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Claim {
            claim_type: claim_type.into(),
            value: value.into(),
            issuer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub authentication_type: String,
    pub name_claim_type: String,
    claims: Vec<Claim>,
}

impl Identity {
    pub fn new(authentication_type: impl Into<String>, name_claim_type: impl Into<String>) -> Self {
        Identity {
            authentication_type: authentication_type.into(),
            name_claim_type: name_claim_type.into(),
            claims: Vec::new(),
        }
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// Claims in the order they were added.
    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    pub fn name(&self) -> Option<&str> {
        self.find_first(&self.name_claim_type)
    }

    pub fn name_identifier(&self) -> Option<&str> {
        self.find_first(claim_types::NAME_IDENTIFIER)
    }

    /// Same claims, different authentication type.
    pub fn with_authentication_type(self, authentication_type: impl Into<String>) -> Self {
        Identity {
            authentication_type: authentication_type.into(),
            ..self
        }
    }
}

/// Collects a validated principal and its attributes into an [`Identity`].
pub struct IdentityBuilder<'a> {
    authentication_type: &'a str,
    name_claim_type: &'a str,
    user: String,
    attributes: Vec<(String, String)>,
    name_identifier_attribute: Option<&'a str>,
}

impl<'a> IdentityBuilder<'a> {
    pub fn new(authentication_type: &'a str, name_claim_type: &'a str, user: impl Into<String>) -> Self {
        IdentityBuilder {
            authentication_type,
            name_claim_type,
            user: user.into(),
            attributes: Vec::new(),
            name_identifier_attribute: None,
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Take the name identifier from this attribute instead of the principal name.
    pub fn name_identifier_attribute(mut self, attribute: Option<&'a str>) -> Self {
        self.name_identifier_attribute = attribute;
        self
    }

    /// Fails when the configured name identifier attribute was not asserted.
    pub fn build(self) -> Result<Identity> {
        let name_identifier = match self.name_identifier_attribute {
            Some(wanted) => self
                .attributes
                .iter()
                .find(|(name, _)| name == wanted)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| CasError::MissingNameIdentifier {
                    attribute: wanted.to_string(),
                    user: self.user.clone(),
                })?,
            None => self.user.clone(),
        };

        let issued = |claim_type: &str, value: String| Claim {
            claim_type: claim_type.to_string(),
            value,
            issuer: Some(self.authentication_type.to_string()),
        };

        let mut identity = Identity::new(self.authentication_type, self.name_claim_type);
        identity.add_claim(issued(claim_types::NAME, self.user.clone()));
        for (name, value) in &self.attributes {
            identity.add_claim(Claim::new(name.as_str(), value.as_str()));
        }
        identity.add_claim(issued(claim_types::NAME_IDENTIFIER, name_identifier));
        Ok(identity)
    }
}
