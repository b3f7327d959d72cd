use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Property key asking the CAS server to force a fresh login.
pub const RENEW: &str = "renew";

/// Data carried across the login round trip inside the protected `state` parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationProperties {
    /// Where the user goes once the callback has been processed.
    pub redirect_uri: Option<String>,
    pub items: BTreeMap<String, String>,
}

impl AuthenticationProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redirect_uri(redirect_uri: impl Into<String>) -> Self {
        AuthenticationProperties {
            redirect_uri: Some(redirect_uri.into()),
            items: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.items.remove(key)
    }

    pub fn renew(&self) -> bool {
        self.get(RENEW) == Some("true")
    }
}
