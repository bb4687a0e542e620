use agrotrace_core::error::AgroError;
use agrotrace_core::types::Principal;
use serde::{Deserialize, Serialize};

/// Identities seeded into the permission sets of a fresh store.
///
/// Nothing in the call surface can create the first admin, so every
/// deployment starts from one of these. In JSON the principals are base-58
/// strings:
///
/// ```json
/// { "admins": ["4vJ9..."], "verifiers": [] }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapParams {
    pub admins: Vec<Principal>,
    #[serde(default)]
    pub verifiers: Vec<Principal>,
}

impl BootstrapParams {
    pub fn from_json(text: &str) -> Result<Self, AgroError> {
        serde_json::from_str(text).map_err(|e| AgroError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base58_lists() {
        let admin = Principal::derive("admin");
        let text = format!(r#"{{"admins":["{}"]}}"#, admin.to_b58());
        let params = BootstrapParams::from_json(&text).unwrap();
        assert_eq!(params.admins, vec![admin]);
        assert!(params.verifiers.is_empty());
    }

    #[test]
    fn rejects_malformed_principal() {
        let err = BootstrapParams::from_json(r#"{"admins":["not-base58!"]}"#).unwrap_err();
        assert!(matches!(err, AgroError::Serialization(_)));
    }
}
