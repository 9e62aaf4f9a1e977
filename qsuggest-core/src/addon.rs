use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Signature state of an add-on package.
///
/// In-development builds carry no signature (`Missing`), production builds of system add-ons
/// are `Privileged`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SignedState {
    #[default]
    Missing,
    Signed,
    Privileged,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_parse_signed_state() {
        assert_eq!(SignedState::Privileged, SignedState::from_str("privileged").unwrap());
        assert_eq!("missing", SignedState::Missing.to_string());
        assert!(SignedState::from_str("unsigned").is_err());
    }
}
