// ── Device identity ──

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Normalized Bluetooth device address, the key of both registries.
///
/// Normalization matches the backend: surrounding whitespace is trimmed,
/// hex digits are uppercased and `-` separators become `:`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase().replace('-', ":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for six colon-separated hex octets.
    pub fn is_well_formed(&self) -> bool {
        let octets: Vec<&str> = self.0.split(':').collect();
        octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for MacAddress {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for MacAddress {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_separators() {
        let mac = MacAddress::new(" aa-bb-cc-dd-ee-0f ");
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:0F");
        assert_eq!(mac, MacAddress::new("AA:BB:CC:DD:EE:0F"));
    }

    #[test]
    fn well_formed_check() {
        assert!(MacAddress::new("aa:bb:cc:dd:ee:ff").is_well_formed());
        assert!(!MacAddress::new("aa:bb:cc").is_well_formed());
        assert!(!MacAddress::new("zz:bb:cc:dd:ee:ff").is_well_formed());
    }

    #[test]
    fn deserializes_through_normalization() {
        let mac: MacAddress = serde_json::from_str("\"aa:bb:cc:dd:ee:ff\"").unwrap();
        assert_eq!(mac.as_str(), "AA:BB:CC:DD:EE:FF");
    }
}
