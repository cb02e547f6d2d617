use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A wrapper for customer contact data that masks its value in Debug and Display output.
///
/// Serialization is transparent so persisted offers round-trip the real value;
/// the wrapper only exists to keep phone numbers and names out of `tracing` fields.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Masked<String> {
    /// Last `visible` characters with the rest starred, e.g. `******4321`.
    pub fn tail(&self, visible: usize) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        let hidden = chars.len().saturating_sub(visible);
        let mut out = "*".repeat(hidden);
        out.extend(&chars[hidden..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_logs() {
        let phone = Masked("+15550104321".to_string());
        assert_eq!(format!("{:?}", phone), "********");
        assert_eq!(format!("{}", phone), "********");
        assert_eq!(phone.tail(4), "********4321");
    }

    #[test]
    fn test_masked_serializes_real_value() {
        let phone = Masked("555-0100".to_string());
        assert_eq!(serde_json::to_string(&phone).unwrap(), "\"555-0100\"");
        let back: Masked<String> = serde_json::from_str("\"555-0100\"").unwrap();
        assert_eq!(back, phone);
    }
}
