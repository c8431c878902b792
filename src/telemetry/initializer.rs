// SPDX-License-Identifier: MIT
//! Record initializers applied before the processor chain.
//!
//! The pipeline may apply initializers in any order and, in edge cases, more than
//! once per record, so each one must be idempotent and independent of the others.
use super::record::{TelemetryData, TelemetryRecord};

/// Property set on requests whose 4xx response was recoded as successful.
pub const OVERRIDDEN_400S: &str = "Overridden400s";
pub const DEFAULT_CUSTOM_PROPERTY_KEY: &str = "customProp";
pub const DEFAULT_CUSTOM_PROPERTY_VALUE: &str = "customValue";

pub trait TelemetryInitializer: Send + Sync {
    fn initialize(&self, record: &mut TelemetryRecord);
}

/// Marks 4xx request records as successful so that expected client errors do not
/// count against availability, while keeping them filterable by [`OVERRIDDEN_400S`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Convert4xxToSuccess;

impl TelemetryInitializer for Convert4xxToSuccess {
    fn initialize(&self, record: &mut TelemetryRecord) {
        let TelemetryData::Request(request) = &mut record.data else {
            return;
        };
        let Ok(code) = request.response_code.trim().parse::<i32>() else {
            return;
        };

        if (400..500).contains(&code) {
            request.success = Some(true);
            record
                .properties
                .insert(OVERRIDDEN_400S.to_string(), "true".to_string());
        }
    }
}

/// Adds a fixed property to every record, never replacing an existing value.
#[derive(Clone, Debug)]
pub struct CustomPropertyInitializer {
    key: String,
    value: String,
}

impl CustomPropertyInitializer {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Default for CustomPropertyInitializer {
    fn default() -> Self {
        Self::new(DEFAULT_CUSTOM_PROPERTY_KEY, DEFAULT_CUSTOM_PROPERTY_VALUE)
    }
}

impl TelemetryInitializer for CustomPropertyInitializer {
    fn initialize(&self, record: &mut TelemetryRecord) {
        record
            .properties
            .entry(self.key.clone())
            .or_insert_with(|| self.value.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn request(code: &str) -> TelemetryRecord {
        TelemetryRecord::request("GET /status", code, Duration::from_millis(2))
    }

    #[test]
    fn recodes_client_errors_as_success() {
        for code in ["400", "404", "499", " 418 "] {
            let mut record = request(code);
            Convert4xxToSuccess.initialize(&mut record);

            assert_eq!(record.as_request().and_then(|r| r.success), Some(true), "code {code}");
            assert_eq!(record.properties.get(OVERRIDDEN_400S).map(String::as_str), Some("true"));
        }
    }

    #[test]
    fn leaves_other_codes_untouched() {
        for code in ["200", "399", "500", "503", "abc", "", "4O4"] {
            let mut record = request(code);
            let before = record.clone();
            Convert4xxToSuccess.initialize(&mut record);
            assert_eq!(record, before, "code {code:?}");
        }
    }

    #[test]
    fn does_not_clear_success_already_decided() {
        let mut record = request("503");
        if let TelemetryData::Request(data) = &mut record.data {
            data.success = Some(true);
        }
        Convert4xxToSuccess.initialize(&mut record);
        assert_eq!(record.as_request().and_then(|r| r.success), Some(true));
    }

    #[test]
    fn ignores_non_request_records() {
        let mut record = TelemetryRecord::dependency("db", "SQL", "orders", Some(false), Duration::from_millis(120))
            .with_property("resultCode", "404");
        let before = record.clone();
        Convert4xxToSuccess.initialize(&mut record);
        assert_eq!(record, before);
    }

    #[test]
    fn custom_property_never_overwrites() {
        let mut record = TelemetryRecord::event("checkout").with_property(DEFAULT_CUSTOM_PROPERTY_KEY, "mine");
        CustomPropertyInitializer::default().initialize(&mut record);
        assert_eq!(record.properties.get(DEFAULT_CUSTOM_PROPERTY_KEY).map(String::as_str), Some("mine"));
    }

    #[test]
    fn initializers_are_idempotent() {
        let custom = CustomPropertyInitializer::default();
        let mut once = request("404");
        custom.initialize(&mut once);
        Convert4xxToSuccess.initialize(&mut once);

        let mut twice = once.clone();
        Convert4xxToSuccess.initialize(&mut twice);
        custom.initialize(&mut twice);
        custom.initialize(&mut twice);

        assert_eq!(once, twice);
        assert_eq!(twice.properties.get(DEFAULT_CUSTOM_PROPERTY_KEY).map(String::as_str), Some("customValue"));
    }
}
