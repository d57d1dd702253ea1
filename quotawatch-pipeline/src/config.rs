//! Limits configuration and per-limit override directives.
//!
//! The configuration is a YAML document:
//!
//! ```yaml
//! services:
//!   - name: VPC
//!     limits:
//!       - name: VPCs
//!         value: 50
//!         warn_percent: 70
//!         crit_percent: 90
//! skip:
//!   - Lambda
//! ta_refresh_mode: 21600
//! ta_refresh_timeout: 1800
//! ```
//!
//! Override entries are kept as raw values until [`parse_override`] validates
//! them one by one, so a malformed entry never prevents the others from
//! being applied.

use std::fmt;
use std::time::Duration;

use config::{Config, ConfigError, File, FileFormat, Source};
use quotawatch_types::ThresholdParams;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::error;

use crate::error::PipelineError;
use crate::provider::TrustedAdvisorPolicy;

/// Decoded limits configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LimitsConfig {
    #[serde(default)]
    pub services: Vec<ServiceConfig>,

    /// Services removed before usage is collected.
    #[serde(default)]
    pub skip: Vec<String>,

    /// Maximum age of trusted-advisor data, in seconds.
    #[serde(default)]
    pub ta_refresh_mode: Option<u64>,

    /// Upper bound on a provider refresh, in seconds.
    #[serde(default)]
    pub ta_refresh_timeout: Option<u64>,
}

/// One service and its raw override entries.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub limits: Vec<Value>,
}

impl LimitsConfig {
    /// Decode a YAML payload.
    ///
    /// A missing, blank or comment-only payload is an error, as is anything
    /// that does not decode into the expected shape.
    pub fn decode(payload: Option<&str>) -> Result<Self, PipelineError> {
        let text = payload
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| PipelineError::ConfigDecode("configuration payload is empty".into()))?;

        let decode_error = |e: ConfigError| PipelineError::ConfigDecode(e.to_string());
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Yaml))
            .build()
            .map_err(decode_error)?;

        // A document of only comments decodes to an empty table.
        if config.collect().map_err(decode_error)?.is_empty() {
            return Err(PipelineError::ConfigDecode(
                "configuration payload has no entries".into(),
            ));
        }

        config.try_deserialize().map_err(decode_error)
    }

    /// Validate every override entry.
    ///
    /// Invalid entries are logged and skipped; the second value is how many
    /// were skipped.
    pub fn overrides(&self) -> (Vec<LimitOverride>, usize) {
        let mut overrides = Vec::new();
        let mut skipped = 0;

        for service in &self.services {
            for raw in &service.limits {
                match parse_override(service.name.as_deref(), raw) {
                    Ok(limit) => overrides.push(limit),
                    Err(e) => {
                        error!(error = %e, "Skipping invalid limit override");
                        skipped += 1;
                    }
                }
            }
        }

        (overrides, skipped)
    }

    /// Trusted-advisor policy, with defaults for unset fields.
    pub fn trusted_advisor_policy(&self) -> TrustedAdvisorPolicy {
        let defaults = TrustedAdvisorPolicy::default();
        TrustedAdvisorPolicy {
            refresh_mode: self
                .ta_refresh_mode
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_mode),
            refresh_timeout: self
                .ta_refresh_timeout
                .map(Duration::from_secs)
                .unwrap_or(defaults.refresh_timeout),
        }
    }
}

/// A validated override for one limit.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitOverride {
    pub service_name: String,
    pub limit_name: String,
    pub value: u64,
    pub warn_percent: Option<f64>,
    pub crit_percent: Option<f64>,
    pub warn_count: Option<u64>,
    pub crit_count: Option<u64>,
    pub override_ta: bool,
}

impl LimitOverride {
    /// Threshold parameters from whichever threshold fields are set.
    pub fn threshold_params(&self) -> ThresholdParams {
        ThresholdParams {
            warn_percent: self.warn_percent,
            crit_percent: self.crit_percent,
            warn_count: self.warn_count,
            crit_count: self.crit_count,
        }
    }
}

impl fmt::Display for LimitOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} value={} warn={}% crit={}% warn_count={} crit_count={}",
            self.service_name,
            self.limit_name,
            self.value,
            OptDisplay(self.warn_percent),
            OptDisplay(self.crit_percent),
            OptDisplay(self.warn_count),
            OptDisplay(self.crit_count),
        )
    }
}

struct OptDisplay<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for OptDisplay<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => v.fmt(f),
            None => f.write_str("-"),
        }
    }
}

/// Validate one raw override entry for a service.
///
/// The entry needs a non-empty `name` and an integer `value`, and the
/// service needs a non-empty name. Optional fields must have the right type:
/// percentages within 0-100, counts and the value non-negative.
pub fn parse_override(
    service_name: Option<&str>,
    raw: &Value,
) -> Result<LimitOverride, PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidOverrideEntry {
        service: service_name.map(str::to_string),
        reason: reason.to_string(),
    };

    let entry = raw
        .as_object()
        .ok_or_else(|| invalid("entry must be a mapping"))?;

    let limit_name = entry
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| invalid("limit must have a name"))?;

    let service_name = service_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| invalid("limit must have a service name"))?;

    let value = match field(entry, "value") {
        None => return Err(invalid("limit must have a value")),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| invalid("value must be a non-negative integer"))?,
    };

    let percent = |key: &str| -> Result<Option<f64>, PipelineError> {
        match field(entry, key) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .filter(|p| (0.0..=100.0).contains(p))
                .map(Some)
                .ok_or_else(|| invalid(&format!("{} must be a number between 0 and 100", key))),
        }
    };

    let count = |key: &str| -> Result<Option<u64>, PipelineError> {
        match field(entry, key) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(&format!("{} must be a non-negative integer", key))),
        }
    };

    let override_ta = match field(entry, "override_ta") {
        None => false,
        Some(v) => v
            .as_bool()
            .ok_or_else(|| invalid("override_ta must be a boolean"))?,
    };

    Ok(LimitOverride {
        service_name: service_name.to_string(),
        limit_name: limit_name.to_string(),
        value,
        warn_percent: percent("warn_percent")?,
        crit_percent: percent("crit_percent")?,
        warn_count: count("warn_count")?,
        crit_count: count("crit_count")?,
        override_ta,
    })
}

// Present and not null.
fn field<'a>(entry: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    entry.get(key).filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_full_entry() {
        let raw = json!({
            "name": "VPCs",
            "value": 50,
            "warn_percent": 70,
            "crit_percent": 90,
            "warn_count": 3,
            "crit_count": 1,
            "override_ta": true,
        });

        let limit = parse_override(Some("VPC"), &raw).unwrap();
        assert_eq!(
            limit,
            LimitOverride {
                service_name: "VPC".to_string(),
                limit_name: "VPCs".to_string(),
                value: 50,
                warn_percent: Some(70.0),
                crit_percent: Some(90.0),
                warn_count: Some(3),
                crit_count: Some(1),
                override_ta: true,
            }
        );
    }

    #[test]
    fn parse_minimal_entry() {
        let raw = json!({ "name": "Rules per VPC security group", "value": 120 });

        let limit = parse_override(Some("EC2"), &raw).unwrap();
        assert_eq!(limit.value, 120);
        assert_eq!(limit.warn_percent, None);
        assert_eq!(limit.crit_count, None);
        assert!(!limit.override_ta);
        assert!(limit.threshold_params().is_empty());
    }

    #[test]
    fn explicit_nulls_count_as_absent() {
        let raw = json!({ "name": "VPCs", "value": 5, "warn_percent": null, "override_ta": null });

        let limit = parse_override(Some("VPC"), &raw).unwrap();
        assert_eq!(limit.warn_percent, None);
        assert!(!limit.override_ta);
    }

    #[test]
    fn missing_name_fails() {
        let err = parse_override(Some("VPC"), &json!({ "value": 5 })).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidOverrideEntry { ref reason, .. } if reason == "limit must have a name"
        ));

        let err = parse_override(Some("VPC"), &json!({ "name": "", "value": 5 })).unwrap_err();
        assert!(err.to_string().contains("limit must have a name"));
    }

    #[test]
    fn missing_service_fails() {
        let raw = json!({ "name": "VPCs", "value": 5 });

        let err = parse_override(None, &raw).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidOverrideEntry { service: None, ref reason } if reason == "limit must have a service name"
        ));
        assert!(err.to_string().contains("<missing>"));

        assert!(parse_override(Some(""), &raw).is_err());
    }

    #[test]
    fn missing_value_fails() {
        let err = parse_override(Some("VPC"), &json!({ "name": "VPCs" })).unwrap_err();
        assert!(err.to_string().contains("limit must have a value"));

        let err =
            parse_override(Some("VPC"), &json!({ "name": "VPCs", "value": null })).unwrap_err();
        assert!(err.to_string().contains("limit must have a value"));
    }

    #[test]
    fn name_is_checked_before_service_and_value() {
        let err = parse_override(None, &json!({})).unwrap_err();
        assert!(err.to_string().contains("limit must have a name"));
    }

    #[test]
    fn wrongly_typed_fields_fail() {
        let cases = [
            json!({ "name": "VPCs", "value": "fifty" }),
            json!({ "name": "VPCs", "value": -1 }),
            json!({ "name": "VPCs", "value": 5.5 }),
            json!({ "name": "VPCs", "value": 5, "warn_percent": 120 }),
            json!({ "name": "VPCs", "value": 5, "crit_percent": -3 }),
            json!({ "name": "VPCs", "value": 5, "warn_count": "many" }),
            json!({ "name": "VPCs", "value": 5, "override_ta": "yes" }),
            json!({ "name": 7, "value": 5 }),
            json!(["VPCs", 5]),
        ];

        for raw in cases {
            assert!(parse_override(Some("VPC"), &raw).is_err(), "{raw} should fail");
        }
    }

    #[test]
    fn decode_yaml() {
        let yaml = r#"
services:
  - name: VPC
    limits:
      - name: VPCs
        value: 50
        warn_percent: 70
        crit_percent: 90
  - name: EC2
    limits:
      - name: Running On-Demand Instances
        value: 200
        override_ta: true
skip:
  - Lambda
  - CloudFormation
ta_refresh_mode: 3600
"#;

        let config = LimitsConfig::decode(Some(yaml)).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.skip, vec!["Lambda", "CloudFormation"]);

        let (overrides, skipped) = config.overrides();
        assert_eq!(skipped, 0);
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].service_name, "VPC");
        assert_eq!(overrides[0].warn_percent, Some(70.0));
        assert_eq!(overrides[1].limit_name, "Running On-Demand Instances");
        assert!(overrides[1].override_ta);

        let policy = config.trusted_advisor_policy();
        assert_eq!(policy.refresh_mode, Duration::from_secs(3600));
        assert_eq!(
            policy.refresh_timeout,
            TrustedAdvisorPolicy::DEFAULT_REFRESH_TIMEOUT
        );
    }

    #[test]
    fn invalid_entries_are_skipped_not_fatal() {
        let yaml = r#"
services:
  - name: VPC
    limits:
      - name: VPCs
      - name: Internet gateways
        value: 10
  - limits:
      - name: Orphan
        value: 1
"#;

        let config = LimitsConfig::decode(Some(yaml)).unwrap();
        let (overrides, skipped) = config.overrides();

        assert_eq!(skipped, 2);
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].limit_name, "Internet gateways");
    }

    #[test]
    fn empty_payload_fails() {
        assert!(matches!(
            LimitsConfig::decode(None),
            Err(PipelineError::ConfigDecode(_))
        ));
        assert!(matches!(
            LimitsConfig::decode(Some("   \n")),
            Err(PipelineError::ConfigDecode(_))
        ));
    }

    #[test]
    fn comment_only_payload_fails() {
        let payload = "# services:\n#   - name: VPC\n#     limits: []\n";
        assert!(matches!(
            LimitsConfig::decode(Some(payload)),
            Err(PipelineError::ConfigDecode(_))
        ));
        assert!(matches!(
            LimitsConfig::decode(Some("~")),
            Err(PipelineError::ConfigDecode(_))
        ));
    }

    #[test]
    fn malformed_payload_fails() {
        assert!(matches!(
            LimitsConfig::decode(Some("services: [unclosed")),
            Err(PipelineError::ConfigDecode(_))
        ));
        assert!(matches!(
            LimitsConfig::decode(Some("services: 12")),
            Err(PipelineError::ConfigDecode(_))
        ));
    }

    #[test]
    fn display_shows_unset_fields() {
        let limit = parse_override(
            Some("VPC"),
            &json!({ "name": "VPCs", "value": 50, "warn_percent": 70 }),
        )
        .unwrap();
        assert_eq!(
            limit.to_string(),
            "VPC/VPCs value=50 warn=70% crit=-% warn_count=- crit_count=-"
        );
    }
}
