//! S3 bucket and credential configuration.

use serde::Deserialize;

/// S3 connection settings.
///
/// An incomplete section leaves the gateway in a non-exceptional
/// "not configured" state; see [`S3Config::is_configured`].
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Config {
    /// Bucket receiving archive objects.
    #[serde(default)]
    pub bucket: String,

    /// Bucket region.
    #[serde(default)]
    pub region: Option<S3Region>,

    /// AWS access key ID. Ignored when `use_sdk_credentials` is set.
    #[serde(default)]
    pub key_id: Option<String>,

    /// AWS secret access key. Ignored when `use_sdk_credentials` is set.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Resolve credentials from the SDK's ambient chain (environment,
    /// shared config, instance profile) instead of explicit keys.
    #[serde(default)]
    pub use_sdk_credentials: bool,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("key_id", &self.key_id.as_ref().map(|_| "****"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "****"))
            .field("use_sdk_credentials", &self.use_sdk_credentials)
            .finish()
    }
}

impl S3Config {
    /// True iff bucket, region, and a credential source are all present.
    pub fn is_configured(&self) -> bool {
        if self.bucket.is_empty() {
            return false;
        }

        if self.region.is_none() {
            return false;
        }

        if !self.use_sdk_credentials
            && (self.key_id.as_deref().unwrap_or("").is_empty()
                || self.secret_key.as_deref().unwrap_or("").is_empty())
        {
            return false;
        }

        true
    }
}

/// Supported bucket regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum S3Region {
    #[serde(rename = "us-east-1")]
    UsEast1,
    #[serde(rename = "us-east-2")]
    UsEast2,
    #[serde(rename = "us-west-1")]
    UsWest1,
    #[serde(rename = "us-west-2")]
    UsWest2,
    #[serde(rename = "ap-northeast-1")]
    ApNortheast1,
    #[serde(rename = "ap-northeast-2")]
    ApNortheast2,
    #[serde(rename = "ap-southeast-1")]
    ApSoutheast1,
    #[serde(rename = "ap-southeast-2")]
    ApSoutheast2,
    #[serde(rename = "eu-central-1")]
    EuCentral1,
    #[serde(rename = "eu-west-1")]
    EuWest1,
}

impl S3Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            S3Region::UsEast1 => "us-east-1",
            S3Region::UsEast2 => "us-east-2",
            S3Region::UsWest1 => "us-west-1",
            S3Region::UsWest2 => "us-west-2",
            S3Region::ApNortheast1 => "ap-northeast-1",
            S3Region::ApNortheast2 => "ap-northeast-2",
            S3Region::ApSoutheast1 => "ap-southeast-1",
            S3Region::ApSoutheast2 => "ap-southeast-2",
            S3Region::EuCentral1 => "eu-central-1",
            S3Region::EuWest1 => "eu-west-1",
        }
    }
}

impl std::fmt::Display for S3Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> S3Config {
        S3Config {
            bucket: "log-archive".into(),
            region: Some(S3Region::ApSoutheast2),
            key_id: Some("AKIAEXAMPLE".into()),
            secret_key: Some("wJalrXUtnFEMIEXAMPLEKEY".into()),
            use_sdk_credentials: false,
        }
    }

    #[test]
    fn test_fully_configured() {
        assert!(configured().is_configured());
    }

    #[test]
    fn test_missing_bucket_not_configured() {
        let config = S3Config {
            bucket: String::new(),
            ..configured()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn test_missing_region_not_configured() {
        let config = S3Config {
            region: None,
            ..configured()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn test_missing_credentials_not_configured() {
        let config = S3Config {
            key_id: None,
            ..configured()
        };
        assert!(!config.is_configured());

        let config = S3Config {
            secret_key: Some(String::new()),
            ..configured()
        };
        assert!(!config.is_configured());
    }

    #[test]
    fn test_sdk_credentials_stand_in_for_keys() {
        let config = S3Config {
            key_id: None,
            secret_key: None,
            use_sdk_credentials: true,
            ..configured()
        };
        assert!(config.is_configured());
    }

    #[test]
    fn test_region_parse() {
        let config: S3Config = toml::from_str(
            r#"
            bucket = "b"
            region = "us-west-2"
            "#,
        )
        .unwrap();
        assert_eq!(config.region, Some(S3Region::UsWest2));
        assert_eq!(config.region.unwrap().to_string(), "us-west-2");
    }

    #[test]
    fn test_unsupported_region_rejected() {
        let result: Result<S3Config, _> = toml::from_str(
            r#"
            bucket = "b"
            region = "mars-north-1"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let output = format!("{:?}", configured());
        assert!(output.contains("****"));
        assert!(!output.contains("AKIAEXAMPLE"));
        assert!(!output.contains("wJalrXUtnFEMI"));
        assert!(output.contains("log-archive"));
    }
}
