//! Transport configuration.

use std::path::PathBuf;

/// Push provider settings.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub ios_enabled: bool,
    /// PKCS#12 APNs certificate.
    pub apn_certificate_path: Option<PathBuf>,
    pub apn_certificate_password: String,
    pub apn_use_production: bool,

    pub android_enabled: bool,
    pub gcm_sender_id: String,
    pub gcm_auth_token: String,
    pub gcm_package_name: String,
}
