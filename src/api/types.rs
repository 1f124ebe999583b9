//! Response and request shapes of the backend.
//!
//! Timestamps and ids are kept as the strings the backend sends; the
//! client only displays them.

use serde::{Deserialize, Serialize};

/// Name + uuid pair the backend embeds wherever it references another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub name: String,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub email: String,
    #[serde(default)]
    pub last_login: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub access_level: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub access_level: i32,
    #[serde(default)]
    pub users: Vec<BasicInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthClientInfo {
    pub name: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub additional_redirect_uris: Vec<String>,
    #[serde(default)]
    pub default_scope: String,
    #[serde(default)]
    pub group_access: Vec<BasicInfo>,
    #[serde(default)]
    pub user_access: Vec<BasicInfo>,
    #[serde(default)]
    pub confidential: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthScope {
    pub uuid: String,
    pub name: String,
    pub scope: String,
    #[serde(default)]
    pub policy: Vec<BasicInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthPolicy {
    pub uuid: String,
    pub name: String,
    pub claim: String,
    pub default: String,
    /// Per-group override of the claim value.
    #[serde(default)]
    pub group: Vec<(BasicInfo, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passkey {
    pub name: String,
    pub created: String,
    pub used: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub o_auth_instant_confirm: bool,
}

/// Profile details for a single account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uuid: String,
    #[serde(default)]
    pub last_login: String,
    #[serde(default)]
    pub last_special_access: String,
    #[serde(default)]
    pub totp_enabled: bool,
    pub totp_created: Option<String>,
    pub totp_last_used: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub access_level: i32,
}

/// One entry of the media-of-the-day archive, with a base64 preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApodInfo {
    pub title: String,
    pub date: String,
    pub image: String,
    pub user: BasicInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApodData {
    pub title: String,
    pub user: Option<BasicInfo>,
}

/// Full-size media for one date, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Apod {
    pub image: String,
}
