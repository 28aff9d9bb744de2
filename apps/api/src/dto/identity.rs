use serde::Serialize;
use tablegate_application::MappedIdentity;
use tablegate_domain::Principal;
use ts_rs::TS;

/// API representation of the authenticated principal.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/principal-response.ts"
)]
pub struct PrincipalResponse {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub is_admin: bool,
}

impl From<Principal> for PrincipalResponse {
    fn from(value: Principal) -> Self {
        Self {
            user_id: value.id().as_i64(),
            username: value.username().to_owned(),
            display_name: value.display_name(),
            email: value.email().map(ToOwned::to_owned),
            roles: value.roles().iter().cloned().collect(),
            is_admin: value.is_admin(),
        }
    }
}

/// Local identity derived from an OAuth provider profile.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/oauth-user-info-response.ts"
)]
pub struct OAuthUserInfoResponse {
    pub username: String,
    pub email: String,
}

impl From<MappedIdentity> for OAuthUserInfoResponse {
    fn from(value: MappedIdentity) -> Self {
        Self {
            username: value.username,
            email: value.email,
        }
    }
}
