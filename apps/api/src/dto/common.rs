use serde::Serialize;
use tablegate_domain::Capability;
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// API representation of a grantable table capability.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/capability-response.ts"
)]
pub struct CapabilityResponse {
    pub capability_id: i64,
    pub permission_name: String,
    pub resource_name: String,
    pub label: String,
}

impl From<Capability> for CapabilityResponse {
    fn from(value: Capability) -> Self {
        Self {
            capability_id: value.id.as_i64(),
            label: value.label(),
            permission_name: value.permission_name,
            resource_name: value.resource_name,
        }
    }
}

/// Result of a lapsed grant sweep.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/expired-grants-response.ts"
)]
pub struct ExpiredGrantsResponse {
    pub expired_count: u64,
}
