mod access_keys;
mod audit;
mod clock;
mod grants;
mod identity;

pub use access_keys::{AccessKeyListing, AccessKeyRepository, KeyedPrincipal};
pub use audit::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, AuditRepository};
pub use clock::{Clock, SystemClock};
pub use grants::{CapabilityRepository, PermissionGrantQuery, PermissionGrantRepository};
pub use identity::PrincipalRepository;
