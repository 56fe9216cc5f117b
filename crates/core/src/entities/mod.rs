//! Tenant-scoped business entities stored on the device.

mod customers;
mod payments;
mod reservations;
mod suppliers;

pub use customers::*;
pub use payments::*;
pub use reservations::*;
pub use suppliers::*;

use crate::sync::SyncEntity;

/// Common view over every tracked entity row.
///
/// Restore and backfill only need identity, ownership and the natural key,
/// so they work against this trait instead of the concrete models.
pub trait EntityRecord {
    const ENTITY: SyncEntity;

    fn id(&self) -> i64;

    fn tenant_id(&self) -> Option<&str>;

    /// External key used to recognise the same record across stores.
    fn natural_key(&self) -> Option<&str>;

    /// Field rules shared with the matching `New*` input.
    fn validate(&self) -> crate::Result<()>;
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> crate::Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Trims a natural key and treats blank values as absent.
pub fn normalize_natural_key(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Ownership may be assigned once but never cleared or moved to another tenant.
pub fn check_tenant_change(current: Option<&str>, next: Option<&str>) -> crate::Result<()> {
    match (current, next) {
        (Some(current), Some(next)) if current == next => Ok(()),
        (Some(current), _) => Err(crate::Error::Validation(format!(
            "row is owned by tenant '{current}' and cannot be reassigned"
        ))),
        (None, _) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_can_be_set_but_never_cleared_or_moved() {
        assert!(check_tenant_change(None, Some("a")).is_ok());
        assert!(check_tenant_change(None, None).is_ok());
        assert!(check_tenant_change(Some("a"), Some("a")).is_ok());
        assert!(check_tenant_change(Some("a"), None).is_err());
        assert!(check_tenant_change(Some("a"), Some("b")).is_err());
    }

    #[test]
    fn blank_natural_keys_never_match() {
        assert_eq!(normalize_natural_key(Some("  AB-12 ")), Some("AB-12"));
        assert_eq!(normalize_natural_key(Some("   ")), None);
        assert_eq!(normalize_natural_key(None), None);
    }
}
