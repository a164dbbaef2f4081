//! Role policy guards over [`TokenClaims`].
//!
//! Visibility failures on a read are masked as [`ErrorKind::NotFound`]
//! rather than [`ErrorKind::Forbidden`] to avoid leaking that a private
//! entity exists.

use ldf_types::{Distribution, ErrorKind, LdfError, Role};

use crate::token::TokenClaims;

/// Fails unless `claims.role.has_write()`.
pub fn require_write(claims: &TokenClaims) -> Result<(), LdfError> {
    if claims.role.has_write() {
        Ok(())
    } else {
        Err(LdfError::forbidden("operator capability required"))
    }
}

/// Fails unless `claims.role.has_admin()`.
pub fn require_admin(claims: &TokenClaims) -> Result<(), LdfError> {
    if claims.role.has_admin() {
        Ok(())
    } else {
        Err(LdfError::forbidden("admin capability required"))
    }
}

/// Fails unless `claims.role.is_root()`.
pub fn require_root(claims: &TokenClaims) -> Result<(), LdfError> {
    if claims.role.is_root() {
        Ok(())
    } else {
        Err(LdfError::forbidden("root capability required"))
    }
}

/// Guards a read of `distribution`, masking a visibility denial as 404.
pub fn guard_read_distribution(
    distribution: &Distribution,
    claims: Option<&TokenClaims>,
) -> Result<(), LdfError> {
    let caller = claims.map(|c| (c.user_id, c.role));
    if distribution.is_readable_by(caller) {
        Ok(())
    } else {
        Err(LdfError::not_found("distribution not found"))
    }
}

/// Guards a write to `distribution`: the owner or an admin may proceed.
/// Unlike reads, a write attempt by an authenticated non-owner surfaces as
/// 403 — the caller already knows the resource exists by virtue of naming it.
pub fn guard_write_distribution(
    distribution: &Distribution,
    claims: &TokenClaims,
) -> Result<(), LdfError> {
    if Some(claims.user_id) == distribution.owner_id || claims.role.has_admin() {
        Ok(())
    } else {
        Err(LdfError::forbidden("not the owner of this distribution"))
    }
}

/// True if `err` should be rendered to the caller as the given HTTP status,
/// used by tests asserting the 401 vs 403 vs 404 split end to end.
pub fn is_status(err: &LdfError, status: u16) -> bool {
    err.kind().http_status() == status
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ldf_types::{DistributionStatus, Visibility};
    use uuid::Uuid;

    fn claims(role: Role) -> TokenClaims {
        TokenClaims {
            user_id: Uuid::new_v4(),
            user_name: "alice".to_string(),
            role,
        }
    }

    fn distribution(owner: Option<Uuid>, visibility: Visibility) -> Distribution {
        Distribution {
            id: Uuid::new_v4(),
            name: "arch".to_string(),
            version: "1.0".to_string(),
            status: DistributionStatus::Ready,
            visibility,
            config: serde_json::json!({}),
            source_url: None,
            checksum: None,
            size_bytes: 0,
            owner_id: owner,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn viewer_cannot_write() {
        assert!(require_write(&claims(Role::Viewer)).is_err());
        assert!(require_write(&claims(Role::Operator)).is_ok());
    }

    #[test]
    fn operator_is_not_admin() {
        assert!(require_admin(&claims(Role::Operator)).is_err());
        assert!(require_admin(&claims(Role::Admin)).is_ok());
    }

    #[test]
    fn admin_is_not_root() {
        assert!(require_root(&claims(Role::Admin)).is_err());
        assert!(require_root(&claims(Role::Root)).is_ok());
    }

    #[test]
    fn private_distribution_read_by_stranger_masks_as_not_found() {
        let viewer = claims(Role::Viewer);
        let dist = distribution(Some(Uuid::new_v4()), Visibility::Private);
        let err = guard_read_distribution(&dist, Some(&viewer)).unwrap_err();
        assert!(is_status(&err, 404));
    }

    #[test]
    fn public_distribution_is_readable_unauthenticated() {
        let dist = distribution(Some(Uuid::new_v4()), Visibility::Public);
        assert!(guard_read_distribution(&dist, None).is_ok());
    }

    #[test]
    fn owner_can_read_own_private_distribution() {
        let owner = claims(Role::Viewer);
        let dist = distribution(Some(owner.user_id), Visibility::Private);
        assert!(guard_read_distribution(&dist, Some(&owner)).is_ok());
    }

    #[test]
    fn non_owner_write_is_forbidden_not_masked() {
        let stranger = claims(Role::Operator);
        let dist = distribution(Some(Uuid::new_v4()), Visibility::Private);
        let err = guard_write_distribution(&dist, &stranger).unwrap_err();
        assert!(is_status(&err, 403));
    }

    #[test]
    fn admin_can_write_any_distribution() {
        let admin = claims(Role::Admin);
        let dist = distribution(Some(Uuid::new_v4()), Visibility::Private);
        assert!(guard_write_distribution(&dist, &admin).is_ok());
    }

    #[test]
    fn error_kind_matches_expected_status() {
        assert!(is_status(&LdfError::new(ErrorKind::Unauthorized, "x"), 401));
    }
}
