use crate::error::AuthErrorKind;
use crate::verifier::Claims;

/// Checks that `required_permission` was granted to the token.
///
/// Plain string equality against the `permissions` claim; there is no notion
/// of wildcards or permission hierarchies.
pub fn authorize(claims: &Claims, required_permission: &str) -> Result<(), AuthErrorKind> {
    if claims.has_permission(required_permission) {
        Ok(())
    } else {
        Err(AuthErrorKind::InsufficientScope)
    }
}
