//! Access Control Module
//!
//! Operator authorization for the privileged entry points: valuation
//! updates, batch migrations, and reserve actions. Role administration
//! beyond grant/revoke is out of scope; whitelist management lives with
//! the embedding service.

use crate::errors::{StrataError, StrataResult};
use crate::types::Address;
use crate::validation::validate_address;
use crate::Vec;

/// Admin plus a flat set of operator addresses.
///
/// The admin is always an operator. Operators may call the privileged
/// valuation/migration/reserve entry points; only the admin may change
/// the operator set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSet {
    admin: Address,
    operators: Vec<Address>,
}

impl OperatorSet {
    /// Create a new operator set with the given admin
    pub fn new(admin: Address) -> StrataResult<Self> {
        validate_address(&admin)?;
        Ok(Self {
            admin,
            operators: Vec::new(),
        })
    }

    /// The admin address
    pub fn admin(&self) -> Address {
        self.admin
    }

    /// Grant operator rights, admin-only. Granting twice is a no-op.
    pub fn grant_operator(&mut self, caller: Address, operator: Address) -> StrataResult<()> {
        self.require_admin(caller)?;
        validate_address(&operator)?;
        if !self.operators.contains(&operator) {
            self.operators.push(operator);
        }
        Ok(())
    }

    /// Revoke operator rights, admin-only
    pub fn revoke_operator(&mut self, caller: Address, operator: Address) -> StrataResult<()> {
        self.require_admin(caller)?;
        self.operators.retain(|op| *op != operator);
        Ok(())
    }

    /// Whether the address may call privileged entry points
    pub fn is_operator(&self, address: &Address) -> bool {
        *address == self.admin || self.operators.contains(address)
    }

    /// Fail with `Unauthorized` unless the caller is an operator
    pub fn require_operator(&self, caller: Address) -> StrataResult<()> {
        if !self.is_operator(&caller) {
            return Err(StrataError::Unauthorized { caller });
        }
        Ok(())
    }

    /// Fail unless the caller is the admin
    pub fn require_admin(&self, caller: Address) -> StrataResult<()> {
        if caller != self.admin {
            return Err(StrataError::AdminOnly);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        [1u8; 32]
    }

    fn operator() -> Address {
        [2u8; 32]
    }

    fn outsider() -> Address {
        [3u8; 32]
    }

    #[test]
    fn test_admin_is_operator() {
        let set = OperatorSet::new(admin()).unwrap();
        assert!(set.is_operator(&admin()));
        assert!(set.require_operator(admin()).is_ok());
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut set = OperatorSet::new(admin()).unwrap();

        set.grant_operator(admin(), operator()).unwrap();
        assert!(set.is_operator(&operator()));

        // Idempotent grant
        set.grant_operator(admin(), operator()).unwrap();
        assert_eq!(set.operators.len(), 1);

        set.revoke_operator(admin(), operator()).unwrap();
        assert!(!set.is_operator(&operator()));
    }

    #[test]
    fn test_non_admin_cannot_grant() {
        let mut set = OperatorSet::new(admin()).unwrap();
        assert_eq!(
            set.grant_operator(outsider(), operator()),
            Err(StrataError::AdminOnly)
        );
    }

    #[test]
    fn test_unauthorized_caller() {
        let set = OperatorSet::new(admin()).unwrap();
        assert_eq!(
            set.require_operator(outsider()),
            Err(StrataError::Unauthorized { caller: outsider() })
        );
    }

    #[test]
    fn test_zero_admin_rejected() {
        assert!(matches!(
            OperatorSet::new([0u8; 32]),
            Err(StrataError::InvalidAddress { .. })
        ));
    }
}
