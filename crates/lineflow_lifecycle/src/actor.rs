//! Acting users and role allow-lists.
//!
//! Roles come from an external identity provider and are treated as opaque
//! strings. Every rule in the transition table names the roles it accepts.

use serde::{Deserialize, Serialize};

/// The user performing an operation, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role: role.into(),
        }
    }

    pub fn has_any(&self, roles: &[&str]) -> bool {
        roles.iter().any(|r| *r == self.role)
    }
}

pub mod roles {
    /// Administrator.
    pub const ADMIN: &str = "UA";
    /// Intake registration.
    pub const REGISTRO: &str = "UReg";
    /// Initial test.
    pub const TEST_INICIAL: &str = "UTI";
    /// Assembly.
    pub const ENSAMBLE: &str = "UEN";
    /// Retest.
    pub const RETEST: &str = "UR";
    /// Packaging and shipping.
    pub const EMPAQUE: &str = "UE";
    /// Repair bench.
    pub const REPARACION: &str = "URep";

    pub const REGISTER: &[&str] = &[ADMIN, REGISTRO];
    pub const SET_PHASE: &[&str] = &[ADMIN];
    pub const PACK: &[&str] = &[ADMIN, EMPAQUE];
    pub const SCRAP: &[&str] = &[TEST_INICIAL, RETEST, REPARACION, ADMIN, EMPAQUE, ENSAMBLE];
    pub const RELEASE: &[&str] = &[REPARACION];
    pub const REPAIR: &[&str] = &[REPARACION, TEST_INICIAL, ADMIN];
    pub const SCRAP_OUTPUT: &[&str] = &[EMPAQUE];
    pub const SHIP: &[&str] = &[ADMIN, EMPAQUE];

    pub const ADVANCE_TO_TEST_INICIAL: &[&str] = &[ADMIN, TEST_INICIAL];
    pub const ADVANCE_TO_ENSAMBLE: &[&str] = &[ADMIN, ENSAMBLE];
    pub const ADVANCE_TO_RETEST: &[&str] = &[ADMIN, RETEST];
    pub const ADVANCE_TO_EMPAQUE: &[&str] = &[ADMIN, EMPAQUE];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_match_is_exact() {
        let actor = Actor::new("u1", "URep");
        assert!(actor.has_any(roles::RELEASE));
        assert!(!Actor::new("u1", "urep").has_any(roles::RELEASE));
        assert!(!Actor::new("u1", "UA").has_any(roles::RELEASE));
    }
}
