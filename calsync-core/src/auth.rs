//! Authorization checks consulted before any mutation.

use std::collections::HashSet;

pub const PERM_CALENDARS_READ: &str = "Calendars.Read";
pub const PERM_CALENDARS_READWRITE: &str = "Calendars.ReadWrite";

const SHARED_SUFFIX: &str = ".Shared";

pub trait AuthorizationChecker: Send + Sync {
    /// Whether the account holds `permission`.
    fn validate_authorization(&self, permission: &str) -> bool;
}

/// Scopes granted to an account.
///
/// A write scope implies the matching read scope. When the account works on
/// a shared mailbox only the `.Shared` variants of a scope count.
#[derive(Debug, Clone, Default)]
pub struct Permissions {
    granted: HashSet<String>,
    shared: bool,
}

impl Permissions {
    pub fn new<I, S>(granted: I, shared: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Permissions {
            granted: granted.into_iter().map(Into::into).collect(),
            shared,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    fn holds(&self, scope: &str) -> bool {
        let scope = if self.shared {
            format!("{scope}{SHARED_SUFFIX}")
        } else {
            scope.to_string()
        };
        self.granted.contains(&scope)
    }
}

impl AuthorizationChecker for Permissions {
    fn validate_authorization(&self, permission: &str) -> bool {
        if self.holds(permission) {
            return true;
        }
        permission == PERM_CALENDARS_READ && self.holds(PERM_CALENDARS_READWRITE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readwrite_implies_read() {
        let perms = Permissions::new(["Calendars.ReadWrite"], false);
        assert!(perms.validate_authorization(PERM_CALENDARS_READ));
        assert!(perms.validate_authorization(PERM_CALENDARS_READWRITE));

        let read_only = Permissions::new(["Calendars.Read"], false);
        assert!(read_only.validate_authorization(PERM_CALENDARS_READ));
        assert!(!read_only.validate_authorization(PERM_CALENDARS_READWRITE));
    }

    #[test]
    fn test_shared_mailbox_needs_shared_scopes() {
        let perms = Permissions::new(["Calendars.ReadWrite"], true);
        assert!(!perms.validate_authorization(PERM_CALENDARS_READWRITE));

        let perms = Permissions::new(["Calendars.ReadWrite.Shared"], true);
        assert!(perms.validate_authorization(PERM_CALENDARS_READWRITE));
        assert!(perms.validate_authorization(PERM_CALENDARS_READ));
    }

    #[test]
    fn test_nothing_granted() {
        let perms = Permissions::default();
        assert!(!perms.validate_authorization(PERM_CALENDARS_READ));
    }
}
