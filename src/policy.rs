//! Capability table. Every write path (and every non-public read) asks
//! `authorize` before touching the repository.

use crate::auth::{Actor, Role};
use crate::models::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denied {
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReadCatalogue,
    WriteCatalogue,
    ManageUsers,
    ManageOwnProfile,
    ManageCatalogEntries,
    CreateCollection,
    ReadPublicCollection,
    ReadCollection,
    WriteCollection,
    CreateReview,
    EditReview,
    PublishReview,
    DeleteReview,
    ViewHiddenReview,
    ModerateReview,
    Vote,
    Report,
    WithdrawReport,
    ViewAllReports,
    ResolveReport,
    RecountReview,
}

#[derive(Debug, Clone, Copy)]
enum Grant {
    Anyone,
    Authenticated,
    Roles(&'static [Role]),
    Owner,
    OwnerOr(&'static [Role]),
}

const STAFF: &[Role] = &[Role::Moderator, Role::Admin];
const ADMIN: &[Role] = &[Role::Admin];

fn grant(action: Action) -> Grant {
    use Action::*;
    match action {
        ReadCatalogue => Grant::Anyone,
        WriteCatalogue | ManageUsers => Grant::Roles(ADMIN),
        ManageOwnProfile | ManageCatalogEntries | CreateCollection | CreateReview | Vote | Report
        | ReadPublicCollection => Grant::Authenticated,
        ReadCollection | WriteCollection | EditReview | PublishReview | DeleteReview | WithdrawReport => Grant::Owner,
        ModerateReview | ViewAllReports | ResolveReport | RecountReview => Grant::Roles(STAFF),
        ViewHiddenReview => Grant::OwnerOr(STAFF),
    }
}

/// Decide whether `actor` may perform `action` on a resource owned by `owner`.
/// Owner-scoped grants with no owner supplied are denied.
pub fn authorize(actor: Option<&Actor>, action: Action, owner: Option<Id>) -> Result<(), Denied> {
    let g = grant(action);
    if let Grant::Anyone = g {
        return Ok(());
    }
    let actor = actor.ok_or(Denied::Unauthenticated)?;
    let is_owner = owner.is_some_and(|o| o == actor.id);
    let allowed = match g {
        Grant::Anyone | Grant::Authenticated => true,
        Grant::Roles(roles) => roles.contains(&actor.role),
        Grant::Owner => is_owner,
        Grant::OwnerOr(roles) => is_owner || roles.contains(&actor.role),
    };
    if allowed {
        Ok(())
    } else {
        Err(Denied::Forbidden)
    }
}

/// Convenience for boolean checks that should not fail the request.
pub fn allows(actor: Option<&Actor>, action: Action, owner: Option<Id>) -> bool {
    authorize(actor, action, owner).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: Actor = Actor { id: 1, role: Role::User };
    const CRITIC: Actor = Actor { id: 2, role: Role::Critic };
    const MODERATOR: Actor = Actor { id: 3, role: Role::Moderator };
    const ADMIN_ACTOR: Actor = Actor { id: 4, role: Role::Admin };

    #[test]
    fn anonymous_reads_catalogue_only() {
        assert!(authorize(None, Action::ReadCatalogue, None).is_ok());
        assert_eq!(authorize(None, Action::CreateReview, None), Err(Denied::Unauthenticated));
        assert_eq!(authorize(None, Action::WriteCatalogue, None), Err(Denied::Unauthenticated));
    }

    #[test]
    fn catalogue_writes_are_admin_only() {
        for a in [USER, CRITIC, MODERATOR] {
            assert_eq!(authorize(Some(&a), Action::WriteCatalogue, None), Err(Denied::Forbidden));
        }
        assert!(authorize(Some(&ADMIN_ACTOR), Action::WriteCatalogue, None).is_ok());
    }

    #[test]
    fn ownership_is_not_implied_by_role() {
        assert!(authorize(Some(&USER), Action::EditReview, Some(1)).is_ok());
        assert_eq!(authorize(Some(&ADMIN_ACTOR), Action::EditReview, Some(1)), Err(Denied::Forbidden));
        assert_eq!(authorize(Some(&ADMIN_ACTOR), Action::ReadCollection, Some(1)), Err(Denied::Forbidden));
        assert_eq!(authorize(Some(&USER), Action::EditReview, None), Err(Denied::Forbidden));
    }

    #[test]
    fn staff_grants() {
        assert!(authorize(Some(&MODERATOR), Action::ModerateReview, None).is_ok());
        assert_eq!(authorize(Some(&CRITIC), Action::ModerateReview, None), Err(Denied::Forbidden));
        assert!(authorize(Some(&MODERATOR), Action::ViewHiddenReview, Some(9)).is_ok());
        assert!(authorize(Some(&USER), Action::ViewHiddenReview, Some(1)).is_ok());
        assert!(!allows(Some(&CRITIC), Action::ViewHiddenReview, Some(1)));
    }
}
