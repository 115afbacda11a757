use crate::{Group, UserId};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: UserId,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(id: UserId) -> Self {
        Self {
            id,
            is_admin: false,
        }
    }

    pub fn site_admin(id: UserId) -> Self {
        Self { id, is_admin: true }
    }
}

/// Site admins and the group's creator may enroll, draw and delete.
pub fn can_manage(group: &Group, actor: &Actor) -> bool {
    actor.is_admin || actor.id == group.admin_id
}

pub fn can_view_own_result(group: &Group, actor: &Actor) -> bool {
    group.is_participant(actor.id)
}

/// Redistribution is reserved to site admins.
pub fn can_redistribute(actor: &Actor) -> bool {
    actor.is_admin
}
