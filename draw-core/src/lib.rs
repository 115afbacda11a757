pub mod draw;
pub mod policy;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use draw::{compute_assignment, is_derangement, DrawError, MAX_DRAW_ATTEMPTS};
pub use policy::{can_manage, can_redistribute, can_view_own_result, Actor};

pub type UserId = u64;
pub type GroupId = u64;

/// Giver -> receiver.
pub type Assignment = BTreeMap<UserId, UserId>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Open,
    Closed {
        assignment: Assignment,
        drawn_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub admin_id: UserId,
    pub participants: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub status: GroupStatus,
}

/// What a viewer is allowed to see of a completed draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsView {
    Full(Assignment),
    Own { receiver: UserId },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Conflict(String),
    #[error("not allowed to view this draw")]
    Forbidden,
    #[error("the draw has not been performed yet")]
    NotReady,
    #[error(transparent)]
    Draw(#[from] DrawError),
}

impl Group {
    /// A fresh open group whose only participant is its creator.
    pub fn new(
        id: GroupId,
        name: &str,
        admin_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, GroupError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GroupError::Validation("group name required".into()));
        }

        Ok(Self {
            id,
            name: name.to_string(),
            admin_id,
            participants: vec![admin_id],
            created_at,
            status: GroupStatus::Open,
        })
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, GroupStatus::Open)
    }

    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        match &self.status {
            GroupStatus::Open => None,
            GroupStatus::Closed { assignment, .. } => Some(assignment),
        }
    }

    pub fn drawn_at(&self) -> Option<DateTime<Utc>> {
        match &self.status {
            GroupStatus::Open => None,
            GroupStatus::Closed { drawn_at, .. } => Some(*drawn_at),
        }
    }

    pub fn add_participant(&mut self, user_id: UserId) -> Result<(), GroupError> {
        if !self.is_open() {
            return Err(GroupError::InvalidState(
                "group is closed to new participants".into(),
            ));
        }

        if self.is_participant(user_id) {
            return Err(GroupError::Conflict(format!(
                "user {user_id} is already a participant"
            )));
        }

        self.participants.push(user_id);
        Ok(())
    }

    /// Runs the first draw and closes the group.
    pub fn draw<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<(), GroupError> {
        if !self.is_open() {
            return Err(GroupError::InvalidState(
                "the draw has already been performed".into(),
            ));
        }

        if self.participants.len() < 2 {
            return Err(GroupError::InvalidState(
                "at least two participants are required to draw".into(),
            ));
        }

        let assignment = compute_assignment(&self.participants, rng)?;
        self.status = GroupStatus::Closed {
            assignment,
            drawn_at: now,
        };
        Ok(())
    }

    /// Replaces the whole assignment of a closed group with a fresh one.
    pub fn redraw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), GroupError> {
        let GroupStatus::Closed { assignment, .. } = &mut self.status else {
            return Err(GroupError::InvalidState(
                "nothing to redistribute: the draw has not been performed".into(),
            ));
        };

        *assignment = compute_assignment(&self.participants, rng)?;
        Ok(())
    }

    pub fn results_for(&self, actor: &Actor) -> Result<ResultsView, GroupError> {
        let assignment = self.assignment().ok_or(GroupError::NotReady)?;

        if can_manage(self, actor) {
            return Ok(ResultsView::Full(assignment.clone()));
        }

        if can_view_own_result(self, actor) {
            let receiver = *assignment.get(&actor.id).ok_or(GroupError::NotReady)?;
            return Ok(ResultsView::Own { receiver });
        }

        Err(GroupError::Forbidden)
    }
}
