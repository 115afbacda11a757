use std::sync::Arc;

use chrono::Utc;
use draw_core::{Actor, Group, GroupError, GroupId, ResultsView, UserId};
use rand::Rng;

use crate::error::{ApiError, ApiResult};
use crate::store::{RecordStore, Table};

/// Group records and their lifecycle transitions.
///
/// Every mutation is one gated load -> modify -> save cycle on the whole
/// collection, so concurrent enrollments and draws never overwrite each other.
pub struct GroupRepository {
    table: Table<Group>,
}

impl GroupRepository {
    pub fn new(store: Arc<dyn RecordStore<Group>>) -> Self {
        Self {
            table: Table::new(store),
        }
    }

    pub async fn create(&self, name: &str, admin_id: UserId) -> ApiResult<Group> {
        let group = self
            .table
            .mutate(|groups| {
                let id = groups.next_id();
                let group = Group::new(id, name, admin_id, Utc::now())?;
                groups.records.push(group.clone());
                Ok::<_, ApiError>(group)
            })
            .await?;

        tracing::info!(group_id = group.id, admin_id, "group created");
        Ok(group)
    }

    pub async fn find(&self, group_id: GroupId) -> ApiResult<Group> {
        self.table
            .read()
            .await?
            .records
            .into_iter()
            .find(|g| g.id == group_id)
            .ok_or(ApiError::NotFound("group"))
    }

    pub async fn list_all(&self) -> ApiResult<Vec<Group>> {
        Ok(self.table.read().await?.records)
    }

    pub async fn list_for_member(&self, user_id: UserId) -> ApiResult<Vec<Group>> {
        let mut groups = self.list_all().await?;
        groups.retain(|g| g.is_participant(user_id));
        Ok(groups)
    }

    pub async fn add_participant(&self, group_id: GroupId, user_id: UserId) -> ApiResult<Group> {
        let group = self
            .update(group_id, |group| group.add_participant(user_id))
            .await?;
        tracing::info!(group_id, user_id, "participant enrolled");
        Ok(group)
    }

    pub async fn run_draw<R>(&self, group_id: GroupId, rng: &mut R) -> ApiResult<Group>
    where
        R: Rng + ?Sized,
    {
        let group = self
            .update(group_id, |group| group.draw(rng, Utc::now()))
            .await?;
        tracing::info!(
            group_id,
            participants = group.participants.len(),
            "draw completed"
        );
        Ok(group)
    }

    pub async fn redistribute<R>(&self, group_id: GroupId, rng: &mut R) -> ApiResult<Group>
    where
        R: Rng + ?Sized,
    {
        let group = self.update(group_id, |group| group.redraw(rng)).await?;
        tracing::info!(group_id, "draw redistributed");
        Ok(group)
    }

    pub async fn results_view(
        &self,
        group_id: GroupId,
        viewer_id: UserId,
        is_admin: bool,
    ) -> ApiResult<ResultsView> {
        let group = self.find(group_id).await?;
        let viewer = Actor {
            id: viewer_id,
            is_admin,
        };
        Ok(group.results_for(&viewer)?)
    }

    pub async fn delete(&self, group_id: GroupId) -> ApiResult<()> {
        self.table
            .mutate(|groups| {
                let index = groups
                    .records
                    .iter()
                    .position(|g| g.id == group_id)
                    .ok_or(ApiError::NotFound("group"))?;
                groups.records.remove(index);
                Ok::<_, ApiError>(())
            })
            .await?;

        tracing::info!(group_id, "group deleted");
        Ok(())
    }

    async fn update<F>(&self, group_id: GroupId, op: F) -> ApiResult<Group>
    where
        F: FnOnce(&mut Group) -> Result<(), GroupError>,
    {
        self.table
            .mutate(|groups| {
                let group = groups
                    .records
                    .iter_mut()
                    .find(|g| g.id == group_id)
                    .ok_or(ApiError::NotFound("group"))?;
                op(group)?;
                Ok(group.clone())
            })
            .await
    }
}
