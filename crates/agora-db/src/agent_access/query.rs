use agora_entity::agent_access::{self, Entity as AgentAccess, Model as AgentAccessModel};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use std::error::Error;
use uuid::Uuid;

pub struct Query;

impl Query {
    pub async fn has_access<C: ConnectionTrait>(db: &C, user_id: Uuid, agent_id: &str) -> Result<bool, DbErr> {
        let access = AgentAccess::find_by_id((user_id, agent_id.to_owned()))
            .one(db)
            .await
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn Error, "failed to load agent access");
            })?;
        Ok(access.is_some())
    }

    pub async fn get_user_access<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<Vec<AgentAccessModel>, DbErr> {
        AgentAccess::find()
            .filter(agent_access::Column::UserId.eq(user_id))
            .all(db)
            .await
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn Error, "failed to load agent access");
            })
    }
}
