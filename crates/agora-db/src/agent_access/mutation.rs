use agora_entity::agent_access::{self, Column, Entity as AgentAccess};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait};
use uuid::Uuid;

pub struct Mutation;

impl Mutation {
    /// Grants access. Granting twice keeps the first record.
    pub async fn grant<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        agent_id: String,
        granted_by: Option<Uuid>,
    ) -> Result<(), DbErr> {
        let access = agent_access::ActiveModel {
            user_id: Set(user_id),
            agent_id: Set(agent_id),
            granted_at: Set(Utc::now().naive_utc()),
            granted_by: Set(granted_by),
        };
        AgentAccess::insert(access)
            .on_conflict(OnConflict::columns([Column::UserId, Column::AgentId]).do_nothing().to_owned())
            .do_nothing()
            .exec(db)
            .await?;
        Ok(())
    }

    /// Returns whether a record was removed.
    pub async fn revoke<C: ConnectionTrait>(db: &C, user_id: Uuid, agent_id: &str) -> Result<bool, DbErr> {
        let result = AgentAccess::delete_by_id((user_id, agent_id.to_owned())).exec(db).await?;
        Ok(result.rows_affected > 0)
    }
}
