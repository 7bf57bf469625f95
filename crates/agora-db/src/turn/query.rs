use agora_entity::turn::{self, Entity as Turn, Model as TurnModel, Status};
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use std::error::Error;
use uuid::Uuid;

pub struct Query;

impl Query {
    /// All turns of a conversation, oldest first.
    pub async fn list_turns<C: ConnectionTrait>(db: &C, conversation_id: Uuid) -> Result<Vec<TurnModel>, DbErr> {
        Turn::find()
            .filter(turn::Column::ConversationId.eq(conversation_id))
            .order_by_asc(turn::Column::TurnOrder)
            .all(db)
            .await
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn Error, "failed to load turns");
            })
    }

    /// The newest `limit` turns that can be replayed to a model, oldest first.
    /// Failed turns are skipped.
    pub async fn recent_turns<C: ConnectionTrait>(
        db: &C,
        conversation_id: Uuid,
        limit: u64,
    ) -> Result<Vec<TurnModel>, DbErr> {
        let mut turns = Turn::find()
            .filter(turn::Column::ConversationId.eq(conversation_id))
            .filter(turn::Column::Status.ne(Status::Failed))
            .order_by_desc(turn::Column::TurnOrder)
            .limit(limit)
            .all(db)
            .await
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn Error, "failed to load turns");
            })?;
        turns.reverse();
        Ok(turns)
    }
}
