use std::error::Error;

use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use agora_entity::conversation::{self, Entity as Conversation, Model as ConversationModel};

pub struct Query;

impl Query {
    pub async fn get_conversation<C: ConnectionTrait>(
        db: &C,
        conversation_id: Uuid,
    ) -> Result<Option<ConversationModel>, DbErr> {
        Conversation::find_by_id(conversation_id)
            .one(db)
            .await
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn Error, "failed to load conversation");
            })
    }

    pub async fn get_all_conversations_from_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<ConversationModel>, DbErr> {
        Conversation::find()
            .filter(conversation::Column::UserId.eq(user_id))
            .order_by_desc(conversation::Column::UpdatedAt)
            .all(db)
            .await
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn Error, "failed to load all user conversations");
            })
    }
}
