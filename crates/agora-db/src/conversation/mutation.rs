use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter};
use sea_orm::sea_query::Expr;
use uuid::Uuid;

use agora_entity::conversation::{self, Entity as Conversation, Model as ConversationModel};

pub const DEFAULT_TITLE: &str = "New Conversation";

pub struct Mutation;

impl Mutation {
    pub async fn create_conversation<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        agent_id: String,
        title: Option<String>,
    ) -> Result<ConversationModel, DbErr> {
        let now = Utc::now().naive_utc();

        let conversation = conversation::ActiveModel {
            conversation_id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            agent_id: Set(agent_id),
            title: Set(title.unwrap_or_else(|| DEFAULT_TITLE.to_owned())),
            created_at: Set(now),
            updated_at: Set(now),
        };

        conversation.insert(db).await
    }

    pub async fn touch<C: ConnectionTrait>(db: &C, conversation_id: Uuid) -> Result<(), DbErr> {
        let update_result = Conversation::update_many()
            .col_expr(conversation::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .filter(conversation::Column::ConversationId.eq(conversation_id))
            .exec(db)
            .await?;

        if update_result.rows_affected == 0 {
            return Err(DbErr::RecordNotFound("conversation not found".to_owned()));
        }

        Ok(())
    }
}
