use agora_entity::turn::{self, Entity as Turn, Model as TurnModel, Role, Status};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::util::RequireRecord;

pub struct Mutation;

impl Mutation {
    /// Appends a turn at the end of the conversation.
    ///
    /// The order is derived from the number of stored turns, so callers
    /// should run this inside a transaction.
    pub async fn append_turn<C: ConnectionTrait>(
        db: &C,
        conversation_id: Uuid,
        role: Role,
        content: String,
        status: Status,
    ) -> Result<TurnModel, DbErr> {
        let turn_count = Turn::find()
            .filter(turn::Column::ConversationId.eq(conversation_id))
            .count(db)
            .await?;
        let turn_order = i32::try_from(turn_count)
            .map_err(|_| DbErr::Custom("turn count is too large to fit in an i32".to_string()))?;

        let new_turn = turn::ActiveModel {
            conversation_id: Set(conversation_id),
            turn_order: Set(turn_order),
            role: Set(role),
            content: Set(content),
            status: Set(status),
            created_at: Set(Utc::now().naive_utc()),
        };
        new_turn.insert(db).await
    }

    /// Moves a `partial` turn to `complete`. This is the only in-place update a
    /// turn ever receives; any other status is rejected with `RecordNotUpdated`.
    ///
    /// The relay stores agent turns once and never calls this. It backs the
    /// `complete-turn` subcommand of the server binary.
    pub async fn complete_partial<C: ConnectionTrait>(
        db: &C,
        conversation_id: Uuid,
        turn_order: i32,
        content: String,
    ) -> Result<TurnModel, DbErr> {
        let result = Turn::update_many()
            .col_expr(turn::Column::Content, Expr::value(content))
            .col_expr(turn::Column::Status, Expr::value(Status::Complete))
            .filter(turn::Column::ConversationId.eq(conversation_id))
            .filter(turn::Column::TurnOrder.eq(turn_order))
            .filter(turn::Column::Status.eq(Status::Partial))
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            tracing::warn!(%conversation_id, turn_order, "turn is not partial, refusing update");
            return Err(DbErr::RecordNotUpdated);
        }

        Turn::find_by_id((conversation_id, turn_order)).one(db).await.require()
    }
}
