use agora_entity::activity_log::{self, Action};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr};
use serde_json::Value;
use uuid::Uuid;

pub struct Mutation;

impl Mutation {
    pub async fn record<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
        action: Action,
        metadata: Option<Value>,
    ) -> Result<(), DbErr> {
        let entry = activity_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            action: Set(action),
            metadata: Set(metadata),
            created_at: Set(Utc::now().naive_utc()),
        };
        entry.insert(db).await?;
        Ok(())
    }
}
