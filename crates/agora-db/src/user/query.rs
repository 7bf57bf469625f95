use agora_entity::user::{Entity as UserEntity, Model as User};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait};
use uuid::Uuid;

pub struct Query;

impl Query {
    pub async fn find_user_by_id<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<Option<User>, DbErr> {
        UserEntity::find_by_id(id).one(conn).await.inspect_err(|error| {
            tracing::error!(error = error as &dyn std::error::Error, "error loading user");
        })
    }
}
