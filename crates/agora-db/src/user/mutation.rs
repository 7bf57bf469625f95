use agora_entity::user::{ActiveModel, Column, Entity, Model, Role};
use chrono::Utc;
use sea_orm::ActiveValue::{Set, Unchanged};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait};
use std::error::Error;
use uuid::Uuid;

use crate::util::RequireRecord;

pub struct Mutation;

impl Mutation {
    /// Inserts the user on first sight. Existing rows keep their role.
    pub async fn ensure_user<C: ConnectionTrait>(conn: &C, id: Uuid, email: Option<String>) -> Result<Model, DbErr> {
        let new_user = ActiveModel {
            id: Set(id),
            email: Set(email),
            role: Set(Role::User),
            created_at: Set(Utc::now().naive_utc()),
        };

        Entity::insert(new_user)
            .on_conflict(OnConflict::column(Column::Id).do_nothing().to_owned())
            .do_nothing()
            .exec(conn)
            .await
            .inspect_err(|error| {
                tracing::error!(error = error as &dyn Error, %id, "failed to create user");
            })?;

        Entity::find_by_id(id).one(conn).await.require()
    }

    pub async fn set_role<C: ConnectionTrait>(conn: &C, user_id: Uuid, role: Role) -> Result<Model, DbErr> {
        let user = ActiveModel {
            id: Unchanged(user_id),
            role: Set(role),
            ..Default::default()
        };
        user.update(conn).await
    }
}
