use agora_db::schema::setup_schema;
use agora_db::{conversation, user};
use agora_entity::conversation::Model as ConversationModel;
use agora_entity::user::Model as UserModel;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

pub async fn test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    setup_schema(&db).await.unwrap();
    db
}

pub async fn create_test_user(db: &DatabaseConnection) -> UserModel {
    user::Mutation::ensure_user(db, Uuid::new_v4(), Some("test@example.org".to_owned()))
        .await
        .unwrap()
}

#[allow(dead_code)]
pub async fn create_test_conversation(db: &DatabaseConnection, user_id: Uuid) -> ConversationModel {
    conversation::Mutation::create_conversation(db, user_id, "code-helper".to_owned(), None)
        .await
        .unwrap()
}
