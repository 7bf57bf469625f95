use agora_entity::conversation::Model;
use agora_model::conversation::Conversation;

use crate::convert::FromDbModel;

impl FromDbModel<Model> for Conversation {
    fn from_db_model(model: Model) -> Self {
        Self {
            id: model.conversation_id,
            user_id: model.user_id,
            agent_id: model.agent_id,
            title: model.title,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
