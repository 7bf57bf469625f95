use agora_config::AgentConfig;
use agora_db::util::{FlattenTransactionResultExt, RequireRecord};
use agora_db::{activity_log, agent_access, conversation, turn, user};
use agora_entity::activity_log::Action;
use agora_entity::user::Role;
use agora_model::turn::{NewTurn, Turn, TurnId, TurnRole};
use agora_model_tools::convert::{IntoDbModel, IntoModel};
use agora_relay::{BoxError, ConversationInfo, EntitlementChecker, MessageStore};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr, TransactionTrait};
use serde_json::json;
use uuid::Uuid;

/// Turns stored through sea-orm. Each append also writes an activity log entry and
/// bumps the conversation, all in one transaction.
#[derive(Clone)]
pub(crate) struct DbMessageStore {
    conn: DatabaseConnection,
}

impl DbMessageStore {
    pub(crate) fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl MessageStore for DbMessageStore {
    async fn conversation(&self, conversation_id: Uuid) -> Result<Option<ConversationInfo>, BoxError> {
        let conversation = conversation::Query::get_conversation(&self.conn, conversation_id).await?;
        Ok(conversation.map(|conversation| ConversationInfo {
            conversation_id: conversation.conversation_id,
            user_id: conversation.user_id,
            agent_id: conversation.agent_id,
        }))
    }

    async fn append(&self, conversation_id: Uuid, turn: NewTurn) -> Result<TurnId, BoxError> {
        let stored = self
            .conn
            .transaction::<_, _, DbErr>(move |txn| {
                Box::pin(async move {
                    let conversation = conversation::Query::get_conversation(txn, conversation_id)
                        .await
                        .require()?;
                    let action = match turn.role {
                        TurnRole::User => Action::MessageSent,
                        TurnRole::Agent => Action::MessageReceived,
                    };
                    let stored = turn::Mutation::append_turn(
                        txn,
                        conversation_id,
                        turn.role.into_db_model(),
                        turn.content,
                        turn.status.into_db_model(),
                    )
                    .await?;
                    activity_log::Mutation::record(
                        txn,
                        conversation.user_id,
                        action,
                        Some(json!({
                            "conversation_id": conversation_id,
                            "agent_id": conversation.agent_id,
                            "turn_order": stored.turn_order,
                            "status": turn.status,
                        })),
                    )
                    .await?;
                    conversation::Mutation::touch(txn, conversation_id).await?;
                    Ok(stored)
                })
            })
            .await
            .flatten_res()?;
        Ok(stored.turn_order)
    }

    async fn list_turns(&self, conversation_id: Uuid) -> Result<Vec<Turn>, BoxError> {
        let turns = turn::Query::list_turns(&self.conn, conversation_id).await?;
        Ok(turns.into_iter().map(IntoModel::into_model).collect())
    }

    async fn recent_turns(&self, conversation_id: Uuid, limit: usize) -> Result<Vec<Turn>, BoxError> {
        let turns = turn::Query::recent_turns(&self.conn, conversation_id, u64::try_from(limit)?).await?;
        Ok(turns.into_iter().map(IntoModel::into_model).collect())
    }
}

/// Free agents are open to everyone, admins may use every agent, everyone else needs an
/// access record.
pub(crate) fn grants_access(agent: &AgentConfig, is_admin: bool, has_record: bool) -> bool {
    agent.is_free() || is_admin || has_record
}

#[derive(Clone)]
pub(crate) struct DbEntitlementChecker {
    conn: DatabaseConnection,
}

impl DbEntitlementChecker {
    pub(crate) fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub(crate) async fn check(&self, user_id: Uuid, agent: &AgentConfig) -> Result<bool, DbErr> {
        if agent.is_free() {
            return Ok(true);
        }
        let Some(user) = user::Query::find_user_by_id(&self.conn, user_id).await? else {
            return Ok(false);
        };
        let has_record = agent_access::Query::has_access(&self.conn, user_id, &agent.id).await?;
        Ok(grants_access(agent, user.role == Role::Admin, has_record))
    }
}

#[async_trait]
impl EntitlementChecker for DbEntitlementChecker {
    async fn is_entitled(&self, user_id: Uuid, agent: &AgentConfig) -> Result<bool, BoxError> {
        Ok(self.check(user_id, agent).await?)
    }
}
