use agora_entity::turn::{Model, Role as RoleModel, Status as StatusModel};
use agora_model::turn::{Turn, TurnRole, TurnStatus};

use crate::convert::{FromDbModel, FromModel, IntoModel};

impl FromDbModel<RoleModel> for TurnRole {
    fn from_db_model(model: RoleModel) -> Self {
        match model {
            RoleModel::User => Self::User,
            RoleModel::Agent => Self::Agent,
        }
    }
}

impl FromModel<TurnRole> for RoleModel {
    fn from_model(model: TurnRole) -> Self {
        match model {
            TurnRole::User => Self::User,
            TurnRole::Agent => Self::Agent,
        }
    }
}

impl FromDbModel<StatusModel> for TurnStatus {
    fn from_db_model(model: StatusModel) -> Self {
        match model {
            StatusModel::Complete => Self::Complete,
            StatusModel::Partial => Self::Partial,
            StatusModel::Failed => Self::Failed,
        }
    }
}

impl FromModel<TurnStatus> for StatusModel {
    fn from_model(model: TurnStatus) -> Self {
        match model {
            TurnStatus::Complete => Self::Complete,
            TurnStatus::Partial => Self::Partial,
            TurnStatus::Failed => Self::Failed,
        }
    }
}

impl FromDbModel<Model> for Turn {
    fn from_db_model(model: Model) -> Self {
        Self {
            conversation_id: model.conversation_id,
            turn_order: model.turn_order,
            role: model.role.into_model(),
            content: model.content,
            status: model.status.into_model(),
            created_at: model.created_at,
        }
    }
}
