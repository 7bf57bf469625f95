use agora_entity::user::{Model, Role as RoleModel};
use agora_model::user::{Role, User};

use crate::convert::{FromDbModel, FromModel, IntoModel};

impl FromDbModel<RoleModel> for Role {
    fn from_db_model(model: RoleModel) -> Self {
        match model {
            RoleModel::User => Self::User,
            RoleModel::Admin => Self::Admin,
        }
    }
}

impl FromModel<Role> for RoleModel {
    fn from_model(model: Role) -> Self {
        match model {
            Role::User => Self::User,
            Role::Admin => Self::Admin,
        }
    }
}

impl FromDbModel<Model> for User {
    fn from_db_model(model: Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            role: model.role.into_model(),
        }
    }
}
