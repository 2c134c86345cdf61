use serde::Serialize;

use crate::schema::{Id, User};

/// The authenticated caller, threaded explicitly through every action
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Id,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.to_owned(),
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
        }
    }
}
