use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::account::AccountView;
use crate::model::role::Role;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "agent@mtefop.gov.mg")]
    pub email: String,
    #[schema(example = "secret")]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub role: Role,
    pub token: String,
    pub user: AccountView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account e-mail.
    pub sub: String,
    pub role: Role,
    /// Row id in `admins` or `agents_nouveau`, depending on `role`.
    pub account_id: u64,
    pub exp: usize,
    pub jti: String,
}
