mod users;

use crate::{
    domain::{media_store::MediaStore, user_repository::UserRepository},
    infra::api::AppState,
};
use axum::Router;

pub fn routes<R, M>(app_state: AppState<R, M>) -> Router<AppState<R, M>>
where
    R: UserRepository,
    M: MediaStore,
{
    Router::new().nest("/users", users::routes(app_state))
}
