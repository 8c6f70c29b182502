use diesel::prelude::*;
use uuid::Uuid;

use crate::db::pool::DbPool;
use crate::db::schema::users;
use crate::error::ApiError;

/// A Gardenia player as stored by the identity service.
#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

/// Load a user by its string id. Ids that are not UUIDs cannot exist.
pub async fn find_by_id(pool: &DbPool, user_id: &str) -> Result<Option<User>, ApiError> {
    let Ok(id) = Uuid::parse_str(user_id) else {
        return Ok(None);
    };

    let mut conn = pool.get().await?;
    let user = diesel_async::RunQueryDsl::get_result(
        users::table.find(id).select(User::as_select()),
        &mut conn,
    )
    .await
    .optional()?;

    Ok(user)
}
