use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{errors::ServiceError, pagination::Pagination};
use models::user;

/// Partial update input; absent fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Optional list filters: substring match on name, exact match on email.
#[derive(Debug, Default, Clone)]
pub struct UserFilter {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Create a new user.
pub async fn create_user(db: &DatabaseConnection, name: &str, email: &str) -> Result<user::Model, ServiceError> {
    let created = user::create(db, name, email).await?;
    Ok(created)
}

/// Get a user by id.
pub async fn get_user(db: &DatabaseConnection, id: Uuid) -> Result<user::Model, ServiceError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::not_found("user"))
}

/// Apply a partial update. Provided fields are validated before anything is
/// written; `updated_at` is refreshed on every successful update while `id`
/// and `created_at` stay untouched.
pub async fn update_user(db: &DatabaseConnection, id: Uuid, changes: UpdateUser) -> Result<user::Model, ServiceError> {
    let existing = user::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::not_found("user"))?;
    let mut am: user::ActiveModel = existing.into();
    if let Some(name) = changes.name.as_deref() {
        user::validate_name(name)?;
        am.name = Set(name.to_string());
    }
    if let Some(email) = changes.email.as_deref() {
        user::validate_email(email)?;
        am.email = Set(email.to_string());
    }
    am.updated_at = Set(Utc::now().into());
    let updated = am.update(db).await.map_err(ServiceError::from)?;
    Ok(updated)
}

/// Hard-delete a user; subsequent reads of the id fail with NotFound.
pub async fn delete_user(db: &DatabaseConnection, id: Uuid) -> Result<(), ServiceError> {
    let res = user::Entity::delete_by_id(id).exec(db).await.map_err(ServiceError::from)?;
    if res.rows_affected == 0 {
        return Err(ServiceError::not_found("user"));
    }
    Ok(())
}

/// List users ordered by creation time ascending (id breaks ties), bounded
/// by pagination. Each call issues an independent query, so the sequence is
/// restartable.
pub async fn list_users(
    db: &DatabaseConnection,
    filter: UserFilter,
    opts: Pagination,
) -> Result<Vec<user::Model>, ServiceError> {
    let (page_idx, per_page) = opts.clamp();
    let mut finder = user::Entity::find();
    if let Some(name) = filter.name.as_deref() {
        finder = finder.filter(user::Column::Name.contains(name));
    }
    if let Some(email) = filter.email.as_deref() {
        finder = finder.filter(user::Column::Email.eq(email));
    }
    let rows = finder
        .order_by_asc(user::Column::CreatedAt)
        .order_by_asc(user::Column::Id)
        .paginate(db, per_page)
        .fetch_page(page_idx)
        .await
        .map_err(ServiceError::from)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::get_db;

    fn unique_email(tag: &str) -> String {
        format!("{}_{}@example.com", tag, Uuid::new_v4())
    }

    #[tokio::test]
    async fn user_crud_roundtrip() -> Result<(), anyhow::Error> {
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("DATABASE_URL missing; skip user_crud_roundtrip");
            return Ok(());
        }
        let db = get_db().await?;

        let email = unique_email("crud");
        let created = create_user(&db, "a", &email).await?;
        assert_eq!(created.name, "a");
        assert_eq!(created.email, email);
        assert_eq!(created.created_at, created.updated_at);

        let found = get_user(&db, created.id).await?;
        assert_eq!(found.id, created.id);
        assert_eq!(found.name, "a");
        assert_eq!(found.email, email);

        let updated = update_user(
            &db,
            created.id,
            UpdateUser { name: Some("b".into()), email: None },
        )
        .await?;
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "b");
        assert_eq!(updated.email, email);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);

        delete_user(&db, created.id).await?;
        let after = get_user(&db, created.id).await;
        assert!(matches!(after, Err(ServiceError::NotFound(_))));

        Ok(())
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() -> Result<(), anyhow::Error> {
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("DATABASE_URL missing; skip unknown_id_is_not_found");
            return Ok(());
        }
        let db = get_db().await?;
        let ghost = Uuid::new_v4();

        assert!(matches!(get_user(&db, ghost).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(
            update_user(&db, ghost, UpdateUser { name: Some("x".into()), email: None }).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(delete_user(&db, ghost).await, Err(ServiceError::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn create_rejects_bad_input_and_duplicates() -> Result<(), anyhow::Error> {
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("DATABASE_URL missing; skip create_rejects_bad_input_and_duplicates");
            return Ok(());
        }
        let db = get_db().await?;

        assert!(matches!(
            create_user(&db, "", "ok@example.com").await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            create_user(&db, "Bob", "not-an-email").await,
            Err(ServiceError::Validation(_))
        ));

        let email = unique_email("dup");
        let first = create_user(&db, "First", &email).await?;
        let second = create_user(&db, "Second", &email).await;
        assert!(matches!(second, Err(ServiceError::Conflict(_))));

        delete_user(&db, first.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn update_to_taken_email_is_conflict() -> Result<(), anyhow::Error> {
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("DATABASE_URL missing; skip update_to_taken_email_is_conflict");
            return Ok(());
        }
        let db = get_db().await?;

        let a = create_user(&db, "Holder", &unique_email("upd")).await?;
        let b = create_user(&db, "Mover", &unique_email("upd")).await?;

        let res = update_user(
            &db,
            b.id,
            UpdateUser { name: None, email: Some(a.email.clone()) },
        )
        .await;
        assert!(matches!(res, Err(ServiceError::Conflict(_))));

        // the failed update left b untouched
        let still = get_user(&db, b.id).await?;
        assert_eq!(still.email, b.email);
        assert_eq!(still.updated_at, b.updated_at);

        delete_user(&db, a.id).await?;
        delete_user(&db, b.id).await?;
        Ok(())
    }

    #[tokio::test]
    async fn list_orders_by_creation_and_filters() -> Result<(), anyhow::Error> {
        if std::env::var("DATABASE_URL").is_err() {
            eprintln!("DATABASE_URL missing; skip list_orders_by_creation_and_filters");
            return Ok(());
        }
        let db = get_db().await?;

        let tag = Uuid::new_v4().simple().to_string();
        let u1 = create_user(&db, &format!("list-{tag}-1"), &unique_email("list")).await?;
        let u2 = create_user(&db, &format!("list-{tag}-2"), &unique_email("list")).await?;
        let u3 = create_user(&db, &format!("list-{tag}-3"), &unique_email("list")).await?;

        let filter = UserFilter { name: Some(format!("list-{tag}")), email: None };
        let rows = list_users(&db, filter.clone(), Pagination::default()).await?;
        assert_eq!(rows.len(), 3);
        // creation order, no duplicate ids
        assert!(rows.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        let ids: std::collections::HashSet<Uuid> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 3);

        // exact email filter hits exactly one row
        let by_email = list_users(
            &db,
            UserFilter { name: None, email: Some(u2.email.clone()) },
            Pagination::default(),
        )
        .await?;
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].id, u2.id);

        // pagination bounds the page size
        let page1 = list_users(&db, filter.clone(), Pagination { page: 1, per_page: 2 }).await?;
        assert_eq!(page1.len(), 2);
        let page2 = list_users(&db, filter, Pagination { page: 2, per_page: 2 }).await?;
        assert_eq!(page2.len(), 1);
        assert!(page1.iter().all(|r| r.id != page2[0].id));

        for u in [u1, u2, u3] {
            delete_user(&db, u.id).await?;
        }
        Ok(())
    }
}
