use crate::{
    auth::{
        is_known_role,
        password::{hash_password, validate_password_strength, verify_password},
    },
    db::DbPool,
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_role(role: &str) -> Result<(), ValidationError> {
    if is_known_role(role) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_role"))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(custom = "validate_role")]
    pub role: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub full_name: Option<String>,
    #[validate(custom = "validate_role")]
    pub role: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    pub search: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<chrono::DateTime<Utc>>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<user::Model> for UserView {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            role: u.role,
            is_active: u.is_active,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    async fn ensure_unique(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        except: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut any = Condition::any();
        if let Some(username) = username {
            any = any.add(user::Column::Username.eq(username));
        }
        if let Some(email) = email {
            any = any.add(user::Column::Email.eq(email));
        }
        let mut query = UserEntity::find().filter(any);
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }
        if query.one(&*self.db_pool).await?.is_some() {
            return Err(ServiceError::Conflict(
                "Username or email already in use".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, request), fields(username = %request.username, role = %request.role))]
    pub async fn create(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        request.validate()?;
        validate_password_strength(&request.password)?;
        let username = request.username.trim().to_lowercase();
        let email = request.email.trim().to_lowercase();
        self.ensure_unique(Some(&username), Some(&email), None).await?;

        let now = Utc::now();
        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username),
            email: Set(email),
            full_name: Set(request.full_name.trim().to_string()),
            password_hash: Set(hash_password(&request.password)?),
            role: Set(request.role),
            is_active: Set(true),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;
        info!(user_id = %model.id, "User created");
        Ok(model)
    }

    pub async fn get(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        UserEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    pub async fn list(
        &self,
        filter: &UserFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        let mut query = UserEntity::find();
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(user::Column::Username.contains(term))
                    .add(user::Column::Email.contains(term))
                    .add(user::Column::FullName.contains(term)),
            );
        }
        if let Some(role) = &filter.role {
            query = query.filter(user::Column::Role.eq(role.as_str()));
        }
        if let Some(active) = filter.active {
            query = query.filter(user::Column::IsActive.eq(active));
        }
        let paginator = query
            .order_by_asc(user::Column::Username)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items, total))
    }

    #[instrument(skip(self, request), fields(user_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateUserRequest,
        actor_id: Uuid,
    ) -> Result<user::Model, ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        if id == actor_id && request.is_active == Some(false) {
            return Err(ServiceError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            ));
        }
        let email = request.email.map(|e| e.trim().to_lowercase());
        if let Some(email) = &email {
            self.ensure_unique(None, Some(email), Some(id)).await?;
        }

        let mut active: user::ActiveModel = existing.into();
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(full_name) = request.full_name {
            active.full_name = Set(full_name.trim().to_string());
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(is_active) = request.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db_pool).await?)
    }

    pub async fn reset_password(&self, id: Uuid, new_password: &str) -> Result<(), ServiceError> {
        validate_password_strength(new_password)?;
        let existing = self.get(id).await?;
        let mut active: user::ActiveModel = existing.into();
        active.password_hash = Set(hash_password(new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db_pool).await?;
        info!(user_id = %id, "Password reset");
        Ok(())
    }

    pub async fn change_password(
        &self,
        id: Uuid,
        request: ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        request.validate()?;
        let existing = self.get(id).await?;
        if !verify_password(&request.current_password, &existing.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }
        self.reset_password(id, &request.new_password).await
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete(&self, id: Uuid, actor_id: Uuid) -> Result<(), ServiceError> {
        if id == actor_id {
            return Err(ServiceError::BadRequest(
                "You cannot delete your own account".to_string(),
            ));
        }
        let result = UserEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("User", id));
        }
        info!("User deleted");
        Ok(())
    }

    /// Look up by username or email and check the password.
    ///
    /// Returns `Ok(None)` for unknown users and wrong passwords alike.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> Result<Option<user::Model>, ServiceError> {
        let login = login.trim().to_lowercase();
        let found = UserEntity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(login.as_str()))
                    .add(user::Column::Email.eq(login.as_str())),
            )
            .one(&*self.db_pool)
            .await?;
        let Some(found) = found else {
            return Ok(None);
        };
        if verify_password(password, &found.password_hash)? {
            Ok(Some(found))
        } else {
            warn!(user_id = %found.id, "Password mismatch");
            Ok(None)
        }
    }

    pub async fn touch_last_login(&self, id: Uuid) -> Result<(), ServiceError> {
        user::ActiveModel {
            id: Set(id),
            last_login_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .update(&*self.db_pool)
        .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<u64, ServiceError> {
        Ok(UserEntity::find().count(&*self.db_pool).await?)
    }
}
