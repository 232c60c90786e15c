use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::context::RequestContext;
use crate::domain::user::{ProfileUpdate, User, UserId};
use crate::errors::ApplicationError;
use crate::repository::UserRepository;

/// Lazily created user roster with editable profile fields.
#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { users, clock }
    }

    /// Returns the stored user, creating it on first interaction. A non-blank
    /// `display_name` replaces the stored one.
    pub async fn ensure_user(
        &self,
        id: &UserId,
        display_name: &str,
        ctx: &RequestContext,
    ) -> Result<User, ApplicationError> {
        let display_name = display_name.trim();
        if let Some(mut existing) = self.users.find_by_id(id).await? {
            if display_name.is_empty() || existing.display_name == display_name {
                return Ok(existing);
            }
            existing.display_name = display_name.to_owned();
            existing.updated_at = self.clock.now();
            self.users.save(existing.clone()).await?;
            debug!(
                event_name = "user.renamed",
                correlation_id = %ctx.correlation_id,
                user_id = %id.as_str(),
                "display name refreshed"
            );
            return Ok(existing);
        }

        let user = User::new(id.clone(), display_name, self.clock.now());
        self.users.save(user.clone()).await?;
        info!(
            event_name = "user.created",
            correlation_id = %ctx.correlation_id,
            user_id = %id.as_str(),
            "user registered"
        );
        Ok(user)
    }

    pub async fn find_user(&self, id: &UserId) -> Result<Option<User>, ApplicationError> {
        Ok(self.users.find_by_id(id).await?)
    }

    /// Replaces the editable fields. Unknown users are created first.
    pub async fn update_profile(
        &self,
        id: &UserId,
        display_name: &str,
        update: ProfileUpdate,
        ctx: &RequestContext,
    ) -> Result<User, ApplicationError> {
        update.validate()?;

        let mut user = self.ensure_user(id, display_name, ctx).await?;
        update.apply(&mut user, self.clock.now());
        self.users.save(user.clone()).await?;

        info!(
            event_name = "user.profile_updated",
            correlation_id = %ctx.correlation_id,
            user_id = %id.as_str(),
            "profile updated"
        );
        Ok(user)
    }

    /// Every user, ordered by display name then id.
    pub async fn list_users(&self) -> Result<Vec<User>, ApplicationError> {
        let mut users = self.users.list().await?;
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }
}
