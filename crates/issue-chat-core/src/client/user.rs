//! Current-user and repository access operations.

use tracing::instrument;

use super::cache::Operation;
use super::ChatClient;
use crate::error::ChatResult;
use crate::models::User;

impl ChatClient {
    /// Get the user the token belongs to. Cached for the user TTL.
    #[instrument(skip(self))]
    pub async fn get_current_user(&self) -> ChatResult<User> {
        let token = self.require_token()?;
        let key = self.cache_key(Operation::CurrentUser, None, &());

        let client = self.clone();
        let user = self
            .read(key, true, async move {
                client.executor().get::<User>("/user", Some(&token)).await
            })
            .await?;
        Ok(user)
    }

    /// Whether the token can see the chat repository.
    ///
    /// GitHub hides private repositories behind 404, so both 403 and 404 mean
    /// no access. Other failures propagate.
    #[instrument(skip(self), fields(repository = %self.repository()))]
    pub async fn check_repository_access(&self) -> ChatResult<bool> {
        let token = self.token();
        let result = self
            .executor()
            .get::<serde_json::Value>(&self.repo_path(), token.as_ref())
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_access_denied() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
