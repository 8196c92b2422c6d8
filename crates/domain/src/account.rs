//! Accounts, credentials and sessions.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::DocumentId;
use doc_store::{Changes, DocumentStore, DocumentStoreExt, Filter, WriteOptions, timestamp_value};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{DomainError, Result};
use crate::model::{Account, AssetRef, Session, collections};
use crate::ports::{AssetHost, PasswordHasher};
use crate::support::{self, optional, required};

/// How long issued tokens stay valid.
#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(60),
            refresh_ttl: Duration::days(10),
        }
    }
}

/// Command to register a new account.
#[derive(Debug, Clone, Default)]
pub struct RegisterAccount {
    pub fullname: String,
    pub email: String,
    pub username: String,
    pub password: String,
    /// Staged avatar file; required.
    pub avatar_path: Option<String>,
    pub cover_image_path: Option<String>,
}

/// Login by username or email.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// An account together with a freshly issued token pair.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub account: Account,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewAccount<'a> {
    username: &'a str,
    email: &'a str,
    fullname: &'a str,
    avatar: &'a AssetRef,
    cover_image: Option<&'a AssetRef>,
    watch_history: Vec<DocumentId>,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewSession<'a> {
    token: &'a str,
    account: DocumentId,
    expires_at: DateTime<Utc>,
}

fn unique_account_fields() -> WriteOptions {
    WriteOptions::unique_on(["username", "email"])
}

/// Service for account lifecycle and authentication.
pub struct AccountService<S: DocumentStore> {
    store: S,
    assets: Arc<dyn AssetHost>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: TokenPolicy,
}

impl<S: DocumentStore> AccountService<S> {
    pub fn new(
        store: S,
        assets: Arc<dyn AssetHost>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: TokenPolicy,
    ) -> Self {
        Self {
            store,
            assets,
            hasher,
            tokens,
        }
    }

    /// Registers an account, uploading its avatar and optional cover image.
    #[tracing::instrument(skip(self, cmd), fields(username = %cmd.username))]
    pub async fn register(&self, cmd: RegisterAccount) -> Result<Account> {
        let all_required = "All fields are required";
        let fullname = required(&cmd.fullname, all_required)?;
        let email = required(&cmd.email, all_required)?;
        let username = required(&cmd.username, all_required)?.to_lowercase();
        let password = required(&cmd.password, all_required)?;

        if self
            .store
            .find_one(collections::ACCOUNTS, &Filter::new().eq("username", username.as_str()))
            .await?
            .is_some()
        {
            return Err(DomainError::Conflict("This username already exists".into()));
        }
        if self
            .store
            .find_one(collections::ACCOUNTS, &Filter::new().eq("email", email.as_str()))
            .await?
            .is_some()
        {
            return Err(DomainError::Conflict("This email is already registered".into()));
        }

        let avatar_path = optional(cmd.avatar_path.as_deref())
            .ok_or_else(|| DomainError::validation("Avatar file is required"))?;
        let avatar = self
            .assets
            .upload(&avatar_path)
            .await
            .ok_or_else(|| DomainError::infrastructure("Avatar file upload failed"))?;
        let cover_image = match optional(cmd.cover_image_path.as_deref()) {
            Some(path) => match self.assets.upload(&path).await {
                Some(asset) => Some(asset),
                None => {
                    self.assets.delete(&avatar.url).await;
                    return Err(DomainError::infrastructure("Cover image upload failed"));
                }
            },
            None => None,
        };

        let stored = self
            .store_account(&username, &email, &fullname, &password, &avatar, cover_image.as_ref())
            .await;
        match stored {
            Ok(account) => {
                tracing::info!(account_id = %account.id, "account registered");
                Ok(account)
            }
            Err(err) => {
                // Nothing references the uploads once the insert has failed.
                self.assets.delete(&avatar.url).await;
                if let Some(cover) = &cover_image {
                    self.assets.delete(&cover.url).await;
                }
                Err(err)
            }
        }
    }

    async fn store_account(
        &self,
        username: &str,
        email: &str,
        fullname: &str,
        password: &str,
        avatar: &AssetRef,
        cover_image: Option<&AssetRef>,
    ) -> Result<Account> {
        let hash = self.hasher.hash(password)?;
        let new = NewAccount {
            username,
            email,
            fullname,
            avatar,
            cover_image,
            watch_history: Vec::new(),
            password: &hash,
        };
        support::insert(&self.store, collections::ACCOUNTS, &new, unique_account_fields()).await
    }

    /// Verifies credentials and issues a token pair.
    #[tracing::instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: Credentials) -> Result<IssuedTokens> {
        let username = optional(credentials.username.as_deref()).map(|u| u.to_lowercase());
        let email = optional(credentials.email.as_deref());
        if username.is_none() && email.is_none() {
            return Err(DomainError::validation("Username or email required"));
        }

        let mut found = None;
        if let Some(username) = username {
            found = self
                .store
                .find_one(collections::ACCOUNTS, &Filter::new().eq("username", username))
                .await?;
        }
        if found.is_none()
            && let Some(email) = email
        {
            found = self
                .store
                .find_one(collections::ACCOUNTS, &Filter::new().eq("email", email))
                .await?;
        }
        let account: Account = found
            .ok_or(DomainError::not_found("User"))?
            .into_typed()?;

        if !self.hasher.verify(&credentials.password, &account.password) {
            return Err(DomainError::unauthorized("Incorrect password"));
        }

        self.issue_tokens(account.id).await
    }

    /// Clears the refresh token and revokes the given access token.
    #[tracing::instrument(skip(self, access_token))]
    pub async fn logout(&self, account_id: DocumentId, access_token: Option<&str>) -> Result<()> {
        self.store
            .update_by_id(
                collections::ACCOUNTS,
                account_id,
                &Changes::new()
                    .unset("refreshToken")
                    .unset("refreshTokenExpiresAt"),
                WriteOptions::new(),
            )
            .await?;

        if let Some(token) = access_token
            && let Some(session) = self
                .store
                .find_one(collections::SESSIONS, &Filter::new().eq("token", token))
                .await?
            && let Some(id) = session.id()
        {
            self.store.delete_by_id(collections::SESSIONS, id).await?;
        }
        Ok(())
    }

    /// Exchanges a valid refresh token for a new token pair. The old refresh
    /// token stops working.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(DomainError::unauthorized("Unauthorized request"));
        }

        let account: Account = self
            .store
            .find_one(
                collections::ACCOUNTS,
                &Filter::new().eq("refreshToken", refresh_token),
            )
            .await?
            .ok_or_else(|| DomainError::unauthorized("Invalid refresh token"))?
            .into_typed()?;

        let expired = account
            .refresh_token_expires_at
            .is_none_or(|at| at <= Utc::now());
        if expired {
            return Err(DomainError::unauthorized("Refresh token is expired or used"));
        }

        self.issue_tokens(account.id).await
    }

    /// Resolves an access token to its account.
    #[tracing::instrument(skip(self, access_token))]
    pub async fn authenticate(&self, access_token: &str) -> Result<Account> {
        let invalid = || DomainError::unauthorized("Invalid access token");

        let session: Session = self
            .store
            .find_one(collections::SESSIONS, &Filter::new().eq("token", access_token))
            .await?
            .ok_or_else(invalid)?
            .into_typed()?;
        if session.is_expired(Utc::now()) {
            self.store
                .delete_by_id(collections::SESSIONS, session.id)
                .await?;
            return Err(invalid());
        }

        support::load(&self.store, collections::ACCOUNTS, session.account, "User")
            .await
            .map_err(|err| match err {
                DomainError::NotFound { .. } => invalid(),
                other => other,
            })
    }

    #[tracing::instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        account_id: DocumentId,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let new_password = required(new_password, "New password is required")?;
        let account = self.get(account_id).await?;
        if !self.hasher.verify(old_password, &account.password) {
            return Err(DomainError::validation("Invalid password"));
        }

        let hash = self.hasher.hash(&new_password)?;
        self.store
            .update_by_id(
                collections::ACCOUNTS,
                account_id,
                &Changes::new().set("password", hash),
                WriteOptions::new(),
            )
            .await?;
        Ok(())
    }

    /// Loads an account.
    pub async fn get(&self, account_id: DocumentId) -> Result<Account> {
        support::load(&self.store, collections::ACCOUNTS, account_id, "User").await
    }

    /// Updates the display name and/or email; at least one is required.
    #[tracing::instrument(skip(self))]
    pub async fn update_details(
        &self,
        account_id: DocumentId,
        fullname: Option<&str>,
        email: Option<&str>,
    ) -> Result<Account> {
        let fullname = optional(fullname);
        let email = optional(email);
        if fullname.is_none() && email.is_none() {
            return Err(DomainError::validation("All fields are required"));
        }

        let mut changes = Changes::new();
        if let Some(fullname) = fullname {
            changes = changes.set("fullname", fullname);
        }
        if let Some(email) = email {
            changes = changes.set("email", email);
        }
        self.apply(account_id, changes).await
    }

    /// Replaces the avatar; the previous asset is removed from the host.
    #[tracing::instrument(skip(self))]
    pub async fn update_avatar(&self, account_id: DocumentId, local_path: &str) -> Result<Account> {
        self.replace_image(account_id, "avatar", local_path).await
    }

    /// Replaces the cover image; the previous asset is removed from the host.
    #[tracing::instrument(skip(self))]
    pub async fn update_cover_image(
        &self,
        account_id: DocumentId,
        local_path: &str,
    ) -> Result<Account> {
        self.replace_image(account_id, "coverImage", local_path).await
    }

    async fn replace_image(
        &self,
        account_id: DocumentId,
        field: &str,
        local_path: &str,
    ) -> Result<Account> {
        let local_path = required(local_path, &format!("{field} file is missing"))?;
        let previous = self.get(account_id).await?;

        let asset = self
            .assets
            .upload(&local_path)
            .await
            .ok_or_else(|| DomainError::infrastructure(format!("Error while uploading {field}")))?;
        let updated = self
            .apply(
                account_id,
                Changes::new().set(field, serde_json::to_value(&asset)?),
            )
            .await?;

        let old = match field {
            "avatar" => previous.avatar,
            _ => previous.cover_image,
        };
        if let Some(old) = old
            && !self.assets.delete(&old.url).await
        {
            tracing::warn!(url = %old.url, "failed to delete replaced asset");
        }
        Ok(updated)
    }

    async fn apply(&self, account_id: DocumentId, changes: Changes) -> Result<Account> {
        let doc = self
            .store
            .update_by_id(
                collections::ACCOUNTS,
                account_id,
                &changes,
                unique_account_fields(),
            )
            .await?
            .ok_or(DomainError::not_found("User"))?;
        Ok(doc.into_typed()?)
    }

    async fn issue_tokens(&self, account_id: DocumentId) -> Result<IssuedTokens> {
        let now = Utc::now();
        let access_token = Uuid::new_v4().simple().to_string();
        let refresh_token = Uuid::new_v4().simple().to_string();

        let session = NewSession {
            token: &access_token,
            account: account_id,
            expires_at: now + self.tokens.access_ttl,
        };
        let _: Session = support::insert(
            &self.store,
            collections::SESSIONS,
            &session,
            WriteOptions::unique_on(["token"]),
        )
        .await?;

        let account = self
            .apply(
                account_id,
                Changes::new()
                    .set("refreshToken", refresh_token.as_str())
                    .set(
                        "refreshTokenExpiresAt",
                        timestamp_value(now + self.tokens.refresh_ttl),
                    ),
            )
            .await?;

        Ok(IssuedTokens {
            account,
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use doc_store::InMemoryDocumentStore;

    use super::*;
    use crate::ports::InMemoryAssetHost;
    use crate::testing::PlainHasher;

    fn service() -> (AccountService<InMemoryDocumentStore>, InMemoryAssetHost) {
        let assets = InMemoryAssetHost::new();
        let service = AccountService::new(
            InMemoryDocumentStore::new(),
            Arc::new(assets.clone()),
            Arc::new(PlainHasher),
            TokenPolicy::default(),
        );
        (service, assets)
    }

    fn registration(username: &str, email: &str) -> RegisterAccount {
        RegisterAccount {
            fullname: "Alice A".into(),
            email: email.into(),
            username: username.into(),
            password: "secret".into(),
            avatar_path: Some("/tmp/avatar.png".into()),
            cover_image_path: None,
        }
    }

    #[tokio::test]
    async fn failed_cover_upload_fails_registration_and_drops_avatar() {
        let (service, assets) = service();
        let mut cmd = registration("alice", "a@x.io");
        // No file stem, so the in-memory host refuses it.
        cmd.cover_image_path = Some("/".into());

        let err = service.register(cmd).await.unwrap_err();

        assert!(matches!(err, DomainError::Infrastructure(ref m) if m == "Cover image upload failed"));
        assert!(assets.is_empty().await);
        assert_eq!(
            service
                .store
                .count(collections::ACCOUNTS, &Filter::new())
                .await
                .unwrap(),
            0
        );
    }

    /// Store whose account lookups always miss, as when a concurrent
    /// registration lands between the duplicate checks and the insert.
    #[derive(Clone, Default)]
    struct StaleLookups(InMemoryDocumentStore);

    #[async_trait::async_trait]
    impl DocumentStore for StaleLookups {
        async fn insert(
            &self,
            collection: &str,
            doc: doc_store::Document,
            options: WriteOptions,
        ) -> doc_store::Result<doc_store::Document> {
            self.0.insert(collection, doc, options).await
        }

        async fn find(
            &self,
            collection: &str,
            filter: &Filter,
        ) -> doc_store::Result<Vec<doc_store::Document>> {
            if collection == collections::ACCOUNTS {
                return Ok(Vec::new());
            }
            self.0.find(collection, filter).await
        }

        async fn find_by_id(
            &self,
            collection: &str,
            id: DocumentId,
        ) -> doc_store::Result<Option<doc_store::Document>> {
            self.0.find_by_id(collection, id).await
        }

        async fn count(&self, collection: &str, filter: &Filter) -> doc_store::Result<u64> {
            self.0.count(collection, filter).await
        }

        async fn update_by_id(
            &self,
            collection: &str,
            id: DocumentId,
            changes: &Changes,
            options: WriteOptions,
        ) -> doc_store::Result<Option<doc_store::Document>> {
            self.0.update_by_id(collection, id, changes, options).await
        }

        async fn delete_by_id(&self, collection: &str, id: DocumentId) -> doc_store::Result<bool> {
            self.0.delete_by_id(collection, id).await
        }

        async fn delete_cascade(
            &self,
            collection: &str,
            id: DocumentId,
            rules: &[doc_store::Cascade],
        ) -> doc_store::Result<bool> {
            self.0.delete_cascade(collection, id, rules).await
        }

        async fn toggle(
            &self,
            collection: &str,
            key: &Filter,
        ) -> doc_store::Result<doc_store::Toggled> {
            self.0.toggle(collection, key).await
        }

        async fn aggregate(
            &self,
            collection: &str,
            pipeline: &doc_store::Pipeline,
        ) -> doc_store::Result<Vec<doc_store::Document>> {
            self.0.aggregate(collection, pipeline).await
        }
    }

    #[tokio::test]
    async fn losing_the_insert_race_releases_uploads() {
        let assets = InMemoryAssetHost::new();
        let service = AccountService::new(
            StaleLookups::default(),
            Arc::new(assets.clone()),
            Arc::new(PlainHasher),
            TokenPolicy::default(),
        );
        service.register(registration("alice", "a@x.io")).await.unwrap();
        assert_eq!(assets.len().await, 1);

        let mut late = registration("alice", "other@x.io");
        late.cover_image_path = Some("/tmp/cover.png".into());
        let err = service.register(late).await.unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(assets.len().await, 1);
    }

    #[tokio::test]
    async fn register_lowercases_handle_and_hashes_password() {
        let (service, assets) = service();
        let account = service
            .register(registration("Alice", "a@x.io"))
            .await
            .unwrap();

        assert_eq!(account.username, "alice");
        assert_ne!(account.password, "secret");
        assert!(assets.contains(&account.avatar.unwrap().url).await);
    }

    #[tokio::test]
    async fn register_rejects_taken_handle_and_email() {
        let (service, _) = service();
        service.register(registration("alice", "a@x.io")).await.unwrap();

        let err = service
            .register(registration("ALICE", "other@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = service
            .register(registration("bob", "a@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn register_requires_avatar_and_fields() {
        let (service, _) = service();
        let mut cmd = registration("alice", "a@x.io");
        cmd.avatar_path = None;
        assert!(matches!(
            service.register(cmd).await,
            Err(DomainError::Validation(_))
        ));

        let mut cmd = registration("alice", "a@x.io");
        cmd.fullname = "  ".into();
        assert!(matches!(
            service.register(cmd).await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn failed_avatar_upload_is_infrastructure_error() {
        let service = AccountService::new(
            InMemoryDocumentStore::new(),
            Arc::new(InMemoryAssetHost::failing()),
            Arc::new(PlainHasher),
            TokenPolicy::default(),
        );
        let err = service
            .register(registration("alice", "a@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Infrastructure(_)));
    }

    #[tokio::test]
    async fn login_then_authenticate_and_logout() {
        let (service, _) = service();
        service.register(registration("alice", "a@x.io")).await.unwrap();

        let issued = service
            .login(Credentials {
                email: Some("a@x.io".into()),
                password: "secret".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let account = service.authenticate(&issued.access_token).await.unwrap();
        assert_eq!(account.id, issued.account.id);

        service
            .logout(account.id, Some(&issued.access_token))
            .await
            .unwrap();
        assert!(matches!(
            service.authenticate(&issued.access_token).await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(service.get(account.id).await.unwrap().refresh_token.is_none());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_unknown_user() {
        let (service, _) = service();
        service.register(registration("alice", "a@x.io")).await.unwrap();

        let wrong = service
            .login(Credentials {
                username: Some("alice".into()),
                password: "nope".into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(wrong, Err(DomainError::Unauthorized(_))));

        let unknown = service
            .login(Credentials {
                username: Some("zed".into()),
                password: "secret".into(),
                ..Default::default()
            })
            .await;
        assert!(matches!(unknown, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn refresh_rotates_the_refresh_token() {
        let (service, _) = service();
        service.register(registration("alice", "a@x.io")).await.unwrap();
        let first = service
            .login(Credentials {
                username: Some("alice".into()),
                password: "secret".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let second = service.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert!(matches!(
            service.refresh(&first.refresh_token).await,
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn change_password_verifies_the_old_one() {
        let (service, _) = service();
        let account = service.register(registration("alice", "a@x.io")).await.unwrap();

        assert!(matches!(
            service.change_password(account.id, "wrong", "next").await,
            Err(DomainError::Validation(_))
        ));
        service
            .change_password(account.id, "secret", "next")
            .await
            .unwrap();
        assert!(
            service
                .login(Credentials {
                    username: Some("alice".into()),
                    password: "next".into(),
                    ..Default::default()
                })
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn update_details_keeps_email_unique() {
        let (service, _) = service();
        let alice = service.register(registration("alice", "a@x.io")).await.unwrap();
        service.register(registration("bob", "b@x.io")).await.unwrap();

        assert!(matches!(
            service.update_details(alice.id, None, None).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.update_details(alice.id, None, Some("b@x.io")).await,
            Err(DomainError::Conflict(_))
        ));
        let updated = service
            .update_details(alice.id, Some("Alice B"), None)
            .await
            .unwrap();
        assert_eq!(updated.fullname, "Alice B");
    }

    #[tokio::test]
    async fn replacing_avatar_deletes_the_old_asset() {
        let (service, assets) = service();
        let account = service.register(registration("alice", "a@x.io")).await.unwrap();
        let old_url = account.avatar.unwrap().url;

        let updated = service
            .update_avatar(account.id, "/tmp/new.png")
            .await
            .unwrap();
        assert_ne!(updated.avatar.unwrap().url, old_url);
        assert!(!assets.contains(&old_url).await);
    }
}
