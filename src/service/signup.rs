//! Signup flow
//!
//! Applications come in as signup requests, are approved by an admin
//! (which creates the invited account and mints the invitation link),
//! and complete when the applicant redeems the signup token. Signin
//! links for existing accounts live here too.

use std::sync::Arc;

use chrono::Utc;

use crate::data::{
    Account, AccountStatus, Database, EntityId, SignupRequest, SignupState, TokenType,
};
use crate::error::AppError;
use crate::federation::{FederationContext, RelationshipEngine};
use crate::service::TokenService;

/// Outcome of an approval: the updated request, the invited account and
/// the raw invitation token. The token appears in exactly one outbound
/// message and is never recoverable afterwards.
#[derive(Debug)]
pub struct ApprovedSignup {
    pub request: SignupRequest,
    pub account: Account,
    pub token: String,
}

fn is_unique_violation(error: &AppError) -> bool {
    match error {
        AppError::Database(sqlx::Error::Database(db_error)) => db_error.is_unique_violation(),
        _ => false,
    }
}

/// Signup service
pub struct SignupService {
    db: Arc<Database>,
    tokens: Arc<TokenService>,
    engine: Arc<RelationshipEngine>,
    signup_ttl_minutes: i64,
    signin_ttl_minutes: i64,
}

impl SignupService {
    /// Create new signup service
    pub fn new(
        db: Arc<Database>,
        tokens: Arc<TokenService>,
        engine: Arc<RelationshipEngine>,
        signup_ttl_minutes: i64,
        signin_ttl_minutes: i64,
    ) -> Self {
        Self {
            db,
            tokens,
            engine,
            signup_ttl_minutes,
            signin_ttl_minutes,
        }
    }

    /// Submit a new signup request.
    ///
    /// A previously used email is a Conflict; this surface is not
    /// secret-bearing, so the duplicate is reported as such.
    pub async fn submit(
        &self,
        username: &str,
        email: &str,
        intro: Option<String>,
    ) -> Result<SignupRequest, AppError> {
        let username = username.trim();
        let email = email.trim();

        if username.is_empty() || email.is_empty() {
            return Err(AppError::Validation(
                "username and email are required".to_string(),
            ));
        }
        if email.split('@').filter(|part| !part.is_empty()).count() != 2 {
            return Err(AppError::Validation("email is not valid".to_string()));
        }

        if self.db.find_signup_request_by_email(email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let now = Utc::now();
        let request = SignupRequest {
            id: EntityId::new().0,
            username: username.to_string(),
            email: email.to_string(),
            intro: intro.filter(|text| !text.trim().is_empty()),
            state: SignupState::Pending.as_str().to_string(),
            invitation_account_id: None,
            created_at: now,
            updated_at: now,
        };
        self.db.insert_signup_request(&request).await?;

        tracing::info!(request_id = %request.id, username, "Signup request received");
        Ok(request)
    }

    /// Approve a pending request: create the invited account, link it,
    /// and mint the invitation token.
    ///
    /// Approving a request that is not pending returns None without
    /// touching anything, so retries are harmless.
    pub async fn approve(&self, request_id: &str) -> Result<Option<ApprovedSignup>, AppError> {
        let Some(request) = self.db.get_signup_request(request_id).await? else {
            return Ok(None);
        };
        if request.state != SignupState::Pending.as_str() {
            tracing::debug!(
                request_id = %request.id,
                state = %request.state,
                "Refusing to approve a non-pending request"
            );
            return Ok(None);
        }

        let now = Utc::now();
        let account = Account {
            id: EntityId::new().0,
            username: request.username.clone(),
            email: request.email.clone(),
            intro: request.intro.clone(),
            status: AccountStatus::Invited.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        if let Err(error) = self.db.insert_account(&account).await {
            if is_unique_violation(&error) {
                return Err(AppError::Conflict(
                    "Username or email already belongs to an account".to_string(),
                ));
            }
            return Err(error);
        }

        let approved = self
            .db
            .approve_signup_request(&request.id, &account.id, now)
            .await?;
        if !approved {
            // Lost a race with another approval; the invited account row
            // stays inert and unreferenced
            tracing::warn!(request_id = %request.id, "Request left pending state concurrently");
            return Ok(None);
        }

        let token = self
            .tokens
            .issue(
                TokenType::Signup,
                Some(&account.id),
                Some(&request.id),
                Some(self.signup_ttl_minutes),
            )
            .await?;

        let request = SignupRequest {
            state: SignupState::Approved.as_str().to_string(),
            invitation_account_id: Some(account.id.clone()),
            updated_at: now,
            ..request
        };

        tracing::info!(
            request_id = %request.id,
            account_id = %account.id,
            "Signup request approved"
        );

        Ok(Some(ApprovedSignup {
            request,
            account,
            token,
        }))
    }

    /// Reject a pending request. Non-pending requests are a no-op.
    pub async fn reject(&self, request_id: &str) -> Result<bool, AppError> {
        let rejected = self
            .db
            .reject_signup_request(request_id, Utc::now())
            .await?;
        if rejected {
            tracing::info!(request_id, "Signup request rejected");
        }
        Ok(rejected)
    }

    /// Complete a signup by redeeming the invitation token.
    ///
    /// Consumes the token, then flips request and account state inside
    /// one transaction, then syncs the new account into its actor
    /// record. Every failure mode is the same opaque None.
    pub async fn complete(
        &self,
        ctx: &FederationContext,
        raw_token: &str,
    ) -> Result<Option<Account>, AppError> {
        let Some(request) = self.tokens.consume_signup_token(raw_token).await? else {
            return Ok(None);
        };

        // consume_signup_token only returns approved requests with an account
        let Some(account_id) = request.invitation_account_id.as_deref() else {
            return Ok(None);
        };

        let completed = self
            .db
            .complete_signup(&request.id, account_id, Utc::now())
            .await?;
        if !completed {
            tracing::debug!(request_id = %request.id, "Signup completion raced; nothing changed");
            return Ok(None);
        }

        let account = self
            .db
            .get_account(account_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("account missing after activation"))?;

        self.engine.sync_actor_from_account(ctx, &account).await?;

        tracing::info!(username = %account.username, "Signup completed");
        Ok(Some(account))
    }

    /// Issue a signin link token for the account behind an email.
    ///
    /// Returns None when no account matches; callers answer identically
    /// either way.
    pub async fn request_signin(
        &self,
        email: &str,
    ) -> Result<Option<(Account, String)>, AppError> {
        let Some(account) = self.db.get_account_by_email(email.trim()).await? else {
            return Ok(None);
        };

        let token = self
            .tokens
            .issue(
                TokenType::Signin,
                Some(&account.id),
                None,
                Some(self.signin_ttl_minutes),
            )
            .await?;

        Ok(Some((account, token)))
    }

    /// Redeem a signin token for its active account.
    pub async fn signin(&self, raw_token: &str) -> Result<Option<Account>, AppError> {
        self.tokens.consume_signin_token(raw_token).await
    }
}
