//! OTP workflow orchestration
//!
//! Per-email state lives only in the verification cache:
//!
//! ```text
//! NoPendingOTP --issue--> PendingOTP --redeem--> Verified
//!                         PendingOTP --TTL-----> NoPendingOTP
//!                         PendingOTP --wrong---> PendingOTP (InvalidCode)
//! ```
//!
//! Single redemption relies on the cache delete: of two concurrent
//! redemptions only the one whose delete removes the key succeeds.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use vouch_shared::utils::masking::mask_email;
use vouch_shared::utils::validation::{is_valid_email, normalize_email};

use crate::domain::entities::{NewUser, NotificationEvent, OtpRecord, User};
use crate::errors::{DomainError, DomainResult, OtpError};
use crate::repositories::UserRepository;

use super::config::OtpServiceConfig;
use super::generator::OtpGenerator;
use super::traits::{NotificationPublisherTrait, PasswordHasherTrait, VerificationCacheTrait};
use super::types::{OtpIssued, RegistrationOutcome};

/// Email verification workflow
pub struct OtpService<C, R, P, H>
where
    C: VerificationCacheTrait,
    R: UserRepository,
    P: NotificationPublisherTrait,
    H: PasswordHasherTrait,
{
    cache: Arc<C>,
    users: Arc<R>,
    publisher: Arc<P>,
    hasher: Arc<H>,
    generator: OtpGenerator,
    config: OtpServiceConfig,
}

impl<C, R, P, H> OtpService<C, R, P, H>
where
    C: VerificationCacheTrait,
    R: UserRepository,
    P: NotificationPublisherTrait,
    H: PasswordHasherTrait,
{
    pub fn new(
        cache: Arc<C>,
        users: Arc<R>,
        publisher: Arc<P>,
        hasher: Arc<H>,
        config: OtpServiceConfig,
    ) -> Self {
        Self {
            cache,
            users,
            publisher,
            hasher,
            generator: OtpGenerator::new(config.ttl),
            config,
        }
    }

    pub fn config(&self) -> &OtpServiceConfig {
        &self.config
    }

    /// Issue a fresh code for an existing, unverified user and queue its email
    ///
    /// Fails with `AlreadyVerified` before touching the cache or the queue.
    /// A failed cache write aborts before publishing; a failed publish is
    /// returned to the caller.
    pub async fn request_otp(
        &self,
        cancel: &CancellationToken,
        email: &str,
    ) -> DomainResult<OtpIssued> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(DomainError::validation("email format is invalid"));
        }

        let user = guarded(cancel, self.users.find_by_email(&email))
            .await?
            .ok_or_else(|| DomainError::NotFound {
                resource: "User".to_string(),
            })?;

        if user.is_verified {
            tracing::info!(
                email = %mask_email(&email),
                event = "otp_request_rejected",
                "OTP requested for an already verified email"
            );
            return Err(OtpError::AlreadyVerified.into());
        }

        let record = self.issue(cancel, &email).await?;
        let issued = self.issued(&record);

        self.publish(cancel, &record).await?;
        Ok(issued)
    }

    /// Create an account and issue its first code
    ///
    /// Not atomic across cache and repository: if user creation fails after
    /// the code was cached, the orphaned entry simply expires. A publish
    /// failure after the user exists is reported through
    /// `notification_queued` instead of failing the registration.
    pub async fn register_and_request_otp(
        &self,
        cancel: &CancellationToken,
        new_user: &NewUser,
    ) -> DomainResult<RegistrationOutcome> {
        let new_user = new_user.validated()?;
        let masked = mask_email(&new_user.email);

        if guarded(cancel, self.users.find_by_email(&new_user.email))
            .await?
            .is_some()
        {
            tracing::info!(email = %masked, event = "registration_rejected", "Email already registered");
            return Err(OtpError::EmailAlreadyRegistered.into());
        }

        let password_hash = guarded(cancel, self.hasher.hash(&new_user.password)).await?;
        let record = self.issue(cancel, &new_user.email).await?;

        let user = User::new(new_user.fullname, new_user.email.clone(), password_hash);
        let user_id = guarded(cancel, self.users.create(user)).await.map_err(|e| {
            tracing::warn!(
                email = %masked,
                error = %e,
                event = "registration_failed",
                "User creation failed after the code was cached"
            );
            e
        })?;

        tracing::info!(user_id = %user_id, email = %masked, event = "user_registered", "User registered");

        let notification_queued = match self.publish(cancel, &record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    email = %masked,
                    error = %e,
                    event = "notification_not_queued",
                    "Registration succeeded but the verification email was not queued"
                );
                false
            }
        };

        Ok(RegistrationOutcome {
            user_id,
            otp: self.issued(&record),
            notification_queued,
        })
    }

    /// Redeem `code` and return the email it was issued for
    ///
    /// A wrong submission leaves the pending record untouched.
    pub async fn verify_otp(&self, cancel: &CancellationToken, code: &str) -> DomainResult<String> {
        let code = code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("otp_code is required"));
        }

        let record = guarded(cancel, self.cache.get(code)).await?;

        if !self.generator.validate(code, &record.secret)? {
            tracing::info!(
                email = %mask_email(&record.email),
                event = "otp_invalid",
                "OTP code failed validation"
            );
            return Err(OtpError::InvalidCode.into());
        }

        if !guarded(cancel, self.cache.delete(code)).await? {
            // Someone else redeemed it between our get and delete
            return Err(OtpError::NotFound.into());
        }

        tracing::info!(
            email = %mask_email(&record.email),
            event = "otp_verified",
            "OTP code redeemed"
        );
        Ok(record.email)
    }

    /// Persist the verified status of `email`
    pub async fn confirm_verification(
        &self,
        cancel: &CancellationToken,
        email: &str,
    ) -> DomainResult<()> {
        guarded(cancel, self.users.set_verified(email)).await?;
        tracing::info!(email = %mask_email(email), event = "email_verified", "User marked verified");
        Ok(())
    }

    /// Generate a code that is not pending for anyone else and cache it
    async fn issue(&self, cancel: &CancellationToken, email: &str) -> DomainResult<OtpRecord> {
        for attempt in 1..=self.config.issue_attempts.max(1) {
            let generated = self.generator.generate()?;
            let record = OtpRecord::new(email, generated.code, generated.secret);

            let stored = guarded(
                cancel,
                self.cache.set_if_absent(&record.code, &record, self.config.ttl),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    email = %mask_email(email),
                    error = %e,
                    event = "otp_storage_failed",
                    "Failed to store OTP code"
                );
                e
            })?;

            if stored {
                tracing::info!(
                    email = %mask_email(email),
                    ttl_seconds = self.config.ttl.as_secs(),
                    event = "otp_generated",
                    "Generated new OTP code"
                );
                return Ok(record);
            }

            tracing::warn!(attempt, event = "otp_collision", "Generated code already pending, regenerating");
        }

        Err(DomainError::internal("Could not allocate a unique OTP code"))
    }

    async fn publish(&self, cancel: &CancellationToken, record: &OtpRecord) -> DomainResult<()> {
        let event = NotificationEvent::new(
            record.email.clone(),
            record.code.clone(),
            self.config.verification_url(&record.code),
        );

        self.publisher.publish(cancel, &event).await?;
        tracing::info!(
            email = %mask_email(&record.email),
            event = "otp_notification_queued",
            "Verification email queued"
        );
        Ok(())
    }

    fn issued(&self, record: &OtpRecord) -> OtpIssued {
        let ttl = chrono::Duration::from_std(self.config.ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        OtpIssued {
            email: record.email.clone(),
            code: record.code.clone(),
            expires_at: Utc::now() + ttl,
        }
    }
}

/// Run `operation` unless `cancel` fires first
async fn guarded<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = DomainResult<T>>,
) -> DomainResult<T> {
    if cancel.is_cancelled() {
        return Err(DomainError::Canceled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DomainError::Canceled),
        result = operation => result,
    }
}
