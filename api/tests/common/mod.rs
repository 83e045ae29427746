//! Shared wiring for the HTTP tests: the real route table over in-memory
//! collaborators (memory broker, memory cache, mock repository).

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use tokio_util::sync::CancellationToken;
use vouch_api::AppState;
use vouch_core::domain::entities::{NotificationEvent, User};
use vouch_core::repositories::MockUserRepository;
use vouch_core::services::{OtpService, OtpServiceConfig, QueueNotificationPublisher};
use vouch_infra::cache::MemoryVerificationCache;
use vouch_infra::security::BcryptPasswordHasher;
use vouch_queue::{MemoryBroker, Publisher, PublisherConfig, ReconnectPolicy, Transport};

pub const DESTINATION: &str = "mailQueue";

pub type Cache = MemoryVerificationCache;
pub type Users = MockUserRepository;
pub type Notifications = QueueNotificationPublisher;
pub type Hasher = BcryptPasswordHasher;
pub type TestState = AppState<Cache, Users, Notifications, Hasher>;

pub struct TestContext {
    pub broker: MemoryBroker,
    pub transport: Transport,
    pub cache: Arc<Cache>,
    pub users: Arc<Users>,
    pub state: web::Data<TestState>,
}

impl TestContext {
    pub async fn new() -> Self {
        let broker = MemoryBroker::new();
        let transport = Transport::new(
            "api-test",
            Arc::new(broker.clone()),
            ReconnectPolicy::new(1, Duration::from_millis(10)),
        );
        transport.connect().await.unwrap();

        let publisher = Arc::new(Publisher::new(transport.clone(), PublisherConfig::default()));
        let notifications = Arc::new(QueueNotificationPublisher::new(publisher, DESTINATION));
        notifications.declare().await.unwrap();

        let cache = Arc::new(MemoryVerificationCache::new());
        let users = Arc::new(MockUserRepository::new());
        let otp_service = Arc::new(OtpService::new(
            cache.clone(),
            users.clone(),
            notifications,
            Arc::new(BcryptPasswordHasher::with_cost(4)),
            OtpServiceConfig {
                verification_base_url: "http://localhost:8080/api/user-service/verify-otp"
                    .to_string(),
                ..OtpServiceConfig::default()
            },
        ));

        Self {
            broker,
            transport,
            cache,
            users,
            state: web::Data::new(AppState::new(otp_service, CancellationToken::new())),
        }
    }

    /// Seed a user directly in the repository
    pub async fn seed_user(&self, email: &str, verified: bool) -> User {
        let mut user = User::new("Jane Doe".to_string(), email.to_string(), "hash".to_string());
        if verified {
            user.verify();
        }
        self.users.insert(user.clone()).await;
        user
    }

    /// Notification events waiting in the destination
    pub fn published(&self) -> Vec<NotificationEvent> {
        self.broker
            .peek(DESTINATION)
            .iter()
            .map(|body| NotificationEvent::from_payload(body).unwrap())
            .collect()
    }

    /// Make the broker unreachable and break the current connection
    pub fn break_queue(&self) {
        self.broker.set_reachable(false);
        self.broker.sever_connections();
    }
}

/// Build the service under test from a `TestContext`
#[macro_export]
macro_rules! test_app {
    ($ctx:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .app_data(actix_web::web::Data::new(vouch_api::HealthProbe::new(
                    $ctx.transport.clone(),
                )))
                .configure(
                    vouch_api::configure::<
                        common::Cache,
                        common::Users,
                        common::Notifications,
                        common::Hasher,
                    >,
                ),
        )
        .await
    };
}
