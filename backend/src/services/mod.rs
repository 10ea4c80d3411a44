//! Business logic services.

pub mod auth_service;
pub mod category_service;
pub mod identity_service;
pub mod permission_service;
pub mod question_service;
pub mod role_service;
pub mod session_question_service;
pub mod session_service;
pub mod slug;
pub mod summarizer;
pub mod user_service;
pub mod worker_pool;

use std::sync::Arc;

use crate::config::Config;
use crate::store::Stores;

use auth_service::AuthService;
use category_service::CategoryService;
use identity_service::IdentityVerifier;
use permission_service::PermissionService;
use question_service::QuestionService;
use role_service::RoleService;
use session_question_service::SessionQuestionService;
use session_service::SessionService;
use summarizer::Summarizer;
use user_service::UserService;
use worker_pool::WorkerPool;

/// Every service, wired over one set of stores.
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub roles: Arc<RoleService>,
    pub permissions: Arc<PermissionService>,
    pub categories: Arc<CategoryService>,
    pub questions: Arc<QuestionService>,
    pub sessions: Arc<SessionService>,
    pub session_questions: Arc<SessionQuestionService>,
}

impl Services {
    pub fn new(
        config: Arc<Config>,
        stores: &Stores,
        worker_pool: Arc<WorkerPool>,
        identity: Option<Arc<dyn IdentityVerifier>>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let users = Arc::new(UserService::new(stores, config.clone()));
        let auth = Arc::new(AuthService::new(
            users.clone(),
            stores.refresh_tokens.clone(),
            identity,
            config.clone(),
        ));
        let sessions = Arc::new(SessionService::new(
            stores,
            summarizer.clone(),
            config.clone(),
        ));

        Self {
            auth,
            users,
            roles: Arc::new(RoleService::new(
                stores,
                worker_pool.clone(),
                config.clone(),
            )),
            permissions: Arc::new(PermissionService::new(
                stores,
                worker_pool,
                config.clone(),
            )),
            categories: Arc::new(CategoryService::new(stores, config.clone())),
            questions: Arc::new(QuestionService::new(stores, config)),
            session_questions: Arc::new(SessionQuestionService::new(
                stores,
                sessions.clone(),
                summarizer,
            )),
            sessions,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::identity_service::{ExternalIdentity, IdentityVerifier};
    use super::summarizer::PlaceholderSummarizer;
    use super::user_service::NewUser;
    use super::worker_pool::WorkerPool;
    use super::Services;
    use crate::config::{test_config, Config};
    use crate::error::{AppError, Result};
    use crate::models::{Role, User};
    use crate::store::memory::MemoryStore;
    use crate::store::{ListQuery, Pagination, RoleStore, Stores};

    pub struct Harness {
        pub config: Arc<Config>,
        pub stores: Stores,
        /// The store behind `stores`, for assertions across tables.
        pub memory: Arc<MemoryStore>,
        pub worker_pool: Arc<WorkerPool>,
        pub services: Services,
    }

    impl Harness {
        /// Rewire the services with an external identity verifier.
        pub fn rebuild_with_identity(&mut self, identity: StaticIdentity) {
            self.services = Services::new(
                self.config.clone(),
                &self.stores,
                self.worker_pool.clone(),
                Some(Arc::new(identity)),
                Arc::new(PlaceholderSummarizer),
            );
        }
    }

    pub fn harness() -> Harness {
        harness_with(test_config())
    }

    pub fn harness_with(config: Config) -> Harness {
        let config = Arc::new(config);
        let memory = Arc::new(MemoryStore::new());
        let stores = Stores::from_shared(memory.clone());
        let worker_pool = Arc::new(WorkerPool::new(config.worker_pool_count));
        let services = Services::new(
            config.clone(),
            &stores,
            worker_pool.clone(),
            None,
            Arc::new(PlaceholderSummarizer),
        );
        Harness {
            config,
            stores,
            memory,
            worker_pool,
            services,
        }
    }

    pub async fn test_user(h: &Harness, email: &str) -> User {
        h.services
            .users
            .create(NewUser {
                email: email.into(),
                name: "Candidate".into(),
                password: "password".into(),
            })
            .await
            .unwrap()
    }

    /// Adds `count` questions named `"{grade} question {i}"`.
    pub async fn seed_questions(h: &Harness, category_id: Uuid, grade: &str, count: usize) {
        for i in 0..count {
            h.services
                .questions
                .create(category_id, grade, &format!("{grade} question {i}"))
                .await
                .unwrap();
        }
    }

    /// Verifier that accepts any token as the same identity.
    pub struct StaticIdentity(ExternalIdentity);

    impl StaticIdentity {
        pub fn new(identity: ExternalIdentity) -> Self {
            Self(identity)
        }
    }

    #[async_trait]
    impl IdentityVerifier for StaticIdentity {
        async fn verify(&self, id_token: &str) -> Result<ExternalIdentity> {
            if id_token.is_empty() {
                return Err(AppError::InvalidExternalIdentity("empty token".into()));
            }
            Ok(self.0.clone())
        }
    }

    /// Role store that counts every call before delegating.
    pub struct CountingRoleStore {
        inner: Arc<MemoryStore>,
        calls: AtomicUsize,
    }

    impl CountingRoleStore {
        pub fn new(inner: Arc<MemoryStore>) -> Self {
            Self {
                inner,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RoleStore for CountingRoleStore {
        async fn list(&self, query: &ListQuery) -> Result<(Vec<Role>, Pagination)> {
            self.hit();
            RoleStore::list(self.inner.as_ref(), query).await
        }

        async fn create(&self, role: &Role) -> Result<()> {
            self.hit();
            RoleStore::create(self.inner.as_ref(), role).await
        }

        async fn get_by_id(&self, id: Uuid) -> Result<Role> {
            self.hit();
            RoleStore::get_by_id(self.inner.as_ref(), id).await
        }

        async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Role>> {
            self.hit();
            RoleStore::get_many(self.inner.as_ref(), ids).await
        }

        async fn update(&self, role: &Role) -> Result<()> {
            self.hit();
            RoleStore::update(self.inner.as_ref(), role).await
        }

        async fn delete(&self, id: Uuid) -> Result<()> {
            self.hit();
            RoleStore::delete(self.inner.as_ref(), id).await
        }

        async fn taken_slugs(&self, slug: &str) -> Result<Vec<String>> {
            self.hit();
            RoleStore::taken_slugs(self.inner.as_ref(), slug).await
        }

        async fn remove_permission_from_all(&self, permission_id: Uuid) -> Result<u64> {
            self.hit();
            RoleStore::remove_permission_from_all(self.inner.as_ref(), permission_id).await
        }
    }
}
