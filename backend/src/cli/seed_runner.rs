//! Fixture loader execution.

use std::sync::Arc;

use crate::cli::seed::SeedCli;
use crate::config::{Config, StoreBackend};
use crate::db;
use crate::error::{AppError, Result};
use crate::models::Grade;
use crate::services::summarizer::PlaceholderSummarizer;
use crate::services::user_service::NewUser;
use crate::services::worker_pool::WorkerPool;
use crate::services::Services;
use crate::store::postgres::PgStore;
use crate::store::Stores;

/// Category names; each slugifies to the short code used by clients.
const CATEGORIES: [&str; 7] = ["SQL", "Golang", "PHP", "JS", "TS", "Python", "Vue"];

const QUESTIONS_PER_GRADE: usize = 10;

/// Entities that get `-read`, `-create`, `-update` and `-delete` permissions.
const PERMISSION_ENTITIES: [&str; 5] = ["User", "Role", "Permission", "Category", "Question"];
const PERMISSION_ACTIONS: [&str; 4] = ["read", "create", "update", "delete"];

pub const ADMIN_EMAIL: &str = "admin@test.com";
pub const DEFAULT_EMAIL: &str = "default@test.com";

/// What a seeding run created
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub questions: usize,
    pub permissions: usize,
    pub users: usize,
}

/// Run the fixture loader against the configured store
pub async fn run(cli: SeedCli, config: Config) -> Result<SeedReport> {
    let config = Arc::new(config);
    let stores = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| AppError::Config("DATABASE_URL not set".into()))?;
            let pool = db::create_pool(url).await?;
            db::migrate(&pool).await?;
            if cli.reset {
                PgStore::new(pool.clone()).reset().await?;
                tracing::info!("All tables truncated");
            }
            Stores::postgres(pool)
        }
        StoreBackend::Memory => {
            tracing::warn!("Seeding the in-memory store; nothing outlives this process");
            Stores::memory()
        }
    };

    let worker_pool = Arc::new(WorkerPool::new(config.worker_pool_count));
    let services = Services::new(
        config,
        &stores,
        worker_pool.clone(),
        None,
        Arc::new(PlaceholderSummarizer),
    );

    let report = seed(&services, &cli.password).await;
    worker_pool.shutdown().await;
    report
}

/// Create the fixture data through the regular services.
pub async fn seed(services: &Services, password: &str) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for name in CATEGORIES {
        let category = services.categories.create(name, "").await?;
        report.categories += 1;
        for grade in Grade::ALL {
            for n in 1..=QUESTIONS_PER_GRADE {
                let text = format!("{name} {grade} question #{n}");
                services
                    .questions
                    .create(category.id, grade.as_str(), &text)
                    .await?;
                report.questions += 1;
            }
        }
        tracing::info!(category = %category.slug, "Category seeded");
    }

    let admin_role = services.roles.create("Admin").await?;
    for entity in PERMISSION_ENTITIES {
        for action in PERMISSION_ACTIONS {
            let permission = services
                .permissions
                .create(&format!("{entity} {action}"), None)
                .await?;
            services
                .roles
                .add_permission(admin_role.id, permission.id)
                .await?;
            report.permissions += 1;
        }
    }

    let admin = services
        .users
        .create(NewUser {
            email: ADMIN_EMAIL.into(),
            name: "Admin".into(),
            password: password.into(),
        })
        .await?;
    services.users.add_role(admin.id, admin_role.id).await?;
    services
        .users
        .create(NewUser {
            email: DEFAULT_EMAIL.into(),
            name: "Default".into(),
            password: password.into(),
        })
        .await?;
    report.users = 2;

    tracing::info!(
        categories = report.categories,
        questions = report.questions,
        permissions = report.permissions,
        "Seeding complete"
    );
    Ok(report)
}
