use std::sync::Arc;

use crate::{
    admin::{default_admin_site, AdminSite},
    config::Config,
    database::Database,
    orm::Orm,
    signals::default_signal_registry,
};

#[derive(Clone)]
pub struct AppState {
    pub orm: Orm,
    pub admin: Arc<AdminSite>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Initialize database
        let database = Database::connect(&config.database.url).await?;
        database.migrate().await?;

        let orm = Orm::new(database, default_signal_registry());
        let admin = Arc::new(default_admin_site()?);

        Ok(Self { orm, admin, config })
    }
}
