use std::sync::Arc;
use crate::config::Config;
use crate::domain::ports::StoreClients;
use crate::domain::services::audit::AuditLogger;
use crate::domain::services::executor::JobExecutor;
use crate::domain::services::scheduler::JobScheduler;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub stores: StoreClients,
    pub audit: Arc<AuditLogger>,
    pub executor: Arc<JobExecutor>,
    pub scheduler: Arc<JobScheduler>,
}
