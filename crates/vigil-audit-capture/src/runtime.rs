//! Assembling the audit runtime at application startup.

use crate::registry::Auditor;
use crate::resolver::StrategyRegistry;
use std::path::Path;
use tracing::info;
use vigil_common_config::{AuditConfig, ConfigLoader, Environment};
use vigil_common_core::{Error, Result};
use vigil_common_log::LogConfig;

/// Initialize logging from `VIGIL_LOG_*` variables.
pub fn init_logging() -> Result<()> {
    vigil_common_log::init(LogConfig::from_env()).map_err(|e| Error::logging(e.to_string()))
}

/// Load `.env` files and the audit configuration of `project_dir`, then wire
/// the host's strategies into an [`Auditor`].
///
/// Strategies the configuration switches off are dropped before any call is
/// audited.
pub fn bootstrap(project_dir: impl AsRef<Path>, strategies: StrategyRegistry) -> Result<Auditor> {
    Environment::init();
    let config = ConfigLoader::new(project_dir)
        .load()
        .map_err(|e| Error::config(e.to_string()))?;
    Ok(assemble(&config, strategies))
}

/// Wire an already loaded configuration.
pub fn assemble(config: &AuditConfig, mut strategies: StrategyRegistry) -> Auditor {
    strategies.retain_enabled(config);
    let auditor = Auditor::from_config(config, strategies);
    info!(
        enabled = config.enabled,
        methods = auditor.declarations().len(),
        strategies = ?auditor.interceptor().resolver().names(),
        "Audit runtime ready"
    );
    auditor
}
