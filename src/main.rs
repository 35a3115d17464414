use std::path::Path;
use std::sync::Arc;

use issuescope::config::IndexConfig;
use issuescope::db;
use issuescope::models::statistics::SecurityStandardCategoryStatistics;
use issuescope::services::index::IssueIndex;
use issuescope::services::loader;
use issuescope::services::security_report::{self, OwaspTop10Version};
use issuescope::services::security_standards::SecurityStandards;
use issuescope::Issue;
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "issuescope=debug".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = IndexConfig::from_env()?;
    tracing::info!(
        max_connections = config.database_max_connections,
        timezone = %config.default_timezone,
        scan_page_size = config.scan_page_size,
        "Starting issue index"
    );

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::migrate(&pool).await?;

    let standards = SecurityStandards::load(config.security_standards_path.as_deref().map(Path::new))?;
    let snapshot = loader::load_snapshot(&pool, config.scan_page_size).await?;
    let index = IssueIndex::new(snapshot, config.default_timezone)
        .with_standards(standards)
        .with_scan_page_size(config.scan_page_size);

    log_summary(&index);
    Ok(())
}

/// Logs document counts and the vulnerability totals of each security standard.
fn log_summary(index: &IssueIndex) {
    let snapshot = index.snapshot();
    let population: Vec<&Issue> = snapshot
        .issues()
        .iter()
        .map(Arc::as_ref)
        .filter(|issue| security_report::in_population(issue))
        .collect();
    let standards = index.standards();

    let total = |nodes: Vec<SecurityStandardCategoryStatistics>| {
        nodes.iter().map(|node| node.vulnerabilities).sum::<u64>()
    };

    tracing::info!(
        issues = snapshot.len(),
        portfolios = snapshot.views().len(),
        security_population = population.len(),
        owasp_top10_2017 = total(security_report::owasp_top10(&population, OwaspTop10Version::Y2017, false)),
        owasp_top10_2021 = total(security_report::owasp_top10(&population, OwaspTop10Version::Y2021, false)),
        sans_top25 = total(security_report::sans_top25(&population, standards, false)),
        sonarsource_security = total(security_report::sonarsource(&population, standards, false)),
        "Issue index ready"
    );
}
