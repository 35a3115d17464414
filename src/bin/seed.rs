//! Seed script for development: populates a fresh database with sample issues
//! and one portfolio.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires the `DATABASE_URL` environment variable (reads .env).

use chrono::{Duration, Utc};
use sqlx::PgPool;

const PROJECTS: &[&str] = &["payments", "user-portal", "mobile-backend"];
const PORTFOLIO: &str = "digital-banking";

/// (type, severity, status, resolution, owasp 2017, cwe, sonarsource category)
const SAMPLES: &[(&str, &str, &str, Option<&str>, &str, &str, &str)] = &[
    ("VULNERABILITY", "CRITICAL", "OPEN", None, "a1", "89", "sql-injection"),
    ("VULNERABILITY", "MAJOR", "CONFIRMED", None, "a7", "79", "xss"),
    ("VULNERABILITY", "BLOCKER", "RESOLVED", Some("FIXED"), "a1", "564", "sql-injection"),
    ("SECURITY_HOTSPOT", "MAJOR", "TO_REVIEW", None, "a3", "327", "weak-cryptography"),
    ("SECURITY_HOTSPOT", "MAJOR", "REVIEWED", Some("SAFE"), "a3", "330", "insecure-conf"),
    ("BUG", "MINOR", "OPEN", None, "", "", ""),
    ("CODE_SMELL", "INFO", "OPEN", None, "", "", ""),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL")?;
    let pool = issuescope::db::create_pool(&db_url, 5).await?;

    // Run migrations first
    issuescope::db::migrate(&pool).await?;

    println!("=== issuescope seed ===");

    seed_issues(&pool).await?;
    seed_portfolio(&pool).await?;

    println!("\n=== Seed complete! ===");
    Ok(())
}

async fn seed_issues(pool: &PgPool) -> anyhow::Result<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM issues")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        println!("[skip] Issues already exist ({count})");
        return Ok(());
    }

    let now = Utc::now();
    let mut inserted = 0;
    for (p, project) in PROJECTS.iter().enumerate() {
        for (s, (issue_type, severity, status, resolution, owasp, cwe, category)) in
            SAMPLES.iter().enumerate()
        {
            let security = !owasp.is_empty();
            let list = |value: &str| -> Vec<String> {
                if value.is_empty() {
                    Vec::new()
                } else {
                    vec![value.to_string()]
                }
            };
            let created_at = now - Duration::days((p * SAMPLES.len() + s) as i64 * 3);

            sqlx::query(
                "INSERT INTO issues (kee, project_uuid, branch_uuid, component_uuid, file_path,
                 directory_path, line, rule_uuid, issue_type, severity, status, resolution,
                 author_login, tags, language, effort, created_at, updated_at, cwe, owasp_top10,
                 sonarsource_security)
                 VALUES ($1, $2, $2, $3, $4, 'src', $5, $6, $7, $8, $9, $10, $11, $12, 'java',
                 $13, $14, $14, $15, $16, $17)",
            )
            .bind(format!("SEED-{p:02}-{s:02}"))
            .bind(*project)
            .bind(format!("{project}:src/Service{s}.java"))
            .bind(format!("src/Service{s}.java"))
            .bind(10 + s as i32)
            .bind(format!("rule-{issue_type}").to_lowercase())
            .bind(issue_type)
            .bind(severity)
            .bind(status)
            .bind(resolution)
            .bind(format!("dev{}@example.com", s % 3))
            .bind(if security { vec!["security".to_string()] } else { vec!["style".to_string()] })
            .bind((s as i64 + 1) * 5)
            .bind(created_at)
            .bind(list(cwe))
            .bind(list(owasp))
            .bind(if category.is_empty() { None } else { Some(*category) })
            .execute(pool)
            .await?;
            inserted += 1;
        }
    }

    println!("[done] Created {inserted} sample issues");
    Ok(())
}

async fn seed_portfolio(pool: &PgPool) -> anyhow::Result<()> {
    for project in &PROJECTS[..2] {
        sqlx::query(
            "INSERT INTO view_members (view_uuid, member_uuid) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(PORTFOLIO)
        .bind(*project)
        .execute(pool)
        .await?;
    }

    println!("[done] Portfolio '{PORTFOLIO}' covers {:?}", &PROJECTS[..2]);
    Ok(())
}
