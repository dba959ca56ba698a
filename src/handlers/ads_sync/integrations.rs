//! Read model and bookkeeping for the `integrations` table

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

pub const FACEBOOK_PLATFORM: &str = "facebook";
pub const CONNECTED_STATUS: &str = "connected";

/// Syncs newer than this skip automatic triggers
pub const DEFAULT_RECENT_SYNC_THRESHOLD_HOURS: i64 = 4;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Integration {
    pub id: Uuid,
    pub project_id: Uuid,
    pub platform: String,
    pub status: String,
    pub name: String,
    pub account_name: Option<String>,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Integration {
    pub fn ad_account_id(&self) -> Option<String> {
        self.account_name.as_deref().and_then(extract_ad_account_id)
    }

    /// True when the last successful sync is within `threshold_hours` of `now`
    pub fn has_recent_sync(&self, now: DateTime<Utc>, threshold_hours: i64) -> bool {
        match self.last_sync {
            Some(last) => now.signed_duration_since(last) < Duration::hours(threshold_hours),
            None => false,
        }
    }
}

/// Pulls `act_<digits>` out of a trailing `"(act_<digits>)"` in the display name
///
/// `"Store BR (act_123456789)"` gives `Some("act_123456789")`.
pub fn extract_ad_account_id(account_name: &str) -> Option<String> {
    let inner = account_name.strip_suffix(')')?;
    let start = inner.rfind("(act_")?;
    let digits = &inner[start + "(act_".len()..];

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(format!("act_{}", digits))
}

pub async fn list_connected_integrations(pool: &PgPool) -> Result<Vec<Integration>, sqlx::Error> {
    sqlx::query_as::<_, Integration>(
        r#"
        SELECT id, project_id, platform, status, name, account_name, last_sync
        FROM integrations
        WHERE platform = $1 AND status = $2
        ORDER BY created_at ASC
        "#,
    )
    .bind(FACEBOOK_PLATFORM)
    .bind(CONNECTED_STATUS)
    .fetch_all(pool)
    .await
}

pub async fn find_integration(
    pool: &PgPool,
    project_id: Uuid,
) -> Result<Option<Integration>, sqlx::Error> {
    sqlx::query_as::<_, Integration>(
        r#"
        SELECT id, project_id, platform, status, name, account_name, last_sync
        FROM integrations
        WHERE project_id = $1 AND platform = $2
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .bind(project_id)
    .bind(FACEBOOK_PLATFORM)
    .fetch_optional(pool)
    .await
}

/// Stamp `last_sync = NOW()` on the project's facebook integration
///
/// Returns the number of rows touched.
pub async fn update_last_sync(pool: &PgPool, project_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE integrations
        SET last_sync = NOW(), updated_at = NOW()
        WHERE project_id = $1 AND platform = $2
        "#,
    )
    .bind(project_id)
    .bind(FACEBOOK_PLATFORM)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integration(last_sync: Option<DateTime<Utc>>) -> Integration {
        Integration {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            platform: FACEBOOK_PLATFORM.to_string(),
            status: CONNECTED_STATUS.to_string(),
            name: "Facebook Ads".to_string(),
            account_name: Some("Loja (act_42)".to_string()),
            last_sync,
        }
    }

    #[test]
    fn test_extract_ad_account_id() {
        assert_eq!(
            extract_ad_account_id("Account Name (act_123456789)").as_deref(),
            Some("act_123456789")
        );
        assert_eq!(
            extract_ad_account_id("Nested (x) (act_1)").as_deref(),
            Some("act_1")
        );
        assert_eq!(extract_ad_account_id("Account Name"), None);
        assert_eq!(extract_ad_account_id("Account (act_)"), None);
        assert_eq!(extract_ad_account_id("Account (act_12a)"), None);
        assert_eq!(extract_ad_account_id("Account (act_12) trailing"), None);
    }

    #[test]
    fn test_has_recent_sync() {
        let now = Utc::now();
        assert!(integration(Some(now - Duration::hours(1))).has_recent_sync(now, 4));
        assert!(!integration(Some(now - Duration::hours(5))).has_recent_sync(now, 4));
        assert!(!integration(None).has_recent_sync(now, 4));
    }

    #[test]
    fn test_integration_account_id() {
        assert_eq!(integration(None).ad_account_id().as_deref(), Some("act_42"));
    }

    #[sqlx::test]
    async fn test_connected_listing_and_last_sync(pool: PgPool) -> sqlx::Result<()> {
        let project_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO integrations (project_id, platform, status, name, account_name)
            VALUES
                ($1, 'facebook', 'connected', 'Facebook Ads', 'Store (act_1)'),
                ($2, 'facebook', 'disconnected', 'Facebook Ads', 'Old (act_2)'),
                ($3, 'google', 'connected', 'Google Ads', NULL)
            "#,
        )
        .bind(project_id)
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .execute(&pool)
        .await?;

        let connected = list_connected_integrations(&pool).await?;
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].project_id, project_id);
        assert!(connected[0].last_sync.is_none());

        let touched = update_last_sync(&pool, project_id).await?;
        assert_eq!(touched, 1);

        let found = find_integration(&pool, project_id).await?.unwrap();
        assert!(found.has_recent_sync(Utc::now(), DEFAULT_RECENT_SYNC_THRESHOLD_HOURS));
        Ok(())
    }
}
