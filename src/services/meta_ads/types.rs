//! Wire types for the Graph API and the hierarchy level enum shared by the
//! fetch, gap analysis and persistence code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::serde::string_or_number;

/// One level of the advertising hierarchy (Campaign ⊃ AdSet ⊃ Ad)
///
/// Deserializes through [`FromStr`], so JSON bodies and query strings accept
/// the same spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyLevel {
    Campaign,
    AdSet,
    Ad,
}

impl HierarchyLevel {
    /// Processing order: campaigns must land before ad sets, ad sets before ads
    pub const ALL: [HierarchyLevel; 3] = [
        HierarchyLevel::Campaign,
        HierarchyLevel::AdSet,
        HierarchyLevel::Ad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Campaign => "campaign",
            HierarchyLevel::AdSet => "adset",
            HierarchyLevel::Ad => "ad",
        }
    }

    /// Graph API edge under the ad account node
    pub fn edge(&self) -> &'static str {
        match self {
            HierarchyLevel::Campaign => "campaigns",
            HierarchyLevel::AdSet => "adsets",
            HierarchyLevel::Ad => "ads",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            HierarchyLevel::Campaign => "facebook_campaigns",
            HierarchyLevel::AdSet => "facebook_adsets",
            HierarchyLevel::Ad => "facebook_ads",
        }
    }

    /// Column holding the id of the owning entity one level up
    pub fn parent_column(&self) -> Option<&'static str> {
        match self {
            HierarchyLevel::Campaign => None,
            HierarchyLevel::AdSet => Some("campaign_id"),
            HierarchyLevel::Ad => Some("adset_id"),
        }
    }

    pub fn has_budget(&self) -> bool {
        matches!(self, HierarchyLevel::Campaign | HierarchyLevel::AdSet)
    }

    /// Identifying fields requested when listing entities at this level
    pub fn entity_fields(&self) -> &'static str {
        match self {
            HierarchyLevel::Campaign => "id,name,status,objective,daily_budget,lifetime_budget",
            HierarchyLevel::AdSet => {
                "id,name,status,campaign_id,daily_budget,lifetime_budget,optimization_goal"
            }
            HierarchyLevel::Ad => "id,name,status,adset_id",
        }
    }

    /// Human-readable plural used in progress messages
    pub fn label(&self) -> &'static str {
        match self {
            HierarchyLevel::Campaign => "campaigns",
            HierarchyLevel::AdSet => "ad sets",
            HierarchyLevel::Ad => "ads",
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HierarchyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "campaign" | "campaigns" => Ok(HierarchyLevel::Campaign),
            "adset" | "adsets" | "ad_set" => Ok(HierarchyLevel::AdSet),
            "ad" | "ads" => Ok(HierarchyLevel::Ad),
            other => Err(format!("Unknown hierarchy level: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for HierarchyLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One `{action_type, value}` pair from `actions`, `action_values` or
/// `cost_per_action_type`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    pub action_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: Option<String>,
}

/// One day of insight metrics for a single entity, as returned by the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInsightDay {
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub spend: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub impressions: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub clicks: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub ctr: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub cpc: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub cpm: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub reach: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub frequency: Option<String>,
    #[serde(default)]
    pub actions: Option<Vec<ActionEntry>>,
    #[serde(default)]
    pub action_values: Option<Vec<ActionEntry>>,
    #[serde(default)]
    pub cost_per_action_type: Option<Vec<ActionEntry>>,
}

/// Identifying fields of a campaign, ad set or ad
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub optimization_goal: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub adset_id: Option<String>,
    /// Minor currency units (cents)
    #[serde(default, deserialize_with = "string_or_number")]
    pub daily_budget: Option<String>,
    /// Minor currency units (cents)
    #[serde(default, deserialize_with = "string_or_number")]
    pub lifetime_budget: Option<String>,
}

/// An entity together with its non-empty daily insight series
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntityInsight {
    pub level: HierarchyLevel,
    pub entity: RawEntity,
    pub days: Vec<RawInsightDay>,
}

/// Cursor-paginated Graph API list response
#[derive(Debug, Deserialize)]
pub struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}

/// Error envelope returned by the Graph API on non-2xx responses
#[derive(Debug, Deserialize)]
pub struct GraphErrorEnvelope {
    pub error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

/// Ad account as returned by `/me/adaccounts`
#[derive(Debug, Clone, Deserialize)]
pub struct RawAdAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_status: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
}

/// Ad account visible to the configured token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdAccount {
    pub id: String,
    pub name: String,
    pub account_id: String,
    pub status: String,
    pub currency: Option<String>,
}

impl From<RawAdAccount> for AdAccount {
    fn from(raw: RawAdAccount) -> Self {
        let name = raw
            .name
            .filter(|n| !n.is_empty())
            .or(raw.business_name)
            .unwrap_or_else(|| "Unnamed account".to_string());
        let account_id = raw
            .account_id
            .unwrap_or_else(|| raw.id.trim_start_matches("act_").to_string());

        Self {
            id: raw.id,
            name,
            account_id,
            status: account_status_label(raw.account_status.unwrap_or(-1)).to_string(),
            currency: raw.currency,
        }
    }
}

/// Decode the numeric `account_status` field
pub fn account_status_label(code: i64) -> &'static str {
    match code {
        1 => "active",
        2 => "disabled",
        3 => "unsettled",
        7 => "pending_risk_review",
        8 => "pending_settlement",
        9 => "in_grace_period",
        100 => "pending_closure",
        101 => "closed",
        201 => "any_active",
        202 => "any_closed",
        _ => "unknown",
    }
}
