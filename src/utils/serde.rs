use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserializer for loosely typed numeric fields
/// Accepts a string, a number, or null and yields the textual form
///
/// The Graph API returns most metrics as strings (`"12.34"`), but budgets and
/// some counters can come back as bare numbers depending on the API version.
///
/// # Example
/// ```
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Insight {
///     #[serde(default, deserialize_with = "ads_sync::utils::serde::string_or_number")]
///     pub spend: Option<String>,
/// }
///
/// let parsed: Insight = serde_json::from_str(r#"{"spend": 12.5}"#).unwrap();
/// assert_eq!(parsed.spend.as_deref(), Some("12.5"));
/// ```
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
