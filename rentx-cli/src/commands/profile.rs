//! Edit the local user profile.

use anyhow::{Context, Result};
use rentx_client::{RemoteGateway, RentxClient};
use rentx_types::RecordId;
use serde_json::{Map, Value};

/// Run the profile command.
///
/// The change is stored locally and pushed on the next sync.
pub async fn run<G: RemoteGateway>(
    client: &RentxClient<G>,
    user_id: &str,
    assignments: &[String],
) -> Result<()> {
    let fields = parse_fields(assignments)?;
    let id = RecordId::from(user_id);

    let record = client.catalog().update_user(&id, fields).await?;

    println!("Profile {} saved locally:", id);
    println!("{}", serde_json::to_string_pretty(&record)?);
    println!("It will be sent on the next sync.");
    Ok(())
}

/// Parse `field=value` pairs. Values that are valid JSON keep their type.
fn parse_fields(assignments: &[String]) -> Result<Map<String, Value>> {
    let mut fields = Map::new();
    for assignment in assignments {
        let (field, raw) = assignment
            .split_once('=')
            .with_context(|| format!("Expected field=value, got '{}'", assignment))?;
        if field.is_empty() {
            anyhow::bail!("Empty field name in '{}'", assignment);
        }
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        fields.insert(field.to_string(), value);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::client;
    use rentx_client::MockGateway;
    use rentx_core::Connectivity;
    use serde_json::json;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_typed_and_plain_values() {
        let fields = parse_fields(&args(&["name=Ana Maria", "age=31", "vip=true"])).unwrap();
        assert_eq!(fields["name"], json!("Ana Maria"));
        assert_eq!(fields["age"], json!(31));
        assert_eq!(fields["vip"], json!(true));
    }

    #[test]
    fn value_may_contain_equals() {
        let fields = parse_fields(&args(&["note=a=b"])).unwrap();
        assert_eq!(fields["note"], json!("a=b"));
    }

    #[test]
    fn rejects_malformed_assignment() {
        assert!(parse_fields(&args(&["name"])).is_err());
        assert!(parse_fields(&args(&["=x"])).is_err());
    }

    #[tokio::test]
    async fn profile_edit_is_queued_offline() {
        let gateway = MockGateway::new();
        let client = client(Connectivity::Disconnected, &gateway).await;

        run(&client, "u1", &args(&["name=Ana"])).await.unwrap();

        let status = client.status().await.unwrap();
        assert_eq!(status.pending, 1);
        assert_eq!(status.counts.get("users"), Some(&1));
        assert!(gateway.calls().is_empty());
    }
}
