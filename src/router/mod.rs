use serde_json::Value;

use crate::models::asset::{Asset, AssetType};

/// Partitions discovered assets into public and private sets (§4.3). Pure,
/// total — every asset lands in exactly one set.
pub fn route(assets: Vec<Asset>) -> (Vec<Asset>, Vec<Asset>) {
    let mut public = Vec::new();
    let mut private = Vec::new();
    for asset in assets {
        if is_public(&asset) {
            public.push(asset);
        } else {
            private.push(asset);
        }
    }
    (public, private)
}

fn is_public(asset: &Asset) -> bool {
    match asset.asset_type {
        AssetType::ComputeInstance => has_external_access_config(asset),
        AssetType::ObjectBucket => public_access_not_enforced(asset),
        AssetType::FirewallRule => has_open_source_range(asset),
        AssetType::SqlInstance => has_public_ip(asset),
        AssetType::LogSummary => false,
    }
}

fn has_external_access_config(asset: &Asset) -> bool {
    let Some(interfaces) = asset.metadata.get("network_interfaces").and_then(Value::as_array) else {
        return false;
    };
    interfaces.iter().any(|iface| {
        iface
            .get("accessConfigs")
            .and_then(Value::as_array)
            .map(|configs| !configs.is_empty())
            .unwrap_or(false)
    })
}

fn public_access_not_enforced(asset: &Asset) -> bool {
    match asset.metadata.get("public_access_prevention").and_then(Value::as_str) {
        Some("enforced") => false,
        _ => true,
    }
}

fn has_open_source_range(asset: &Asset) -> bool {
    let Some(ranges) = asset.metadata.get("source_ranges").and_then(Value::as_array) else {
        return false;
    };
    ranges
        .iter()
        .filter_map(Value::as_str)
        .any(|r| r == "0.0.0.0/0" || r == "::/0")
}

fn has_public_ip(asset: &Asset) -> bool {
    asset.metadata.get("public_ip").and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn firewall(source_ranges: Vec<&str>) -> Asset {
        Asset::new(AssetType::FirewallRule, "fw").with_metadata(
            "source_ranges",
            json!(source_ranges),
        )
    }

    #[test]
    fn partition_is_total_and_disjoint() {
        let assets = vec![
            firewall(vec!["0.0.0.0/0"]),
            firewall(vec!["10.0.0.0/8"]),
            Asset::new(AssetType::LogSummary, "summary"),
        ];
        let (public, private) = route(assets);
        assert_eq!(public.len() + private.len(), 3);
        assert_eq!(public.len(), 1);
        assert_eq!(private.len(), 2);
    }

    #[test]
    fn firewall_open_to_world_is_public() {
        assert!(is_public(&firewall(vec!["0.0.0.0/0"])));
        assert!(is_public(&firewall(vec!["10.0.0.0/8", "::/0"])));
        assert!(!is_public(&firewall(vec!["10.0.0.0/8"])));
    }

    #[test]
    fn bucket_public_access_prevention() {
        let enforced = Asset::new(AssetType::ObjectBucket, "b").with_metadata(
            "public_access_prevention",
            json!("enforced"),
        );
        assert!(!is_public(&enforced));

        let inherited = Asset::new(AssetType::ObjectBucket, "b").with_metadata(
            "public_access_prevention",
            json!("inherited"),
        );
        assert!(is_public(&inherited));

        let unset = Asset::new(AssetType::ObjectBucket, "b");
        assert!(is_public(&unset));
    }

    #[test]
    fn compute_instance_external_access_config() {
        let with_access = Asset::new(AssetType::ComputeInstance, "vm").with_metadata(
            "network_interfaces",
            json!([{ "accessConfigs": [{"natIP": "1.2.3.4"}] }]),
        );
        assert!(is_public(&with_access));

        let without_access = Asset::new(AssetType::ComputeInstance, "vm").with_metadata(
            "network_interfaces",
            json!([{ "accessConfigs": [] }]),
        );
        assert!(!is_public(&without_access));
    }

    #[test]
    fn sql_instance_public_ip_flag() {
        let public = Asset::new(AssetType::SqlInstance, "db").with_metadata("public_ip", json!(true));
        assert!(is_public(&public));
        let private = Asset::new(AssetType::SqlInstance, "db").with_metadata("public_ip", json!(false));
        assert!(!is_public(&private));
    }

    #[test]
    fn log_summary_defaults_to_private() {
        assert!(!is_public(&Asset::new(AssetType::LogSummary, "logs")));
    }
}
