use rusqlite::params;

use crate::errors::EngineError;
use crate::models::asset::{Asset, AssetType};

use super::Database;

impl Database {
    /// `SaveAssets` — replaces the account's entire prior asset set in one
    /// transaction (§6): old assets for the same account are not merged or
    /// diffed, just wholesale-replaced.
    pub fn save_assets(&self, account_id: &str, assets: &[Asset]) -> Result<(), EngineError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| EngineError::Persistence(format!("save_assets begin failed: {e}")))?;
        tx.execute("DELETE FROM assets WHERE account_id = ?1", params![account_id])
            .map_err(|e| EngineError::Persistence(format!("save_assets delete failed: {e}")))?;
        for asset in assets {
            tx.execute(
                "INSERT INTO assets (account_id, asset_type, name, region, metadata) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![account_id, asset.asset_type.as_str(), asset.name, asset.region, serde_json::to_string(&asset.metadata)?],
            )
            .map_err(|e| EngineError::Persistence(format!("save_assets insert failed: {e}")))?;
        }
        tx.commit().map_err(|e| EngineError::Persistence(format!("save_assets commit failed: {e}")))?;
        Ok(())
    }

    pub fn list_assets(&self, account_id: &str) -> Result<Vec<Asset>, EngineError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT asset_type, name, region, metadata FROM assets WHERE account_id = ?1")
            .map_err(|e| EngineError::Persistence(format!("list_assets query failed: {e}")))?;

        let rows = stmt
            .query_map(params![account_id], |row| {
                let asset_type_str: String = row.get(0)?;
                let metadata_json: String = row.get(3)?;
                Ok((asset_type_str, row.get::<_, String>(1)?, row.get::<_, Option<String>>(2)?, metadata_json))
            })
            .map_err(|e| EngineError::Persistence(format!("list_assets rows failed: {e}")))?;

        let mut assets = Vec::new();
        for row in rows {
            let (asset_type_str, name, region, metadata_json) = row.map_err(|e| EngineError::Persistence(format!("list_assets row failed: {e}")))?;
            assets.push(Asset {
                asset_type: parse_asset_type(&asset_type_str),
                name,
                region,
                metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
            });
        }
        Ok(assets)
    }
}

fn parse_asset_type(s: &str) -> AssetType {
    match s {
        "compute-instance" => AssetType::ComputeInstance,
        "object-bucket" => AssetType::ObjectBucket,
        "sql-instance" => AssetType::SqlInstance,
        "log-summary" => AssetType::LogSummary,
        _ => AssetType::FirewallRule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::Account;
    use crate::cloud::provider::CloudCredential;

    fn setup_account(db: &Database, id: &str) {
        let account = Account::new(id, "proj-1", "Acme", CloudCredential { access_token: "tok".to_string(), principal_email: None, declared_project_id: None });
        db.create_account(&account).unwrap();
    }

    #[test]
    fn save_assets_replaces_the_prior_set_wholesale() {
        let db = Database::in_memory().unwrap();
        setup_account(&db, "acct-1");

        db.save_assets("acct-1", &[Asset::new(AssetType::FirewallRule, "allow-ssh")]).unwrap();
        assert_eq!(db.list_assets("acct-1").unwrap().len(), 1);

        db.save_assets("acct-1", &[Asset::new(AssetType::ObjectBucket, "my-bucket"), Asset::new(AssetType::SqlInstance, "my-db")]).unwrap();
        let assets = db.list_assets("acct-1").unwrap();
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().all(|a| a.asset_type != AssetType::FirewallRule));
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let db = Database::in_memory().unwrap();
        setup_account(&db, "acct-2");
        let asset = Asset::new(AssetType::FirewallRule, "allow-ssh").with_metadata("source_ranges", serde_json::json!(["0.0.0.0/0"]));
        db.save_assets("acct-2", &[asset]).unwrap();

        let assets = db.list_assets("acct-2").unwrap();
        assert_eq!(assets[0].metadata["source_ranges"], serde_json::json!(["0.0.0.0/0"]));
    }
}
