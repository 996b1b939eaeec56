pub mod active_scanner;
pub mod log_analyzer;

pub use active_scanner::scan_public_asset;
pub use log_analyzer::analyze_private_asset;

use crate::models::scan_state::ScannedAssetRecord;

pub(crate) fn scanned_record(asset_name: &str, issues_found: usize) -> ScannedAssetRecord {
    ScannedAssetRecord {
        asset_name: asset_name.to_string(),
        issues_found,
    }
}
