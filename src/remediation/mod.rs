use std::collections::HashMap;
use std::sync::LazyLock;

use crate::models::finding::Finding;

/// One remediation template: a human title, a `{asset}`/`{project_id}`
/// parameterized script body, and operator notes shown above the script.
struct Template {
    title: &'static str,
    script: &'static str,
    notes: &'static str,
}

/// Deterministic rule_code -> gcloud remediation mapping. Pure, no LLM call.
static TEMPLATES: LazyLock<HashMap<&'static str, Template>> = LazyLock::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "gcp_002",
        Template {
            title: "Restrict SSH firewall rule to trusted CIDRs",
            script: "gcloud compute firewall-rules update {asset} --source-ranges='YOUR_OFFICE_IP/32'",
            notes: "Replace YOUR_OFFICE_IP with your actual office/VPN IP address.",
        },
    );
    m.insert(
        "gcp_004",
        Template {
            title: "Remove public access from GCS bucket",
            script: "gcloud storage buckets update gs://{asset} --public-access-prevention=enforced",
            notes: "This will block all public access. Ensure no public-facing content depends on this bucket.",
        },
    );
    m.insert(
        "gcp_006",
        Template {
            title: "Migrate from default service account",
            script: concat!(
                "# Step 1: Create a custom service account\n",
                "gcloud iam service-accounts create {asset}-sa \\\n",
                "  --display-name='{asset} custom SA'\n",
                "\n",
                "# Step 2: Grant minimum required roles\n",
                "# gcloud projects add-iam-policy-binding {project_id} \\\n",
                "#   --member='serviceAccount:{asset}-sa@{project_id}.iam.gserviceaccount.com' \\\n",
                "#   --role='roles/REQUIRED_ROLE'\n",
                "\n",
                "# Step 3: Update the instance to use the new SA (requires stop/start)\n",
                "# gcloud compute instances set-service-account {asset} \\\n",
                "#   --service-account={asset}-sa@{project_id}.iam.gserviceaccount.com \\\n",
                "#   --zone=ZONE",
            ),
            notes: "Manual migration recommended. Replace REQUIRED_ROLE and ZONE with actual values. Commented steps require careful review.",
        },
    );
    m.insert(
        "log_001",
        Template {
            title: "Investigate high error rate",
            script: concat!(
                "# Fetch recent errors for investigation\n",
                "gcloud logging read 'severity>=ERROR' \\\n",
                "  --project={project_id} --limit=50 --format=json\n",
                "\n",
                "# Check for specific error patterns\n",
                "gcloud logging read 'severity>=ERROR AND timestamp>=\"$(date -u -v-1H +%Y-%m-%dT%H:%M:%SZ)\"' \\\n",
                "  --project={project_id} --format='table(timestamp,severity,textPayload)'",
            ),
            notes: "This is a diagnostic command, not a fix. Review the error logs to identify and address the root cause.",
        },
    );
    m.insert(
        "log_002",
        Template {
            title: "Enable audit logging and investigate auth failures",
            script: concat!(
                "# View recent authentication failures\n",
                "gcloud logging read 'protoPayload.status.code=7 OR protoPayload.status.code=16' \\\n",
                "  --project={project_id} --limit=50 --format=json\n",
                "\n",
                "# Enable Data Access audit logging\n",
                "gcloud projects get-iam-policy {project_id} --format=json > /tmp/iam-policy.json\n",
                "# Edit /tmp/iam-policy.json to add auditConfigs, then apply:\n",
                "# gcloud projects set-iam-policy {project_id} /tmp/iam-policy.json",
            ),
            notes: "Review authentication failure sources before taking action. Enable audit logs for forensic analysis.",
        },
    );
    m.insert(
        "log_003",
        Template {
            title: "Deploy Cloud Armor WAF rules to block recon probes",
            script: concat!(
                "# Create a Cloud Armor security policy\n",
                "gcloud compute security-policies create block-recon \\\n",
                "  --description='Block reconnaissance probes'\n",
                "\n",
                "# Block known recon paths\n",
                "gcloud compute security-policies rules create 1000 \\\n",
                "  --security-policy=block-recon \\\n",
                "  --expression=\"request.path.matches('/(\\\\.env|\\\\.git|wp-admin|phpMyAdmin)')\" \\\n",
                "  --action=deny-403\n",
                "\n",
                "# Attach to your backend service\n",
                "# gcloud compute backend-services update BACKEND_SERVICE \\\n",
                "#   --security-policy=block-recon --global",
            ),
            notes: "Attach this security policy to your backend service. Adjust paths and backend service name as needed.",
        },
    );
    m
});

/// Extracts the asset name from a `Finding.location` string: `"Firewall: allow-ssh"`
/// -> `"allow-ssh"`. Falls back to a slugified copy of the whole string when
/// there is no `:` separator.
fn extract_asset_name(location: &str) -> String {
    if let Some((_, rest)) = location.split_once(':') {
        return rest.trim().to_string();
    }
    location
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect::<String>()
        .to_lowercase()
}

/// Attaches a ready-to-run remediation script to every finding whose
/// `rule_code` has a template. Findings with no matching template are left
/// with `remediation_script = None`.
pub fn generate_remediation(findings: &mut [Finding], project_id: &str) {
    for finding in findings.iter_mut() {
        let Some(template) = TEMPLATES.get(finding.rule_code.as_str()) else {
            continue;
        };
        let asset = extract_asset_name(&finding.location);
        let body = template
            .script
            .replace("{asset}", &asset)
            .replace("{project_id}", project_id);
        let header = format!(
            "#!/bin/bash\n# Remediation: {title}\n# Rule: {rule_code}\n# Asset: {asset}\n# Generated by SentryScan AutoFix\n#\n# NOTE: {notes}\n#\nset -euo pipefail\n",
            title = template.title,
            rule_code = finding.rule_code,
            asset = asset,
            notes = template.notes,
        );
        finding.remediation_script = Some(format!("{header}{body}"));
    }
}
