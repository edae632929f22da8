//! Payloads exchanged with the deploy webhook.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body posted once content has been deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployNotice {
    /// Label of the job sending the notice.
    pub job: String,
    /// Folder the content was deployed to.
    pub deployed_path: String,
    /// Artifact count per ledger group, when an upstream ledger exists.
    #[serde(default)]
    pub groups: BTreeMap<String, usize>,
    pub sent_at: DateTime<Utc>,
}

/// Optional acknowledgement returned by the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoticeAck {
    #[serde(default)]
    pub id: Option<String>,
}
