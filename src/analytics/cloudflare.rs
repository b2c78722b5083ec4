//! Cloudflare Web Analytics GraphQL client and snapshot state.

use crate::util::{fsio, http};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::BTreeMap, env, path::Path};

const GRAPHQL_ENDPOINT: &str = "https://api.cloudflare.com/client/v4/graphql";

/// Snapshot state file.
pub const STATE_FILE: &str = ".analytics-state.json";

/// Fallback account/site tags when the env vars are unset.
const DEFAULT_ACCOUNT_TAG: &str = "9c41f8a25e77b0613792ce4d8a215b4f";
const DEFAULT_SITE_TAG: &str = "5d17e8c2a90f4fd2b3c17a08e2f4d961";

/// Aggregated analytics for one window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub visits: i64,
    #[serde(default)]
    pub pageviews: i64,
    #[serde(default)]
    pub top_pages: BTreeMap<String, i64>,
    #[serde(default)]
    pub countries: BTreeMap<String, i64>,
}

/// Account and site tags, from the environment with fallbacks.
pub fn account_config() -> (String, String) {
    let account = env::var("CF_ACCOUNT_ID").unwrap_or_else(|_| DEFAULT_ACCOUNT_TAG.to_string());
    let site =
        env::var("CF_WEB_ANALYTICS_SITE_TAG").unwrap_or_else(|_| DEFAULT_SITE_TAG.to_string());
    (account, site)
}

const ANALYTICS_QUERY: &str = r"
query WebAnalytics($accountTag: string!, $filter: AccountRumPageloadEventsAdaptiveGroupsFilter_InputObject!) {
  viewer {
    accounts(filter: {accountTag: $accountTag}) {
      rumPageloadEventsAdaptiveGroups(
        filter: $filter
        limit: 5000
      ) {
        sum {
          visits
        }
        count
        dimensions {
          requestPath
          countryName
        }
      }
    }
  }
}
";

// GraphQL response shape
#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ResponseData {
    viewer: Viewer,
}

#[derive(Deserialize)]
struct Viewer {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Deserialize)]
struct Account {
    #[serde(rename = "rumPageloadEventsAdaptiveGroups", default)]
    rum_groups: Vec<RumGroup>,
}

#[derive(Deserialize)]
struct RumGroup {
    sum: SumData,
    /// Event count doubles as pageviews in this API
    count: i64,
    dimensions: Dimensions,
}

#[derive(Deserialize)]
struct SumData {
    visits: i64,
}

#[derive(Deserialize)]
struct Dimensions {
    #[serde(rename = "requestPath", default)]
    request_path: String,
    #[serde(rename = "countryName", default)]
    country_name: String,
}

/// Fetch analytics for a date range, aggregated over paths and countries.
///
/// Bots are excluded and results are scoped to the configured site tag.
pub fn fetch_analytics(token: &str, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Snapshot> {
    let (account_tag, site_tag) = account_config();

    let filter = json!({
        "AND": [
            {
                "datetime_geq": since.to_rfc3339_opts(SecondsFormat::Secs, true),
                "datetime_leq": until.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            {"bot": 0},
            {"OR": [{"siteTag": site_tag}]},
        ],
    });

    let body = json!({
        "query": ANALYTICS_QUERY,
        "variables": {
            "accountTag": account_tag,
            "filter": filter,
        },
    });

    let client = http::client(http::PROVIDER_TIMEOUT)?;
    let resp = client
        .post(GRAPHQL_ENDPOINT)
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .context("analytics request failed")?;

    let status = resp.status();
    let text = resp.text().context("reading analytics response")?;
    if !status.is_success() {
        bail!("API returned {}: {text}", status.as_u16());
    }

    let parsed: GraphQlResponse =
        serde_json::from_str(&text).context("failed to parse response")?;

    if let Some(err) = parsed.errors.first() {
        if err.message.contains("not authorized") {
            bail!(
                "not authorized - ensure your API token has 'Account Analytics:Read' permission\n\
                 Create/edit token at: https://dash.cloudflare.com/profile/api-tokens"
            );
        }
        bail!("GraphQL error: {}", err.message);
    }

    let mut snapshot = Snapshot {
        timestamp: Some(Utc::now()),
        ..Default::default()
    };

    let Some(account) = parsed.data.and_then(|d| d.viewer.accounts.into_iter().next()) else {
        return Ok(snapshot); // No data
    };

    for group in account.rum_groups {
        snapshot.visits += group.sum.visits;
        snapshot.pageviews += group.count;

        if !group.dimensions.request_path.is_empty() {
            *snapshot
                .top_pages
                .entry(group.dimensions.request_path)
                .or_default() += group.count;
        }
        if !group.dimensions.country_name.is_empty() {
            *snapshot
                .countries
                .entry(group.dimensions.country_name)
                .or_default() += group.count;
        }
    }

    Ok(snapshot)
}

/// Load the previous snapshot; `None` on first run.
pub fn load_state(path: &Path) -> Option<Snapshot> {
    fsio::read_json(path).ok()
}

/// Replace the snapshot state file atomically.
pub fn save_state(path: &Path, snapshot: &Snapshot) -> Result<()> {
    fsio::write_json_atomic(path, snapshot)
}

/// Top N entries of a metric map, by value descending.
pub fn top_n(map: &BTreeMap<String, i64>, limit: usize) -> Vec<(&str, i64)> {
    let mut sorted: Vec<(&str, i64)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sorted.truncate(limit);
    sorted
}
