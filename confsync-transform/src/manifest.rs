//! Plugin manifest grounding.
//!
//! A config file references plugins by `plugin:` values, either as a full
//! URL or as `owner/repo[:workflow][@ref]` shorthand. Each reference
//! resolves to a `manifest.json` whose contents are handed to the model so it
//! can only use settings the plugin actually declares.

use std::collections::HashSet;

use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};

const RAW_CONTENT_BASE: &str = "https://raw.githubusercontent.com";
const DEFAULT_PLUGIN_REF: &str = "main";

// ---------------------------------------------------------------------------
// Reference extraction
// ---------------------------------------------------------------------------

fn collect_plugin_values(value: &YamlValue, out: &mut Vec<String>) {
    match value {
        YamlValue::Mapping(map) => {
            for (key, child) in map {
                if key.as_str() == Some("plugin") {
                    if let Some(s) = child.as_str() {
                        out.push(s.trim().to_string());
                        continue;
                    }
                }
                collect_plugin_values(child, out);
            }
        }
        YamlValue::Sequence(items) => {
            for item in items {
                collect_plugin_values(item, out);
            }
        }
        YamlValue::Tagged(tagged) => collect_plugin_values(&tagged.value, out),
        _ => {}
    }
}

/// Map one `plugin:` value to its manifest URL, or `None` if it is neither
/// a URL nor `owner/repo` shorthand.
pub fn manifest_url(plugin: &str) -> Option<String> {
    let plugin = plugin.trim();
    if plugin.starts_with("http://") || plugin.starts_with("https://") {
        return Some(format!("{}/manifest.json", plugin.trim_end_matches('/')));
    }

    let (location, git_ref) = match plugin.split_once('@') {
        Some((loc, r)) if !r.is_empty() => (loc, r),
        Some((loc, _)) => (loc, DEFAULT_PLUGIN_REF),
        None => (plugin, DEFAULT_PLUGIN_REF),
    };
    // The optional `:workflow` part names a file inside the repo, not a ref.
    let repo_part = location.split_once(':').map_or(location, |(r, _)| r);
    let (owner, repo) = repo_part.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some(format!("{RAW_CONTENT_BASE}/{owner}/{repo}/{git_ref}/manifest.json"))
}

/// Manifest URLs for every plugin referenced in `content`, in document
/// order, de-duplicated. YAML that does not parse yields an empty list.
pub fn parse_plugin_urls(content: &str) -> Vec<String> {
    let doc: YamlValue = match serde_yaml::from_str(content) {
        Ok(doc) => doc,
        Err(e) => {
            debug!("config is not valid YAML, no plugin references extracted: {e}");
            return vec![];
        }
    };

    let mut raw = Vec::new();
    collect_plugin_values(&doc, &mut raw);

    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(|p| manifest_url(p))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Fetch every manifest. Best effort: a manifest that cannot be fetched or
/// parsed is logged and left out.
pub async fn fetch_manifests(http: &reqwest::Client, urls: &[String]) -> Map<String, JsonValue> {
    let mut manifests = Map::new();
    for url in urls {
        match fetch_one(http, url).await {
            Ok(manifest) => {
                manifests.insert(url.clone(), manifest);
            }
            Err(reason) => warn!("skipping plugin manifest {url}: {reason}"),
        }
    }
    manifests
}

async fn fetch_one(http: &reqwest::Client, url: &str) -> Result<JsonValue, String> {
    let resp = http.get(url).send().await.map_err(|e| e.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }
    resp.json::<JsonValue>().await.map_err(|e| e.to_string())
}
