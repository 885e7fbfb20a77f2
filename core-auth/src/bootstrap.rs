//! # Client Bootstrap
//!
//! The web client's identity (client id, version, package name, build
//! timestamp and the captcha-sign algorithm chain) is not published
//! anywhere stable. It is scraped from the main script referenced by the
//! public drive page.

use bridge_traits::http::{HttpClient, HttpRequest};
use regex::Regex;
use tracing::{debug, info, instrument};

use crate::error::{AuthError, Result};
use crate::types::{ClientProfile, SigningAlgorithm};

const MAIN_SCRIPT_PATTERN: &str = r"/drive/main\.[a-z0-9]+\.js";
const CLIENT_ID_PATTERN: &str = r#"clientId:"([A-Za-z0-9]+)""#;
const CLIENT_VERSION_PATTERN: &str = r#"clientVersion:"([0-9.]+)""#;
const PACKAGE_NAME_PATTERN: &str = r#"packageName:"([a-z0-9.]+)""#;
const TIMESTAMP_PATTERN: &str = r#"timestamp:"([0-9]+)""#;
const ALGORITHMS_PATTERN: &str = r"algorithms:(\[[^\]]+\])";

/// Fetch the drive page and its main script, then parse the profile.
#[instrument(skip(http))]
pub async fn fetch_client_profile(http: &dyn HttpClient, web_base_url: &str) -> Result<ClientProfile> {
    let base = web_base_url.trim_end_matches('/');

    let page = fetch_text(http, &format!("{}/drive", base)).await?;
    let script_path = find_main_script(&page)?;
    debug!(script = %script_path, "Found main script");

    let script = fetch_text(http, &format!("{}{}", base, script_path)).await?;
    let profile = parse_client_profile(&script)?;

    info!(
        client_version = %profile.client_version,
        steps = profile.algorithms.len(),
        "Loaded client profile"
    );
    Ok(profile)
}

async fn fetch_text(http: &dyn HttpClient, url: &str) -> Result<String> {
    let response = http.execute(HttpRequest::get(url)).await?;
    if !response.is_success() {
        return Err(AuthError::UnexpectedStatus {
            endpoint: url.to_string(),
            status: response.status,
            body: response.text_lossy(),
        });
    }
    Ok(response.text_lossy())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AuthError::BootstrapFailed(format!("bad pattern: {}", e)))
}

/// Path of the main script referenced by the drive page
pub fn find_main_script(page: &str) -> Result<String> {
    compile(MAIN_SCRIPT_PATTERN)?
        .find(page)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AuthError::BootstrapFailed("main script not referenced by drive page".to_string()))
}

fn first_capture(pattern: &str, haystack: &str, field: &str) -> Result<String> {
    compile(pattern)?
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AuthError::BootstrapFailed(format!("{} not found in main script", field)))
}

/// Extract the client profile from the main script
pub fn parse_client_profile(script: &str) -> Result<ClientProfile> {
    let algorithms = first_capture(ALGORITHMS_PATTERN, script, "algorithms")?;

    Ok(ClientProfile {
        client_id: first_capture(CLIENT_ID_PATTERN, script, "clientId")?,
        client_version: first_capture(CLIENT_VERSION_PATTERN, script, "clientVersion")?,
        package_name: first_capture(PACKAGE_NAME_PATTERN, script, "packageName")?,
        timestamp: first_capture(TIMESTAMP_PATTERN, script, "timestamp")?,
        algorithms: parse_algorithms(&algorithms)?,
    })
}

/// Decode the algorithm list literal.
///
/// The script holds a JavaScript object literal with bare keys
/// (`[{alg:"md5",salt:"x"}]`), so keys are quoted before handing the text
/// to serde_json.
pub fn parse_algorithms(literal: &str) -> Result<Vec<SigningAlgorithm>> {
    let bare_key = compile(r#"([\{,]\s*)([A-Za-z_$][A-Za-z0-9_$]*)\s*:"#)?;
    let quoted = bare_key.replace_all(literal, r#"$1"$2":"#);

    serde_json::from_str(&quoted)
        .map_err(|e| AuthError::BootstrapFailed(format!("algorithms literal: {}", e)))
}
