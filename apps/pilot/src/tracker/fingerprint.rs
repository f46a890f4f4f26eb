//! Fingerprint Resolver: stable identity for a job posting.
//!
//! Precedence when computing a fingerprint:
//! 1. platform job id (e.g. `linkedin:3812345678`)
//! 2. canonical URL
//! 3. `company|role|location`
//!
//! Pure functions only.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::form_urlencoded;
use url::Url;

const CANONICAL_SCHEME: &str = "https";
const CANONICAL_PORT: u16 = 443;

/// Query parameters that only carry attribution, never identity.
/// Compared case-insensitively; anything starting with `utm_` is also dropped.
const TRACKING_PARAMS: &[&str] = &[
    "gclid",
    "fbclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "ref",
    "refid",
    "ref_src",
    "src",
    "source",
    "trk",
    "trkinfo",
    "tracking_id",
    "trackingid",
    "_hsenc",
    "_hsmi",
    "igshid",
    "si",
];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Canonical form of a posting URL: `https` scheme, lowercase host, no
/// default port, no fragment, tracking parameters removed, remaining query
/// parameters sorted, trailing path slashes dropped.
///
/// Idempotent. Input that does not parse as an absolute URL with a host is
/// returned trimmed but otherwise untouched.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let Some(host) = parsed.host_str() else {
        return trimmed.to_string();
    };

    // Non-special schemes keep the host's case when parsed.
    let mut canonical = format!("{CANONICAL_SCHEME}://{}", host.to_ascii_lowercase());
    if let Some(port) = parsed.port().filter(|p| *p != CANONICAL_PORT) {
        canonical.push_str(&format!(":{port}"));
    }
    canonical.push_str(parsed.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        canonical.push('?');
        canonical.push_str(&query);
    }

    canonical
}

struct JobIdPatterns {
    linkedin_path: Regex,
    greenhouse_path: Regex,
    lever_path: Regex,
    ashby_path: Regex,
    workday_path: Regex,
    numeric: Regex,
    hex: Regex,
}

fn patterns() -> &'static JobIdPatterns {
    static PATTERNS: OnceLock<JobIdPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("job id pattern is valid");
        JobIdPatterns {
            linkedin_path: compile(r"^/jobs/view/(?:[^/]*-)?(\d+)/?$"),
            greenhouse_path: compile(r"^/[^/]+/jobs/(\d+)/?$"),
            lever_path: compile(r"^/[^/]+/([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})(?:/.*)?$"),
            ashby_path: compile(r"^/[^/]+/([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})(?:/.*)?$"),
            workday_path: compile(r"/job/(?:[^/]+/)*[^/]*_([A-Za-z0-9-]+)/?$"),
            numeric: compile(r"^\d+$"),
            hex: compile(r"^[0-9a-fA-F]+$"),
        }
    })
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Platform-prefixed job id for known job-board URL shapes, or `None`.
///
/// Recognized: LinkedIn, Greenhouse (board URLs and embedded `gh_jid`),
/// Lever, Ashby, Workday and Indeed.
pub fn extract_job_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let path = url.path();
    let p = patterns();

    if host_matches(&host, "linkedin.com") {
        if let Some(caps) = p.linkedin_path.captures(path) {
            return Some(format!("linkedin:{}", &caps[1]));
        }
        if let Some(id) = query_value(&url, "currentJobId").filter(|v| p.numeric.is_match(v)) {
            return Some(format!("linkedin:{id}"));
        }
    }

    if host_matches(&host, "greenhouse.io") {
        if let Some(caps) = p.greenhouse_path.captures(path) {
            return Some(format!("greenhouse:{}", &caps[1]));
        }
    }
    // Company career pages embed Greenhouse boards behind their own domain.
    if let Some(id) = query_value(&url, "gh_jid").filter(|v| p.numeric.is_match(v)) {
        return Some(format!("greenhouse:{id}"));
    }

    if host == "jobs.lever.co" {
        if let Some(caps) = p.lever_path.captures(path) {
            return Some(format!("lever:{}", caps[1].to_ascii_lowercase()));
        }
    }

    if host == "jobs.ashbyhq.com" {
        if let Some(caps) = p.ashby_path.captures(path) {
            return Some(format!("ashby:{}", caps[1].to_ascii_lowercase()));
        }
    }

    if host_matches(&host, "myworkdayjobs.com") {
        if let Some(caps) = p.workday_path.captures(path) {
            return Some(format!("workday:{}", &caps[1]));
        }
    }

    if host_matches(&host, "indeed.com") {
        if let Some(jk) = query_value(&url, "jk").filter(|v| p.hex.is_match(v)) {
            return Some(format!("indeed:{}", jk.to_ascii_lowercase()));
        }
    }

    None
}

/// Deterministic SHA-256 fingerprint, lowercase hex.
///
/// Blank `job_id` / `url` values count as absent.
pub fn compute_fingerprint(
    url: Option<&str>,
    job_id: Option<&str>,
    company: &str,
    role: &str,
    location: Option<&str>,
) -> String {
    let key = if let Some(job_id) = present(job_id) {
        job_id.to_string()
    } else if let Some(url) = present(url) {
        normalize_url(url)
    } else {
        [company, role, location.unwrap_or("")]
            .iter()
            .map(|part| part.trim().to_lowercase())
            .collect::<Vec<_>>()
            .join("|")
    };

    hex::encode(Sha256::digest(key.as_bytes()))
}

fn present(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|v| !v.is_empty())
}
