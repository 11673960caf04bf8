use serde::Serialize;
use url::form_urlencoded;

// -------------------------
// Query flags
// -------------------------

/// Return resource links instead of redirecting after submission.
pub const FLAG_REPORT_URLS: &str = "report-urls";
/// Serve the build log when the build failed or produced no document.
pub const FLAG_LOG_ON_ERROR: &str = "log-on-error";
/// Poll counter of the wait endpoint.
pub const PARAM_LOOP: &str = "loop";

/// Ordered query parameters, forwarded from request to redirect target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => Self(form_urlencoded::parse(raw.as_bytes()).into_owned().collect()),
            None => Self::default(),
        }
    }

    /// Whether the flag is present at all, with or without a value.
    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(k, _)| k == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every occurrence of `name` with a single `name=value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter().position(|(k, _)| k == name) {
            Some(idx) => {
                self.0[idx].1 = value;
                let mut seen = false;
                self.0.retain(|(k, _)| {
                    if k != name {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.0.push((name.to_string(), value)),
        }
    }

    /// Poll counter of a wait request; missing or unparsable means 0.
    pub fn loop_count(&self) -> u32 {
        self.get(PARAM_LOOP)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }

    /// `path`, plus `?query` when there are parameters.
    pub fn append_to(&self, path: &str) -> String {
        if self.0.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", self.encode())
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// Links returned by `POST /job?report-urls`.
#[derive(Debug, Serialize)]
pub struct JobLinks {
    pub download: String,
    pub status: String,
    pub wait: String,
}
