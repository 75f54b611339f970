use serde::{Deserialize, Serialize};

/// How a destination is treated when the session is not active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClassification {
    /// Reachable without a session.
    Public,
    /// Needs an active session.
    AuthRequired,
    /// Not listed anywhere; falls back to the home page.
    Default,
}

/// Static page classification owned by the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageTable {
    pub home: String,
    pub login: String,
    pub public: Vec<String>,
    pub auth_required: Vec<String>,
}

impl Default for PageTable {
    fn default() -> Self {
        let pages = |paths: &[&str]| -> Vec<String> { paths.iter().map(|p| p.to_string()).collect() };
        Self {
            home: "/pages/index".to_string(),
            login: "/pages/login".to_string(),
            public: pages(&[
                "/pages/index",
                "/pages/login",
                "/pages/doctors/index",
                "/pages/common/webview/index",
                "/pages/common/textview/index",
            ]),
            auth_required: pages(&[
                "/pages/appointment/index",
                "/pages/doctor-list/index",
                "/pages/appointment-detail/index",
                "/pages/appointment-history/index",
                "/pages/mine/index",
                "/pages/work/index",
                "/pages/mine/info/index",
                "/pages/mine/info/edit",
                "/pages/mine/avatar/index",
                "/pages/mine/pwd/index",
                "/pages/mine/setting/index",
            ]),
        }
    }
}

impl PageTable {
    /// Classify a destination URL. Any `?query` suffix is ignored and a
    /// page listed as both public and auth-required counts as auth-required.
    pub fn classify(&self, url: &str) -> PageClassification {
        let path = strip_query(url);
        if self.auth_required.iter().any(|page| page == path) {
            PageClassification::AuthRequired
        } else if self.public.iter().any(|page| page == path) {
            PageClassification::Public
        } else {
            PageClassification::Default
        }
    }
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
