//! Static request-routing table
//!
//! Maps the fixed local API paths to the backend and workflow origins. The
//! same table drives the forwarding proxy and direct client resolution.

use serde::Serialize;

/// Local path of the speech-to-text endpoint
pub const STT_PATH: &str = "/api/stt";

/// Local path of the text-to-speech endpoint
pub const TTS_PATH: &str = "/api/tts";

/// Local path of the preset TTS phrase endpoint
pub const TTS_TEXT_PATH: &str = "/api/tts-text";

/// Local path of the workflow webhook
pub const WORKFLOW_PATH: &str = "/api/n8n";

/// Upstream path of the workflow webhook on the workflow origin
const WORKFLOW_UPSTREAM_PATH: &str = "/webhook/my-webhook";

/// Which configured origin a route forwards to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Upstream {
    /// STT/TTS backend (`BACKEND_ORIGIN`)
    Backend,
    /// Workflow engine (`N8N_ORIGIN`)
    Workflow,
}

/// One row of the routing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Path the client calls
    pub local_path: &'static str,
    /// Origin the request goes to
    pub upstream: Upstream,
    /// Path on the upstream origin
    pub upstream_path: &'static str,
    /// Short description
    pub purpose: &'static str,
}

const ROUTES: [Route; 4] = [
    Route {
        local_path: STT_PATH,
        upstream: Upstream::Backend,
        upstream_path: STT_PATH,
        purpose: "speech-to-text",
    },
    Route {
        local_path: TTS_PATH,
        upstream: Upstream::Backend,
        upstream_path: TTS_PATH,
        purpose: "text-to-speech",
    },
    Route {
        local_path: TTS_TEXT_PATH,
        upstream: Upstream::Backend,
        upstream_path: TTS_TEXT_PATH,
        purpose: "text-to-speech (alt)",
    },
    Route {
        local_path: WORKFLOW_PATH,
        upstream: Upstream::Workflow,
        upstream_path: WORKFLOW_UPSTREAM_PATH,
        purpose: "workflow/reply engine",
    },
];

/// Routing table bound to concrete origins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    backend_origin: String,
    workflow_origin: String,
}

impl RouteTable {
    /// Bind the table to the backend and workflow origins
    #[must_use]
    pub fn new(backend_origin: impl Into<String>, workflow_origin: impl Into<String>) -> Self {
        Self {
            backend_origin: trim_origin(backend_origin.into()),
            workflow_origin: trim_origin(workflow_origin.into()),
        }
    }

    /// All routes in declaration order
    #[must_use]
    pub const fn routes(&self) -> &'static [Route] {
        &ROUTES
    }

    /// Origin a route kind forwards to
    #[must_use]
    pub fn origin(&self, upstream: Upstream) -> &str {
        match upstream {
            Upstream::Backend => &self.backend_origin,
            Upstream::Workflow => &self.workflow_origin,
        }
    }

    /// Route registered for a local path
    #[must_use]
    pub fn route(&self, local_path: &str) -> Option<&'static Route> {
        ROUTES.iter().find(|r| r.local_path == local_path)
    }

    /// Absolute upstream URL for a local path
    #[must_use]
    pub fn resolve(&self, local_path: &str) -> Option<String> {
        self.route(local_path)
            .map(|r| format!("{}{}", self.origin(r.upstream), r.upstream_path))
    }
}

/// Concrete URLs the remote clients call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub stt: String,
    pub tts: String,
    pub tts_text: String,
    pub workflow: String,
}

impl Endpoints {
    /// Call every endpoint through a proxy at `api_base`
    #[must_use]
    pub fn via_proxy(api_base: &str) -> Self {
        let base = api_base.trim_end_matches('/');
        Self {
            stt: format!("{base}{STT_PATH}"),
            tts: format!("{base}{TTS_PATH}"),
            tts_text: format!("{base}{TTS_TEXT_PATH}"),
            workflow: format!("{base}{WORKFLOW_PATH}"),
        }
    }

    /// Call every endpoint directly on its upstream origin
    #[must_use]
    pub fn direct(table: &RouteTable) -> Self {
        let resolve = |path: &str| table.resolve(path).unwrap_or_default();
        Self {
            stt: resolve(STT_PATH),
            tts: resolve(TTS_PATH),
            tts_text: resolve(TTS_TEXT_PATH),
            workflow: resolve(WORKFLOW_PATH),
        }
    }
}

fn trim_origin(origin: String) -> String {
    match origin.strip_suffix('/') {
        Some(trimmed) => trimmed.to_string(),
        None => origin,
    }
}
