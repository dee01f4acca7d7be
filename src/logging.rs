use std::time::Instant;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init() {
    let fmt_layer = fmt::layer().json();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// One `audit` event per security decision on the HTTP surface.
pub struct Audit {
    request_id: String,
    route: &'static str,
    started: Instant,
}

impl Audit {
    pub fn begin(route: &'static str) -> Self {
        Self { request_id: uuid::Uuid::new_v4().to_string(), route, started: Instant::now() }
    }

    pub fn allow(self) {
        self.finish("allow", "OK");
    }

    pub fn deny(self, code: &str) {
        self.finish("deny", code);
    }

    pub fn error(self, code: &str) {
        self.finish("error", code);
    }

    fn finish(self, decision: &str, code: &str) {
        tracing::info!(
            request_id = %self.request_id,
            route = self.route,
            decision = decision,
            code = code,
            duration_ms = self.started.elapsed().as_millis() as u64,
            "audit"
        );
    }
}
