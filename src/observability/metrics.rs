//! Prometheus metrics.
//!
//! Recording functions are no-ops until [`init_metrics`] installs a
//! recorder, so the engine can call them unconditionally.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{ErrorKind, SignClashError};
use crate::sign::Outcome;

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Action names accepted as labels; anything else becomes `"__unknown__"`.
const KNOWN_ACTIONS: [&str; 9] = [
    "create",
    "join",
    "ready",
    "not_ready",
    "pick",
    "next_round",
    "leave",
    "end",
    "lookup",
];

/// Sanitizes an action name for use as a metrics label.
#[must_use]
pub fn sanitize_action_label(action: &str) -> &str {
    if KNOWN_ACTIONS.contains(&action) {
        action
    } else {
        "__unknown__"
    }
}

/// Installs the global recorder.
///
/// With `Some(port)` a Prometheus scrape endpoint listens on
/// `127.0.0.1:<port>`; with `None` metrics are recorded in-process only.
///
/// # Errors
///
/// Returns `SignClashError::Io` if the recorder or listener cannot be
/// installed.
pub fn init_metrics(port: Option<u16>) -> Result<(), SignClashError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| SignClashError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "signclash_matches_created_total",
        "Total number of matches created"
    );
    describe_counter!(
        "signclash_actions_total",
        "Match actions attempted, by action"
    );
    describe_counter!(
        "signclash_rounds_resolved_total",
        "Rounds resolved, by outcome for the first seat"
    );
    describe_counter!(
        "signclash_errors_total",
        "Rejected match actions, by error kind"
    );
    describe_counter!(
        "signclash_broadcast_failures_total",
        "Notifications the broadcaster refused"
    );
    describe_gauge!("signclash_active_matches", "Matches that have not ended");
}

pub fn record_action(action: &str) {
    let label = sanitize_action_label(action);
    counter!("signclash_actions_total", "action" => label.to_owned()).increment(1);
}

pub fn record_error(kind: ErrorKind) {
    counter!("signclash_errors_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_match_created() {
    counter!("signclash_matches_created_total").increment(1);
    gauge!("signclash_active_matches").increment(1.0);
}

pub fn record_match_ended() {
    gauge!("signclash_active_matches").decrement(1.0);
}

pub fn record_round_resolved(outcome: Outcome) {
    counter!("signclash_rounds_resolved_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_broadcast_failure() {
    counter!("signclash_broadcast_failures_total").increment(1);
}
