use rama::{graceful::ShutdownGuard, telemetry::tracing};

use crate::state::ControllerState;

/// Logs every phase transition of the simulated lifecycle at the moment it happens.
///
/// The phase itself is derived from elapsed time, this task only makes
/// the transitions observable in the logs. It returns once the lifecycle
/// reached its final phase or the shutdown was initiated.
pub async fn report_phase_transitions(state: ControllerState, guard: ShutdownGuard) {
    tracing::info!(
        phase = %state.phase(),
        cyclic = state.config().lifecycle.is_cyclic(),
        "controller lifecycle started"
    );

    while let Some(sleep_for) = state.next_transition_in() {
        tracing::trace!("controller lifecycle: next transition in {sleep_for:?}");

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {},
            _ = guard.cancelled() => {
                tracing::debug!("controller lifecycle: guard cancelled; exit");
                return;
            }
        }

        tracing::info!(
            phase = %state.phase(),
            uptime = ?state.uptime(),
            "controller phase transition"
        );
    }

    tracing::debug!(
        phase = %state.phase(),
        "controller lifecycle reached its final phase"
    );
}
