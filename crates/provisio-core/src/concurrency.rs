use crate::progress::{CancellationFlag, ProgressMonitor};
use crate::CoreError;
use tracing::warn;

/// Route Ctrl-C into `flag`, so a run monitored by it stops at the next
/// operand or phase boundary and rolls back. A second Ctrl-C exits.
///
/// Only one handler can be installed per process.
pub fn install_signal_handler(flag: CancellationFlag) -> Result<(), CoreError> {
    ctrlc::set_handler(move || interrupt(&flag))?;
    Ok(())
}

fn interrupt(flag: &CancellationFlag) {
    if flag.is_cancelled() {
        std::process::exit(130);
    }
    flag.cancel();
    warn!("interrupt received, cancelling at the next boundary");
}
