//! Front panel lock around register reads.

use tracing::{debug, warn};

use crate::constants::{STATUS_RECEIVE_SIZE, SUB_LOCK_PANEL};
use crate::error::{FramingError, Result};
use crate::frame::Command;
use crate::link::Link;
use crate::transport::Transport;

/// Locks (`held = true`) or unlocks the front panel.
///
/// The device must echo both the sub-command and the requested state.
pub fn set_lock<T: Transport>(link: &mut Link<T>, held: bool) -> Result<()> {
    debug!(held, "Panel lock");
    let state = u8::from(held);
    let response = link.request(Command::Lock, &[SUB_LOCK_PANEL, state], STATUS_RECEIVE_SIZE)?;

    let sub = response.sub_command()?;
    if sub != SUB_LOCK_PANEL {
        return Err(FramingError::SubCommand {
            expected: SUB_LOCK_PANEL,
            actual: sub,
        }
        .into());
    }
    let echoed = response
        .payload
        .get(1)
        .copied()
        .ok_or(FramingError::TooShort {
            actual: response.payload.len(),
        })?;
    if echoed != state {
        return Err(FramingError::LockEcho {
            expected: state,
            actual: echoed,
        }
        .into());
    }
    Ok(())
}

/// Runs `f` with the panel locked.
///
/// The panel is unlocked afterwards in every case. When `f` fails, the unlock
/// is best effort: its own failure is logged and the error of `f` is returned.
pub fn with_panel_locked<T, R, F>(link: &mut Link<T>, f: F) -> Result<R>
where
    T: Transport,
    F: FnOnce(&mut Link<T>) -> Result<R>,
{
    set_lock(link, true)?;
    match f(link) {
        Ok(value) => {
            set_lock(link, false)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(unlock_err) = set_lock(link, false) {
                warn!("Unlocking the panel failed: {}", unlock_err);
            }
            Err(err)
        }
    }
}
