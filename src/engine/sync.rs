use std::pin::pin;
use std::time::Duration;
use tokio::time::Instant;

use super::{require_session_id, RoomEngine};
use crate::error::{AppError, AppResult};
use crate::types::*;
use crate::util::normalize_room_code;

impl RoomEngine {
    /// Version-aware long poll: block until the room's version exceeds the
    /// caller's baseline or a bounded wait elapses, then return the view.
    /// A non-positive baseline means "return the current state now".
    /// Absence of change is never an error.
    pub async fn sync(
        &self,
        room_code: &str,
        session_id: &str,
        since_version: i64,
    ) -> AppResult<RoomView> {
        let session_id = require_session_id(session_id)?;
        let code = normalize_room_code(room_code);
        if code.is_empty() {
            return Err(AppError::Validation("Room code is required.".to_string()));
        }

        let deadline = Instant::now() + Duration::from_millis(LONG_POLL_TIMEOUT_MS);

        loop {
            let gate = self.gate(&code);
            let mut notified = pin!(gate.notify.notified());

            {
                let _guard = gate.lock.lock().await;
                // Register for wakeups while the lock is still held; a
                // commit landing between unlock and the wait below would
                // otherwise go unseen until the fallback tick.
                notified.as_mut().enable();

                let mut room = self.load_room_gated(&gate, &code).await?;

                let transitioned = self.apply_automatic_transitions(&mut room);
                if transitioned {
                    self.commit(&gate, &room).await?;
                }

                let view = self.room_view(&room, &session_id);
                if since_version <= 0 || view.version as i64 > since_version || transitioned {
                    return Ok(view);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            // Wake on the next commit, or on a short tick so time-driven
            // transitions (discussion deadlines) fire without writers.
            let tick = Duration::from_millis(LONG_POLL_TICK_MS).min(deadline - now);
            let _ = tokio::time::timeout(tick, notified.as_mut()).await;
        }

        // Timed out: return whatever the room looks like now.
        let gate = self.gate(&code);
        let _guard = gate.lock.lock().await;
        let mut room = self.load_room_gated(&gate, &code).await?;
        if self.apply_automatic_transitions(&mut room) {
            self.commit(&gate, &room).await?;
        }
        Ok(self.room_view(&room, &session_id))
    }
}
