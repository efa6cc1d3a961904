use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::{EvalError, NNOutput};

pub type EvalResult = Result<Arc<NNOutput>, EvalError>;

/// Where a client thread receives the answer to its request. Each client thread allocates one
/// and reuses it for every evaluation it makes.
pub struct ResultSlot {
    shared: Arc<SlotShared>,
    row: Vec<f32>,
    legal: Vec<bool>,
}

/// The part of a slot that server threads publish into.
pub(crate) struct SlotShared {
    state: Mutex<SlotState>,
    result_ready: Condvar,
}

#[derive(Default)]
struct SlotState {
    result: Option<EvalResult>,
    error_logged: bool,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SlotShared {
                state: Mutex::new(SlotState::default()),
                result_ready: Condvar::new(),
            }),
            row: Vec::new(),
            legal: Vec::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().result.is_some()
    }

    /// Whether a backend failure has been logged for this slot. Only the first failure is logged.
    pub fn has_logged_error(&self) -> bool {
        self.shared.state.lock().error_logged
    }

    pub(crate) fn shared(&self) -> &Arc<SlotShared> {
        &self.shared
    }

    pub(crate) fn staging_mut(&mut self, row_width: usize, policy_size: usize) -> (&mut [f32], &mut [bool]) {
        self.row.resize(row_width, 0.0);
        self.legal.resize(policy_size, false);

        (&mut self.row, &mut self.legal)
    }

    pub(crate) fn staged_row(&self) -> &[f32] {
        &self.row
    }

    pub(crate) fn staged_legal(&self) -> &[bool] {
        &self.legal
    }

    /// Blocks until a result has been published, then takes it, leaving the slot not ready.
    pub(crate) fn wait(&self) -> EvalResult {
        let mut state = self.shared.state.lock();

        loop {
            if let Some(result) = state.result.take() {
                return result;
            }

            self.shared.result_ready.wait(&mut state);
        }
    }

    /// Drops a result left over from an earlier request.
    pub(crate) fn clear(&self) -> bool {
        self.shared.state.lock().result.take().is_some()
    }
}

impl Default for ResultSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotShared {
    /// Stores the result and wakes the owning client. A slot that already holds a result is left
    /// untouched and `false` is returned.
    pub(crate) fn publish(&self, result: EvalResult) -> bool {
        let mut state = self.state.lock();

        if state.result.is_some() {
            return false;
        }

        state.result = Some(result);
        drop(state);

        self.result_ready.notify_one();

        true
    }

    /// Returns true the first time it is called for this slot.
    pub(crate) fn should_log_error(&self) -> bool {
        let mut state = self.state.lock();

        !std::mem::replace(&mut state.error_logged, true)
    }
}
