//! Run-once registry of cleanup actions attached to a scope

use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Mutex, MutexGuard, PoisonError},
};

/// A no-argument action run when a scope closes
pub type CleanupAction = Box<dyn FnOnce() + Send + 'static>;

/// Ordered list of cleanup actions.
///
/// The list is drained exactly once. After [`CleanupList::take`] has returned
/// the actions, the list is sealed: later registrations are rejected and a
/// second `take` yields nothing, so explicit close and the drop guard can
/// never both run the same action.
pub(crate) struct CleanupList {
    actions: Mutex<Option<Vec<CleanupAction>>>,
}

impl CleanupList {
    pub(crate) fn new() -> Self {
        Self {
            actions: Mutex::new(Some(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<CleanupAction>>> {
        // An action never runs under this lock, so a poisoned lock still holds a consistent list
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an action if the list is still open.
    ///
    /// `admit` is evaluated under the list lock; returning `Err` rejects the action.
    pub(crate) fn push_if<E>(
        &self,
        action: CleanupAction,
        admit: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        let mut guard = self.lock();
        admit()?;
        if let Some(actions) = guard.as_mut() {
            actions.push(action);
        }
        Ok(())
    }

    /// Seal the list and hand back the pending actions, if not sealed already
    pub(crate) fn take(&self) -> Option<Vec<CleanupAction>> {
        self.lock().take()
    }

    /// Number of actions waiting to run
    pub(crate) fn pending(&self) -> usize {
        self.lock().as_ref().map_or(0, Vec::len)
    }
}

/// Panic payload captured from a failing cleanup action
pub(crate) type CleanupPanic = Box<dyn Any + Send + 'static>;

/// Run actions last-registered first.
///
/// Every action runs even if an earlier one panics; the panic payloads are
/// returned in the order they occurred.
pub(crate) fn run_all(actions: Vec<CleanupAction>) -> Vec<CleanupPanic> {
    let mut panics = Vec::new();
    for action in actions.into_iter().rev() {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(action)) {
            panics.push(payload);
        }
    }
    panics
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_runs_in_reverse_order_once() {
        let list = CleanupList::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = Arc::clone(&log);
            list.push_if::<()>(Box::new(move || log.lock().unwrap().push(i)), || Ok(()))
                .unwrap();
        }
        assert_eq!(list.pending(), 3);

        assert!(run_all(list.take().unwrap()).is_empty());
        assert_eq!(*log.lock().unwrap(), vec![2, 1, 0]);

        assert!(list.take().is_none());
        assert_eq!(list.pending(), 0);
    }

    #[test]
    fn test_admit_rejects() {
        let list = CleanupList::new();
        let result = list.push_if(Box::new(|| {}), || Err("closed"));
        assert_eq!(result, Err("closed"));
        assert_eq!(list.pending(), 0);
    }

    #[test]
    fn test_contained_panics_do_not_stop_others() {
        let list = CleanupList::new();
        let ran = Arc::new(Mutex::new(0));

        let r = Arc::clone(&ran);
        list.push_if::<()>(Box::new(move || *r.lock().unwrap() += 1), || Ok(()))
            .unwrap();
        list.push_if::<()>(Box::new(|| panic!("cleanup failed")), || Ok(()))
            .unwrap();

        let panics = run_all(list.take().unwrap());
        assert_eq!(panics.len(), 1);
        assert_eq!(*ran.lock().unwrap(), 1);
    }
}
