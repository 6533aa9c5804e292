// SPDX-License-Identifier: CEPL-1.0
//! Undo list for multi-step Vulkan setup: every handle created so far is
//! destroyed, newest first, if a later step returns early.

pub(crate) struct Rollback<'a> {
    undo: Vec<Box<dyn FnOnce() + 'a>>,
}

impl<'a> Rollback<'a> {
    pub(crate) fn new() -> Self {
        Self { undo: Vec::new() }
    }

    /// Registers the destroy call for something just created.
    pub(crate) fn push(&mut self, undo: impl FnOnce() + 'a) {
        self.undo.push(Box::new(undo));
    }

    /// Setup succeeded; ownership moves to the caller's struct.
    pub(crate) fn commit(mut self) {
        self.undo.clear();
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        while let Some(undo) = self.undo.pop() {
            undo();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn setup(log: &RefCell<Vec<&'static str>>, fail_at: Option<usize>) -> Result<(), usize> {
        let mut undo = Rollback::new();
        for (i, name) in ["view", "framebuffer", "pool", "fence"].into_iter().enumerate() {
            if fail_at == Some(i) {
                return Err(i);
            }
            undo.push(move || log.borrow_mut().push(name));
        }
        undo.commit();
        Ok(())
    }

    #[test]
    fn early_return_destroys_created_steps_newest_first() {
        let log = RefCell::new(Vec::new());
        assert_eq!(setup(&log, Some(2)), Err(2));
        assert_eq!(*log.borrow(), vec!["framebuffer", "view"]);
    }

    #[test]
    fn failure_on_first_step_destroys_nothing() {
        let log = RefCell::new(Vec::new());
        assert_eq!(setup(&log, Some(0)), Err(0));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn committed_setup_keeps_everything() {
        let log = RefCell::new(Vec::new());
        assert_eq!(setup(&log, None), Ok(()));
        assert!(log.borrow().is_empty());
    }
}
