//! Jump management for control flow.
//!
//! Tracks loop contexts for break/continue. Break jumps are always
//! forward and patched when the loop exits; continue jumps are backward
//! when the continue target is already known (while loops) and forward
//! otherwise (counted and C-style loops, whose increment follows the body).

use super::JumpLabel;

#[derive(Debug, Default)]
pub struct JumpManager {
    /// Innermost last.
    loops: Vec<LoopContext>,
}

#[derive(Debug)]
struct LoopContext {
    continue_target: Option<usize>,
    /// Forward continue jumps waiting for the target.
    pending_continues: Vec<JumpLabel>,
    break_labels: Vec<JumpLabel>,
    /// Number of open protected regions when the loop was entered.
    try_depth: usize,
}

impl JumpManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_loop(&mut self, continue_target: Option<usize>, try_depth: usize) {
        self.loops.push(LoopContext {
            continue_target,
            pending_continues: Vec::new(),
            break_labels: Vec::new(),
            try_depth,
        });
    }

    /// Pop the current loop, returning its break and unpatched continue labels.
    pub fn exit_loop(&mut self) -> (Vec<JumpLabel>, Vec<JumpLabel>) {
        self.loops
            .pop()
            .map(|ctx| (ctx.break_labels, ctx.pending_continues))
            .unwrap_or_default()
    }

    pub fn in_loop(&self) -> bool {
        !self.loops.is_empty()
    }

    pub fn add_break(&mut self, label: JumpLabel) {
        if let Some(ctx) = self.loops.last_mut() {
            ctx.break_labels.push(label);
        }
    }

    pub fn add_pending_continue(&mut self, label: JumpLabel) {
        if let Some(ctx) = self.loops.last_mut() {
            ctx.pending_continues.push(label);
        }
    }

    /// Fix the continue target, returning forward continues to patch now.
    pub fn set_continue_target(&mut self, target: usize) -> Vec<JumpLabel> {
        match self.loops.last_mut() {
            Some(ctx) => {
                ctx.continue_target = Some(target);
                std::mem::take(&mut ctx.pending_continues)
            }
            None => Vec::new(),
        }
    }

    pub fn continue_target(&self) -> Option<usize> {
        self.loops.last().and_then(|ctx| ctx.continue_target)
    }

    /// Protected-region depth recorded for the innermost loop.
    pub fn loop_try_depth(&self) -> Option<usize> {
        self.loops.last().map(|ctx| ctx.try_depth)
    }

    pub fn loop_depth(&self) -> usize {
        self.loops.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manager_not_in_loop() {
        let manager = JumpManager::new();
        assert!(!manager.in_loop());
        assert_eq!(manager.loop_depth(), 0);
    }

    #[test]
    fn nested_loops_restore_outer_target() {
        let mut manager = JumpManager::new();
        manager.enter_loop(Some(10), 0);
        manager.enter_loop(Some(20), 1);
        assert_eq!(manager.continue_target(), Some(20));
        assert_eq!(manager.loop_try_depth(), Some(1));
        manager.exit_loop();
        assert_eq!(manager.continue_target(), Some(10));
    }

    #[test]
    fn exit_loop_returns_breaks() {
        let mut manager = JumpManager::new();
        manager.enter_loop(Some(10), 0);
        manager.add_break(JumpLabel(100));
        manager.add_break(JumpLabel(110));
        let (breaks, continues) = manager.exit_loop();
        assert_eq!(breaks, vec![JumpLabel(100), JumpLabel(110)]);
        assert!(continues.is_empty());
    }

    #[test]
    fn forward_continues_are_released_when_target_is_set() {
        let mut manager = JumpManager::new();
        manager.enter_loop(None, 0);
        assert_eq!(manager.continue_target(), None);
        manager.add_pending_continue(JumpLabel(5));
        let pending = manager.set_continue_target(40);
        assert_eq!(pending, vec![JumpLabel(5)]);
        assert_eq!(manager.continue_target(), Some(40));
    }

    #[test]
    fn exit_empty_returns_empty() {
        let mut manager = JumpManager::new();
        let (breaks, continues) = manager.exit_loop();
        assert!(breaks.is_empty() && continues.is_empty());
    }
}
