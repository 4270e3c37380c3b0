//! Extension points for code that drives a bot: long-lived listeners and
//! one-tick hooks.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::error;

use crate::bot::Bot;
use crate::error::BotError;

/// Receives the events of one bot. Every method runs on the connection
/// worker and may use the bot freely.
pub trait BotListener: Send {
    fn on_pre_tick(&mut self, _bot: &mut Bot) {}

    fn on_post_tick(&mut self, _bot: &mut Bot) {}

    /// Called once when the worker stops.
    fn on_disconnect(&mut self, _bot: &mut Bot, _reason: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickHookKind {
    PreTick,
    PostTick,
}

pub type TickHook<C> = Box<dyn FnOnce(&mut C) + Send>;

/// Hooks registered for the current tick only. Cleared at the start of
/// every tick, before listeners get the chance to register new ones.
pub struct TickHooks<C> {
    pre_tick: Vec<TickHook<C>>,
    post_tick: Vec<TickHook<C>>,
}

impl<C> Default for TickHooks<C> {
    fn default() -> Self {
        Self {
            pre_tick: Vec::new(),
            post_tick: Vec::new(),
        }
    }
}

impl<C> TickHooks<C> {
    pub fn register(&mut self, kind: TickHookKind, hook: impl FnOnce(&mut C) + Send + 'static) {
        self.slot(kind).push(Box::new(hook));
    }

    pub fn clear(&mut self) {
        self.pre_tick.clear();
        self.post_tick.clear();
    }

    pub fn len(&self, kind: TickHookKind) -> usize {
        match kind {
            TickHookKind::PreTick => self.pre_tick.len(),
            TickHookKind::PostTick => self.post_tick.len(),
        }
    }

    /// Remove the hooks of one kind so they can run against the context
    /// that owns this table.
    pub fn take(&mut self, kind: TickHookKind) -> Vec<TickHook<C>> {
        std::mem::take(self.slot(kind))
    }

    fn slot(&mut self, kind: TickHookKind) -> &mut Vec<TickHook<C>> {
        match kind {
            TickHookKind::PreTick => &mut self.pre_tick,
            TickHookKind::PostTick => &mut self.post_tick,
        }
    }
}

/// Run hooks in registration order. A panicking hook is logged and the
/// rest still run.
pub fn run_hooks<C>(ctx: &mut C, kind: TickHookKind, hooks: Vec<TickHook<C>>) {
    for hook in hooks {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| hook(ctx))) {
            error!("Error in {kind:?} hook: {}", BotError::from_panic(panic));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_run_in_order_per_kind() {
        let mut hooks = TickHooks::<Vec<&'static str>>::default();
        hooks.register(TickHookKind::PostTick, |v| v.push("post"));
        hooks.register(TickHookKind::PreTick, |v| v.push("pre-1"));
        hooks.register(TickHookKind::PreTick, |v| v.push("pre-2"));
        assert_eq!(hooks.len(TickHookKind::PreTick), 2);

        let mut out = Vec::new();
        let pre = hooks.take(TickHookKind::PreTick);
        run_hooks(&mut out, TickHookKind::PreTick, pre);
        let post = hooks.take(TickHookKind::PostTick);
        run_hooks(&mut out, TickHookKind::PostTick, post);
        assert_eq!(out, vec!["pre-1", "pre-2", "post"]);
        assert_eq!(hooks.len(TickHookKind::PreTick), 0);
    }

    #[test]
    fn clear_drops_both_slots() {
        let mut hooks = TickHooks::<u32>::default();
        hooks.register(TickHookKind::PreTick, |n| *n += 1);
        hooks.register(TickHookKind::PostTick, |n| *n += 1);
        hooks.clear();
        assert_eq!(hooks.len(TickHookKind::PreTick), 0);
        assert_eq!(hooks.len(TickHookKind::PostTick), 0);
    }

    #[test]
    fn panicking_hook_does_not_stop_the_rest() {
        let mut hooks = TickHooks::<u32>::default();
        hooks.register(TickHookKind::PreTick, |_| panic!("hook failed"));
        hooks.register(TickHookKind::PreTick, |n| *n += 1);
        let mut count = 0;
        let pre = hooks.take(TickHookKind::PreTick);
        run_hooks(&mut count, TickHookKind::PreTick, pre);
        assert_eq!(count, 1);
    }
}
