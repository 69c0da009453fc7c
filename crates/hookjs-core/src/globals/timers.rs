// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Timer functions: setTimeout, setInterval and their clear counterparts
//!
//! Timers belong to one execution. They fire while the engine awaits an
//! exported promise; whatever is still scheduled once the result is settled
//! is dropped.

use rquickjs::function::{Opt, Rest};
use rquickjs::{Ctx, Function, Object, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::trace;

/// A scheduled callback
struct Timer<'js> {
    deadline: Instant,
    callback: Function<'js>,
    args: Vec<Value<'js>>,
    repeat: Option<Duration>,
}

/// Timers scheduled by one script execution
#[derive(Default)]
pub struct TimerQueue<'js> {
    next_id: Cell<u32>,
    timers: RefCell<BTreeMap<u32, Timer<'js>>>,
    closed: Cell<bool>,
}

impl<'js> TimerQueue<'js> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn schedule(&self, callback: Function<'js>, delay: Duration, args: Vec<Value<'js>>, repeat: bool) -> u32 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        if self.closed.get() {
            return id;
        }

        trace!("Scheduling timer {} in {:?}", id, delay);
        self.timers.borrow_mut().insert(
            id,
            Timer {
                deadline: Instant::now() + delay,
                callback,
                args,
                repeat: repeat.then_some(delay),
            },
        );
        id
    }

    /// Cancel a timer; unknown ids are ignored
    pub fn cancel(&self, id: u32) {
        self.timers.borrow_mut().remove(&id);
    }

    /// Number of scheduled timers
    pub fn len(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Whether nothing is scheduled
    pub fn is_empty(&self) -> bool {
        self.timers.borrow().is_empty()
    }

    /// Wait for the earliest timer and run its callback.
    ///
    /// Returns `false` when nothing is scheduled. An interval is rescheduled
    /// before its callback runs, so the callback may clear it.
    pub fn run_next(&self) -> rquickjs::Result<bool> {
        let (id, timer) = {
            let mut timers = self.timers.borrow_mut();
            let Some(id) = timers
                .iter()
                .min_by_key(|(id, timer)| (timer.deadline, **id))
                .map(|(id, _)| *id)
            else {
                return Ok(false);
            };
            let Some(timer) = timers.remove(&id) else {
                return Ok(false);
            };
            if let Some(interval) = timer.repeat {
                timers.insert(
                    id,
                    Timer {
                        deadline: timer.deadline + interval,
                        callback: timer.callback.clone(),
                        args: timer.args.clone(),
                        repeat: timer.repeat,
                    },
                );
            }
            (id, timer)
        };

        let now = Instant::now();
        if timer.deadline > now {
            std::thread::sleep(timer.deadline - now);
        }
        trace!("Firing timer {}", id);
        timer.callback.call::<_, ()>((Rest(timer.args),))?;
        Ok(true)
    }

    /// Drop every scheduled timer and refuse new ones; returns how many were dropped
    pub fn close(&self) -> usize {
        self.closed.set(true);
        let mut timers = self.timers.borrow_mut();
        let dropped = timers.len();
        timers.clear();
        dropped
    }
}

fn delay_arg(delay: Opt<Value<'_>>) -> Duration {
    let millis = delay.0.and_then(|value| value.as_number()).unwrap_or(0.0);
    if millis.is_finite() && millis > 0.0 {
        Duration::from_secs_f64(millis / 1000.0)
    } else {
        Duration::ZERO
    }
}

fn id_arg(id: Opt<Value<'_>>) -> Option<u32> {
    let id = id.0?.as_number()?;
    (id >= 0.0 && id <= u32::MAX as f64).then_some(id as u32)
}

/// Install the timer functions on `globals`
pub fn install_timer_functions<'js>(
    ctx: &Ctx<'js>,
    globals: &Object<'js>,
    queue: &Rc<TimerQueue<'js>>,
) -> rquickjs::Result<()> {
    for (name, repeat) in [("setTimeout", false), ("setInterval", true)] {
        let timers = queue.clone();
        let set = Function::new(
            ctx.clone(),
            move |callback: Function<'js>, delay: Opt<Value<'js>>, args: Rest<Value<'js>>| {
                timers.schedule(callback, delay_arg(delay), args.0, repeat)
            },
        )?
        .with_name(name)?;
        globals.set(name, set)?;
    }

    for name in ["clearTimeout", "clearInterval"] {
        let timers = queue.clone();
        let clear = Function::new(ctx.clone(), move |id: Opt<Value<'js>>| {
            if let Some(id) = id_arg(id) {
                timers.cancel(id);
            }
        })?
        .with_name(name)?;
        globals.set(name, clear)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    fn with_queue(test: impl for<'js> FnOnce(Ctx<'js>, Rc<TimerQueue<'js>>)) {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let queue = Rc::new(TimerQueue::new());
            install_timer_functions(&ctx, &ctx.globals(), &queue).unwrap();
            test(ctx.clone(), queue.clone());
            queue.close();
        });
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        with_queue(|ctx, queue| {
            ctx.eval::<(), _>(
                "globalThis.order = [];\nsetTimeout(() => order.push('late'), 5);\nsetTimeout((tag) => order.push(tag), 0, 'early');",
            )
            .unwrap();
            assert_eq!(queue.len(), 2);
            while queue.run_next().unwrap() {}
            let order: Vec<String> = ctx.eval("order").unwrap();
            assert_eq!(order, vec!["early", "late"]);
        });
    }

    #[test]
    fn test_cleared_timer_never_fires() {
        with_queue(|ctx, queue| {
            ctx.eval::<(), _>("globalThis.fired = false;\nclearTimeout(setTimeout(() => { fired = true; }, 0));")
                .unwrap();
            assert!(queue.is_empty());
            assert!(!queue.run_next().unwrap());
            assert!(!ctx.eval::<bool, _>("fired").unwrap());
        });
    }

    #[test]
    fn test_interval_repeats_until_cleared() {
        with_queue(|ctx, queue| {
            ctx.eval::<(), _>(
                "globalThis.ticks = 0;\nconst id = setInterval(() => { if (++ticks === 3) clearInterval(id); }, 1);",
            )
            .unwrap();
            while queue.run_next().unwrap() {}
            assert_eq!(ctx.eval::<i32, _>("ticks").unwrap(), 3);
        });
    }

    #[test]
    fn test_closed_queue_drops_timers() {
        with_queue(|ctx, queue| {
            ctx.eval::<(), _>("setTimeout(() => {}, 1000);").unwrap();
            assert_eq!(queue.close(), 1);
            ctx.eval::<(), _>("setTimeout(() => {}, 0);").unwrap();
            assert!(queue.is_empty());
        });
    }

    #[test]
    fn test_delay_arguments() {
        with_queue(|ctx, _| {
            assert_eq!(delay_arg(Opt(None)), Duration::ZERO);
            assert_eq!(delay_arg(Opt(Some(Value::new_float(ctx.clone(), -5.0)))), Duration::ZERO);
            assert_eq!(
                delay_arg(Opt(Some(Value::new_int(ctx.clone(), 20)))),
                Duration::from_millis(20)
            );
        });
    }
}
