//! Property tests for token correlation.

mod common;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use common::scripted;
use proptest::prelude::*;
use ringside::{ScriptMode, Task, Token};

fn arb_order() -> impl Strategy<Value = Vec<usize>> {
    (1usize..24).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever order the ring reports bootstraps in, each completion runs
    /// exactly the task it was submitted for.
    #[test]
    fn completions_resume_their_own_task(order in arb_order()) {
        let (reactor, ctl) = scripted(32, ScriptMode::Manual);
        let done = Rc::new(RefCell::new(Vec::new()));

        let tokens: Vec<Token> = (0..order.len())
            .map(|i| {
                let done = done.clone();
                reactor
                    .spawn(Task::new(async move {
                        done.borrow_mut().push(i);
                        Ok(())
                    }))
                    .unwrap()
            })
            .collect();
        let unique: HashSet<_> = tokens.iter().collect();
        prop_assert_eq!(unique.len(), tokens.len());

        for &i in &order {
            prop_assert!(ctl.complete(tokens[i], 0));
            reactor.execute().unwrap();
        }
        prop_assert_eq!(&*done.borrow(), &order);
        prop_assert_eq!(reactor.outstanding(), 0);
        prop_assert_eq!(reactor.live_tasks(), 0);
    }

    /// Successive operations of one task never reuse a token.
    #[test]
    fn sequential_operations_get_fresh_tokens(k in 1usize..40) {
        let (reactor, ctl) = scripted(4, ScriptMode::Manual);
        let io = reactor.handle();
        reactor
            .spawn(Task::new(async move {
                for _ in 0..k {
                    io.nop().await?;
                }
                Ok(())
            }))
            .unwrap();

        let mut seen = Vec::new();
        while let Some(&token) = ctl.inflight_tokens().first() {
            seen.push(token);
            prop_assert!(ctl.complete(token, 0));
            reactor.execute().unwrap();
        }
        let unique: HashSet<_> = seen.iter().collect();
        prop_assert_eq!(seen.len(), k + 1);
        prop_assert_eq!(unique.len(), k + 1);
        prop_assert_eq!(reactor.live_tasks(), 0);
    }
}
