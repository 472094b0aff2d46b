//! # Concurrency Tests using Loom
//!
//! Models the fail-fast race: entries of one job family share a child
//! token of the global stop token, and the first failing entry cancels it.

#[cfg(test)]
mod tests {
    use loom::sync::Arc;
    use loom::sync::Mutex;
    use loom::thread;
    use tokio_util::sync::CancellationToken;

    /// Runs `f` inside `loom::model` on a thread with a larger stack,
    /// since loom's exploration can overflow the default one.
    fn model<F>(f: F)
    where
        F: Fn() + Sync + Send + 'static,
    {
        const STACK_SIZE: usize = 8 * 1024 * 1024; // 8 MB

        std::thread::Builder::new()
            .name("loom-test-thread".into())
            .stack_size(STACK_SIZE)
            .spawn(move || loom::model(f))
            .unwrap()
            .join()
            .unwrap();
    }

    /// Entry 1 fails and cancels the family while entry 0 checks the family
    /// token before starting and again before finishing. Every observation
    /// entry 0 makes must agree with where the cancel landed in the log:
    /// it skips or gets cancelled only after the cancel, and succeeds only
    /// before it. The global token is never touched.
    #[test]
    fn test_fail_fast_cancels_only_the_family() {
        model(|| {
            let stop = CancellationToken::new();
            let family = Arc::new(stop.child_token());
            let log = Arc::new(Mutex::new(Vec::new()));

            let sibling = {
                let family = family.clone();
                let log = log.clone();
                thread::spawn(move || {
                    {
                        let mut events = log.lock().unwrap();
                        if family.is_cancelled() {
                            events.push("skip");
                            return;
                        }
                        events.push("start");
                    }

                    let mut events = log.lock().unwrap();
                    events.push(if family.is_cancelled() { "cancelled" } else { "success" });
                })
            };
            let failing = {
                let family = family.clone();
                let log = log.clone();
                thread::spawn(move || {
                    let mut events = log.lock().unwrap();
                    family.cancel();
                    events.push("cancel");
                })
            };

            sibling.join().unwrap();
            failing.join().unwrap();

            assert!(family.is_cancelled());
            assert!(!stop.is_cancelled());

            let log = log.lock().unwrap();
            let cancel_at = log.iter().position(|e| *e == "cancel").unwrap();
            for (i, event) in log.iter().enumerate() {
                match *event {
                    "skip" | "cancelled" => assert!(i > cancel_at, "{log:?}"),
                    "start" | "success" => assert!(i < cancel_at, "{log:?}"),
                    _ => {}
                }
            }
            let outcomes = log
                .iter()
                .filter(|e| matches!(**e, "skip" | "cancelled" | "success"))
                .count();
            assert_eq!(outcomes, 1, "{log:?}");
        });
    }

    /// Cancelling the global token reaches every family.
    #[test]
    fn test_global_stop_reaches_every_family() {
        model(|| {
            let stop = Arc::new(CancellationToken::new());
            let families = [stop.child_token(), stop.child_token()];

            let trigger = {
                let stop = stop.clone();
                thread::spawn(move || stop.cancel())
            };
            trigger.join().unwrap();

            assert!(families.iter().all(CancellationToken::is_cancelled));
        });
    }
}
