use std::{future::Future, mem::ManuallyDrop};

use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

/// Runtime owned by a blocking client.
///
/// Dropping it never blocks, so the owner may be dropped from inside async code.
pub struct ClientRuntime {
    runtime: ManuallyDrop<Runtime>,
}

impl ClientRuntime {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            runtime: ManuallyDrop::new(runtime),
        }
    }

    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }
}

impl Drop for ClientRuntime {
    fn drop(&mut self) {
        // SAFETY: `runtime` is taken exactly once, here, and never touched again.
        let runtime = unsafe { ManuallyDrop::take(&mut self.runtime) };
        runtime.shutdown_background();
    }
}

/// Drives `future` to completion on `runtime`, blocking the calling thread.
///
/// Callers on a multi-threaded tokio worker are moved off the worker first.
/// Callers on a current-thread runtime hand the future to a helper thread,
/// since their own thread cannot start another runtime.
pub fn poll_until_ready<Fut>(runtime: &ClientRuntime, future: Fut) -> Fut::Output
where
    Fut: Future + Send,
    Fut::Output: Send,
{
    let rt: &Runtime = &runtime.runtime;

    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(|| rt.block_on(future)),
        Ok(_) => std::thread::scope(|scope| {
            match scope.spawn(|| rt.block_on(future)).join() {
                Ok(output) => output,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }),
        Err(_) => rt.block_on(future),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn runtime() -> ClientRuntime {
        ClientRuntime::new(
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_poll_until_ready_outside_runtime() {
        let rt = runtime();

        let result = poll_until_ready(&rt, async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok::<_, String>(42)
        });

        assert_eq!(result, Ok(42));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_poll_until_ready_inside_multi_thread_runtime() {
        let rt = runtime();

        let result = poll_until_ready(&rt, async { "ready" });
        assert_eq!(result, "ready");

        drop(rt);
    }

    #[tokio::test]
    async fn test_poll_until_ready_inside_current_thread_runtime() {
        let rt = runtime();

        let result = poll_until_ready(&rt, async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            "ready"
        });
        assert_eq!(result, "ready");

        drop(rt);
    }

    #[test]
    fn test_drop_after_spawned_work() {
        let rt = runtime();
        rt.handle().spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        // must not wait for the sleeping task
        drop(rt);
    }
}
