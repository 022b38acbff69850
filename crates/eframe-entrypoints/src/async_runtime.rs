//! Background task helpers
//!
//! The entry points run the UI inside a multi-threaded tokio runtime, so
//! app code can spawn from the UI thread without carrying a handle around.

/// Spawn a task on the ambient runtime.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    #[cfg(feature = "profiling")]
    {
        tokio::spawn(async move {
            profiling::scope!(
                "async_runtime::spawn",
                format!("task_type={}", std::any::type_name::<F>()).as_str()
            );
            future.await
        })
    }
    #[cfg(not(feature = "profiling"))]
    {
        tokio::spawn(future)
    }
}

/// Whether the caller can [`spawn`] without panicking
pub fn in_runtime_context() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_runtime_outside_tokio() {
        assert!(!in_runtime_context());
    }

    #[tokio::test]
    async fn test_spawn_inside_runtime() {
        assert!(in_runtime_context());
        let handle = spawn(async { "done" });
        assert_eq!(handle.await.unwrap(), "done");
    }
}
