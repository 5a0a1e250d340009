//! Post-commit side effects.
//!
//! Hooks run after the order transaction has committed. They run
//! concurrently, a failure in one never stops the others, and nothing they
//! do can roll the order back. Failures come back as `[hook] message` strings.

use futures::future::{join_all, BoxFuture};
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PostOrderReport {
    pub success: bool,
    pub errors: Vec<String>,
}

pub struct PostCommitHooks<'a> {
    hooks: Vec<(&'static str, BoxFuture<'a, anyhow::Result<()>>)>,
}

impl<'a> PostCommitHooks<'a> {
    pub fn new() -> Self { Self { hooks: Vec::new() } }

    pub fn add(mut self, name: &'static str, hook: BoxFuture<'a, anyhow::Result<()>>) -> Self {
        self.hooks.push((name, hook));
        self
    }

    pub async fn run(self) -> PostOrderReport {
        let (names, futures): (Vec<_>, Vec<_>) = self.hooks.into_iter().unzip();
        let results = join_all(futures).await;
        let errors: Vec<String> = names
            .into_iter()
            .zip(results)
            .filter_map(|(name, result)| {
                result.err().map(|e| {
                    warn!(hook = name, error = %format!("{e:#}"), "post-commit hook failed");
                    format!("[{name}] {e:#}")
                })
            })
            .collect();
        PostOrderReport { success: errors.is_empty(), errors }
    }
}

impl Default for PostCommitHooks<'_> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_all_hooks_succeed() {
        let report = PostCommitHooks::new()
            .add("notify", async { Ok::<_, anyhow::Error>(()) }.boxed())
            .add("event", async { Ok::<_, anyhow::Error>(()) }.boxed())
            .run()
            .await;
        assert_eq!(report, PostOrderReport { success: true, errors: vec![] });
    }

    #[tokio::test]
    async fn test_failure_is_collected_and_others_still_run() {
        let ran = AtomicUsize::new(0);
        let report = PostCommitHooks::new()
            .add("notify", async { Err::<(), _>(anyhow::anyhow!("smtp down")) }.boxed())
            .add("event", async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(())
            }.boxed())
            .run()
            .await;
        assert!(!report.success);
        assert_eq!(report.errors, vec!["[notify] smtp down".to_string()]);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_hook_list_is_success() {
        assert!(PostCommitHooks::default().run().await.success);
    }
}
