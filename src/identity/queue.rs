use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Runs tasks one at a time per key; different keys proceed independently.
pub struct KeyedQueue {
    queues: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedQueue {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run<F, T>(&self, key: &str, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let slot = {
            let mut queues = self.queues.lock().await;
            queues
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let output = {
            let _guard = slot.lock().await;
            task.await
        };

        let mut queues = self.queues.lock().await;
        // map entry + our clone: nobody else is waiting on this key
        if Arc::strong_count(&slot) == 2 {
            queues.remove(key);
        }
        output
    }

    #[cfg(test)]
    async fn pending_keys(&self) -> usize {
        self.queues.lock().await.len()
    }
}

impl Default for KeyedQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::{Duration, sleep};

    use super::*;

    #[tokio::test]
    async fn same_key_runs_in_order() {
        let queue = Arc::new(KeyedQueue::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for delay in [50u64, 0, 0] {
            let queue = queue.clone();
            let counter = counter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                queue
                    .run("bob", async move {
                        let val = counter.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_millis(delay)).await;
                        order.lock().await.push(val);
                    })
                    .await;
            }));
            sleep(Duration::from_millis(5)).await;
        }
        for handle in handles {
            handle.await.expect("task");
        }

        assert_eq!(order.lock().await.clone(), vec![0, 1, 2]);
        assert_eq!(queue.pending_keys().await, 0);
    }

    #[tokio::test]
    async fn different_keys_run_independently() {
        let queue = Arc::new(KeyedQueue::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let slow = {
            let queue = queue.clone();
            let order = order.clone();
            tokio::spawn(async move {
                queue
                    .run("alice", async move {
                        sleep(Duration::from_millis(50)).await;
                        order.lock().await.push("alice");
                    })
                    .await;
            })
        };
        sleep(Duration::from_millis(5)).await;
        queue
            .run("bob", async {
                order.lock().await.push("bob");
            })
            .await;
        slow.await.expect("task");

        assert_eq!(order.lock().await.clone(), vec!["bob", "alice"]);
    }

    #[tokio::test]
    async fn run_returns_task_output() {
        let queue = KeyedQueue::new();
        assert_eq!(queue.run("k", async { 42 }).await, 42);
    }
}
