// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Task scheduler for timed operations

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

type TaskFn = Arc<dyn Fn() + Send + Sync + 'static>;

struct ScheduledTask {
    interval: Duration,
    task: TaskFn,
}

/// Runs named periodic tasks until shutdown
pub struct Scheduler {
    tasks: Arc<RwLock<HashMap<String, ScheduledTask>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_task<F>(&self, name: &str, interval: Duration, task: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut tasks = self.tasks.write().await;
        tasks.insert(
            name.to_string(),
            ScheduledTask {
                interval,
                task: Arc::new(task),
            },
        );
        debug!("Scheduled task '{}' with interval {:?}", name, interval);
    }

    /// Spawn one loop per task; each stops when `shutdown` fires
    pub async fn start(&self, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let tasks = self.tasks.read().await;
        let mut handles = Vec::with_capacity(tasks.len());

        for (name, scheduled) in tasks.iter() {
            let name = name.clone();
            let task = scheduled.task.clone();
            let period = scheduled.interval;
            let mut stop = shutdown.subscribe();

            handles.push(tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => task(),
                        _ = stop.recv() => {
                            info!("Task '{}' stopped", name);
                            break;
                        }
                    }
                }
            }));
        }

        handles
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_tasks_run_until_shutdown() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        scheduler
            .add_task("count", Duration::from_millis(10), move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        let (shutdown, _) = broadcast::channel(1);
        let handles = scheduler.start(&shutdown).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.send(()).unwrap();
        for h in handles {
            h.await.unwrap();
        }

        let seen = counter.load(Ordering::SeqCst);
        assert!(seen >= 2, "ran {} times", seen);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }
}
