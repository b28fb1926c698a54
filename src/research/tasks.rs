use std::future::Future;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// 后台任务组：跟踪脱离主流程的入库任务
///
/// 任务从创建到结束都计入 [`len`](Self::len)，结束后自动移出。
/// 丢弃本结构不会取消任务；`drain` 只用于退出前的收尾，主流程从不等待它。
#[derive(Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// 派发后台任务，不返回句柄，调用方无需也无法等待单个任务
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    /// 仍在运行的任务数
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// 停止接收新任务并等待已有任务结束；超时返回`false`，剩余任务继续在运行时中执行
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending == 0 {
            return true;
        }

        debug!(pending, "draining background tasks");
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    pending = self.tracker.len(),
                    timeout = ?timeout,
                    "background tasks still running, abandoning"
                );
                false
            }
        }
    }
}
