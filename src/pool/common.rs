//! 通用 Worker 协程池
//!
//! 固定大小的 Worker 池，所有 worker 从同一个任务队列中取任务，
//! 空闲的 worker 自动领取下一个任务，结果汇总到统一的 result channel。
//!
//! # 核心概念
//!
//! - **WorkerTask**: 任务类型 trait，定义了 worker 处理的任务
//! - **WorkerResult**: 结果类型 trait，定义了 worker 返回的结果
//! - **WorkerContext**: 上下文类型 trait，每个 worker 独立持有的上下文（如统计）
//! - **WorkerExecutor**: 执行器 trait，定义了如何处理任务
//!
//! # 生命周期
//!
//! 1. `new` 启动 worker
//! 2. `submit` 入队任务，`close` 关闭队列
//! 3. 通过 `result_receiver` 接收结果；所有 worker 退出后结果通道关闭
//! 4. `shutdown` 发送关闭信号：正在执行的任务照常完成，之后不再出队；
//!    未出队的任务可通过 `drain_pending` 取回
//!
//! # 使用示例
//!
//! ```ignore
//! let executor = Arc::new(MyExecutor);
//! let mut pool = WorkerPool::new(executor, vec![MyContext::default(); 4]);
//!
//! pool.submit(MyTask { data: "test".to_string() })?;
//! pool.close();
//!
//! while let Some(result) = pool.result_receiver().recv().await {
//!     println!("收到结果: {:?}", result);
//! }
//! pool.wait_for_shutdown().await;
//! ```

use async_trait::async_trait;
use log::{debug, error, info};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::{DownloadError, Result};

/// 结果通道容量
const RESULT_CHANNEL_CAPACITY: usize = 100;

/// Worker 任务 trait
///
/// - `Send`: 任务可以在线程间传递
/// - `Debug`: 任务可以被调试输出
pub trait WorkerTask: Send + Debug {}

/// Worker 结果 trait
pub trait WorkerResult: Send + Debug {}

/// Worker 上下文 trait
///
/// 每个 worker 独立持有的上下文数据
pub trait WorkerContext: Send + Sync {}

/// Worker 执行器 trait
///
/// 定义了如何处理任务的具体逻辑，所有 worker 共享同一个执行器
#[async_trait]
pub trait WorkerExecutor<T: WorkerTask, R: WorkerResult, C: WorkerContext>: Send + Sync {
    /// 执行任务
    ///
    /// # Arguments
    ///
    /// - `worker_id`: Worker ID
    /// - `task`: 要处理的任务
    /// - `context`: Worker 的上下文
    async fn execute(&self, worker_id: usize, task: T, context: &C) -> R;
}

/// 共享任务队列
type SharedQueue<T> = Arc<Mutex<UnboundedReceiver<T>>>;

/// 从共享队列取下一个任务，关闭信号优先
async fn next_task<T>(queue: &SharedQueue<T>, shutdown: &mut watch::Receiver<bool>) -> Option<T> {
    if *shutdown.borrow() {
        return None;
    }

    tokio::select! {
        biased;

        _ = shutdown.wait_for(|stop| *stop) => None,

        task = async {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        } => task,
    }
}

/// Worker 协程主循环
///
/// 从共享队列循环领取任务，通过 executor 处理后把结果发送到统一的 result channel。
/// 队列关闭且为空，或收到关闭信号时退出；关闭信号不会打断正在执行的任务。
pub(crate) async fn run_worker<T, R, C, E>(
    id: usize,
    executor: Arc<E>,
    queue: SharedQueue<T>,
    result_sender: Sender<R>,
    mut shutdown_receiver: watch::Receiver<bool>,
    context: Arc<C>,
) where
    T: WorkerTask,
    R: WorkerResult,
    C: WorkerContext,
    E: WorkerExecutor<T, R, C> + ?Sized,
{
    debug!("Worker #{} 启动", id);

    while let Some(task) = next_task(&queue, &mut shutdown_receiver).await {
        debug!("Worker #{} 接收到任务: {:?}", id, task);

        let result = executor.execute(id, task, &context).await;

        if let Err(e) = result_sender.send(result).await {
            error!("Worker #{} 发送结果失败: {:?}", id, e);
        }
    }

    debug!("Worker #{} 退出", id);
}

/// 通用 Worker 协程池
///
/// # 泛型参数
///
/// - `T`: 任务类型
/// - `R`: 结果类型
/// - `C`: 上下文类型
pub struct WorkerPool<T: WorkerTask, R: WorkerResult, C: WorkerContext> {
    /// 任务入队端，`close` 后为 None
    task_sender: Option<UnboundedSender<T>>,
    /// 共享任务队列（用于关闭后取回未出队的任务）
    queue: SharedQueue<T>,
    /// 关闭信号
    shutdown_sender: watch::Sender<bool>,
    /// Worker 协程的句柄
    worker_handles: Vec<JoinHandle<()>>,
    /// 每个 worker 的上下文
    contexts: Vec<Arc<C>>,
    /// 统一的结果接收器
    result_receiver: Receiver<R>,
}

impl<T, R, C> WorkerPool<T, R, C>
where
    T: WorkerTask + 'static,
    R: WorkerResult + 'static,
    C: WorkerContext + 'static,
{
    /// 创建新的协程池
    ///
    /// # Arguments
    ///
    /// - `executor`: 任务执行器（所有 worker 共享）
    /// - `contexts`: 每个 worker 的独立上下文（数量即 worker 数）
    pub fn new<E>(executor: Arc<E>, contexts: Vec<C>) -> Self
    where
        E: WorkerExecutor<T, R, C> + 'static,
    {
        let (task_sender, task_receiver) = mpsc::unbounded_channel::<T>();
        let queue: SharedQueue<T> = Arc::new(Mutex::new(task_receiver));
        let (result_sender, result_receiver) = mpsc::channel::<R>(RESULT_CHANNEL_CAPACITY);
        let (shutdown_sender, _) = watch::channel(false);

        let mut worker_handles = Vec::with_capacity(contexts.len());
        let mut worker_contexts = Vec::with_capacity(contexts.len());

        for (id, context) in contexts.into_iter().enumerate() {
            let context = Arc::new(context);

            let handle = tokio::spawn(run_worker(
                id,
                Arc::clone(&executor),
                Arc::clone(&queue),
                result_sender.clone(),
                shutdown_sender.subscribe(),
                Arc::clone(&context),
            ));

            worker_handles.push(handle);
            worker_contexts.push(context);
        }

        // 自身不持有 result sender，所有 worker 退出后结果通道自动关闭
        drop(result_sender);

        info!("创建协程池，{} 个 workers", worker_handles.len());

        Self {
            task_sender: Some(task_sender),
            queue,
            shutdown_sender,
            worker_handles,
            contexts: worker_contexts,
            result_receiver,
        }
    }

    /// 获取 worker 总数
    pub fn worker_count(&self) -> usize {
        self.contexts.len()
    }

    /// 入队一个任务，由第一个空闲的 worker 领取
    pub fn submit(&self, task: T) -> Result<()> {
        let sender = self
            .task_sender
            .as_ref()
            .ok_or_else(|| DownloadError::TaskSend("任务队列已关闭".to_string()))?;
        sender
            .send(task)
            .map_err(|e| DownloadError::TaskSend(e.to_string()))
    }

    /// 关闭任务队列
    ///
    /// worker 处理完队列中剩余的任务后退出
    pub fn close(&mut self) {
        self.task_sender.take();
    }

    /// 获取结果接收器的可变引用
    pub fn result_receiver(&mut self) -> &mut Receiver<R> {
        &mut self.result_receiver
    }

    /// 获取指定 worker 的上下文
    pub fn worker_context(&self, worker_id: usize) -> Option<&Arc<C>> {
        self.contexts.get(worker_id)
    }

    /// 优雅关闭
    ///
    /// 正在执行的任务照常完成，之后 worker 不再出队任务
    pub fn shutdown(&self) {
        info!("发送关闭信号到所有 workers");
        self.shutdown_sender.send_replace(true);
    }

    /// 是否已发送关闭信号
    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_sender.borrow()
    }

    /// 取回所有尚未出队的任务
    ///
    /// 应在 worker 全部退出后调用
    pub async fn drain_pending(&self) -> Vec<T> {
        let mut receiver = self.queue.lock().await;
        let mut pending = Vec::new();
        while let Ok(task) = receiver.try_recv() {
            pending.push(task);
        }
        pending
    }

    /// 等待所有 worker 退出
    pub async fn wait_for_shutdown(&mut self) {
        for handle in self.worker_handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Worker 协程异常退出: {:?}", e);
            }
        }
    }
}
