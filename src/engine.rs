//! 后台运行的恢复引擎
//!
//! 调用方通过 [`Engine::start`] 启动一次运行，得到 [`RunHandle`]：
//! - 事件经由 `std::sync::mpsc` 送回调用方线程
//! - [`RunHandle::cancel`] 设置协作式取消标志
//! - 同一个 Engine 同一时刻只允许一次运行

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::error::{RecoveryError, Result};
use crate::events::{Event, RunReport, RunState};
use crate::options::RecoveryOptions;
use crate::pipeline;

/// 恢复引擎
#[derive(Debug, Default)]
pub struct Engine {
    options: RecoveryOptions,
    active: Arc<AtomicBool>,
}

/// 一次运行的句柄
#[derive(Debug)]
pub struct RunHandle {
    events: Receiver<Event>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<RunReport>>,
}

/// 运行结束（无论何种结局）时释放引擎的占用标志
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Engine {
    pub fn new(options: RecoveryOptions) -> Self {
        Self {
            options,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 是否有运行尚未结束
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// 在后台线程启动一次恢复
    ///
    /// #### 错误
    /// - 已有运行未结束：AlreadyRunning
    /// - 无法创建线程：Io
    pub fn start(
        &self,
        password: &str,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<RunHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("start requested while a run is active");
            return Err(RecoveryError::AlreadyRunning);
        }
        let guard = ActiveGuard(Arc::clone(&self.active));

        let password = Zeroizing::new(password.to_owned());
        let input: PathBuf = input.as_ref().to_path_buf();
        let output: PathBuf = output.as_ref().to_path_buf();
        let options = self.options.clone();

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);

        let worker = thread::Builder::new()
            .name("pixrecover-run".into())
            .spawn(move || {
                let _guard = guard;
                let sink = |event: Event| {
                    // 接收端已丢弃时事件没有去处，继续运行即可
                    let _ = tx.send(event);
                };
                pipeline::run(&password, &input, &output, &options, &sink, &worker_cancel)
            })?;

        info!("recovery worker spawned");
        Ok(RunHandle {
            events: rx,
            cancel,
            worker: Some(worker),
        })
    }
}

impl RunHandle {
    /// 请求停止；当前文件处理完（或提交前）生效
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// 等待运行结束并取回结果
    pub fn wait(mut self) -> RunReport {
        let joined = self.worker.take().map(JoinHandle::join);
        match joined {
            Some(Ok(report)) => report,
            _ => RunReport {
                state: RunState::Failed,
                processed: 0,
                succeeded: 0,
                total: 0,
                summary: "recovery worker panicked".into(),
                error: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_start_is_rejected_while_active() {
        let engine = Engine::default();
        engine.active.store(true, Ordering::SeqCst);

        let dir = tempdir().unwrap();
        let err = engine
            .start("pw", dir.path(), dir.path().join("out"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AlreadyRunning);
    }

    #[test]
    fn engine_is_reusable_after_a_run() {
        let engine = Engine::default();
        let dir = tempdir().unwrap();
        let input = dir.path().join("empty");
        std::fs::create_dir(&input).unwrap();

        let report = engine
            .start("pw", &input, dir.path().join("out"))
            .unwrap()
            .wait();
        assert_eq!(report.state, RunState::Failed);
        assert!(!engine.is_running());

        let again = engine.start("pw", &input, dir.path().join("out"));
        assert!(again.is_ok());
        again.unwrap().wait();
    }
}
