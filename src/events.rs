//! 对调用方可见的运行状态与事件
//!
//! 事件通过注入的 sink 发出（回调或 channel），引擎本身不依赖全局日志状态。
//! 进度百分比单调不减。

use crate::error::ErrorKind;

/// 运行过程中发出的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 0..=100
    Progress(u8),
    Status(String),
    Completed { success: bool, summary: String },
}

/// 一次运行的状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ValidatingPassword,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// 一次运行的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub state: RunState,
    /// 已尝试处理（成功或失败）的文件数
    pub processed: usize,
    pub succeeded: usize,
    pub total: usize,
    pub summary: String,
    /// 批次级错误的类别；正常结束为 None
    pub error: Option<ErrorKind>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// 把已处理数换算成百分比并保证不回退
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn Fn(Event),
    total: usize,
    done: usize,
    last: Option<u8>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn Fn(Event), total: usize) -> Self {
        Self {
            sink,
            total,
            done: 0,
            last: None,
        }
    }

    pub(crate) fn advance(&mut self) {
        self.done = (self.done + 1).min(self.total);
        let percent = if self.total == 0 {
            100
        } else {
            (self.done * 100 / self.total) as u8
        };

        if self.last.is_none_or(|last| percent > last) {
            self.last = Some(percent);
            (self.sink)(Event::Progress(percent));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn progress_never_decreases() {
        let seen = RefCell::new(Vec::new());
        let sink = |e: Event| {
            if let Event::Progress(p) = e {
                seen.borrow_mut().push(p);
            }
        };

        let mut tracker = ProgressTracker::new(&sink, 3);
        for _ in 0..5 {
            tracker.advance();
        }

        assert_eq!(*seen.borrow(), vec![33, 66, 100]);
    }

    #[test]
    fn many_files_emit_each_percent_once() {
        let seen = RefCell::new(Vec::new());
        let sink = |e: Event| {
            if let Event::Progress(p) = e {
                seen.borrow_mut().push(p);
            }
        };

        let mut tracker = ProgressTracker::new(&sink, 1000);
        for _ in 0..1000 {
            tracker.advance();
        }

        let seen = seen.borrow();
        assert_eq!(seen.len(), 101);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&100));
    }
}
