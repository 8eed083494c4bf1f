use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 実行停止フラグ（協調的。処理中のAI呼び出しは完了を待ってから止まる）
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
