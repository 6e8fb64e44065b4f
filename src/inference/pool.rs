use crate::error::{AppError, Result};
use crossbeam::queue::ArrayQueue;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// A pool of ONNX Runtime sessions for parallel inference.
///
/// `Session::run` needs `&mut self`. Rather than one session behind one lock,
/// the pool holds N independent sessions and hands out free slot indices from
/// a lock-free queue. The per-slot mutex is never contended: a slot index is
/// owned by at most one caller between `acquire` and the guard's drop.
pub struct SessionPool {
    sessions: Vec<Mutex<Session>>,
    available: ArrayQueue<usize>,
}

impl SessionPool {
    /// Load `pool_size` sessions from the same model file.
    ///
    /// Each session runs single-threaded; parallelism comes from the number
    /// of sessions.
    pub fn load(model_path: &Path, pool_size: usize) -> Result<Self> {
        let pool_size = pool_size.max(1);
        let model_bytes = std::fs::read(model_path).map_err(|e| {
            AppError::EmbeddingError(format!("Failed to read model file: {}", e))
        })?;

        let mut sessions = Vec::with_capacity(pool_size);
        let available = ArrayQueue::new(pool_size);

        for i in 0..pool_size {
            let session = Session::builder()
                .map_err(|e| AppError::EmbeddingError(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| AppError::EmbeddingError(e.to_string()))?
                .with_intra_threads(1)
                .map_err(|e| AppError::EmbeddingError(e.to_string()))?
                .commit_from_memory(&model_bytes)
                .map_err(|e: ort::Error| AppError::EmbeddingError(e.to_string()))?;

            sessions.push(Mutex::new(session));
            available.push(i).map_err(|_| {
                AppError::EmbeddingError("Failed to initialize session pool".into())
            })?;
        }

        tracing::info!(
            path = %model_path.display(),
            pool_size,
            "ONNX session pool loaded successfully"
        );

        Ok(Self {
            sessions,
            available,
        })
    }

    pub fn size(&self) -> usize {
        self.sessions.len()
    }

    /// Take a free session. Returned to the pool when the guard drops.
    pub fn acquire(&self) -> Result<PooledSession<'_>> {
        let index = self
            .available
            .pop()
            .ok_or_else(|| AppError::EmbeddingError("No available sessions in pool".into()))?;

        match self.sessions[index].lock() {
            Ok(session) => Ok(PooledSession {
                pool: self,
                index,
                session: Some(session),
            }),
            Err(_) => {
                let _ = self.available.push(index);
                Err(AppError::EmbeddingError(format!(
                    "Session {} poisoned by an earlier panic",
                    index
                )))
            }
        }
    }
}

/// Exclusive handle to one pooled session.
pub struct PooledSession<'a> {
    pool: &'a SessionPool,
    index: usize,
    session: Option<MutexGuard<'a, Session>>,
}

impl PooledSession<'_> {
    pub fn session(&mut self) -> &mut Session {
        // Only `drop` takes the guard out.
        self.session
            .as_deref_mut()
            .unwrap_or_else(|| unreachable!("pooled session used after release"))
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        // Unlock before the index becomes visible to other callers.
        self.session.take();
        let _ = self.pool.available.push(self.index);
    }
}
