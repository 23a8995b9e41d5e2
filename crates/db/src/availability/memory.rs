use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Mutex;

use super::{AvailabilityGrid, AvailabilityPersistence, AvailabilityStoreError};

/// Keeps the last saved grid in memory and counts writes.
#[derive(Default)]
pub struct InMemoryAvailabilityPersistence {
    grid: Mutex<AvailabilityGrid>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryAvailabilityPersistence {
    pub fn with_grid(grid: AvailabilityGrid) -> Self {
        Self { grid: Mutex::new(grid), ..Self::default() }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> AvailabilityGrid {
        self.grid.lock().await.clone()
    }

    /// Makes every following `save` fail with an io error until switched back.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl AvailabilityPersistence for InMemoryAvailabilityPersistence {
    async fn load(&self) -> Result<AvailabilityGrid, AvailabilityStoreError> {
        Ok(self.grid.lock().await.clone())
    }

    async fn save(&self, grid: &AvailabilityGrid) -> Result<(), AvailabilityStoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AvailabilityStoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "in-memory persistence configured to fail",
            )));
        }
        *self.grid.lock().await = grid.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
