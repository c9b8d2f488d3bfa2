use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::pacing::Pacer;

/// Returns immediately and remembers every requested delay.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub async fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().await.clone()
    }

    pub async fn total(&self) -> Duration {
        self.pauses.lock().await.iter().sum()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, delay: Duration) {
        self.pauses.lock().await.push(delay);
    }
}
