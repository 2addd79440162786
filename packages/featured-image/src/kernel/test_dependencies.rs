// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gemini_client::{GeminiError, GeneratedImage};

use super::{
    BaseImageGenerator, BaseMediaStore, GenerationQueue, GenerationReceiver, MemoryPostStore,
    NewAttachment, ServerDeps, StoredFile,
};
use crate::common::MediaRef;
use crate::config::{Settings, SettingsStore};

/// Bytes of a 1x1 PNG header; enough to look like an image in tests.
pub const TEST_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

// =============================================================================
// Mock Image Generator
// =============================================================================

/// Arguments captured from a generate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCall {
    pub api_key: String,
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
}

pub struct MockImageGenerator {
    responses: Mutex<VecDeque<Result<GeneratedImage, GeminiError>>>,
    calls: Mutex<Vec<ImageCall>>,
    delay: Duration,
}

impl MockImageGenerator {
    /// Returns a small PNG for every call unless responses are queued.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_image(self, data: &[u8], mime_type: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(GeneratedImage {
            data: data.to_vec(),
            mime_type: mime_type.to_string(),
        }));
        self
    }

    pub fn with_error(self, error: GeminiError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Hold every call for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ImageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockImageGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseImageGenerator for MockImageGenerator {
    async fn generate_image(
        &self,
        api_key: &str,
        prompt: &str,
        model: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage, GeminiError> {
        self.calls.lock().unwrap().push(ImageCall {
            api_key: api_key.to_string(),
            prompt: prompt.to_string(),
            model: model.to_string(),
            aspect_ratio: aspect_ratio.to_string(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let queued = self.responses.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(GeneratedImage {
                data: TEST_PNG.to_vec(),
                mime_type: "image/png".to_string(),
            })
        })
    }
}

// =============================================================================
// Mock Media Store
// =============================================================================

/// A file captured by [`MockMediaStore::write_file`]
#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub file_name: String,
    pub data: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MockMediaStore {
    writes: Mutex<Vec<WrittenFile>>,
    registrations: Mutex<Vec<NewAttachment>>,
    removals: Mutex<Vec<String>>,
    fail_write: bool,
    fail_register: bool,
}

impl MockMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_write() -> Self {
        Self {
            fail_write: true,
            ..Self::default()
        }
    }

    pub fn failing_register() -> Self {
        Self {
            fail_register: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<WrittenFile> {
        self.writes.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<NewAttachment> {
        self.registrations.lock().unwrap().clone()
    }

    /// Relative paths passed to `remove_file`
    pub fn removals(&self) -> Vec<String> {
        self.removals.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseMediaStore for MockMediaStore {
    async fn write_file(
        &self,
        file_name: &str,
        data: &[u8],
        uploaded_at: DateTime<Utc>,
    ) -> Result<StoredFile> {
        if self.fail_write {
            anyhow::bail!("disk full");
        }
        self.writes.lock().unwrap().push(WrittenFile {
            file_name: file_name.to_string(),
            data: data.to_vec(),
            uploaded_at,
        });
        Ok(StoredFile {
            relative_path: format!("mock/{}", file_name),
            absolute_path: format!("/mock/{}", file_name).into(),
            size: data.len(),
        })
    }

    async fn register(&self, file: &StoredFile, attachment: NewAttachment) -> Result<MediaRef> {
        if self.fail_register {
            anyhow::bail!("catalog unavailable");
        }
        self.registrations.lock().unwrap().push(attachment);
        Ok(MediaRef::new(file.relative_path.clone()))
    }

    async fn remove_file(&self, file: &StoredFile) -> Result<()> {
        self.removals
            .lock()
            .unwrap()
            .push(file.relative_path.clone());
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Mock-backed dependencies. Fields stay reachable for assertions after
/// `deps()` hands out a `ServerDeps`.
pub struct TestDependencies {
    pub post_store: Arc<MemoryPostStore>,
    pub media_store: Arc<MockMediaStore>,
    pub image_generator: Arc<MockImageGenerator>,
    pub settings: Arc<SettingsStore>,
    pub queue: Arc<GenerationQueue>,
    receiver: Mutex<Option<GenerationReceiver>>,
}

impl TestDependencies {
    /// Default settings plus an API key.
    pub fn new() -> Self {
        let mut settings = Settings::default();
        // Known key, cannot fail.
        let _ = settings.set("api_key", "test-key");
        let (queue, receiver) = GenerationQueue::new();

        Self {
            post_store: Arc::new(MemoryPostStore::new(vec!["admin".to_string()])),
            media_store: Arc::new(MockMediaStore::new()),
            image_generator: Arc::new(MockImageGenerator::new()),
            settings: Arc::new(SettingsStore::new(settings)),
            queue: Arc::new(queue),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub fn with_setting(self, key: &str, value: &str) -> Self {
        self.settings.update(key, value).unwrap();
        self
    }

    pub fn with_image_generator(mut self, generator: MockImageGenerator) -> Self {
        self.image_generator = Arc::new(generator);
        self
    }

    pub fn with_media_store(mut self, store: MockMediaStore) -> Self {
        self.media_store = Arc::new(store);
        self
    }

    pub fn deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.post_store.clone(),
            self.media_store.clone(),
            self.image_generator.clone(),
            self.settings.clone(),
            self.queue.clone(),
        )
    }

    /// Receiving half of the queue, for starting a worker. Only once.
    pub fn take_receiver(&self) -> GenerationReceiver {
        self.receiver
            .lock()
            .unwrap()
            .take()
            .expect("queue receiver already taken")
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
