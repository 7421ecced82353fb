//! Test fixtures for segments, bundles and whole pipelines.

use spindle_codec::{Event, Tag};
use spindle_core::{Config, Executor, Replicator, Sequencer, Spinner};
use spindle_storage::{Bundle, SegmentProvider};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Payload of the canonical sample event.
pub const SLACK_PAYLOAD: &[u8] = b"Give me Slack, or give me Food, or Kill me";

/// Magic of the canonical sample event.
pub const SLACK_MAGIC: i32 = 666;

/// Tag of the canonical sample event.
pub const SLACK_TAG: u64 = 777;

/// The canonical sample event.
pub fn slack_event() -> Event {
    Event::new(SLACK_MAGIC, SLACK_TAG, SLACK_PAYLOAD).expect("sample event fits a frame")
}

/// A bundle in a temporary directory, removed on drop.
pub struct TempBundle<T: Tag = u64> {
    /// The bundle.
    pub bundle: Arc<Bundle<T>>,
    dir: TempDir,
}

impl<T: Tag> TempBundle<T> {
    /// Creates a bundle in a fresh temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let bundle = Bundle::open(dir.path()).expect("Failed to open bundle");
        Self {
            bundle: Arc::new(bundle),
            dir,
        }
    }

    /// The bundle directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The bundle as a segment provider.
    pub fn provider(&self) -> Arc<dyn SegmentProvider<T>> {
        self.bundle.clone()
    }
}

impl<T: Tag> Default for TempBundle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tag> std::ops::Deref for TempBundle<T> {
    type Target = Bundle<T>;

    fn deref(&self) -> &Self::Target {
        &self.bundle
    }
}

/// A bundle plus the sequencer its spinners publish to.
pub struct Pipeline<T: Tag = u64> {
    /// Segment storage.
    pub bundle: TempBundle<T>,
    /// The shared sequencer.
    pub sequencer: Arc<Sequencer<T>>,
    /// Configuration handed to every state machine.
    pub config: Config,
}

impl<T: Tag> Pipeline<T> {
    /// Creates a pipeline with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a pipeline with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let sequencer = Sequencer::from_config(&config).expect("Invalid pipeline config");
        Self {
            bundle: TempBundle::new(),
            sequencer: Arc::new(sequencer),
            config,
        }
    }

    /// A spinner for one inbound connection.
    pub fn spinner(&self) -> Spinner<T> {
        Spinner::new(
            self.bundle.provider(),
            Arc::clone(&self.sequencer),
            &self.config,
        )
    }

    /// A stopped replicator with its own barrier.
    pub fn replicator(&self, label: &str, executor: Arc<dyn Executor>) -> Replicator<T> {
        Replicator::new(label, self.sequencer.new_barrier(), executor, &self.config)
    }
}

impl<T: Tag> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}
