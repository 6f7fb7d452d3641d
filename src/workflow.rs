//! Generation workflow: session state, single in-flight submission, and
//! history updates.
//!
//! [`Studio`] owns the only mutable state. It is published through a
//! [`tokio::sync::watch`] channel so a presentation layer can subscribe to
//! changes instead of polling; every observable transition notifies
//! subscribers once, and rejected submissions notify nobody.

use crate::error::Result;
use crate::history::{GeneratedResult, HistoryStore};
use crate::image::{GenerationRequest, ImageCategory, ImageGenerator, ImageSize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

/// Transient, per-session state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Prompt draft being edited.
    pub prompt: String,
    /// Selected size.
    pub size: ImageSize,
    /// Selected category.
    pub category: ImageCategory,
    /// True strictly between a submission and its success or failure.
    pub in_flight: bool,
    /// Last generation failure, until dismissed or resubmitted.
    pub error: Option<String>,
    /// Result currently opened in the viewer.
    pub viewing: Option<GeneratedResult>,
}

/// Everything a presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudioState {
    /// Session fields.
    pub session: SessionState,
    /// Completed generations, newest first.
    pub history: Vec<GeneratedResult>,
}

/// Why a submission was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Prompt was empty or whitespace.
    EmptyPrompt,
    /// Another generation is still outstanding.
    InFlight,
}

/// Result of [`Studio::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new result was generated and prepended to history.
    Generated(GeneratedResult),
    /// Generation failed; the message is also held in the session error.
    Failed(String),
    /// Nothing was sent.
    Rejected(Rejection),
}

/// Resets the in-flight flag if a submission is dropped before finishing.
struct InFlight<'a> {
    state: &'a watch::Sender<StudioState>,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.send_modify(|s| s.session.in_flight = false);
        }
    }
}

/// The generation workflow.
pub struct Studio {
    generator: Arc<dyn ImageGenerator>,
    store: Arc<dyn HistoryStore>,
    state: watch::Sender<StudioState>,
}

impl Studio {
    /// Creates a workflow with empty history. Call [`Studio::load_history`]
    /// once at startup to restore persisted results.
    pub fn new(generator: Arc<dyn ImageGenerator>, store: Arc<dyn HistoryStore>) -> Self {
        let (state, _) = watch::channel(StudioState::default());
        Self {
            generator,
            store,
            state,
        }
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<StudioState> {
        self.state.subscribe()
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> StudioState {
        self.state.borrow().clone()
    }

    /// Returns a snapshot of the session fields.
    pub fn session(&self) -> SessionState {
        self.state.borrow().session.clone()
    }

    /// Returns the history, newest first.
    pub fn history(&self) -> Vec<GeneratedResult> {
        self.state.borrow().history.clone()
    }

    /// Looks up a history item by id.
    pub fn find(&self, id: &str) -> Option<GeneratedResult> {
        self.state
            .borrow()
            .history
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Display name of the generation service.
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Checks that the generation service is reachable and accepts our
    /// credentials. Session state is left untouched.
    pub async fn health_check(&self) -> Result<()> {
        self.generator.health_check().await
    }

    /// Replaces in-memory history with the persisted sequence.
    ///
    /// A missing or unreadable slot leaves history empty; the failure is
    /// logged and never reaches the session error.
    pub fn load_history(&self) {
        let history = self.store.load_or_default();
        tracing::debug!(items = history.len(), "loaded history");
        self.state.send_modify(|s| s.history = history);
    }

    /// Updates the prompt draft.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.state.send_modify(|s| s.session.prompt = prompt);
    }

    /// Updates the selected size.
    pub fn select_size(&self, size: ImageSize) {
        self.state.send_modify(|s| s.session.size = size);
    }

    /// Updates the selected category.
    pub fn select_category(&self, category: ImageCategory) {
        self.state.send_modify(|s| s.session.category = category);
    }

    /// Submits the current draft with the selected size and category.
    pub async fn submit_draft(&self) -> SubmitOutcome {
        let SessionState {
            prompt,
            size,
            category,
            ..
        } = self.session();
        self.submit(&prompt, size, category).await
    }

    /// Generates an image and prepends it to history.
    ///
    /// Empty prompts and submissions made while another is outstanding are
    /// rejected without touching state or calling the generator.
    pub async fn submit(
        &self,
        prompt: &str,
        size: ImageSize,
        category: ImageCategory,
    ) -> SubmitOutcome {
        if prompt.trim().is_empty() {
            return SubmitOutcome::Rejected(Rejection::EmptyPrompt);
        }

        let started = self.state.send_if_modified(|s| {
            if s.session.in_flight {
                return false;
            }
            s.session.in_flight = true;
            s.session.error = None;
            true
        });
        if !started {
            tracing::debug!("generation already in flight, ignoring submit");
            return SubmitOutcome::Rejected(Rejection::InFlight);
        }
        let mut guard = InFlight {
            state: &self.state,
            settled: false,
        };

        let request = GenerationRequest::for_submission(prompt, size, category);
        tracing::debug!(
            generator = self.generator.name(),
            %size,
            %category,
            aspect_ratio = %request.aspect_ratio,
            "starting generation"
        );

        let outcome = self.generator.generate(&request).await;
        guard.settled = true;

        match outcome {
            Ok(payload) => {
                let result = GeneratedResult::new(payload, prompt, size, category);
                let mut snapshot = Vec::new();
                self.state.send_modify(|s| {
                    s.history.insert(0, result.clone());
                    s.session.in_flight = false;
                    snapshot = s.history.clone();
                });
                tracing::info!(id = %result.id, %size, %category, "generated image");
                self.persist(&snapshot);
                SubmitOutcome::Generated(result)
            }
            Err(e) => {
                let message = e.user_message();
                tracing::warn!(error = %e, "generation failed");
                self.state.send_modify(|s| {
                    s.session.in_flight = false;
                    s.session.error = Some(message.clone());
                });
                SubmitOutcome::Failed(message)
            }
        }
    }

    /// Clears the session error.
    pub fn dismiss_error(&self) {
        self.state.send_modify(|s| s.session.error = None);
    }

    /// Opens a result in the viewer, or closes the viewer with `None`.
    pub fn select_for_viewing(&self, result: Option<GeneratedResult>) {
        self.state.send_modify(|s| s.session.viewing = result);
    }

    /// Saves a result's image into `dir` as `genstudio-<id>.jpg`.
    ///
    /// Touches neither history nor session state.
    pub fn download(&self, result: &GeneratedResult, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let data = result.payload.decode()?;
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(result.download_filename());
        std::fs::write(&path, data)?;
        tracing::debug!(id = %result.id, path = %path.display(), "downloaded image");
        Ok(path)
    }

    // Best-effort: a failed save is logged, never surfaced.
    fn persist(&self, history: &[GeneratedResult]) {
        if let Err(e) = self.store.save(history) {
            tracing::warn!(error = %e, "failed to save history");
        }
    }
}
