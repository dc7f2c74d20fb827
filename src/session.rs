//! One editing session: the engine plus its asynchronous collaborators.
//!
//! DESIGN
//! ======
//! The session is the single writer of its `EngineCore`. Image loads run
//! elsewhere and only ever come back through `pump`/`settle`, which apply
//! completions on the caller's task, one at a time, in the order they finished.
//! A board therefore paints images in completion order, not request order.
//!
//! Closing the session bumps its generation and marks it dead. Loads still in
//! flight keep running but their completions are discarded on arrival.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::HashMap;
use std::time::Duration;

use scene::doc::{ObjectId, ObjectSource, SceneError};
use scene::engine::{Action, Composite, EngineCore};
use scene::notice::{self, Notice};
use scene::render::ColorError;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::loader::{self, LoadCompletion, LoadError, LoadQueue, LoadTicket};
use crate::publish::{ProductLink, PublishError, PublishPayload, PublishReceipt, Publisher};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,
    #[error("board has no images")]
    EmptyBoard,
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

pub struct Session {
    engine: EngineCore,
    loads: LoadQueue,
    generation: u64,
    /// Outstanding loads of the current generation, by ticket id.
    pending: HashMap<Uuid, String>,
    alive: bool,
    title: String,
    notices: Vec<Notice>,
    needs_redraw: bool,
}

impl Session {
    #[must_use]
    pub fn new(engine: EngineCore, loads: LoadQueue) -> Self {
        Self {
            engine,
            loads,
            generation: 0,
            pending: HashMap::new(),
            alive: true,
            title: String::new(),
            notices: Vec::new(),
            needs_redraw: true,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn engine(&self) -> &EngineCore {
        &self.engine
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Loads requested but not yet applied or discarded.
    #[must_use]
    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Drain queued notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Whether a redraw was requested since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::replace(&mut self.needs_redraw, false)
    }

    /// One product link per URL-sourced object, in paint order.
    #[must_use]
    pub fn product_links(&self) -> Vec<ProductLink> {
        self.engine.scene.source_urls().into_iter().map(ProductLink::from_url).collect()
    }

    // =========================================================================
    // IMAGES
    // =========================================================================

    /// Start loading an image. Returns immediately; the object appears after a
    /// later `pump`/`settle`. Malformed URLs are reported as a notice.
    pub fn request_image(&mut self, url: &str) -> Option<LoadTicket> {
        if !self.alive {
            debug!(%url, "load requested on closed session; ignoring");
            return None;
        }
        let url = url.trim();
        if let Err(e) = loader::parse_image_url(url) {
            debug!(error = %e, "rejected image url");
            self.notices.push(Notice::error(notice::INVALID_URL));
            return None;
        }
        let ticket = self.loads.request(url, self.generation);
        self.pending.insert(ticket.id, url.to_owned());
        Some(ticket)
    }

    /// Decode pasted image bytes and place them immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after close, or the decode/placement
    /// failure (also reported as a notice).
    pub fn paste_image(&mut self, bytes: &[u8]) -> Result<ObjectId, SessionError> {
        if !self.alive {
            return Err(SessionError::Closed);
        }
        let placed = loader::decode_pasted(bytes)
            .map_err(SessionError::from)
            .and_then(|raster| self.engine.add_image(raster, ObjectSource::Pasted).map_err(SessionError::from));
        match placed {
            Ok((id, actions)) => {
                self.absorb(actions);
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, bytes = bytes.len(), "paste failed");
                self.notices.push(Notice::error(notice::PASTE_FAILED));
                Err(e)
            }
        }
    }

    /// Apply every completion that is already available. Never waits.
    /// Returns the number of objects added.
    pub fn pump(&mut self) -> usize {
        let mut added = 0;
        while let Some(completion) = self.loads.try_next() {
            if self.complete(completion) {
                added += 1;
            }
        }
        added
    }

    /// Wait up to `timeout` for outstanding loads, applying each as it lands.
    /// Returns the number of objects added. Loads still running at the
    /// deadline stay pending.
    pub async fn settle(&mut self, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut added = self.pump();
        while self.alive && !self.pending.is_empty() {
            match tokio::time::timeout_at(deadline, self.loads.next()).await {
                Ok(Some(completion)) => {
                    if self.complete(completion) {
                        added += 1;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(pending = self.pending.len(), ?timeout, "loads still pending at deadline");
                    break;
                }
            }
        }
        added
    }

    fn complete(&mut self, completion: LoadCompletion) -> bool {
        let LoadCompletion { ticket, url, result } = completion;
        self.pending.remove(&ticket.id);
        if !self.alive || ticket.generation != self.generation {
            debug!(id = %ticket.id, generation = ticket.generation, %url, "discarding stale load");
            return false;
        }

        let placed = result
            .map_err(SessionError::from)
            .and_then(|raster| {
                self.engine
                    .add_image(raster, ObjectSource::Url(url.clone()))
                    .map_err(SessionError::from)
            });
        match placed {
            Ok((_, actions)) => {
                self.absorb(actions);
                true
            }
            Err(e) => {
                warn!(%url, error = %e, "image load failed");
                self.notices.push(Notice::error(notice::LOAD_FAILED));
                false
            }
        }
    }

    // =========================================================================
    // ENGINE OPERATIONS
    // =========================================================================

    /// Invoke an infallible engine operation and absorb its actions.
    pub fn run<F>(&mut self, op: F)
    where
        F: FnOnce(&mut EngineCore) -> Vec<Action>,
    {
        if !self.alive {
            debug!("operation on closed session; ignoring");
            return;
        }
        let actions = op(&mut self.engine);
        self.absorb(actions);
    }

    /// Invoke a fallible engine operation and absorb its actions.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after close, or the operation's error.
    pub fn try_run<F, E>(&mut self, op: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut EngineCore) -> Result<Vec<Action>, E>,
        E: Into<SessionError>,
    {
        if !self.alive {
            return Err(SessionError::Closed);
        }
        let actions = op(&mut self.engine).map_err(Into::into)?;
        self.absorb(actions);
        Ok(())
    }

    fn absorb(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::RenderNeeded => self.needs_redraw = true,
                Action::Notify(n) => self.notices.push(n),
                Action::ObjectAdded { id } => debug!(%id, "object added"),
                Action::ObjectRemoved { id } => debug!(%id, "object removed"),
                Action::SelectionChanged(selection) => debug!(?selection, "selection changed"),
            }
        }
    }

    // =========================================================================
    // EXPORT / PUBLISH
    // =========================================================================

    /// Flatten the board to a `width × height` PNG.
    pub fn export(&mut self, width: u32, height: u32) -> Composite {
        let (composite, actions) = self.engine.export_composite(width, height);
        self.absorb(actions);
        composite
    }

    /// Flatten and publish the board. Success ends the session; failure
    /// leaves the board untouched so the user can retry.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`], [`SessionError::EmptyBoard`], or the
    /// publisher's failure.
    pub async fn publish(
        &mut self,
        publisher: &dyn Publisher,
        width: u32,
        height: u32,
    ) -> Result<PublishReceipt, SessionError> {
        if !self.alive {
            return Err(SessionError::Closed);
        }
        if self.engine.scene.is_empty() {
            self.notices.push(Notice::error(notice::EMPTY_BOARD));
            return Err(SessionError::EmptyBoard);
        }

        let (composite, actions) = self.engine.export_composite(width, height);
        self.absorb(actions);
        let payload = PublishPayload::new(
            &self.title,
            &composite.png,
            &self.engine.scene.source_urls(),
            self.engine.canvas_size(),
            OffsetDateTime::now_utc(),
        );

        match publisher.publish(&payload).await {
            Ok(receipt) => {
                info!(
                    public_url = %receipt.public_url,
                    moodboard_id = ?receipt.moodboard_id,
                    placeholder = composite.fallback,
                    "moodboard published"
                );
                self.notices.push(Notice::success(notice::PUBLISHED));
                self.close();
                Ok(receipt)
            }
            Err(e) => {
                warn!(error = %e, "publish failed");
                self.notices.push(Notice::error(e.user_message()));
                Err(e.into())
            }
        }
    }

    /// End the session. Pending loads are abandoned.
    pub fn close(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.generation += 1;
        let abandoned = self.pending.len();
        self.pending.clear();
        info!(abandoned, objects = self.engine.scene.len(), "session closed");
    }
}
