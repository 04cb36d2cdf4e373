//! The editor: one document, its annotations and the interactive session.
//!
//! Gesture handlers are synchronous and apply their effect locally first.
//! Anything that has to reach the backend comes back as a [`PendingWrite`];
//! the host awaits it (or hands it to [`Editor::persist`]) and feeds the result
//! to [`Editor::settle`], which confirms or rolls back the local change. Page
//! renders follow the same pattern with [`PendingRender`].

use crate::camera::ZoomAction;
use crate::canvas::{HandleFlags, ShapeLayer};
use crate::config::{EditorConfig, Theme};
use crate::document::{DocumentError, DocumentSource, PdfDocument, ViewHost};
use crate::events::{AnnotationEvent, EventBus, EventKind};
use crate::gateway::{BoxFuture, GatewayResult, PersistenceGateway};
use crate::page_sync::RenderTicket;
use crate::projection::project_shape;
use crate::record::{AnnotationId, AnnotationRecord, Geometry};
use crate::selection::{HANDLE_HIT_TOLERANCE, ManipulationState, hit_test_handles};
use crate::session::{EditingAnnotation, Session};
use crate::shapes::{SerializableColor, Shape};
use crate::store::AnnotationStore;
use crate::tools::ToolKind;
use chrono::{DateTime, Utc};
use image::RgbaImage;
use kurbo::{Point, Rect, Size, Vec2};
use std::rc::Rc;
use thiserror::Error;

/// Status shown while a document loads.
pub const LOADING_MESSAGE: &str = "Please wait...";

/// Pointer hit tolerance in screen pixels.
pub const HIT_TOLERANCE: f64 = 4.0;

/// Offset of the context menu from the selected shape's top-right corner.
pub const MENU_OFFSET: Vec2 = Vec2::new(10.0, -10.0);

/// Outline color for a shape focused from the comment list.
pub const FLASH_COLOR: SerializableColor = SerializableColor {
    r: 0x0d,
    g: 0x6e,
    b: 0xfd,
    a: 0xff,
};

/// Editor errors.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("No document is loaded")]
    NotLoaded,
}

/// Actions offered for the selected annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMenu {
    pub id: AnnotationId,
    pub can_edit: bool,
    pub can_delete: bool,
    /// Screen position of the menu.
    pub anchor: Point,
}

/// Details shown when hovering an annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub comment: String,
}

/// Everything a painter needs for the current frame, in rendered-page pixels.
#[derive(Debug, Clone)]
pub struct Scene<'a> {
    pub raster: Option<&'a RgbaImage>,
    pub shapes: Vec<(AnnotationId, Shape)>,
    /// Shape being drawn.
    pub preview: Option<Shape>,
    /// Bounds of the selected shape.
    pub selection: Option<Rect>,
    pub flashed: Option<AnnotationId>,
}

/// A page render that has been requested but not committed.
pub struct PendingRender {
    pub ticket: RenderTicket,
    raster: BoxFuture<'static, Result<RgbaImage, DocumentError>>,
}

impl PendingRender {
    pub async fn resolve(self) -> CompletedRender {
        CompletedRender {
            ticket: self.ticket,
            result: self.raster.await,
        }
    }
}

pub struct CompletedRender {
    pub ticket: RenderTicket,
    pub result: Result<RgbaImage, DocumentError>,
}

#[derive(Debug, Clone)]
enum WriteOp {
    Create {
        temp_id: AnnotationId,
        sent: AnnotationRecord,
    },
    Update {
        previous: AnnotationRecord,
        sent: AnnotationRecord,
    },
    Delete {
        id: AnnotationId,
    },
}

/// A backend call started by a local change.
pub struct PendingWrite {
    op: WriteOp,
    call: BoxFuture<'static, GatewayResult<Option<AnnotationRecord>>>,
}

impl PendingWrite {
    /// Annotation the write is about.
    pub fn id(&self) -> &AnnotationId {
        match &self.op {
            WriteOp::Create { temp_id, .. } => temp_id,
            WriteOp::Update { sent, .. } => &sent.id,
            WriteOp::Delete { id } => id,
        }
    }

    pub async fn resolve(self) -> CompletedWrite {
        CompletedWrite {
            op: self.op,
            result: self.call.await,
        }
    }
}

impl std::fmt::Debug for PendingWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingWrite").field("op", &self.op).finish_non_exhaustive()
    }
}

/// A finished backend call, ready for [`Editor::settle`].
pub struct CompletedWrite {
    op: WriteOp,
    result: GatewayResult<Option<AnnotationRecord>>,
}

/// Borrowed pieces the export pipeline needs.
pub struct ExportParts<'a> {
    pub document: &'a dyn PdfDocument,
    pub store: &'a AnnotationStore,
    pub offset: Vec2,
    pub view: &'a mut dyn ViewHost,
}

pub struct Editor {
    config: EditorConfig,
    gateway: Option<Rc<dyn PersistenceGateway>>,
    source: Box<dyn DocumentSource>,
    view: Box<dyn ViewHost>,
    document: Option<Rc<dyn PdfDocument>>,
    store: AnnotationStore,
    layer: ShapeLayer,
    session: Session,
    events: EventBus,
    raster: Option<RgbaImage>,
    manipulation: Option<ManipulationState>,
    context_menu: Option<ContextMenu>,
}

impl Editor {
    pub fn new(
        config: EditorConfig,
        source: impl DocumentSource + 'static,
        view: impl ViewHost + 'static,
    ) -> Self {
        let session = Session::new(&config);
        Self {
            config,
            gateway: None,
            source: Box::new(source),
            view: Box::new(view),
            document: None,
            store: AnnotationStore::new(),
            layer: ShapeLayer::new(),
            session,
            events: EventBus::new(),
            raster: None,
            manipulation: None,
            context_menu: None,
        }
    }

    pub fn with_gateway(mut self, gateway: impl PersistenceGateway + 'static) -> Self {
        self.gateway = Some(Rc::new(gateway));
        self
    }

    /// Attach an [`HttpGateway`](crate::gateway::HttpGateway) for the
    /// configured `api` endpoints. Without `api` the editor stays local.
    #[cfg(feature = "http")]
    pub fn with_http_gateway(self) -> GatewayResult<Self> {
        match &self.config.api {
            Some(api) => {
                let gateway = crate::gateway::HttpGateway::new(api)?;
                Ok(self.with_gateway(gateway))
            }
            None => Ok(self),
        }
    }

    /// Register a listener for one kind of notification.
    pub fn on(&mut self, kind: EventKind, listener: impl FnMut(&AnnotationEvent) + 'static) {
        self.events.on(kind, listener);
    }

    fn emit(&mut self, event: AnnotationEvent) {
        self.events.emit(&event);
    }

    // --- Loading and rendering ---

    /// Load annotations and open the document, then show page 1.
    ///
    /// `initialData` wins over the gateway. A failing gateway load leaves the
    /// store empty; a failing document open is returned.
    pub async fn load(&mut self) -> Result<(), EditorError> {
        self.view.show_status(Some(LOADING_MESSAGE));
        let result = self.load_document().await;
        self.view.show_status(None);
        if let Err(e) = &result {
            log::error!("Error loading document: {}", e);
        }
        result
    }

    async fn load_document(&mut self) -> Result<(), EditorError> {
        let records = match (&self.config.initial_data, &self.gateway) {
            (Some(initial), _) => initial.clone(),
            (None, Some(gateway)) => match gateway.load().await {
                Ok(records) => records,
                Err(e) => {
                    log::warn!("Failed to load annotations: {}", e);
                    Vec::new()
                }
            },
            (None, None) => Vec::new(),
        };
        self.store.load(records);

        let document: Rc<dyn PdfDocument> = Rc::from(self.source.open(&self.config.pdf_path).await?);
        log::info!(
            "Opened {} ({} pages)",
            self.config.pdf_path,
            document.page_count()
        );
        self.session.pages.reset(document.page_count());
        self.document = Some(document);
        self.set_tool(ToolKind::Select);
        self.render_page(1).await?;
        Ok(())
    }

    /// Start rendering `page` at the current zoom.
    ///
    /// Returns `None` without touching state when no document is loaded or the
    /// page is out of range. Starting a render invalidates any earlier one.
    pub fn request_render(&mut self, page: u32) -> Option<PendingRender> {
        let document = self.document.clone()?;
        let ticket = self.session.pages.begin(page)?;
        let zoom = self.session.camera.zoom;
        self.context_menu = None;
        let raster = Box::pin(async move { document.render_page(ticket.page, zoom).await });
        Some(PendingRender { ticket, raster })
    }

    /// Commit a finished render: swap the raster and rebuild the shape layer.
    ///
    /// Returns `Ok(false)` when a newer render has been requested since.
    pub fn complete_render(&mut self, done: CompletedRender) -> Result<bool, EditorError> {
        let ticket = done.ticket;
        if !self.session.pages.is_current(ticket) {
            log::debug!("Dropping stale render of page {}", ticket.page);
            return Ok(false);
        }
        let image = done.result?;
        let document = self.document.clone().ok_or(EditorError::NotLoaded)?;
        let page_size = document.page_size(ticket.page)?;
        self.session.pages.complete(ticket);

        let had_selection = self.layer.selected().is_some();
        self.manipulation = None;
        self.session.tools.cancel();
        self.context_menu = None;
        self.raster = Some(image);
        self.sync_viewport();
        self.session.camera.set_page_size(page_size);

        let config = &self.config;
        self.layer.rebuild(
            ticket.page,
            self.store.list_by_page(ticket.page),
            self.session.tools.current_tool,
            |record| config.can_edit(&record.user),
        );
        if had_selection {
            self.emit(AnnotationEvent::Deselected);
        }
        Ok(true)
    }

    /// Render `page` and commit it.
    pub async fn render_page(&mut self, page: u32) -> Result<bool, EditorError> {
        if self.document.is_none() {
            return Err(EditorError::NotLoaded);
        }
        let Some(pending) = self.request_render(page) else {
            return Ok(false);
        };
        let done = pending.resolve().await;
        self.complete_render(done)
    }

    async fn rerender(&mut self) -> Result<bool, EditorError> {
        match self.session.current_page() {
            0 => Ok(false),
            page => self.render_page(page).await,
        }
    }

    // --- Navigation and zoom ---

    /// Go back one page. No-op on the first page.
    pub async fn prev_page(&mut self) -> Result<bool, EditorError> {
        match self.session.pages.prev_page() {
            Some(page) => self.render_page(page).await,
            None => Ok(false),
        }
    }

    /// Go forward one page. No-op on the last page.
    pub async fn next_page(&mut self) -> Result<bool, EditorError> {
        match self.session.pages.next_page() {
            Some(page) => self.render_page(page).await,
            None => Ok(false),
        }
    }

    /// Jump to a page. Out-of-range pages are ignored.
    pub async fn go_to_page(&mut self, page: u32) -> Result<bool, EditorError> {
        if !self.session.pages.contains(page) {
            log::debug!("Ignoring jump to page {}", page);
            return Ok(false);
        }
        self.render_page(page).await
    }

    /// Jump to a page typed by the user. Junk input is ignored.
    pub async fn go_to_page_input(&mut self, input: &str) -> Result<bool, EditorError> {
        match self.session.pages.parse_page_input(input) {
            Some(page) => self.render_page(page).await,
            None => Ok(false),
        }
    }

    /// Change zoom and re-render the current page.
    pub async fn zoom(&mut self, action: ZoomAction) -> Result<bool, EditorError> {
        self.sync_viewport();
        if !self.session.camera.apply(action) {
            return Ok(false);
        }
        log::debug!("Zoom {:?} -> {}", action, self.session.camera.zoom);
        self.rerender().await?;
        Ok(true)
    }

    /// Wheel input. With ctrl held it zooms (up = in) and returns true so the
    /// host suppresses scrolling.
    pub async fn wheel(&mut self, delta_y: f64, ctrl: bool) -> Result<bool, EditorError> {
        if !ctrl || delta_y == 0.0 {
            return Ok(false);
        }
        let action = if delta_y > 0.0 {
            ZoomAction::Out
        } else {
            ZoomAction::In
        };
        self.zoom(action).await?;
        Ok(true)
    }

    /// Pick up a new viewport size from the view.
    pub fn sync_viewport(&mut self) {
        let size: Size = self.view.viewport_size();
        self.session.camera.set_viewport(size);
    }

    // --- Tools and style ---

    /// Switch tools. Abandons any gesture in progress; leaving the select
    /// tool clears the selection.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.manipulation = None;
        self.session.tools.set_tool(tool);
        let had_selection = self.layer.selected().is_some();
        self.layer.apply_tool(tool);
        self.context_menu = None;
        if had_selection && self.layer.selected().is_none() {
            self.emit(AnnotationEvent::Deselected);
        }
    }

    /// Set the drawing color from a hex string. Invalid colors are ignored.
    pub fn set_color(&mut self, color: &str) -> bool {
        match SerializableColor::from_hex(color) {
            Some(color) => {
                self.session.tools.color = color;
                true
            }
            None => {
                log::warn!("Ignoring invalid color {:?}", color);
                false
            }
        }
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.session.tools.stroke_width = width;
        }
    }

    pub fn theme(&self) -> Theme {
        self.session.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.session.theme = theme;
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.session.theme = self.session.theme.toggled();
        self.session.theme
    }

    // --- Pointer input ---

    fn hit_tolerance(&self) -> f64 {
        HIT_TOLERANCE / self.session.camera.zoom
    }

    pub fn pointer_down(&mut self, screen: Point) {
        let point = self.session.camera.screen_to_page(screen);
        if self.session.tools.current_tool != ToolKind::Select {
            self.session.tools.begin(point, screen);
            return;
        }

        // Corner handles of the selected shape take priority over bodies.
        let handle_tolerance = HANDLE_HIT_TOLERANCE / self.session.camera.zoom;
        if let Some(handle) = self.layer.selected_handle().filter(|h| h.flags.movable) {
            if let Some(corner) = hit_test_handles(&handle.shape, point, handle_tolerance) {
                self.manipulation = Some(ManipulationState::new(
                    handle.id.clone(),
                    Some(corner),
                    point,
                    handle.shape.clone(),
                ));
                return;
            }
        }

        let hit = self
            .layer
            .shape_at(point, self.hit_tolerance())
            .map(|h| (h.id.clone(), h.flags.movable, h.shape.clone()));
        match hit {
            Some((id, movable, shape)) => {
                self.select(&id);
                if movable {
                    self.manipulation = Some(ManipulationState::new(id, None, point, shape));
                }
            }
            None => self.deselect(),
        }
    }

    pub fn pointer_move(&mut self, screen: Point) {
        let point = self.session.camera.screen_to_page(screen);
        if let Some(manipulation) = &mut self.manipulation {
            manipulation.current_point = point;
            let preview = manipulation.preview();
            let id = manipulation.id.clone();
            self.layer.set_shape(&id, preview);
            return;
        }
        if let Some(delta) = self.session.tools.update(point, screen) {
            self.session.camera.scroll_by(delta);
            return;
        }
        if !self.session.tools.is_active() {
            let hovered = self
                .layer
                .shape_at(point, self.hit_tolerance())
                .map(|h| h.id.clone());
            self.layer.set_hovered(hovered);
        }
    }

    /// Finish the gesture. Returns the backend write it triggered, if any.
    pub fn pointer_up(&mut self, screen: Point) -> Option<PendingWrite> {
        let point = self.session.camera.screen_to_page(screen);
        if let Some(mut manipulation) = self.manipulation.take() {
            manipulation.current_point = point;
            if manipulation.is_noop() {
                return None;
            }
            return self.on_shape_modified(&manipulation.id, manipulation.preview());
        }
        let shape = self.session.tools.end(point)?;
        self.add_annotation(shape)
    }

    /// Pointer left the view: panning stops, hover clears.
    pub fn pointer_leave(&mut self) {
        if self.session.tools.is_panning() {
            self.session.tools.cancel();
        }
        self.layer.set_hovered(None);
    }

    /// A path captured natively by the host's scene collaborator.
    pub fn on_path_created(&mut self, shape: Shape) -> Option<PendingWrite> {
        self.add_annotation(shape)
    }

    // --- Annotation lifecycle ---

    /// Add a finished shape on the current page.
    ///
    /// The record and its shape appear immediately under a temporary id and
    /// `annotation:created` fires before any backend call. Tools configured
    /// to prompt enter the awaiting-comment state instead of persisting.
    pub fn add_annotation(&mut self, shape: Shape) -> Option<PendingWrite> {
        let page = self.session.current_page();
        if page == 0 {
            log::warn!("Ignoring shape drawn before a page was rendered");
            return None;
        }
        let tool = self.session.tools.current_tool;
        let user = self.config.current_user.clone();
        let id = self.store.add(AnnotationRecord::new(page, &user, &shape));
        let flags = HandleFlags::new(self.config.can_edit(&user), tool);
        self.layer.add(id.clone(), shape, flags);

        let record = self.store.find_by_id(&id)?.clone();
        log::debug!("Created annotation {} on page {}", id, page);
        self.emit(AnnotationEvent::Created(record.clone()));

        if self.config.prompts_for_comment(tool) {
            self.session.editing = Some(EditingAnnotation { id, creating: true });
            return None;
        }
        self.persist_create(record)
    }

    /// Apply a move or resize made on the shape layer.
    pub fn on_shape_modified(&mut self, id: &AnnotationId, shape: Shape) -> Option<PendingWrite> {
        let stored = self.store.find_by_id(id)?.clone();
        if !self.config.can_edit(&stored.user) {
            log::warn!("Ignoring modification of {}: not permitted", id);
            if let Ok(original) = stored.shape() {
                self.layer.set_shape(id, original);
            }
            return None;
        }
        self.layer.set_shape(id, shape.clone());
        let mut record = stored;
        record.geometry = Geometry::from(&shape);
        let previous = self.store.update(&record)?;
        let updated = self.store.find_by_id(id)?.clone();
        self.refresh_context_menu();
        self.emit(AnnotationEvent::Updated(updated.clone()));
        self.persist_update(previous, updated)
    }

    /// Open the comment editor for an annotation. Returns the current
    /// comment, or `None` when not permitted.
    pub fn edit_comment(&mut self, id: &AnnotationId) -> Option<String> {
        let record = self.store.find_by_id(id)?;
        if !self.config.can_edit(&record.user) {
            return None;
        }
        let comment = record.comment.clone();
        self.session.editing = Some(EditingAnnotation {
            id: id.clone(),
            creating: false,
        });
        self.context_menu = None;
        Some(comment)
    }

    /// Context-menu "edit" on the selected annotation.
    pub fn edit_selected(&mut self) -> Option<String> {
        let id = self.layer.selected()?.clone();
        let comment = self.edit_comment(&id);
        self.context_menu = None;
        comment
    }

    pub fn editing(&self) -> Option<&EditingAnnotation> {
        self.session.editing.as_ref()
    }

    /// Save the comment being edited.
    ///
    /// Saving empty text for a freshly drawn shape discards it, like cancel.
    pub fn save_comment(&mut self, text: &str) -> Option<PendingWrite> {
        let editing = self.session.editing.take()?;
        let text = text.trim();
        if editing.creating && text.is_empty() {
            self.discard(&editing.id);
            return None;
        }
        let mut record = self.store.find_by_id(&editing.id)?.clone();
        record.comment = text.to_string();
        let previous = self.store.update(&record)?;
        let updated = self.store.find_by_id(&editing.id)?.clone();
        self.emit(AnnotationEvent::Updated(updated.clone()));
        if editing.creating {
            self.persist_create(updated)
        } else {
            self.persist_update(previous, updated)
        }
    }

    /// Close the comment editor. A freshly drawn shape is discarded.
    pub fn cancel_comment(&mut self) {
        if let Some(editing) = self.session.editing.take() {
            if editing.creating {
                self.discard(&editing.id);
            }
        }
    }

    /// Context-menu "delete" on the selected annotation. The host confirms
    /// with the user before calling this.
    pub fn delete_selected(&mut self) -> Option<PendingWrite> {
        let id = self.layer.selected()?.clone();
        self.delete_annotation(&id)
    }

    /// Delete an annotation the current user owns.
    ///
    /// With a backend the record stays until the delete succeeds.
    pub fn delete_annotation(&mut self, id: &AnnotationId) -> Option<PendingWrite> {
        let record = self.store.find_by_id(id)?;
        self.context_menu = None;
        if !self.config.can_delete(&record.user) {
            log::warn!("Ignoring delete of {}: not permitted", id);
            return None;
        }
        // Unconfirmed records never reached the backend.
        match self.gateway.clone().filter(|_| !id.is_temporary()) {
            Some(gateway) => Some(Self::delete_call(gateway, id.clone())),
            None => {
                self.remove_local(id);
                None
            }
        }
    }

    fn delete_call(gateway: Rc<dyn PersistenceGateway>, id: AnnotationId) -> PendingWrite {
        let target = id.clone();
        PendingWrite {
            op: WriteOp::Delete { id },
            call: Box::pin(async move { gateway.delete(&target).await.map(|_| None) }),
        }
    }

    fn persist_create(&mut self, record: AnnotationRecord) -> Option<PendingWrite> {
        let gateway = self.gateway.clone()?;
        let sent = record.clone();
        Some(PendingWrite {
            op: WriteOp::Create {
                temp_id: record.id.clone(),
                sent,
            },
            call: Box::pin(async move { gateway.create(&record).await.map(Some) }),
        })
    }

    fn persist_update(
        &mut self,
        previous: AnnotationRecord,
        record: AnnotationRecord,
    ) -> Option<PendingWrite> {
        if record.id.is_temporary() {
            // Sent along once the pending create confirms.
            log::debug!("Deferring update of unconfirmed annotation {}", record.id);
            return None;
        }
        let gateway = self.gateway.clone()?;
        let sent = record.clone();
        Some(PendingWrite {
            op: WriteOp::Update { previous, sent },
            call: Box::pin(async move { gateway.update(&record).await.map(Some) }),
        })
    }

    /// Apply the outcome of a backend call. May return a follow-up write.
    pub fn settle(&mut self, done: CompletedWrite) -> Option<PendingWrite> {
        match (done.op, done.result) {
            (WriteOp::Create { temp_id, sent }, Ok(Some(saved))) => {
                self.confirm_create(&temp_id, sent, &saved)
            }
            (WriteOp::Create { temp_id, .. }, Ok(None)) => {
                log::warn!("Backend returned nothing for {}; discarding", temp_id);
                self.discard(&temp_id);
                None
            }
            (WriteOp::Create { temp_id, .. }, Err(e)) => {
                log::warn!("Failed to save annotation {}: {}", temp_id, e);
                self.discard(&temp_id);
                None
            }
            (WriteOp::Update { sent, .. }, Ok(_)) => {
                log::debug!("Saved update of {}", sent.id);
                None
            }
            (WriteOp::Update { previous, sent }, Err(e)) => {
                log::error!("Failed to save updated annotation {}: {}", sent.id, e);
                self.revert_update(previous, &sent);
                None
            }
            (WriteOp::Delete { id }, Ok(_)) => {
                self.remove_local(&id);
                None
            }
            (WriteOp::Delete { id }, Err(e)) => {
                log::error!("Failed to delete annotation {}: {}", id, e);
                None
            }
        }
    }

    /// Await a write and every follow-up it triggers.
    pub async fn persist(&mut self, pending: Option<PendingWrite>) {
        let mut pending = pending;
        while let Some(write) = pending {
            let done = write.resolve().await;
            pending = self.settle(done);
        }
    }

    fn confirm_create(
        &mut self,
        temp_id: &AnnotationId,
        sent: AnnotationRecord,
        saved: &AnnotationRecord,
    ) -> Option<PendingWrite> {
        let Some(confirmed) = self.store.confirm(temp_id, saved).cloned() else {
            if self.store.find_by_id(temp_id).is_none() && !saved.id.is_temporary() {
                // Deleted locally while the create was in flight.
                log::info!("Annotation {} was removed before it was saved", temp_id);
                let gateway = self.gateway.clone()?;
                return Some(Self::delete_call(gateway, saved.id.clone()));
            }
            log::warn!("Could not confirm annotation {} as {}", temp_id, saved.id);
            return None;
        };

        let new_id = confirmed.id.clone();
        self.layer.rename(temp_id, &new_id);
        self.session.rename(temp_id, &new_id);
        if let Some(menu) = self.context_menu.as_mut().filter(|m| &m.id == temp_id) {
            menu.id = new_id.clone();
        }
        if let Some(manipulation) = self.manipulation.as_mut().filter(|m| &m.id == temp_id) {
            manipulation.id = new_id.clone();
        }
        log::debug!("Annotation {} saved as {}", temp_id, new_id);

        if confirmed.geometry != sent.geometry || confirmed.comment != sent.comment {
            let mut previous = sent;
            previous.id = new_id;
            return self.persist_update(previous, confirmed);
        }
        None
    }

    fn revert_update(&mut self, previous: AnnotationRecord, sent: &AnnotationRecord) {
        if self.store.find_by_id(&sent.id) != Some(sent) {
            // A newer local edit owns the record now.
            return;
        }
        let id = previous.id.clone();
        if let Ok(shape) = previous.shape() {
            self.layer.set_shape(&id, shape);
        }
        self.store.restore(previous.clone());
        self.refresh_context_menu();
        self.emit(AnnotationEvent::Updated(previous));
    }

    /// Drop an unconfirmed annotation and everything pointing at it.
    fn discard(&mut self, id: &AnnotationId) {
        if self.store.rollback(id).is_some() {
            self.cascade_removal(id);
            self.emit(AnnotationEvent::Deleted { id: id.clone() });
        }
    }

    fn remove_local(&mut self, id: &AnnotationId) {
        if self.store.remove(id).is_some() {
            self.cascade_removal(id);
            self.emit(AnnotationEvent::Deleted { id: id.clone() });
        }
    }

    fn cascade_removal(&mut self, id: &AnnotationId) {
        let was_selected = self.layer.selected() == Some(id);
        self.layer.remove(id);
        self.session.forget(id);
        if self.context_menu.as_ref().is_some_and(|m| &m.id == id) {
            self.context_menu = None;
        }
        if self.manipulation.as_ref().is_some_and(|m| &m.id == id) {
            self.manipulation = None;
        }
        if was_selected {
            self.emit(AnnotationEvent::Deselected);
        }
    }

    // --- Selection ---

    /// Select a rendered annotation. Fires `annotation:selected` when the
    /// selection changes.
    pub fn select(&mut self, id: &AnnotationId) -> bool {
        let changed = self.layer.selected() != Some(id);
        if !self.layer.select(id) {
            return false;
        }
        self.refresh_context_menu();
        if changed {
            if let Some(record) = self.store.find_by_id(id).cloned() {
                self.emit(AnnotationEvent::Selected(record));
            }
        }
        true
    }

    pub fn deselect(&mut self) {
        self.context_menu = None;
        if self.layer.deselect().is_some() {
            self.emit(AnnotationEvent::Deselected);
        }
    }

    fn refresh_context_menu(&mut self) {
        self.context_menu = self.layer.selected_handle().and_then(|handle| {
            let record = self.store.find_by_id(&handle.id)?;
            let can_edit = self.config.can_edit(&record.user);
            let can_delete = self.config.can_delete(&record.user);
            if !can_edit && !can_delete {
                return None;
            }
            let bounds = handle.shape.bounds();
            let corner = self.session.camera.page_to_screen(Point::new(bounds.x1, bounds.y0));
            Some(ContextMenu {
                id: handle.id.clone(),
                can_edit,
                can_delete,
                anchor: corner + MENU_OFFSET,
            })
        });
    }

    /// Jump to an annotation from the comment list: show its page, select it,
    /// center it and flash its outline until [`Editor::clear_flash`].
    pub async fn focus_on_comment(&mut self, id: &AnnotationId) -> Result<bool, EditorError> {
        let Some(page) = self.store.find_by_id(id).map(|r| r.page) else {
            log::warn!("Annotation with ID {} not found.", id);
            return Ok(false);
        };
        if self.session.current_page() != page {
            self.render_page(page).await?;
        }
        let Some(center) = self.layer.get(id).map(|h| h.shape.bounds().center()) else {
            return Ok(false);
        };
        self.select(id);
        self.sync_viewport();
        self.session.camera.center_on(center);
        self.refresh_context_menu();
        self.layer.set_flashed(Some(id.clone()));
        Ok(true)
    }

    pub fn clear_flash(&mut self) {
        self.layer.set_flashed(None);
    }

    // --- Queries ---

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn layer(&self) -> &ShapeLayer {
        &self.layer
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn document(&self) -> Option<&dyn PdfDocument> {
        self.document.as_deref()
    }

    pub fn current_page(&self) -> u32 {
        self.session.current_page()
    }

    pub fn page_count(&self) -> u32 {
        self.session.pages.page_count()
    }

    pub fn zoom_level(&self) -> f64 {
        self.session.camera.zoom
    }

    pub fn scroll(&self) -> Vec2 {
        self.session.camera.scroll
    }

    pub fn raster(&self) -> Option<&RgbaImage> {
        self.raster.as_ref()
    }

    pub fn context_menu(&self) -> Option<&ContextMenu> {
        self.context_menu.as_ref()
    }

    /// Details for the hovered annotation. Hidden while the context menu is up.
    pub fn tooltip(&self) -> Option<Tooltip> {
        if self.context_menu.is_some() {
            return None;
        }
        let record = self.store.find_by_id(self.layer.hovered()?)?;
        Some(Tooltip {
            user: record.user.clone(),
            created_at: record.created_at,
            comment: record.comment.clone(),
        })
    }

    /// Annotations with comments, in creation order.
    pub fn comments(&self) -> Vec<&AnnotationRecord> {
        self.store.list_with_comments().collect()
    }

    pub fn comments_panel_enabled(&self) -> bool {
        self.config.ui.enable_comments_panel
    }

    /// Paintable snapshot of the current page.
    pub fn scene(&self) -> Scene<'_> {
        let zoom = self.session.camera.zoom;
        Scene {
            raster: self.raster.as_ref(),
            shapes: self.layer.projected(zoom),
            preview: self
                .session
                .tools
                .preview_shape()
                .map(|shape| project_shape(&shape, zoom, Vec2::ZERO)),
            selection: self
                .layer
                .selected_handle()
                .map(|h| project_shape(&h.shape, zoom, Vec2::ZERO).bounds()),
            flashed: self.layer.flashed().cloned(),
        }
    }

    /// Split borrow for the export pipeline.
    pub fn export_parts(&mut self) -> Option<ExportParts<'_>> {
        Some(ExportParts {
            document: self.document.as_deref()?,
            store: &self.store,
            offset: Vec2::new(self.config.export_offset.x, self.config.export_offset.y),
            view: self.view.as_mut(),
        })
    }
}
