//! Editing sessions and the registry that owns them.
//!
//! A [`Session`] owns one document, its [`EditState`] and its page bitmap cache.
//! Nothing is shared between sessions except the read-only compositor and asset
//! resolver handed out by the [`SessionRegistry`].

use crate::cache::{CacheStats, PageBitmapCache};
use crate::color::Color;
use crate::compositor::{dominant_color, sample_pixel, Composite, Compositor};
use crate::config::EngineConfig;
use crate::document::{AssetResolver, PageSource};
use crate::edits::{
    AreaRecolor, ContentKind, CopySummary, EditKind, EditKinds, EditState, GlobalSubstitution, InsertedContent,
    PageEdits,
};
use crate::error::{EditError, Result};
use crate::reconstruct::{choose_path, reconstruct_document, PageSink, ReconstructionPath, ReconstructionReport};
use crate::template::{merge, MergeMode, MergeReport, Template};
use crate::transform::{PagePoint, PageRect, Zoom};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for SessionId {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| EditError::SessionNotFound(s.to_string()))
    }
}

/// Everything known about one page's edits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub page: usize,
    pub generation: u64,
    pub path: ReconstructionPath,
    pub deletions: Vec<PageRect>,
    pub area_recolors: Vec<AreaRecolor>,
    pub global_substitutions: Vec<GlobalSubstitution>,
    /// Inserted content of the page with its flat-list index.
    pub inserted_content: Vec<(usize, InsertedContent)>,
}

struct Loaded<D> {
    document: D,
    state: EditState,
}

/// One document being edited.
pub struct Session<D: PageSource> {
    id: SessionId,
    config: EngineConfig,
    compositor: Arc<Compositor>,
    assets: Arc<dyn AssetResolver>,
    loaded: Option<Loaded<D>>,
    cache: PageBitmapCache,
}

impl<D: PageSource> Session<D> {
    pub fn new(config: EngineConfig, compositor: Arc<Compositor>, assets: Arc<dyn AssetResolver>) -> Self {
        Self {
            id: SessionId::new(),
            config,
            compositor,
            assets,
            loaded: None,
            cache: PageBitmapCache::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the current document (if any) and start from empty edits.
    pub fn load_document(&mut self, document: D) -> Result<()> {
        let sizes = document.page_sizes()?;
        let state = EditState::new(sizes, self.config.edits.target_color()?);
        info!("Session {} loaded a {}-page document", self.id, state.page_count());
        self.cache.clear();
        self.loaded = Some(Loaded { document, state });
        Ok(())
    }

    /// Drop the document and its edits, handing the document back.
    pub fn unload(&mut self) -> Option<D> {
        self.cache.clear();
        self.loaded.take().map(|loaded| loaded.document)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    fn loaded(&self) -> Result<&Loaded<D>> {
        self.loaded.as_ref().ok_or(EditError::NoDocument)
    }

    fn state_mut(&mut self) -> Result<&mut EditState> {
        self.loaded
            .as_mut()
            .map(|l| &mut l.state)
            .ok_or(EditError::NoDocument)
    }

    pub fn document(&self) -> Result<&D> {
        Ok(&self.loaded()?.document)
    }

    pub fn state(&self) -> Result<&EditState> {
        Ok(&self.loaded()?.state)
    }

    /// Composited preview of a page, served from the cache while the page's
    /// edits are unchanged.
    pub fn render_page(&mut self, page: usize, zoom: f32) -> Result<Arc<RgbImage>> {
        let zoom = self.config.render.check_zoom(zoom)?;
        let Loaded { document, state } = self.loaded.as_ref().ok_or(EditError::NoDocument)?;
        let generation = state.generation(page)?;
        let compositor = &self.compositor;
        let assets = self.assets.as_ref();
        self.cache.get_or_insert_with(page, zoom, generation, || {
            debug!("Rendering page {} at zoom {}", page, zoom.value());
            compositor
                .render_and_composite(document, page, zoom, state, assets)
                .map(|composite| composite.image)
        })
    }

    /// Uncached composite with the per-edit outcomes.
    pub fn composite_page(&self, page: usize, zoom: f32) -> Result<Composite> {
        let zoom = self.config.render.check_zoom(zoom)?;
        let loaded = self.loaded()?;
        self.compositor
            .render_and_composite(&loaded.document, page, zoom, &loaded.state, self.assets.as_ref())
    }

    pub fn add_deletion(&mut self, page: usize, rect: PageRect) -> Result<usize> {
        let index = self.state_mut()?.add_deletion(page, rect)?;
        self.cache.invalidate_page(page);
        Ok(index)
    }

    /// Add an area recolor, sampling the dominant color of the region from the
    /// unedited page.
    pub fn add_area_recolor(&mut self, page: usize, rect: PageRect, target: Option<Color>) -> Result<usize> {
        let loaded = self.loaded()?;
        let fitted = rect.fit_to(loaded.state.page_size(page)?)?;
        let base = loaded.document.render_page(page, Zoom::NATIVE)?;
        let region = Zoom::NATIVE.to_pixel_rect(&fitted, base.width(), base.height());
        let source = dominant_color(&base, region)
            .or_else(|| sample_pixel(&base, Zoom::NATIVE.to_pixel(PagePoint { x: fitted.x1, y: fitted.y1 })))
            .unwrap_or(Color::WHITE);

        let index = self.state_mut()?.add_area_recolor(page, fitted, source, target)?;
        self.cache.invalidate_page(page);
        Ok(index)
    }

    /// Add a global substitution; `tolerance` defaults to the configured one.
    pub fn add_global_substitution(
        &mut self,
        page: usize,
        source: Color,
        target: Color,
        tolerance: Option<u32>,
    ) -> Result<usize> {
        let tolerance = tolerance.unwrap_or(self.config.edits.default_tolerance);
        let index = self
            .state_mut()?
            .add_global_substitution(page, source, target, tolerance)?;
        self.cache.invalidate_page(page);
        Ok(index)
    }

    /// Insert text or an image. Image handles must resolve at insertion time.
    pub fn add_inserted_content(&mut self, content: InsertedContent) -> Result<usize> {
        self.loaded()?;
        if let ContentKind::Image(image) = &content.kind {
            if !self.assets.exists(&image.source_ref) {
                return Err(EditError::Asset {
                    handle: image.source_ref.to_string(),
                    message: "not found".to_string(),
                });
            }
        }
        let page = content.page;
        let index = self.state_mut()?.add_inserted_content(content)?;
        self.cache.invalidate_page(page);
        Ok(index)
    }

    pub fn remove_item(&mut self, kind: EditKind, page: usize, index: usize) -> Result<()> {
        self.state_mut()?.remove_item(kind, page, index)?;
        self.cache.invalidate_page(page);
        Ok(())
    }

    pub fn clear_page(&mut self, page: usize) -> Result<()> {
        self.state_mut()?.clear_page(page)?;
        self.cache.invalidate_page(page);
        Ok(())
    }

    pub fn copy_page_edits(&mut self, source: usize, target: usize, kinds: EditKinds) -> Result<CopySummary> {
        let summary = self.state_mut()?.copy_page_edits(source, target, kinds)?;
        if summary.copied > 0 {
            self.cache.invalidate_page(target);
        }
        Ok(summary)
    }

    pub fn copy_color_edits_to_all_pages(&mut self, source: usize) -> Result<Vec<usize>> {
        let affected = self.state_mut()?.copy_color_edits_to_all_pages(source)?;
        for &page in &affected {
            self.cache.invalidate_page(page);
        }
        Ok(affected)
    }

    /// Color of the unedited page at a page-space point.
    pub fn sample_color(&self, page: usize, point: PagePoint) -> Result<Color> {
        let loaded = self.loaded()?;
        let size = loaded.state.page_size(page)?;
        if !size.contains(point) {
            return Err(EditError::InvalidArgument(format!(
                "point ({}, {}) is outside the page",
                point.x, point.y
            )));
        }
        let base = loaded.document.render_page(page, Zoom::NATIVE)?;
        sample_pixel(&base, Zoom::NATIVE.to_pixel(point))
            .ok_or_else(|| EditError::Render(format!("page {} rendered empty", page)))
    }

    pub fn set_default_target_color(&mut self, color: Color) -> Result<()> {
        self.state_mut()?.set_default_target_color(color);
        Ok(())
    }

    pub fn page_edits_summary(&self, page: usize) -> Result<PageSummary> {
        let state = &self.loaded()?.state;
        let PageEdits {
            deletions,
            area_recolors,
            global_substitutions,
        } = state.page_edits(page)?.clone();
        Ok(PageSummary {
            page,
            generation: state.generation(page)?,
            path: choose_path(state, page),
            deletions,
            area_recolors,
            global_substitutions,
            inserted_content: state
                .content_for_page(page)
                .map(|(index, content)| (index, content.clone()))
                .collect(),
        })
    }

    pub fn has_any_edits(&self) -> Result<bool> {
        Ok(!self.loaded()?.state.is_empty())
    }

    pub fn export_template(&self) -> Result<Template> {
        Ok(Template::from_state(&self.loaded()?.state))
    }

    pub fn import_template(&mut self, template: &Template, mode: MergeMode) -> Result<MergeReport> {
        let report = merge(self.state_mut()?, template, mode)?;
        for &page in &report.pages_affected {
            self.cache.invalidate_page(page);
        }
        Ok(report)
    }

    /// Rebuild the whole document into `sink`.
    pub fn reconstruct<S: PageSink + ?Sized>(&self, sink: &mut S) -> Result<ReconstructionReport> {
        let loaded = self.loaded()?;
        reconstruct_document(
            &loaded.document,
            &loaded.state,
            &self.compositor,
            self.assets.as_ref(),
            sink,
        )
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

type Hook = Box<dyn Fn(&SessionId)>;

/// Owns every live session, keyed by id.
pub struct SessionRegistry<D: PageSource> {
    config: EngineConfig,
    compositor: Arc<Compositor>,
    assets: Arc<dyn AssetResolver>,
    sessions: HashMap<SessionId, Session<D>>,
    on_created: Vec<Hook>,
    on_destroyed: Vec<Hook>,
}

impl<D: PageSource> SessionRegistry<D> {
    pub fn new(config: EngineConfig, assets: Arc<dyn AssetResolver>) -> Result<Self> {
        config.validate()?;
        let compositor = Arc::new(Compositor::new(&config.compositor)?);
        Ok(Self {
            config,
            compositor,
            assets,
            sessions: HashMap::new(),
            on_created: Vec::new(),
            on_destroyed: Vec::new(),
        })
    }

    /// Run `hook` after every session is created.
    pub fn on_created(&mut self, hook: impl Fn(&SessionId) + 'static) {
        self.on_created.push(Box::new(hook));
    }

    /// Run `hook` after every session is destroyed.
    pub fn on_destroyed(&mut self, hook: impl Fn(&SessionId) + 'static) {
        self.on_destroyed.push(Box::new(hook));
    }

    pub fn create(&mut self) -> SessionId {
        let session = Session::new(self.config.clone(), Arc::clone(&self.compositor), Arc::clone(&self.assets));
        let id = session.id();
        self.sessions.insert(id, session);
        info!("Created session {} ({} active)", id, self.sessions.len());
        for hook in &self.on_created {
            hook(&id);
        }
        id
    }

    /// Remove a session and everything it owns.
    pub fn destroy(&mut self, id: &SessionId) -> Result<()> {
        self.sessions
            .remove(id)
            .ok_or_else(|| EditError::SessionNotFound(id.to_string()))?;
        info!("Destroyed session {} ({} active)", id, self.sessions.len());
        for hook in &self.on_destroyed {
            hook(id);
        }
        Ok(())
    }

    pub fn get(&self, id: &SessionId) -> Result<&Session<D>> {
        self.sessions
            .get(id)
            .ok_or_else(|| EditError::SessionNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Result<&mut Session<D>> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| EditError::SessionNotFound(id.to_string()))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SessionId> {
        self.sessions.keys()
    }

    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }
}
