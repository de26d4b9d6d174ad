//! Overlay lifecycle: one year selection → decode → stats → render →
//! bounds → publish, with supersession of stale selections.
//!
//! The manager runs on a single thread. Several `select_year` futures may be
//! in flight at once; each carries a [`LoadToken`] and only the holder of the
//! current token may touch the map or deliver statistics. The map's overlay
//! and legend slots are owned here and mutated only by [`OverlayManager`].
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{LoadError, RenderError};
use crate::geo::{raster_bounds, GeoBounds};
use crate::legend::{ClassTable, ColorLut, LegendEntry};
use crate::raster::decode_geotiff;
use crate::render::render_overlay;
use crate::source::RasterSource;
use crate::stats::{aggregate, ClassStat};

// ── External collaborators ────────────────────────────────────────────────────

/// Viewport fitting options passed through to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitOptions {
    pub padding_px: [u32; 2],
    pub max_zoom: u8,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self { padding_px: [20, 20], max_zoom: 16 }
    }
}

/// A rendered year ready to be placed on the map.
#[derive(Debug, Clone)]
pub struct YearOverlay {
    pub year: i32,
    pub image: RgbaImage,
    pub bounds: GeoBounds,
}

/// The map surface the overlay and legend are drawn on.
///
/// Methods run while the manager holds the map; they must not call back
/// into the manager.
pub trait MapDisplay {
    type OverlayHandle;
    type LegendHandle;

    /// Draw `overlay`. An `Err` leaves nothing attached.
    fn attach_overlay(&mut self, overlay: &YearOverlay, opacity: f32) -> Result<Self::OverlayHandle, RenderError>;
    fn detach_overlay(&mut self, handle: Self::OverlayHandle);
    /// Current visible extent, `None` if the map has no extent yet.
    fn viewport_bounds(&self) -> Option<GeoBounds>;
    fn fit_viewport(&mut self, bounds: &GeoBounds, options: &FitOptions);
    fn attach_legend(&mut self, entries: &[LegendEntry]) -> Self::LegendHandle;
    fn detach_legend(&mut self, handle: Self::LegendHandle);
}

/// Receives one statistics set per successfully published year.
///
/// Delivery happens after the overlay and legend are in place and with no
/// manager state borrowed, so a sink may read the manager back.
pub trait StatsSink {
    fn on_stats_ready(&self, year: i32, stats: &[ClassStat]);
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Where the manager's newest selection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "year")]
pub enum LoadState {
    Idle,
    Loading(i32),
    Rendering(i32),
    Published(i32),
    Failed(i32),
}

/// Identity of one selection. Stale once a newer selection starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken {
    generation: u64,
    year: i32,
}

impl LoadToken {
    pub fn year(&self) -> i32 {
        self.year
    }
}

/// Result of a single [`OverlayManager::select_year`] call.
#[derive(Debug)]
pub enum LoadOutcome {
    Published { year: i32, bounds: GeoBounds, viewport_fitted: bool },
    /// The year was already on the map; nothing was fetched.
    AlreadyPublished { year: i32 },
    /// The year is already being loaded by an earlier call.
    AlreadyLoading { year: i32 },
    /// A newer selection started before this one finished; results dropped.
    Superseded { year: i32 },
    /// The load failed; the map keeps its previous overlay and legend.
    Failed { year: i32, error: LoadError },
}

impl LoadOutcome {
    pub fn year(&self) -> i32 {
        match self {
            LoadOutcome::Published { year, .. }
            | LoadOutcome::AlreadyPublished { year }
            | LoadOutcome::AlreadyLoading { year }
            | LoadOutcome::Superseded { year }
            | LoadOutcome::Failed { year, .. } => *year,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, LoadOutcome::Published { .. })
    }
}

/// The attached overlay. The image is kept so it can be put back if its
/// replacement is rejected by the map.
struct ActiveOverlay<H> {
    overlay: YearOverlay,
    handle: H,
}

/// Options that shape how overlays are placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayOptions {
    pub opacity: f32,
    pub fit: FitOptions,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self { opacity: 0.8, fit: FitOptions::default() }
    }
}

// ── Manager ───────────────────────────────────────────────────────────────────

/// Owns the active overlay and legend and sequences year loads.
pub struct OverlayManager<S, M: MapDisplay, K> {
    source: S,
    map: RefCell<M>,
    sink: K,
    classes: Rc<ClassTable>,
    lut: ColorLut,
    options: OverlayOptions,
    generation: Cell<u64>,
    pending: Cell<Option<LoadToken>>,
    state: Cell<LoadState>,
    active: RefCell<Option<ActiveOverlay<M::OverlayHandle>>>,
    legend: RefCell<Option<M::LegendHandle>>,
}

impl<S, M: MapDisplay, K> OverlayManager<S, M, K> {
    pub fn state(&self) -> LoadState {
        self.state.get()
    }

    pub fn active_year(&self) -> Option<i32> {
        self.active.borrow().as_ref().map(|a| a.overlay.year)
    }

    pub fn active_bounds(&self) -> Option<GeoBounds> {
        self.active.borrow().as_ref().map(|a| a.overlay.bounds)
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn map(&self) -> Ref<'_, M> {
        self.map.borrow()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        self.pending.get() == Some(token)
    }

    /// Drop the in-flight selection `token` without a result, as when its
    /// future is dropped. The manager falls back to the visible year.
    fn abandon(&self, token: LoadToken) {
        if !self.is_current(token) {
            return;
        }
        debug!(year = token.year, generation = token.generation, "load abandoned before completion");
        self.pending.set(None);
        let visible = self.active.try_borrow().ok().and_then(|a| a.as_ref().map(|a| a.overlay.year));
        self.state.set(visible.map_or(LoadState::Idle, LoadState::Published));
    }
}

/// Settles the manager when a `select_year` future is dropped mid-load, so
/// the year stays selectable.
struct PendingLoad<'a, S, M: MapDisplay, K> {
    manager: &'a OverlayManager<S, M, K>,
    token: LoadToken,
}

impl<S, M: MapDisplay, K> Drop for PendingLoad<'_, S, M, K> {
    fn drop(&mut self) {
        self.manager.abandon(self.token);
    }
}

impl<S, M, K> OverlayManager<S, M, K>
where
    S: RasterSource,
    M: MapDisplay,
    K: StatsSink,
{
    pub fn new(source: S, map: M, sink: K, classes: Rc<ClassTable>, options: OverlayOptions) -> Self {
        let lut = classes.color_lut();
        Self {
            source,
            map: RefCell::new(map),
            sink,
            classes,
            lut,
            options,
            generation: Cell::new(0),
            pending: Cell::new(None),
            state: Cell::new(LoadState::Idle),
            active: RefCell::new(None),
            legend: RefCell::new(None),
        }
    }

    /// Start a new selection, making every earlier token stale.
    fn begin(&self, year: i32) -> LoadToken {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let token = LoadToken { generation, year };
        self.pending.set(Some(token));
        self.state.set(LoadState::Loading(year));
        token
    }

    /// Invalidate any in-flight selection without starting a new one.
    fn cancel_pending(&self) {
        if let Some(stale) = self.pending.take() {
            debug!(year = stale.year, generation = stale.generation, "cancelling in-flight load");
            self.generation.set(self.generation.get() + 1);
        }
    }

    /// Load and publish `year`.
    ///
    /// Re-selecting the published year is a no-op, as is re-selecting a year
    /// that is still loading. Dropping the returned future abandons the load.
    pub async fn select_year(&self, year: i32) -> LoadOutcome {
        if let Some(pending) = self.pending.get() {
            if pending.year == year {
                return LoadOutcome::AlreadyLoading { year };
            }
        }
        if self.active_year() == Some(year) {
            self.cancel_pending();
            self.state.set(LoadState::Published(year));
            return LoadOutcome::AlreadyPublished { year };
        }

        let token = self.begin(year);
        let _pending = PendingLoad { manager: self, token };
        debug!(year, generation = token.generation, location = %self.source.describe(year), "loading raster");

        let bytes = match self.source.fetch(year).await {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(token, e.into()),
        };
        if !self.is_current(token) {
            return self.superseded(token);
        }

        let dataset = match decode_geotiff(&bytes) {
            Ok(ds) => ds,
            Err(e) => return self.fail(token, e.into()),
        };
        drop(bytes);
        info!(
            year,
            width = dataset.width(),
            height = dataset.height(),
            res_x = dataset.resolution().0,
            res_y = dataset.resolution().1,
            "decoded raster"
        );

        self.state.set(LoadState::Rendering(year));
        let stats = aggregate(&dataset);
        let image = match render_overlay(&dataset, &self.lut) {
            Ok(img) => img,
            Err(e) => return self.fail(token, e.into()),
        };
        let bounds = raster_bounds(dataset.origin(), dataset.resolution(), dataset.width(), dataset.height());
        drop(dataset);

        self.publish(token, YearOverlay { year, image, bounds }, &stats)
    }

    fn superseded(&self, token: LoadToken) -> LoadOutcome {
        debug!(year = token.year, generation = token.generation, "discarding superseded load");
        LoadOutcome::Superseded { year: token.year }
    }

    fn fail(&self, token: LoadToken, err: LoadError) -> LoadOutcome {
        if !self.is_current(token) {
            return self.superseded(token);
        }
        error!(year = token.year, stage = err.stage(), error = %err, "failed to load raster");
        self.pending.set(None);
        self.state.set(LoadState::Failed(token.year));
        LoadOutcome::Failed { year: token.year, error: err }
    }

    fn publish(&self, token: LoadToken, overlay: YearOverlay, stats: &[ClassStat]) -> LoadOutcome {
        if !self.is_current(token) {
            return self.superseded(token);
        }
        let year = overlay.year;
        let bounds = overlay.bounds;

        if let Err(e) = self.swap_overlay(overlay) {
            return self.fail(token, e.into());
        }

        let viewport_fitted = {
            let mut map = self.map.borrow_mut();
            let mut legend = self.legend.borrow_mut();
            if let Some(previous) = legend.take() {
                map.detach_legend(previous);
            }
            *legend = Some(map.attach_legend(&self.classes.legend_entries(year)));

            let fit = !map.viewport_bounds().is_some_and(|vp| vp.contains(&bounds));
            if fit {
                map.fit_viewport(&bounds, &self.options.fit);
            }
            fit
        };

        self.pending.set(None);
        self.state.set(LoadState::Published(year));
        info!(year, classes = stats.len(), viewport_fitted, "overlay published");

        self.sink.on_stats_ready(year, stats);
        LoadOutcome::Published { year, bounds, viewport_fitted }
    }

    /// Replace the attached overlay with `overlay`. If the map rejects it the
    /// previous overlay is attached again.
    fn swap_overlay(&self, overlay: YearOverlay) -> Result<(), RenderError> {
        let opacity = self.options.opacity;
        let mut map = self.map.borrow_mut();
        let mut active = self.active.borrow_mut();

        let previous = active.take().map(|prev| {
            map.detach_overlay(prev.handle);
            prev.overlay
        });
        let err = match map.attach_overlay(&overlay, opacity) {
            Ok(handle) => {
                *active = Some(ActiveOverlay { overlay, handle });
                return Ok(());
            }
            Err(e) => e,
        };

        if let Some(prev) = previous {
            match map.attach_overlay(&prev, opacity) {
                Ok(handle) => *active = Some(ActiveOverlay { overlay: prev, handle }),
                Err(e) => warn!(year = prev.year, error = %e, "previous overlay could not be restored"),
            }
        }
        Err(err)
    }

    /// Cancel any in-flight load and remove the overlay and legend.
    pub fn clear(&self) {
        self.cancel_pending();
        let mut map = self.map.borrow_mut();
        if let Some(previous) = self.active.borrow_mut().take() {
            map.detach_overlay(previous.handle);
        }
        if let Some(previous) = self.legend.borrow_mut().take() {
            map.detach_legend(previous);
        }
        self.state.set(LoadState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::history::StatsHistory;
    use std::cell::RefCell;

    #[derive(Default)]
    struct CountingMap {
        attached: usize,
        detached: usize,
        fits: usize,
    }

    impl MapDisplay for CountingMap {
        type OverlayHandle = ();
        type LegendHandle = ();

        fn attach_overlay(&mut self, _overlay: &YearOverlay, _opacity: f32) -> Result<(), RenderError> {
            self.attached += 1;
            Ok(())
        }
        fn detach_overlay(&mut self, _handle: ()) {
            self.detached += 1;
        }
        fn viewport_bounds(&self) -> Option<GeoBounds> {
            None
        }
        fn fit_viewport(&mut self, _bounds: &GeoBounds, _options: &FitOptions) {
            self.fits += 1;
        }
        fn attach_legend(&mut self, _entries: &[LegendEntry]) {}
        fn detach_legend(&mut self, _handle: ()) {}
    }

    struct FailingSource;

    impl RasterSource for FailingSource {
        async fn fetch(&self, year: i32) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::Remote { year, message: "offline".into() })
        }
        fn describe(&self, year: i32) -> String {
            format!("offline:{year}")
        }
    }

    struct GarbageSource;

    impl RasterSource for GarbageSource {
        async fn fetch(&self, _year: i32) -> Result<Vec<u8>, FetchError> {
            Ok(b"II*\0garbage".to_vec())
        }
        fn describe(&self, year: i32) -> String {
            format!("garbage:{year}")
        }
    }

    fn manager<S: RasterSource>(source: S) -> OverlayManager<S, CountingMap, RefCell<StatsHistory>> {
        OverlayManager::new(
            source,
            CountingMap::default(),
            RefCell::new(StatsHistory::new()),
            Rc::new(ClassTable::mangrove()),
            OverlayOptions::default(),
        )
    }

    #[tokio::test]
    async fn fetch_failure_is_fail_soft() {
        let mgr = manager(FailingSource);
        let outcome = mgr.select_year(2007).await;
        assert!(matches!(outcome, LoadOutcome::Failed { year: 2007, error: LoadError::Fetch(_) }));
        assert_eq!(mgr.state(), LoadState::Failed(2007));
        assert_eq!(mgr.map().attached, 0);
        assert!(mgr.sink().borrow().is_empty());
        assert_eq!(mgr.active_year(), None);
    }

    #[tokio::test]
    async fn decode_failure_is_retryable() {
        let mgr = manager(GarbageSource);
        for _ in 0..2 {
            let outcome = mgr.select_year(2012).await;
            assert!(matches!(outcome, LoadOutcome::Failed { error: LoadError::Decode(_), .. }));
        }
        assert_eq!(mgr.state(), LoadState::Failed(2012));
    }

    #[test]
    fn newer_token_makes_older_stale() {
        let mgr = manager(FailingSource);
        let a = mgr.begin(2007);
        assert!(mgr.is_current(a));
        let b = mgr.begin(2012);
        assert!(!mgr.is_current(a));
        assert!(mgr.is_current(b));
        mgr.clear();
        assert!(!mgr.is_current(b));
        assert_eq!(mgr.state(), LoadState::Idle);
    }

    #[test]
    fn abandoned_token_frees_the_year() {
        let mgr = manager(FailingSource);
        let stale = mgr.begin(2007);
        let current = mgr.begin(2012);
        mgr.abandon(stale);
        assert!(mgr.is_current(current));

        mgr.abandon(current);
        assert!(!mgr.is_current(current));
        assert_eq!(mgr.state(), LoadState::Idle);
    }
}
