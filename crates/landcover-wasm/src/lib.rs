//! Browser bindings.
//!
//! `Dashboard` drives the overlay lifecycle against JS-provided collaborators:
//! a `fetch(year) -> Promise<Uint8Array>` function, a map object and a stats
//! callback. The free functions expose the pure pipeline stages.
use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function, Promise, Reflect, Uint8Array, Uint8ClampedArray};
use landcover_core::error::{FetchError, RenderError};
use landcover_core::{
    aggregate, decode_geotiff, raster_bounds, render_overlay, ClassStat, ClassTable, DashboardConfig, FitOptions,
    GeoBounds, LegendEntry, LoadError, LoadOutcome, MapDisplay, OverlayManager, OverlayOptions, RasterSource,
    StatsHistory, StatsSink, YearOverlay,
};
use serde::Serialize;
use tracing::warn;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn err_to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// ── Pure pipeline stages ──────────────────────────────────────────────────────

/// Decode a GeoTIFF and return its per-class statistics.
#[wasm_bindgen]
pub fn summarize(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let stats = summarize_bytes(bytes).map_err(err_to_js)?;
    to_js(&stats)
}

pub fn summarize_bytes(bytes: &[u8]) -> Result<Vec<ClassStat>, LoadError> {
    Ok(aggregate(&decode_geotiff(bytes)?))
}

/// A colorized raster ready for a canvas `ImageData`.
#[wasm_bindgen]
pub struct RenderedOverlay {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    bounds: GeoBounds,
}

#[wasm_bindgen]
impl RenderedOverlay {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA bytes, row-major.
    #[wasm_bindgen(getter)]
    pub fn rgba(&self) -> Vec<u8> {
        self.rgba.clone()
    }

    /// `{ south_west: {lat, lng}, north_east: {lat, lng} }`.
    #[wasm_bindgen(getter)]
    pub fn bounds(&self) -> Result<JsValue, JsValue> {
        to_js(&self.bounds)
    }
}

/// Decode and colorize a GeoTIFF with the built-in class table.
#[wasm_bindgen]
pub fn render(bytes: &[u8]) -> Result<RenderedOverlay, JsValue> {
    render_bytes(bytes, &ClassTable::default()).map_err(err_to_js)
}

pub fn render_bytes(bytes: &[u8], classes: &ClassTable) -> Result<RenderedOverlay, LoadError> {
    let ds = decode_geotiff(bytes)?;
    let img = render_overlay(&ds, &classes.color_lut())?;
    Ok(RenderedOverlay {
        width: img.width(),
        height: img.height(),
        bounds: raster_bounds(ds.origin(), ds.resolution(), ds.width(), ds.height()),
        rgba: img.into_raw(),
    })
}

/// Legend rows for `year` from the built-in class table.
#[wasm_bindgen]
pub fn legend(year: i32) -> Result<JsValue, JsValue> {
    to_js(&ClassTable::default().legend_entries(year))
}

// ── JS collaborators ──────────────────────────────────────────────────────────

/// `fetch(year)` returning a `Uint8Array` or a promise of one.
struct JsRasterSource {
    fetch: Function,
}

impl RasterSource for JsRasterSource {
    async fn fetch(&self, year: i32) -> Result<Vec<u8>, FetchError> {
        let remote = |e: JsValue| FetchError::Remote {
            year,
            message: e.as_string().unwrap_or_else(|| format!("{e:?}")),
        };
        let value = self.fetch.call1(&JsValue::NULL, &JsValue::from(year)).map_err(remote)?;
        let resolved = JsFuture::from(Promise::resolve(&value)).await.map_err(remote)?;
        if resolved.is_null() || resolved.is_undefined() {
            return Err(FetchError::NotFound { year, location: self.describe(year) });
        }
        Ok(Uint8Array::new(&resolved).to_vec())
    }

    fn describe(&self, year: i32) -> String {
        format!("js-fetch:{year}")
    }
}

/// A JS object with `attachOverlay`, `detachOverlay`, `getViewportBounds`,
/// `fitViewport`, `attachLegend` and `detachLegend` methods.
struct JsMap {
    target: JsValue,
}

impl JsMap {
    fn try_call(&self, method: &str, args: &Array) -> Result<JsValue, JsValue> {
        Reflect::get(&self.target, &JsValue::from_str(method))?
            .dyn_into::<Function>()?
            .apply(&self.target, args)
    }

    /// Calls whose failure only degrades the display are logged and skipped.
    fn call(&self, method: &str, args: &Array) -> JsValue {
        self.try_call(method, args).unwrap_or_else(|e| {
            warn!(method, error = ?e, "map call failed");
            JsValue::UNDEFINED
        })
    }

    fn arg<T: Serialize + ?Sized>(value: &T) -> JsValue {
        to_js(value).unwrap_or_else(|e| {
            warn!(error = ?e, "could not convert map argument");
            JsValue::UNDEFINED
        })
    }
}

fn surface_error(e: JsValue) -> RenderError {
    RenderError::Surface(e.as_string().unwrap_or_else(|| format!("{e:?}")))
}

impl MapDisplay for JsMap {
    type OverlayHandle = JsValue;
    type LegendHandle = JsValue;

    fn attach_overlay(&mut self, overlay: &YearOverlay, opacity: f32) -> Result<JsValue, RenderError> {
        let (width, height) = overlay.image.dimensions();
        let pixels = Uint8ClampedArray::from(overlay.image.as_raw().as_slice());
        let bounds = to_js(&overlay.bounds).map_err(surface_error)?;
        let args = Array::of5(&pixels, &JsValue::from(width), &JsValue::from(height), &bounds, &JsValue::from(opacity));
        self.try_call("attachOverlay", &args).map_err(surface_error)
    }

    fn detach_overlay(&mut self, handle: JsValue) {
        self.call("detachOverlay", &Array::of1(&handle));
    }

    fn viewport_bounds(&self) -> Option<GeoBounds> {
        let v = self.call("getViewportBounds", &Array::new());
        serde_wasm_bindgen::from_value(v).ok()
    }

    fn fit_viewport(&mut self, bounds: &GeoBounds, options: &FitOptions) {
        self.call("fitViewport", &Array::of2(&Self::arg(bounds), &Self::arg(options)));
    }

    fn attach_legend(&mut self, entries: &[LegendEntry]) -> JsValue {
        self.call("attachLegend", &Array::of1(&Self::arg(entries)))
    }

    fn detach_legend(&mut self, handle: JsValue) {
        self.call("detachLegend", &Array::of1(&handle));
    }
}

/// Keeps the session history and forwards each delivery to JS.
struct JsStatsSink {
    history: RefCell<StatsHistory>,
    callback: Function,
}

impl StatsSink for JsStatsSink {
    fn on_stats_ready(&self, year: i32, stats: &[ClassStat]) {
        self.history.on_stats_ready(year, stats);
        // The callback may call back into `Dashboard`; nothing is borrowed here.
        if let Err(e) = self.callback.call2(&JsValue::NULL, &JsValue::from(year), &JsMap::arg(stats)) {
            warn!(year, error = ?e, "stats callback failed");
        }
    }
}

// ── Dashboard ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OutcomeJs {
    outcome: &'static str,
    year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounds: Option<GeoBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn describe_outcome(outcome: &LoadOutcome) -> OutcomeJs {
    let (name, bounds, error) = match outcome {
        LoadOutcome::Published { bounds, .. } => ("published", Some(*bounds), None),
        LoadOutcome::AlreadyPublished { .. } => ("already-published", None, None),
        LoadOutcome::AlreadyLoading { .. } => ("already-loading", None, None),
        LoadOutcome::Superseded { .. } => ("superseded", None, None),
        LoadOutcome::Failed { error, .. } => ("failed", None, Some(error.to_string())),
    };
    OutcomeJs { outcome: name, year: outcome.year(), bounds, error }
}

type JsManager = OverlayManager<JsRasterSource, JsMap, JsStatsSink>;

/// Year-selection driver for a web map.
#[wasm_bindgen]
pub struct Dashboard {
    inner: Rc<JsManager>,
    config: Rc<DashboardConfig>,
}

#[wasm_bindgen]
impl Dashboard {
    /// `config_json` may be omitted to use the built-in defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(fetch: Function, map: JsValue, on_stats: Function, config_json: Option<String>) -> Result<Dashboard, JsValue> {
        let config = match config_json {
            Some(text) => DashboardConfig::from_json(&text).map_err(err_to_js)?,
            None => DashboardConfig::default(),
        };
        let options = OverlayOptions::from(&config);
        let classes = Rc::new(config.classes.clone());
        let manager = OverlayManager::new(
            JsRasterSource { fetch },
            JsMap { target: map },
            JsStatsSink { history: RefCell::new(StatsHistory::new()), callback: on_stats },
            classes,
            options,
        );
        Ok(Dashboard { inner: Rc::new(manager), config: Rc::new(config) })
    }

    /// Configured years, in display order.
    pub fn years(&self) -> Vec<i32> {
        self.config.years.clone()
    }

    /// Select a year. Resolves to `{ outcome, year, bounds?, error? }`.
    #[wasm_bindgen(js_name = selectYear)]
    pub fn select_year(&self, year: i32) -> Promise {
        let mgr = Rc::clone(&self.inner);
        future_to_promise(async move {
            let outcome = mgr.select_year(year).await;
            to_js(&describe_outcome(&outcome))
        })
    }

    /// Stats table rows for a year already loaded this session.
    #[wasm_bindgen(js_name = tableRows)]
    pub fn table_rows(&self, year: i32) -> Result<JsValue, JsValue> {
        to_js(&self.inner.sink().history.borrow().table_rows(year, self.inner.classes()))
    }

    /// Cross-year comparison for the bar chart.
    pub fn comparison(&self) -> Result<JsValue, JsValue> {
        to_js(&self.inner.sink().history.borrow().comparison(self.inner.classes()))
    }

    pub fn legend(&self, year: i32) -> Result<JsValue, JsValue> {
        to_js(&self.inner.classes().legend_entries(year))
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_to_summarize() {
        assert!(matches!(summarize_bytes(b"nope"), Err(LoadError::Decode(_))));
        assert!(render_bytes(b"nope", &ClassTable::default()).is_err());
    }

    #[test]
    fn outcome_names() {
        let o = describe_outcome(&LoadOutcome::Superseded { year: 2012 });
        assert_eq!((o.outcome, o.year), ("superseded", 2012));
        assert!(o.bounds.is_none() && o.error.is_none());
    }
}
