//! The single pipeline every map plan runs through:
//! load, validate state, load and clip subordinates, paint, fit viewport,
//! title, save.

use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;

use crate::collect::paths::{keys, PathBundle};
use crate::config::{Capabilities, RenderConfig};
use crate::error::{MapError, Result};
use crate::geo_core::GeoCore;
use crate::geometric::boundary::BoundaryDataset;
use crate::geometric::clip::clip;
use crate::geometric::mask::{derive_mask, Mask};
use crate::maps::plan::{EmptyClip, LayerSpec, MapPlan, Paint, Presence, Source, ViewportRule};
use crate::maps::{MapOutcome, MapRequest, PaintedLayer};
use crate::render::layers::{
    plot_base_map, plot_border, plot_choropleth, plot_mask, plot_polygons,
};
use crate::render::legend::LineLegend;
use crate::render::style::LayerStyle;
use crate::render::surface::DrawingSurface;
use crate::render::text::TextPainter;

/// Runs map requests against one configuration and the capabilities
/// resolved at start-up
pub struct MapDriver<'a> {
    config: &'a RenderConfig,
    capabilities: &'a Capabilities,
}

impl<'a> MapDriver<'a> {
    pub fn new(config: &'a RenderConfig, capabilities: &'a Capabilities) -> Self {
        MapDriver {
            config,
            capabilities,
        }
    }

    /// Produce the map described by `request`.
    ///
    /// Any failure is logged and returned; the output file is only ever
    /// written as the very last step, so an aborted map leaves nothing at
    /// the `saida` path.
    pub fn run(&self, request: &MapRequest) -> Result<MapOutcome> {
        self.execute(request).map_err(|e| {
            error!("{} aborted: {}", describe(request), e);
            e
        })
    }

    fn execute(&self, request: &MapRequest) -> Result<MapOutcome> {
        if !self.capabilities.maps_available {
            return Err(MapError::InvalidRequest(format!(
                "map generation is unavailable: EPSG:{} cannot be produced",
                self.config.target_epsg
            )));
        }
        let plan = MapPlan::for_request(request)?;
        let output = request.paths.output()?.to_path_buf();
        let missing = request.paths.missing(&plan.required_keys());
        if !missing.is_empty() {
            return Err(MapError::MissingInputFiles { keys: missing });
        }

        info!("Preparing {}", describe(request));
        let geo_core = self.config.geo_core();
        let states = BoundaryDataset::from_path(
            keys::ESTADOS,
            request.paths.require_existing(keys::ESTADOS)?,
            &geo_core,
        )?;
        let mask = if plan.needs_mask() {
            Some(derive_mask(
                &states,
                request.require_state()?,
                &self.config.state_field,
            )?)
        } else {
            None
        };
        let base = load_base_map(&request.paths, &geo_core);

        let mut surface = DrawingSurface::new(self.config);
        surface.set_frame(plan.frame);
        let mut fallback_used = false;

        info!("Painting {} layer(s)", plan.layers.len());
        for spec in &plan.layers {
            match spec.source {
                Source::BaseMap => {
                    plot_base_map(&mut surface, base.as_ref(), spec.z, fill_style(spec)?);
                }
                Source::States => {
                    paint_dataset(&mut surface, spec, &states, request, fallback_used)?;
                }
                Source::Highlight => {
                    let style = fill_style(spec)?;
                    plot_mask(&mut surface, spec.name, require_mask(&mask)?, spec.z, style);
                }
                Source::Border => {
                    plot_border(&mut surface, require_mask(&mask)?, spec.z, fill_style(spec)?);
                }
                Source::Dataset(key) => {
                    let mask = require_mask(&mask)?;
                    match prepare_subordinate(spec, key, &request.paths, mask, &geo_core)? {
                        Some(clipped) => {
                            paint_dataset(&mut surface, spec, &clipped, request, fallback_used)?;
                        }
                        None => {
                            if let Presence::Optional { fallback } = spec.presence {
                                plot_mask(&mut surface, spec.name, mask, spec.z, fallback);
                                fallback_used = true;
                            }
                        }
                    }
                }
            }
        }

        let limits = match plan.viewport {
            ViewportRule::Mask { margin } => require_mask(&mask)?.bbox.expand(margin),
            ViewportRule::StatesExtent { margin } => states
                .bounding_box()
                .ok_or_else(|| {
                    MapError::InvalidRequest(format!("'{}' holds no geometry", states.name))
                })?
                .expand(margin),
        };
        surface.set_limits(limits.non_degenerate())?;
        surface.set_title(&plan.title);
        surface.set_legend(build_legend(&plan, fallback_used));

        let painter = TextPainter::new(
            Arc::clone(&self.capabilities.fonts),
            &self.config.font_family,
        );
        let size_px = surface.save(&output, &painter)?;

        let layers = surface
            .layers()
            .into_iter()
            .map(|l| PaintedLayer {
                name: l.name.clone(),
                z: l.z,
                features: l.feature_count(),
            })
            .collect();
        Ok(MapOutcome {
            kind: plan.kind,
            output,
            title: plan.title.clone(),
            viewport: surface.limits().unwrap_or(limits),
            size_px,
            layers,
            legend: surface.legend().map(LineLegend::labels).unwrap_or_default(),
            fallback_used,
        })
    }
}

fn describe(request: &MapRequest) -> String {
    match &request.state {
        Some(state) => format!("{} map for {}", request.kind, state),
        None => format!("{} map", request.kind),
    }
}

/// South America base layer, or `None` with a warning
fn load_base_map(paths: &PathBundle, geo_core: &GeoCore) -> Option<BoundaryDataset> {
    let Some(path) = paths.existing(keys::SULAMERICA) else {
        warn!("Base map '{}' unavailable; drawing the ocean only", keys::SULAMERICA);
        return None;
    };
    match BoundaryDataset::from_path(keys::SULAMERICA, path, geo_core) {
        Ok(dataset) => Some(dataset),
        Err(e) => {
            warn!("Base map could not be loaded, drawing the ocean only: {}", e);
            None
        }
    }
}

/// Load a subordinate dataset and clip it to the mask. `None` means the
/// layer's fallback applies.
fn prepare_subordinate(
    spec: &LayerSpec,
    key: &str,
    paths: &PathBundle,
    mask: &Mask,
    geo_core: &GeoCore,
) -> Result<Option<BoundaryDataset>> {
    let optional = matches!(spec.presence, Presence::Optional { .. });
    let path: &Path = match paths.existing(key) {
        Some(path) => path,
        None if optional => {
            warn!("'{}' unavailable; painting the fallback layer", key);
            return Ok(None);
        }
        None => paths.require_existing(key)?,
    };

    let clipped = match load_and_clip(key, path, mask, geo_core) {
        Ok(clipped) => clipped,
        Err(e) if optional => {
            warn!("Failed to process '{}': {}; painting the fallback layer", key, e);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    if clipped.is_empty() {
        if optional {
            warn!("Nothing of '{}' falls inside {}; painting the fallback layer", key, mask.code);
            return Ok(None);
        }
        match spec.on_empty {
            EmptyClip::Abort => {
                return Err(MapError::EmptyClip {
                    dataset: key.to_string(),
                    state: mask.code.to_string(),
                })
            }
            EmptyClip::RenderEmpty => {
                warn!("Nothing of '{}' falls inside {}; rendering an empty layer", key, mask.code);
            }
        }
    }
    Ok(Some(clipped))
}

fn load_and_clip(
    key: &str,
    path: &Path,
    mask: &Mask,
    geo_core: &GeoCore,
) -> Result<BoundaryDataset> {
    let dataset = BoundaryDataset::from_path(key, path, geo_core)?;
    info!("Clipping '{}' to {}", key, mask.code);
    clip(&dataset.repaired(), mask)
}

fn paint_dataset(
    surface: &mut DrawingSurface,
    spec: &LayerSpec,
    dataset: &BoundaryDataset,
    request: &MapRequest,
    fallback_used: bool,
) -> Result<usize> {
    match spec.paint {
        Paint::Fill(style) => Ok(plot_polygons(
            surface,
            spec.name,
            dataset,
            spec.z,
            effective_style(spec, style, fallback_used),
        )),
        Paint::Choropleth { cmap, edge } => {
            let summary = plot_choropleth(
                surface,
                spec.name,
                dataset,
                spec.z,
                request.require_column()?,
                request.cmap.unwrap_or(cmap),
                edge,
            )?;
            info!(
                "Coloured {} record(s) of '{}' by '{}' ({} without value)",
                summary.colored, dataset.name, summary.column, summary.missing
            );
            Ok(summary.colored + summary.missing)
        }
    }
}

fn effective_style(spec: &LayerSpec, style: LayerStyle, fallback_used: bool) -> LayerStyle {
    match (fallback_used, spec.muted_edge) {
        (true, Some(muted)) => style.with_edge(muted),
        _ => style,
    }
}

fn fill_style(spec: &LayerSpec) -> Result<LayerStyle> {
    match spec.paint {
        Paint::Fill(style) => Ok(style),
        Paint::Choropleth { .. } => Err(MapError::InvalidRequest(format!(
            "layer '{}' cannot be colour-coded",
            spec.name
        ))),
    }
}

fn require_mask(mask: &Option<Mask>) -> Result<&Mask> {
    mask.as_ref()
        .ok_or_else(|| MapError::InvalidRequest("layer needs a state mask".to_string()))
}

/// Legend entries for line layers, topmost layer first
fn build_legend(plan: &MapPlan, fallback_used: bool) -> LineLegend {
    let mut legend = LineLegend::default();
    for spec in plan.layers.iter().rev() {
        let (Some(label), Paint::Fill(style)) = (spec.legend, spec.paint) else {
            continue;
        };
        let style = effective_style(spec, style, fallback_used);
        if let Some(edge) = style.edge {
            legend.push(label, edge, style.width_pt);
        }
    }
    legend
}
