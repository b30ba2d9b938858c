//! Declarative layer tables, one per map product
//!
//! A plan says which datasets a map needs, how each layer is painted and
//! at which z-order, how the viewport is framed and what the title reads.
//! The driver consumes every plan the same way.

use crate::collect::paths::keys;
use crate::error::{MapError, Result};
use crate::maps::{MapKind, MapRequest, RegionType};
use crate::render::layers::BASE_MAP_STYLE;
use crate::render::style::{palette, Color, ColorMap, LayerStyle};
use crate::render::surface::Frame;

/// Where a layer's geometry comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// South America countries, optional and never framed
    BaseMap,
    /// Every state, unclipped
    States,
    /// The requested state's mask
    Highlight,
    /// Outline of the requested state's mask
    Border,
    /// A subordinate dataset clipped to the mask
    Dataset(&'static str),
}

/// How a layer is coloured
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Paint {
    Fill(LayerStyle),
    /// Faces from the request's column, edges from `edge`
    Choropleth { cmap: ColorMap, edge: LayerStyle },
}

/// What to do when a dataset's file is absent
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presence {
    Required,
    /// Paint the mask with `fallback` instead when the file is absent or
    /// unreadable, or when the clip leaves nothing
    Optional { fallback: LayerStyle },
}

/// What to do when clipping leaves no geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyClip {
    Abort,
    RenderEmpty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub name: &'static str,
    pub source: Source,
    pub z: i32,
    pub paint: Paint,
    pub presence: Presence,
    pub on_empty: EmptyClip,
    /// Legend label for a line layer
    pub legend: Option<&'static str>,
    /// Edge colour used instead when a fallback layer was painted
    pub muted_edge: Option<Color>,
}

impl LayerSpec {
    fn new(name: &'static str, source: Source, z: i32, paint: Paint) -> Self {
        LayerSpec {
            name,
            source,
            z,
            paint,
            presence: Presence::Required,
            on_empty: EmptyClip::Abort,
            legend: None,
            muted_edge: None,
        }
    }

    fn optional(mut self, fallback: LayerStyle) -> Self {
        self.presence = Presence::Optional { fallback };
        self
    }

    fn render_empty(mut self) -> Self {
        self.on_empty = EmptyClip::RenderEmpty;
        self
    }

    fn legend(mut self, label: &'static str) -> Self {
        self.legend = Some(label);
        self
    }

    fn muted(mut self, edge: Color) -> Self {
        self.muted_edge = Some(edge);
        self
    }

    /// Dataset key the layer reads, if any
    pub fn dataset_key(&self) -> Option<&'static str> {
        match self.source {
            Source::States | Source::Highlight | Source::Border => Some(keys::ESTADOS),
            Source::Dataset(key) => Some(key),
            Source::BaseMap => None,
        }
    }
}

/// How the axis limits are chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportRule {
    /// Mask bounding box grown by `margin` of its size on each side
    Mask { margin: f64 },
    /// Extent of every state grown by `margin`
    StatesExtent { margin: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapPlan {
    pub kind: MapKind,
    pub layers: Vec<LayerSpec>,
    pub viewport: ViewportRule,
    pub frame: Frame,
    pub title: String,
}

const STATES_STYLE: LayerStyle = LayerStyle::filled(palette::STATE_FACE, palette::WHITE, 0.5);
const BORDER_STYLE: LayerStyle = LayerStyle::outline(palette::BLACK, 0.8);
const HIGHLIGHT_STYLE: LayerStyle = LayerStyle::filled(palette::HIGHLIGHT, palette::BLACK, 0.3);
const MUNICIPALITY_STYLE: LayerStyle =
    LayerStyle::filled(palette::MUNICIPALITY_FACE, palette::MUNICIPALITY_EDGE, 0.3);
const CHOROPLETH_EDGE: LayerStyle = LayerStyle::outline(palette::CHOROPLETH_EDGE, 0.2);
const COVERAGE_STYLE: LayerStyle =
    LayerStyle::filled(palette::COVERAGE_FACE, palette::COVERAGE_EDGE, 0.3);
const COVERAGE_FALLBACK: LayerStyle = LayerStyle::fill(palette::COVERAGE_FACE);

pub const LEGEND_INTERMEDIATE: &str = "Região Intermediária";
pub const LEGEND_IMMEDIATE: &str = "Região Imediata";

fn base_layer() -> LayerSpec {
    LayerSpec::new("sulamerica", Source::BaseMap, 1, Paint::Fill(BASE_MAP_STYLE))
}

fn states_layer() -> LayerSpec {
    LayerSpec::new("estados", Source::States, 2, Paint::Fill(STATES_STYLE))
}

fn border_layer(z: i32) -> LayerSpec {
    LayerSpec::new("border", Source::Border, z, Paint::Fill(BORDER_STYLE))
}

/// First character upper case, the rest lower case
fn capitalize(column: &str) -> String {
    let mut chars = column.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn map_frame() -> Frame {
    Frame::default()
}

impl MapPlan {
    /// Layer table for `request`. Fails if the request lacks the state or
    /// column its kind needs.
    pub fn for_request(request: &MapRequest) -> Result<Self> {
        request.validate()?;
        let plan = match request.kind {
            MapKind::Highlight => {
                let uf = request.require_state()?;
                MapPlan {
                    kind: request.kind,
                    layers: vec![
                        base_layer(),
                        states_layer(),
                        LayerSpec::new(
                            "destaque",
                            Source::Highlight,
                            3,
                            Paint::Fill(HIGHLIGHT_STYLE),
                        ),
                        border_layer(4),
                    ],
                    viewport: ViewportRule::StatesExtent { margin: 0.05 },
                    frame: Frame {
                        figure_bg: palette::OCEAN,
                        axes_bg: palette::OCEAN,
                        title_color: palette::WHITE,
                    },
                    title: format!("Destaque para o estado de {}", uf),
                }
            }
            MapKind::Zoom => {
                let uf = request.require_state()?;
                MapPlan {
                    kind: request.kind,
                    layers: vec![
                        base_layer(),
                        states_layer(),
                        LayerSpec::new(
                            keys::MUNICIPIOS,
                            Source::Dataset(keys::MUNICIPIOS),
                            3,
                            Paint::Fill(MUNICIPALITY_STYLE),
                        ),
                        border_layer(4),
                    ],
                    viewport: ViewportRule::Mask { margin: 0.10 },
                    frame: map_frame(),
                    title: format!("Municípios de {}", uf),
                }
            }
            MapKind::MunicipalityChoropleth => {
                let uf = request.require_state()?;
                let column = request.require_column()?;
                MapPlan {
                    kind: request.kind,
                    layers: vec![
                        base_layer(),
                        states_layer(),
                        LayerSpec::new(
                            keys::MUNICIPIOS,
                            Source::Dataset(keys::MUNICIPIOS),
                            3,
                            Paint::Choropleth {
                                cmap: ColorMap::Viridis,
                                edge: CHOROPLETH_EDGE,
                            },
                        ),
                        border_layer(4),
                    ],
                    viewport: ViewportRule::Mask { margin: 0.10 },
                    frame: map_frame(),
                    title: format!(
                        "Mapa Coroplético de '{}' para {}",
                        capitalize(column),
                        uf
                    ),
                }
            }
            MapKind::StateChoropleth => {
                let column = request.require_column()?;
                MapPlan {
                    kind: request.kind,
                    layers: vec![
                        base_layer(),
                        LayerSpec::new(
                            "estados",
                            Source::States,
                            2,
                            Paint::Choropleth {
                                cmap: ColorMap::Plasma,
                                edge: LayerStyle::outline(palette::WHITE, 0.5),
                            },
                        ),
                    ],
                    viewport: ViewportRule::StatesExtent { margin: 0.05 },
                    frame: map_frame(),
                    title: format!("Mapa Coroplético dos Estados por '{}'", capitalize(column)),
                }
            }
            MapKind::RegionalDivision => {
                let uf = request.require_state()?;
                MapPlan {
                    kind: request.kind,
                    layers: vec![
                        base_layer(),
                        states_layer(),
                        LayerSpec::new(
                            "destaque",
                            Source::Highlight,
                            3,
                            Paint::Fill(HIGHLIGHT_STYLE),
                        ),
                        LayerSpec::new(
                            keys::MUNICIPIOS,
                            Source::Dataset(keys::MUNICIPIOS),
                            4,
                            Paint::Fill(COVERAGE_STYLE),
                        )
                        .optional(COVERAGE_FALLBACK),
                        LayerSpec::new(
                            keys::IMEDIATAS,
                            Source::Dataset(keys::IMEDIATAS),
                            5,
                            Paint::Fill(LayerStyle::outline(palette::IMMEDIATE, 1.0)),
                        )
                        .render_empty()
                        .legend(LEGEND_IMMEDIATE)
                        .muted(palette::MUTED),
                        LayerSpec::new(
                            keys::INTERMEDIARIAS,
                            Source::Dataset(keys::INTERMEDIARIAS),
                            5,
                            Paint::Fill(LayerStyle::outline(palette::INTERMEDIATE, 1.8)),
                        )
                        .render_empty()
                        .legend(LEGEND_INTERMEDIATE),
                        border_layer(6),
                    ],
                    viewport: ViewportRule::Mask { margin: 0.05 },
                    frame: map_frame(),
                    title: format!("Divisões Regionais de {}", uf),
                }
            }
            MapKind::ClippedRegion(region) => {
                let uf = request.require_state()?;
                let color = match region {
                    RegionType::Immediate => palette::IMMEDIATE,
                    RegionType::Intermediate => palette::INTERMEDIATE,
                };
                let key = region.dataset_key();
                MapPlan {
                    kind: request.kind,
                    layers: vec![
                        base_layer(),
                        states_layer(),
                        LayerSpec::new(
                            key,
                            Source::Dataset(key),
                            3,
                            Paint::Fill(LayerStyle::outline(color, 1.2)),
                        )
                        .render_empty(),
                        border_layer(4),
                    ],
                    viewport: ViewportRule::Mask { margin: 0.10 },
                    frame: map_frame(),
                    title: format!("Regiões {} de {}", region.title_word(), uf),
                }
            }
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Per-state plans must end with the state border alone at the highest
    /// z-order; layers must be listed in non-decreasing z.
    pub fn validate(&self) -> Result<()> {
        if self.layers.windows(2).any(|w| w[0].z > w[1].z) {
            return Err(MapError::InvalidRequest(format!(
                "{} plan lists layers out of z-order",
                self.kind
            )));
        }
        if !self.kind.needs_state() {
            return Ok(());
        }
        let Some(last) = self.layers.last() else {
            return Err(MapError::InvalidRequest(format!("{} plan has no layers", self.kind)));
        };
        let border_on_top = last.source == Source::Border
            && self.layers[..self.layers.len() - 1]
                .iter()
                .all(|l| l.z < last.z);
        if !border_on_top {
            return Err(MapError::InvalidRequest(format!(
                "{} plan must paint the state border last",
                self.kind
            )));
        }
        Ok(())
    }

    /// Whether a state mask must be derived
    pub fn needs_mask(&self) -> bool {
        matches!(self.viewport, ViewportRule::Mask { .. })
            || self.layers.iter().any(|l| {
                matches!(
                    l.source,
                    Source::Highlight | Source::Border | Source::Dataset(_)
                )
            })
    }

    /// Dataset keys whose files must exist before anything is loaded
    pub fn required_keys(&self) -> Vec<&'static str> {
        let mut required: Vec<&'static str> = Vec::new();
        for layer in &self.layers {
            if layer.presence != Presence::Required {
                continue;
            }
            if let Some(key) = layer.dataset_key() {
                if !required.contains(&key) {
                    required.push(key);
                }
            }
        }
        required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::paths::PathBundle;
    use crate::geometric::mask::StateCode;

    fn pe() -> StateCode {
        StateCode::parse("PE").unwrap()
    }

    fn all_requests() -> Vec<MapRequest> {
        let paths = PathBundle::new();
        vec![
            MapRequest::highlight(pe(), paths.clone()),
            MapRequest::zoom(pe(), paths.clone()),
            MapRequest::municipality_choropleth(pe(), "population", paths.clone()),
            MapRequest::state_choropleth("population", paths.clone()),
            MapRequest::regional_division(pe(), paths.clone()),
            MapRequest::clipped_region(pe(), RegionType::Immediate, paths.clone()),
            MapRequest::clipped_region(pe(), RegionType::Intermediate, paths),
        ]
    }

    #[test]
    fn test_every_plan_is_valid() {
        for request in all_requests() {
            let plan = MapPlan::for_request(&request).unwrap();
            assert_eq!(plan.layers[0].source, Source::BaseMap);
            assert_eq!(plan.layers[0].z, 1);
        }
    }

    #[test]
    fn test_per_state_plans_end_with_border() {
        for request in all_requests().into_iter().filter(|r| r.kind.needs_state()) {
            let plan = MapPlan::for_request(&request).unwrap();
            let last = plan.layers.last().unwrap();
            assert_eq!(last.source, Source::Border);
            let max_other = plan.layers[..plan.layers.len() - 1].iter().map(|l| l.z).max().unwrap();
            assert!(last.z > max_other, "{}", plan.kind);
        }
    }

    #[test]
    fn test_validate_rejects_border_tie() {
        let mut plan = MapPlan::for_request(&MapRequest::zoom(pe(), PathBundle::new())).unwrap();
        plan.layers.last_mut().unwrap().z = 3;
        assert!(plan.validate().is_err());

        let mut plan = MapPlan::for_request(&MapRequest::zoom(pe(), PathBundle::new())).unwrap();
        plan.layers.pop();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_margins_and_titles() {
        let regional = MapPlan::for_request(&MapRequest::regional_division(pe(), PathBundle::new()))
            .unwrap();
        assert_eq!(regional.viewport, ViewportRule::Mask { margin: 0.05 });
        assert_eq!(regional.title, "Divisões Regionais de PE");

        let zoom = MapPlan::for_request(&MapRequest::zoom(pe(), PathBundle::new())).unwrap();
        assert_eq!(zoom.viewport, ViewportRule::Mask { margin: 0.10 });
        assert_eq!(zoom.title, "Municípios de PE");

        let clipped = MapPlan::for_request(&MapRequest::clipped_region(
            pe(),
            RegionType::Intermediate,
            PathBundle::new(),
        ))
        .unwrap();
        assert_eq!(clipped.title, "Regiões Intermediarias de PE");
    }

    #[test]
    fn test_choropleth_titles_capitalize_column() {
        let municipal = MapPlan::for_request(&MapRequest::municipality_choropleth(
            pe(),
            "population",
            PathBundle::new(),
        ))
        .unwrap();
        assert_eq!(municipal.title, "Mapa Coroplético de 'Population' para PE");

        let request = MapRequest::state_choropleth("PIB_per_capita", PathBundle::new());
        let national = MapPlan::for_request(&request).unwrap();
        assert_eq!(national.title, "Mapa Coroplético dos Estados por 'Pib_per_capita'");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_regional_paints_highlight_under_coverage() {
        let plan = MapPlan::for_request(&MapRequest::regional_division(pe(), PathBundle::new()))
            .unwrap();
        let highlight = plan.layers.iter().find(|l| l.source == Source::Highlight).unwrap();
        let coverage = plan.layers.iter().find(|l| l.name == keys::MUNICIPIOS).unwrap();
        assert_eq!(highlight.paint, Paint::Fill(HIGHLIGHT_STYLE));
        assert!(highlight.z < coverage.z);
    }

    #[test]
    fn test_required_keys() {
        let regional = MapPlan::for_request(&MapRequest::regional_division(pe(), PathBundle::new()))
            .unwrap();
        assert_eq!(
            regional.required_keys(),
            vec![keys::ESTADOS, keys::IMEDIATAS, keys::INTERMEDIARIAS]
        );
        let national =
            MapPlan::for_request(&MapRequest::state_choropleth("pop", PathBundle::new())).unwrap();
        assert_eq!(national.required_keys(), vec![keys::ESTADOS]);
        assert!(!national.needs_mask());
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let request = MapRequest::new(MapKind::MunicipalityChoropleth, PathBundle::new())
            .with_state(pe());
        assert!(MapPlan::for_request(&request).is_err());
    }
}
