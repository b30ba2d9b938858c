/// Where downloaded datasets and generated maps land by default
pub const OUTPUT_PATH: &str = "./output";
/// Where static reference data (the South America base layer) lives
pub const SHARED_PATH: &str = "./shared";

pub const STATES_FILE: &str = "1-complete-data-states.geojson";
pub const IMMEDIATE_REGIONS_FILE: &str = "3-immediate-regions.geojson";
pub const INTERMEDIATE_REGIONS_FILE: &str = "4-intermediate-regions.geojson";
pub const SOUTH_AMERICA_FILE: &str = "south_america.geojson";

/// Per-state municipality mesh, e.g. `2-complete-data-municipalities-pe.geojson`
pub fn municipalities_file(state: &str) -> String {
    format!(
        "2-complete-data-municipalities-{}.geojson",
        state.to_ascii_lowercase()
    )
}
