//! Full report for one state: highlight, municipality zoom and
//! municipality choropleth, each produced independently.

use log::info;
use std::path::{Path, PathBuf};

use crate::collect::paths::{keys, PathBundle};
use crate::error::Result;
use crate::geometric::mask::StateCode;
use crate::maps::{output_file_name, MapDriver, MapKind, MapOutcome, MapRequest};

/// Maps in a state report, in production order
pub const REPORT_KINDS: [MapKind; 3] = [
    MapKind::Highlight,
    MapKind::Zoom,
    MapKind::MunicipalityChoropleth,
];

/// Result of one map of a report
#[derive(Debug)]
pub struct ReportEntry {
    pub kind: MapKind,
    pub output: PathBuf,
    pub result: Result<MapOutcome>,
}

impl ReportEntry {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Generate every map of [`REPORT_KINDS`] for `state` into `output_dir`.
/// A failing map is recorded and the next one still runs.
pub fn run_state_report(
    driver: &MapDriver<'_>,
    state: &StateCode,
    column: &str,
    inputs: &PathBundle,
    output_dir: &Path,
) -> Vec<ReportEntry> {
    let mut entries = Vec::with_capacity(REPORT_KINDS.len());
    for kind in REPORT_KINDS {
        let output = match output_file_name(kind, Some(state), Some(column)) {
            Ok(name) => output_dir.join(name),
            Err(e) => {
                entries.push(ReportEntry {
                    kind,
                    output: PathBuf::new(),
                    result: Err(e),
                });
                continue;
            }
        };
        let mut request = MapRequest::new(kind, inputs.clone().with(keys::SAIDA, output.clone()))
            .with_state(state.clone());
        if kind.needs_column() {
            request = request.with_column(column);
        }
        let result = driver.run(&request);
        entries.push(ReportEntry {
            kind,
            output,
            result,
        });
    }

    let done = entries.iter().filter(|e| e.succeeded()).count();
    info!(
        "Report for {}: {} of {} maps generated",
        state,
        done,
        entries.len()
    );
    entries
}
