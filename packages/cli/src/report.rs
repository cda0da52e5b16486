//! Rendering of the engine outputs for the terminal.

use incident_map_analytics_models::{AffectedTypeEntry, ScaleLevel, ShownGroup};
use incident_map_cli_utils::format_number;
use serde::Serialize;

/// Snapshot of the engine outputs after the requested scale and filter
/// were applied.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub scale_level: ScaleLevel,
    pub effective_scale: ScaleLevel,
    pub affected_types: Vec<AffectedTypeEntry>,
    pub shown_groups: Vec<ShownGroup>,
    pub individual_event_count: usize,
}

impl Report {
    /// Plain-text rendering with grouped thousands.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        if self.effective_scale == self.scale_level {
            out.push_str(&format!("Scale: {}\n", self.scale_level));
        } else {
            out.push_str(&format!(
                "Scale: {} (showing {})\n",
                self.scale_level, self.effective_scale
            ));
        }

        out.push_str("\nAffected types:\n");
        for entry in &self.affected_types {
            out.push_str(&format!(
                "  {:>6}  {}\n",
                entry.affected_type,
                entry.name.as_deref().unwrap_or("-")
            ));
        }

        out.push_str(&format!("\nGroups ({}):\n", format_number(count(self.shown_groups.len()))));
        for group in &self.shown_groups {
            out.push_str(&format!(
                "  {:>9.4} {:>9.4}  type {:<6} {:>12}\n",
                group.lat,
                group.lon,
                group.incident_type,
                format_number(i64::try_from(group.amount).unwrap_or(i64::MAX))
            ));
        }

        out.push_str(&format!(
            "\nIndividual events: {}\n",
            format_number(count(self.individual_event_count))
        ));

        out
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
