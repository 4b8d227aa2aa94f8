//! Health merge engine.
//!
//! Folds the readings of every child in a merge set into a single
//! [`MergedOutput`]: the worst severity present, whether anything is
//! reporting at all, and the status texts of the children responsible.
//!
//! # Example
//! ```
//! use health_merge::health::{evaluate, ChildReading, SeverityLevel};
//!
//! let output = evaluate(&[
//!     ChildReading::new("sensor.battery", SeverityLevel::Warn).with_status("low battery"),
//!     ChildReading::new("sensor.disk", SeverityLevel::Critical).with_status("disk full"),
//! ]);
//! assert_eq!(output.severity(), Some(SeverityLevel::Critical));
//! assert_eq!(output.status_text(), Some("disk full"));
//! ```

use super::reading::ChildReading;
use super::severity::{STATE_UNAVAILABLE, SeverityLevel};

/// Status text reported when no child has a problem.
pub const NO_PROBLEM_TEXT: &str = "no problems detected";

/// A configured group of child sensors merged into one device health value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeSet {
    id: String,
    friendly_name: String,
    children: Vec<String>,
}

impl MergeSet {
    /// Create a merge set. The friendly name defaults to the id.
    pub fn new(
        id: impl Into<String>,
        friendly_name: Option<String>,
        children: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let id = id.into();
        Self {
            friendly_name: friendly_name.unwrap_or_else(|| id.clone()),
            id,
            children: children.into_iter().map(Into::into).collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Child ids in configured order, duplicates included.
    pub fn children(&self) -> &[String] {
        &self.children
    }
}

/// Result of merging one set of readings.
///
/// `severity` is only present while at least one child is available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedOutput {
    severity: Option<SeverityLevel>,
    status_text: Option<String>,
}

impl MergedOutput {
    /// Output for a set with no available children.
    pub fn unavailable() -> Self {
        Self {
            severity: None,
            status_text: None,
        }
    }

    pub fn available(&self) -> bool {
        self.severity.is_some()
    }

    pub fn severity(&self) -> Option<SeverityLevel> {
        self.severity
    }

    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    /// Literal exposed to observers: a severity literal or `"unavailable"`.
    pub fn state_str(&self) -> &'static str {
        match self.severity {
            Some(level) => level.as_str(),
            None => STATE_UNAVAILABLE,
        }
    }
}

/// Merges child readings using a configurable good-state marker.
#[derive(Clone, Debug)]
pub struct MergeEngine {
    no_problem_text: String,
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self {
            no_problem_text: NO_PROBLEM_TEXT.to_string(),
        }
    }
}

impl MergeEngine {
    pub fn with_no_problem_text(text: impl Into<String>) -> Self {
        Self {
            no_problem_text: text.into(),
        }
    }

    pub fn no_problem_text(&self) -> &str {
        &self.no_problem_text
    }

    /// Merge `readings` into a single output. Pure and total.
    ///
    /// Problem levels are checked worst first; the first level with any
    /// matching reading wins and contributes its readings' status texts,
    /// joined with `\n` in input order. With no problem present the result
    /// is `Good` carrying the no-problem marker.
    pub fn evaluate(&self, readings: &[ChildReading]) -> MergedOutput {
        if !readings.iter().any(ChildReading::is_available) {
            return MergedOutput::unavailable();
        }

        for level in SeverityLevel::PROBLEMS {
            let mut matched = readings
                .iter()
                .filter(|reading| reading.level() == Some(level))
                .peekable();
            if matched.peek().is_none() {
                continue;
            }

            let texts: Vec<&str> = matched.filter_map(ChildReading::status).collect();
            return MergedOutput {
                severity: Some(level),
                status_text: (!texts.is_empty()).then(|| texts.join("\n")),
            };
        }

        MergedOutput {
            severity: Some(SeverityLevel::Good),
            status_text: Some(self.no_problem_text.clone()),
        }
    }
}

/// Merge `readings` with the default no-problem marker.
pub fn evaluate(readings: &[ChildReading]) -> MergedOutput {
    MergeEngine::default().evaluate(readings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::severity::ChildState;

    fn reading(id: &str, level: SeverityLevel) -> ChildReading {
        ChildReading::new(id, level)
    }

    #[test]
    fn test_single_good_child() {
        let output = evaluate(&[reading("a", SeverityLevel::Good)]);
        assert!(output.available());
        assert_eq!(output.severity(), Some(SeverityLevel::Good));
        assert_eq!(output.status_text(), Some("no problems detected"));
    }

    #[test]
    fn test_critical_beats_warn() {
        let output = evaluate(&[
            reading("a", SeverityLevel::Warn).with_status("low battery"),
            reading("b", SeverityLevel::Critical).with_status("disk full"),
        ]);
        assert_eq!(output.severity(), Some(SeverityLevel::Critical));
        assert_eq!(output.status_text(), Some("disk full"));
    }

    #[test]
    fn test_same_level_texts_joined_in_order() {
        let output = evaluate(&[
            reading("a", SeverityLevel::Bad).with_status("x"),
            reading("b", SeverityLevel::Bad).with_status("y"),
        ]);
        assert_eq!(output.severity(), Some(SeverityLevel::Bad));
        assert_eq!(output.status_text(), Some("x\ny"));
    }

    #[test]
    fn test_only_unavailable_child() {
        let output = evaluate(&[ChildReading::unavailable("a")]);
        assert!(!output.available());
        assert_eq!(output.severity(), None);
        assert_eq!(output.status_text(), None);
        assert_eq!(output.state_str(), "unavailable");
    }

    #[test]
    fn test_unavailable_and_good() {
        let output = evaluate(&[
            ChildReading::unavailable("a"),
            reading("b", SeverityLevel::Good),
        ]);
        assert!(output.available());
        assert_eq!(output.severity(), Some(SeverityLevel::Good));
        assert_eq!(output.status_text(), Some("no problems detected"));
    }

    #[test]
    fn test_empty_input_is_unavailable() {
        assert_eq!(evaluate(&[]), MergedOutput::unavailable());
    }

    #[test]
    fn test_critical_always_wins() {
        let others = [
            SeverityLevel::Good,
            SeverityLevel::Warn,
            SeverityLevel::Bad,
        ];
        for position in 0..=others.len() {
            let mut readings: Vec<ChildReading> = others
                .iter()
                .enumerate()
                .map(|(i, level)| reading(&format!("s{i}"), *level))
                .collect();
            readings.insert(position, reading("crit", SeverityLevel::Critical));
            assert_eq!(
                evaluate(&readings).severity(),
                Some(SeverityLevel::Critical)
            );
        }
    }

    #[test]
    fn test_result_is_worst_level_present() {
        let levels = [
            SeverityLevel::Good,
            SeverityLevel::Warn,
            SeverityLevel::Bad,
            SeverityLevel::Critical,
        ];
        // Every non-empty subset of the four levels.
        for mask in 1u8..16 {
            let present: Vec<SeverityLevel> = levels
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, level)| *level)
                .collect();
            let readings: Vec<ChildReading> = present
                .iter()
                .map(|level| reading(level.as_str(), *level))
                .collect();
            let worst = present.iter().max().copied();
            assert_eq!(evaluate(&readings).severity(), worst, "mask {mask:04b}");
        }
    }

    #[test]
    fn test_availability_ignores_severity() {
        for state in [
            ChildState::Level(SeverityLevel::Good),
            ChildState::Level(SeverityLevel::Critical),
            ChildState::Unrecognized("unknown".to_string()),
        ] {
            let output = evaluate(&[
                ChildReading::unavailable("a"),
                ChildReading::new("b", state),
            ]);
            assert!(output.available());
        }
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let readings = vec![
            reading("a", SeverityLevel::Warn).with_status("low battery"),
            reading("b", SeverityLevel::Warn).with_status("weak signal"),
            ChildReading::unavailable("c"),
        ];
        assert_eq!(evaluate(&readings), evaluate(&readings));
    }

    #[test]
    fn test_empty_and_missing_texts_skipped() {
        let output = evaluate(&[
            reading("a", SeverityLevel::Warn).with_status("first"),
            reading("b", SeverityLevel::Warn),
            reading("c", SeverityLevel::Warn).with_status(""),
            reading("d", SeverityLevel::Warn).with_status("last"),
        ]);
        assert_eq!(output.status_text(), Some("first\nlast"));
    }

    #[test]
    fn test_problem_without_text_has_no_status() {
        let output = evaluate(&[
            reading("a", SeverityLevel::Bad),
            reading("b", SeverityLevel::Warn).with_status("ignored"),
        ]);
        assert_eq!(output.severity(), Some(SeverityLevel::Bad));
        assert_eq!(output.status_text(), None);
    }

    #[test]
    fn test_good_never_reports_child_text() {
        let output = evaluate(&[
            reading("a", SeverityLevel::Good).with_status("all fine here"),
            reading("b", SeverityLevel::Good),
        ]);
        assert_eq!(output.status_text(), Some(NO_PROBLEM_TEXT));
    }

    #[test]
    fn test_unrecognized_state_is_ignored_for_severity() {
        let output = evaluate(&[
            ChildReading::new("a", ChildState::Unrecognized("unknown".to_string()))
                .with_status("still booting"),
        ]);
        assert!(output.available());
        assert_eq!(output.severity(), Some(SeverityLevel::Good));
        assert_eq!(output.status_text(), Some(NO_PROBLEM_TEXT));

        let output = evaluate(&[
            ChildReading::new("a", ChildState::parse("degraded")),
            reading("b", SeverityLevel::Warn).with_status("low battery"),
        ]);
        assert_eq!(output.severity(), Some(SeverityLevel::Warn));
        assert_eq!(output.status_text(), Some("low battery"));
    }

    #[test]
    fn test_duplicate_children_join_twice() {
        let dup = reading("a", SeverityLevel::Bad).with_status("fan stalled");
        let output = evaluate(&[dup.clone(), dup]);
        assert_eq!(output.status_text(), Some("fan stalled\nfan stalled"));
    }

    #[test]
    fn test_configured_no_problem_text() {
        let engine = MergeEngine::with_no_problem_text("all good");
        let output = engine.evaluate(&[reading("a", SeverityLevel::Good)]);
        assert_eq!(output.status_text(), Some("all good"));
    }

    #[test]
    fn test_merge_set_defaults_friendly_name() {
        let set = MergeSet::new("nas", None, ["sensor.disk", "sensor.fan"]);
        assert_eq!(set.friendly_name(), "nas");
        assert_eq!(set.children().len(), 2);

        let set = MergeSet::new("nas", Some("Storage".to_string()), Vec::<String>::new());
        assert_eq!(set.friendly_name(), "Storage");
    }
}
