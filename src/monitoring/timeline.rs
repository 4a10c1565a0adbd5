//! Execution Timeline
//!
//! Tracks step start/end times within a run for timing reports and
//! Gantt charts. Steps are keyed by their position in the scenario, so
//! repeated step names stay distinct.

use std::time::Instant;

use serde::Serialize;

/// Type of timeline event.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Step started executing
    Started,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
}

/// A single event in the execution timeline.
#[derive(Serialize, Debug, Clone)]
pub struct TimelineEvent {
    /// Zero-based position of the step in its scenario
    pub step_index: usize,
    /// Display name of the step
    pub step_name: String,
    /// Type of event
    pub event_type: EventType,
    /// Milliseconds since the timeline started
    pub offset_ms: u128,
}

/// Wall-clock duration of one step.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StepDuration {
    pub step_index: usize,
    pub step_name: String,
    pub duration_ms: u128,
}

/// Tracks the execution timeline of a run.
#[derive(Serialize, Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    #[serde(skip)]
    start_time: Instant,
    total_ms: Option<u128>,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
            total_ms: None,
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step_index: usize, step_name: &str, event_type: EventType) {
        self.events.push(TimelineEvent {
            step_index,
            step_name: step_name.to_string(),
            event_type,
            offset_ms: self.start_time.elapsed().as_millis(),
        });
    }

    /// Freezes the total duration. Later calls are ignored.
    pub fn finish(&mut self) {
        if self.total_ms.is_none() {
            self.total_ms = Some(self.start_time.elapsed().as_millis());
        }
    }

    /// Returns all recorded events.
    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Total duration in ms: frozen if finished, otherwise elapsed so far.
    pub fn total_ms(&self) -> u128 {
        self.total_ms
            .unwrap_or_else(|| self.start_time.elapsed().as_millis())
    }

    /// Returns step durations in step order.
    ///
    /// Steps that started but never finished are left out.
    pub fn get_durations(&self) -> Vec<StepDuration> {
        let mut durations: Vec<StepDuration> = Vec::new();
        let mut open: Vec<(usize, u128)> = Vec::new();

        for event in &self.events {
            match event.event_type {
                EventType::Started => open.push((event.step_index, event.offset_ms)),
                EventType::Completed | EventType::Failed => {
                    if let Some(pos) = open.iter().position(|(i, _)| *i == event.step_index) {
                        let (_, start) = open.remove(pos);
                        durations.push(StepDuration {
                            step_index: event.step_index,
                            step_name: event.step_name.clone(),
                            duration_ms: event.offset_ms.saturating_sub(start),
                        });
                    }
                }
            }
        }

        durations.sort_by_key(|d| d.step_index);
        durations
    }

    /// Generates an ASCII Gantt chart representation.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.total_ms();
        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        let starts: Vec<(usize, u128)> = self
            .events
            .iter()
            .filter(|e| e.event_type == EventType::Started)
            .map(|e| (e.step_index, e.offset_ms))
            .collect();

        for duration in self.get_durations() {
            let Some(&(_, start)) = starts.iter().find(|(i, _)| *i == duration.step_index) else {
                continue;
            };

            let start_pos = (start as f64 * scale) as usize;
            let width = (duration.duration_ms as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            output.push_str(&format!(
                "{:2}. {} |{}| ({} ms)\n",
                duration.step_index + 1,
                truncate(&duration.step_name, 20),
                bar,
                duration.duration_ms
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a string to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.events.is_empty());
    }

    #[test]
    fn test_get_durations() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event(0, "Discover", EventType::Started);
        thread::sleep(Duration::from_millis(50));
        timeline.add_event(0, "Discover", EventType::Completed);

        let durations = timeline.get_durations();
        assert_eq!(durations.len(), 1);
        assert!(durations[0].duration_ms >= 50);
    }

    #[test]
    fn test_repeated_names_stay_distinct() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event(0, "Scan", EventType::Started);
        timeline.add_event(0, "Scan", EventType::Completed);
        timeline.add_event(1, "Scan", EventType::Started);
        timeline.add_event(1, "Scan", EventType::Failed);

        let durations = timeline.get_durations();
        assert_eq!(durations.len(), 2);
        assert_eq!(durations[1].step_index, 1);
    }

    #[test]
    fn test_get_durations_only_started() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event(0, "Discover", EventType::Started);
        assert!(timeline.get_durations().is_empty());
    }

    #[test]
    fn test_finish_freezes_total() {
        let mut timeline = ExecutionTimeline::new();
        thread::sleep(Duration::from_millis(20));
        timeline.finish();
        let frozen = timeline.total_ms();

        thread::sleep(Duration::from_millis(20));
        timeline.finish();
        assert_eq!(timeline.total_ms(), frozen);
        assert!(frozen >= 20);
    }

    #[test]
    fn test_gantt_chart_generation() {
        let mut timeline = ExecutionTimeline::new();

        timeline.add_event(0, "Discover", EventType::Started);
        thread::sleep(Duration::from_millis(50));
        timeline.add_event(0, "Discover", EventType::Completed);

        timeline.add_event(1, "Analyse", EventType::Started);
        thread::sleep(Duration::from_millis(50));
        timeline.add_event(1, "Analyse", EventType::Failed);
        timeline.finish();

        let chart = timeline.gantt_chart();
        assert!(chart.contains("Discover"));
        assert!(chart.contains("Analyse"));
        assert!(chart.contains("Total:"));
    }

    #[test]
    fn test_gantt_chart_empty() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.gantt_chart().contains("Timeline"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc  ");
        assert_eq!(truncate("Credential Harvest Stage", 10), "Credent...");
    }
}
