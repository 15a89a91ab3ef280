use serde::{Deserialize, Serialize};

/// A hit object as authored in the chart: a tap or a long (hold) note.
///
/// Start/end/lane are fixed once the chart is loaded; lifecycle state lives
/// with the gameplay pool, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitObjectInfo {
    /// Lane index (1-indexed).
    pub lane: usize,
    /// Start time in milliseconds.
    pub start_time: f64,
    /// End time in milliseconds. Present iff the object is a hold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

impl HitObjectInfo {
    pub fn tap(lane: usize, start_time: f64) -> Self {
        Self {
            lane,
            start_time,
            end_time: None,
        }
    }

    pub fn hold(lane: usize, start_time: f64, end_time: f64) -> Self {
        Self {
            lane,
            start_time,
            end_time: Some(end_time),
        }
    }

    /// Whether this object is a long note.
    pub fn is_hold(&self) -> bool {
        self.end_time.is_some()
    }

    /// End time for holds, start time for taps.
    pub fn last_time(&self) -> f64 {
        self.end_time.unwrap_or(self.start_time)
    }

    /// Number of judgments this object produces (head, plus tail for holds).
    pub fn judgment_count(&self) -> usize {
        if self.is_hold() { 2 } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_has_no_end() {
        let obj = HitObjectInfo::tap(1, 1000.0);
        assert!(!obj.is_hold());
        assert_eq!(obj.last_time(), 1000.0);
        assert_eq!(obj.judgment_count(), 1);
    }

    #[test]
    fn hold_reports_tail() {
        let obj = HitObjectInfo::hold(2, 2000.0, 2500.0);
        assert!(obj.is_hold());
        assert_eq!(obj.last_time(), 2500.0);
        assert_eq!(obj.judgment_count(), 2);
    }

    #[test]
    fn serde_skips_missing_end() {
        let json = serde_json::to_string(&HitObjectInfo::tap(3, 10.0)).unwrap();
        assert!(!json.contains("end_time"));
        let back: HitObjectInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, HitObjectInfo::tap(3, 10.0));
    }
}
