use proptest::prelude::*;
use qua_model::{ChartData, ChartTimeline, HitObjectInfo, TempoMap, TempoSegment};

fn tempo_strategy() -> impl Strategy<Value = Vec<TempoSegment>> {
    prop::collection::vec((10.0f64..5000.0, 30.0f64..400.0), 1..8).prop_map(|raw| {
        let mut start = 0.0;
        raw.into_iter()
            .map(|(gap, bpm)| {
                let seg = TempoSegment::new(start, bpm);
                start += gap;
                seg
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn position_is_monotonic(tempo in tempo_strategy(), a in -2000.0f64..40000.0, b in -2000.0f64..40000.0) {
        let map = TempoMap::new(tempo).unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(map.time_to_position(lo) <= map.time_to_position(hi));
    }

    #[test]
    fn position_is_continuous_at_boundaries(tempo in tempo_strategy()) {
        let map = TempoMap::new(tempo).unwrap();
        for seg in map.segments().iter().skip(1) {
            let before = map.time_to_position(seg.start_time - 1e-6);
            let at = map.time_to_position(seg.start_time);
            prop_assert!((at - before).abs() < 1e-3, "jump at {}: {} -> {}", seg.start_time, before, at);
        }
    }

    #[test]
    fn timing_lines_are_ordered(tempo in tempo_strategy(), length in 0.0f64..30000.0) {
        let data = ChartData {
            key_count: 4,
            length: Some(length),
            tempo,
            hit_objects: Vec::new(),
        };
        let timeline = ChartTimeline::new(data).unwrap();
        let lines = timeline.timing_lines();
        prop_assert!(!lines.is_empty());
        for pair in lines.windows(2) {
            prop_assert!(pair[0].time < pair[1].time);
            prop_assert!(pair[0].position <= pair[1].position);
        }
    }

    #[test]
    fn objects_come_out_sorted(starts in prop::collection::vec(0.0f64..60000.0, 0..64)) {
        let hit_objects = starts
            .iter()
            .enumerate()
            .map(|(i, &t)| HitObjectInfo::tap(i % 7 + 1, t))
            .collect();
        let data = ChartData {
            key_count: 7,
            length: None,
            tempo: vec![TempoSegment::new(0.0, 150.0)],
            hit_objects,
        };
        let timeline = ChartTimeline::new(data).unwrap();
        for pair in timeline.hit_objects().windows(2) {
            prop_assert!(pair[0].start_time <= pair[1].start_time);
        }
    }
}

#[test]
fn test_tempo_change_mid_chart() {
    let data = ChartData {
        key_count: 4,
        length: None,
        tempo: vec![
            TempoSegment::new(0.0, 120.0),
            TempoSegment::new(4000.0, 60.0),
        ],
        hit_objects: vec![
            HitObjectInfo::tap(1, 2000.0),
            HitObjectInfo::tap(2, 8000.0),
        ],
    };
    let timeline = ChartTimeline::new(data).unwrap();

    // At 60 BPM the track scrolls at half speed: 4000ms later is only 2000 units on.
    let pos = timeline.time_to_position(8000.0);
    assert!((pos - 6000.0).abs() < 0.001, "expected 6000, got {pos}");

    let times: Vec<f64> = timeline.timing_lines().iter().map(|l| l.time).collect();
    assert_eq!(times, vec![0.0, 2000.0, 4000.0, 8000.0]);
}

#[test]
fn test_empty_chart_is_valid() {
    let data = ChartData {
        key_count: 4,
        length: None,
        tempo: vec![TempoSegment::new(0.0, 120.0)],
        hit_objects: Vec::new(),
    };
    let timeline = ChartTimeline::new(data).unwrap();
    assert_eq!(timeline.judgment_target_count(), 0);
    assert_eq!(timeline.last_object_time(), None);
    assert_eq!(timeline.timing_lines().len(), 1);
}
