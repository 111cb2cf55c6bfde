use anyhow::Result;
use classwatch::prelude::*;
use classwatch::sinks::MemoryEventSink;
use classwatch::testing::{
    axis_feature, blank_frame, distracted_analysis, focused_analysis, person, phone,
    ScriptedDetector, ScriptedFaces, ScriptedPoseGaze,
};
use std::time::Duration;

/// Runs the whole pipeline over a scripted two-minute classroom scene and prints the
/// resulting analytics as JSON. RUST_LOG=debug shows the tracker's decisions.
fn main() -> Result<()> {
    env_logger::init();

    let mut script = Vec::new();
    for frame in 0_u64..240 {
        let mut d = Detections {
            persons: vec![
                person(100.0, 100.0, 220.0, 380.0, 0.92),
                person(400.0, 120.0, 520.0, 390.0, 0.88),
            ],
            objects: vec![],
        };
        // The second student picks up a phone for a while mid-session.
        if (60..90).contains(&frame) {
            d.objects.push(phone(440.0, 250.0, 470.0, 290.0, 0.75));
        }
        script.push(d);
    }

    let mut gaze_script = Vec::new();
    for frame in 0_u64..240 {
        // Two analyze calls per frame, one per track.
        gaze_script.push(Some(focused_analysis(0.9)));
        gaze_script.push(Some(if (60..120).contains(&frame) {
            distracted_analysis()
        } else {
            focused_analysis(0.8)
        }));
    }

    let catalog_feature = axis_feature(0, 512);
    let events = MemoryEventSink::new();

    let mut pipeline = Pipeline::new(
        MonitorConfig::default(),
        ScriptedDetector::new(script),
        ScriptedFaces::with_feature(catalog_feature.clone(), 0.95),
        ScriptedPoseGaze::scripted(gaze_script, Some(focused_analysis(0.8))),
    )
    .with_event_sink(Box::new(events.clone()));

    pipeline.update_known_students(vec![KnownStudent {
        student_id: "student-001".into(),
        student_name: Some("Ada".into()),
        feature: catalog_feature,
    }]);

    pipeline.initialize()?;
    pipeline.start_session("demo-session")?;

    for i in 0_u64..240 {
        let frame = blank_frame(640, 480, Duration::from_millis(i * 125));
        pipeline.process_frame(&frame)?;
    }

    let analytics = pipeline.stop_session()?;

    for event in events.handle().lock().unwrap().iter() {
        println!("{}", serde_json::to_string(event)?);
    }
    println!("{}", serde_json::to_string_pretty(&analytics)?);
    Ok(())
}
