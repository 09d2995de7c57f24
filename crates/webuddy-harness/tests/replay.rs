//! Replays the bundled scenarios and checks the traces they produce.

use pretty_assertions::assert_eq;
use webuddy_harness::{Event, Scenario, TraceLine, TraceOp, replay};

const SCROLL_TELEPORT: &str = include_str!("../scenarios/scroll_teleport.json");
const WELCOME_PREVIEW: &str = include_str!("../scenarios/welcome_preview.json");

fn ops(lines: &[TraceLine]) -> Vec<(u64, &TraceOp)> {
    lines
        .iter()
        .filter_map(|line| line.op.as_ref().map(|op| (line.at_ms, op)))
        .collect()
}

fn spoken(lines: &[TraceLine]) -> Vec<(u64, &str)> {
    ops(lines)
        .into_iter()
        .filter_map(|(at, op)| match op {
            TraceOp::ShowBubble { text } => Some((at, text.as_str())),
            _ => None,
        })
        .collect()
}

fn teleport_cues(lines: &[TraceLine]) -> Vec<(u64, &'static str)> {
    ops(lines)
        .into_iter()
        .filter_map(|(at, op)| match op {
            TraceOp::Teleport { cue, .. } => Some((at, *cue)),
            _ => None,
        })
        .collect()
}

#[test]
fn scroll_scenario_teleports_once() {
    let scenario = Scenario::from_json(SCROLL_TELEPORT).unwrap();
    let trace = replay(&scenario);

    assert_eq!(ops(&trace).first().map(|(at, op)| (*at, *op)), Some((0, &TraceOp::Mount)));
    assert_eq!(spoken(&trace).first(), Some(&(1000, "Plans start small.")));
    assert_eq!(
        teleport_cues(&trace),
        vec![(9000, "vanish"), (9400, "relocate"), (9450, "reappear"), (9850, "settle")]
    );

    let relocated = ops(&trace).into_iter().find_map(|(_, op)| match op {
        TraceOp::Teleport {
            cue: "relocate",
            top: Some(top),
            ..
        } => Some(*top),
        _ => None,
    });
    let top = relocated.unwrap();
    assert!((2400.0..3200.0).contains(&top), "relocated to {top}");
}

#[test]
fn hover_during_cooldown_stays_quiet() {
    let scenario = Scenario::from_json(SCROLL_TELEPORT).unwrap();
    let trace = replay(&scenario);
    assert!(spoken(&trace).iter().all(|(at, _)| *at != 2500));
    assert!(!spoken(&trace).iter().any(|(_, text)| *text == "Good choice!"));
}

#[test]
fn destroy_ends_the_trace() {
    let scenario = Scenario::from_json(SCROLL_TELEPORT).unwrap();
    let trace = replay(&scenario);
    let last = trace.last().unwrap();
    assert_eq!(last.at_ms, 30_000);
    assert_eq!(last.input, Some(Event::Destroy));
}

#[test]
fn preview_scenario_surfaces_selector_problems_and_never_teleports() {
    let scenario = Scenario::from_json(WELCOME_PREVIEW).unwrap();
    let trace = replay(&scenario);

    let logs: Vec<_> = ops(&trace)
        .into_iter()
        .filter_map(|(_, op)| match op {
            TraceOp::Log { level, message } => Some((*level, message.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        logs,
        vec![
            ("error", r##"Automation Error: Invalid CSS Selector "#cart >>""##),
            ("warn", r#"Automation Warning: CSS Selector ".missing" did not find any elements."#),
        ]
    );
    assert!(teleport_cues(&trace).is_empty());

    let lines: Vec<_> = spoken(&trace).into_iter().map(|(_, text)| text).collect();
    assert_eq!(&lines[..2], ["Hi there!", "I live on this page now."]);
}

#[test]
fn missing_parent_is_logged_like_the_browser_would() {
    let scenario = Scenario::from_json(r#"{"page": {"has_parent": false}}"#).unwrap();
    let trace = replay(&scenario);
    assert_eq!(
        ops(&trace),
        vec![(
            0,
            &TraceOp::Log {
                level: "error",
                message: "Webuddy cannot be initialized because the target element is not found."
                    .into()
            }
        )]
    );
}

#[test]
fn same_scenario_same_trace() {
    let scenario = Scenario::from_json(SCROLL_TELEPORT).unwrap();
    assert_eq!(replay(&scenario), replay(&scenario));
}

#[test]
fn unknown_fields_are_rejected() {
    assert!(Scenario::from_json(r#"{"steps": [], "speed": 2}"#).is_err());
}
