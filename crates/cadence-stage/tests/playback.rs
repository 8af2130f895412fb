use anyhow::Result;

use cadence_core::{Rect, Size};
use cadence_stage::{
    CompositionSpec, DecoratedRule, Easing, EffectRegistry, Gravity, Operand, PlaybackEvent,
    RepeatMode, RepeatSpec, RuleHandle, RuleSection, Sequencer, SequencerState, SizeConstant,
    SizeExpr, Stage, StageElement, Timing, TweenRule,
};

fn build_stage() -> Result<Stage> {
    let mut stage = Stage::new();
    stage.insert(
        StageElement::new("root")
            .with_measured(Size::new(800.0, 600.0))
            .with_frame(Rect::from_edges(0.0, 0.0, 800.0, 600.0)),
        None,
    )?;
    stage.insert(
        StageElement::new("panel")
            .with_measured(Size::new(200.0, 100.0))
            .with_frame(Rect::from_edges(40.0, 40.0, 240.0, 140.0))
            .with_property("opacity", 1.0),
        Some("root"),
    )?;
    stage.insert(
        StageElement::new("badge")
            .with_measured(Size::new(40.0, 40.0))
            .with_frame(Rect::from_edges(700.0, 20.0, 740.0, 60.0)),
        Some("root"),
    )?;
    Ok(stage)
}

fn linear(duration: f64) -> Timing {
    Timing::new(duration).with_easing(Easing::Linear)
}

fn run(seq: &mut Sequencer, stage: &mut Stage, step_ms: f64, max_ticks: usize) {
    for _ in 0..max_ticks {
        if !seq.is_active() {
            break;
        }
        seq.tick(stage, step_ms);
    }
}

#[test]
fn plays_multi_section_composition() -> Result<()> {
    let mut stage = build_stage()?;

    let slide = RuleSection::named("slide")
        .with_timing(linear(100.0))
        .with_rule(TweenRule::new(
            "left",
            SizeExpr::of(SizeConstant::ParentWidth).div(2.0),
        ))
        .into_handle();
    let fade = RuleSection::named("fade")
        .with_timing(linear(100.0))
        .with_rule(TweenRule::new("opacity", SizeExpr::of(0.0)).with_gravity(Gravity::Left))
        .into_handle();

    let mut seq = Sequencer::new("panel").with_section(slide).with_section(fade);
    seq.start(&mut stage)?;
    run(&mut seq, &mut stage, 25.0, 30);

    assert_eq!(seq.state(), SequencerState::Ended);
    let panel = stage.get("panel").unwrap();
    assert_eq!(panel.frame().left, 400.0);
    assert_eq!(panel.property("opacity"), Some(0.0));

    let events = seq.drain_events();
    let sections = events
        .iter()
        .filter(|e| matches!(e, PlaybackEvent::SectionChanged { .. }))
        .count();
    assert_eq!(sections, 2);
    assert!(matches!(events.last(), Some(PlaybackEvent::Ended { .. })));
    Ok(())
}

#[test]
fn cross_element_reference_reads_registered_snapshot() -> Result<()> {
    let mut stage = build_stage()?;

    // Register the badge's geometry so other elements can reference it.
    let badge = stage.capture("badge").unwrap();
    stage.register_snapshot("badge", badge);

    let section = RuleSection::new()
        .with_timing(linear(50.0))
        .with_rule(TweenRule::new(
            "left",
            SizeExpr::of(Operand::element("badge", Gravity::Left)).minus(100.0),
        ))
        .into_handle();

    let mut seq = Sequencer::new("panel").with_section(section);
    seq.start(&mut stage)?;
    run(&mut seq, &mut stage, 25.0, 10);

    // badge.left (700) - 100 = 600
    assert_eq!(stage.get("panel").unwrap().frame().left, 600.0);
    Ok(())
}

#[test]
fn unregistered_reference_falls_back_to_identity() -> Result<()> {
    let mut stage = build_stage()?;

    // "ghost" has no registered snapshot: the operand resolves to 1, so the
    // expression quietly becomes 1 * 300 = 300.
    let section = RuleSection::new()
        .with_timing(linear(50.0))
        .with_rule(TweenRule::new(
            "left",
            SizeExpr::of(Operand::element("ghost", Gravity::Left)).times(300.0),
        ))
        .into_handle();

    let mut seq = Sequencer::new("panel").with_section(section);
    seq.start(&mut stage)?;
    run(&mut seq, &mut stage, 25.0, 10);

    assert_eq!(stage.get("panel").unwrap().frame().left, 300.0);
    Ok(())
}

#[test]
fn skip_decorator_leaves_rule_inert() -> Result<()> {
    let mut stage = build_stage()?;

    let moved = RuleHandle::new(TweenRule::new("left", SizeExpr::of(500.0)));
    let skipped = RuleHandle::new(TweenRule::new("top", SizeExpr::of(500.0)));

    let mut section = RuleSection::new().with_timing(linear(50.0));
    section.add_rule(moved);
    section.add_rule(RuleHandle::new(DecoratedRule::skip(skipped)));
    let section = section.into_handle();

    let mut seq = Sequencer::new("panel").with_section(section);
    seq.start(&mut stage)?;
    run(&mut seq, &mut stage, 25.0, 10);

    let panel = stage.get("panel").unwrap();
    assert_eq!(panel.frame().left, 500.0);
    assert_eq!(panel.frame().top, 40.0, "skipped rule applied nothing");
    Ok(())
}

#[test]
fn reverse_alternate_round_trip_restores_geometry() -> Result<()> {
    let mut stage = build_stage()?;

    let section = RuleSection::new()
        .with_timing(linear(80.0))
        .with_rule(TweenRule::new("left", SizeExpr::of(640.0)))
        .with_rule(TweenRule::new("top", SizeExpr::of(10.0)))
        .into_handle();

    let mut seq = Sequencer::new("panel")
        .with_section(section)
        .with_repeat(RepeatSpec::times(2).with_mode(RepeatMode::Reverse));
    seq.start(&mut stage)?;
    run(&mut seq, &mut stage, 20.0, 40);

    assert_eq!(seq.state(), SequencerState::Ended);
    let panel = stage.get("panel").unwrap();
    assert_eq!(panel.frame().left, 40.0);
    assert_eq!(panel.frame().top, 40.0);
    Ok(())
}

#[test]
fn scrub_jumps_to_mid_step_values() -> Result<()> {
    let mut stage = build_stage()?;

    let section = RuleSection::new()
        .with_timing(linear(100.0))
        .with_rule(TweenRule::new("left", SizeExpr::of(240.0)))
        .into_handle();

    let mut seq = Sequencer::new("panel").with_section(section);
    seq.start(&mut stage)?;

    // Jump straight to the middle of the step, then advance a hair to let
    // the driver apply the scrubbed value.
    seq.set_play_time(50.0);
    seq.tick(&mut stage, 0.0);
    let mid = stage.get("panel").unwrap().frame().left;
    assert!((mid - 140.0).abs() < 1e-6, "expected midpoint, got {mid}");
    assert!((seq.play_time() - 50.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn config_defaults_flow_into_timing() -> Result<()> {
    let config = cadence_config::CadenceConfig::default();
    let timing = Timing::from_config(&config.playback);
    assert_eq!(timing.duration_ms, 300.0);
    assert_eq!(timing.delay_ms, 0.0);
    Ok(())
}

#[test]
fn declarative_composition_from_json_plays() -> Result<()> {
    let mut stage = build_stage()?;

    let spec = CompositionSpec {
        target: "panel".to_string(),
        sections: vec![cadence_stage::SectionSpec {
            name: Some("enter".to_string()),
            timing: cadence_stage::TimingSpec {
                duration_ms: Some(60.0),
                easing: Some(Easing::Linear),
                ..Default::default()
            },
            rules: vec![cadence_stage::RuleSpec::Tween {
                property: "left".to_string(),
                to: SizeExpr::of(SizeConstant::ParentWidth).div(4.0),
                gravity: None,
                effect: None,
                element: None,
                timing: Default::default(),
                wait_ms: None,
            }],
        }],
        repeat: None,
    };

    // Round-trip through JSON before building, the way embedders load it.
    let json = serde_json::to_string(&spec).unwrap();
    let parsed = CompositionSpec::from_json(&json)?;
    let mut seq = parsed.build(&EffectRegistry::with_builtins(), Timing::default())?;

    seq.start(&mut stage)?;
    run(&mut seq, &mut stage, 20.0, 10);

    assert_eq!(stage.get("panel").unwrap().frame().left, 200.0);
    Ok(())
}
