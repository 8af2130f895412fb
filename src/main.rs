//! Minimal demo: slide a card across its parent and fade it out, printing
//! the playback events as they fire.

use anyhow::Result;

use cadence_stage::{
    Easing, RepeatMode, RepeatSpec, RuleSection, Sequencer, SizeConstant, SizeExpr, Stage,
    StageElement, Timing, TweenRule,
};
use cadence_stage::cadence_core::{Rect, Size};

fn main() -> Result<()> {
    let mut stage = Stage::new();
    stage.insert(
        StageElement::new("root")
            .with_measured(Size::new(800.0, 600.0))
            .with_frame(Rect::from_edges(0.0, 0.0, 800.0, 600.0)),
        None,
    )?;
    stage.insert(
        StageElement::new("card")
            .with_measured(Size::new(200.0, 120.0))
            .with_frame(Rect::from_edges(40.0, 40.0, 240.0, 160.0))
            .with_property("opacity", 1.0),
        Some("root"),
    )?;

    let slide = RuleSection::named("slide")
        .with_timing(Timing::new(300.0).with_easing(Easing::EaseOut))
        .with_rule(TweenRule::new(
            "left",
            SizeExpr::of(SizeConstant::ParentWidth).div(2.0),
        ))
        .into_handle();
    let fade = RuleSection::named("fade")
        .with_timing(Timing::new(200.0))
        .with_rule(TweenRule::new("opacity", SizeExpr::of(0.0)))
        .into_handle();

    let mut sequencer = Sequencer::new("card")
        .with_section(slide)
        .with_section(fade)
        .with_repeat(RepeatSpec::times(2).with_mode(RepeatMode::Reverse));

    sequencer.start(&mut stage)?;
    while sequencer.is_active() {
        sequencer.tick(&mut stage, 16.0);
        for event in sequencer.drain_events() {
            println!("{event:?}");
        }
    }

    let card = stage.get("card").expect("card still on stage");
    println!(
        "final frame: left={} top={} opacity={:?}",
        card.frame().left,
        card.frame().top,
        card.property("opacity")
    );
    Ok(())
}
