use anyhow::{Context, Result, anyhow};
use illusory_config::IllusoryConfig;
use illusory_core::{Illusory, IllusoryElement, MemoryDocument};
use tracing::info;

mod scenes;

fn main() -> Result<()> {
    let _ = env_logger::try_init();

    let config = IllusoryConfig::load();
    let scene_arg = std::env::args().find_map(|arg| arg.strip_prefix("--scene=").map(str::to_string));
    let scene = scenes::by_name(scene_arg.as_deref().or(config.demo.scene.as_deref()));

    let doc = MemoryDocument::new();
    let stage = scene.build(&doc);
    info!(scene = scene.name(), duration = %config.transition.duration, "running transition");

    let options = stage
        .options
        .with_before_attach(|from: &IllusoryElement, to: &IllusoryElement| {
            info!(from = %from.tag_name(), to = %to.tag_name(), "clones attached");
        })
        .with_before_animate(|from: &IllusoryElement, to: &IllusoryElement| {
            info!(start = ?from.rect(), end = ?to.rect(), "animating");
        })
        .with_before_detach(|_: &IllusoryElement, _: &IllusoryElement, canceled: bool| {
            info!(canceled, "detaching clones");
        });

    let illusory = Illusory::new(doc.clone()).with_defaults(config.to_options());
    let started = doc.now_ms();
    doc.run_until_complete(illusory.transition(stage.from, stage.to, options))
        .ok_or_else(|| anyhow!("transition never completed"))?
        .with_context(|| format!("scene {} failed", scene.name()))?;

    info!(
        elapsed_ms = doc.now_ms() - started,
        listeners = doc.listener_count(),
        "transition finished"
    );
    Ok(())
}
