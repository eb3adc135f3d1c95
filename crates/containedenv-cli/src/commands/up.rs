use super::{colorize_state, json_pretty, with_spinner, Context, EXIT_SUCCESS};
use containedenv_core::{Outcome, UpOptions};

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Reused => "reused",
        Outcome::Created => "created",
        Outcome::Rebuilt => "rebuilt",
    }
}

pub fn run(ctx: &Context<'_>, options: UpOptions) -> Result<u8, String> {
    let report = with_spinner(
        ctx.json,
        "provisioning environment...",
        "environment ready",
        "provisioning failed",
        || ctx.engine.up(ctx.config, options),
    )?;

    if ctx.json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    println!(
        "image:     {} [{}]",
        ctx.config.app.image_name(),
        colorize_state(outcome_label(report.image_outcome))
    );
    println!(
        "container: {} [{}]",
        report.container.name,
        colorize_state(outcome_label(report.container_outcome))
    );
    if options.setup {
        println!("setup:     {} commands", report.setup_commands);
    }
    println!("Enter this container with \"{}\"", report.enter_hint);
    Ok(EXIT_SUCCESS)
}
