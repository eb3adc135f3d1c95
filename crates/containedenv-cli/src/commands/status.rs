use super::{colorize_state, json_pretty, Context, EXIT_SUCCESS};
use containedenv_core::StatusReport;

fn image_state(report: &StatusReport) -> &'static str {
    if report.image.is_some() {
        "present"
    } else {
        "absent"
    }
}

fn container_state(report: &StatusReport) -> &'static str {
    match &report.container {
        Some(c) if c.running => "running",
        Some(_) => "stopped",
        None => "absent",
    }
}

pub fn run(ctx: &Context<'_>) -> Result<u8, String> {
    let report = ctx.engine.status(ctx.config).map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("runtime:   {}", ctx.engine.runtime().name());
    println!(
        "image:     {} [{}]",
        report.image_name,
        colorize_state(image_state(&report))
    );
    if let Some(image) = &report.image {
        println!("           {}", image.id);
    }
    println!(
        "container: {} [{}]",
        report.container_name,
        colorize_state(container_state(&report))
    );
    if let Some(container) = &report.container {
        println!("           {}", container.id);
    }
    Ok(EXIT_SUCCESS)
}
