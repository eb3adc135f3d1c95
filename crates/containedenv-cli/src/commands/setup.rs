use super::{json_pretty, with_spinner, Context, EXIT_SUCCESS};

pub fn run(ctx: &Context<'_>) -> Result<u8, String> {
    let commands = with_spinner(
        ctx.json,
        "setting up projects...",
        "projects set up",
        "project setup failed",
        || ctx.engine.setup(ctx.config),
    )?;
    if ctx.json {
        let payload = serde_json::json!({
            "container_name": ctx.config.app.container_name(),
            "setup_commands": commands,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "ran {commands} setup commands in {}",
            ctx.config.app.container_name()
        );
    }
    Ok(EXIT_SUCCESS)
}
