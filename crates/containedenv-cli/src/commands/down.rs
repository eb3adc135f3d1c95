use super::{json_pretty, Context, EXIT_SUCCESS};

pub fn run(ctx: &Context<'_>) -> Result<u8, String> {
    let report = ctx.engine.down(ctx.config).map_err(|e| e.to_string())?;
    if ctx.json {
        println!("{}", json_pretty(&report)?);
        return Ok(EXIT_SUCCESS);
    }

    let container = ctx.config.app.container_name();
    if report.container_removed {
        println!("removed container {container}");
    } else {
        println!("container {container} not present");
    }
    let image = ctx.config.app.image_name();
    if report.image_removed {
        println!("removed image {image}");
    } else {
        println!("image {image} not present");
    }
    Ok(EXIT_SUCCESS)
}
