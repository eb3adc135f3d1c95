use super::{json_pretty, EXIT_SUCCESS};
use containedenv_core::provisioning_script;
use containedenv_schema::ProvisioningConfig;

pub fn run(config: &ProvisioningConfig, json: bool) -> Result<u8, String> {
    let script = provisioning_script(config).map_err(|e| e.to_string())?;
    if json {
        let payload = serde_json::json!({
            "image_name": config.app.image_name(),
            "script": script.render(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print!("{script}");
    }
    Ok(EXIT_SUCCESS)
}
