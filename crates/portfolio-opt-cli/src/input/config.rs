use portfolio_opt_core::config::OptimizerConfig;

use super::file;

/// Load an [`OptimizerConfig`] from `.yaml`/`.yml` or JSON. Missing fields
/// keep their defaults.
pub fn load_config(path: Option<&str>) -> Result<OptimizerConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(OptimizerConfig::default());
    };
    let lower = path.to_ascii_lowercase();
    let config: OptimizerConfig = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        file::read_yaml(path)?
    } else {
        file::read_json(path)?
    };
    tracing::debug!(?config, "loaded optimizer config");
    Ok(config)
}
