//! Info command implementation

use crate::cli::args::{InfoArgs, OutputFormat};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::workflow::WorkflowSpec;

pub fn run_info(args: InfoArgs, level: LogLevel) -> Result<(), String> {
    let spec = WorkflowSpec::from_path(&args.config).map_err(|e| format!("Workflow error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            log(level, LogLevel::Normal, "Workflow Info:");
            println!();
            println!("Layers: {}", spec.model.layers.len());
            println!("Linear layers: {}", spec.linear_layer_names().join(", "));
            println!(
                "Sparsity level: {}",
                spec.sparsity.defaults().sparsity_level
            );
            println!("Steps: {}", spec.steps);

            if spec.quantize.is_some() {
                println!("Quantization: enabled");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&spec)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = spec
                .to_yaml_string()
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
