//! Validate command implementation

use crate::cli::args::ValidateArgs;
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::workflow::{LayerSpec, PolicySpec, ScheduleSpec, WorkflowSpec};

/// Format model structure as a string
pub fn format_model_info(spec: &WorkflowSpec) -> String {
    let mut lines = vec![format!("  Seed: {}", spec.model.seed)];
    for layer in &spec.model.layers {
        lines.push(match layer {
            LayerSpec::Linear {
                name,
                in_features,
                out_features,
            } => format!("  Layer {name}: linear {in_features} -> {out_features}"),
            LayerSpec::Relu { name } => format!("  Layer {name}: relu"),
            LayerSpec::Sigmoid { name } => format!("  Layer {name}: sigmoid"),
        });
    }
    lines.join("\n")
}

/// Format sparsity configuration as a string
pub fn format_sparsity_info(spec: &WorkflowSpec) -> String {
    let defaults = spec.sparsity.defaults();
    let policy = match spec.policy {
        PolicySpec::WeightNorm { norm } => format!("weight_norm ({norm:?})"),
        PolicySpec::Magnitude => "magnitude".to_string(),
    };
    let mut lines = vec![
        format!("  Policy: {policy}"),
        format!("  Level: {}", defaults.sparsity_level),
        format!(
            "  Block shape: {}x{}",
            defaults.block_shape.0, defaults.block_shape.1
        ),
        format!("  Zeros per block: {}", defaults.zeros_per_block),
    ];
    for group in spec.sparsity.overrides() {
        lines.push(format!(
            "  Override {}: level {}",
            group.layer, group.settings.sparsity_level
        ));
    }
    lines.join("\n")
}

/// Format schedule configuration as a string
pub fn format_schedule_info(spec: &WorkflowSpec) -> Option<String> {
    match spec.schedule {
        ScheduleSpec::None => None,
        ScheduleSpec::LinearRamp {
            start_step,
            end_step,
        } => Some(format!(
            "  Schedule: linear ramp over steps {start_step}..{end_step}"
        )),
        ScheduleSpec::CubicRamp {
            start_step,
            end_step,
        } => Some(format!(
            "  Schedule: cubic ramp over steps {start_step}..{end_step}"
        )),
    }
}

/// Format quantization configuration as a string
pub fn format_quant_info(spec: &WorkflowSpec) -> Option<String> {
    spec.quantize.as_ref().map(|quant| {
        let mut lines = vec![
            "  Quantization:".to_string(),
            format!("    Per channel: {}", quant.config.per_channel()),
            format!("    Symmetric weights: {}", quant.config.symmetric_weights()),
            format!("    Calibration batches: {}", quant.calibration_batches),
        ];
        for ((rows, cols), kernel) in quant.kernel_table().entries() {
            lines.push(format!(
                "    Kernel {}x{}: {}",
                rows,
                cols,
                kernel.display_name()
            ));
        }
        lines.join("\n")
    })
}

/// Print detailed workflow summary
pub fn print_detailed_summary(spec: &WorkflowSpec) {
    println!();
    println!("Workflow Summary:");
    println!("{}", format_model_info(spec));
    println!();
    println!("{}", format_sparsity_info(spec));

    if let Some(schedule_info) = format_schedule_info(spec) {
        println!();
        println!("{schedule_info}");
    }

    if let Some(quant_info) = format_quant_info(spec) {
        println!();
        println!("{quant_info}");
    }

    println!();
    println!("  Steps: {}", spec.steps);
    println!("  Output dir: {}", spec.output_dir.display());
}

pub fn run_validate(args: ValidateArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Validating workflow: {}", args.config.display()),
    );

    let spec = WorkflowSpec::from_path(&args.config).map_err(|e| format!("Workflow error: {e}"))?;

    spec.validate().map_err(|e| format!("Validation failed: {e}"))?;

    log(level, LogLevel::Normal, "Workflow is valid");

    if args.detailed {
        print_detailed_summary(&spec);
    }

    Ok(())
}
