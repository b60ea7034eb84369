//! Run command implementation

use crate::cli::args::{apply_overrides, RunArgs};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::workflow::{run_workflow, WorkflowReport, WorkflowSpec};

/// Format the outcome of a workflow as display lines
pub fn format_report(report: &WorkflowReport) -> Vec<String> {
    let mut lines = vec![
        format!("Steps run: {}", report.steps_run),
        format!("Final schedule scale: {:.4}", report.final_scale),
        format!("Overall sparsity: {:.4}", report.sparsity.overall),
        format!("Dense model: {}", report.dense_path.display()),
    ];
    if let Some(path) = &report.quantized_path {
        lines.push(format!("Quantized model: {}", path.display()));
    }
    if let Some(sizes) = &report.sizes {
        lines.push(format!(
            "Size: {} -> {} bytes ({:.2}x, {:.1}% saved)",
            sizes.dense_bytes,
            sizes.quantized_bytes,
            sizes.ratio(),
            sizes.saving_percent()
        ));
    }
    lines
}

pub fn run_run(args: RunArgs, level: LogLevel) -> Result<(), String> {
    log(
        level,
        LogLevel::Normal,
        &format!("Podar: running workflow from {}", args.config.display()),
    );

    let mut spec =
        WorkflowSpec::from_path(&args.config).map_err(|e| format!("Workflow error: {e}"))?;

    apply_overrides(&mut spec, &args);

    if args.dry_run {
        spec.validate().map_err(|e| format!("Validation failed: {e}"))?;
        log(
            level,
            LogLevel::Normal,
            "Dry run - workflow validated successfully",
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Layers: {}", spec.model.layers.len()),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Target level: {}", spec.sparsity.defaults().sparsity_level),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Steps: {}", spec.steps),
        );
        log(
            level,
            LogLevel::Verbose,
            &format!("  Output dir: {}", spec.output_dir.display()),
        );
        return Ok(());
    }

    let report = run_workflow(&spec).map_err(|e| format!("Workflow error: {e}"))?;

    for line in format_report(&report) {
        log(level, LogLevel::Normal, &line);
    }
    for layer in &report.sparsity.layers {
        log(
            level,
            LogLevel::Verbose,
            &format!(
                "  {}: sparsity {:.4} ({}/{} zeros)",
                layer.layer, layer.sparsity, layer.zero_count, layer.num_elements
            ),
        );
    }

    log(level, LogLevel::Normal, "Workflow complete!");
    Ok(())
}
