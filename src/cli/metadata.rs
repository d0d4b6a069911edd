use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::path::Path;

use nxsfileinfo::controlled_vocabulary::TechniqueVocabulary;
use nxsfileinfo::copymap::{self, EditScript};
use nxsfileinfo::flatten::FlattenOptions;
use nxsfileinfo::metadata::MergeOptions;
use nxsfileinfo::pipeline::{to_json, Pipeline, PipelineOptions, DEFAULT_COPY_MAP_FIELD};

use super::config::{Config, MetadataConfig};
use super::MetadataArgs;

/// Generate catalog metadata and write it to the output
pub fn run(args: MetadataArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?.metadata,
        None => MetadataConfig::default(),
    };

    let mode = args
        .chmod
        .as_deref()
        .or(config.chmod.as_deref())
        .map(parse_mode)
        .transpose()?;
    if let Some(output) = &args.output {
        if output.exists() && !args.override_output {
            bail!(
                "Output file already exists: {} (use --override to replace it)",
                output.display()
            );
        }
    }

    let options = pipeline_options(&args, &config)?;
    let vocabulary = TechniqueVocabulary::panet();
    let pipeline = Pipeline::new(options, &vocabulary).context("Failed to load sidecar metadata")?;
    let records = match &args.file {
        Some(file) => pipeline
            .run(Some(file.as_path()))
            .with_context(|| format!("Failed to process {}", file.display()))?,
        None => pipeline.run(None)?,
    };
    let json = to_json(&records).context("Failed to serialize metadata")?;

    match &args.output {
        Some(output) => {
            std::fs::write(output, format!("{}\n", json))
                .with_context(|| format!("Failed to write {}", output.display()))?;
            if let Some(mode) = mode {
                set_mode(output, mode)?;
            }
            info!("Wrote {} record(s) to {}", records.len(), output.display());
        }
        None => {
            if mode.is_some() {
                warn!("--chmod is ignored without --output");
            }
            println!("{}", json);
        }
    }
    Ok(())
}

/// Combine flags, config file and built-in defaults
fn pipeline_options(args: &MetadataArgs, config: &MetadataConfig) -> Result<PipelineOptions> {
    let defaults = FlattenOptions::default();
    let flatten = FlattenOptions {
        hidden_attributes: args
            .hidden_attributes
            .as_deref()
            .map(split_list)
            .or_else(|| config.hidden_attributes.clone())
            .unwrap_or(defaults.hidden_attributes),
        attributes: args
            .attributes
            .as_deref()
            .map(split_list)
            .or_else(|| config.attributes.clone()),
        group_postfix: args
            .group_postfix
            .clone()
            .or_else(|| config.group_postfix.clone())
            .unwrap_or_default(),
        oned: args.oned || config.oned.unwrap_or(false),
        values: args
            .values
            .as_deref()
            .map(split_list)
            .or_else(|| config.values.clone())
            .unwrap_or_default(),
        entry_classes: args
            .entry_classes
            .as_deref()
            .map(split_list)
            .or_else(|| config.entry_classes.clone()),
        entry_names: args
            .entry_names
            .as_deref()
            .map(split_list)
            .or_else(|| config.entry_names.clone()),
    };

    let merge = MergeOptions {
        beamtime_meta: args.beamtime_meta.clone(),
        scientific_meta: args.scientific_meta.clone(),
        techniques: args.techniques.clone(),
        sample_id: args.sample_id.clone(),
        sample_id_from_name: args.sample_id_from_name,
        instrument_id: args.instrument_id.clone(),
        raw_instrument_id: args.raw_instrument_id,
        pid: args.pid.clone(),
        beamtime_id: args.beamtime_id.clone(),
        pid_with_uuid: args.pid_with_uuid,
        pid_without_filename: args.pid_without_filename,
        owner_group: args
            .owner_group
            .clone()
            .or_else(|| config.owner_group.clone()),
        access_groups: args
            .access_groups
            .as_deref()
            .map(split_list)
            .or_else(|| config.access_groups.clone()),
        relative_path: args.relative_path.clone(),
        proposal_as_proposal: args.proposal_as_proposal,
        add_empty_units: args.add_empty_units || config.add_empty_units.unwrap_or(false),
        raw_metadata: args.raw_metadata,
    };

    Ok(PipelineOptions {
        flatten,
        merge,
        copy_map: copy_map(args, config)?,
        copy_map_field: Some(
            args.copy_map_field
                .clone()
                .or_else(|| config.copy_map_field.clone())
                .unwrap_or_else(|| DEFAULT_COPY_MAP_FIELD.to_string()),
        ),
    })
}

/// External copy-map: the script file followed by the inline script
fn copy_map(args: &MetadataArgs, config: &MetadataConfig) -> Result<Option<EditScript>> {
    let mut script: Option<EditScript> = None;

    if let Some(path) = args.copy_map_file.as_ref().or(config.copy_map_file.as_ref()) {
        let parsed = EditScript::from_file(path)
            .with_context(|| format!("Invalid copy-map file: {}", path.display()))?;
        script.get_or_insert_with(EditScript::default).extend(parsed);
    }
    if let Some(text) = &args.copy_map {
        let parsed = copymap::parse_edit_script_str(text).context("Invalid --copy-map script")?;
        script.get_or_insert_with(EditScript::default).extend(parsed);
    }
    Ok(script)
}

/// Split a comma separated list, dropping blanks
fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse an octal file mode: `0o662`, `0662` or `662`
fn parse_mode(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        bail!("Invalid file mode: '{}'", text);
    }
    let mode = u32::from_str_radix(digits, 8)
        .with_context(|| format!("Invalid file mode: '{}'", text))?;
    if mode > 0o7777 {
        bail!("File mode out of range: '{}'", text);
    }
    Ok(mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to change mode of {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    warn!("Ignoring file mode {:o} for {}: not supported on this platform", mode, path.display());
    Ok(())
}
