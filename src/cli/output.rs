use crate::cli::OutputFormat;
use anyhow::Result;
use serde_json::Value;
use std::io::Write;

pub fn emit_value(value: &Value, format: OutputFormat, compact: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Json if compact => serde_json::to_writer(&mut handle, value)?,
        OutputFormat::Json => serde_json::to_writer_pretty(&mut handle, value)?,
        OutputFormat::Yaml => {
            serde_yaml::to_writer(&mut handle, value)?;
            return Ok(());
        }
    }
    handle.write_all(b"\n")?;
    Ok(())
}
