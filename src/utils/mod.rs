use anyhow::{Context, Result};
use std::path::Path;

/// Ensure directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {:?}", path))?;
    }
    Ok(())
}

/// Format duration as human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

/// Format number with commas
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

/// Validation utilities
pub mod validation {
    use anyhow::{bail, Result};
    use std::collections::HashSet;

    /// Validate that `min` is strictly below `max`
    pub fn ordered_bounds(min: f64, max: f64, name: &str) -> Result<()> {
        if !(min.is_finite() && max.is_finite()) || min >= max {
            bail!("{} must satisfy min < max, got [{}, {}]", name, min, max);
        }
        Ok(())
    }

    /// Validate that value is positive
    pub fn positive<T>(value: T, name: &str) -> Result<()>
    where
        T: PartialOrd + Default + std::fmt::Display,
    {
        if value <= T::default() {
            bail!("{} must be positive, got {}", name, value);
        }
        Ok(())
    }

    /// Validate that identifiers are non-empty and unique
    pub fn unique_ids<'a, I: IntoIterator<Item = &'a str>>(ids: I, name: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for id in ids {
            if id.trim().is_empty() {
                bail!("{} contains an empty identifier", name);
            }
            if !seen.insert(id) {
                bail!("Duplicate {} identifier: {}", name, id);
            }
        }
        Ok(())
    }

    /// Validate that identifiers can be used as file name stems
    pub fn file_stems<'a, I: IntoIterator<Item = &'a str>>(ids: I, name: &str) -> Result<()> {
        for id in ids {
            if id.contains(['/', '\\', '\0']) {
                bail!("{} identifier {:?} cannot be used in a file name", name, id);
            }
        }
        Ok(())
    }
}
