//! Parser for the compact `key=value` storage mount syntax.
//!
//! ```text
//! type=cos,name=<name>,bucket=<bucket>,src=<source-path>,dst=<target-path>[,readonly][,endpoint=<endpoint>]
//! name=<name>[,dst=<target-path>][,subpath=<sub-path>][,readonly]
//! ```

use std::collections::HashMap;

use thiserror::Error;

use crate::client::types::{MountOption, ReadOnlyOverride, StorageMount, StorageSource};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MountSpecError {
    #[error("type is required (currently supported: cos)")]
    MissingType,

    #[error("unsupported storage type: {found} (currently supported: cos)")]
    UnsupportedType { found: String },

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("{field} must be absolute path (start with /)")]
    NotAbsolute { field: &'static str },

    #[error("{field} must be a bare flag or true/false, got '{value}'")]
    InvalidFlag { field: &'static str, value: String },

    #[error("readonly on mount option '{name}' can only tighten permissions; omit it to inherit")]
    LoosenReadOnly { name: String },

    #[error("mount option '{option}' does not apply to mount '{mount}'")]
    NameMismatch { option: String, mount: String },

    #[error("cos config error: {0}")]
    Cos(Box<MountSpecError>),
}

type SpecResult<T> = std::result::Result<T, MountSpecError>;

/// Parse a `--mount` style specification into a [`StorageMount`].
pub fn parse_storage_mount(s: &str) -> SpecResult<StorageMount> {
    let params = parse_key_value_pairs(s);

    let storage_type = non_empty(&params, "type").ok_or(MountSpecError::MissingType)?;
    let name = required(&params, "name")?;
    let mount_path = absolute(&params, "dst")?.ok_or(MountSpecError::MissingField { field: "dst" })?;
    let read_only = match params.get("readonly") {
        Some(value) => parse_flag("readonly", value)?,
        None => false,
    };

    let source = match storage_type {
        "cos" => parse_cos_source(&params).map_err(|e| MountSpecError::Cos(Box::new(e)))?,
        other => {
            return Err(MountSpecError::UnsupportedType {
                found: other.to_string(),
            })
        }
    };

    Ok(StorageMount {
        name,
        mount_path,
        read_only,
        source: Some(source),
    })
}

fn parse_cos_source(params: &HashMap<String, String>) -> SpecResult<StorageSource> {
    let bucket_name = required(params, "bucket")?;
    let bucket_path = absolute(params, "src")?.ok_or(MountSpecError::MissingField { field: "src" })?;

    Ok(StorageSource::Cos {
        bucket_name,
        bucket_path,
        endpoint: non_empty(params, "endpoint").map(String::from),
    })
}

/// Parse a `--mount-option` style override into a [`MountOption`].
///
/// `readonly` may only force read-only; `readonly=false` is rejected because
/// an override cannot loosen a tool-declared mount.
pub fn parse_mount_option(s: &str) -> SpecResult<MountOption> {
    let params = parse_key_value_pairs(s);

    let name = required(&params, "name")?;
    let mount_path = absolute(&params, "dst")?;
    let read_only = match params.get("readonly") {
        Some(value) if parse_flag("readonly", value)? => ReadOnlyOverride::Force,
        Some(_) => return Err(MountSpecError::LoosenReadOnly { name }),
        None => ReadOnlyOverride::Inherit,
    };

    Ok(MountOption {
        name,
        mount_path,
        sub_path: non_empty(&params, "subpath").map(String::from),
        read_only,
    })
}

impl StorageMount {
    /// Format this mount back into the `--mount` syntax.
    ///
    /// Mounts without a storage source have no `type` and will not re-parse.
    pub fn to_spec(&self) -> String {
        let mut parts = Vec::new();
        if let Some(source) = &self.source {
            parts.push(format!("type={}", source.type_name()));
        }
        parts.push(format!("name={}", self.name));
        if let Some(StorageSource::Cos {
            bucket_name,
            bucket_path,
            ..
        }) = &self.source
        {
            parts.push(format!("bucket={}", bucket_name));
            parts.push(format!("src={}", bucket_path));
        }
        parts.push(format!("dst={}", self.mount_path));
        if self.read_only {
            parts.push("readonly".to_string());
        }
        if let Some(StorageSource::Cos {
            endpoint: Some(endpoint),
            ..
        }) = &self.source
        {
            parts.push(format!("endpoint={}", endpoint));
        }
        parts.join(",")
    }
}

impl MountOption {
    /// The mount an instance actually gets when this option is applied to
    /// the tool-declared `mount`.
    pub fn apply_to(&self, mount: &StorageMount) -> SpecResult<StorageMount> {
        if self.name != mount.name {
            return Err(MountSpecError::NameMismatch {
                option: self.name.clone(),
                mount: mount.name.clone(),
            });
        }

        let mut effective = mount.clone();
        if let Some(path) = &self.mount_path {
            effective.mount_path = path.clone();
        }
        if self.read_only == ReadOnlyOverride::Force {
            effective.read_only = true;
        }
        if let (Some(sub_path), Some(StorageSource::Cos { bucket_path, .. })) =
            (&self.sub_path, effective.source.as_mut())
        {
            *bucket_path = format!(
                "{}/{}",
                bucket_path.trim_end_matches('/'),
                sub_path.trim_start_matches('/')
            );
        }
        Ok(effective)
    }
}

/// Parse "key=value,key2=value2" pairs; a bare key means "true" and later
/// duplicates overwrite earlier ones.
fn parse_key_value_pairs(s: &str) -> HashMap<String, String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (part.to_string(), "true".to_string()),
        })
        .collect()
}

fn non_empty<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn required(params: &HashMap<String, String>, field: &'static str) -> SpecResult<String> {
    non_empty(params, field)
        .map(String::from)
        .ok_or(MountSpecError::MissingField { field })
}

fn absolute(params: &HashMap<String, String>, field: &'static str) -> SpecResult<Option<String>> {
    match non_empty(params, field) {
        Some(path) if path.starts_with('/') => Ok(Some(path.to_string())),
        Some(_) => Err(MountSpecError::NotAbsolute { field }),
        None => Ok(None),
    }
}

fn parse_flag(field: &'static str, value: &str) -> SpecResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(MountSpecError::InvalidFlag {
            field,
            value: value.to_string(),
        }),
    }
}

/// Help text for the `--mount` syntax.
pub fn storage_mount_help() -> &'static str {
    r#"Storage mount configuration in key=value format.

COS storage format:
  type=cos,name=<name>,bucket=<bucket>,src=<source-path>,dst=<target-path>[,readonly][,endpoint=<endpoint>]

Parameters:
  type      Storage type (required): cos
  name      Mount name, DNS-1123 format (required)
  bucket    COS bucket name (required for cos)
  src       Source path in bucket, must start with / (required for cos)
  dst       Target mount path in container, must start with / (required)
  readonly  Mount as read-only (optional flag)
  endpoint  COS endpoint (optional, defaults to current region)

Examples:
  --mount "type=cos,name=data,bucket=my-bucket-1250000000,src=/data,dst=/mnt/data"
  --mount "type=cos,name=models,bucket=model-bucket,src=/models,dst=/mnt/models,readonly""#
}

/// Help text for the `--mount-option` syntax.
pub fn mount_option_help() -> &'static str {
    r#"Mount option to override tool storage configuration.

Format:
  name=<name>[,dst=<target-path>][,subpath=<sub-path>][,readonly]

Parameters:
  name      Storage mount name defined in tool (required)
  dst       Override target mount path in container (optional)
  subpath   Sub-directory isolation path (optional)
  readonly  Force read-only mount (optional, can only tighten permissions)

Examples:
  --mount-option "name=data,dst=/workspace,subpath=user-123"
  --mount-option "name=models,readonly""#
}
