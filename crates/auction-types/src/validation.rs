//! Schema checks for implementation config sections.
//!
//! Each backend (wallet RPC, indexer, contract reader) is built from a
//! `toml::Value` table. Before building, the factory runs the table through
//! the backend's [`ConfigSchema`] so misconfiguration surfaces as a typed
//! [`ValidationError`] instead of a panic deep inside a constructor.

use thiserror::Error;

/// Errors produced while checking a config section.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: String,
	},
}

/// Expected shape of a config field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An `http://` or `https://` URL.
	Url,
	/// A `0x`-prefixed 20-byte hex address.
	Address,
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
	Table(Schema),
}

/// Extra check run after the type check passes.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.finish_non_exhaustive()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, path: &str, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(path, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: path.to_string(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a config table.
#[derive(Debug, Default)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		self.validate_at("", config)
	}

	fn validate_at(&self, prefix: &str, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config.as_table().ok_or_else(|| ValidationError::TypeMismatch {
			field: if prefix.is_empty() {
				"root".to_string()
			} else {
				prefix.to_string()
			},
			expected: "table",
			actual: config.type_str().to_string(),
		})?;

		for field in &self.required {
			let path = join_path(prefix, &field.name);
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(path.clone()))?;
			field.check(&path, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(&join_path(prefix, &field.name), value)?;
			}
		}

		Ok(())
	}
}

fn join_path(prefix: &str, name: &str) -> String {
	if prefix.is_empty() {
		name.to_string()
	} else {
		format!("{}.{}", prefix, name)
	}
}

fn mismatch(path: &str, expected: &'static str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: path.to_string(),
		expected,
		actual: value.type_str().to_string(),
	}
}

fn invalid(path: &str, message: impl Into<String>) -> ValidationError {
	ValidationError::InvalidValue {
		field: path.to_string(),
		message: message.into(),
	}
}

fn check_type(path: &str, value: &toml::Value, expected: &FieldType) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			value.as_str().ok_or_else(|| mismatch(path, "string", value))?;
		}
		FieldType::Url => {
			let url = value.as_str().ok_or_else(|| mismatch(path, "string", value))?;
			if !is_http_url(url) {
				return Err(invalid(path, "URL must start with http:// or https://"));
			}
		}
		FieldType::Address => {
			let addr = value.as_str().ok_or_else(|| mismatch(path, "string", value))?;
			if !is_hex_address(addr) {
				return Err(invalid(path, "must be a 0x-prefixed 20-byte hex address"));
			}
		}
		FieldType::Integer { min, max } => {
			let n = value
				.as_integer()
				.ok_or_else(|| mismatch(path, "integer", value))?;
			if let Some(min) = min.filter(|min| n < *min) {
				return Err(invalid(path, format!("{} is less than minimum {}", n, min)));
			}
			if let Some(max) = max.filter(|max| n > *max) {
				return Err(invalid(path, format!("{} is greater than maximum {}", n, max)));
			}
		}
		FieldType::Boolean => {
			value.as_bool().ok_or_else(|| mismatch(path, "boolean", value))?;
		}
		FieldType::Table(schema) => schema.validate_at(path, value)?,
	}
	Ok(())
}

/// Whether `url` uses an HTTP scheme.
pub fn is_http_url(url: &str) -> bool {
	url.starts_with("http://") || url.starts_with("https://")
}

/// Whether `addr` looks like an EVM address.
pub fn is_hex_address(addr: &str) -> bool {
	addr.strip_prefix("0x")
		.is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Schema of an implementation config section.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
