//! The mapper builder assistant: namespace application, cache construction
//! from document attributes, and shared mapping-construction helpers.

use std::sync::Arc;
use std::time::Duration;

use grappelli_cache::cache::{Cache, PerpetualCache};
use grappelli_cache::decorators::{
	BlockingCache, FifoCache, LoggingCache, LruCache, ScheduledCache, SerializedCache,
	SynchronizedCache, WeakCache,
};
use grappelli_core::token::TokenParser;
use grappelli_core::types::{JavaType, JdbcType, TypeHandler};
use grappelli_mapping::{BuildError, Configuration};

const DEFAULT_CACHE_SIZE: usize = 1024;

/// Per-namespace build state shared by the document and descriptor paths.
pub struct MapperBuilderAssistant<'a> {
	configuration: &'a Configuration,
	namespace: String,
	current_cache: Option<Arc<dyn Cache>>,
}

impl<'a> MapperBuilderAssistant<'a> {
	pub fn new(configuration: &'a Configuration, namespace: &str) -> Self {
		Self { configuration, namespace: namespace.to_string(), current_cache: None }
	}

	pub fn configuration(&self) -> &Configuration {
		self.configuration
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Qualifies a bare id with the current namespace; ids that already
	/// carry a namespace pass through.
	pub fn apply_namespace(&self, id: &str) -> String {
		if id.contains('.') {
			id.to_string()
		} else {
			format!("{}.{id}", self.namespace)
		}
	}

	/// Adopts another namespace's cache. Returns false when the referenced
	/// cache is not built yet, so the caller can retry.
	pub fn use_cache_ref(&mut self, referenced_namespace: &str) -> bool {
		self.configuration.add_cache_ref(&self.namespace, referenced_namespace);
		match self.configuration.effective_cache(&self.namespace) {
			Some(cache) => {
				self.current_cache = Some(cache);
				true
			}
			None => false,
		}
	}

	/// Builds this namespace's cache from document attributes and installs
	/// it. Decorator order mirrors the attribute semantics: eviction
	/// innermost, then scheduling, serialization, logging, whole-cache
	/// synchronization, and blocking outermost.
	#[allow(clippy::too_many_arguments)]
	pub fn use_new_cache(
		&mut self,
		eviction: &str,
		flush_interval: Option<Duration>,
		size: Option<usize>,
		read_only: bool,
		blocking: bool,
	) -> Result<Arc<dyn Cache>, BuildError> {
		let size = size.unwrap_or(DEFAULT_CACHE_SIZE);
		let mut cache: Box<dyn Cache> = match eviction.to_ascii_uppercase().as_str() {
			"LRU" => Box::new(LruCache::new(Box::new(PerpetualCache::new(&self.namespace)), size)),
			"FIFO" => {
				Box::new(FifoCache::new(Box::new(PerpetualCache::new(&self.namespace)), size))
			}
			// no soft references here; SOFT rides the weak implementation
			"SOFT" | "WEAK" => Box::new(WeakCache::new(&self.namespace)),
			"PERPETUAL" => Box::new(PerpetualCache::new(&self.namespace)),
			other => {
				return Err(BuildError::message(format!(
					"unknown cache eviction '{other}' in namespace '{}'",
					self.namespace
				)));
			}
		};
		if let Some(interval) = flush_interval {
			cache = Box::new(ScheduledCache::new(cache, interval));
		}
		if !read_only {
			cache = Box::new(SerializedCache::new(cache));
		}
		cache = Box::new(LoggingCache::new(cache));
		cache = Box::new(SynchronizedCache::new(cache));
		if blocking {
			cache = Box::new(BlockingCache::new(cache));
		}
		let cache: Arc<dyn Cache> = Arc::from(cache);
		self.configuration.add_cache(Arc::clone(&cache));
		self.current_cache = Some(Arc::clone(&cache));
		Ok(cache)
	}

	pub fn current_cache(&self) -> Option<Arc<dyn Cache>> {
		self.current_cache.clone()
	}

	pub fn resolve_java_type(&self, name: Option<&str>) -> Option<JavaType> {
		name.map(|n| self.configuration.type_aliases().resolve(n))
	}

	pub fn resolve_jdbc_type(&self, name: Option<&str>) -> Result<Option<JdbcType>, BuildError> {
		match name {
			None => Ok(None),
			Some(n) => JdbcType::parse(n)
				.map(Some)
				.ok_or_else(|| BuildError::message(format!("unknown jdbcType '{n}'"))),
		}
	}

	pub fn resolve_named_type_handler(
		&self,
		name: Option<&str>,
	) -> Result<Option<Arc<dyn TypeHandler>>, BuildError> {
		match name {
			None => Ok(None),
			Some(n) => self
				.configuration
				.type_handler_by_name(n)
				.map(Some)
				.ok_or_else(|| BuildError::message(format!("unknown typeHandler '{n}'"))),
		}
	}

	/// Interpolates `${var}` against the configuration's variable store,
	/// honoring the opt-in `enableDefaultValue` `:`-separator convention.
	pub fn interpolate(&self, text: &str) -> Result<String, BuildError> {
		interpolate(text, self.configuration)
	}
}

pub fn interpolate(text: &str, configuration: &Configuration) -> Result<String, BuildError> {
	if !text.contains("${") {
		return Ok(text.to_string());
	}
	let variables = configuration.variables();
	let defaults_enabled = variables
		.get("enableDefaultValue")
		.is_some_and(|v| v == "true");
	TokenParser::new("${", "}").parse(text, |expr| {
		if let Some(found) = variables.get(expr) {
			return Ok(found.clone());
		}
		if defaults_enabled {
			if let Some((key, default)) = expr.split_once(':') {
				return Ok(variables
					.get(key.trim())
					.cloned()
					.unwrap_or_else(|| default.trim().to_string()));
			}
		}
		// unknown variables stay literal so the failure is visible in the SQL
		Ok::<String, BuildError>(format!("${{{expr}}}"))
	})
}

/// Splits a composite column spec `{prop=col,prop2=col2}` into pairs.
pub fn parse_composite_column(spec: &str) -> Option<Vec<(String, String)>> {
	let trimmed = spec.trim();
	if !trimmed.starts_with('{') || !trimmed.ends_with('}') {
		return None;
	}
	let inner = &trimmed[1..trimmed.len() - 1];
	let mut pairs = Vec::new();
	for piece in inner.split(',') {
		let (prop, col) = piece.split_once('=')?;
		pairs.push((prop.trim().to_string(), col.trim().to_string()));
	}
	Some(pairs)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_apply_namespace() {
		let config = Configuration::new();
		let assistant = MapperBuilderAssistant::new(&config, "blog");
		assert_eq!(assistant.apply_namespace("findAll"), "blog.findAll");
		assert_eq!(assistant.apply_namespace("other.findAll"), "other.findAll");
	}

	#[test]
	fn test_cache_ref_retries_until_target_exists() {
		let config = Configuration::new();
		let mut referencing = MapperBuilderAssistant::new(&config, "posts");
		assert!(!referencing.use_cache_ref("blog"));
		let mut owning = MapperBuilderAssistant::new(&config, "blog");
		owning.use_new_cache("LRU", None, None, false, false).unwrap();
		assert!(referencing.use_cache_ref("blog"));
	}

	#[test]
	fn test_composite_column_parse() {
		assert_eq!(
			parse_composite_column("{authorId=author_id, kind=kind}"),
			Some(vec![
				("authorId".into(), "author_id".into()),
				("kind".into(), "kind".into()),
			])
		);
		assert_eq!(parse_composite_column("author_id"), None);
	}

	#[test]
	fn test_interpolate_defaults() {
		let mut config = Configuration::new();
		config.set_variable("table", "blog");
		assert_eq!(interpolate("SELECT * FROM ${table}", &config).unwrap(), "SELECT * FROM blog");
		// defaults disabled: the whole expression is one unknown variable
		assert_eq!(interpolate("${ghost:blog}", &config).unwrap(), "${ghost:blog}");
		config.set_variable("enableDefaultValue", "true");
		assert_eq!(interpolate("${ghost:fallback}", &config).unwrap(), "fallback");
	}
}
