//! Row-to-object projection.
//!
//! Handles column discovery, auto-mapping policies, constructor and setter
//! population, discriminators, joined nested result maps with ID-based
//! grouping, nested selects (eager, deferred, or lazy), and linked extra
//! result sets.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use grappelli_core::driver::{ColumnInfo, ResultSet, Statement};
use grappelli_core::meta::{self, Reflector};
use grappelli_core::types::{JavaType, TypeHandler};
use grappelli_core::value::{Value, ValueMap};
use grappelli_mapping::{
	AutoMappingBehavior, AutoMappingUnknownColumnBehavior, Configuration, MappedStatement,
	ResultMap, ResultMapping, RowBounds,
};
use tracing::warn;

use crate::error::ExecutorError;
use crate::executor::{DeferredPatch, Executor};
use crate::loader::{self, ResultLoader};

/// Streaming row callback; return `false` to stop reading further rows.
pub trait ResultHandler {
	fn handle_result(&mut self, context: &ResultContext) -> bool;
}

pub struct ResultContext {
	pub row: Value,
	pub result_count: usize,
}

/// Collects rows into a list; the default when no custom handler is given.
#[derive(Default)]
pub struct DefaultResultHandler {
	pub rows: Vec<Value>,
}

impl ResultHandler for DefaultResultHandler {
	fn handle_result(&mut self, context: &ResultContext) -> bool {
		self.rows.push(context.row.clone());
		true
	}
}

/// Everything one statement execution projected.
pub struct HandledResults {
	pub rows: Vec<Value>,
	pub deferred: Vec<DeferredPatch>,
	pub loaders: Vec<ResultLoader>,
}

/// Column name → index map for one result set, honoring `useColumnLabel`.
pub struct ColumnIndex {
	columns: Vec<ColumnInfo>,
	by_name: HashMap<String, usize>,
}

impl ColumnIndex {
	pub fn new(columns: &[ColumnInfo], use_label: bool) -> Self {
		let mut by_name = HashMap::new();
		for (i, column) in columns.iter().enumerate() {
			let name = if use_label { &column.label } else { &column.name };
			by_name.entry(name.to_uppercase()).or_insert(i);
		}
		Self { columns: columns.to_vec(), by_name }
	}

	pub fn find(&self, column: &str) -> Option<usize> {
		self.by_name.get(&column.to_uppercase()).copied()
	}

	pub fn names(&self, use_label: bool) -> impl Iterator<Item = (&str, usize)> {
		self.columns.iter().enumerate().map(move |(i, c)| {
			(if use_label { c.label.as_str() } else { c.name.as_str() }, i)
		})
	}

	pub fn info(&self, index: usize) -> Option<&ColumnInfo> {
		self.columns.get(index)
	}
}

// internal per-row products before row indexes are known
struct RowProduct {
	value: Value,
	found: bool,
	deferred: Vec<RowDeferred>,
	loaders: Vec<ResultLoader>,
	relations: Vec<RowRelation>,
}

struct RowDeferred {
	path: String,
	key: grappelli_cache::CacheKey,
	statement_id: String,
	single: bool,
}

// a property waiting for rows of a named extra result set
struct RowRelation {
	result_set: String,
	property: String,
	join_values: Vec<Value>,
	foreign_columns: Vec<String>,
	nested_map_id: String,
	single: bool,
}

struct PendingRelation {
	row: usize,
	relation: RowRelation,
}

pub struct DefaultResultSetHandler {
	configuration: Arc<Configuration>,
	ms: Arc<MappedStatement>,
	row_bounds: RowBounds,
}

impl DefaultResultSetHandler {
	pub fn new(
		configuration: Arc<Configuration>,
		ms: Arc<MappedStatement>,
		row_bounds: RowBounds,
	) -> Self {
		Self { configuration, ms, row_bounds }
	}

	/// Processes every result set the statement produced.
	pub fn handle_result_sets(
		&self,
		first: Box<dyn ResultSet>,
		stmt: &mut dyn Statement,
		executor: &mut dyn Executor,
		mut result_handler: Option<&mut dyn ResultHandler>,
	) -> Result<HandledResults, ExecutorError> {
		let mut mapped_sets: Vec<Vec<Value>> = Vec::new();
		let mut out = HandledResults { rows: Vec::new(), deferred: Vec::new(), loaders: Vec::new() };
		let mut pending_relations: Vec<PendingRelation> = Vec::new();

		let map_ids = &self.ms.result_map_ids;
		if map_ids.is_empty() {
			return Err(ExecutorError::mapping(
				&self.ms.id,
				"a query was executed but no result map was declared",
			));
		}
		let mut set_index = 0usize;
		let mut current: Option<Box<dyn ResultSet>> = Some(first);
		while let Some(mut rs) = current.take() {
			let set_name = self.ms.result_sets.get(set_index).map(String::as_str);
			let is_linked = set_name
				.is_some_and(|name| pending_relations.iter().any(|p| p.relation.result_set == name));
			if is_linked {
				self.handle_linked_result_set(
					rs.as_mut(),
					set_name.expect("linked set has a name"),
					&mut pending_relations,
					&mut mapped_sets,
					executor,
				)?;
			} else if set_index < map_ids.len() {
				let map = self
					.configuration
					.result_map(&map_ids[set_index])
					.ok_or_else(|| {
						ExecutorError::mapping(
							&self.ms.id,
							format!("result map '{}' is not registered", map_ids[set_index]),
						)
					})?;
				let set_rows = match result_handler {
					Some(ref mut handler) => self.handle_result_set(
						rs.as_mut(),
						&map,
						executor,
						Some(&mut **handler),
						&mut out,
						&mut pending_relations,
					)?,
					None => self.handle_result_set(
						rs.as_mut(),
						&map,
						executor,
						None,
						&mut out,
						&mut pending_relations,
					)?,
				};
				mapped_sets.push(set_rows);
			}
			let _ = rs.close();
			set_index += 1;
			if self.configuration.settings().multiple_result_sets_enabled {
				current = stmt
					.more_results()
					.map_err(|e| ExecutorError::driver(&self.ms.id, "<more results>", e))?;
			}
		}
		// one mapped set flattens; several come back as one array per set
		out.rows = if mapped_sets.len() == 1 {
			mapped_sets.into_iter().next().expect("one mapped set")
		} else {
			mapped_sets.into_iter().map(Value::Array).collect()
		};
		Ok(out)
	}

	fn handle_result_set(
		&self,
		rs: &mut dyn ResultSet,
		map: &Arc<ResultMap>,
		executor: &mut dyn Executor,
		result_handler: Option<&mut dyn ResultHandler>,
		out: &mut HandledResults,
		pending_relations: &mut Vec<PendingRelation>,
	) -> Result<Vec<Value>, ExecutorError> {
		let columns =
			ColumnIndex::new(rs.columns(), self.configuration.settings().use_column_label);
		if map.has_nested_result_maps() {
			self.handle_nested_rows(rs, map, &columns, executor, result_handler)
		} else {
			self.handle_simple_rows(
				rs,
				map,
				&columns,
				executor,
				result_handler,
				out,
				pending_relations,
			)
		}
	}

	fn handle_simple_rows(
		&self,
		rs: &mut dyn ResultSet,
		map: &Arc<ResultMap>,
		columns: &ColumnIndex,
		executor: &mut dyn Executor,
		mut result_handler: Option<&mut dyn ResultHandler>,
		out: &mut HandledResults,
		pending_relations: &mut Vec<PendingRelation>,
	) -> Result<Vec<Value>, ExecutorError> {
		let mut rows = Vec::new();
		self.skip_offset(rs)?;
		let mut read = 0usize;
		while read < self.row_bounds.limit && self.advance(rs)? {
			read += 1;
			let resolved = self.resolve_discriminator(map, rs, columns)?;
			let product = self.row_value(rs, &resolved, None, columns, executor, false, true)?;
			let row = self.finish_row(product, rows.len(), out, pending_relations);
			let Some(row) = row else { continue };
			if let Some(handler) = result_handler.as_deref_mut() {
				let context = ResultContext { row, result_count: rows.len() + 1 };
				if !handler.handle_result(&context) {
					break;
				}
			} else {
				rows.push(row);
			}
		}
		Ok(rows)
	}

	// resolves an empty-row product to None and rebases pending paths onto
	// the final row index
	fn finish_row(
		&self,
		product: RowProduct,
		row_index: usize,
		out: &mut HandledResults,
		pending_relations: &mut Vec<PendingRelation>,
	) -> Option<Value> {
		if !product.found {
			if self.configuration.settings().return_instance_for_empty_row {
				return Some(product.value);
			}
			return None;
		}
		for deferred in product.deferred {
			out.deferred.push(DeferredPatch {
				row: row_index,
				path: deferred.path,
				key: deferred.key,
				statement_id: deferred.statement_id,
				single: deferred.single,
			});
		}
		for mut loader in product.loaders {
			loader.row = row_index;
			out.loaders.push(loader);
		}
		for relation in product.relations {
			pending_relations.push(PendingRelation { row: row_index, relation });
		}
		Some(product.value)
	}

	fn skip_offset(&self, rs: &mut dyn ResultSet) -> Result<(), ExecutorError> {
		for _ in 0..self.row_bounds.offset {
			if !self.advance(rs)? {
				break;
			}
		}
		Ok(())
	}

	fn advance(&self, rs: &mut dyn ResultSet) -> Result<bool, ExecutorError> {
		rs.next().map_err(|e| ExecutorError::driver(&self.ms.id, "<fetch>", e))
	}

	/// Re-enters through the discriminator until a map without one (or an
	/// unmatched value) is reached; cycles are rejected.
	fn resolve_discriminator(
		&self,
		map: &Arc<ResultMap>,
		rs: &dyn ResultSet,
		columns: &ColumnIndex,
	) -> Result<Arc<ResultMap>, ExecutorError> {
		let mut current = Arc::clone(map);
		let mut visited = HashSet::new();
		visited.insert(current.id.clone());
		while let Some(discriminator) = current.discriminator.clone() {
			let Some(index) = columns.find(&discriminator.column) else { break };
			let handler = self.handler_for(
				discriminator.type_handler.as_ref(),
				discriminator.java_type.as_ref(),
				discriminator.jdbc_type,
			)?;
			let value = handler
				.get_result(rs, index)
				.map_err(|e| ExecutorError::type_error(&self.ms.id, e))?;
			let Some(case_map_id) = discriminator.cases.get(&value.to_string()) else { break };
			if !visited.insert(case_map_id.clone()) {
				return Err(ExecutorError::mapping(
					&self.ms.id,
					format!("circular discriminator through result map '{case_map_id}'"),
				));
			}
			let next = self.configuration.result_map(case_map_id).ok_or_else(|| {
				ExecutorError::mapping(
					&self.ms.id,
					format!("discriminator case map '{case_map_id}' is not registered"),
				)
			})?;
			current = next;
		}
		Ok(current)
	}

	/// Builds one object from the current row. `in_nested` downgrades
	/// deferral and laziness to eager loads; `materialize_nested` is false
	/// when the joined-rows grouping attaches children itself.
	#[allow(clippy::too_many_arguments)]
	fn row_value(
		&self,
		rs: &dyn ResultSet,
		map: &Arc<ResultMap>,
		column_prefix: Option<&str>,
		columns: &ColumnIndex,
		executor: &mut dyn Executor,
		in_nested: bool,
		materialize_nested: bool,
	) -> Result<RowProduct, ExecutorError> {
		let reflector = self.reflector_for(&map.type_);
		let mut product = RowProduct {
			value: Value::Object(ValueMap::new()),
			found: false,
			deferred: Vec::new(),
			loaders: Vec::new(),
			relations: Vec::new(),
		};
		let mut id_found = false;
		let mut prop_found = false;
		let mut ctor_found = false;

		// constructor arguments, declaration order
		let ctor_names: Vec<String> = map
			.constructor_mappings()
			.map(|m| m.property.clone().unwrap_or_default())
			.collect();
		if !ctor_names.is_empty() {
			if let Some(reflector) = &reflector {
				reflector.find_constructor(&ctor_names)?;
			}
			for mapping in map.constructor_mappings() {
				let value = self.column_value(rs, mapping, column_prefix, columns)?;
				ctor_found |= !value.is_null();
				if let Some(name) = &mapping.property {
					set_property(&mut product.value, name, value);
				}
			}
		} else if let Some(reflector) = &reflector {
			if !reflector.has_default_constructor() {
				return Err(grappelli_core::meta::ReflectionError::MissingDefaultConstructor {
					type_name: reflector.type_name().to_string(),
				}
				.into());
			}
		}

		for mapping in map.property_mappings() {
			if let Some(result_set) = &mapping.result_set {
				let relation =
					self.build_relation(rs, mapping, result_set, column_prefix, columns)?;
				product.relations.push(relation);
				continue;
			}
			if let Some(nested_map_id) = &mapping.nested_result_map_id {
				if !materialize_nested {
					// the joined-rows grouping attaches this child itself
					continue;
				}
				let applied = self.apply_same_row_nested(
					rs,
					mapping,
					nested_map_id,
					column_prefix,
					columns,
					executor,
					&mut product,
				)?;
				prop_found |= applied;
				if mapping.id_flag {
					id_found |= applied;
				}
				continue;
			}
			if let Some(nested_select) = &mapping.nested_select_id {
				let applied = self.apply_nested_select(
					rs,
					mapping,
					nested_select,
					column_prefix,
					columns,
					executor,
					in_nested,
					&mut product,
				)?;
				prop_found |= applied;
				continue;
			}
			let value = self.column_value(rs, mapping, column_prefix, columns)?;
			let non_null = !value.is_null();
			prop_found |= non_null;
			if mapping.id_flag {
				id_found |= non_null;
			}
			if let Some(property) = &mapping.property {
				if non_null || self.configuration.settings().call_setters_on_nulls {
					set_property(&mut product.value, property, value);
				}
			}
		}

		prop_found |= self.apply_auto_mapping(
			rs,
			map,
			column_prefix,
			columns,
			reflector.as_ref(),
			&mut product.value,
		)?;

		let has_ids = map.id_mappings().next().is_some();
		product.found = if has_ids { id_found } else { prop_found || ctor_found };
		Ok(product)
	}

	#[allow(clippy::too_many_arguments)]
	fn apply_same_row_nested(
		&self,
		rs: &dyn ResultSet,
		mapping: &ResultMapping,
		nested_map_id: &str,
		column_prefix: Option<&str>,
		columns: &ColumnIndex,
		executor: &mut dyn Executor,
		product: &mut RowProduct,
	) -> Result<bool, ExecutorError> {
		let nested_map = self.configuration.result_map(nested_map_id).ok_or_else(|| {
			ExecutorError::mapping(
				&self.ms.id,
				format!("nested result map '{nested_map_id}' is not registered"),
			)
		})?;
		let prefix = combine_prefix(column_prefix, mapping.column_prefix.as_deref());
		if !self.not_null_columns_satisfied(rs, mapping, prefix.as_deref(), columns)? {
			return Ok(false);
		}
		let nested_map = self.resolve_discriminator(&nested_map, rs, columns)?;
		let child =
			self.row_value(rs, &nested_map, prefix.as_deref(), columns, executor, true, true)?;
		if !child.found {
			return Ok(false);
		}
		let Some(property) = &mapping.property else { return Ok(false) };
		let collection = self.is_collection(mapping);
		for deferred in child.deferred {
			product.deferred.push(RowDeferred {
				path: format!("{property}.{}", deferred.path),
				..deferred
			});
		}
		if collection {
			push_collection_item(&mut product.value, property, child.value);
		} else {
			set_property(&mut product.value, property, child.value);
		}
		Ok(true)
	}

	#[allow(clippy::too_many_arguments)]
	fn apply_nested_select(
		&self,
		rs: &dyn ResultSet,
		mapping: &ResultMapping,
		nested_select: &str,
		column_prefix: Option<&str>,
		columns: &ColumnIndex,
		executor: &mut dyn Executor,
		in_nested: bool,
		product: &mut RowProduct,
	) -> Result<bool, ExecutorError> {
		let Some(property) = &mapping.property else { return Ok(false) };
		let nested_ms = self.configuration.mapped_statement(nested_select).ok_or_else(|| {
			ExecutorError::mapping(
				&self.ms.id,
				format!("nested select '{nested_select}' is not registered"),
			)
		})?;
		let prefix = combine_prefix(column_prefix, mapping.column_prefix.as_deref());
		let Some(mut nested_param) =
			self.nested_select_parameter(rs, mapping, prefix.as_deref(), columns)?
		else {
			return Ok(false);
		};
		let single = self.is_single(mapping);
		let bound = nested_ms.bound_sql(&self.configuration, &nested_param)?;
		let key =
			executor.create_cache_key(&nested_ms, &nested_param, RowBounds::DEFAULT, &bound);
		if executor.is_in_flight(&key) {
			if in_nested {
				// joined grouping cannot take a patch address; leave it unset
				warn!(
					statement = %self.ms.id,
					property = %property,
					"circular nested select inside a joined mapping left unresolved"
				);
				return Ok(false);
			}
			product.deferred.push(RowDeferred {
				path: property.clone(),
				key,
				statement_id: nested_ms.id.clone(),
				single,
			});
			return Ok(true);
		}
		let lazy = mapping.lazy && !in_nested;
		if lazy {
			product.loaders.push(ResultLoader {
				statement_id: nested_ms.id.clone(),
				parameter: nested_param,
				row: 0,
				target_path: property.clone(),
				single,
			});
			return Ok(true);
		}
		let outcome = executor.query(&nested_ms, &mut nested_param, RowBounds::DEFAULT, None)?;
		for patch in outcome.deferred {
			// a nested query bubbled its own circular reference upward
			product.deferred.push(RowDeferred {
				path: if single {
					format!("{property}.{}", patch.path)
				} else {
					format!("{property}[{}].{}", patch.row, patch.path)
				},
				key: patch.key,
				statement_id: patch.statement_id,
				single: patch.single,
			});
		}
		let shaped = loader::shape_rows(outcome.rows, single);
		let non_null = !shaped.is_null();
		set_property(&mut product.value, property, shaped);
		Ok(non_null)
	}

	fn nested_select_parameter(
		&self,
		rs: &dyn ResultSet,
		mapping: &ResultMapping,
		prefix: Option<&str>,
		columns: &ColumnIndex,
	) -> Result<Option<Value>, ExecutorError> {
		if mapping.composites.is_empty() {
			let Some(column) = &mapping.column else { return Ok(None) };
			let Some(index) = columns.find(&prefixed(prefix, column)) else {
				return Ok(None);
			};
			let value =
				rs.get(index).map_err(|e| ExecutorError::driver(&self.ms.id, "<column>", e))?;
			return Ok(if value.is_null() { None } else { Some(value) });
		}
		let mut object = ValueMap::new();
		let mut any = false;
		for (property, column) in &mapping.composites {
			let value = match columns.find(&prefixed(prefix, column)) {
				Some(index) => rs
					.get(index)
					.map_err(|e| ExecutorError::driver(&self.ms.id, "<column>", e))?,
				None => Value::Null,
			};
			any |= !value.is_null();
			object.insert(property.clone(), value);
		}
		Ok(any.then_some(Value::Object(object)))
	}

	fn build_relation(
		&self,
		rs: &dyn ResultSet,
		mapping: &ResultMapping,
		result_set: &str,
		column_prefix: Option<&str>,
		columns: &ColumnIndex,
	) -> Result<RowRelation, ExecutorError> {
		let property = mapping.property.clone().ok_or_else(|| {
			ExecutorError::mapping(&self.ms.id, "a resultSet mapping requires a property")
		})?;
		let nested_map_id = mapping.nested_result_map_id.clone().ok_or_else(|| {
			ExecutorError::mapping(
				&self.ms.id,
				format!("resultSet mapping '{property}' requires a nested result map"),
			)
		})?;
		let parent_columns = split_columns(mapping.column.as_deref());
		let foreign_columns = split_columns(mapping.foreign_column.as_deref());
		if parent_columns.is_empty() || parent_columns.len() != foreign_columns.len() {
			return Err(ExecutorError::mapping(
				&self.ms.id,
				format!("resultSet mapping '{property}' needs matching column/foreignColumn lists"),
			));
		}
		let mut join_values = Vec::with_capacity(parent_columns.len());
		for column in &parent_columns {
			let index = columns.find(&prefixed(column_prefix, column)).ok_or_else(|| {
				ExecutorError::mapping(
					&self.ms.id,
					format!("join column '{column}' missing from the primary result set"),
				)
			})?;
			join_values.push(
				rs.get(index)
					.map_err(|e| ExecutorError::driver(&self.ms.id, "<column>", e))?,
			);
		}
		Ok(RowRelation {
			result_set: result_set.to_string(),
			property,
			join_values,
			foreign_columns,
			nested_map_id,
			single: self.is_single(mapping),
		})
	}

	/// Maps a named extra result set and attaches its rows to the parents
	/// recorded while the primary set was read.
	fn handle_linked_result_set(
		&self,
		rs: &mut dyn ResultSet,
		set_name: &str,
		pending_relations: &mut Vec<PendingRelation>,
		mapped_sets: &mut [Vec<Value>],
		executor: &mut dyn Executor,
	) -> Result<(), ExecutorError> {
		let columns =
			ColumnIndex::new(rs.columns(), self.configuration.settings().use_column_label);
		let relations: Vec<PendingRelation> = pending_relations
			.extract_if(.., |p| p.relation.result_set == set_name)
			.collect();
		let Some(primary) = mapped_sets.first_mut() else { return Ok(()) };
		while self.advance(rs)? {
			let Some(first) = relations.first() else { break };
			let map = self
				.configuration
				.result_map(&first.relation.nested_map_id)
				.ok_or_else(|| {
					ExecutorError::mapping(
						&self.ms.id,
						format!(
							"result map '{}' for result set '{set_name}' is not registered",
							first.relation.nested_map_id
						),
					)
				})?;
			let map = self.resolve_discriminator(&map, rs, &columns)?;
			let product = self.row_value(rs, &map, None, &columns, executor, true, true)?;
			if !product.found {
				continue;
			}
			let mut child_join = Vec::with_capacity(first.relation.foreign_columns.len());
			for column in &first.relation.foreign_columns {
				let index = columns.find(column).ok_or_else(|| {
					ExecutorError::mapping(
						&self.ms.id,
						format!("foreign column '{column}' missing from result set '{set_name}'"),
					)
				})?;
				child_join.push(
					rs.get(index)
						.map_err(|e| ExecutorError::driver(&self.ms.id, "<column>", e))?,
				);
			}
			for pending in &relations {
				if pending.relation.join_values == child_join {
					let Some(parent) = primary.get_mut(pending.row) else { continue };
					if pending.relation.single {
						set_property(parent, &pending.relation.property, product.value.clone());
					} else {
						push_collection_item(
							parent,
							&pending.relation.property,
							product.value.clone(),
						);
					}
				}
			}
		}
		Ok(())
	}

	/// Joined-rows path: rows group by the composite of ID column values at
	/// each level, parents deduplicate across rows, and child collections
	/// append in first-seen order.
	fn handle_nested_rows(
		&self,
		rs: &mut dyn ResultSet,
		map: &Arc<ResultMap>,
		columns: &ColumnIndex,
		executor: &mut dyn Executor,
		mut result_handler: Option<&mut dyn ResultHandler>,
	) -> Result<Vec<Value>, ExecutorError> {
		let mut state = NestedState::default();
		self.skip_offset(rs)?;
		let mut read = 0usize;
		while read < self.row_bounds.limit && self.advance(rs)? {
			read += 1;
			let resolved = self.resolve_discriminator(map, rs, columns)?;
			self.upsert_nested(rs, &resolved, None, "", columns, executor, &mut state)?;
		}
		let mut rows = Vec::with_capacity(state.order.len());
		for key in &state.order {
			let row = state.assemble(key);
			if let Some(handler) = result_handler.as_deref_mut() {
				let context = ResultContext { row, result_count: rows.len() + 1 };
				if !handler.handle_result(&context) {
					break;
				}
			} else {
				rows.push(row);
			}
		}
		Ok(rows)
	}

	#[allow(clippy::too_many_arguments)]
	fn upsert_nested(
		&self,
		rs: &dyn ResultSet,
		map: &Arc<ResultMap>,
		column_prefix: Option<&str>,
		parent_key: &str,
		columns: &ColumnIndex,
		executor: &mut dyn Executor,
		state: &mut NestedState,
	) -> Result<Option<String>, ExecutorError> {
		let row_key = self.row_key(rs, map, column_prefix, columns)?;
		let absolute = match &row_key {
			Some(key) => format!("{parent_key}\u{1}{}:{key}", map.id),
			None => {
				state.unique += 1;
				format!("{parent_key}\u{1}{}#{}", map.id, state.unique)
			}
		};
		if !state.objects.contains_key(&absolute) {
			let product = self.row_value(rs, map, column_prefix, columns, executor, true, false)?;
			if !product.found {
				return Ok(None);
			}
			state.objects.insert(absolute.clone(), product.value);
			if parent_key.is_empty() {
				state.order.push(absolute.clone());
			}
		}
		for mapping in map.property_mappings() {
			if mapping.result_set.is_some() {
				continue;
			}
			let Some(nested_map_id) = &mapping.nested_result_map_id else { continue };
			let Some(property) = &mapping.property else { continue };
			let nested_map =
				self.configuration.result_map(nested_map_id).ok_or_else(|| {
					ExecutorError::mapping(
						&self.ms.id,
						format!("nested result map '{nested_map_id}' is not registered"),
					)
				})?;
			let prefix = combine_prefix(column_prefix, mapping.column_prefix.as_deref());
			if !self.not_null_columns_satisfied(rs, mapping, prefix.as_deref(), columns)? {
				continue;
			}
			let nested_map = self.resolve_discriminator(&nested_map, rs, columns)?;
			let child_key = self.upsert_nested(
				rs,
				&nested_map,
				prefix.as_deref(),
				&absolute,
				columns,
				executor,
				state,
			)?;
			if let Some(child_key) = child_key {
				let seen_key = format!("{absolute}\u{2}{property}\u{2}{child_key}");
				if state.seen.insert(seen_key) {
					state.attachments.push(Attachment {
						parent: absolute.clone(),
						property: property.clone(),
						child: child_key,
						collection: self.is_collection(mapping),
					});
				}
			}
		}
		Ok(Some(absolute))
	}

	/// Composite of the grouping (ID) column values; None when every
	/// grouping column is null, which disables deduplication for the row.
	fn row_key(
		&self,
		rs: &dyn ResultSet,
		map: &Arc<ResultMap>,
		column_prefix: Option<&str>,
		columns: &ColumnIndex,
	) -> Result<Option<String>, ExecutorError> {
		let mut parts = Vec::new();
		let mut any = false;
		for mapping in map.grouping_mappings() {
			if mapping.nested_result_map_id.is_some() {
				continue;
			}
			let Some(column) = &mapping.column else { continue };
			let value = match columns.find(&prefixed(column_prefix, column)) {
				Some(index) => rs
					.get(index)
					.map_err(|e| ExecutorError::driver(&self.ms.id, "<column>", e))?,
				None => Value::Null,
			};
			any |= !value.is_null();
			parts.push(value.canonical());
		}
		Ok((any && !parts.is_empty()).then(|| parts.join("\u{3}")))
	}

	fn not_null_columns_satisfied(
		&self,
		rs: &dyn ResultSet,
		mapping: &ResultMapping,
		prefix: Option<&str>,
		columns: &ColumnIndex,
	) -> Result<bool, ExecutorError> {
		for column in &mapping.not_null_columns {
			let Some(index) = columns.find(&prefixed(prefix, column)) else {
				return Ok(false);
			};
			let value =
				rs.get(index).map_err(|e| ExecutorError::driver(&self.ms.id, "<column>", e))?;
			if value.is_null() {
				return Ok(false);
			}
		}
		Ok(true)
	}

	fn column_value(
		&self,
		rs: &dyn ResultSet,
		mapping: &ResultMapping,
		column_prefix: Option<&str>,
		columns: &ColumnIndex,
	) -> Result<Value, ExecutorError> {
		let Some(column) = &mapping.column else { return Ok(Value::Null) };
		let Some(index) = columns.find(&prefixed(column_prefix, column)) else {
			return Ok(Value::Null);
		};
		let handler = self.handler_for(
			mapping.type_handler.as_ref(),
			mapping.java_type.as_ref(),
			mapping.jdbc_type,
		)?;
		handler
			.get_result(rs, index)
			.map_err(|e| ExecutorError::type_error(&self.ms.id, e))
	}

	fn handler_for(
		&self,
		explicit: Option<&Arc<dyn TypeHandler>>,
		java_type: Option<&JavaType>,
		jdbc_type: Option<grappelli_core::types::JdbcType>,
	) -> Result<Arc<dyn TypeHandler>, ExecutorError> {
		if let Some(handler) = explicit {
			return Ok(Arc::clone(handler));
		}
		match java_type {
			None => Ok(self.configuration.type_handlers().unknown()),
			Some(java) => Ok(self
				.configuration
				.resolve_type_handler(Some(java), jdbc_type)
				.unwrap_or_else(|_| self.configuration.type_handlers().unknown())),
		}
	}

	/// Binds discovered, unmapped columns to same-named properties per the
	/// configured policy.
	fn apply_auto_mapping(
		&self,
		rs: &dyn ResultSet,
		map: &Arc<ResultMap>,
		column_prefix: Option<&str>,
		columns: &ColumnIndex,
		reflector: Option<&Arc<Reflector>>,
		target: &mut Value,
	) -> Result<bool, ExecutorError> {
		let settings = self.configuration.settings();
		let enabled = match map.auto_mapping {
			Some(explicit) => explicit,
			None => match settings.auto_mapping_behavior {
				AutoMappingBehavior::None => false,
				AutoMappingBehavior::Partial => !map.has_nested_result_maps(),
				AutoMappingBehavior::Full => true,
			},
		};
		if !enabled {
			return Ok(false);
		}
		let mut found = false;
		for (name, index) in columns.names(settings.use_column_label) {
			let unprefixed = match column_prefix {
				None => name,
				Some(prefix) => {
					if name.len() > prefix.len()
						&& name[..prefix.len()].eq_ignore_ascii_case(prefix)
					{
						&name[prefix.len()..]
					} else {
						continue;
					}
				}
			};
			if map.has_mapped_column(unprefixed) {
				continue;
			}
			let property = self.auto_map_property(unprefixed, reflector)?;
			let Some(property) = property else {
				match settings.auto_mapping_unknown_column_behavior {
					AutoMappingUnknownColumnBehavior::None => {}
					AutoMappingUnknownColumnBehavior::Warning => {
						warn!(
							statement = %self.ms.id,
							column = %unprefixed,
							"no writable property matches auto-mapped column"
						);
					}
					AutoMappingUnknownColumnBehavior::Failing => {
						return Err(ExecutorError::mapping(
							&self.ms.id,
							format!("no writable property matches column '{unprefixed}'"),
						));
					}
				}
				continue;
			};
			if map.has_mapped_property(&property) {
				continue;
			}
			let java_type = reflector.and_then(|r| r.property_type(&property).cloned());
			let handler = self.handler_for(None, java_type.as_ref(), None)?;
			let value = handler
				.get_result(rs, index)
				.map_err(|e| ExecutorError::type_error(&self.ms.id, e))?;
			if !value.is_null() {
				found = true;
				set_property(target, &property, value);
			} else if settings.call_setters_on_nulls {
				set_property(target, &property, Value::Null);
			}
		}
		Ok(found)
	}

	fn auto_map_property(
		&self,
		column: &str,
		reflector: Option<&Arc<Reflector>>,
	) -> Result<Option<String>, ExecutorError> {
		let candidate = if self.configuration.settings().map_underscore_to_camel_case {
			meta::underscore_to_camel(&column.to_lowercase())
		} else {
			column.to_lowercase()
		};
		match reflector {
			None => Ok(Some(candidate)),
			Some(reflector) => {
				let found = reflector.find_property(&candidate)?;
				match found {
					Some(name) if reflector.is_writable(name) => Ok(Some(name.to_string())),
					_ => Ok(None),
				}
			}
		}
	}

	/// Projects the current row through a flat map, without an executor.
	/// Used by cursors; nested mappings were rejected at cursor creation,
	/// and a discriminator case that reintroduces them is an error here.
	pub(crate) fn flat_row(
		&self,
		rs: &dyn ResultSet,
		map_id: &str,
		columns: &ColumnIndex,
	) -> Result<Option<Value>, ExecutorError> {
		let map = self.configuration.result_map(map_id).ok_or_else(|| {
			ExecutorError::mapping(&self.ms.id, format!("result map '{map_id}' is not registered"))
		})?;
		let map = self.resolve_discriminator(&map, rs, columns)?;
		if map.has_nested_result_maps() || map.has_nested_selects() {
			return Err(ExecutorError::mapping(
				&self.ms.id,
				format!("result map '{}' is not flat enough for a cursor", map.id),
			));
		}
		let reflector = self.reflector_for(&map.type_);
		let mut value = Value::Object(ValueMap::new());
		let mut id_found = false;
		let mut prop_found = false;
		let mut ctor_found = false;
		let ctor_names: Vec<String> = map
			.constructor_mappings()
			.map(|m| m.property.clone().unwrap_or_default())
			.collect();
		if !ctor_names.is_empty() {
			if let Some(reflector) = &reflector {
				reflector.find_constructor(&ctor_names)?;
			}
			for mapping in map.constructor_mappings() {
				let arg = self.column_value(rs, mapping, None, columns)?;
				ctor_found |= !arg.is_null();
				if let Some(name) = &mapping.property {
					set_property(&mut value, name, arg);
				}
			}
		}
		for mapping in map.property_mappings() {
			let column_value = self.column_value(rs, mapping, None, columns)?;
			let non_null = !column_value.is_null();
			prop_found |= non_null;
			if mapping.id_flag {
				id_found |= non_null;
			}
			if let Some(property) = &mapping.property {
				if non_null || self.configuration.settings().call_setters_on_nulls {
					set_property(&mut value, property, column_value);
				}
			}
		}
		prop_found |=
			self.apply_auto_mapping(rs, &map, None, columns, reflector.as_ref(), &mut value)?;
		let has_ids = map.id_mappings().next().is_some();
		let found = if has_ids { id_found } else { prop_found || ctor_found };
		if found || self.configuration.settings().return_instance_for_empty_row {
			Ok(Some(value))
		} else {
			Ok(None)
		}
	}

	fn reflector_for(&self, java_type: &JavaType) -> Option<Arc<Reflector>> {
		let descriptor = {
			let aliases = self.configuration.type_aliases();
			aliases.descriptor_for(java_type).cloned()
		};
		descriptor.map(|d| self.configuration.reflectors().find_for(&d))
	}

	fn is_collection(&self, mapping: &ResultMapping) -> bool {
		if mapping.java_type == Some(JavaType::List) {
			return true;
		}
		false
	}

	fn is_single(&self, mapping: &ResultMapping) -> bool {
		!self.is_collection(mapping)
	}
}

#[derive(Default)]
struct NestedState {
	objects: HashMap<String, Value>,
	order: Vec<String>,
	attachments: Vec<Attachment>,
	seen: HashSet<String>,
	unique: u64,
}

struct Attachment {
	parent: String,
	property: String,
	child: String,
	collection: bool,
}

impl NestedState {
	fn assemble(&self, key: &str) -> Value {
		let mut object = self.objects.get(key).cloned().unwrap_or(Value::Null);
		for attachment in self.attachments.iter().filter(|a| a.parent == key) {
			let child = self.assemble(&attachment.child);
			if attachment.collection {
				push_collection_item(&mut object, &attachment.property, child);
			} else {
				set_property(&mut object, &attachment.property, child);
			}
		}
		object
	}
}

fn set_property(target: &mut Value, property: &str, value: Value) {
	meta::set_path(target, property, value);
}

fn push_collection_item(target: &mut Value, property: &str, item: Value) {
	if let Some(map) = target.as_object_mut() {
		let slot = map
			.entry(property.to_string())
			.or_insert_with(|| Value::Array(Vec::new()));
		if let Value::Array(items) = slot {
			items.push(item);
		}
	}
}

fn combine_prefix(outer: Option<&str>, inner: Option<&str>) -> Option<String> {
	match (outer, inner) {
		(None, None) => None,
		(Some(o), None) => Some(o.to_string()),
		(None, Some(i)) => Some(i.to_string()),
		(Some(o), Some(i)) => Some(format!("{o}{i}")),
	}
}

fn prefixed(prefix: Option<&str>, column: &str) -> String {
	match prefix {
		None => column.to_string(),
		Some(prefix) => format!("{prefix}{column}"),
	}
}

fn split_columns(spec: Option<&str>) -> Vec<String> {
	spec.map(|s| s.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect())
		.unwrap_or_default()
}
