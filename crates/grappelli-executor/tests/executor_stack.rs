//! Executor stack behavior against the stub driver: first-level caching,
//! batch flushing, key generation, and callable output parameters.

use std::sync::Arc;

use grappelli_core::transaction::TransactionFactory;
use grappelli_core::types::{JavaType, JdbcType};
use grappelli_core::value::Value;
use grappelli_executor::executor::{new_executor, Executor, PENDING_UPDATE_COUNT};
use grappelli_executor::DriverTransactionFactory;
use grappelli_mapping::{
	Configuration, ExecutorType, KeyGeneratorKind, LocalCacheScope, MappedStatement,
	ParameterMapping, ParameterMode, RowBounds, SqlCommandType, StaticSqlSource, StatementType,
};
use grappelli_test::StubDataSource;

fn configuration() -> Arc<Configuration> {
	let mut configuration = Configuration::new();
	// keep these tests on the bare executor stack
	configuration.settings_mut().cache_enabled = false;
	Arc::new(configuration)
}

fn executor(
	configuration: &Arc<Configuration>,
	ds: &StubDataSource,
	executor_type: ExecutorType,
) -> Box<dyn Executor> {
	let transaction = DriverTransactionFactory
		.new_transaction(ds, true)
		.expect("stub transaction");
	new_executor(Arc::clone(configuration), transaction, executor_type)
}

fn select_statement(configuration: &Arc<Configuration>, id: &str, sql: &str) -> Arc<MappedStatement> {
	let inline_id = format!("{id}-Inline");
	if configuration.result_map(&inline_id).is_none() {
		configuration
			.add_result_map(
				grappelli_mapping::ResultMap::builder(&inline_id, JavaType::Map)
					.build()
					.unwrap(),
			)
			.unwrap();
	}
	Arc::new(
		MappedStatement::builder(
			id,
			SqlCommandType::Select,
			Arc::new(StaticSqlSource::new(sql.to_string(), vec![])),
		)
		.result_map_ids(vec![inline_id])
		.build(),
	)
}

fn insert_statement(
	id: &str,
	sql: &str,
	mappings: Vec<ParameterMapping>,
) -> Arc<MappedStatement> {
	Arc::new(
		MappedStatement::builder(
			id,
			SqlCommandType::Insert,
			Arc::new(StaticSqlSource::new(sql.to_string(), mappings)),
		)
		.build(),
	)
}

fn blog_rows() -> Vec<Vec<Value>> {
	vec![
		vec![Value::Int(1), Value::from("one")],
		vec![Value::Int(2), Value::from("two")],
	]
}

const BLOG_COLUMNS: &[(&str, JdbcType)] =
	&[("id", JdbcType::BigInt), ("title", JdbcType::Varchar)];

#[test]
fn test_first_level_cache_hits_within_session() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(BLOG_COLUMNS, blog_rows());
	let mut executor = executor(&configuration, &ds, ExecutorType::Simple);
	let ms = select_statement(&configuration, "blog.findAll", "SELECT * FROM blog");

	let mut parameter = Value::Null;
	let first = executor.query(&ms, &mut parameter, RowBounds::DEFAULT, None).unwrap();
	let second = executor.query(&ms, &mut parameter, RowBounds::DEFAULT, None).unwrap();
	assert_eq!(first.rows, second.rows);
	assert_eq!(ds.execution_count("FROM blog"), 1);
}

#[test]
fn test_write_invalidates_first_level_cache() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(BLOG_COLUMNS, blog_rows());
	ds.when("INSERT INTO blog").affected(1);
	let mut executor = executor(&configuration, &ds, ExecutorType::Simple);
	let ms = select_statement(&configuration, "blog.findAll", "SELECT * FROM blog");
	let insert =
		insert_statement("blog.create", "INSERT INTO blog (title) VALUES (?)", vec![]);

	let mut parameter = Value::Null;
	executor.query(&ms, &mut parameter, RowBounds::DEFAULT, None).unwrap();
	executor.update(&insert, &mut Value::Null).unwrap();
	executor.query(&ms, &mut parameter, RowBounds::DEFAULT, None).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
}

#[test]
fn test_statement_scope_disables_session_caching() {
	let mut configuration = Configuration::new();
	configuration.settings_mut().cache_enabled = false;
	configuration.settings_mut().local_cache_scope = LocalCacheScope::Statement;
	let configuration = Arc::new(configuration);
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(BLOG_COLUMNS, blog_rows());
	let mut executor = executor(&configuration, &ds, ExecutorType::Simple);
	let ms = select_statement(&configuration, "blog.findAll", "SELECT * FROM blog");

	let mut parameter = Value::Null;
	executor.query(&ms, &mut parameter, RowBounds::DEFAULT, None).unwrap();
	executor.query(&ms, &mut parameter, RowBounds::DEFAULT, None).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
}

#[test]
fn test_distinct_parameters_produce_distinct_cache_keys() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(BLOG_COLUMNS, blog_rows());
	let mut executor = executor(&configuration, &ds, ExecutorType::Simple);
	let mut with_id = ParameterMapping::new("id");
	with_id.java_type = Some(JavaType::Long);
	let inline = select_statement(&configuration, "blog.one", "ignored");
	let ms = Arc::new(
		MappedStatement::builder(
			"blog.one",
			SqlCommandType::Select,
			Arc::new(StaticSqlSource::new(
				"SELECT * FROM blog WHERE id = ?".to_string(),
				vec![with_id],
			)),
		)
		.result_map_ids(inline.result_map_ids.clone())
		.build(),
	);

	let mut one = Value::Object([("id".to_string(), Value::Int(1))].into_iter().collect());
	let mut two = Value::Object([("id".to_string(), Value::Int(2))].into_iter().collect());
	executor.query(&ms, &mut one, RowBounds::DEFAULT, None).unwrap();
	executor.query(&ms, &mut two, RowBounds::DEFAULT, None).unwrap();
	executor.query(&ms, &mut one, RowBounds::DEFAULT, None).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
}

#[test]
fn test_batch_executor_flushes_on_demand() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("INSERT INTO blog").affected(1);
	let mut executor = executor(&configuration, &ds, ExecutorType::Batch);
	let mut title = ParameterMapping::new("title");
	title.java_type = Some(JavaType::String);
	let insert = insert_statement(
		"blog.create",
		"INSERT INTO blog (title) VALUES (?)",
		vec![title],
	);

	let mut first = Value::Object([("title".to_string(), Value::from("a"))].into_iter().collect());
	let mut second = Value::Object([("title".to_string(), Value::from("b"))].into_iter().collect());
	assert_eq!(executor.update(&insert, &mut first).unwrap(), PENDING_UPDATE_COUNT);
	assert_eq!(executor.update(&insert, &mut second).unwrap(), PENDING_UPDATE_COUNT);

	let results = executor.flush_statements().unwrap();
	assert_eq!(results.len(), 1);
	assert_eq!(results[0].update_counts, vec![1, 1]);
	assert_eq!(results[0].parameters.len(), 2);
	// both parameter sets went through one shared statement
	assert_eq!(ds.executed().iter().filter(|e| e.batched).count(), 2);
}

#[test]
fn test_batch_executor_flushes_before_reads() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("INSERT INTO blog").affected(1);
	ds.when("FROM blog").rows(BLOG_COLUMNS, blog_rows());
	let mut executor = executor(&configuration, &ds, ExecutorType::Batch);
	let insert =
		insert_statement("blog.create", "INSERT INTO blog (title) VALUES (?)", vec![]);
	let ms = select_statement(&configuration, "blog.findAll", "SELECT * FROM blog");

	executor.update(&insert, &mut Value::Null).unwrap();
	let outcome = executor.query(&ms, &mut Value::Null, RowBounds::DEFAULT, None).unwrap();
	assert_eq!(outcome.rows.len(), 2);
	let log = ds.executed();
	let batch_position = log.iter().position(|e| e.batched).unwrap();
	let read_position = log.iter().position(|e| e.sql.contains("FROM blog")).unwrap();
	assert!(batch_position < read_position);
}

#[test]
fn test_reuse_executor_prepares_once_per_sql() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(BLOG_COLUMNS, blog_rows());
	let mut executor = executor(&configuration, &ds, ExecutorType::Reuse);
	let ms = select_statement(&configuration, "blog.findAll", "SELECT * FROM blog");

	executor.query(&ms, &mut Value::Null, RowBounds::DEFAULT, None).unwrap();
	executor.clear_local_cache();
	executor.query(&ms, &mut Value::Null, RowBounds::DEFAULT, None).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
}

#[test]
fn test_driver_generated_keys_written_back() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("INSERT INTO blog")
		.affected(1)
		.generated_keys(&[("id", JdbcType::BigInt)], vec![vec![Value::Int(42)]]);
	let mut executor = executor(&configuration, &ds, ExecutorType::Simple);
	let insert = Arc::new(
		MappedStatement::builder(
			"blog.create",
			SqlCommandType::Insert,
			Arc::new(StaticSqlSource::new(
				"INSERT INTO blog (title) VALUES (?)".to_string(),
				vec![],
			)),
		)
		.key_generator(KeyGeneratorKind::Driver)
		.key_properties(vec!["id".to_string()])
		.build(),
	);

	let mut parameter =
		Value::Object([("title".to_string(), Value::from("jazz"))].into_iter().collect());
	let affected = executor.update(&insert, &mut parameter).unwrap();
	assert_eq!(affected, 1);
	assert_eq!(
		grappelli_core::meta::MetaValue::new(&parameter).get("id"),
		Some(&Value::Int(42))
	);
}

#[test]
fn test_select_key_runs_before_the_insert() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("nextval").rows(&[("id", JdbcType::BigInt)], vec![vec![Value::Int(7)]]);
	ds.when("INSERT INTO blog").affected(1);

	let key_statement = Arc::new(
		MappedStatement::builder(
			"blog.create!selectKey",
			SqlCommandType::Select,
			Arc::new(StaticSqlSource::new("SELECT seq.nextval".to_string(), vec![])),
		)
		.key_properties(vec!["id".to_string()])
		.use_cache(false)
		.build(),
	);
	configuration.add_mapped_statement(key_statement).unwrap();

	let mut id_mapping = ParameterMapping::new("id");
	id_mapping.java_type = Some(JavaType::Long);
	let insert = Arc::new(
		MappedStatement::builder(
			"blog.create",
			SqlCommandType::Insert,
			Arc::new(StaticSqlSource::new(
				"INSERT INTO blog (id) VALUES (?)".to_string(),
				vec![id_mapping],
			)),
		)
		.key_generator(KeyGeneratorKind::SelectKey {
			statement_id: "blog.create!selectKey".to_string(),
			execute_before: true,
		})
		.key_properties(vec!["id".to_string()])
		.build(),
	);

	let mut executor = executor(&configuration, &ds, ExecutorType::Simple);
	let mut parameter = Value::Object(Default::default());
	executor.update(&insert, &mut parameter).unwrap();
	// the generated id was available to the insert's own bindings
	let insert_execution = ds
		.executed()
		.into_iter()
		.find(|e| e.sql.contains("INSERT INTO blog"))
		.unwrap();
	assert_eq!(insert_execution.parameters, vec![Value::Int(7)]);
}

#[test]
fn test_callable_out_parameter_written_back() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	ds.when("CALL count_blogs").affected(0).out_value(0, Value::Int(12));

	let mut out = ParameterMapping::new("total");
	out.mode = ParameterMode::Out;
	out.jdbc_type = Some(JdbcType::Integer);
	let call = Arc::new(
		MappedStatement::builder(
			"blog.countBlogs",
			SqlCommandType::Update,
			Arc::new(StaticSqlSource::new("CALL count_blogs(?)".to_string(), vec![out])),
		)
		.statement_type(StatementType::Callable)
		.build(),
	);

	let mut executor = executor(&configuration, &ds, ExecutorType::Simple);
	let mut parameter = Value::Object(Default::default());
	executor.update(&call, &mut parameter).unwrap();
	assert_eq!(
		grappelli_core::meta::MetaValue::new(&parameter).get("total"),
		Some(&Value::Int(12))
	);
}

#[test]
fn test_closed_executor_rejects_work() {
	let configuration = configuration();
	let ds = StubDataSource::new();
	let mut executor = executor(&configuration, &ds, ExecutorType::Simple);
	executor.close(false).unwrap();
	assert!(executor.is_closed());
	let ms = select_statement(&configuration, "blog.findAll", "SELECT * FROM blog");
	assert!(executor.query(&ms, &mut Value::Null, RowBounds::DEFAULT, None).is_err());
}
