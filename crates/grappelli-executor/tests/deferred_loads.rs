//! Nested selects whose prerequisite rows are still materializing: the
//! load queues and drains once the outer result completes.

use std::sync::Arc;

use grappelli_core::meta::MetaValue;
use grappelli_core::transaction::TransactionFactory;
use grappelli_core::types::{JavaType, JdbcType};
use grappelli_core::value::Value;
use grappelli_executor::executor::{new_executor, Executor};
use grappelli_executor::DriverTransactionFactory;
use grappelli_mapping::{
	Configuration, ExecutorType, MappedStatement, ParameterMapping, ResultMap, ResultMapping,
	RowBounds, SqlCommandType, StaticSqlSource,
};
use grappelli_test::StubDataSource;

fn build_self_referential(configuration: &Configuration) -> Arc<MappedStatement> {
	let mut id_mapping = ResultMapping::new(Some("id".into()), Some("id".into()));
	id_mapping.id_flag = true;
	id_mapping.java_type = Some(JavaType::Long);
	let mut self_ref = ResultMapping::new(Some("selfRef".into()), Some("id".into()));
	self_ref.nested_select_id = Some("n.find".into());
	let map = ResultMap::builder("n.nodeMap", JavaType::Map)
		.mapping(id_mapping)
		.mapping(self_ref)
		.auto_mapping(Some(false))
		.build()
		.unwrap();
	configuration.add_result_map(map).unwrap();

	let mut param = ParameterMapping::new("id");
	param.java_type = Some(JavaType::Long);
	Arc::new(
		MappedStatement::builder(
			"n.find",
			SqlCommandType::Select,
			Arc::new(StaticSqlSource::new(
				"SELECT * FROM node WHERE id = ?".to_string(),
				vec![param],
			)),
		)
		.result_map_ids(vec!["n.nodeMap".to_string()])
		.build(),
	)
}

#[test]
fn test_self_referential_nested_select_defers_then_patches() {
	let mut configuration = Configuration::new();
	configuration.settings_mut().cache_enabled = false;
	let configuration = Arc::new(configuration);
	let ds = StubDataSource::new();
	ds.when("FROM node").rows(&[("id", JdbcType::BigInt)], vec![vec![Value::Int(1)]]);

	let ms = build_self_referential(&configuration);
	configuration.add_mapped_statement(Arc::clone(&ms)).unwrap();

	let transaction = DriverTransactionFactory.new_transaction(&ds, true).unwrap();
	let mut executor = new_executor(Arc::clone(&configuration), transaction, ExecutorType::Simple);

	let mut parameter = Value::Int(1);
	let outcome = executor.query(&ms, &mut parameter, RowBounds::DEFAULT, None).unwrap();

	// one round-trip: the nested select was satisfied from the session cache
	assert_eq!(ds.execution_count("FROM node"), 1);
	assert_eq!(outcome.rows.len(), 1);
	assert!(outcome.deferred.is_empty());
	let row = &outcome.rows[0];
	assert_eq!(MetaValue::new(row).get("id"), Some(&Value::Int(1)));
	// the deferred association resolved to the row itself, one level deep
	assert_eq!(MetaValue::new(row).get("selfRef.id"), Some(&Value::Int(1)));
}
