//! Cache-layer behavior across sessions: the shared second-level cache with
//! transactional staging, write-through invalidation, and first-level
//! identity inside one session.

mod common;

use grappelli::Value;
use grappelli_core::types::JdbcType;
use grappelli_test::StubDataSource;

const CACHED_MAPPER: &str = r#"
<mapper namespace="b">
	<cache readOnly="true"/>
	<select id="find" resultType="map">SELECT * FROM blog</select>
	<update id="touch">UPDATE blog SET title = 'x'</update>
	<select id="uncached" resultType="map" useCache="false">SELECT * FROM blog</select>
</mapper>
"#;

fn stub() -> StubDataSource {
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(
		&[("id", JdbcType::BigInt), ("title", JdbcType::Varchar)],
		vec![vec![Value::Int(1), Value::from("jazz")]],
	);
	ds.when("UPDATE blog").affected(1);
	ds
}

#[test]
fn test_second_level_cache_spans_sessions_after_commit() {
	let ds = stub();
	let factory = common::factory(&ds, CACHED_MAPPER, &[]);

	let mut session_a = factory.open_session().unwrap();
	let first = session_a.select_list_value("b.find", Value::Null).unwrap();
	session_a.commit().unwrap();
	session_a.close().unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 1);

	// session B reads the committed entry without a database round-trip
	let mut session_b = factory.open_session().unwrap();
	let second = session_b.select_list_value("b.find", Value::Null).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 1);
	assert_eq!(first, second);
	session_b.close().unwrap();
}

#[test]
fn test_uncommitted_puts_stay_invisible() {
	let ds = stub();
	let factory = common::factory(&ds, CACHED_MAPPER, &[]);

	let mut session_a = factory.open_session().unwrap();
	session_a.select_list_value("b.find", Value::Null).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 1);

	// A has not committed, so B must hit the database itself
	let mut session_b = factory.open_session().unwrap();
	session_b.select_list_value("b.find", Value::Null).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
	session_a.close().unwrap();
	session_b.close().unwrap();
}

#[test]
fn test_write_invalidates_the_shared_cache() {
	let ds = stub();
	let factory = common::factory(&ds, CACHED_MAPPER, &[]);

	let mut session_a = factory.open_session().unwrap();
	session_a.select_list_value("b.find", Value::Null).unwrap();
	session_a.commit().unwrap();
	session_a.close().unwrap();

	let mut session_b = factory.open_session().unwrap();
	session_b.update_value("b.touch", &mut Value::Null).unwrap();
	session_b.commit().unwrap();
	session_b.close().unwrap();

	// the write cleared the namespace cache, so C reads fresh
	let mut session_c = factory.open_session().unwrap();
	session_c.select_list_value("b.find", Value::Null).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
	session_c.close().unwrap();
}

#[test]
fn test_rolled_back_session_leaves_no_entry() {
	let ds = stub();
	let factory = common::factory(&ds, CACHED_MAPPER, &[]);

	let mut session_a = factory.open_session().unwrap();
	session_a.select_list_value("b.find", Value::Null).unwrap();
	session_a.rollback_force(true).unwrap();
	session_a.close().unwrap();

	let mut session_b = factory.open_session().unwrap();
	session_b.select_list_value("b.find", Value::Null).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
	session_b.close().unwrap();
}

#[test]
fn test_use_cache_false_always_reads_through() {
	let ds = stub();
	let factory = common::factory(&ds, CACHED_MAPPER, &[]);

	let mut session_a = factory.open_session().unwrap();
	session_a.select_list_value("b.uncached", Value::Null).unwrap();
	session_a.commit().unwrap();
	session_a.close().unwrap();

	let mut session_b = factory.open_session().unwrap();
	session_b.select_list_value("b.uncached", Value::Null).unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
	session_b.close().unwrap();
}

#[test]
fn test_first_level_cache_returns_equal_rows() {
	let ds = stub();
	// second level off isolates the session cache
	let factory = common::factory(&ds, CACHED_MAPPER, &[("cacheEnabled", "false")]);
	let mut session = factory.open_session().unwrap();

	let first = session.select_list_value("b.find", Value::Null).unwrap();
	let second = session.select_list_value("b.find", Value::Null).unwrap();
	assert_eq!(first, second);
	assert_eq!(ds.execution_count("FROM blog"), 1);
	session.close().unwrap();
}
