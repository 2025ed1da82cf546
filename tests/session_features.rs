//! Session-level features: lazy associations, cursors, descriptor-table
//! mapper dispatch, and the thread-bound session manager.

mod common;

use std::sync::Arc;

use grappelli::prelude::*;
use grappelli::{SqlSessionManager, Value};
use grappelli_core::meta::MetaValue;
use grappelli_core::types::JdbcType;
use grappelli_executor::DriverTransactionFactory;
use grappelli_test::StubDataSource;

const LAZY_MAPPER: &str = r#"
<mapper namespace="z">
	<resultMap id="blog" type="map">
		<id property="id" column="id"/>
		<result property="title" column="title"/>
		<association property="author" column="author_id" select="findAuthor" fetchType="lazy"/>
	</resultMap>
	<resultMap id="blogEager" type="map">
		<id property="id" column="id"/>
		<association property="author" column="author_id" select="findAuthor" fetchType="eager"/>
	</resultMap>
	<select id="findBlogs" resultMap="blog">SELECT * FROM blog</select>
	<select id="findBlogsEager" resultMap="blogEager">SELECT * FROM blog</select>
	<select id="findAuthor" resultType="map">SELECT * FROM author WHERE id = #{id}</select>
	<select id="plain" resultType="map">SELECT * FROM blog</select>
</mapper>
"#;

fn stub() -> StubDataSource {
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(
		&[
			("id", JdbcType::BigInt),
			("title", JdbcType::Varchar),
			("author_id", JdbcType::BigInt),
		],
		vec![vec![Value::Int(1), Value::from("jazz"), Value::Int(5)]],
	);
	ds.when("FROM author").rows(
		&[("id", JdbcType::BigInt), ("name", JdbcType::Varchar)],
		vec![vec![Value::Int(5), Value::from("django")]],
	);
	ds
}

#[test]
fn test_lazy_association_loads_on_demand() {
	let ds = stub();
	let factory = common::factory(&ds, LAZY_MAPPER, &[("lazyLoadingEnabled", "true")]);
	let mut session = factory.open_session().unwrap();

	let mut rows = session.select_lazy("z.findBlogs", Value::Null).unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(ds.execution_count("FROM author"), 0);
	assert_eq!(rows[0].pending_properties(), vec!["author"]);

	session.load_lazy(&mut rows[0]).unwrap();
	assert_eq!(ds.execution_count("FROM author"), 1);
	let row = rows.remove(0).into_value();
	assert_eq!(
		MetaValue::new(&row).get("author.name"),
		Some(&Value::from("django"))
	);
	session.close().unwrap();
}

#[test]
fn test_eager_association_loads_inline() {
	let ds = stub();
	let factory = common::factory(&ds, LAZY_MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let rows = session.select_list_value("z.findBlogsEager", Value::Null).unwrap();
	assert_eq!(ds.execution_count("FROM author"), 1);
	assert_eq!(
		MetaValue::new(&rows[0]).get("author.name"),
		Some(&Value::from("django"))
	);
	session.close().unwrap();
}

#[test]
fn test_cursor_traverses_once_and_closes() {
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(
		&[("id", JdbcType::BigInt)],
		vec![vec![Value::Int(1)], vec![Value::Int(2)]],
	);
	let factory = common::factory(&ds, LAZY_MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let mut cursor = session.select_cursor_value("z.plain", Value::Null).unwrap();
	let first = cursor.next_row().unwrap().unwrap();
	assert_eq!(MetaValue::new(&first).get("id"), Some(&Value::Int(1)));
	let second = cursor.next_row().unwrap().unwrap();
	assert_eq!(MetaValue::new(&second).get("id"), Some(&Value::Int(2)));
	// exhaustion closes the cursor and releases the driver resources
	assert!(cursor.next_row().unwrap().is_none());
	assert!(cursor.is_closed());
	assert!(cursor.next_row().is_err());
	session.close().unwrap();
}

fn module_factory(ds: &StubDataSource) -> grappelli::SqlSessionFactory {
	let config_doc = r#"<configuration>
		<environments default="test">
			<environment id="test">
				<transactionManager type="JDBC"/>
				<dataSource type="STUB"/>
			</environment>
		</environments>
		<mappers>
			<mapper class="BlogMapper"/>
		</mappers>
	</configuration>"#;
	let module = MapperModule::new("BlogMapper")
		.statement(StatementSpec::select("findAll", "SELECT * FROM blog").result_type("map"))
		.statement(
			StatementSpec::select("findOne", "SELECT * FROM blog WHERE id = #{id}")
				.result_type("map")
				.params(&["id"])
				.one(),
		)
		.statement(
			StatementSpec::insert("create", "INSERT INTO blog (title) VALUES (#{title})")
				.generated_keys("id"),
		);
	let configuration = XmlConfigBuilder::new()
		.transaction_factory("JDBC", Arc::new(DriverTransactionFactory))
		.data_source("STUB", Arc::new(ds.clone()))
		.mapper_module("BlogMapper", module)
		.parse(config_doc)
		.unwrap();
	SqlSessionFactoryBuilder::build(configuration)
}

#[test]
fn test_mapper_dispatch_by_descriptor_table() {
	let ds = StubDataSource::new();
	ds.when("WHERE id").rows(
		&[("id", JdbcType::BigInt), ("title", JdbcType::Varchar)],
		vec![vec![Value::Int(1), Value::from("jazz")]],
	);
	ds.when("FROM blog").rows(
		&[("id", JdbcType::BigInt)],
		vec![vec![Value::Int(1)], vec![Value::Int(2)]],
	);
	ds.when("INSERT INTO blog")
		.affected(1)
		.generated_keys(&[("id", JdbcType::BigInt)], vec![vec![Value::Int(42)]]);
	let factory = module_factory(&ds);
	let mut session = factory.open_session().unwrap();

	let MapperResult::Many(all) =
		session.call_mapper("BlogMapper", "findAll", MapperArgs::new()).unwrap()
	else {
		panic!("expected Many");
	};
	assert_eq!(all.len(), 2);

	let MapperResult::One(found) = session
		.call_mapper(
			"BlogMapper",
			"findOne",
			MapperArgs::new().arg(&1i64).unwrap(),
		)
		.unwrap()
	else {
		panic!("expected One");
	};
	let found = found.unwrap();
	assert_eq!(MetaValue::new(&found).get("title"), Some(&Value::from("jazz")));
	// the declared parameter name reached the binding
	assert_eq!(
		ds.executed().iter().find(|e| e.sql.contains("WHERE id")).unwrap().parameters,
		vec![Value::Int(1)]
	);

	let MapperResult::Affected(affected) = session
		.call_mapper(
			"BlogMapper",
			"create",
			MapperArgs::new().named("title", &"bebop").unwrap(),
		)
		.unwrap()
	else {
		panic!("expected Affected");
	};
	assert_eq!(affected, 1);

	assert!(matches!(
		session.call_mapper("BlogMapper", "ghost", MapperArgs::new()),
		Err(grappelli::Error::UnknownMapperMethod { .. })
	));
	assert!(matches!(
		session.call_mapper("GhostMapper", "x", MapperArgs::new()),
		Err(grappelli::Error::UnknownMapper { .. })
	));
	session.close().unwrap();
}

#[test]
fn test_generated_key_lands_on_parameter_before_return() {
	let ds = StubDataSource::new();
	ds.when("INSERT INTO blog")
		.affected(1)
		.generated_keys(&[("id", JdbcType::BigInt)], vec![vec![Value::Int(42)]]);
	let factory = module_factory(&ds);
	let mut session = factory.open_session().unwrap();

	#[derive(Serialize)]
	struct NewBlog {
		title: String,
	}
	let (affected, parameter) = session
		.insert_returning("BlogMapper.create", &NewBlog { title: "bebop".into() })
		.unwrap();
	assert_eq!(affected, 1);
	assert_eq!(MetaValue::new(&parameter).get("id"), Some(&Value::Int(42)));
	session.close().unwrap();
}

#[test]
fn test_manager_opens_one_shot_sessions_when_unbound() {
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(&[("id", JdbcType::BigInt)], vec![vec![Value::Int(1)]]);
	let factory = common::factory(&ds, LAZY_MAPPER, &[("cacheEnabled", "false")]);
	let manager = SqlSessionManager::new(factory);

	assert!(!manager.is_managed());
	let rows = manager
		.with_session(|session| session.select_list_value("z.plain", Value::Null))
		.unwrap();
	assert_eq!(rows.len(), 1);
	// a second unbound call opens a fresh session: no shared first-level cache
	manager
		.with_session(|session| session.select_list_value("z.plain", Value::Null))
		.unwrap();
	assert_eq!(ds.execution_count("FROM blog"), 2);
}

#[test]
fn test_manager_reuses_the_bound_session() {
	let ds = StubDataSource::new();
	ds.when("FROM blog").rows(&[("id", JdbcType::BigInt)], vec![vec![Value::Int(1)]]);
	let factory = common::factory(&ds, LAZY_MAPPER, &[("cacheEnabled", "false")]);
	let manager = SqlSessionManager::new(factory);

	manager.start_managed_session().unwrap();
	assert!(manager.is_managed());
	manager
		.with_session(|session| session.select_list_value("z.plain", Value::Null))
		.unwrap();
	manager
		.with_session(|session| session.select_list_value("z.plain", Value::Null))
		.unwrap();
	// same session, so the first-level cache absorbs the second read
	assert_eq!(ds.execution_count("FROM blog"), 1);
	manager.commit().unwrap();
	manager.close().unwrap();
	assert!(!manager.is_managed());
}
