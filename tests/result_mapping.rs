//! Result projection end-to-end: joined nested collections, discriminated
//! variants, auto-mapping policies, and linked extra result sets.

mod common;

use grappelli::Value;
use grappelli_core::meta::MetaValue;
use grappelli_core::types::JdbcType;
use grappelli_test::StubDataSource;

const JOINED_MAPPER: &str = r#"
<mapper namespace="b">
	<resultMap id="post" type="map">
		<id property="id" column="post_id"/>
	</resultMap>
	<resultMap id="blog" type="map">
		<id property="id" column="blog_id"/>
		<result property="title" column="blog_title"/>
		<collection property="posts" ofType="map" resultMap="post"/>
	</resultMap>
	<select id="findJoined" resultMap="blog">
		SELECT b.id blog_id, b.title blog_title, p.id post_id
		FROM blog b LEFT JOIN post p ON p.blog_id = b.id
	</select>
</mapper>
"#;

#[test]
fn test_joined_rows_group_into_collections() {
	let ds = StubDataSource::new();
	ds.when("LEFT JOIN post").rows(
		&[
			("blog_id", JdbcType::BigInt),
			("blog_title", JdbcType::Varchar),
			("post_id", JdbcType::BigInt),
		],
		vec![
			vec![Value::Int(1), Value::from("b1"), Value::Int(7)],
			vec![Value::Int(1), Value::from("b1"), Value::Int(8)],
			// a duplicate joined row must not duplicate the child
			vec![Value::Int(1), Value::from("b1"), Value::Int(8)],
			vec![Value::Int(2), Value::from("b2"), Value::Int(9)],
		],
	);
	let factory = common::factory(&ds, JOINED_MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let blogs = session.select_list_value("b.findJoined", Value::Null).unwrap();
	assert_eq!(blogs.len(), 2);

	let first = &blogs[0];
	assert_eq!(MetaValue::new(first).get("id"), Some(&Value::Int(1)));
	assert_eq!(MetaValue::new(first).get("title"), Some(&Value::from("b1")));
	let first_posts = MetaValue::new(first).get("posts").unwrap().as_array().unwrap();
	assert_eq!(first_posts.len(), 2);
	assert_eq!(MetaValue::new(&first_posts[0]).get("id"), Some(&Value::Int(7)));
	assert_eq!(MetaValue::new(&first_posts[1]).get("id"), Some(&Value::Int(8)));

	let second = &blogs[1];
	assert_eq!(MetaValue::new(second).get("id"), Some(&Value::Int(2)));
	let second_posts = MetaValue::new(second).get("posts").unwrap().as_array().unwrap();
	assert_eq!(second_posts.len(), 1);
	assert_eq!(MetaValue::new(&second_posts[0]).get("id"), Some(&Value::Int(9)));
}

const DISCRIMINATOR_MAPPER: &str = r#"
<mapper namespace="v">
	<resultMap id="vehicle" type="map">
		<discriminator column="kind" javaType="int">
			<case value="1" resultMap="car"/>
			<case value="2" resultMap="truck"/>
		</discriminator>
	</resultMap>
	<resultMap id="car" type="map">
		<result property="carDoors" column="doors"/>
	</resultMap>
	<resultMap id="truck" type="map">
		<result property="truckCargo" column="cargo"/>
	</resultMap>
	<select id="find" resultMap="vehicle">SELECT * FROM vehicle</select>
</mapper>
"#;

#[test]
fn test_discriminator_selects_the_case_map() {
	let ds = StubDataSource::new();
	ds.when("FROM vehicle").rows(
		&[
			("kind", JdbcType::Integer),
			("doors", JdbcType::Integer),
			("cargo", JdbcType::Varchar),
		],
		vec![vec![Value::Int(2), Value::Null, Value::from("logs")]],
	);
	let factory = common::factory(&ds, DISCRIMINATOR_MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let rows = session.select_list_value("v.find", Value::Null).unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(MetaValue::new(&rows[0]).get("truckCargo"), Some(&Value::from("logs")));
	assert!(MetaValue::new(&rows[0]).get("carDoors").is_none());
}

const PLAIN_MAPPER: &str = r#"
<mapper namespace="p">
	<select id="find" resultType="map">SELECT * FROM person</select>
</mapper>
"#;

#[test]
fn test_auto_mapping_none_binds_nothing() {
	let ds = StubDataSource::new();
	ds.when("FROM person").rows(
		&[("id", JdbcType::BigInt), ("full_name", JdbcType::Varchar)],
		vec![vec![Value::Int(1), Value::from("kent")]],
	);
	let factory = common::factory(&ds, PLAIN_MAPPER, &[("autoMappingBehavior", "NONE")]);
	let mut session = factory.open_session().unwrap();

	// nothing binds, so every row collapses to the empty row
	let rows = session.select_list_value("p.find", Value::Null).unwrap();
	assert!(rows.is_empty());
}

#[test]
fn test_auto_mapping_partial_binds_discovered_columns() {
	let ds = StubDataSource::new();
	ds.when("FROM person").rows(
		&[("id", JdbcType::BigInt), ("full_name", JdbcType::Varchar)],
		vec![vec![Value::Int(1), Value::from("kent")]],
	);
	let factory = common::factory(&ds, PLAIN_MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let rows = session.select_list_value("p.find", Value::Null).unwrap();
	assert_eq!(MetaValue::new(&rows[0]).get("id"), Some(&Value::Int(1)));
	assert_eq!(MetaValue::new(&rows[0]).get("full_name"), Some(&Value::from("kent")));
}

#[test]
fn test_underscore_to_camel_auto_mapping() {
	let ds = StubDataSource::new();
	ds.when("FROM person").rows(
		&[("full_name", JdbcType::Varchar)],
		vec![vec![Value::from("kent")]],
	);
	let factory =
		common::factory(&ds, PLAIN_MAPPER, &[("mapUnderscoreToCamelCase", "true")]);
	let mut session = factory.open_session().unwrap();

	let rows = session.select_list_value("p.find", Value::Null).unwrap();
	assert_eq!(MetaValue::new(&rows[0]).get("fullName"), Some(&Value::from("kent")));
}

const LINKED_MAPPER: &str = r#"
<mapper namespace="l">
	<resultMap id="post" type="map">
		<id property="id" column="id"/>
		<result property="blogId" column="blog_id"/>
	</resultMap>
	<resultMap id="blog" type="map">
		<id property="id" column="id"/>
		<result property="title" column="title"/>
		<collection property="posts" ofType="map" resultSet="posts" column="id"
			foreignColumn="blog_id" resultMap="post"/>
	</resultMap>
	<select id="findWithPosts" resultMap="blog" resultSets="blogs,posts">
		CALL fetch_blogs_and_posts()
	</select>
</mapper>
"#;

#[test]
fn test_linked_result_set_attaches_by_foreign_column() {
	let ds = StubDataSource::new();
	ds.when("fetch_blogs_and_posts")
		.rows(
			&[("id", JdbcType::BigInt), ("title", JdbcType::Varchar)],
			vec![
				vec![Value::Int(1), Value::from("b1")],
				vec![Value::Int(2), Value::from("b2")],
			],
		)
		.rows(
			&[("id", JdbcType::BigInt), ("blog_id", JdbcType::BigInt)],
			vec![
				vec![Value::Int(7), Value::Int(1)],
				vec![Value::Int(8), Value::Int(1)],
				vec![Value::Int(9), Value::Int(2)],
			],
		);
	let factory = common::factory(&ds, LINKED_MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let blogs = session.select_list_value("l.findWithPosts", Value::Null).unwrap();
	assert_eq!(blogs.len(), 2);
	let first_posts = MetaValue::new(&blogs[0]).get("posts").unwrap().as_array().unwrap();
	assert_eq!(first_posts.len(), 2);
	let second_posts = MetaValue::new(&blogs[1]).get("posts").unwrap().as_array().unwrap();
	assert_eq!(second_posts.len(), 1);
	assert_eq!(MetaValue::new(&second_posts[0]).get("id"), Some(&Value::Int(9)));
}
