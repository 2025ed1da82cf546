//! End-to-end dynamic SQL: the rendered statement text and its ordered
//! bindings, as observed by the driver.

mod common;

use grappelli::Value;
use grappelli_core::types::JdbcType;
use grappelli_test::StubDataSource;
use serde::Serialize;

const MAPPER: &str = r#"
<mapper namespace="t">
	<select id="search" resultType="map">
		SELECT * FROM t
		<where>
			<if test="a != null">AND a = #{a}</if>
			<if test="b != null">AND b = #{b}</if>
		</where>
	</select>
	<delete id="deleteByIds">
		DELETE FROM t WHERE id IN
		<foreach item="i" collection="ids" open="(" close=")" separator=",">#{i}</foreach>
	</delete>
	<update id="touch">
		UPDATE t
		<set>
			<if test="name != null">name = #{name},</if>
			<if test="kind != null">kind = #{kind},</if>
		</set>
		WHERE id = #{id}
	</update>
	<select id="searchLike" resultType="map">
		<bind name="pattern" value="name + '%'"/>
		SELECT * FROM t WHERE name LIKE #{pattern}
	</select>
</mapper>
"#;

#[derive(Serialize)]
struct Search {
	a: Option<i64>,
	b: Option<i64>,
}

#[test]
fn test_dynamic_where_drops_dead_branches() {
	let ds = StubDataSource::new();
	ds.when("FROM t").rows(&[("a", JdbcType::BigInt)], vec![vec![Value::Int(1)]]);
	let factory = common::factory(&ds, MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let rows: Vec<serde_json::Value> =
		session.select_list("t.search", &Search { a: Some(1), b: None }).unwrap();
	assert_eq!(rows.len(), 1);

	let executed = ds.executed();
	assert_eq!(executed[0].sql, "SELECT * FROM t WHERE a = ?");
	assert_eq!(executed[0].parameters, vec![Value::Int(1)]);
}

#[test]
fn test_dynamic_where_vanishes_entirely() {
	let ds = StubDataSource::new();
	ds.when("FROM t").rows(&[("a", JdbcType::BigInt)], vec![]);
	let factory = common::factory(&ds, MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let _: Vec<serde_json::Value> =
		session.select_list("t.search", &Search { a: None, b: None }).unwrap();
	assert_eq!(ds.executed()[0].sql, "SELECT * FROM t");
}

#[derive(Serialize)]
struct ByIds {
	ids: Vec<i64>,
}

#[test]
fn test_foreach_in_list_binds_each_item() {
	let ds = StubDataSource::new();
	ds.when("DELETE FROM t").affected(3);
	let factory = common::factory(&ds, MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let affected =
		session.delete("t.deleteByIds", &ByIds { ids: vec![10, 20, 30] }).unwrap();
	assert_eq!(affected, 3);

	let executed = ds.executed();
	assert_eq!(executed[0].sql, "DELETE FROM t WHERE id IN (?,?,?)");
	assert_eq!(
		executed[0].parameters,
		vec![Value::Int(10), Value::Int(20), Value::Int(30)]
	);
}

#[derive(Serialize)]
struct Touch {
	id: i64,
	name: Option<String>,
	kind: Option<String>,
}

#[test]
fn test_set_trims_the_dangling_comma() {
	let ds = StubDataSource::new();
	ds.when("UPDATE t").affected(1);
	let factory = common::factory(&ds, MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	session
		.update("t.touch", &Touch { id: 5, name: Some("x".into()), kind: None })
		.unwrap();
	let executed = ds.executed();
	assert_eq!(executed[0].sql, "UPDATE t SET name = ? WHERE id = ?");
	assert_eq!(executed[0].parameters, vec![Value::from("x"), Value::Int(5)]);
}

#[derive(Serialize)]
struct ByName {
	name: String,
}

#[test]
fn test_bind_introduces_a_binding_for_like() {
	let ds = StubDataSource::new();
	ds.when("LIKE").rows(&[("a", JdbcType::BigInt)], vec![]);
	let factory = common::factory(&ds, MAPPER, &[]);
	let mut session = factory.open_session().unwrap();

	let _: Vec<serde_json::Value> =
		session.select_list("t.searchLike", &ByName { name: "dj".into() }).unwrap();
	let executed = ds.executed();
	assert_eq!(executed[0].parameters, vec![Value::from("dj%")]);
}
