//! Shared fixture: a configuration document wired to the stub driver.

use std::sync::Arc;

use grappelli::{SqlSessionFactory, SqlSessionFactoryBuilder, XmlConfigBuilder};
use grappelli_executor::DriverTransactionFactory;
use grappelli_test::StubDataSource;

pub fn config_document(settings: &[(&str, &str)]) -> String {
	let settings_xml: String = settings
		.iter()
		.map(|(name, value)| format!(r#"<setting name="{name}" value="{value}"/>"#))
		.collect();
	format!(
		r#"<configuration>
			<settings>{settings_xml}</settings>
			<environments default="test">
				<environment id="test">
					<transactionManager type="JDBC"/>
					<dataSource type="STUB"/>
				</environment>
			</environments>
			<mappers>
				<mapper resource="mapper.xml"/>
			</mappers>
		</configuration>"#
	)
}

pub fn factory(
	ds: &StubDataSource,
	mapper_xml: &str,
	settings: &[(&str, &str)],
) -> SqlSessionFactory {
	let configuration = XmlConfigBuilder::new()
		.transaction_factory("JDBC", Arc::new(DriverTransactionFactory))
		.data_source("STUB", Arc::new(ds.clone()))
		.resource("mapper.xml", mapper_xml)
		.parse(&config_document(settings))
		.expect("configuration builds");
	SqlSessionFactoryBuilder::build(configuration)
}
