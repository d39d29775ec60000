//! Integration tests for table, column and example discovery

use mockito::{Matcher, Server};
use vo_tap::config::ClientConfig;
use vo_tap::tap::{ColumnListing, TapClient, TapError};

const TABLESET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<vosi:tableset xmlns:vosi="http://www.ivoa.net/xml/VOSITables/v1.0">
  <schema>
    <name>ivoa</name>
    <table><name>ivoa.obscore</name></table>
  </schema>
  <schema>
    <name>tap_schema</name>
    <table><name>tap_schema.schemas</name></table>
    <table><name>tap_schema.tables</name></table>
  </schema>
</vosi:tableset>"#;

const OBSCORE_PROBE: &str = r#"<VOTABLE>
  <RESOURCE type="results">
    <INFO name="QUERY_STATUS" value="OK"/>
    <TABLE name="obscore">
      <FIELD name="obs_id" datatype="char" arraysize="*" ucd="meta.id"/>
      <FIELD name="s_ra" datatype="double" unit="deg"/>
      <DATA><TABLEDATA><TR><TD>obs-1</TD><TD>83.6</TD></TR></TABLEDATA></DATA>
    </TABLE>
  </RESOURCE>
</VOTABLE>"#;

const EMPTY_PROBE: &str = r#"<VOTABLE>
  <RESOURCE type="results">
    <INFO name="QUERY_STATUS" value="OK"/>
    <TABLE name="emptytab">
      <DESCRIPTION>Nothing here yet</DESCRIPTION>
      <FIELD name="x" datatype="int"/>
      <DATA><TABLEDATA></TABLEDATA></DATA>
    </TABLE>
  </RESOURCE>
</VOTABLE>"#;

const EXAMPLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
  <head><title>Examples</title></head>
  <body>
    <div typeof="example" id="one"><pre property="query">SELECT 1</pre></div>
    <div typeof="example" id="two"><pre property="query">SELECT 2</pre></div>
  </body>
</html>"#;

fn test_client() -> TapClient {
    TapClient::new(ClientConfig {
        retries: 1,
        retry_delay_ms: 0,
        ..Default::default()
    })
    .expect("valid config")
}

#[tokio::test]
async fn list_tables_returns_every_name_in_order() {
    //* Given
    let mut server = Server::new_async().await;
    let tables_mock = server
        .mock("GET", "/tap/tables")
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(TABLESET)
        .expect(1)
        .create_async()
        .await;

    //* When
    let names = test_client()
        .list_tables(format!("{}/tap", server.url()), None)
        .await
        .expect("list tables");

    //* Then
    tables_mock.assert_async().await;
    assert_eq!(names, vec!["ivoa.obscore", "tap_schema.schemas", "tap_schema.tables"]);
}

#[tokio::test]
async fn list_tables_filters_by_substring() {
    //* Given
    let mut server = Server::new_async().await;
    let _tables_mock = server
        .mock("GET", "/tap/tables")
        .with_status(200)
        .with_body(TABLESET)
        .create_async()
        .await;
    let client = test_client();
    let url = format!("{}/tap", server.url());

    //* When
    let tap_schema = client.list_tables(url.as_str(), Some("tap_schema")).await.unwrap();
    let upper = client.list_tables(url.as_str(), Some("TAP_SCHEMA")).await.unwrap();
    let none = client.list_tables(url.as_str(), Some("gaia")).await.unwrap();

    //* Then
    assert_eq!(tap_schema, vec!["tap_schema.schemas", "tap_schema.tables"]);
    assert!(upper.is_empty());
    assert!(none.is_empty());
}

#[tokio::test]
async fn list_columns_returns_fields_when_table_has_rows() {
    //* Given
    let mut server = Server::new_async().await;
    let probe_mock = server
        .mock("POST", "/tap/sync")
        .match_body(Matcher::UrlEncoded("QUERY".into(), "select top 1 * from ivoa.obscore".into()))
        .with_status(200)
        .with_body(OBSCORE_PROBE)
        .expect(1)
        .create_async()
        .await;

    //* When
    let listing = test_client()
        .list_columns(format!("{}/tap", server.url()), "ivoa.obscore")
        .await
        .expect("list columns");

    //* Then
    probe_mock.assert_async().await;
    let fields = listing.columns().expect("column descriptors");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name, "obs_id");
    assert_eq!(fields[0].ucd.as_deref(), Some("meta.id"));
    assert_eq!(fields[1].name, "s_ra");
    assert_eq!(fields[1].unit.as_deref(), Some("deg"));
}

#[tokio::test]
async fn list_columns_returns_metadata_when_table_is_empty() {
    //* Given
    let mut server = Server::new_async().await;
    let _probe_mock = server
        .mock("POST", "/tap/sync")
        .match_body(Matcher::UrlEncoded("QUERY".into(), "select top 1 * from emptytab".into()))
        .with_status(200)
        .with_body(EMPTY_PROBE)
        .create_async()
        .await;

    //* When
    let listing = test_client()
        .list_columns(format!("{}/tap", server.url()), "emptytab")
        .await
        .expect("list columns");

    //* Then
    match listing {
        ColumnListing::Metadata(meta) => {
            assert_eq!(meta.name.as_deref(), Some("emptytab"));
            assert_eq!(meta.description.as_deref(), Some("Nothing here yet"));
        }
        other => panic!("expected metadata, got {other:?}"),
    }
}

#[tokio::test]
async fn list_columns_propagates_probe_failure() {
    //* Given
    let mut server = Server::new_async().await;
    let _probe_mock = server
        .mock("POST", "/tap/sync")
        .with_status(200)
        .with_body(
            r#"<VOTABLE><RESOURCE type="results">
                <INFO name="QUERY_STATUS" value="ERROR">Table 'missing' not found</INFO>
            </RESOURCE></VOTABLE>"#,
        )
        .create_async()
        .await;

    //* When
    let err = test_client()
        .list_columns(format!("{}/tap", server.url()), "missing")
        .await
        .unwrap_err();

    //* Then
    assert!(matches!(err, TapError::Query(_)));
}

#[tokio::test]
async fn list_examples_returns_queries_in_order() {
    //* Given
    let mut server = Server::new_async().await;
    let examples_mock = server
        .mock("GET", "/tap/examples")
        .with_status(200)
        .with_header("content-type", "application/xhtml+xml")
        .with_body(EXAMPLES)
        .expect(1)
        .create_async()
        .await;

    //* When
    let examples = test_client()
        .list_examples(format!("{}/tap", server.url()))
        .await
        .expect("list examples");

    //* Then
    examples_mock.assert_async().await;
    assert_eq!(examples, vec!["SELECT 1", "SELECT 2"]);
}

#[tokio::test]
async fn list_examples_without_endpoint_is_empty() {
    //* Given
    let mut server = Server::new_async().await;
    let _examples_mock = server
        .mock("GET", "/tap/examples")
        .with_status(404)
        .with_body("Not Found")
        .create_async()
        .await;

    //* When
    let examples = test_client()
        .list_examples(format!("{}/tap", server.url()))
        .await
        .expect("404 is not an error");

    //* Then
    assert!(examples.is_empty());
}

#[tokio::test]
async fn list_examples_unreachable_host_is_empty() {
    //* Given
    let client = TapClient::new(ClientConfig {
        timeout_secs: 5,
        retries: 1,
        retry_delay_ms: 0,
        ..Default::default()
    })
    .unwrap();

    //* When
    let examples = client
        .list_examples("http://127.0.0.1:1/tap")
        .await
        .expect("unreachable host is not an error");

    //* Then
    assert!(examples.is_empty());
}

#[tokio::test]
async fn list_examples_empty_body_is_an_error() {
    //* Given
    let mut server = Server::new_async().await;
    let _examples_mock = server
        .mock("GET", "/tap/examples")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    //* When
    let result = test_client()
        .list_examples(format!("{}/tap", server.url()))
        .await;

    //* Then
    assert!(matches!(result, Err(TapError::Document(_))));
}

#[tokio::test]
async fn list_examples_malformed_document_is_an_error() {
    //* Given
    let mut server = Server::new_async().await;
    let _examples_mock = server
        .mock("GET", "/tap/examples")
        .with_status(200)
        .with_body(r#"<html><body><pre property="query">SELECT 1</body></html>"#)
        .create_async()
        .await;

    //* When
    let result = test_client()
        .list_examples(format!("{}/tap", server.url()))
        .await;

    //* Then
    assert!(result.is_err());
}
