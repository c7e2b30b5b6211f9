use super::*;

fn sample() -> ProfileDocument {
    ProfileDocument {
        full_name: "Alice Doe".into(),
        phone_number: "+1 555 0100".into(),
        email: "a@x.com".into(),
        created_at: "2024-05-01T12:00:00Z".into(),
    }
}

#[test]
fn to_record_uses_camel_case_keys() {
    let record = sample().to_record();
    assert_eq!(record.len(), 4);
    assert_eq!(record["fullName"], "Alice Doe");
    assert_eq!(record["phoneNumber"], "+1 555 0100");
    assert_eq!(record["email"], "a@x.com");
    assert_eq!(record["createdAt"], "2024-05-01T12:00:00Z");
}

#[test]
fn from_record_reads_written_record() {
    let record = sample().to_record();
    assert_eq!(ProfileDocument::from_record(&record), sample());
}

#[test]
fn from_record_is_lenient_about_missing_and_non_string_fields() {
    let mut record = Record::new();
    record.insert("fullName".into(), serde_json::json!("Bob"));
    record.insert("phoneNumber".into(), serde_json::json!(5550100));
    let doc = ProfileDocument::from_record(&record);
    assert_eq!(doc.full_name, "Bob");
    assert_eq!(doc.phone_number, "");
    assert_eq!(doc.email, "");
    assert_eq!(doc.created_at, "");
}

#[test]
fn now_rfc3339_is_utc_timestamp() {
    let ts = now_rfc3339();
    assert!(ts.ends_with('Z'));
    assert!(ts.contains('T'));
    assert!(time::OffsetDateTime::parse(&ts, &time::format_description::well_known::Rfc3339).is_ok());
}

#[test]
fn record_mapping_ignores_extra_fields() {
    let mut record = sample().to_record();
    record.insert("bio".into(), serde_json::json!({ "nested": true }));
    record.insert("fullName".into(), serde_json::Value::Null);
    let doc = ProfileDocument::from_record(&record);
    assert_eq!(doc.full_name, "");
    assert_eq!(doc.email, "a@x.com");
    assert_eq!(doc.to_record().len(), 4);
}
