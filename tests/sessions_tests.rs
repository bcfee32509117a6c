use chargescope::sessions::{
    parse_session_content, parse_session_csv, parse_session_file, parse_session_json, SessionError,
};
use std::io::Write;

const CSV: &str = "SiteId,ChargerId,ConnectorId,Energy_kWh,SessionDurationMin,TariffINR,RevenueINR,StartTime,StopTime
S1,C1,1,22.5,45,18,405,2025-01-10T08:00:00Z,2025-01-10T08:45:00Z
S1,C1,2,bad,30,18,,2025-01-10T09:00:00Z,2025-01-10T09:30:00Z
S1,C2,1,10,20
S1,,1,5,10,18,90,2025-01-10T10:00:00Z,2025-01-10T10:10:00Z
";

#[test]
fn csv_sessions_are_read_by_header_name() {
    let sessions = parse_session_csv(CSV).unwrap();
    assert_eq!(sessions.len(), 2);

    let first = &sessions[0];
    assert_eq!(first.site_id, "S1");
    assert_eq!(first.charger_id, "C1");
    assert_eq!(first.connector_id, "1");
    assert_eq!(first.energy_kwh, 22.5);
    assert_eq!(first.session_duration_min, 45.0);
    assert_eq!(first.tariff_inr, 18.0);
    assert_eq!(first.revenue_inr, 405.0);
    assert_eq!(first.start_time, "2025-01-10T08:00:00Z");

    // unreadable and missing numbers become zero
    assert_eq!(sessions[1].energy_kwh, 0.0);
    assert_eq!(sessions[1].revenue_inr, 0.0);
}

#[test]
fn snake_case_headers_are_accepted() {
    let csv = "site_id,charger_id,connector_id,energy,duration,tariff,revenue\nS9,C9,3,7.5,12,20,150\n";
    let sessions = parse_session_csv(csv).unwrap();
    assert_eq!(sessions[0].site_id, "S9");
    assert_eq!(sessions[0].energy_kwh, 7.5);
    assert_eq!(sessions[0].session_duration_min, 12.0);
    assert_eq!(sessions[0].revenue_inr, 150.0);
}

#[test]
fn csv_without_rows_or_ids_is_rejected() {
    assert!(matches!(parse_session_csv("siteId,chargerId\n"), Err(SessionError::Empty)));
    assert!(matches!(parse_session_csv("   "), Err(SessionError::Empty)));
    let err = parse_session_csv("siteId,chargerId,connectorId\n,,\n").unwrap_err();
    assert_eq!(err.to_string(), "No valid session data found in CSV");
}

#[test]
fn json_sessions_accept_numbers_and_strings() {
    let json = r#"[
        {"siteId":"S1","chargerId":"C1","connectorId":1,"energy_kWh":30.5,"sessionDurationMin":"60","revenueINR":540,"startTime":"2025-01-10T08:00:00Z"},
        {"site_id":"S2","charger_id":"C7","connector_id":"2","energy":12,"revenue":"216"},
        {"siteId":"S3"},
        "noise"
    ]"#;
    let sessions = parse_session_json(json).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].connector_id, "1");
    assert_eq!(sessions[0].energy_kwh, 30.5);
    assert_eq!(sessions[0].session_duration_min, 60.0);
    assert_eq!(sessions[1].charger_id, "C7");
    assert_eq!(sessions[1].revenue_inr, 216.0);

    let single = parse_session_json(r#"{"siteId":"S1","chargerId":"C1","connectorId":"1"}"#).unwrap();
    assert_eq!(single.len(), 1);
}

#[test]
fn json_errors_are_reported() {
    assert!(matches!(parse_session_json("[{"), Err(SessionError::Json(_))));
    assert!(matches!(
        parse_session_json("[]"),
        Err(SessionError::NoValidSessions("JSON"))
    ));
}

#[test]
fn content_dispatches_on_extension() {
    assert_eq!(parse_session_content(CSV, "march.CSV").unwrap().len(), 2);
    assert!(matches!(
        parse_session_content(CSV, "march.xlsx"),
        Err(SessionError::UnsupportedFormat)
    ));
}

#[test]
fn sessions_load_from_disk() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(CSV.as_bytes()).unwrap();
    file.flush().unwrap();
    assert_eq!(parse_session_file(file.path()).unwrap().len(), 2);

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        parse_session_file(dir.path().join("missing.csv")),
        Err(SessionError::Io(_))
    ));
}

#[test]
fn session_json_uses_domain_field_names() {
    let sessions = parse_session_csv(CSV).unwrap();
    let value = serde_json::to_value(&sessions[0]).unwrap();
    assert_eq!(value["energy_kWh"], 22.5);
    assert_eq!(value["revenueINR"], 405.0);
    assert_eq!(value["sessionDurationMin"], 45.0);
}
