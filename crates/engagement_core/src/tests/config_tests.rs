use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let settings =
        load_settings_with(Path::new("./does-not-exist/engagement.toml"), no_env).expect("load");
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_are_overridden_by_environment() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("engagement_settings_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let file = temp_root.join("engagement.toml");
    fs::write(
        &file,
        "base_url = \"https://portal.example\"\nis_staff = true\nrequest_timeout_secs = 3\n",
    )
    .expect("write settings");

    let vars = HashMap::from([
        ("APP__BASE_URL".to_string(), "https://override.example".to_string()),
        ("ENGAGEMENT_ANALYTICS_PATH".to_string(), "".to_string()),
    ]);
    let settings = load_settings_with(&file, |key| vars.get(key).cloned()).expect("load");

    assert_eq!(settings.base_url, "https://override.example");
    assert!(settings.is_staff);
    assert_eq!(settings.request_timeout_secs, 3);
    assert_eq!(settings.analytics_path, None);

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn malformed_settings_file_is_reported() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("engagement_settings_bad_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let file = temp_root.join("engagement.toml");
    fs::write(&file, "request_timeout_secs = \"soon\"").expect("write settings");

    let err = load_settings_with(&file, no_env).expect_err("bad type");
    assert!(err.to_string().contains("failed to parse settings file"));

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn preset_urls_gain_id_segment_when_editing() {
    let endpoints = Endpoints::from_settings(&Settings::default()).expect("endpoints");
    let id = PresetId::parse("6f1c2b8e-6f0e-4a59-9c55-2d3c1c7e0a11").expect("uuid");

    assert_eq!(
        endpoints.preset_form_for(Some(id)).path(),
        "/search/api/preferences/6f1c2b8e-6f0e-4a59-9c55-2d3c1c7e0a11/form/"
    );
    assert_eq!(
        endpoints.preset_submit_for(Some(id)).path(),
        "/search/api/preferences/6f1c2b8e-6f0e-4a59-9c55-2d3c1c7e0a11/submit/"
    );
    assert_eq!(
        endpoints.preset_form_for(None).path(),
        "/search/api/preferences/form/"
    );
}

#[test]
fn invalid_base_url_is_rejected() {
    let settings = Settings {
        base_url: "not a url".into(),
        ..Settings::default()
    };
    assert!(Endpoints::from_settings(&settings).is_err());
}
