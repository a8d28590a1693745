//! Property-based tests for SyncSettings persistence.
//!
//! Arbitrary settings saved through the SettingsEngine must load back
//! unchanged from disk.

use marksync::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use marksync::types::identity::AuthProvider;
use marksync::types::settings::{AuthSettings, GeneralSettings, LoggingSettings, RealtimeSettings, SyncSettings};
use proptest::prelude::*;
use tempfile::TempDir;

// --- Arbitrary strategies for all settings sub-types ---

fn arb_provider() -> impl Strategy<Value = AuthProvider> {
    prop_oneof![Just(AuthProvider::Google), Just(AuthProvider::GitHub)]
}

fn arb_general_settings() -> impl Strategy<Value = GeneralSettings> {
    (proptest::option::of("/[a-z]{1,10}(/[a-z0-9_-]{1,10}){0,3}"), "[a-z]{1,12}\\.db").prop_map(
        |(data_dir, database_file)| GeneralSettings {
            data_dir,
            database_file,
        },
    )
}

fn arb_auth_settings() -> impl Strategy<Value = AuthSettings> {
    (arb_provider(), "https://[a-z]{3,12}\\.test(/[a-z]{1,8})?", "https://[a-z]{3,12}\\.test/authorize")
        .prop_map(|(default_provider, redirect_to, authorize_url)| AuthSettings {
            default_provider,
            redirect_to,
            authorize_url,
        })
}

fn arb_realtime_settings() -> impl Strategy<Value = RealtimeSettings> {
    ("[a-z][a-z0-9-]{0,20}", "[a-z]{1,10}", "[a-z_]{1,16}", 1usize..4096).prop_map(
        |(channel, schema, table, bus_capacity)| RealtimeSettings {
            channel,
            schema,
            table,
            bus_capacity,
        },
    )
}

fn arb_logging_settings() -> impl Strategy<Value = LoggingSettings> {
    (
        prop_oneof![Just("info"), Just("debug"), Just("warn"), Just("marksync=trace")],
        any::<bool>(),
    )
        .prop_map(|(filter, ansi)| LoggingSettings {
            filter: filter.to_string(),
            ansi,
        })
}

fn arb_settings() -> impl Strategy<Value = SyncSettings> {
    (
        arb_general_settings(),
        arb_auth_settings(),
        arb_realtime_settings(),
        arb_logging_settings(),
    )
        .prop_map(|(general, auth, realtime, logging)| SyncSettings {
            general,
            auth,
            realtime,
            logging,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Settings applied key by key, saved, and loaded by a fresh engine are unchanged.
    #[test]
    fn settings_survive_save_and_load(settings in arb_settings()) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json").to_string_lossy().to_string();

        {
            let mut engine = SettingsEngine::new(Some(path.clone()));
            engine.load().unwrap();
            let tree = serde_json::to_value(&settings).unwrap();
            for (section, values) in tree.as_object().unwrap() {
                for (key, value) in values.as_object().unwrap() {
                    engine.set_value(&format!("{}.{}", section, key), value.clone()).unwrap();
                }
            }
        }

        let mut engine = SettingsEngine::new(Some(path));
        let loaded = engine.load().unwrap();
        prop_assert_eq!(loaded, settings);
    }
}
