fn main() {
    // Propagate ESP-IDF link/cfg/include args from esp-idf-sys.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        if let Err(err) = embuild::build::LinkArgs::output_propagated("ESP_IDF") {
            println!("cargo:warning=esp-idf link args not propagated: {err}");
        }
        if let Err(err) = embuild::build::CfgArgs::output_propagated("ESP_IDF") {
            println!("cargo:warning=esp-idf cfg args not propagated: {err}");
        }
    }

    // Build-time node configuration read through option_env! in src/config.rs.
    for var in [
        "WIFI_SSID",
        "WIFI_PASS",
        "COLLECTOR_HOST",
        "COLLECTOR_PORT",
        "GH_HMAC_KEY",
        "DEEP_SLEEP_SECS",
        "WARM_UP_SECS",
        "NR_RETRIES",
        "RETRY_DELAY_MS",
    ] {
        println!("cargo:rerun-if-env-changed={var}");
    }
}
