use clerk_sync::config::{ConfigError, ConfigLoader};
use std::{
    env, fs,
    path::PathBuf,
    sync::{Mutex, MutexGuard, OnceLock},
};
use tempfile::TempDir;

const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn env_guard() -> MutexGuard<'static, ()> {
    env_lock()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
}

fn clear_env() {
    unsafe {
        env::remove_var("CLERK_PROFILE");
        env::remove_var("CLERK_API_BIND_ADDR");
        env::remove_var("CLERK_LOG_LEVEL");
        env::remove_var("CLERK_WEBHOOK_SECRET");
        env::remove_var("CLERK_WEBHOOK_TOLERANCE_SECONDS");
        env::remove_var("CLERK_SECRET_KEY");
        env::remove_var("CLERK_API_BASE");
    }
}

fn write_env_file(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_defaults_when_only_secret_present() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("CLERK_WEBHOOK_SECRET", SECRET);
    }

    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with defaults");

    assert_eq!(cfg.profile, "local");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:8080");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.webhook_tolerance_seconds, 300);
    assert_eq!(cfg.api_base, "https://api.clerk.com");
    assert!(cfg.secret_key.is_none());
    cfg.bind_addr().expect("default bind addr parses");
    clear_env();
}

#[test]
fn missing_webhook_secret_fails_load() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(&temp_dir, ".env", "CLERK_API_BIND_ADDR=127.0.0.1:3000\n");

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("missing secret should fail");
    assert!(matches!(err, ConfigError::MissingWebhookSecret));
    assert!(err.to_string().contains("CLERK_WEBHOOK_SECRET"));

    // Blank values count as missing.
    unsafe {
        env::set_var("CLERK_WEBHOOK_SECRET", "   ");
    }
    let err = loader.load().expect_err("blank secret should fail");
    assert!(matches!(err, ConfigError::MissingWebhookSecret));

    clear_env();
}

#[test]
fn layered_env_files_apply_in_order() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        "CLERK_API_BIND_ADDR=127.0.0.1:3000\nCLERK_WEBHOOK_TOLERANCE_SECONDS=60\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test",
        "CLERK_API_BIND_ADDR=192.168.0.10:5000\n",
    );
    write_env_file(
        &temp_dir,
        ".env.test.local",
        "CLERK_API_BIND_ADDR=10.0.0.5:6000\n",
    );

    // Select profile via .env.local before profile-specific files load.
    write_env_file(
        &temp_dir,
        ".env.local",
        &format!(
            "CLERK_PROFILE=test\nCLERK_API_BIND_ADDR=127.0.0.1:4000\nCLERK_WEBHOOK_SECRET={SECRET}\n"
        ),
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with layered env files");

    assert_eq!(cfg.profile, "test");
    assert_eq!(cfg.api_bind_addr, "10.0.0.5:6000");
    assert_eq!(cfg.webhook_tolerance_seconds, 60);
    assert_eq!(cfg.webhook_secret.as_deref(), Some(SECRET));
    clear_env();
}

#[test]
fn os_environment_has_highest_precedence() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        &format!("CLERK_API_BIND_ADDR=127.0.0.1:3000\nCLERK_WEBHOOK_SECRET={SECRET}\n"),
    );

    unsafe {
        env::set_var("CLERK_API_BIND_ADDR", "0.0.0.0:9090");
        env::set_var("CLERK_SECRET_KEY", "sk_test_env");
    }

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let cfg = loader.load().expect("config loads with env override");
    assert_eq!(cfg.api_bind_addr, "0.0.0.0:9090");
    assert_eq!(cfg.secret_key.as_deref(), Some("sk_test_env"));

    let redacted = cfg.redacted_json().unwrap();
    assert!(!redacted.contains("sk_test_env"));
    assert!(!redacted.contains("MfKQ9r8G"));

    clear_env();
}

#[test]
fn invalid_bind_addr_returns_error() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("CLERK_API_BIND_ADDR", "not-an-addr");
        env::set_var("CLERK_WEBHOOK_SECRET", SECRET);
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("invalid bind addr should fail");
    assert!(format!("{}", err).contains("invalid api bind address"));

    clear_env();
}

#[test]
fn zero_tolerance_is_rejected() {
    let _guard = env_guard();
    clear_env();

    unsafe {
        env::set_var("CLERK_WEBHOOK_SECRET", SECRET);
        env::set_var("CLERK_WEBHOOK_TOLERANCE_SECONDS", "0");
    }
    let temp_dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("zero tolerance should fail");
    assert!(matches!(err, ConfigError::InvalidWebhookTolerance { value: 0 }));

    clear_env();
}

#[test]
fn unparseable_tolerance_fails_load() {
    let _guard = env_guard();
    clear_env();

    let temp_dir = TempDir::new().unwrap();
    write_env_file(
        &temp_dir,
        ".env",
        &format!("CLERK_WEBHOOK_SECRET={SECRET}\nCLERK_WEBHOOK_TOLERANCE_SECONDS=abc\n"),
    );

    let loader = ConfigLoader::with_base_dir(PathBuf::from(temp_dir.path()));
    let err = loader.load().expect_err("non-numeric tolerance should fail");
    assert!(matches!(
        err,
        ConfigError::InvalidNumber { ref key, ref value }
            if key == "CLERK_WEBHOOK_TOLERANCE_SECONDS" && value == "abc"
    ));

    clear_env();
}
