//! Session lifecycle against the mock backend: startup validation, login,
//! logout and registration.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use stockwatch_client::{
    ApiError, AppState, AuthState, ClientConfig, CredentialStore, MemoryCredentialStore,
    Navigation, Route, ViewScope, gate,
};
use stockwatch_core::{Credential, Email, RegistrationForm, UserRole};
use stockwatch_integration_tests::{MockBackend, unreachable_url};

fn email(raw: &str) -> Email {
    Email::parse(raw).expect("valid email")
}

fn password(raw: &str) -> SecretString {
    SecretString::from(raw.to_string())
}

fn memory_store() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::new())
}

async fn logged_in(backend: &MockBackend) -> (AppState, Arc<MemoryCredentialStore>) {
    let store = memory_store();
    let app = backend.app(store.clone());
    app.session()
        .login(&email("associate@store.example"), &password("correct-horse"))
        .await
        .expect("login should succeed");
    (app, store)
}

// ============================================================================
// Startup
// ============================================================================

#[tokio::test]
async fn test_start_without_session_is_anonymous() {
    let backend = MockBackend::start().await;
    let app = backend.app(memory_store());

    assert_eq!(app.session().state(), AuthState::Loading);
    assert_eq!(gate(&app.session().state(), Route::Dashboard), Navigation::ShowLoading);

    let state = app.session().start().await;

    assert_eq!(state, AuthState::Anonymous);
    assert_eq!(
        gate(&state, Route::Dashboard),
        Navigation::Redirect(Route::Login)
    );
}

#[tokio::test]
async fn test_start_with_unreachable_server_is_anonymous() {
    let config = ClientConfig::for_api_url(&unreachable_url()).expect("valid url");
    let app = AppState::new(config, memory_store()).expect("app state");

    let state = app.session().start().await;
    assert_eq!(state, AuthState::Anonymous);

    let err = app.session().revalidate().await.expect_err("no server");
    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(app.session().state(), AuthState::Anonymous);
}

#[tokio::test]
async fn test_loading_is_observable_while_validating() {
    let backend = MockBackend::start().await;
    let app = backend.app(memory_store());
    app.session().start().await;
    backend.set_validate_delay(Duration::from_millis(200));
    let mut rx = app.session().subscribe();

    let startup = tokio::spawn({
        let app = app.clone();
        async move { app.session().start().await }
    });

    rx.changed().await.expect("state changed");
    let state = rx.borrow_and_update().clone();
    assert_eq!(state, AuthState::Loading);
    assert_eq!(gate(&state, Route::Dashboard), Navigation::ShowLoading);
    assert!(!startup.is_finished());

    assert_eq!(startup.await.expect("task completes"), AuthState::Anonymous);
    assert_eq!(app.session().state(), AuthState::Anonymous);
}

#[tokio::test]
async fn test_unknown_role_still_authenticates() {
    let backend = MockBackend::start().await;
    backend.set_role("admin");
    let (app, _store) = logged_in(&backend).await;

    let state = app.session().start().await;

    let session = state.session().expect("authenticated");
    assert_eq!(session.role, UserRole::Other("admin".to_string()));
    assert_eq!(session.role.to_string(), "admin");
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_validates_and_authenticates() {
    let backend = MockBackend::start().await;
    let (app, store) = logged_in(&backend).await;

    let state = app.session().state();
    let session = state.session().expect("authenticated");
    assert_eq!(session.email.as_str(), "associate@store.example");
    assert_eq!(session.display_name(), "Alex Rivera");
    assert_eq!(session.role, UserRole::Associate);
    assert!(session.created_at().is_some());

    assert_eq!(
        store.get().expect("store readable"),
        Some(Credential::new("token-2"))
    );
    assert_eq!(
        gate(&state, Route::Login),
        Navigation::Redirect(Route::Dashboard)
    );
}

#[tokio::test]
async fn test_login_wrong_password_stays_anonymous() {
    let backend = MockBackend::start().await;
    let app = backend.app(memory_store());
    app.session().start().await;

    let err = app
        .session()
        .login(&email("associate@store.example"), &password("wrong"))
        .await
        .expect_err("wrong password");

    assert!(matches!(err, ApiError::InvalidCredentials));
    assert_eq!(err.to_string(), "Invalid credentials. Please try again.");
    assert_eq!(app.session().state(), AuthState::Anonymous);
    assert_eq!(backend.session_count(), 0);
}

#[tokio::test]
async fn test_login_unknown_user_is_invalid_credentials() {
    let backend = MockBackend::start().await;
    let app = backend.app(memory_store());

    let err = app
        .session()
        .login(&email("nobody@store.example"), &password("whatever"))
        .await
        .expect_err("unknown user");

    assert!(matches!(err, ApiError::InvalidCredentials));
    assert_eq!(app.session().state(), AuthState::Anonymous);
}

#[tokio::test]
async fn test_login_against_unreachable_server_is_network_error() {
    let config = ClientConfig::for_api_url(&unreachable_url()).expect("valid url");
    let app = AppState::new(config, memory_store()).expect("app state");

    let err = app
        .session()
        .login(&email("associate@store.example"), &password("correct-horse"))
        .await
        .expect_err("no server");

    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(app.session().state(), AuthState::Anonymous);
}

#[tokio::test]
async fn test_subscribers_observe_login() {
    let backend = MockBackend::start().await;
    let app = backend.app(memory_store());
    app.session().start().await;
    let mut rx = app.session().subscribe();

    app.session()
        .login(&email("associate@store.example"), &password("correct-horse"))
        .await
        .expect("login");

    rx.changed().await.expect("state changed");
    assert!(rx.borrow_and_update().is_authenticated());
}

#[tokio::test]
async fn test_unmounted_view_discards_login_result() {
    let backend = MockBackend::start().await;
    let app = backend.app(memory_store());
    let scope = ViewScope::new();
    scope.unmount();

    let result = scope
        .run(
            app.session()
                .login(&email("associate@store.example"), &password("correct-horse")),
        )
        .await;

    // The call itself still ran to completion
    assert!(result.is_none());
    assert_eq!(backend.login_calls(), 1);
    assert!(app.session().state().is_authenticated());
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_clears_everything() {
    let backend = MockBackend::start().await;
    let (app, store) = logged_in(&backend).await;
    assert_eq!(backend.session_count(), 1);

    app.session().logout().await.expect("logout");

    assert_eq!(app.session().state(), AuthState::Anonymous);
    assert!(store.get().expect("store readable").is_none());
    assert_eq!(backend.session_count(), 0);

    // The server no longer recognises the session either
    app.session().revalidate().await.expect("revalidate");
    assert_eq!(app.session().state(), AuthState::Anonymous);
}

#[tokio::test]
async fn test_logout_clears_local_state_when_server_unreachable() {
    let config = ClientConfig::for_api_url(&unreachable_url()).expect("valid url");
    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new("stale")));
    let app = AppState::new(config, store.clone()).expect("app state");

    app.session().logout().await.expect("logout is best-effort");

    assert_eq!(app.session().state(), AuthState::Anonymous);
    assert!(store.get().expect("store readable").is_none());
}

#[tokio::test]
async fn test_failed_server_logout_is_not_undone_by_revalidate() {
    let backend = MockBackend::start().await;
    let (app, store) = logged_in(&backend).await;
    backend.fail_logout(true);

    app.session().logout().await.expect("logout is best-effort");
    assert_eq!(app.session().state(), AuthState::Anonymous);
    assert!(store.get().expect("store readable").is_none());
    // The server still holds the session
    assert_eq!(backend.session_count(), 1);

    app.session().revalidate().await.expect("revalidate");
    assert_eq!(app.session().state(), AuthState::Anonymous);
}

#[tokio::test]
async fn test_failed_server_logout_does_not_survive_restart() {
    let backend = MockBackend::start().await;
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = backend.config();
    config.data_dir = dir.path().to_path_buf();

    let first = AppState::from_config(config.clone()).expect("app state");
    first
        .session()
        .login(&email("associate@store.example"), &password("correct-horse"))
        .await
        .expect("login");
    first.persist_session_cookies().expect("persist cookies");

    backend.fail_logout(true);
    first.session().logout().await.expect("logout is best-effort");
    first.persist_session_cookies().expect("persist cookies");
    drop(first);

    let second = AppState::from_config(config).expect("app state");
    assert_eq!(second.session().start().await, AuthState::Anonymous);
    assert_eq!(backend.session_count(), 1);
}

// ============================================================================
// Registration
// ============================================================================

fn registration(email: &str) -> RegistrationForm {
    RegistrationForm {
        email: email.to_string(),
        password: password("s3cret-pass"),
        confirm_password: password("s3cret-pass"),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        phone: "555-0199".to_string(),
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let backend = MockBackend::start().await;
    let app = backend.app(memory_store());

    let form = registration("jane@store.example").validate().expect("valid form");
    let result = app.session().register(&form).await.expect("register");

    assert_eq!(result.message.as_deref(), Some("User added successfully"));
    assert_eq!(
        backend.user("jane@store.example").expect("user stored").first_name,
        "Jane"
    );
    // Registering does not log in
    assert!(!app.session().state().is_authenticated());

    app.session()
        .login(&email("jane@store.example"), &password("s3cret-pass"))
        .await
        .expect("login with new account");
    assert_eq!(
        app.session().session().expect("session").display_name(),
        "Jane Doe"
    );
}

#[tokio::test]
async fn test_register_duplicate_email_is_validation_error() {
    let backend = MockBackend::start().await;
    let app = backend.app(memory_store());

    let form = registration("associate@store.example")
        .validate()
        .expect("valid form");
    let err = app.session().register(&form).await.expect_err("duplicate");

    match err {
        ApiError::Validation(message) => assert_eq!(message, "User already exists"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ============================================================================
// Persistence across restarts
// ============================================================================

#[tokio::test]
async fn test_file_backed_session_survives_restart() {
    let backend = MockBackend::start().await;
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = backend.config();
    config.data_dir = dir.path().to_path_buf();

    let first = AppState::from_config(config.clone()).expect("app state");
    first
        .session()
        .login(&email("associate@store.example"), &password("correct-horse"))
        .await
        .expect("login");
    first.persist_session_cookies().expect("persist cookies");
    let credential = first.store().get().expect("store readable");
    drop(first);

    let second = AppState::from_config(config.clone()).expect("app state");
    assert_eq!(second.store().get().expect("store readable"), credential);
    assert!(second.session().start().await.is_authenticated());

    second.session().logout().await.expect("logout");
    second.persist_session_cookies().expect("persist cookies");
    drop(second);

    let third = AppState::from_config(config).expect("app state");
    assert!(third.store().get().expect("store readable").is_none());
    assert_eq!(third.session().start().await, AuthState::Anonymous);
}
