use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Personal Finance Dashboard - Passkey API
Version: {version}

Available endpoints:
  - POST /passkeys/generate-registration-options    - Start registering a passkey
  - POST /passkeys/verify-registration              - Verify and store a new passkey
  - POST /passkeys/generate-authentication-options  - Start signing in with a passkey
  - POST /passkeys/verify-authentication            - Verify a passkey assertion
  - GET  /health                                    - Light health check
  - GET  /health?mode=full                          - Full health check (includes Redis)
  - GET  /metrics                                   - Prometheus metrics

Ceremony endpoints accept POST only; challenges are single-use and expire.
"#
    )
}
