use metrics::counter;

/// Increment the counter of successfully verified registrations.
pub fn increment_registration_verified() {
    counter!("passkey_registrations_verified_total").increment(1);
}

/// Increment the counter of successfully verified authentications.
pub fn increment_authentication_verified() {
    counter!("passkey_authentications_verified_total").increment(1);
}
