/// Delivery of one-time passwords.
///
/// No mail or SMS gateway is wired in: the default sink writes the code to
/// the log, where an operator can read it off during password recovery.

/// Trait for OTP delivery. Implementations can log, capture for tests, or
/// hand off to a real gateway.
pub trait OtpNotifier: Send + Sync {
    fn deliver(&self, email: &str, code: &str);
}

/// Notifier that uses the `tracing` crate.
pub struct TracingNotifier;

impl OtpNotifier for TracingNotifier {
    fn deliver(&self, email: &str, code: &str) {
        tracing::info!(
            component = "otp",
            email = %email,
            "one-time password {} issued",
            code,
        );
    }
}

/// No-op notifier that discards codes.
pub struct NullNotifier;

impl OtpNotifier for NullNotifier {
    fn deliver(&self, _email: &str, _code: &str) {}
}
