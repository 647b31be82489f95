//! TV plugin trait and shared helpers

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Cancelled, ControlError, Outcome, Result};
use crate::types::{DeviceCredential, Manufacturer, PairingResult, TvState, WakeHint};
use crate::wol::WakeSignal;

/// Trait for TV power management operations
///
/// Implementations handle the vendor-specific details (JointSPACE, JSON-RPC).
/// Transport and parse failures never escape: they become `false`,
/// [`PowerStatus::Unknown`](crate::PowerStatus::Unknown) or a failed
/// [`PairingResult`]. Only cancellation is reported as an error.
#[async_trait]
pub trait TvPlugin: Send + Sync {
    fn manufacturer(&self) -> Manufacturer;

    /// Human-readable description of the supported models
    fn model_hint(&self) -> &'static str;

    fn host(&self) -> &str;

    fn port(&self) -> u16;

    /// Credential currently used for authenticated calls
    fn credential(&self) -> &DeviceCredential;

    /// Best-effort reachability probe
    async fn discover(&self, cancel: &CancellationToken) -> Outcome<bool>;

    /// Run vendor-specific authentication
    ///
    /// Takes `&mut self` so only one pairing session can exist per adapter.
    /// On success the adapter adopts the returned credential.
    async fn pair(&mut self, prompt: &dyn PinPrompt, cancel: &CancellationToken) -> PairingResult;

    /// Send a wake packet, then wait for the TV network stack to come up
    async fn wake(&self, hint: &WakeHint, cancel: &CancellationToken) -> Outcome<bool>;

    /// Query the current power state
    async fn get_state(&self, cancel: &CancellationToken) -> Outcome<TvState>;

    /// Put the TV into standby
    async fn power_off(&self, cancel: &CancellationToken) -> Outcome<bool>;

    /// Send a named remote key
    async fn send_key(&self, key: &str, cancel: &CancellationToken) -> Outcome<bool>;

    /// Launch an application by id or URI
    async fn launch_app(&self, app_id: &str, cancel: &CancellationToken) -> Outcome<bool>;

    /// Check if the plugin implements a specific operation
    fn supports_operation(&self, op: TvOperation) -> bool;
}

/// TV operations for capability checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvOperation {
    /// Probe the control API
    Discover,
    /// Obtain a credential
    Pair,
    /// Send a magic packet
    Wake,
    /// Read power state
    GetState,
    /// Enter standby
    PowerOff,
    /// Send a remote-control key
    SendKey,
    /// Launch an app
    LaunchApp,
}

/// Source of the PIN displayed on the TV during pairing
///
/// Returning `None` cancels the pairing attempt without a network call.
#[async_trait]
pub trait PinPrompt: Send + Sync {
    async fn ask_for_pin(&self) -> Option<String>;
}

/// Prompt that always answers with the same PIN
#[derive(Debug, Clone)]
pub struct FixedPin(pub String);

#[async_trait]
impl PinPrompt for FixedPin {
    async fn ask_for_pin(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Prompt that never yields a PIN
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl PinPrompt for NoPrompt {
    async fn ask_for_pin(&self) -> Option<String> {
        None
    }
}

/// Fold an internal result into a public outcome
///
/// Cancellation passes through; every other error is logged and replaced
/// with `fallback`.
pub(crate) fn settle<T>(op: &str, host: &str, result: Result<T>, fallback: T) -> Outcome<T> {
    match result {
        Ok(value) => Ok(value),
        Err(ControlError::Cancelled) => {
            info!(op = op, host = %host, "Operation cancelled");
            Err(Cancelled)
        }
        Err(e) => {
            warn!(op = op, host = %host, error = %e, "Operation failed");
            Ok(fallback)
        }
    }
}

/// Send the wake packet and sleep for `settle_delay`
///
/// Both steps race the cancellation token.
pub(crate) async fn wake_and_settle(
    hint: &WakeHint,
    settle_delay: Duration,
    host: &str,
    cancel: &CancellationToken,
) -> Outcome<bool> {
    let signal = WakeSignal::new(hint.clone());

    let sent = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ControlError::Cancelled),
        result = signal.send() => result,
    };
    if let Err(e) = sent {
        return settle("wake", host, Err(e), false);
    }

    info!(
        host = %host,
        mac = %hint.mac,
        delay_ms = settle_delay.as_millis() as u64,
        "Wake packet sent, waiting for network stack"
    );

    tokio::select! {
        biased;
        _ = cancel.cancelled() => settle("wake", host, Err(ControlError::Cancelled), false),
        _ = tokio::time::sleep(settle_delay) => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PairingOutcome, PowerStatus};
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicU8, Ordering};

    // Mock plugin for testing the trait surface
    struct MockTvPlugin {
        power: AtomicU8,
        credential: DeviceCredential,
    }

    impl MockTvPlugin {
        fn new() -> Self {
            Self {
                power: AtomicU8::new(0),
                credential: DeviceCredential::empty(Manufacturer::JsonRpc, "mock"),
            }
        }
    }

    #[async_trait]
    impl TvPlugin for MockTvPlugin {
        fn manufacturer(&self) -> Manufacturer {
            Manufacturer::JsonRpc
        }

        fn model_hint(&self) -> &'static str {
            "mock"
        }

        fn host(&self) -> &str {
            "mock"
        }

        fn port(&self) -> u16 {
            0
        }

        fn credential(&self) -> &DeviceCredential {
            &self.credential
        }

        async fn discover(&self, _cancel: &CancellationToken) -> Outcome<bool> {
            Ok(true)
        }

        async fn pair(&mut self, prompt: &dyn PinPrompt, _cancel: &CancellationToken) -> PairingResult {
            match prompt.ask_for_pin().await {
                Some(pin) => {
                    self.credential = self.credential.clone().with_secret(pin);
                    PairingResult::success(self.credential.clone())
                }
                None => PairingResult::cancelled("no pin"),
            }
        }

        async fn wake(&self, _hint: &WakeHint, _cancel: &CancellationToken) -> Outcome<bool> {
            self.power.store(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn get_state(&self, _cancel: &CancellationToken) -> Outcome<TvState> {
            let power = match self.power.load(Ordering::SeqCst) {
                1 => PowerStatus::On,
                _ => PowerStatus::Standby,
            };
            Ok(TvState::with_power(power))
        }

        async fn power_off(&self, _cancel: &CancellationToken) -> Outcome<bool> {
            self.power.store(0, Ordering::SeqCst);
            Ok(true)
        }

        async fn send_key(&self, key: &str, cancel: &CancellationToken) -> Outcome<bool> {
            if key == "Standby" {
                self.power_off(cancel).await
            } else {
                Ok(false)
            }
        }

        async fn launch_app(&self, _app_id: &str, _cancel: &CancellationToken) -> Outcome<bool> {
            Ok(false)
        }

        fn supports_operation(&self, op: TvOperation) -> bool {
            !matches!(op, TvOperation::LaunchApp)
        }
    }

    #[tokio::test]
    async fn test_mock_wake_and_power_off() {
        let plugin = MockTvPlugin::new();
        let cancel = CancellationToken::new();
        let hint = WakeHint::new("00:11:22:33:44:55").unwrap();

        assert!(plugin.wake(&hint, &cancel).await.unwrap());
        assert_eq!(plugin.get_state(&cancel).await.unwrap().power, PowerStatus::On);

        assert!(plugin.send_key("Standby", &cancel).await.unwrap());
        assert_eq!(plugin.get_state(&cancel).await.unwrap().power, PowerStatus::Standby);
    }

    #[tokio::test]
    async fn test_mock_pair_through_trait_object() {
        let mut plugin: Box<dyn TvPlugin> = Box::new(MockTvPlugin::new());
        let cancel = CancellationToken::new();

        let result = plugin.pair(&NoPrompt, &cancel).await;
        assert_eq!(result.outcome, PairingOutcome::Cancelled);

        let result = plugin.pair(&FixedPin("4242".to_string()), &cancel).await;
        assert!(result.is_success());
        assert_eq!(plugin.credential().secret(), Some("4242"));
    }

    #[test]
    fn test_settle_folds_errors() {
        let out = settle("op", "tv", Err::<bool, _>(ControlError::Timeout("t".into())), false);
        assert_eq!(out, Ok(false));

        let out = settle("op", "tv", Err::<bool, _>(ControlError::Cancelled), false);
        assert_eq!(out, Err(Cancelled));

        assert_eq!(settle("op", "tv", Ok(true), false), Ok(true));
    }

    #[tokio::test]
    async fn test_wake_and_settle_sends_and_waits() {
        let listener = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hint = WakeHint::new("00:11:22:33:44:55")
            .unwrap()
            .with_broadcast(Ipv4Addr::LOCALHOST)
            .with_port(port);

        let cancel = CancellationToken::new();
        let out = wake_and_settle(&hint, Duration::from_millis(10), "tv", &cancel).await;
        assert_eq!(out, Ok(true));

        let mut buf = [0u8; 128];
        let (len, _) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 102);
    }

    #[tokio::test]
    async fn test_wake_and_settle_cancelled() {
        let hint = WakeHint::new("00:11:22:33:44:55")
            .unwrap()
            .with_broadcast(Ipv4Addr::LOCALHOST)
            .with_port(9);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let out = wake_and_settle(&hint, Duration::from_secs(30), "tv", &cancel).await;
        assert_eq!(out, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_wake_and_settle_cancelled_during_delay() {
        let listener = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hint = WakeHint::new("00:11:22:33:44:55")
            .unwrap()
            .with_broadcast(Ipv4Addr::LOCALHOST)
            .with_port(port);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let out = wake_and_settle(&hint, Duration::from_secs(30), "tv", &cancel).await;
        assert_eq!(out, Err(Cancelled));
        assert!(started.elapsed() < Duration::from_secs(4));

        // The packet went out before the delay was interrupted
        let mut buf = [0u8; 128];
        let (len, _) = listener.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, 102);
    }
}
