//! Shared test doubles.

#![allow(dead_code)]

use async_trait::async_trait;
use daily_auth_adapter_memory::MemoryAdapter;
use daily_auth_core::ManualClock;
use daily_auth_otp_utils::{CodeGenerator, OtpSettings, SharedSettings};
use daily_auth_plugin_phone_number::{
    Channel, DeliveryError, DeliveryReceipt, MessageSender, OutgoingMessage, PhoneOtpEngine,
    ProviderStatus,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Hands out pre-set codes in order and counts calls.
#[derive(Debug, Clone, Default)]
pub struct SequenceGenerator {
    codes: Arc<Mutex<VecDeque<String>>>,
    calls: Arc<AtomicUsize>,
}

impl SequenceGenerator {
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: Arc::new(Mutex::new(codes.iter().map(|c| c.to_string()).collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CodeGenerator for SequenceGenerator {
    fn generate(&self, length: usize) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.codes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "9".repeat(length))
    }
}

/// Records every message; optionally fails one channel or the connection check.
#[derive(Debug, Clone, Default)]
pub struct RecordingSender {
    pub sent: Arc<Mutex<Vec<OutgoingMessage>>>,
    pub failing: Option<Channel>,
    pub unreachable: bool,
}

impl RecordingSender {
    pub fn failing(channel: Channel) -> Self {
        Self {
            failing: Some(channel),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, DeliveryError> {
        if self.failing == Some(message.channel) {
            return Err(DeliveryError::provider(message.channel, "simulated outage"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(DeliveryReceipt {
            channel: message.channel,
            message_id: Some(format!("MSG{}", self.sent.lock().unwrap().len())),
            status: Some("queued".to_string()),
        })
    }

    async fn check_connection(&self) -> Result<ProviderStatus, DeliveryError> {
        if self.unreachable {
            return Err(DeliveryError::Connection {
                provider: "recording",
                message: "simulated outage".to_string(),
            });
        }
        Ok(ProviderStatus {
            provider: "recording",
            account: Some("ACC12345".to_string()),
            status: Some("active".to_string()),
        })
    }
}

pub struct Harness {
    pub engine: Arc<PhoneOtpEngine>,
    pub store: MemoryAdapter,
    pub clock: ManualClock,
    pub generator: SequenceGenerator,
    pub settings: SharedSettings,
}

pub fn harness(codes: &[&str]) -> Harness {
    harness_with(codes, OtpSettings::default())
}

pub fn harness_with(codes: &[&str], settings: OtpSettings) -> Harness {
    let store = MemoryAdapter::new();
    let clock = ManualClock::starting_now();
    let generator = SequenceGenerator::new(codes);
    let settings = SharedSettings::new(settings);
    let engine = PhoneOtpEngine::builder()
        .store(store.clone())
        .clock(clock.clone())
        .generator(generator.clone())
        .settings(settings.clone())
        .build()
        .expect("engine should build");
    Harness {
        engine: Arc::new(engine),
        store,
        clock,
        generator,
        settings,
    }
}
